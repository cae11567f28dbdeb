//! `Authorization` header rendering for the `WECHATPAY2-SHA256-RSA2048` scheme.

// self
use crate::{
	_prelude::*,
	auth::{MerchantId, SerialNumber},
};

/// Literal scheme name that prefixes every V3 `Authorization` header.
pub const AUTHORIZATION_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Renders the `Authorization` header value from its five components.
///
/// The layout is fixed: comma-separated `key="value"` pairs with no whitespace after the
/// commas, in the order `mchid`, `nonce_str`, `timestamp`, `serial_no`, `signature`.
pub fn format_authorization_header(
	merchant_id: &str,
	nonce: &str,
	timestamp: &str,
	serial_no: &str,
	signature: &str,
) -> String {
	format!(
		"{AUTHORIZATION_SCHEME} mchid=\"{merchant_id}\",nonce_str=\"{nonce}\",timestamp=\"{timestamp}\",serial_no=\"{serial_no}\",signature=\"{signature}\""
	)
}

/// Signed credential attached to one outbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationToken {
	/// Merchant identifier.
	pub merchant_id: MerchantId,
	/// Per-request nonce.
	pub nonce: String,
	/// Unix timestamp in seconds.
	pub timestamp: i64,
	/// Serial number of the merchant certificate matching the signing key.
	pub serial_no: SerialNumber,
	/// Base64 RSA-SHA256 signature over the canonical request.
	pub signature: String,
}
impl Display for AuthorizationToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&format_authorization_header(
			&self.merchant_id,
			&self.nonce,
			&self.timestamp.to_string(),
			&self.serial_no,
			&self.signature,
		))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_matches_literal_template() {
		let header = format_authorization_header(
			"wx123456",
			"5f3b2c1a",
			"1629874820",
			"foobar_123456",
			"string",
		);

		assert_eq!(
			header,
			"WECHATPAY2-SHA256-RSA2048 mchid=\"wx123456\",nonce_str=\"5f3b2c1a\",timestamp=\"1629874820\",serial_no=\"foobar_123456\",signature=\"string\""
		);
	}

	#[test]
	fn token_display_uses_header_format() {
		let token = AuthorizationToken {
			merchant_id: MerchantId::new("1900000109").expect("Merchant fixture should be valid."),
			nonce: "88f7b2d9e69126b70467c29b5408736f".into(),
			timestamp: 1_629_874_820,
			serial_no: SerialNumber::new("3775b6a4").expect("Serial fixture should be valid."),
			signature: "c2lnbmF0dXJl".into(),
		};

		assert_eq!(
			token.to_string(),
			format_authorization_header(
				"1900000109",
				"88f7b2d9e69126b70467c29b5408736f",
				"1629874820",
				"3775B6A4",
				"c2lnbmF0dXJl",
			)
		);
		assert!(token.to_string().starts_with("WECHATPAY2-SHA256-RSA2048 mchid="));
	}
}
