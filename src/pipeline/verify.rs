//! Inbound response signature verification.

// crates.io
use http::HeaderMap;
// self
use crate::{
	_prelude::*,
	auth::SerialNumber,
	canonical::CanonicalResponse,
	cert::CertificateResolver,
	pipeline::{InterceptFuture, Interceptor},
	transport::HttpResponse,
};

/// Header carrying the platform's base64 signature.
pub const WECHATPAY_SIGNATURE: &str = "Wechatpay-Signature";
/// Header carrying the signing timestamp.
pub const WECHATPAY_TIMESTAMP: &str = "Wechatpay-Timestamp";
/// Header carrying the signing nonce.
pub const WECHATPAY_NONCE: &str = "Wechatpay-Nonce";
/// Header carrying the serial number of the signing platform certificate.
pub const WECHATPAY_SERIAL: &str = "Wechatpay-Serial";

/// Signature metadata extracted from response headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeaders {
	/// Base64 signature.
	pub signature: String,
	/// Timestamp as sent by the platform.
	pub timestamp: String,
	/// Nonce as sent by the platform.
	pub nonce: String,
	/// Declared certificate serial; absent responses are only accepted in pinned mode.
	pub serial_no: Option<SerialNumber>,
}
impl SignatureHeaders {
	/// Reads the four `Wechatpay-*` headers (names are case-insensitive).
	///
	/// A missing or non-text signature, timestamp, or nonce yields
	/// [`Error::MalformedResponse`] naming the first offending header.
	pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
		let signature = required(headers, WECHATPAY_SIGNATURE)?;
		let timestamp = required(headers, WECHATPAY_TIMESTAMP)?;
		let nonce = required(headers, WECHATPAY_NONCE)?;
		let serial_no = match optional(headers, WECHATPAY_SERIAL)? {
			Some(raw) => Some(
				SerialNumber::new(raw)
					.map_err(|_| Error::MalformedResponse { header: WECHATPAY_SERIAL })?,
			),
			None => None,
		};

		Ok(Self { signature, timestamp, nonce, serial_no })
	}
}

fn optional(headers: &HeaderMap, name: &'static str) -> Result<Option<String>> {
	let Some(value) = headers.get(name) else {
		return Ok(None);
	};
	let text = value.to_str().map_err(|_| Error::MalformedResponse { header: name })?.trim();

	Ok((!text.is_empty()).then(|| text.to_owned()))
}

fn required(headers: &HeaderMap, name: &'static str) -> Result<String> {
	optional(headers, name)?.ok_or(Error::MalformedResponse { header: name })
}

/// Rejects responses whose signature does not verify against the declared platform certificate.
///
/// Verification runs for every status code; the response passes through untouched on success.
#[derive(Clone, Debug)]
pub struct ResponseVerifier {
	resolver: Arc<CertificateResolver>,
}
impl ResponseVerifier {
	/// Creates a verifier backed by `resolver`.
	pub fn new(resolver: Arc<CertificateResolver>) -> Self {
		Self { resolver }
	}

	/// Verifies `headers` + `body` without consuming a response.
	pub async fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
		let signed = SignatureHeaders::from_headers(headers)?;
		let certificate = self.resolver.resolve(signed.serial_no.as_ref()).await?;
		let message = CanonicalResponse {
			timestamp: &signed.timestamp,
			nonce: &signed.nonce,
			body,
		}
		.to_bytes();

		if certificate.verify(&message, &signed.signature) {
			Ok(())
		} else {
			let serial = match (signed.serial_no, certificate.serial_no()) {
				(Some(serial), _) => serial.to_string(),
				(None, Some(serial)) => serial.to_string(),
				(None, None) => "pinned".to_owned(),
			};

			#[cfg(feature = "tracing")]
			tracing::warn!(serial = %serial, "Response signature rejected.");

			Err(Error::UntrustedSignature { serial })
		}
	}
}
impl Interceptor for ResponseVerifier {
	fn on_response(&self, response: HttpResponse) -> InterceptFuture<'_, HttpResponse> {
		Box::pin(async move {
			self.verify(response.headers(), response.body()).await?;

			Ok(response)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{HeaderName, HeaderValue};
	// self
	use super::*;

	fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for (name, value) in pairs {
			map.insert(
				HeaderName::from_bytes(name.as_bytes()).expect("Fixture header name is valid."),
				HeaderValue::from_str(value).expect("Fixture header is valid."),
			);
		}

		map
	}

	#[test]
	fn header_names_are_case_insensitive() {
		let parsed = SignatureHeaders::from_headers(&headers(&[
			("wechatpay-signature", "c2ln"),
			("WECHATPAY-TIMESTAMP", "1629874820"),
			("Wechatpay-Nonce", "n"),
			("wechatpay-serial", "384aa39043f718b081647ece653266ee2484450b"),
		]))
		.expect("All headers are present.");

		assert_eq!(parsed.signature, "c2ln");
		assert_eq!(parsed.serial_no.as_deref(), Some("384AA39043F718B081647ECE653266EE2484450B"));
	}

	#[test]
	fn first_missing_header_is_reported() {
		let cases = [
			(vec![("Wechatpay-Timestamp", "1"), ("Wechatpay-Nonce", "n")], WECHATPAY_SIGNATURE),
			(vec![("Wechatpay-Signature", "s"), ("Wechatpay-Nonce", "n")], WECHATPAY_TIMESTAMP),
			(vec![("Wechatpay-Signature", "s"), ("Wechatpay-Timestamp", "1")], WECHATPAY_NONCE),
			(
				vec![
					("Wechatpay-Signature", ""),
					("Wechatpay-Timestamp", "1"),
					("Wechatpay-Nonce", "n"),
				],
				WECHATPAY_SIGNATURE,
			),
		];

		for (pairs, missing) in cases {
			let err = SignatureHeaders::from_headers(&headers(&pairs))
				.expect_err("Incomplete headers must be rejected.");

			assert!(matches!(err, Error::MalformedResponse { header } if header == missing));
		}

		let parsed = SignatureHeaders::from_headers(&headers(&[
			("Wechatpay-Signature", "s"),
			("Wechatpay-Timestamp", "1"),
			("Wechatpay-Nonce", "n"),
		]))
		.expect("Serial is optional at parse time.");

		assert!(parsed.serial_no.is_none());
	}
}
