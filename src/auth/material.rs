//! Merchant signing material: identity plus the RSA private key that signs requests.

// std
use std::path::Path;
// crates.io
use rsa::{RsaPrivateKey, pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey};
// self
use crate::{
	_prelude::*,
	auth::{AuthorizationToken, MerchantId, SerialNumber},
	canonical::CanonicalRequest,
	crypto::{self, MerchantSigningKey},
	error::ConfigError,
};

/// Merchant identity and private key used only for outbound signing.
///
/// The key is parsed once and kept in memory for the lifetime of the value; it is never
/// written anywhere and `Debug` omits it.
#[derive(Clone)]
pub struct SigningMaterial {
	merchant_id: MerchantId,
	serial_no: SerialNumber,
	signing_key: MerchantSigningKey,
}
impl SigningMaterial {
	/// Parses a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM.
	pub fn from_pem(
		merchant_id: MerchantId,
		serial_no: SerialNumber,
		pem: &str,
	) -> Result<Self, ConfigError> {
		let private_key = parse_private_key(pem)?;

		Ok(Self { merchant_id, serial_no, signing_key: MerchantSigningKey::new(private_key) })
	}

	/// Reads and parses a private key PEM file.
	pub fn from_pem_file(
		merchant_id: MerchantId,
		serial_no: SerialNumber,
		path: impl AsRef<Path>,
	) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let pem = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadPrivateKey {
			path: path.display().to_string(),
			source,
		})?;

		Self::from_pem(merchant_id, serial_no, &pem)
	}

	/// Merchant identifier placed in the `mchid` field.
	pub fn merchant_id(&self) -> &MerchantId {
		&self.merchant_id
	}

	/// Serial number of the merchant certificate placed in the `serial_no` field.
	pub fn serial_no(&self) -> &SerialNumber {
		&self.serial_no
	}

	/// Signs a canonical request and packages the result as an [`AuthorizationToken`].
	pub fn sign(
		&self,
		request: &CanonicalRequest<'_>,
		timestamp: i64,
	) -> Result<AuthorizationToken, ConfigError> {
		let signature = crypto::sign_sha256_rsa(&self.signing_key, &request.to_bytes())?;

		Ok(AuthorizationToken {
			merchant_id: self.merchant_id.clone(),
			nonce: request.nonce.to_owned(),
			timestamp,
			serial_no: self.serial_no.clone(),
			signature,
		})
	}
}
impl Debug for SigningMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningMaterial")
			.field("merchant_id", &self.merchant_id)
			.field("serial_no", &self.serial_no)
			.field("private_key", &"<redacted>")
			.finish()
	}
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, ConfigError> {
	let pem = pem.trim();

	if pem.is_empty() {
		return Err(ConfigError::MissingField { field: "private_key" });
	}

	RsaPrivateKey::from_pkcs8_pem(pem).or_else(|pkcs8_err| {
		RsaPrivateKey::from_pkcs1_pem(pem).map_err(|pkcs1_err| ConfigError::InvalidPrivateKey {
			reason: format!("PKCS#8: {pkcs8_err}; PKCS#1: {pkcs1_err}"),
		})
	})
}
