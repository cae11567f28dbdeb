//! Platform certificates: the encrypted bundle served by `/v3/certificates`, the decrypted
//! certificate model, and the cache + resolver that select a certificate by serial number.

pub mod cache;
pub mod fetcher;
pub mod resolver;

pub use cache::*;
pub use fetcher::*;
pub use resolver::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{RsaPublicKey, pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey};
use time::format_description::well_known::Rfc3339;
use x509_cert::{
	Certificate,
	der::{DecodePem, Encode},
};
// self
use crate::{
	_prelude::*,
	auth::{ApiV3Key, SerialNumber},
	crypto::{self, AEAD_AES_256_GCM, NONCE_LEN, PlatformVerifyingKey, TAG_LEN},
	error::CertificateError,
};

/// Decrypted platform certificate (or bare public key) used to verify responses.
#[derive(Clone)]
pub struct PlatformCertificate {
	serial_no: Option<SerialNumber>,
	pem: String,
	verifying_key: PlatformVerifyingKey,
	effective_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
}
impl PlatformCertificate {
	/// Parses an X.509 `CERTIFICATE` PEM, or a `PUBLIC KEY` / `RSA PUBLIC KEY` PEM.
	///
	/// Certificates contribute their serial number and validity window; bare public keys carry
	/// neither and are only meaningful as pinned trust anchors.
	pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
		let trimmed = pem.trim();

		if trimmed.starts_with("-----BEGIN CERTIFICATE-----") {
			return Self::from_x509_pem(pem);
		}

		let public_key = if trimmed.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
			RsaPublicKey::from_pkcs1_pem(trimmed).map_err(invalid_pem)?
		} else {
			RsaPublicKey::from_public_key_pem(trimmed).map_err(invalid_pem)?
		};

		Ok(Self {
			serial_no: None,
			pem: pem.to_owned(),
			verifying_key: PlatformVerifyingKey::new(public_key),
			effective_at: None,
			expires_at: None,
		})
	}

	fn from_x509_pem(pem: &str) -> Result<Self, CertificateError> {
		let certificate = Certificate::from_pem(pem.trim().as_bytes()).map_err(invalid_pem)?;
		let tbs = &certificate.tbs_certificate;
		let spki = tbs.subject_public_key_info.to_der().map_err(invalid_pem)?;
		let public_key = RsaPublicKey::from_public_key_der(&spki).map_err(invalid_pem)?;
		let serial_no = SerialNumber::new(serial_hex(tbs.serial_number.as_bytes()))
			.map_err(invalid_pem)?;

		Ok(Self {
			serial_no: Some(serial_no),
			pem: pem.to_owned(),
			verifying_key: PlatformVerifyingKey::new(public_key),
			effective_at: unix_instant(tbs.validity.not_before.to_unix_duration()),
			expires_at: unix_instant(tbs.validity.not_after.to_unix_duration()),
		})
	}

	/// Overrides the expiry instant (e.g. with the bundle's `expire_time`).
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Serial number embedded in the certificate, if the PEM was a certificate.
	pub fn serial_no(&self) -> Option<&SerialNumber> {
		self.serial_no.as_ref()
	}

	/// Original PEM text.
	pub fn pem(&self) -> &str {
		&self.pem
	}

	/// Public key that verifies platform signatures.
	pub fn verifying_key(&self) -> &PlatformVerifyingKey {
		&self.verifying_key
	}

	/// Start of the validity window, when known.
	pub fn effective_at(&self) -> Option<OffsetDateTime> {
		self.effective_at
	}

	/// End of the validity window, when known.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Whether the certificate is past its expiry at `now`. Unknown expiry never expires.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}

	/// Verifies a base64 RSA-SHA256 signature over `message`.
	pub fn verify(&self, message: &[u8], signature: &str) -> bool {
		crypto::verify_sha256_rsa(&self.verifying_key, message, signature)
	}
}
impl Debug for PlatformCertificate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PlatformCertificate")
			.field("serial_no", &self.serial_no)
			.field("effective_at", &self.effective_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Response body of the certificate-list endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct CertificateBundle {
	/// One resource per active platform certificate.
	pub data: Vec<EncryptedCertificateResource>,
}
impl CertificateBundle {
	/// Parses a certificate-list response body, keeping the JSON path of any failure.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, CertificateError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| CertificateError::BundleParse { source })
	}

	/// Finds the resource for `serial`; never falls back to another resource.
	pub fn find(&self, serial: &SerialNumber) -> Option<&EncryptedCertificateResource> {
		self.data.iter().find(|resource| &resource.serial_no == serial)
	}
}

/// One encrypted certificate as returned by the certificate-list endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct EncryptedCertificateResource {
	/// Serial number of the certificate inside the ciphertext.
	pub serial_no: SerialNumber,
	/// RFC 3339 start of validity.
	#[serde(default)]
	pub effective_time: Option<String>,
	/// RFC 3339 end of validity.
	#[serde(default)]
	pub expire_time: Option<String>,
	/// AEAD envelope carrying the PEM.
	pub encrypt_certificate: EncryptedPayload,
}
impl EncryptedCertificateResource {
	/// Parsed `expire_time`, if present and well formed.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expire_time.as_deref().and_then(|raw| OffsetDateTime::parse(raw.trim(), &Rfc3339).ok())
	}

	/// Decrypts the envelope with the API v3 key and parses the resulting PEM.
	///
	/// The certificate inherits the bundle's `expire_time` when present, falling back to the
	/// X.509 `notAfter`.
	pub fn decrypt(&self, key: &ApiV3Key) -> Result<PlatformCertificate> {
		let serial = self.serial_no.to_string();
		let payload = &self.encrypt_certificate;

		if payload.algorithm != AEAD_AES_256_GCM {
			return Err(CertificateError::UnsupportedAlgorithm {
				serial,
				algorithm: payload.algorithm.clone(),
			}
			.into());
		}

		let nonce = <[u8; NONCE_LEN]>::try_from(payload.nonce.as_bytes()).map_err(|_| {
			CertificateError::InvalidNonce { serial: serial.clone(), len: payload.nonce.len() }
		})?;
		let ciphertext = STANDARD
			.decode(payload.ciphertext.trim())
			.map_err(|source| CertificateError::MalformedCiphertext {
				serial: serial.clone(),
				source,
			})?;

		if ciphertext.len() <= TAG_LEN {
			return Err(CertificateError::EmptyCiphertext { serial }.into());
		}

		let plaintext = crypto::decrypt_aes_256_gcm(
			key,
			&nonce,
			payload.associated_data.as_bytes(),
			&ciphertext,
		)?;
		let pem = String::from_utf8(plaintext)
			.map_err(|e| CertificateError::InvalidPem { reason: e.to_string() })?;
		let certificate = PlatformCertificate::from_pem(&pem)?;

		if let Some(actual) = certificate.serial_no().filter(|&actual| actual != &self.serial_no) {
			let actual = actual.to_string();

			return Err(CertificateError::SerialMismatch { expected: serial, actual }.into());
		}

		Ok(match self.expires_at() {
			Some(expires_at) => certificate.with_expires_at(expires_at),
			None => certificate,
		})
	}
}

/// AEAD envelope fields of an [`EncryptedCertificateResource`].
#[derive(Clone, Debug, Deserialize)]
pub struct EncryptedPayload {
	/// Always `AEAD_AES_256_GCM` for V3.
	pub algorithm: String,
	/// 12-character GCM IV.
	pub nonce: String,
	/// Additional authenticated data.
	#[serde(default)]
	pub associated_data: String,
	/// Base64 ciphertext with the 16-byte tag appended.
	pub ciphertext: String,
}

fn invalid_pem(e: impl Display) -> CertificateError {
	CertificateError::InvalidPem { reason: e.to_string() }
}

fn serial_hex(bytes: &[u8]) -> String {
	let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len().saturating_sub(1));

	bytes[start..].iter().map(|b| format!("{b:02X}")).collect()
}

fn unix_instant(since_epoch: std::time::Duration) -> Option<OffsetDateTime> {
	let seconds = i64::try_from(since_epoch.as_secs()).ok()?;

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}
