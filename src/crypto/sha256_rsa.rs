//! `SHA256withRSA` signing and verification with base64 signature encoding.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rsa::{
	pkcs1v15::{Signature, SigningKey, VerifyingKey},
	signature::{SignatureEncoding, Signer, Verifier},
};
use sha2::Sha256;
// self
use crate::error::ConfigError;

/// Merchant-side signing key (PKCS#1 v1.5 padding, SHA-256 digest).
pub type MerchantSigningKey = SigningKey<Sha256>;
/// Platform-side verifying key (PKCS#1 v1.5 padding, SHA-256 digest).
pub type PlatformVerifyingKey = VerifyingKey<Sha256>;

/// Signs `message` and returns the standard, padded base64 encoding of the signature.
pub fn sign_sha256_rsa(key: &MerchantSigningKey, message: &[u8]) -> Result<String, ConfigError> {
	let signature = key.try_sign(message).map_err(ConfigError::Signing)?;

	Ok(STANDARD.encode(signature.to_bytes()))
}

/// Verifies a base64 signature over `message`.
///
/// Undecodable base64 and malformed signature lengths count as a failed verification.
pub fn verify_sha256_rsa(key: &PlatformVerifyingKey, message: &[u8], signature: &str) -> bool {
	let Ok(raw) = STANDARD.decode(signature.trim()) else {
		return false;
	};
	let Ok(signature) = Signature::try_from(raw.as_slice()) else {
		return false;
	};

	key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use rsa::{
		RsaPrivateKey, RsaPublicKey,
		pkcs8::{DecodePrivateKey, DecodePublicKey},
	};
	// self
	use super::*;
	use crate::{_preludet::*, canonical};

	fn merchant_keys() -> (MerchantSigningKey, PlatformVerifyingKey) {
		let private = RsaPrivateKey::from_pkcs8_pem(MERCHANT_KEY_PEM)
			.expect("Merchant private key fixture should parse.");
		let public = RsaPublicKey::from_public_key_pem(MERCHANT_PUBLIC_PEM)
			.expect("Merchant public key fixture should parse.");

		(SigningKey::new(private), VerifyingKey::new(public))
	}

	#[test]
	fn signing_matches_known_answer() {
		let (signing, _) = merchant_keys();
		let message = canonical::build_request_string(
			"GET",
			"/v3/certificates",
			&FIXTURE_TIMESTAMP.to_string(),
			FIXTURE_NONCE,
			"",
		);
		let signature = sign_sha256_rsa(&signing, message.as_bytes())
			.expect("Signing with the fixture key should succeed.");

		assert_eq!(signature, MERCHANT_GET_SIGNATURE);
	}

	#[test]
	fn round_trip_verifies_only_with_matching_key() {
		let (signing, verifying) = merchant_keys();
		let message = b"POST\n/v3/pay/transactions/native\n1629874820\nnonce\n{}\n";
		let signature = sign_sha256_rsa(&signing, message)
			.expect("Signing with the fixture key should succeed.");

		assert!(verify_sha256_rsa(&verifying, message, &signature));

		let other = crate::cert::PlatformCertificate::from_pem(UNRELATED_CERTIFICATE_PEM)
			.expect("Unrelated certificate fixture should parse.");

		assert!(!verify_sha256_rsa(other.verifying_key(), message, &signature));
	}

	#[test]
	fn garbage_signatures_fail_closed() {
		let (_, verifying) = merchant_keys();

		assert!(!verify_sha256_rsa(&verifying, b"payload", "not base64!"));
		assert!(!verify_sha256_rsa(&verifying, b"payload", "c2lnbmF0dXJl"));
		assert!(!verify_sha256_rsa(&verifying, b"payload", ""));
	}
}
