//! AES-256-GCM decryption for resources encrypted with the API v3 key.

// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce, Tag,
	aead::{AeadInPlace, KeyInit},
};
// self
use crate::{auth::ApiV3Key, error::DecryptError};

/// Algorithm label used by the platform for AES-256-GCM resources.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";
/// GCM IV length in bytes.
pub const NONCE_LEN: usize = 12;
/// GCM authentication tag length in bytes; the tag trails the ciphertext.
pub const TAG_LEN: usize = 16;

/// Decrypts `ciphertext_with_tag` (ciphertext body followed by the 16-byte tag).
///
/// The plaintext is only returned after the tag authenticates both the ciphertext and
/// `associated_data`.
pub fn decrypt_aes_256_gcm(
	key: &ApiV3Key,
	nonce: &[u8; NONCE_LEN],
	associated_data: &[u8],
	ciphertext_with_tag: &[u8],
) -> Result<Vec<u8>, DecryptError> {
	let split = ciphertext_with_tag.len().checked_sub(TAG_LEN).ok_or(DecryptError::Truncated)?;
	let (body, tag) = ciphertext_with_tag.split_at(split);
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose()));
	let mut buffer = body.to_vec();

	cipher
		.decrypt_in_place_detached(
			Nonce::from_slice(nonce),
			associated_data,
			&mut buffer,
			Tag::from_slice(tag),
		)
		.map_err(|_| DecryptError::Authentication)?;

	Ok(buffer)
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine as _, engine::general_purpose::STANDARD};
	// self
	use super::*;
	use crate::_preludet::*;

	fn wechat_ciphertext() -> Vec<u8> {
		let bundle = bundle(WECHAT_CERTIFICATES_JSON);

		STANDARD
			.decode(&bundle.data[0].encrypt_certificate.ciphertext)
			.expect("Fixture ciphertext should be base64.")
	}

	fn nonce() -> [u8; NONCE_LEN] {
		*b"e4abbcd0e91e"
	}

	#[test]
	fn decrypts_literal_fixture() {
		let key = ApiV3Key::new(WECHAT_API_V3_KEY).expect("Fixture key should be 32 bytes.");
		let plaintext = decrypt_aes_256_gcm(&key, &nonce(), b"certificate", &wechat_ciphertext())
			.expect("Fixture ciphertext should decrypt.");

		assert_eq!(plaintext, WECHAT_CERTIFICATE_PEM.as_bytes());
	}

	#[test]
	fn wrong_key_fails_authentication() {
		let key = ApiV3Key::new("apiv320210817qwertyuiopasdfghjkx")
			.expect("Wrong key should still be 32 bytes.");
		let err = decrypt_aes_256_gcm(&key, &nonce(), b"certificate", &wechat_ciphertext())
			.expect_err("A wrong key must not decrypt.");

		assert!(matches!(err, DecryptError::Authentication));
	}

	#[test]
	fn truncated_tag_or_wrong_aad_fails() {
		let key = ApiV3Key::new(WECHAT_API_V3_KEY).expect("Fixture key should be 32 bytes.");
		let ciphertext = wechat_ciphertext();
		let truncated = &ciphertext[..ciphertext.len() - 1];

		assert!(matches!(
			decrypt_aes_256_gcm(&key, &nonce(), b"certificate", truncated),
			Err(DecryptError::Authentication)
		));
		assert!(matches!(
			decrypt_aes_256_gcm(&key, &nonce(), b"other", &ciphertext),
			Err(DecryptError::Authentication)
		));
		assert!(matches!(
			decrypt_aes_256_gcm(&key, &nonce(), b"certificate", &ciphertext[..8]),
			Err(DecryptError::Truncated)
		));
	}
}
