//! Redacted wrapper around the merchant's API v3 key.

// self
use crate::{_prelude::*, error::ConfigError};

/// Length of the API v3 key in bytes (AES-256).
pub const API_V3_KEY_LEN: usize = 32;

/// Symmetric key used to decrypt platform certificates; redacted in logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct ApiV3Key([u8; API_V3_KEY_LEN]);
impl ApiV3Key {
	/// Wraps a key after checking that it is exactly 32 bytes.
	pub fn new(value: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let bytes = value.as_ref();
		let key = <[u8; API_V3_KEY_LEN]>::try_from(bytes)
			.map_err(|_| ConfigError::InvalidApiV3Key { len: bytes.len() })?;

		Ok(Self(key))
	}

	/// Returns the raw key bytes. Callers must avoid logging them.
	pub fn expose(&self) -> &[u8; API_V3_KEY_LEN] {
		&self.0
	}
}
impl TryFrom<String> for ApiV3Key {
	type Error = ConfigError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for ApiV3Key {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ApiV3Key").field(&"<redacted>").finish()
	}
}
impl Display for ApiV3Key {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn key_formatters_redact() {
		let key = ApiV3Key::new("apiv320210817qwertyuiopasdfghjkl")
			.expect("Fixture key should be 32 bytes.");

		assert_eq!(format!("{key:?}"), "ApiV3Key(\"<redacted>\")");
		assert_eq!(format!("{key}"), "<redacted>");
	}

	#[test]
	fn key_length_is_enforced() {
		let err = ApiV3Key::new("too-short").expect_err("Short keys must be rejected.");

		assert!(matches!(err, ConfigError::InvalidApiV3Key { len: 9 }));
		assert!(ApiV3Key::new([0_u8; 33]).is_err());
		assert!(serde_json::from_str::<ApiV3Key>("\"0123456789abcdef0123456789ABCDEF\"").is_ok());
	}
}
