//! Client-level error types shared across signing, certificate resolution, and verification.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Every variant is terminal for the call that produced it; nothing is retried internally and
/// no variant degrades into an unsigned or unverified mode.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem (keys, identifiers, endpoints).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Platform certificate could not be resolved.
	#[error(transparent)]
	Certificate(#[from] CertificateError),
	/// AES-GCM authentication failed while decrypting a certificate.
	#[error(transparent)]
	Decrypt(#[from] DecryptError),

	/// Response lacks one of the required signature headers.
	#[error("The response doesn't contain signature data: missing `{header}` header.")]
	MalformedResponse {
		/// Name of the first missing header.
		header: &'static str,
	},
	/// Verified response body does not match the requested type.
	#[error("Response body could not be decoded.")]
	ResponseDecode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Response signature did not verify against the resolved platform certificate.
	#[error("Response signature is invalid for platform certificate `{serial}`.")]
	UntrustedSignature {
		/// Serial number of the certificate used for verification, or `pinned`.
		serial: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// A header value contains bytes that HTTP forbids.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeaderValue {
		/// Header name.
		name: &'static str,
	},
	/// Base URL cannot be parsed or joined with an API path.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL does not use HTTPS.
	#[error("Base URL must use HTTPS: {url}.")]
	InsecureBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Identifier validation failed.
	#[error("Configured identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Required configuration field was not supplied.
	#[error("Missing required configuration field `{field}`.")]
	MissingField {
		/// Field name.
		field: &'static str,
	},
	/// Private key file could not be read.
	#[error("Private key file `{path}` could not be read.")]
	ReadPrivateKey {
		/// Path that failed.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Private key PEM is neither PKCS#8 nor PKCS#1 RSA.
	#[error("Private key is not a valid RSA PEM: {reason}.")]
	InvalidPrivateKey {
		/// Parser diagnostics.
		reason: String,
	},
	/// API v3 key must be exactly 32 bytes.
	#[error("API v3 key must be exactly 32 bytes, got {len}.")]
	InvalidApiV3Key {
		/// Observed length in bytes.
		len: usize,
	},
	/// JSON request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody {
		/// Serializer failure.
		#[source]
		source: serde_json::Error,
	},
	/// RSA signing failed.
	#[error("Signing the request failed.")]
	Signing(#[source] rsa::signature::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Platform certificate resolution failures.
#[derive(Debug, ThisError)]
pub enum CertificateError {
	/// No resource in the fetched bundle carries the requested serial number.
	#[error("Can not find the platform certificate with serial number `{serial}`.")]
	NotFound {
		/// Requested serial number.
		serial: String,
	},
	/// Resolver is in by-serial mode but the response omitted `Wechatpay-Serial`.
	#[error("A serial number is required to select a platform certificate.")]
	SerialRequired,
	/// Ciphertext decoded to nothing usable (empty or shorter than the GCM tag).
	#[error("Certificate `{serial}` has an empty ciphertext.")]
	EmptyCiphertext {
		/// Serial number of the resource.
		serial: String,
	},
	/// Ciphertext is not valid base64.
	#[error("Certificate `{serial}` has a malformed ciphertext.")]
	MalformedCiphertext {
		/// Serial number of the resource.
		serial: String,
		/// Base64 failure.
		#[source]
		source: base64::DecodeError,
	},
	/// Resource declares an algorithm other than `AEAD_AES_256_GCM`.
	#[error("Certificate `{serial}` uses unsupported algorithm `{algorithm}`.")]
	UnsupportedAlgorithm {
		/// Serial number of the resource.
		serial: String,
		/// Declared algorithm.
		algorithm: String,
	},
	/// Resource nonce is not a 12-byte GCM IV.
	#[error("Certificate `{serial}` nonce must be 12 bytes, got {len}.")]
	InvalidNonce {
		/// Serial number of the resource.
		serial: String,
		/// Observed nonce length.
		len: usize,
	},
	/// Decrypted or configured PEM cannot be parsed into an RSA public key.
	#[error("Platform certificate PEM is invalid: {reason}.")]
	InvalidPem {
		/// Parser diagnostics.
		reason: String,
	},
	/// The decrypted X.509 certificate carries a different serial than its resource.
	#[error("Certificate serial `{actual}` does not match the declared serial `{expected}`.")]
	SerialMismatch {
		/// Serial declared by the bundle or response.
		expected: String,
		/// Serial embedded in the certificate.
		actual: String,
	},
	/// The platform served a certificate whose validity already ended.
	#[error("Platform certificate `{serial}` expired at {expires_at}.")]
	Expired {
		/// Serial number of the certificate.
		serial: String,
		/// Instant the certificate stopped being valid.
		expires_at: OffsetDateTime,
	},
	/// Certificate-list endpoint answered with a non-success status.
	#[error("Certificate endpoint returned HTTP {status}.")]
	FetchStatus {
		/// HTTP status code.
		status: u16,
	},
	/// Certificate-list response could not be parsed.
	#[error("Certificate endpoint returned malformed JSON.")]
	BundleParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// AES-256-GCM failures.
#[derive(Debug, ThisError)]
pub enum DecryptError {
	/// The authentication tag did not match; no plaintext is released.
	#[error("The given payload is invalid.")]
	Authentication,
	/// Input is shorter than the 16-byte authentication tag.
	#[error("Ciphertext is shorter than the authentication tag.")]
	Truncated,
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn certificate_error_converts_with_source() {
		let err: Error = CertificateError::NotFound { serial: "ABC".into() }.into();

		assert!(matches!(err, Error::Certificate(CertificateError::NotFound { .. })));
		assert_eq!(
			err.to_string(),
			"Can not find the platform certificate with serial number `ABC`."
		);
	}

	#[test]
	fn malformed_response_names_the_header() {
		let err = Error::MalformedResponse { header: "Wechatpay-Nonce" };

		assert!(err.to_string().contains("Wechatpay-Nonce"));
		assert!(StdError::source(&err).is_none());
	}

	#[test]
	fn decrypt_error_is_distinct_from_signature_error() {
		let err: Error = DecryptError::Authentication.into();

		assert!(matches!(err, Error::Decrypt(DecryptError::Authentication)));
		assert!(!matches!(err, Error::UntrustedSignature { .. }));
	}
}
