//! WeChat Pay API v3 authentication: canonical signing strings, merchant request signing,
//! encrypted platform certificate resolution, and response signature verification wired
//! together as an interceptor pipeline around any HTTP transport.

#![deny(clippy::all, missing_docs)]
#![cfg_attr(not(test), deny(unused_crate_dependencies))]

pub mod auth;
pub mod canonical;
pub mod cert;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ext;
pub mod obs;
pub mod pipeline;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports, fixtures, and helpers for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		auth::{ApiV3Key, MerchantId, SerialNumber, SigningMaterial},
		cert::{CertificateBundle, CertificateFetcher, FetchFuture},
		config::MerchantConfig,
		ext::{FixedClock, FixedNonce},
	};

	/// Merchant identifier used across fixtures.
	pub const MERCHANT_ID: &str = "1900000109";
	/// Serial number of the merchant's own certificate used across fixtures.
	pub const MERCHANT_SERIAL: &str = "3775B6A45ACD588826D15E583A95F5DD12345678";
	/// API v3 key that encrypts `platform-certificates.json`.
	pub const API_V3_KEY: &str = "0123456789abcdef0123456789ABCDEF";
	/// Serial number of the self-signed platform certificate fixture.
	pub const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
	/// API v3 key that encrypts the WeChat Pay sample bundle in `v3-certificates.json`.
	pub const WECHAT_API_V3_KEY: &str = "apiv320210817qwertyuiopasdfghjkl";
	/// Serial number of the WeChat Pay sample certificate.
	pub const WECHAT_SERIAL: &str = "384AA39043F718B081647ECE653266EE2484450B";
	/// Timestamp shared by every signed fixture.
	pub const FIXTURE_TIMESTAMP: i64 = 1_629_874_820;
	/// Nonce shared by the merchant-side fixtures.
	pub const FIXTURE_NONCE: &str = "88f7b2d9e69126b70467c29b5408736f";

	/// Merchant PKCS#8 private key.
	pub const MERCHANT_KEY_PEM: &str = include_str!("../tests/fixtures/merchant-key.pem");
	/// Same merchant key in PKCS#1 form.
	pub const MERCHANT_KEY_PKCS1_PEM: &str =
		include_str!("../tests/fixtures/merchant-key-pkcs1.pem");
	/// Merchant public key (SPKI).
	pub const MERCHANT_PUBLIC_PEM: &str = include_str!("../tests/fixtures/merchant-public.pem");
	/// Self-signed platform certificate whose private key signed the platform fixtures.
	pub const PLATFORM_CERTIFICATE_PEM: &str =
		include_str!("../tests/fixtures/platform-certificate.pem");
	/// Encrypted bundle carrying [`PLATFORM_CERTIFICATE_PEM`].
	pub const PLATFORM_CERTIFICATES_JSON: &str =
		include_str!("../tests/fixtures/platform-certificates.json");
	/// Certificate unrelated to any fixture signature.
	pub const UNRELATED_CERTIFICATE_PEM: &str =
		include_str!("../tests/fixtures/unrelated-certificate.pem");
	/// WeChat Pay sample platform certificate (decrypted).
	pub const WECHAT_CERTIFICATE_PEM: &str = include_str!("../tests/fixtures/v3-certificate.pem");
	/// WeChat Pay sample encrypted bundle.
	pub const WECHAT_CERTIFICATES_JSON: &str =
		include_str!("../tests/fixtures/v3-certificates.json");

	/// Body signed by [`WECHAT_SIGNATURE`].
	pub const WECHAT_BODY: &str = r#"{"code":"NO_AUTH","message":"无分账权限"}"#;
	/// Signature produced by the WeChat Pay platform for [`WECHAT_BODY`].
	pub const WECHAT_SIGNATURE: &str = "MpKYv9XkD2zgqkqMgxH7cpDHkNOzC+JEYdom6b6XRxZmdkGArxUzxoPCmfnhjFuyKRjub4nkUDsfqasuJJpkVF0yYbj8avhb0lapOvSrqVcLCQbT2NCxxJk3l/ceUfaQKSokbBBYIfrXMYzcdmXzy1iq0zRQaggCjutSqZ4RxtMdwt2DtQY08CAdiFDgfpvNkFgul8/LHGOMdsaLeBeEQVTTJNewtPwPSfjQvxCwMSlSfuik8ulK2qak+5/BMgc6agXrCTt2RteK7lQbhQ4EO5snLyirmO3JI5zCqa4Hp/CXuHQBGWnTkc73qauZCXM3hDZhNsS7yeHYd42TFVzlUA==";
	/// Nonce of the platform fixture responses.
	pub const PLATFORM_NONCE: &str = "fd7a4b0c2e1d4f5aa8b3c9d0e1f2a3b4";
	/// Body signed by [`PLATFORM_SIGNATURE`].
	pub const PLATFORM_BODY: &str = r#"{"code":"SUCCESS"}"#;
	/// Platform signature over [`FIXTURE_TIMESTAMP`], [`PLATFORM_NONCE`], and [`PLATFORM_BODY`].
	pub const PLATFORM_SIGNATURE: &str = "EnOZMRoDIwljdmjwoozdocvzXMzNnNpnvdfaN9B8weRYf4oCRv7B6QsBl6QjTJzBXIZhUPuzHEbkjfw3o+rM2XAU7ghrkyBiG6f1h/ChAfohYthliIcdXEqom+MhQz945sQ4MOsS4HGMAnqz/qoRsFkqDm6Ug1fo25sZOVVSl/sKDO+6y79aYTW72LBkvI+v4SjKggFMkNKp7MDPyjKL9bqvsVuqWbdDnUCNltrSAAfpa1hpdZKYbeWF6E7/l4vJea/7rjNSJEEVQUvs5/iuDGviQH8OLeBbvlhdkiEocd3lKjJ5r8hfKqbD49EsjiMDKwdGK5lhHGlVHGTaqz6HRQ==";
	/// Merchant signature over `GET /v3/certificates` at the fixture timestamp and nonce.
	pub const MERCHANT_GET_SIGNATURE: &str = "Ji+sBOaTg1Z0Gdp74VdvGOS0piIDHwZCj70Ra9Hd86RzE4Zg6GfHLGls1/PN84tY+S6CvYnanS0fN5Q3B6Tr48CWq8gwwV20HQEdl3/wx37rFAgEyvuSkDdcQbC4KV3aImtvZde1LbgMwMT/8Nd5uTXgH6TDVtzME/bg4rV+FYQ7yvuUZC02NfQGdCnhGRqancKbYt07KIhxoaATBGA1FSGqZzVGtisRceR/gUj0bhMAFuo0hqtkot/hHXaIBlbfL9Ka4yCuIOdUc0TeWUEdhoYjgMgEPikYak0tdEAXatZOIWO0PyqD3tTdKwIMH0gu60IYBHId4Idabddxmt9SXQ==";

	/// Clock frozen at [`FIXTURE_TIMESTAMP`].
	pub fn fixture_clock() -> Arc<FixedClock> {
		Arc::new(
			FixedClock::from_unix(FIXTURE_TIMESTAMP).expect("Fixture timestamp should be valid."),
		)
	}

	/// Nonce source that always yields [`FIXTURE_NONCE`].
	pub fn fixture_nonce() -> Arc<FixedNonce> {
		Arc::new(FixedNonce::new(FIXTURE_NONCE))
	}

	/// Signing material built from the merchant fixtures.
	pub fn merchant_material() -> SigningMaterial {
		SigningMaterial::from_pem(
			MerchantId::new(MERCHANT_ID).expect("Merchant fixture should be valid."),
			SerialNumber::new(MERCHANT_SERIAL).expect("Serial fixture should be valid."),
			MERCHANT_KEY_PEM,
		)
		.expect("Merchant key fixture should parse.")
	}

	/// API v3 key matching [`PLATFORM_CERTIFICATES_JSON`].
	pub fn api_v3_key() -> ApiV3Key {
		ApiV3Key::new(API_V3_KEY).expect("API v3 key fixture should be 32 bytes.")
	}

	/// Parses one of the bundle fixtures.
	pub fn bundle(json: &str) -> CertificateBundle {
		CertificateBundle::from_slice(json.as_bytes()).expect("Bundle fixture should parse.")
	}

	/// Merchant configuration pointing at `base_url` with the fixture credentials.
	pub fn test_config(base_url: &str) -> MerchantConfig {
		MerchantConfig::builder()
			.merchant_id(MERCHANT_ID)
			.serial_no(MERCHANT_SERIAL)
			.private_key_pem(MERCHANT_KEY_PEM)
			.api_v3_key(API_V3_KEY)
			.base_url(Url::parse(base_url).expect("Base URL fixture should parse."))
			.build()
			.expect("Merchant configuration fixture should build.")
	}

	/// [`CertificateFetcher`] that serves a static bundle and counts how often it was asked.
	#[derive(Debug)]
	pub struct CountingFetcher {
		bundle: CertificateBundle,
		calls: AtomicUsize,
	}
	impl CountingFetcher {
		/// Serves `json` on every fetch.
		pub fn new(json: &str) -> Self {
			Self { bundle: bundle(json), calls: AtomicUsize::new(0) }
		}

		/// Number of fetches performed so far.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl CertificateFetcher for CountingFetcher {
		fn fetch(&self) -> FetchFuture<'_> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let bundle = self.bundle.clone();

			Box::pin(async move { Ok(bundle) })
		}
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport() -> crate::transport::ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		crate::transport::ReqwestTransport::with_client(client)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
