//! Outbound request signing.

// crates.io
use http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::SigningMaterial,
	canonical::CanonicalRequest,
	error::ConfigError,
	ext::{Clock, NonceSource},
	pipeline::{InterceptFuture, Interceptor},
	transport::HttpRequest,
};

/// Signs each request and sets its `Authorization` header.
///
/// Only the request's headers are touched. A signing failure aborts the call, so nothing is
/// ever sent unsigned.
#[derive(Clone)]
pub struct RequestSigner {
	material: Arc<SigningMaterial>,
	clock: Arc<dyn Clock>,
	nonces: Arc<dyn NonceSource>,
}
impl RequestSigner {
	/// Creates a signer with injected time and nonce sources.
	pub fn new(
		material: Arc<SigningMaterial>,
		clock: Arc<dyn Clock>,
		nonces: Arc<dyn NonceSource>,
	) -> Self {
		Self { material, clock, nonces }
	}

	/// Merchant material used for signing.
	pub fn material(&self) -> &SigningMaterial {
		&self.material
	}

	/// Computes the `Authorization` value for `request` without modifying it.
	pub fn authorization(&self, request: &HttpRequest) -> Result<HeaderValue, ConfigError> {
		let timestamp = self.clock.unix_timestamp();
		let timestamp_text = timestamp.to_string();
		let nonce = self.nonces.next_nonce();
		let canonical = CanonicalRequest {
			method: request.method().as_str(),
			request_target: request_target(request),
			timestamp: &timestamp_text,
			nonce: &nonce,
			body: request.body(),
		};
		let token = self.material.sign(&canonical, timestamp)?;

		HeaderValue::from_str(&token.to_string())
			.map_err(|_| ConfigError::InvalidHeaderValue { name: "Authorization" })
	}
}
impl Debug for RequestSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestSigner").field("material", &self.material).finish_non_exhaustive()
	}
}
impl Interceptor for RequestSigner {
	fn on_request(&self, mut request: HttpRequest) -> InterceptFuture<'_, HttpRequest> {
		let signed = self.authorization(&request).map(|value| {
			request.headers_mut().insert(AUTHORIZATION, value);

			request
		});

		Box::pin(std::future::ready(signed.map_err(Error::from)))
	}
}

/// `path?query` of the request URI; `/` when the URI carries no path.
pub fn request_target(request: &HttpRequest) -> &str {
	request.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}
