//! Default client headers for V3 calls.

// crates.io
use http::{
	HeaderValue,
	header::{ACCEPT, CONTENT_TYPE, USER_AGENT},
};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	pipeline::{InterceptFuture, Interceptor},
	transport::HttpRequest,
};

/// `Accept` value sent on every call.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, application/x-gzip";
/// `Content-Type` value sent with request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Fills in `Accept`, `User-Agent`, and (for non-empty bodies) `Content-Type`.
///
/// Headers already present on the request are left untouched.
#[derive(Clone, Debug)]
pub struct ClientHeaders {
	user_agent: HeaderValue,
}
impl ClientHeaders {
	/// Creates the interceptor with a validated `User-Agent`.
	pub fn new(user_agent: &str) -> Result<Self, ConfigError> {
		let user_agent = HeaderValue::from_str(user_agent)
			.map_err(|_| ConfigError::InvalidHeaderValue { name: "User-Agent" })?;

		Ok(Self { user_agent })
	}
}
impl Interceptor for ClientHeaders {
	fn on_request(&self, mut request: HttpRequest) -> InterceptFuture<'_, HttpRequest> {
		let has_body = !request.body().is_empty();
		let headers = request.headers_mut();

		headers.entry(ACCEPT).or_insert(HeaderValue::from_static(DEFAULT_ACCEPT));
		headers.entry(USER_AGENT).or_insert_with(|| self.user_agent.clone());

		if has_body {
			headers.entry(CONTENT_TYPE).or_insert(HeaderValue::from_static(JSON_CONTENT_TYPE));
		}

		Box::pin(std::future::ready(Ok(request)))
	}
}
