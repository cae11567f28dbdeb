//! Transport seam between the interceptor pipeline and a concrete HTTP stack.
//!
//! The pipeline only ever speaks [`HttpRequest`] / [`HttpResponse`] (the `http` crate's types
//! over fully buffered bodies). Response verification hashes the whole body, so transports must
//! buffer it before returning. Non-2xx responses are returned as values, never as errors.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{_prelude::*, error::TransportError};

/// Outbound request with a buffered body.
pub type HttpRequest = http::Request<Vec<u8>>;
/// Inbound response with a buffered body.
pub type HttpResponse = http::Response<Vec<u8>>;

/// Future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Object-safe async HTTP transport.
///
/// Implementations must be shareable across tasks (`Send + Sync + 'static`) so one transport
/// can back both the API pipeline and the certificate fetcher.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the buffered response, whatever its status.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).send(request)
	}
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
///
/// Signed requests must reach the endpoint they were signed for, so the client built by
/// [`ReqwestTransport::new`] never follows redirects. Custom clients passed to
/// [`ReqwestTransport::with_client`] should be configured the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client that never follows redirects and sends `user_agent`.
	pub fn new(user_agent: &str) -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().redirect(Policy::none()).user_agent(user_agent).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Underlying reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = client.execute(request).await?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();
			let mut buffered = HttpResponse::new(body);

			*buffered.status_mut() = status;
			*buffered.version_mut() = version;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::StatusCode;
	// self
	use super::*;

	struct Teapot;
	impl HttpTransport for Teapot {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			Box::pin(async move {
				let mut response = HttpResponse::new(request.into_body());

				*response.status_mut() = StatusCode::IM_A_TEAPOT;

				Ok(response)
			})
		}
	}

	#[tokio::test]
	async fn shared_transports_forward_to_the_inner_value() {
		let transport: Arc<dyn HttpTransport> = Arc::new(Teapot);
		let response = transport
			.send(HttpRequest::new(b"echo".to_vec()))
			.await
			.expect("Teapot transport should always answer.");

		assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
		assert_eq!(response.body(), b"echo");
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_transport_builds_without_redirects() {
		ReqwestTransport::new("wechatpay-v3-test").expect("Reqwest client should build.");
	}
}
