//! Debug logging of requests and responses.

// self
use crate::{
	_prelude::*,
	pipeline::{InterceptFuture, Interceptor},
	transport::{HttpRequest, HttpResponse},
};

/// Emits `debug` events for each request line and response status (feature `tracing`).
///
/// Bodies and the `Authorization` header are never logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogInterceptor;
impl Interceptor for LogInterceptor {
	fn on_request(&self, request: HttpRequest) -> InterceptFuture<'_, HttpRequest> {
		#[cfg(feature = "tracing")]
		tracing::debug!(
			method = %request.method(),
			target = request.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
			body_len = request.body().len(),
			"Sending request."
		);

		Box::pin(std::future::ready(Ok(request)))
	}

	fn on_response(&self, response: HttpResponse) -> InterceptFuture<'_, HttpResponse> {
		#[cfg(feature = "tracing")]
		tracing::debug!(
			status = response.status().as_u16(),
			serial = response
				.headers()
				.get(crate::pipeline::WECHATPAY_SERIAL)
				.and_then(|value| value.to_str().ok())
				.unwrap_or_default(),
			body_len = response.body().len(),
			"Received response."
		);

		Box::pin(std::future::ready(Ok(response)))
	}
}
