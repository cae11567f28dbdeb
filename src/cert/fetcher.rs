//! Retrieval of the encrypted certificate bundle.

// self
use crate::{
	_prelude::*,
	cert::CertificateBundle,
	error::{CertificateError, ConfigError},
	obs::{self, CallKind, CallOutcome, CallSpan},
	pipeline::Pipeline,
	transport::{HttpRequest, HttpTransport},
};

/// Path of the certificate-list endpoint, relative to the API base URL.
pub const CERTIFICATES_PATH: &str = "v3/certificates";

/// Future returned by [`CertificateFetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<CertificateBundle>> + 'a + Send>>;

/// Source of the encrypted platform certificate bundle.
pub trait CertificateFetcher
where
	Self: Send + Sync,
{
	/// Downloads the current bundle.
	fn fetch(&self) -> FetchFuture<'_>;
}

/// Fetches `GET /v3/certificates` through the bootstrap pipeline.
///
/// The bootstrap pipeline signs the request but cannot verify the answer with V3 signatures
/// (that would require the certificates being fetched); trust comes from the TLS transport and
/// from the AES-GCM tag on every resource.
pub struct HttpCertificateFetcher {
	transport: Arc<dyn HttpTransport>,
	pipeline: Pipeline,
	endpoint: Url,
}
impl HttpCertificateFetcher {
	/// Creates a fetcher for an absolute certificate-list URL.
	pub fn new(transport: Arc<dyn HttpTransport>, pipeline: Pipeline, endpoint: Url) -> Self {
		Self { transport, pipeline, endpoint }
	}

	/// Creates a fetcher for `base_url` + [`CERTIFICATES_PATH`].
	pub fn for_base_url(
		transport: Arc<dyn HttpTransport>,
		pipeline: Pipeline,
		base_url: &Url,
	) -> Result<Self, ConfigError> {
		let endpoint = base_url
			.join(CERTIFICATES_PATH)
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(Self::new(transport, pipeline, endpoint))
	}

	/// Absolute certificate-list URL.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Bootstrap pipeline used for the fetch.
	pub fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	/// Sends the signed request and parses the bundle; non-2xx answers are
	/// [`CertificateError::FetchStatus`].
	pub async fn fetch_bundle(&self) -> Result<CertificateBundle> {
		let request: HttpRequest = http::Request::get(self.endpoint.as_str())
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let response = self.pipeline.execute(self.transport.as_ref(), request).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(CertificateError::FetchStatus { status: status.as_u16() }.into());
		}

		Ok(CertificateBundle::from_slice(response.body())?)
	}
}
impl Debug for HttpCertificateFetcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpCertificateFetcher")
			.field("endpoint", &self.endpoint.as_str())
			.field("pipeline", &self.pipeline)
			.finish_non_exhaustive()
	}
}
impl CertificateFetcher for HttpCertificateFetcher {
	fn fetch(&self) -> FetchFuture<'_> {
		let span = CallSpan::new(CallKind::Certificates, "fetch");

		Box::pin(span.instrument(async move {
			obs::record_call_outcome(CallKind::Certificates, CallOutcome::Attempt);

			let result = self.fetch_bundle().await;

			obs::record_call_outcome(CallKind::Certificates, CallOutcome::of(&result));

			result
		}))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::StatusCode;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		transport::{HttpResponse, TransportFuture},
	};

	struct Canned {
		status: StatusCode,
		body: &'static str,
		seen: Mutex<Vec<String>>,
	}
	impl HttpTransport for Canned {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.seen.lock().push(request.uri().to_string());

			let mut response = HttpResponse::new(self.body.as_bytes().to_vec());

			*response.status_mut() = self.status;

			Box::pin(async move { Ok(response) })
		}
	}

	fn canned(status: StatusCode, body: &'static str) -> (Arc<Canned>, HttpCertificateFetcher) {
		let transport = Arc::new(Canned { status, body, seen: Mutex::new(Vec::new()) });
		let base = Url::parse("https://api.mch.weixin.qq.com/").expect("Base URL should parse.");
		let fetcher =
			HttpCertificateFetcher::for_base_url(transport.clone(), Pipeline::new(), &base)
				.expect("Fetcher should build.");

		(transport, fetcher)
	}

	#[tokio::test]
	async fn fetches_and_parses_the_bundle() {
		let (transport, fetcher) = canned(StatusCode::OK, PLATFORM_CERTIFICATES_JSON);
		let bundle = fetcher.fetch().await.expect("Bundle should parse.");

		assert_eq!(bundle.data.len(), 1);
		assert_eq!(*transport.seen.lock(), ["https://api.mch.weixin.qq.com/v3/certificates"]);
	}

	#[tokio::test]
	async fn non_success_statuses_are_fetch_errors() {
		let (_, fetcher) = canned(StatusCode::UNAUTHORIZED, r#"{"code":"SIGN_ERROR"}"#);
		let err = fetcher.fetch().await.expect_err("401 must fail the fetch.");

		assert!(matches!(err, Error::Certificate(CertificateError::FetchStatus { status: 401 })));

		let (_, fetcher) = canned(StatusCode::OK, "<html>");
		let err = fetcher.fetch().await.expect_err("Garbage must fail to parse.");

		assert!(matches!(err, Error::Certificate(CertificateError::BundleParse { .. })));
	}
}
