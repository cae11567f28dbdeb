//! High-level client: signed requests, verified responses, and certificate bootstrapping.

// crates.io
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
// self
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;
use crate::{
	_prelude::*,
	auth::SigningMaterial,
	cert::{
		CERTIFICATES_PATH, CertificateBundle, CertificateCache, CertificateFetcher,
		CertificateResolver, HttpCertificateFetcher, MemoryCertificateCache, ResolverMode,
	},
	config::MerchantConfig,
	error::ConfigError,
	ext::{Clock, NonceSource, RandomNonce, SystemClock},
	obs::{self, CallKind, CallOutcome, CallSpan},
	pipeline::{
		AUTHORIZE, CLIENT_HEADERS, ClientHeaders, LOG, LogInterceptor, Pipeline, RequestSigner,
		ResponseVerifier, VERIFY_SIGNATURE,
	},
	transport::{HttpResponse, HttpTransport},
};

/// Everything the client is assembled from; hooks swap one part and reassemble.
#[derive(Clone)]
struct Parts {
	config: MerchantConfig,
	transport: Arc<dyn HttpTransport>,
	material: Arc<SigningMaterial>,
	mode: ResolverMode,
	headers: Arc<ClientHeaders>,
	certificates_url: Url,
	cache: Arc<dyn CertificateCache>,
	clock: Arc<dyn Clock>,
	nonces: Arc<dyn NonceSource>,
}

/// WeChat Pay V3 client.
///
/// Every API call runs through the named pipeline `client_headers`, `authorize`,
/// `verify_signature`, `log`. The certificate-list call uses the same stages minus
/// `verify_signature`. The hooks [`Client::with_cache`], [`Client::with_clock`], and
/// [`Client::with_nonce_source`] rebuild both pipelines, so apply them before customizing
/// [`Client::pipeline_mut`].
#[derive(Clone)]
pub struct Client {
	parts: Parts,
	fetcher: Arc<HttpCertificateFetcher>,
	resolver: Arc<CertificateResolver>,
	pipeline: Pipeline,
}
impl Client {
	/// Creates a client backed by [`ReqwestTransport`].
	#[cfg(feature = "reqwest")]
	pub fn new(config: MerchantConfig) -> Result<Self> {
		let transport = ReqwestTransport::new(&config.user_agent)?;

		Self::with_transport(config, Arc::new(transport))
	}

	/// Creates a client over a caller-supplied transport.
	///
	/// Configuration problems (bad base URL, unreadable private key, malformed pinned
	/// certificate) surface here, before any network I/O.
	pub fn with_transport(
		config: MerchantConfig,
		transport: Arc<dyn HttpTransport>,
	) -> Result<Self> {
		config.validate()?;

		let material = Arc::new(config.signing_material()?);
		let mode = config.resolver_mode()?;
		let headers = Arc::new(ClientHeaders::new(&config.user_agent)?);
		let certificates_url = config.endpoint(CERTIFICATES_PATH)?;

		Ok(Self::assemble(Parts {
			config,
			transport,
			material,
			mode,
			headers,
			certificates_url,
			cache: Arc::new(MemoryCertificateCache::default()),
			clock: Arc::new(SystemClock),
			nonces: Arc::new(RandomNonce),
		}))
	}

	fn assemble(parts: Parts) -> Self {
		let signer = Arc::new(RequestSigner::new(
			parts.material.clone(),
			parts.clock.clone(),
			parts.nonces.clone(),
		));
		let bootstrap = Pipeline::new()
			.with(CLIENT_HEADERS, parts.headers.clone())
			.with(AUTHORIZE, signer.clone())
			.with(LOG, Arc::new(LogInterceptor));
		let fetcher = Arc::new(HttpCertificateFetcher::new(
			parts.transport.clone(),
			bootstrap,
			parts.certificates_url.clone(),
		));
		let resolver = Arc::new(CertificateResolver::new(
			parts.mode.clone(),
			parts.cache.clone(),
			fetcher.clone(),
			parts.config.api_v3_key.clone(),
			parts.clock.clone(),
		));
		let pipeline = Pipeline::new()
			.with(CLIENT_HEADERS, parts.headers.clone())
			.with(AUTHORIZE, signer)
			.with(VERIFY_SIGNATURE, Arc::new(ResponseVerifier::new(resolver.clone())))
			.with(LOG, Arc::new(LogInterceptor));

		Self { parts, fetcher, resolver, pipeline }
	}

	/// Replaces the platform certificate cache (e.g. to share one across clients).
	pub fn with_cache(self, cache: Arc<dyn CertificateCache>) -> Self {
		let mut parts = self.parts;

		parts.cache = cache;

		Self::assemble(parts)
	}

	/// Replaces the clock used for request timestamps and certificate expiry.
	pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
		let mut parts = self.parts;

		parts.clock = clock;

		Self::assemble(parts)
	}

	/// Replaces the request nonce generator.
	pub fn with_nonce_source(self, nonces: Arc<dyn NonceSource>) -> Self {
		let mut parts = self.parts;

		parts.nonces = nonces;

		Self::assemble(parts)
	}

	/// Validated configuration.
	pub fn config(&self) -> &MerchantConfig {
		&self.parts.config
	}

	/// Platform certificate resolver shared by the verifier.
	pub fn resolver(&self) -> &Arc<CertificateResolver> {
		&self.resolver
	}

	/// API pipeline.
	pub fn pipeline(&self) -> &Pipeline {
		&self.pipeline
	}

	/// Mutable API pipeline for adding, replacing, or reordering stages on this client.
	pub fn pipeline_mut(&mut self) -> &mut Pipeline {
		&mut self.pipeline
	}

	/// Certificate-list pipeline (no V3 verification).
	pub fn bootstrap_pipeline(&self) -> &Pipeline {
		self.fetcher.pipeline()
	}

	/// Sends a signed V3 request and returns the verified response.
	///
	/// `path` is resolved against the configured base URL and may carry a query string. JSON
	/// object bodies receive the configured `sub_mchid` / `sub_appid`. Non-2xx responses are
	/// still verified and returned as values.
	pub async fn request_v3(
		&self,
		method: Method,
		path: &str,
		body: Option<serde_json::Value>,
	) -> Result<VerifiedResponse> {
		let span = CallSpan::new(CallKind::Api, "request_v3");

		span.instrument(async move {
			obs::record_call_outcome(CallKind::Api, CallOutcome::Attempt);

			let result = self.send_v3(method, path, body).await;

			obs::record_call_outcome(CallKind::Api, CallOutcome::of(&result));

			result
		})
		.await
	}

	async fn send_v3(
		&self,
		method: Method,
		path: &str,
		body: Option<serde_json::Value>,
	) -> Result<VerifiedResponse> {
		let url = self.parts.config.endpoint(path)?;
		let body = match body {
			Some(value) => {
				let merged = self.parts.config.merge_service_provider_fields(value);

				serde_json::to_vec(&merged).map_err(|source| ConfigError::RequestBody { source })?
			},
			None => Vec::new(),
		};
		let request = http::Request::builder()
			.method(method)
			.uri(url.as_str())
			.body(body)
			.map_err(ConfigError::from)?;
		let response = self.pipeline.execute(self.parts.transport.as_ref(), request).await?;

		Ok(VerifiedResponse(response))
	}

	/// `GET` shorthand for [`Client::request_v3`].
	pub async fn get_v3(&self, path: &str) -> Result<VerifiedResponse> {
		self.request_v3(Method::GET, path, None).await
	}

	/// `POST` shorthand for [`Client::request_v3`].
	pub async fn post_v3(&self, path: &str, body: serde_json::Value) -> Result<VerifiedResponse> {
		self.request_v3(Method::POST, path, Some(body)).await
	}

	/// Downloads the encrypted certificate bundle through the bootstrap pipeline.
	pub async fn request_certificates(&self) -> Result<CertificateBundle> {
		self.fetcher.fetch().await
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("config", &self.parts.config)
			.field("pipeline", &self.pipeline)
			.field("resolver", &self.resolver)
			.finish_non_exhaustive()
	}
}

/// Response whose signature has been verified (unless the caller removed `verify_signature`).
#[derive(Debug)]
pub struct VerifiedResponse(HttpResponse);
impl VerifiedResponse {
	/// HTTP status.
	pub fn status(&self) -> StatusCode {
		self.0.status()
	}

	/// Response headers.
	pub fn headers(&self) -> &HeaderMap {
		self.0.headers()
	}

	/// Raw body bytes, exactly as verified.
	pub fn body(&self) -> &[u8] {
		self.0.body()
	}

	/// Decodes the body as JSON into `T`, reporting the path of any mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(self.0.body());

		serde_path_to_error::deserialize(&mut de).map_err(|source| Error::ResponseDecode { source })
	}

	/// Unwraps the underlying response.
	pub fn into_inner(self) -> HttpResponse {
		self.0
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::{HeaderValue, header::AUTHORIZATION};
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::*,
		canonical::CanonicalRequest,
		cert::PlatformCertificate,
		error::CertificateError,
		transport::{HttpRequest, TransportFuture},
	};

	// Answers the certificate endpoint with the platform bundle and every other path with a
	// platform-signed body, recording each request.
	#[derive(Default)]
	struct Platform {
		requests: Mutex<Vec<HttpRequest>>,
		signature: Option<&'static str>,
	}
	impl HttpTransport for Platform {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			let is_certificates = request.uri().path() == "/v3/certificates";

			self.requests.lock().push(request);

			let mut response = if is_certificates {
				HttpResponse::new(PLATFORM_CERTIFICATES_JSON.as_bytes().to_vec())
			} else {
				let mut response = HttpResponse::new(PLATFORM_BODY.as_bytes().to_vec());
				let headers = response.headers_mut();

				headers.insert("wechatpay-serial", HeaderValue::from_static(PLATFORM_SERIAL));
				headers.insert(
					"wechatpay-timestamp",
					HeaderValue::from_str(&FIXTURE_TIMESTAMP.to_string())
						.expect("Timestamp is a valid header."),
				);
				headers.insert("wechatpay-nonce", HeaderValue::from_static(PLATFORM_NONCE));
				headers.insert(
					"wechatpay-signature",
					HeaderValue::from_static(self.signature.unwrap_or(PLATFORM_SIGNATURE)),
				);

				response
			};

			*response.status_mut() = StatusCode::OK;

			Box::pin(async move { Ok(response) })
		}
	}

	fn client(transport: Arc<Platform>) -> Client {
		Client::with_transport(test_config("https://api.mch.weixin.qq.com/"), transport)
			.expect("Client should build.")
			.with_clock(fixture_clock())
			.with_nonce_source(fixture_nonce())
	}

	#[test]
	fn default_pipelines_are_named_in_order() {
		let client = client(Arc::default());

		assert_eq!(client.pipeline().names(), [CLIENT_HEADERS, AUTHORIZE, VERIFY_SIGNATURE, LOG]);
		assert_eq!(client.bootstrap_pipeline().names(), [CLIENT_HEADERS, AUTHORIZE, LOG]);
	}

	#[tokio::test]
	async fn first_call_bootstraps_certificates_then_verifies() {
		let transport = Arc::new(Platform::default());
		let client = client(transport.clone());
		let response = client
			.post_v3("/v3/pay/transactions/native", json!({ "appid": "wx123456", "attach": "" }))
			.await
			.expect("Platform-signed response should verify.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.body(), PLATFORM_BODY.as_bytes());
		assert_eq!(
			response.json::<serde_json::Value>().expect("Body is JSON."),
			json!({ "code": "SUCCESS" })
		);

		client.get_v3("/v3/pay/transactions/id/1").await.expect("Second call should verify.");

		let requests = transport.requests.lock();
		let paths = requests.iter().map(|r| r.uri().path().to_owned()).collect::<Vec<_>>();

		assert_eq!(paths, [
			"/v3/pay/transactions/native",
			"/v3/certificates",
			"/v3/pay/transactions/id/1"
		]);
		assert_eq!(client.resolver().metrics().fetches(), 1);

		let post = &requests[0];
		let merchant = PlatformCertificate::from_pem(MERCHANT_PUBLIC_PEM)
			.expect("Merchant public key fixture should parse.");
		let canonical = CanonicalRequest {
			method: "POST",
			request_target: "/v3/pay/transactions/native",
			timestamp: "1629874820",
			nonce: FIXTURE_NONCE,
			body: post.body(),
		};
		let header = post.headers()[AUTHORIZATION].to_str().expect("Header is ASCII.");
		let signature = header
			.rsplit_once("signature=\"")
			.and_then(|(_, rest)| rest.strip_suffix('"'))
			.expect("Header ends with the signature.");

		assert_eq!(post.body(), br#"{"appid":"wx123456"}"#);
		assert!(merchant.verify(&canonical.to_bytes(), signature));
	}

	#[tokio::test]
	async fn tampered_signatures_are_rejected() {
		let transport =
			Arc::new(Platform { signature: Some(WECHAT_SIGNATURE), ..Default::default() });
		let err = client(transport)
			.get_v3("/v3/pay/transactions/id/1")
			.await
			.expect_err("Signature from another key must be rejected.");

		assert!(matches!(
			err,
			Error::UntrustedSignature { ref serial } if serial == PLATFORM_SERIAL
		));
	}

	#[tokio::test]
	async fn removing_verification_skips_certificate_fetch() {
		let transport = Arc::new(Platform::default());
		let mut client = client(transport.clone());

		assert!(client.pipeline_mut().remove(VERIFY_SIGNATURE).is_some());

		client.get_v3("/v3/merchant/fund/balance/BASIC").await.expect("Unverified call succeeds.");

		assert_eq!(transport.requests.lock().len(), 1);
	}

	#[tokio::test]
	async fn request_certificates_is_signed_but_not_verified() {
		let transport = Arc::new(Platform::default());
		let bundle = client(transport.clone())
			.request_certificates()
			.await
			.expect("Bundle should download.");

		assert_eq!(bundle.data[0].serial_no.as_ref(), PLATFORM_SERIAL);
		assert!(transport.requests.lock()[0].headers().contains_key(AUTHORIZATION));
	}

	#[test]
	fn malformed_pinned_certificate_fails_at_construction() {
		let mut config = test_config("https://api.mch.weixin.qq.com/");

		config.pinned_certificate = Some("not a pem".into());

		let err = Client::with_transport(config, Arc::new(Platform::default()))
			.expect_err("Broken pinned certificate must be rejected.");

		assert!(matches!(err, Error::Certificate(CertificateError::InvalidPem { .. })));
	}
}
