//! Runs the full V3 pipeline against an in-process transport instead of reqwest.
//!
//! 1. Implement [`HttpTransport`] for any HTTP stack (here, a canned platform).
//! 2. Hand it to [`Client::with_transport`].
//! 3. Splice a custom [`Interceptor`] into the named pipeline.
//! 4. Observe that a forged response is rejected with [`Error::UntrustedSignature`].

// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
// self
use wechatpay_v3::{
	client::Client,
	config::MerchantConfig,
	error::{Error, TransportError},
	ext::{FixedClock, FixedNonce},
	http::{HeaderValue, StatusCode},
	pipeline::{AUTHORIZE, InterceptFuture, Interceptor},
	transport::{HttpRequest, HttpResponse, HttpTransport, TransportFuture},
	url::Url,
};

const MERCHANT_KEY_PEM: &str = include_str!("../tests/fixtures/merchant-key.pem");
const PLATFORM_CERTIFICATES_JSON: &str = include_str!("../tests/fixtures/platform-certificates.json");
const PLATFORM_SERIAL: &str = "5157F09EFDC096DE15EBE81A47057A7232F1B8E1";
const PLATFORM_NONCE: &str = "fd7a4b0c2e1d4f5aa8b3c9d0e1f2a3b4";
const PLATFORM_BODY: &str = r#"{"code":"SUCCESS"}"#;
const PLATFORM_SIGNATURE: &str = "EnOZMRoDIwljdmjwoozdocvzXMzNnNpnvdfaN9B8weRYf4oCRv7B6QsBl6QjTJzBXIZhUPuzHEbkjfw3o+rM2XAU7ghrkyBiG6f1h/ChAfohYthliIcdXEqom+MhQz945sQ4MOsS4HGMAnqz/qoRsFkqDm6Ug1fo25sZOVVSl/sKDO+6y79aYTW72LBkvI+v4SjKggFMkNKp7MDPyjKL9bqvsVuqWbdDnUCNltrSAAfpa1hpdZKYbeWF6E7/l4vJea/7rjNSJEEVQUvs5/iuDGviQH8OLeBbvlhdkiEocd3lKjJ5r8hfKqbD49EsjiMDKwdGK5lhHGlVHGTaqz6HRQ==";
const TIMESTAMP: i64 = 1_629_874_820;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = MerchantConfig::builder()
		.merchant_id("1900000109")
		.serial_no("3775B6A45ACD588826D15E583A95F5DD12345678")
		.private_key_pem(MERCHANT_KEY_PEM)
		.api_v3_key("0123456789abcdef0123456789ABCDEF")
		.base_url(Url::parse("https://api.mch.weixin.qq.com/")?)
		.build()?;
	let platform = Arc::new(CannedPlatform::default());
	let counter = Arc::new(CountSigned::default());
	let mut client = Client::with_transport(config, platform.clone())?
		.with_clock(Arc::new(FixedClock::from_unix(TIMESTAMP)?))
		.with_nonce_source(Arc::new(FixedNonce::new("88f7b2d9e69126b70467c29b5408736f")));

	client.pipeline_mut().insert_after(AUTHORIZE, "count_signed", counter.clone());

	println!("Pipeline: {:?}.", client.pipeline().names());

	let response = client.get_v3("/v3/pay/transactions/id/4200000001").await?;

	println!("Verified {} response: {}.", response.status(), String::from_utf8_lossy(response.body()));

	platform.forge.store(true, Ordering::SeqCst);

	match client.get_v3("/v3/pay/transactions/id/4200000001").await {
		Err(Error::UntrustedSignature { serial }) =>
			println!("Forged response rejected (certificate {serial})."),
		other => println!("Unexpected outcome: {other:?}."),
	}

	println!("Signed requests observed by the custom interceptor: {}.", counter.0.load(Ordering::SeqCst));

	Ok(())
}

#[derive(Default)]
struct CannedPlatform {
	forge: AtomicBool,
}
impl HttpTransport for CannedPlatform {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		let forged = self.forge.load(Ordering::SeqCst);

		Box::pin(async move {
			if request.uri().path() == "/v3/certificates" {
				return Ok(HttpResponse::new(PLATFORM_CERTIFICATES_JSON.as_bytes().to_vec()));
			}

			let body = if forged { r#"{"code":"FORGED"}"# } else { PLATFORM_BODY };
			let mut response = HttpResponse::new(body.as_bytes().to_vec());
			let headers = response.headers_mut();

			headers.insert("wechatpay-serial", HeaderValue::from_static(PLATFORM_SERIAL));
			headers.insert("wechatpay-timestamp", header(&TIMESTAMP.to_string())?);
			headers.insert("wechatpay-nonce", HeaderValue::from_static(PLATFORM_NONCE));
			headers.insert("wechatpay-signature", HeaderValue::from_static(PLATFORM_SIGNATURE));

			*response.status_mut() = StatusCode::OK;

			Ok(response)
		})
	}
}

fn header(value: &str) -> Result<HeaderValue, TransportError> {
	HeaderValue::from_str(value).map_err(TransportError::network)
}

#[derive(Default)]
struct CountSigned(AtomicUsize);
impl Interceptor for CountSigned {
	fn on_request(&self, request: HttpRequest) -> InterceptFuture<'_, HttpRequest> {
		if request.headers().contains_key("authorization") {
			self.0.fetch_add(1, Ordering::SeqCst);
		}

		Box::pin(async move { Ok(request) })
	}
}
