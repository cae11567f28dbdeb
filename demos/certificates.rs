//! Downloads and decrypts the current platform certificates with real merchant credentials.
//!
//! ```sh
//! WECHATPAY_MCHID=1900000109 \
//! WECHATPAY_SERIAL_NO=... \
//! WECHATPAY_KEY_PATH=apiclient_key.pem \
//! WECHATPAY_API_V3_KEY=... \
//! cargo run --example certificates
//! ```

// std
use std::env;
// crates.io
use color_eyre::{Result, eyre::WrapErr};
// self
use wechatpay_v3::{client::Client, config::MerchantConfig};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = MerchantConfig::builder()
		.merchant_id(env::var("WECHATPAY_MCHID").wrap_err("WECHATPAY_MCHID is required")?)
		.serial_no(env::var("WECHATPAY_SERIAL_NO").wrap_err("WECHATPAY_SERIAL_NO is required")?)
		.private_key_path(env::var("WECHATPAY_KEY_PATH").wrap_err("WECHATPAY_KEY_PATH is required")?)
		.api_v3_key(env::var("WECHATPAY_API_V3_KEY").wrap_err("WECHATPAY_API_V3_KEY is required")?)
		.build()?;
	let client = Client::new(config)?;
	let bundle = client.request_certificates().await?;

	for resource in &bundle.data {
		let certificate = resource.decrypt(&client.config().api_v3_key)?;

		println!(
			"{} effective {} expires {:?}",
			resource.serial_no,
			resource.effective_time.as_deref().unwrap_or("-"),
			certificate.expires_at(),
		);
	}

	let warmed = client.resolver().fetch_and_cache_all().await?;

	println!("Cached {} platform certificate(s).", warmed.len());

	Ok(())
}
