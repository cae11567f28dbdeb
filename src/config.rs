//! Merchant configuration consumed by [`Client`](crate::client::Client).
//!
//! The crate does not read files or environment variables on its own; callers deserialize or
//! build a [`MerchantConfig`] and the client validates it once at construction.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::{ApiV3Key, MerchantId, SerialNumber, SigningMaterial},
	cert::{PlatformCertificate, ResolverMode},
	error::ConfigError,
};

/// Production API host.
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com/";

/// Where the merchant private key comes from.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateKeySource {
	/// Inline PEM text.
	Pem(String),
	/// Path to a PEM file, read when the client is built.
	Path(PathBuf),
}
impl Debug for PrivateKeySource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			PrivateKeySource::Pem(_) => f.write_str("Pem(<redacted>)"),
			PrivateKeySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
		}
	}
}

/// Validated merchant settings.
#[derive(Clone, Debug, Deserialize)]
pub struct MerchantConfig {
	/// Merchant identifier (`mchid`).
	pub merchant_id: MerchantId,
	/// Serial number of the merchant API certificate.
	pub serial_no: SerialNumber,
	/// Merchant private key.
	pub private_key: PrivateKeySource,
	/// 32-byte API v3 key used to decrypt platform certificates.
	pub api_v3_key: ApiV3Key,
	/// API base URL; must use HTTPS.
	#[serde(default = "default_base_url")]
	pub base_url: Url,
	/// Platform certificate or public key PEM; switches the resolver to pinned mode.
	#[serde(default)]
	pub pinned_certificate: Option<String>,
	/// Sub-merchant identifier merged into V3 JSON bodies as `sub_mchid`.
	#[serde(default)]
	pub sub_mch_id: Option<String>,
	/// Sub-merchant app identifier merged into V3 JSON bodies as `sub_appid`.
	#[serde(default)]
	pub sub_app_id: Option<String>,
	/// `User-Agent` header value.
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
}
impl MerchantConfig {
	/// Creates an empty builder.
	pub fn builder() -> MerchantConfigBuilder {
		MerchantConfigBuilder::default()
	}

	/// Checks invariants that deserialization cannot enforce.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_base_url(&self.base_url)?;

		if self.user_agent.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "user_agent" });
		}

		Ok(())
	}

	/// Base URL with a trailing `/`, so relative API paths append instead of replacing.
	pub fn api_base(&self) -> Url {
		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		base
	}

	/// Resolves `path` (with or without a leading `/`) against [`MerchantConfig::api_base`].
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.api_base()
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidBaseUrl { source })
	}

	/// Loads and parses the merchant private key.
	pub fn signing_material(&self) -> Result<SigningMaterial, ConfigError> {
		let merchant_id = self.merchant_id.clone();
		let serial_no = self.serial_no.clone();

		match &self.private_key {
			PrivateKeySource::Pem(pem) => SigningMaterial::from_pem(merchant_id, serial_no, pem),
			PrivateKeySource::Path(path) =>
				SigningMaterial::from_pem_file(merchant_id, serial_no, path),
		}
	}

	/// Selects pinned mode when a certificate is configured, by-serial mode otherwise.
	pub fn resolver_mode(&self) -> Result<ResolverMode> {
		Ok(match self.pinned_certificate.as_deref() {
			Some(pem) => ResolverMode::Pinned(Arc::new(PlatformCertificate::from_pem(pem)?)),
			None => ResolverMode::BySerial,
		})
	}

	/// Adds `sub_mchid` / `sub_appid` to a JSON object body and drops null or empty members.
	///
	/// Keys supplied by the caller win over configured values. Non-object bodies are returned
	/// unchanged.
	pub fn merge_service_provider_fields(&self, body: serde_json::Value) -> serde_json::Value {
		let serde_json::Value::Object(mut object) = body else {
			return body;
		};

		let fields = [("sub_mchid", &self.sub_mch_id), ("sub_appid", &self.sub_app_id)];

		for (key, configured) in fields {
			if let Some(value) = configured {
				object.entry(key).or_insert_with(|| serde_json::Value::String(value.clone()));
			}
		}

		object.retain(|_, value| match value {
			serde_json::Value::Null => false,
			serde_json::Value::String(s) => !s.is_empty(),
			_ => true,
		});

		serde_json::Value::Object(object)
	}
}

/// Builder for [`MerchantConfig`]; identifiers and keys are validated in
/// [`MerchantConfigBuilder::build`].
#[derive(Debug, Default)]
pub struct MerchantConfigBuilder {
	merchant_id: Option<String>,
	serial_no: Option<String>,
	private_key: Option<PrivateKeySource>,
	api_v3_key: Option<ApiV3KeyInput>,
	base_url: Option<Url>,
	pinned_certificate: Option<String>,
	sub_mch_id: Option<String>,
	sub_app_id: Option<String>,
	user_agent: Option<String>,
}
impl MerchantConfigBuilder {
	/// Sets the merchant identifier.
	pub fn merchant_id(mut self, merchant_id: impl Into<String>) -> Self {
		self.merchant_id = Some(merchant_id.into());

		self
	}

	/// Sets the merchant certificate serial number.
	pub fn serial_no(mut self, serial_no: impl Into<String>) -> Self {
		self.serial_no = Some(serial_no.into());

		self
	}

	/// Supplies the private key as inline PEM.
	pub fn private_key_pem(mut self, pem: impl Into<String>) -> Self {
		self.private_key = Some(PrivateKeySource::Pem(pem.into()));

		self
	}

	/// Supplies the private key as a PEM file path.
	pub fn private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.private_key = Some(PrivateKeySource::Path(path.into()));

		self
	}

	/// Sets the API v3 key.
	pub fn api_v3_key(mut self, key: impl AsRef<[u8]>) -> Self {
		self.api_v3_key = Some(ApiV3KeyInput(key.as_ref().to_vec()));

		self
	}

	/// Overrides the API base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Pins a platform certificate (or public key) PEM.
	pub fn pinned_certificate(mut self, pem: impl Into<String>) -> Self {
		self.pinned_certificate = Some(pem.into());

		self
	}

	/// Sets the sub-merchant identifier for service-provider mode.
	pub fn sub_mch_id(mut self, sub_mch_id: impl Into<String>) -> Self {
		self.sub_mch_id = Some(sub_mch_id.into());

		self
	}

	/// Sets the sub-merchant app identifier for service-provider mode.
	pub fn sub_app_id(mut self, sub_app_id: impl Into<String>) -> Self {
		self.sub_app_id = Some(sub_app_id.into());

		self
	}

	/// Overrides the `User-Agent` header.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Validates every field and produces the configuration.
	pub fn build(self) -> Result<MerchantConfig, ConfigError> {
		let missing = |field| ConfigError::MissingField { field };
		let merchant_id = MerchantId::new(self.merchant_id.ok_or(missing("merchant_id"))?)?;
		let serial_no = SerialNumber::new(self.serial_no.ok_or(missing("serial_no"))?)?;
		let private_key = self.private_key.ok_or(missing("private_key"))?;
		let api_v3_key = ApiV3Key::new(self.api_v3_key.ok_or(missing("api_v3_key"))?.0)?;
		let config = MerchantConfig {
			merchant_id,
			serial_no,
			private_key,
			api_v3_key,
			base_url: match self.base_url {
				Some(url) => url,
				None => parse_default_base_url()?,
			},
			pinned_certificate: self.pinned_certificate,
			sub_mch_id: self.sub_mch_id,
			sub_app_id: self.sub_app_id,
			user_agent: self.user_agent.unwrap_or_else(default_user_agent),
		};

		config.validate()?;

		Ok(config)
	}
}

// Raw key bytes held by the builder until validation.
struct ApiV3KeyInput(Vec<u8>);
impl Debug for ApiV3KeyInput {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

fn parse_default_base_url() -> Result<Url, ConfigError> {
	Url::parse(DEFAULT_BASE_URL).map_err(|source| ConfigError::InvalidBaseUrl { source })
}

fn default_base_url() -> Url {
	parse_default_base_url().expect("DEFAULT_BASE_URL should parse")
}

fn default_user_agent() -> String {
	concat!("wechatpay-v3/", env!("CARGO_PKG_VERSION")).to_owned()
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureBaseUrl { url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn builder_applies_defaults_and_validates() {
		let config = MerchantConfig::builder()
			.merchant_id(MERCHANT_ID)
			.serial_no(MERCHANT_SERIAL.to_ascii_lowercase())
			.private_key_pem(MERCHANT_KEY_PEM)
			.api_v3_key(API_V3_KEY)
			.build()
			.expect("Complete configuration should build.");

		assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
		assert_eq!(config.serial_no.as_ref(), MERCHANT_SERIAL);
		assert!(config.user_agent.starts_with("wechatpay-v3/"));
		assert!(matches!(config.resolver_mode(), Ok(ResolverMode::BySerial)));
		assert!(!format!("{config:?}").contains("BEGIN"));
		assert_eq!(
			config.signing_material().expect("Key should parse.").serial_no().as_ref(),
			MERCHANT_SERIAL
		);
	}

	#[test]
	fn builder_rejects_incomplete_or_insecure_settings() {
		let base = || {
			MerchantConfig::builder()
				.merchant_id(MERCHANT_ID)
				.serial_no(MERCHANT_SERIAL)
				.private_key_pem(MERCHANT_KEY_PEM)
		};

		assert!(matches!(base().build(), Err(ConfigError::MissingField { field: "api_v3_key" })));
		assert!(matches!(
			base().api_v3_key("short").build(),
			Err(ConfigError::InvalidApiV3Key { len: 5 })
		));
		assert!(matches!(
			base()
				.api_v3_key(API_V3_KEY)
				.base_url(Url::parse("http://api.mch.weixin.qq.com/").expect("URL should parse."))
				.build(),
			Err(ConfigError::InsecureBaseUrl { .. })
		));
		assert!(matches!(
			base().merchant_id("19 00").api_v3_key(API_V3_KEY).build(),
			Err(ConfigError::InvalidIdentifier(_))
		));
	}

	#[test]
	fn endpoints_append_to_the_base_path() {
		let config = test_config("https://proxy.example.com/wechat");

		assert_eq!(
			config.endpoint("/v3/certificates").expect("Path should join.").as_str(),
			"https://proxy.example.com/wechat/v3/certificates"
		);
		assert_eq!(
			test_config(DEFAULT_BASE_URL)
				.endpoint("v3/pay/transactions/native?x=1")
				.expect("Path should join.")
				.as_str(),
			"https://api.mch.weixin.qq.com/v3/pay/transactions/native?x=1"
		);
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: MerchantConfig = serde_json::from_value(json!({
			"merchant_id": MERCHANT_ID,
			"serial_no": MERCHANT_SERIAL,
			"private_key": { "path": "/etc/wechatpay/apiclient_key.pem" },
			"api_v3_key": API_V3_KEY,
			"pinned_certificate": PLATFORM_CERTIFICATE_PEM,
		}))
		.expect("Configuration JSON should deserialize.");

		assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
		assert!(matches!(config.private_key, PrivateKeySource::Path(_)));
		assert!(matches!(config.resolver_mode(), Ok(ResolverMode::Pinned(_))));
		assert!(matches!(config.signing_material(), Err(ConfigError::ReadPrivateKey { .. })));
	}

	#[test]
	fn service_provider_fields_merge_and_filter() {
		let mut config = test_config(DEFAULT_BASE_URL);

		config.sub_mch_id = Some("1900000110".into());
		config.sub_app_id = Some(String::new());

		let merged = config.merge_service_provider_fields(json!({
			"appid": "wx123456",
			"description": "",
			"attach": null,
			"amount": { "total": 1 },
		}));

		assert_eq!(
			merged,
			json!({ "appid": "wx123456", "sub_mchid": "1900000110", "amount": { "total": 1 } })
		);

		let kept = config.merge_service_provider_fields(json!({ "sub_mchid": "override" }));

		assert_eq!(kept, json!({ "sub_mchid": "override" }));
		assert_eq!(config.merge_service_provider_fields(json!([1, 2])), json!([1, 2]));
	}
}
