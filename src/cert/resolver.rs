//! Platform certificate resolution with caching, expiry, and per-serial singleflight.

// std
use std::{
	collections::HashSet,
	sync::atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{ApiV3Key, SerialNumber},
	cert::{CertificateBundle, CertificateCache, CertificateFetcher, PlatformCertificate},
	error::CertificateError,
	ext::Clock,
};

/// How long the outcome of a bundle fetch answers lookups for serials it did not yield.
///
/// Within this window a serial absent from the last bundle is [`CertificateError::NotFound`] and
/// a serial whose certificate had already expired is [`CertificateError::Expired`], both without
/// another fetch.
pub const NEGATIVE_CACHE_TTL: Duration = Duration::seconds(60);

/// How the resolver selects the certificate that verifies a response.
#[derive(Clone, Debug)]
pub enum ResolverMode {
	/// Look up (and lazily fetch) the certificate named by `Wechatpay-Serial`.
	BySerial,
	/// Always use one configured certificate or public key; never fetch.
	Pinned(Arc<PlatformCertificate>),
}

/// Counters describing resolver activity.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
	fetches: AtomicU64,
	cache_hits: AtomicU64,
	failures: AtomicU64,
}
impl ResolverMetrics {
	/// Returns the number of bundle fetches attempted.
	pub fn fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Returns the number of lookups answered from the cache (or the pinned certificate).
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of failed resolutions.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_fetch(&self) {
		self.fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

// Serials seen by the most recent bundle fetch.
#[derive(Debug)]
struct RecentFetch {
	at: OffsetDateTime,
	serials: HashSet<SerialNumber>,
	expired: HashMap<SerialNumber, OffsetDateTime>,
}
impl RecentFetch {
	fn new(at: OffsetDateTime, bundle: &CertificateBundle) -> Self {
		Self {
			at,
			serials: bundle.data.iter().map(|resource| resource.serial_no.clone()).collect(),
			expired: HashMap::new(),
		}
	}

	fn rejection(&self, serial: &SerialNumber, now: OffsetDateTime) -> Option<CertificateError> {
		if now - self.at >= NEGATIVE_CACHE_TTL {
			return None;
		}

		if let Some(&expires_at) = self.expired.get(serial) {
			return Some(CertificateError::Expired { serial: serial.to_string(), expires_at });
		}

		(!self.serials.contains(serial))
			.then(|| CertificateError::NotFound { serial: serial.to_string() })
	}
}

/// Resolves platform certificates by serial number.
///
/// Cached, unexpired certificates are returned without I/O. On a miss the resolver fetches the
/// bundle once per serial even under concurrent callers: each serial has its own async guard,
/// held only while a resolution is in flight, and the cache is re-checked after the guard is
/// acquired. Serials the last fetch could not serve are rejected without I/O for
/// [`NEGATIVE_CACHE_TTL`]. Certificates that are already expired when fetched are never cached.
pub struct CertificateResolver {
	mode: ResolverMode,
	cache: Arc<dyn CertificateCache>,
	fetcher: Arc<dyn CertificateFetcher>,
	api_v3_key: ApiV3Key,
	clock: Arc<dyn Clock>,
	guards: Mutex<HashMap<SerialNumber, Arc<AsyncMutex<()>>>>,
	recent: Mutex<Option<RecentFetch>>,
	metrics: Arc<ResolverMetrics>,
}
impl CertificateResolver {
	/// Creates a resolver.
	pub fn new(
		mode: ResolverMode,
		cache: Arc<dyn CertificateCache>,
		fetcher: Arc<dyn CertificateFetcher>,
		api_v3_key: ApiV3Key,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			mode,
			cache,
			fetcher,
			api_v3_key,
			clock,
			guards: Mutex::new(HashMap::new()),
			recent: Mutex::new(None),
			metrics: Arc::new(ResolverMetrics::default()),
		}
	}

	/// Active selection mode.
	pub fn mode(&self) -> &ResolverMode {
		&self.mode
	}

	/// Whether responses must declare `Wechatpay-Serial`.
	pub fn requires_serial(&self) -> bool {
		matches!(self.mode, ResolverMode::BySerial)
	}

	/// Backing cache.
	pub fn cache(&self) -> &Arc<dyn CertificateCache> {
		&self.cache
	}

	/// Activity counters.
	pub fn metrics(&self) -> &Arc<ResolverMetrics> {
		&self.metrics
	}

	/// Resolves the certificate for a response that declared `serial` (or none).
	///
	/// In by-serial mode a missing serial is [`CertificateError::SerialRequired`]. In pinned
	/// mode the pinned certificate is returned, unless both sides carry a serial and they
	/// differ, which is [`CertificateError::NotFound`].
	pub async fn resolve(&self, serial: Option<&SerialNumber>) -> Result<Arc<PlatformCertificate>> {
		let result = match (&self.mode, serial) {
			(ResolverMode::Pinned(pinned), serial) => Self::check_pinned(pinned, serial),
			(ResolverMode::BySerial, Some(serial)) => return self.resolve_by_serial(serial).await,
			(ResolverMode::BySerial, None) => Err(CertificateError::SerialRequired.into()),
		};

		match &result {
			Ok(_) => self.metrics.record_cache_hit(),
			Err(_) => self.metrics.record_failure(),
		}

		result
	}

	fn check_pinned(
		pinned: &Arc<PlatformCertificate>,
		serial: Option<&SerialNumber>,
	) -> Result<Arc<PlatformCertificate>> {
		match (serial, pinned.serial_no()) {
			(Some(declared), Some(own)) if declared != own =>
				Err(CertificateError::NotFound { serial: declared.to_string() }.into()),
			_ => Ok(pinned.clone()),
		}
	}

	/// Returns the pinned certificate, or `None` in by-serial mode.
	pub fn resolve_pinned(&self) -> Option<Arc<PlatformCertificate>> {
		match &self.mode {
			ResolverMode::Pinned(pinned) => Some(pinned.clone()),
			ResolverMode::BySerial => None,
		}
	}

	/// Returns the certificate for `serial`, fetching and decrypting the bundle on a miss.
	pub async fn resolve_by_serial(
		&self,
		serial: &SerialNumber,
	) -> Result<Arc<PlatformCertificate>> {
		if let Some(hit) = self.cached(serial) {
			self.metrics.record_cache_hit();

			return Ok(hit);
		}

		let guard = self.guard(serial);
		let result = {
			let _singleflight = guard.lock().await;

			self.resolve_guarded(serial).await
		};

		self.release(serial, guard);

		result
	}

	async fn resolve_guarded(&self, serial: &SerialNumber) -> Result<Arc<PlatformCertificate>> {
		if let Some(hit) = self.cached(serial) {
			self.metrics.record_cache_hit();

			return Ok(hit);
		}

		let now = self.clock.now();
		let rejection =
			self.recent.lock().as_ref().and_then(|recent| recent.rejection(serial, now));

		if let Some(e) = rejection {
			self.metrics.record_failure();

			return Err(e.into());
		}

		let result = self.fetch_one(serial).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		result
	}

	async fn fetch_one(&self, serial: &SerialNumber) -> Result<Arc<PlatformCertificate>> {
		self.metrics.record_fetch();

		let bundle = self.fetcher.fetch().await?;
		let now = self.clock.now();
		let mut recent = RecentFetch::new(now, &bundle);
		let result = self.accept(&bundle, serial, now, &mut recent);

		*self.recent.lock() = Some(recent);

		result
	}

	fn accept(
		&self,
		bundle: &CertificateBundle,
		serial: &SerialNumber,
		now: OffsetDateTime,
		recent: &mut RecentFetch,
	) -> Result<Arc<PlatformCertificate>> {
		let resource = bundle
			.find(serial)
			.ok_or_else(|| CertificateError::NotFound { serial: serial.to_string() })?;
		let certificate = resource.decrypt(&self.api_v3_key)?;

		if let Some(expires_at) = certificate.expires_at().filter(|&at| now >= at) {
			recent.expired.insert(serial.clone(), expires_at);

			return Err(CertificateError::Expired { serial: serial.to_string(), expires_at }.into());
		}

		let certificate = Arc::new(certificate);

		self.cache.put(serial.clone(), certificate.clone());

		#[cfg(feature = "tracing")]
		tracing::debug!(
			serial = %serial,
			expires_at = ?certificate.expires_at(),
			"Cached platform certificate."
		);

		Ok(certificate)
	}

	/// Fetches the bundle and caches every unexpired resource in it, returning the cached serials.
	///
	/// Any resource that fails to decrypt fails the whole call; resources decrypted before the
	/// failure stay cached. Expired certificates are skipped.
	pub async fn fetch_and_cache_all(&self) -> Result<Vec<SerialNumber>> {
		self.metrics.record_fetch();

		let result = self.fetch_all().await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		result
	}

	async fn fetch_all(&self) -> Result<Vec<SerialNumber>> {
		let bundle = self.fetcher.fetch().await?;
		let now = self.clock.now();
		let mut recent = RecentFetch::new(now, &bundle);
		let mut serials = Vec::with_capacity(bundle.data.len());
		let mut outcome = Ok(());

		for resource in &bundle.data {
			let certificate = match resource.decrypt(&self.api_v3_key) {
				Ok(certificate) => certificate,
				Err(e) => {
					outcome = Err(e);

					break;
				},
			};

			if let Some(expires_at) = certificate.expires_at().filter(|&at| now >= at) {
				recent.expired.insert(resource.serial_no.clone(), expires_at);

				continue;
			}

			self.cache.put(resource.serial_no.clone(), Arc::new(certificate));
			serials.push(resource.serial_no.clone());
		}

		*self.recent.lock() = Some(recent);

		outcome.map(|()| serials)
	}

	fn cached(&self, serial: &SerialNumber) -> Option<Arc<PlatformCertificate>> {
		let certificate = self.cache.get(serial)?;

		if certificate.is_expired_at(self.clock.now()) {
			self.cache.invalidate(serial);

			return None;
		}

		Some(certificate)
	}

	fn guard(&self, serial: &SerialNumber) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(serial.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	// Drops the map entry once no other caller holds or awaits the guard.
	fn release(&self, serial: &SerialNumber, guard: Arc<AsyncMutex<()>>) {
		let mut guards = self.guards.lock();

		if Arc::strong_count(&guard) == 2 {
			guards.remove(serial);
		}
	}
}
impl Debug for CertificateResolver {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CertificateResolver")
			.field("mode", &self.mode)
			.field("cached", &self.cache.len())
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
