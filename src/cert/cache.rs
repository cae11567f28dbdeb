//! Storage contract for decrypted platform certificates plus the built-in in-memory cache.

// self
use crate::{_prelude::*, auth::SerialNumber, cert::PlatformCertificate};

/// Keyed storage for decrypted platform certificates.
///
/// Implementations must be safe to share across tasks; the resolver serializes fetches per
/// serial number on its own, so the cache only needs per-call atomicity.
pub trait CertificateCache
where
	Self: Send + Sync,
{
	/// Returns the certificate stored for `serial`, if any.
	fn get(&self, serial: &SerialNumber) -> Option<Arc<PlatformCertificate>>;

	/// Stores or replaces the certificate for `serial`.
	fn put(&self, serial: SerialNumber, certificate: Arc<PlatformCertificate>);

	/// Removes the certificate for `serial`, returning it if present.
	fn invalidate(&self, serial: &SerialNumber) -> Option<Arc<PlatformCertificate>>;

	/// Number of cached certificates.
	fn len(&self) -> usize;

	/// Whether the cache holds no certificates.
	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

type CertificateMap = Arc<RwLock<HashMap<SerialNumber, Arc<PlatformCertificate>>>>;

/// Process-local certificate cache; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryCertificateCache(CertificateMap);
impl MemoryCertificateCache {
	/// Serial numbers currently cached, in no particular order.
	pub fn serials(&self) -> Vec<SerialNumber> {
		self.0.read().keys().cloned().collect()
	}
}
impl CertificateCache for MemoryCertificateCache {
	fn get(&self, serial: &SerialNumber) -> Option<Arc<PlatformCertificate>> {
		self.0.read().get(serial).cloned()
	}

	fn put(&self, serial: SerialNumber, certificate: Arc<PlatformCertificate>) {
		self.0.write().insert(serial, certificate);
	}

	fn invalidate(&self, serial: &SerialNumber) -> Option<Arc<PlatformCertificate>> {
		self.0.write().remove(serial)
	}

	fn len(&self) -> usize {
		self.0.read().len()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn platform() -> Arc<PlatformCertificate> {
		Arc::new(
			PlatformCertificate::from_pem(PLATFORM_CERTIFICATE_PEM)
				.expect("Platform certificate fixture should parse."),
		)
	}

	#[test]
	fn clones_share_entries_and_lookups_ignore_case() {
		let cache = MemoryCertificateCache::default();
		let shared = cache.clone();
		let serial = SerialNumber::new(PLATFORM_SERIAL.to_ascii_lowercase())
			.expect("Serial fixture should be valid.");

		assert!(cache.is_empty());

		cache.put(serial, platform());

		let upper = SerialNumber::new(PLATFORM_SERIAL).expect("Serial fixture should be valid.");

		assert!(shared.get(&upper).is_some());
		assert_eq!(shared.serials(), vec![upper.clone()]);
		assert!(shared.invalidate(&upper).is_some());
		assert!(cache.get(&upper).is_none());
		assert_eq!(cache.len(), 0);
	}
}
