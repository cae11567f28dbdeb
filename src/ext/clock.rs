//! Clock contracts used for request timestamps and certificate expiry.

// self
use crate::_prelude::*;

/// Source of the current instant.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current instant.
	fn now(&self) -> OffsetDateTime;

	/// Returns the current instant as Unix seconds.
	fn unix_timestamp(&self) -> i64 {
		self.now().unix_timestamp()
	}
}

/// Wall-clock time in UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Clock frozen at a given instant (adjustable for expiry tests).
#[derive(Debug)]
pub struct FixedClock(RwLock<OffsetDateTime>);
impl FixedClock {
	/// Freezes the clock at `instant`.
	pub fn new(instant: OffsetDateTime) -> Self {
		Self(RwLock::new(instant))
	}

	/// Freezes the clock at the given Unix timestamp.
	pub fn from_unix(seconds: i64) -> Result<Self, time::error::ComponentRange> {
		Ok(Self::new(OffsetDateTime::from_unix_timestamp(seconds)?))
	}

	/// Moves the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.write() = instant;
	}

	/// Advances the clock by `delta`.
	pub fn advance(&self, delta: Duration) {
		let mut guard = self.0.write();

		*guard += delta;
	}
}
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.read()
	}
}
