//! Nonce contracts for request signing.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

/// Length of nonces produced by [`RandomNonce`].
pub const NONCE_LEN: usize = 32;

/// Produces the `nonce_str` of each signed request.
///
/// Implementations must return a value that is unique with overwhelming probability per
/// process; the platform may reject reused nonces.
pub trait NonceSource
where
	Self: Send + Sync,
{
	/// Returns a fresh nonce.
	fn next_nonce(&self) -> String;
}

/// Thread-local CSPRNG nonces of [`NONCE_LEN`] alphanumeric characters.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNonce;
impl NonceSource for RandomNonce {
	fn next_nonce(&self) -> String {
		rand::rng().sample_iter(Alphanumeric).take(NONCE_LEN).map(char::from).collect()
	}
}

/// Always yields the same nonce; only meant for deterministic tests.
#[derive(Clone, Debug)]
pub struct FixedNonce(String);
impl FixedNonce {
	/// Creates a source that repeats `nonce`.
	pub fn new(nonce: impl Into<String>) -> Self {
		Self(nonce.into())
	}
}
impl NonceSource for FixedNonce {
	fn next_nonce(&self) -> String {
		self.0.clone()
	}
}
