//! Injectable sources of time and randomness.
//!
//! Signing needs a fresh timestamp and nonce per request, and certificate expiry checks need
//! "now". Both are modeled as traits so tests can pin them to deterministic values.

pub mod clock;
pub mod nonce;

pub use clock::*;
pub use nonce::*;
