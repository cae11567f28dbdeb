//! Merchant identity: identifiers, the API v3 key, RSA signing material, and the
//! `Authorization` token format.

pub mod header;
pub mod id;
pub mod material;
pub mod secret;

pub use header::*;
pub use id::*;
pub use material::*;
pub use secret::*;
