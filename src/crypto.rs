//! Cryptographic primitives of the V3 scheme: RSA-SHA256 (PKCS#1 v1.5) signatures and
//! AES-256-GCM decryption of platform resources.

pub mod aead;
pub mod sha256_rsa;

pub use aead::*;
pub use sha256_rsa::*;
