//! Secret handling utilities.
//!
//! Re-exports secrecy types used by leasegen's configuration.

pub use secrecy::{ExposeSecret, SecretString};
