//! Seedline Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Seedline workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`SeedlineError`] and the [`Result`] alias
//! - **Fingerprints**: SHA-256 helpers used by the anonymizer
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: the record model and timestamp conventions
//!
//! # Example
//!
//! ```no_run
//! use seedline_common::fingerprint::sha256_hex;
//!
//! let digest = sha256_hex("ANON_SALT_email_v1a@x.comemail");
//! assert_eq!(digest.len(), 64);
//! ```

pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SeedlineError};
pub use types::Record;
