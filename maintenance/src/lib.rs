//! Maintenance jobs for the Wellspring content directory.
//!
//! - [`bulk`]: enumerate a remote collection across pages, then delete the
//!   matching items in bounded batches.
//! - [`collection`]: the backends those jobs run against.
//! - [`api`]: retrying client for signed, rate-limited JSON APIs.
//! - [`config`]: environment-driven settings for the binary.

pub mod api;
pub mod bulk;
pub mod collection;
pub mod config;
pub mod error;

pub use error::ConfigurationError;
