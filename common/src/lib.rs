//! Shared building blocks for the Factorio server manager.
//!
//! Everything here is free of process or filesystem behaviour so that both
//! `models` and `server-core` can depend on it:
//!
//! - [`ErrorLocation`]: call-site capture attached to every error variant
//! - [`RedactedSecret`]: a secret string (RCON password) that never reaches logs

pub mod error;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_secret::RedactedSecret;
