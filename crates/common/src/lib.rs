//! Common utilities and shared types for socialcast.
//!
//! This crate provides foundational components used across all socialcast crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Credential vault**: AES-256-GCM sealing of provider tokens via [`CredentialVault`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use socialcast_common::{AppResult, Config, CredentialVault, IdGenerator};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let vault = CredentialVault::new(&config.vault.encryption_key)?;
//!     let sealed = vault.encrypt("page-access-token")?;
//!     println!("{} -> {}", IdGenerator::new().generate(), sealed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod vault;

pub use config::{Config, LimitsConfig, RetryConfig, RoleLimits};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use vault::{CredentialVault, VaultError};
