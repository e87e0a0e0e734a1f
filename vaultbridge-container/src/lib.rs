//! # vaultbridge-container
//!
//! The Scoped Container Client and the secret-injection
//! pipeline built on top of it: a thin, non-general-purpose
//! wrapper around a Docker-API-compatible engine that applies mandatory
//! hardening to every container it creates and never lets a decrypted
//! credential reach the engine's creation record or logs.
//!
//! ```rust,no_run
//! use vaultbridge_container::{ScopedClient, Scope, ScopeSet};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ScopedClient::connect(None, ScopeSet::new([Scope::Create, Scope::Remove]))?;
//! client.ping().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod hardening;
pub mod inject;
pub mod retry;
pub mod scope;
pub mod seccomp;
pub mod types;

pub use client::{CreateSpec, ExecResult, ScopedClient, DEFAULT_DEADLINE};
pub use error::ContainerError;
pub use inject::{InjectionRequest, InjectionStrategy, PiiMountSpec, SecretInjectionPipeline};
pub use scope::{Scope, ScopeSet};
pub use types::{ContainerSession, SessionState};
