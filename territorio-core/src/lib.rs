//! territorio-core: session and territory model for the territorio client
//!
//! This crate provides the pieces shared by every territorio front end:
//!
//! - **Session** - [`SessionManager`] restores, signs in and signs out a
//!   user through Google, Microsoft or password credentials
//! - **Authorization** - [`AccessPolicy`] derives per-application
//!   capabilities from the user's territorial [`Role`]
//! - **Backend contract** - [`api::Backend`] with an HTTP implementation and
//!   a scripted mock
//! - **Administrative tree** - [`AdministrativeTree`] with lazy, per-node
//!   expansion and rollups shown as received
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use territorio_core::api::HttpBackend;
//! use territorio_core::{ClientConfig, FileTokenStore, SessionManager};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let base = config.api_base()?;
//!     let manager = SessionManager::new(
//!         Arc::new(HttpBackend::new(base.clone())),
//!         Arc::new(FileTokenStore::default_for(&base)),
//!         config.access_policy(),
//!     );
//!
//!     let session = manager.bootstrap().await?;
//!     println!("{}", session.phase);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod tree;
mod types;

pub use auth::{
    AccessPolicy, AccessToken, Application, AuthError, Capability, FileTokenStore, LoginOutcome,
    MemoryTokenStore, PermissionSet, Provider, SessionManager, SessionPhase, SessionSnapshot,
    TokenStore,
};
pub use config::{ClientConfig, ConfigError, GoogleConfig, MicrosoftConfig};
pub use tree::{AdministrativeTree, AdministrativeUnit, TreeError, TreeRow};
pub use types::{Assignment, InvalidRole, OwnedCommittee, Role, User};
