//! Session identity, token persistence and role-based authorization
//!
//! [`SessionManager`] is the single owner of the session. It takes a
//! [`ProviderCredential`] from any [`IdentityAdapter`], exchanges it through
//! the [`Backend`](crate::api::Backend), persists the bearer token in a
//! [`TokenStore`] and resolves the user's role. [`AccessPolicy`] turns the
//! role into a [`PermissionSet`] per application.

mod error;
mod identity;
mod policy;
mod session;
mod token_store;

pub use error::{AuthError, EXCHANGE_FAILED_MESSAGE};
pub use identity::{
    CredentialOutcome, GoogleAdapter, IdentityAdapter, IdentityPrompt, MicrosoftAdapter,
    PasswordAdapter, PromptRequest, Provider, ProviderCredential, ProviderError,
};
pub use policy::{
    AccessPolicy, AdminAllowList, Application, Capability, Grant, PermissionSet, RoleRule,
    can_access_admin_dashboard, can_access_strategic_dashboard, can_create_committees,
    can_manage_own_committee_members,
};
pub use session::{LoginOutcome, SessionManager, SessionPhase, SessionSnapshot};
pub use token_store::{
    AccessToken, FileTokenStore, MemoryTokenStore, TOKEN_KEY, TokenStore, TokenStoreError,
};
