//! Session manager and its state machine
//!
//! ```text
//! Uninitialized ──bootstrap──> Bootstrapping ──> Authenticated | Anonymous
//! Anonymous ──login──> Authenticating ──> Authenticated | Anonymous
//! any settled phase ──logout──> Anonymous
//! ```
//!
//! Transitions are serialized by an async single-flight lock. In-memory state
//! sits behind a short-held lock that is never held across an await, so the
//! observers (`phase`, `snapshot`, `permissions`) are synchronous.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{AuthError, EXCHANGE_FAILED_MESSAGE};
use super::identity::{CredentialOutcome, IdentityAdapter};
use super::policy::{AccessPolicy, Capability, PermissionSet};
use super::token_store::{AccessToken, TokenStore, TokenStoreError};
use crate::api::{ApiError, Backend};
use crate::tree::AdministrativeTree;
use crate::types::{Assignment, User};

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Nothing has been read from the token store yet
    Uninitialized,
    Bootstrapping,
    Anonymous,
    Authenticating,
    Authenticated,
}

impl SessionPhase {
    /// Whether no transition is in flight.
    pub fn is_settled(self) -> bool {
        !matches!(
            self,
            SessionPhase::Bootstrapping | SessionPhase::Authenticating
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Bootstrapping => "bootstrapping",
            SessionPhase::Anonymous => "signed out",
            SessionPhase::Authenticating => "signing in",
            SessionPhase::Authenticated => "authenticated",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of the session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub token: Option<AccessToken>,
    pub user: Option<User>,
    pub assignment: Option<Assignment>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.phase == SessionPhase::Authenticated
    }
}

/// Result of a login attempt that did not fail.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(SessionSnapshot),
    /// The user closed the provider flow; the session is unchanged
    Cancelled,
}

impl From<TokenStoreError> for AuthError {
    fn from(e: TokenStoreError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

struct State {
    phase: SessionPhase,
    token: Option<AccessToken>,
    user: Option<User>,
    assignment: Option<Assignment>,
    last_error: Option<String>,
}

impl State {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            token: None,
            user: None,
            assignment: None,
            last_error: None,
        }
    }

    fn set_authenticated(&mut self, token: AccessToken, user: User, assignment: Assignment) {
        self.phase = SessionPhase::Authenticated;
        self.token = Some(token);
        self.user = Some(user);
        self.assignment = Some(assignment);
        self.last_error = None;
    }

    fn set_anonymous(&mut self) {
        self.phase = SessionPhase::Anonymous;
        self.token = None;
        self.user = None;
        self.assignment = None;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            token: self.token.clone(),
            user: self.user.clone(),
            assignment: self.assignment.clone(),
        }
    }
}

/// Puts the session in a transient phase and restores the prior phase when
/// dropped unsettled, so an abandoned transition never leaves the manager
/// stuck in `Bootstrapping` or `Authenticating`.
struct PhaseGuard<'a> {
    state: &'a RwLock<State>,
    prior: SessionPhase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(state: &'a RwLock<State>, phase: SessionPhase) -> Self {
        let mut s = state.write().unwrap_or_else(PoisonError::into_inner);
        let prior = s.phase;
        s.phase = phase;
        Self {
            state,
            prior,
            armed: true,
        }
    }

    fn settle(mut self, apply: impl FnOnce(&mut State)) -> SessionSnapshot {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut s);
        self.armed = false;
        s.snapshot()
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
            debug!(from = %s.phase, to = %self.prior, "transition abandoned");
            s.phase = self.prior;
        }
    }
}

/// How the role lookup after a successful token check ended.
enum AssignmentLookup {
    Resolved(Assignment),
    /// The token was rejected while looking up the role
    Unauthorized,
}

/// Owns the session and every transition of it.
///
/// Built from injected collaborators and shared behind an `Arc`. Adapters
/// registered with [`with_adapter`](Self::with_adapter) get their sign-out
/// hook run on logout.
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    tokens: Arc<dyn TokenStore>,
    policy: AccessPolicy,
    adapters: Vec<Arc<dyn IdentityAdapter>>,
    state: RwLock<State>,
    flight: Mutex<()>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>, tokens: Arc<dyn TokenStore>, policy: AccessPolicy) -> Self {
        Self {
            backend,
            tokens,
            policy,
            adapters: Vec::new(),
            state: RwLock::new(State::new()),
            flight: Mutex::new(()),
        }
    }

    /// Register an adapter whose sign-out hook runs on logout.
    pub fn with_adapter(mut self, adapter: Arc<dyn IdentityAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> SessionPhase {
        self.read().phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == SessionPhase::Authenticated
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read().snapshot()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn assignment(&self) -> Option<Assignment> {
        self.read().assignment.clone()
    }

    /// One-line message of the most recent failure, cleared by a successful
    /// sign-in.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Capabilities of the current session under the configured policy.
    pub fn permissions(&self) -> PermissionSet {
        let state = self.read();
        if state.phase != SessionPhase::Authenticated {
            return PermissionSet::none();
        }
        self.policy
            .evaluate_session(state.user.as_ref(), state.assignment.as_ref())
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.permissions().allows(capability)
    }

    fn record_error(&self, err: &AuthError) {
        self.write().last_error = Some(err.user_message());
    }

    /// Restore the session from the persisted token.
    ///
    /// Without a stored token this settles `Anonymous` without any network
    /// call. A token the backend no longer accepts is cleared. A failed role
    /// lookup leaves the session authenticated without a role.
    pub async fn bootstrap(&self) -> Result<SessionSnapshot, AuthError> {
        let _flight = self.flight.lock().await;
        let guard = PhaseGuard::enter(&self.state, SessionPhase::Bootstrapping);

        let token = match self.tokens.get().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no stored token");
                return Ok(guard.settle(State::set_anonymous));
            }
            Err(e) => {
                warn!(error = %e, "failed to read stored token");
                let err = AuthError::from(e);
                guard.settle(|s| {
                    s.set_anonymous();
                    s.last_error = Some(err.user_message());
                });
                return Err(err);
            }
        };

        let user = match self.backend.current_user(&token).await {
            Ok(user) => user,
            Err(e) => {
                info!(error = %e, "stored token rejected, signing out");
                let cleared = self.tokens.clear().await;
                let snapshot = guard.settle(State::set_anonymous);
                cleared?;
                return Ok(snapshot);
            }
        };

        match self.lookup_assignment(&token).await {
            AssignmentLookup::Resolved(assignment) => {
                info!(user_id = user.id, role = ?assignment.role, "session restored");
                Ok(guard.settle(|s| s.set_authenticated(token, user, assignment)))
            }
            AssignmentLookup::Unauthorized => {
                info!("token rejected during role lookup, signing out");
                let cleared = self.tokens.clear().await;
                let snapshot = guard.settle(State::set_anonymous);
                cleared?;
                Ok(snapshot)
            }
        }
    }

    /// Sign in through `adapter`.
    ///
    /// Fails with [`AuthError::LoginInProgress`] if another transition is in
    /// flight. A cancelled provider flow leaves the session as it was.
    pub async fn login(&self, adapter: &dyn IdentityAdapter) -> Result<LoginOutcome, AuthError> {
        let _flight = self
            .flight
            .try_lock()
            .map_err(|_| AuthError::LoginInProgress)?;

        let phase = self.phase();
        if !matches!(phase, SessionPhase::Anonymous | SessionPhase::Uninitialized) {
            return Err(AuthError::InvalidTransition {
                operation: "sign in",
                phase,
            });
        }

        let provider = adapter.provider();
        let guard = PhaseGuard::enter(&self.state, SessionPhase::Authenticating);

        let credential = match adapter.obtain_credential().await {
            Ok(CredentialOutcome::Obtained(credential)) => credential,
            Ok(CredentialOutcome::Cancelled) => {
                debug!(%provider, "sign-in cancelled");
                return Ok(LoginOutcome::Cancelled);
            }
            Err(e) => {
                warn!(%provider, error = %e, "could not obtain credential");
                drop(guard);
                self.record_error(&e);
                return Err(e);
            }
        };

        let response = match self.backend.exchange(&credential).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%provider, error = %e, "credential exchange failed");
                let err = AuthError::CredentialExchangeFailed {
                    message: exchange_message(&e),
                };
                if let Err(e) = self.tokens.clear().await {
                    warn!(error = %e, "failed to clear token store");
                }
                guard.settle(|s| {
                    s.set_anonymous();
                    s.last_error = Some(err.user_message());
                });
                return Err(err);
            }
        };

        if let Err(e) = self.tokens.set(&response.access_token).await {
            let err = AuthError::from(e);
            warn!(error = %err, "failed to persist token");
            guard.settle(|s| {
                s.set_anonymous();
                s.last_error = Some(err.user_message());
            });
            return Err(err);
        }

        let token = response.access_token;
        let user = response.user;
        match self.lookup_assignment(&token).await {
            AssignmentLookup::Resolved(assignment) => {
                info!(%provider, user_id = user.id, role = ?assignment.role, "signed in");
                let snapshot = guard.settle(|s| s.set_authenticated(token, user, assignment));
                Ok(LoginOutcome::Authenticated(snapshot))
            }
            AssignmentLookup::Unauthorized => {
                warn!(%provider, "new token rejected during role lookup");
                if let Err(e) = self.tokens.clear().await {
                    warn!(error = %e, "failed to clear token store");
                }
                let err = AuthError::Unauthorized;
                guard.settle(|s| {
                    s.set_anonymous();
                    s.last_error = Some(err.user_message());
                });
                Err(err)
            }
        }
    }

    /// Role lookup shared by bootstrap and every login path.
    async fn lookup_assignment(&self, token: &AccessToken) -> AssignmentLookup {
        match self.backend.my_assignment(token).await {
            Ok(assignment) => AssignmentLookup::Resolved(assignment),
            Err(ApiError::Unauthorized) => AssignmentLookup::Unauthorized,
            Err(e) => {
                warn!(error = %e, "role lookup failed, continuing without a role");
                AssignmentLookup::Resolved(Assignment::degraded())
            }
        }
    }

    /// Clear the session and run every adapter's sign-out hook.
    ///
    /// Hook failures are logged and ignored. Waits for any in-flight
    /// transition first.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let _flight = self.flight.lock().await;

        let cleared = self.tokens.clear().await;
        self.write().set_anonymous();
        info!("signed out");

        for adapter in &self.adapters {
            if let Err(e) = adapter.sign_out().await {
                warn!(provider = %adapter.provider(), error = %e, "provider sign-out failed");
            }
        }

        cleared.map_err(AuthError::from)
    }

    /// Run an authenticated backend call with the current token.
    ///
    /// A 401 clears the session, unless it has moved on to another token
    /// while the call was in flight.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, AuthError>
    where
        F: FnOnce(Arc<dyn Backend>, AccessToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = {
            let state = self.read();
            match (&state.token, state.phase) {
                (Some(token), SessionPhase::Authenticated) => token.clone(),
                (_, phase) => {
                    return Err(AuthError::InvalidTransition {
                        operation: "call the backend",
                        phase,
                    });
                }
            }
        };

        match call(self.backend.clone(), token.clone()).await {
            Ok(value) => Ok(value),
            Err(ApiError::Unauthorized) => {
                self.invalidate(&token).await?;
                Err(AuthError::Unauthorized)
            }
            Err(e) => Err(AuthError::Request(e.to_string())),
        }
    }

    async fn invalidate(&self, rejected: &AccessToken) -> Result<(), AuthError> {
        let _flight = self.flight.lock().await;

        let current = self.read().token.clone();
        match current {
            Some(current) if current.same_as(rejected) => {
                info!("token rejected, signing out");
                let cleared = self.tokens.clear().await;
                {
                    let mut state = self.write();
                    state.set_anonymous();
                    state.last_error = Some(AuthError::Unauthorized.user_message());
                }
                cleared.map_err(AuthError::from)
            }
            _ => {
                debug!("ignoring 401 for a token that is no longer current");
                Ok(())
            }
        }
    }

    /// Fetch the administrative tree for the current session.
    pub async fn administrative_tree(
        &self,
        prune_empty: bool,
    ) -> Result<AdministrativeTree, AuthError> {
        let phase = self.phase();
        if phase != SessionPhase::Authenticated {
            return Err(AuthError::InvalidTransition {
                operation: "load the administrative tree",
                phase,
            });
        }
        if !self.can(Capability::ViewAdministrativeTree) {
            return Err(AuthError::Forbidden {
                capability: Capability::ViewAdministrativeTree,
            });
        }

        let units = self
            .authorized(|backend, token| async move {
                backend.administrative_tree(&token, prune_empty).await
            })
            .await?;
        debug!(roots = units.len(), "administrative tree loaded");
        AdministrativeTree::from_units(units).map_err(|e| AuthError::Request(e.to_string()))
    }
}

/// User-facing text for a failed exchange: the backend's detail when it
/// sent one.
fn exchange_message(err: &ApiError) -> String {
    err.detail()
        .map(str::to_string)
        .unwrap_or_else(|| EXCHANGE_FAILED_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBackend;
    use crate::auth::{Application, MemoryTokenStore, PasswordAdapter};
    use crate::types::Role;

    fn ana() -> User {
        User {
            id: 7,
            name: "Ana".to_string(),
            email: "ana@example.org".to_string(),
            phone: None,
            picture_url: None,
        }
    }

    fn manager(backend: Arc<MockBackend>, tokens: Arc<MemoryTokenStore>) -> SessionManager {
        SessionManager::new(
            backend,
            tokens,
            AccessPolicy::for_application(Application::Committees),
        )
    }

    #[test]
    fn phase_display_reads_as_a_sentence() {
        assert_eq!(SessionPhase::Anonymous.to_string(), "signed out");
        assert!(SessionPhase::Authenticated.is_settled());
        assert!(!SessionPhase::Authenticating.is_settled());
    }

    #[test]
    fn exchange_message_prefers_backend_detail() {
        let rejected = ApiError::Rejected {
            status: 400,
            detail: Some("Invalid credentials".to_string()),
        };
        assert_eq!(exchange_message(&rejected), "Invalid credentials");
        assert_eq!(
            exchange_message(&ApiError::Transport("refused".to_string())),
            EXCHANGE_FAILED_MESSAGE
        );
    }

    #[tokio::test]
    async fn new_manager_is_uninitialized_with_no_permissions() {
        let m = manager(Arc::new(MockBackend::new()), Arc::new(MemoryTokenStore::new()));
        assert_eq!(m.phase(), SessionPhase::Uninitialized);
        assert!(m.permissions().is_empty());
        assert!(m.last_error().is_none());
    }

    #[tokio::test]
    async fn login_from_uninitialized_skips_bootstrap() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_login("tok", ana());
        backend.queue_assignment(Ok(Assignment::with_role(Role::StateCoordination)));
        let tokens = Arc::new(MemoryTokenStore::new());
        let m = manager(backend, tokens.clone());

        let outcome = m.login(&PasswordAdapter::new("ana", "pw")).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
        assert!(m.can(Capability::AdminDashboard));
        assert_eq!(tokens.set_count(), 1);
    }

    #[tokio::test]
    async fn login_while_authenticated_is_rejected() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_current_user(Ok(ana()));
        backend.queue_assignment(Ok(Assignment::with_role(Role::DistrictCoordination)));
        let m = manager(backend, Arc::new(MemoryTokenStore::with_token("tok")));
        m.bootstrap().await.unwrap();

        let err = m
            .login(&PasswordAdapter::new("ana", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTransition { .. }));
        assert!(m.is_authenticated());
    }

    #[tokio::test]
    async fn validation_failure_restores_phase_and_records_message() {
        let m = manager(Arc::new(MockBackend::new()), Arc::new(MemoryTokenStore::new()));
        m.bootstrap().await.unwrap();

        let err = m.login(&PasswordAdapter::new("", "")).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(m.phase(), SessionPhase::Anonymous);
        assert_eq!(
            m.last_error().as_deref(),
            Some("Username and password are required.")
        );
    }

    #[tokio::test]
    async fn authorized_requires_a_session() {
        let m = manager(Arc::new(MockBackend::new()), Arc::new(MemoryTokenStore::new()));
        let err = m
            .authorized(|backend, token| async move { backend.current_user(&token).await })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn tree_requires_capability() {
        let backend = Arc::new(MockBackend::new());
        backend.queue_current_user(Ok(ana()));
        backend.queue_assignment(Ok(Assignment::with_role(Role::MunicipalCoordination)));
        let m = manager(backend.clone(), Arc::new(MemoryTokenStore::with_token("tok")));
        m.bootstrap().await.unwrap();

        let err = m.administrative_tree(true).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Forbidden {
                capability: Capability::ViewAdministrativeTree
            }
        ));
        assert_eq!(backend.call_count(), 2);
    }
}
