//! Scripted backend for tests
//!
//! Queue responses per endpoint before exercising the session layer. Each
//! call consumes the front of its queue; the last queued response is
//! replayed once the queue is down to one entry, so a single `queue_*` call
//! serves any number of identical calls.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{ApiError, Backend, LoginResponse};
use crate::auth::{AccessToken, Provider, ProviderCredential};
use crate::tree::AdministrativeUnit;
use crate::types::{Assignment, User};

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Exchange(Provider),
    CurrentUser { token: String },
    MyAssignment { token: String },
    AdministrativeTree { token: String, prune_empty: bool },
}

struct Script<T> {
    responses: Mutex<VecDeque<Result<T, ApiError>>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, response: Result<T, ApiError>) {
        self.lock().push_back(response);
    }

    fn next(&self, endpoint: &str) -> Result<T, ApiError> {
        let mut responses = self.lock();
        let next = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        next.unwrap_or_else(|| {
            Err(ApiError::Transport(format!(
                "no scripted response for {}",
                endpoint
            )))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<T, ApiError>>> {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// In-memory [`Backend`] replaying scripted responses.
pub struct MockBackend {
    exchange: Script<LoginResponse>,
    current_user: Script<User>,
    assignment: Script<Assignment>,
    tree: Script<Vec<AdministrativeUnit>>,
    calls: Mutex<Vec<BackendCall>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            exchange: Script::new(),
            current_user: Script::new(),
            assignment: Script::new(),
            tree: Script::new(),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Delay every call, to hold transitions in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful exchange returning `token` and `user`.
    pub fn queue_login(&self, token: &str, user: User) {
        self.exchange.push(Ok(LoginResponse {
            access_token: AccessToken::new(token),
            token_type: "bearer".to_string(),
            user,
        }));
    }

    pub fn queue_exchange(&self, response: Result<LoginResponse, ApiError>) {
        self.exchange.push(response);
    }

    pub fn queue_current_user(&self, response: Result<User, ApiError>) {
        self.current_user.push(response);
    }

    pub fn queue_assignment(&self, response: Result<Assignment, ApiError>) {
        self.assignment.push(response);
    }

    pub fn queue_tree(&self, response: Result<Vec<AdministrativeUnit>, ApiError>) {
        self.tree.push(response);
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls_guard().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls_guard().len()
    }

    fn calls_guard(&self) -> std::sync::MutexGuard<'_, Vec<BackendCall>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn record(&self, call: BackendCall) {
        self.calls_guard().push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn exchange(&self, credential: &ProviderCredential) -> Result<LoginResponse, ApiError> {
        self.record(BackendCall::Exchange(credential.provider())).await;
        self.exchange.next("exchange")
    }

    async fn current_user(&self, token: &AccessToken) -> Result<User, ApiError> {
        self.record(BackendCall::CurrentUser {
            token: token.expose_secret().to_string(),
        })
        .await;
        self.current_user.next("current_user")
    }

    async fn my_assignment(&self, token: &AccessToken) -> Result<Assignment, ApiError> {
        self.record(BackendCall::MyAssignment {
            token: token.expose_secret().to_string(),
        })
        .await;
        self.assignment.next("my_assignment")
    }

    async fn administrative_tree(
        &self,
        token: &AccessToken,
        prune_empty: bool,
    ) -> Result<Vec<AdministrativeUnit>, ApiError> {
        self.record(BackendCall::AdministrativeTree {
            token: token.expose_secret().to_string(),
            prune_empty,
        })
        .await;
        self.tree.next("administrative_tree")
    }
}
