//! Concurrency tests for SessionManager
//!
//! These tests validate the single-flight rules of session transitions:
//! - A second login while one is in flight is rejected
//! - Logout and bootstrap wait for the in-flight transition
//! - Abandoning a login restores the prior phase

use std::sync::Arc;
use std::time::Duration;

use territorio_core::api::MockBackend;
use territorio_core::auth::{
    AccessPolicy, Application, AuthError, LoginOutcome, MemoryTokenStore, PasswordAdapter,
    SessionManager, SessionPhase, TokenStore,
};
use territorio_core::{Assignment, Role, User};

fn ana() -> User {
    User {
        id: 1,
        name: "Ana".to_string(),
        email: "ana@example.org".to_string(),
        phone: None,
        picture_url: None,
    }
}

fn slow_manager(delay: Duration) -> (Arc<SessionManager>, Arc<MockBackend>, Arc<MemoryTokenStore>) {
    let backend = Arc::new(MockBackend::new().with_delay(delay));
    backend.queue_login("tok", ana());
    backend.queue_assignment(Ok(Assignment::with_role(Role::MunicipalCoordination)));
    let tokens = Arc::new(MemoryTokenStore::new());
    let manager = Arc::new(SessionManager::new(
        backend.clone(),
        tokens.clone(),
        AccessPolicy::for_application(Application::Committees),
    ));
    (manager, backend, tokens)
}

async fn wait_for_phase(manager: &SessionManager, phase: SessionPhase) {
    while manager.phase() != phase {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test]
async fn second_concurrent_login_is_rejected() {
    let (manager, _backend, tokens) = slow_manager(Duration::from_millis(100));

    let m1 = Arc::clone(&manager);
    let first = tokio::spawn(async move { m1.login(&PasswordAdapter::new("ana", "pw")).await });

    wait_for_phase(&manager, SessionPhase::Authenticating).await;
    let second = manager.login(&PasswordAdapter::new("ana", "pw")).await;

    assert!(matches!(second, Err(AuthError::LoginInProgress)));

    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, LoginOutcome::Authenticated(_)));
    assert_eq!(manager.phase(), SessionPhase::Authenticated);
    assert_eq!(tokens.set_count(), 1);
}

#[tokio::test]
async fn logout_waits_for_in_flight_login() {
    let (manager, _backend, tokens) = slow_manager(Duration::from_millis(50));

    let m1 = Arc::clone(&manager);
    let login = tokio::spawn(async move { m1.login(&PasswordAdapter::new("ana", "pw")).await });

    wait_for_phase(&manager, SessionPhase::Authenticating).await;
    manager.logout().await.unwrap();

    // the login completed first, then logout cleared it
    assert!(login.await.unwrap().is_ok());
    assert_eq!(manager.phase(), SessionPhase::Anonymous);
    assert!(tokens.get().await.unwrap().is_none());
}

#[tokio::test]
async fn abandoned_login_restores_prior_phase() {
    let (manager, _backend, tokens) = slow_manager(Duration::from_millis(500));
    manager.bootstrap().await.unwrap();

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        manager.login(&PasswordAdapter::new("ana", "pw")),
    )
    .await;

    assert!(result.is_err(), "login should still be in flight");
    assert_eq!(manager.phase(), SessionPhase::Anonymous);
    assert_eq!(tokens.set_count(), 0);
}

#[tokio::test]
async fn login_is_possible_after_an_abandoned_one() {
    let (manager, _backend, _tokens) = slow_manager(Duration::from_millis(30));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(5),
        manager.login(&PasswordAdapter::new("ana", "pw")),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(manager.phase(), SessionPhase::Uninitialized);

    let outcome = manager
        .login(&PasswordAdapter::new("ana", "pw"))
        .await
        .unwrap();
    assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
}

#[tokio::test]
async fn observers_do_not_block_during_transitions() {
    let (manager, _backend, _tokens) = slow_manager(Duration::from_millis(100));

    let m1 = Arc::clone(&manager);
    let login = tokio::spawn(async move { m1.login(&PasswordAdapter::new("ana", "pw")).await });

    wait_for_phase(&manager, SessionPhase::Authenticating).await;
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Authenticating);
    assert!(snapshot.user.is_none());
    assert!(manager.permissions().is_empty());

    login.await.unwrap().unwrap();
}
