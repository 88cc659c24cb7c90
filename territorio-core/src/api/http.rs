//! `reqwest` implementation of the backend contract.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{ApiError, Backend, LoginResponse};
use crate::auth::{AccessToken, ProviderCredential};
use crate::tree::AdministrativeUnit;
use crate::types::{Assignment, User};

/// Backend reached over HTTP.
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GoogleExchange<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
struct MicrosoftExchange<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
struct PasswordExchange<'a> {
    username: &'a str,
    password: &'a str,
}

impl HttpBackend {
    /// Create a backend rooted at `base_url`.
    ///
    /// A base with a path prefix (`https://host/api`) keeps that prefix for
    /// every endpoint.
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Transport(format!("invalid endpoint {}: {}", path, e)))
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        // No bearer token is sent here, so a 401 rejects the submitted credential.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(rejection(response).await);
        }
        read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &AccessToken,
    ) -> Result<T, ApiError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        return Err(rejection(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn rejection(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Rejected {
        status,
        detail: detail_from_body(&body),
    }
}

/// Extract the `detail` field of an error body.
///
/// The backend reports most errors as `{"detail": "..."}`; validation errors
/// carry a structured `detail`, which is passed through as JSON text.
fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(text) if text.is_empty() => None,
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn exchange(&self, credential: &ProviderCredential) -> Result<LoginResponse, ApiError> {
        match credential {
            ProviderCredential::Google { id_token } => {
                let body = GoogleExchange {
                    id_token: id_token.expose_secret(),
                };
                self.post_json("auth/google", &body).await
            }
            ProviderCredential::Microsoft { access_token } => {
                let body = MicrosoftExchange {
                    access_token: access_token.expose_secret(),
                };
                self.post_json("auth/microsoft", &body).await
            }
            ProviderCredential::Password { username, password } => {
                let body = PasswordExchange {
                    username: username.as_str(),
                    password: password.expose_secret(),
                };
                self.post_json("auth/login", &body).await
            }
        }
    }

    async fn current_user(&self, token: &AccessToken) -> Result<User, ApiError> {
        let url = self.endpoint("auth/me")?;
        self.get_json(url, token).await
    }

    async fn my_assignment(&self, token: &AccessToken) -> Result<Assignment, ApiError> {
        let url = self.endpoint("auth/me/assignment")?;
        self.get_json(url, token).await
    }

    async fn administrative_tree(
        &self,
        token: &AccessToken,
        prune_empty: bool,
    ) -> Result<Vec<AdministrativeUnit>, ApiError> {
        let mut url = self.endpoint("dashboard/administrative-tree")?;
        if !prune_empty {
            url.query_pairs_mut().append_pair("prune_empty", "false");
        }
        self.get_json(url, token).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::*;
    use crate::auth::{
        AccessPolicy, Application, Capability, MemoryTokenStore, PasswordAdapter, SessionManager,
        SessionPhase,
    };
    use crate::types::Role;

    /// Serve one canned HTTP response and hand back the raw request text.
    async fn serve_once(status_line: &str, body: &str) -> (Url, JoinHandle<String>) {
        let (base, handle) = serve_sequence(&[(status_line, body)]).await;
        let handle = tokio::spawn(async move { handle.await.unwrap().remove(0) });
        (base, handle)
    }

    /// Serve canned responses to consecutive connections, in order.
    async fn serve_sequence(responses: &[(&str, &str)]) -> (Url, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let responses: Vec<String> = responses
            .iter()
            .map(|(status_line, body)| {
                format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                )
            })
            .collect();

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
            requests
        });

        (Url::parse(&format!("http://{}/api", addr)).unwrap(), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = vec![0u8; 8192];
        let mut request = Vec::new();
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        String::from_utf8_lossy(&request).into_owned()
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let backend = HttpBackend::new(Url::parse("https://example.org/api").unwrap());
        assert_eq!(
            backend.endpoint("/auth/me").unwrap().as_str(),
            "https://example.org/api/auth/me"
        );
    }

    #[test]
    fn detail_is_extracted_from_error_body() {
        assert_eq!(
            detail_from_body(r#"{"detail": "Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
        assert_eq!(detail_from_body("<html>oops</html>"), None);
        assert_eq!(detail_from_body(r#"{"message": "x"}"#), None);
        assert!(
            detail_from_body(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#)
                .unwrap()
                .contains("field required")
        );
    }

    #[tokio::test]
    async fn authenticated_calls_send_bearer_token() {
        let (base, server) =
            serve_once("200 OK", r#"{"id": 1, "name": "Ana", "email": "ana@example.org"}"#)
                .await;
        let backend = HttpBackend::new(base);

        let user = backend
            .current_user(&AccessToken::new("tok-123"))
            .await
            .unwrap();
        assert_eq!(user.name, "Ana");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/auth/me HTTP/1.1"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("authorization: bearer tok-123")
        );
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let (base, _server) = serve_once("401 Unauthorized", r#"{"detail": "expired"}"#).await;
        let backend = HttpBackend::new(base);

        let err = backend
            .my_assignment(&AccessToken::new("old"))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);
    }

    #[tokio::test]
    async fn password_exchange_posts_to_login() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"access_token": "new", "token_type": "bearer", "user": {"id": 2, "name": "Ana", "email": "ana@example.org"}}"#,
        )
        .await;
        let backend = HttpBackend::new(base);

        let response = backend
            .exchange(&ProviderCredential::password("ana", "pw"))
            .await
            .unwrap();
        assert_eq!(response.access_token.expose_secret(), "new");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/auth/login HTTP/1.1"));
        assert!(request.contains(r#""username":"ana""#));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn rejected_exchange_carries_detail() {
        let (base, _server) = serve_once("400 Bad Request", r#"{"detail": "Invalid Google token"}"#).await;
        let backend = HttpBackend::new(base);

        let err = backend
            .exchange(&ProviderCredential::google("bad"))
            .await
            .unwrap_err();
        assert_eq!(err.detail(), Some("Invalid Google token"));
    }

    #[tokio::test]
    async fn unauthorized_exchange_keeps_backend_detail() {
        let (base, _server) = serve_once(
            "401 Unauthorized",
            r#"{"detail": "Token de Google inválido: expired"}"#,
        )
        .await;
        let backend = HttpBackend::new(base);

        let err = backend
            .exchange(&ProviderCredential::google("bad"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 401,
                detail: Some("Token de Google inválido: expired".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn wrong_password_message_reaches_the_session() {
        let (base, _server) = serve_once(
            "401 Unauthorized",
            r#"{"detail": "Incorrect username or password"}"#,
        )
        .await;
        let tokens = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(
            Arc::new(HttpBackend::new(base)),
            tokens.clone(),
            AccessPolicy::for_application(Application::Committees),
        );

        let err = manager
            .login(&PasswordAdapter::new("ana", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Incorrect username or password");
        assert_eq!(manager.phase(), SessionPhase::Anonymous);
        assert_eq!(tokens.set_count(), 0);
    }

    #[tokio::test]
    async fn user_without_email_decodes() {
        let (base, _server) = serve_once("200 OK", r#"{"id": 1, "name": "Ana"}"#).await;
        let backend = HttpBackend::new(base);

        let user = backend
            .current_user(&AccessToken::new("tok"))
            .await
            .unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "Ana");
        assert!(user.email.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_over_http_restores_district_role() {
        let (base, server) = serve_sequence(&[
            ("200 OK", r#"{"id": 1, "name": "Ana"}"#),
            ("200 OK", r#"{"role": 3, "committees_owned": []}"#),
        ])
        .await;
        let manager = SessionManager::new(
            Arc::new(HttpBackend::new(base)),
            Arc::new(MemoryTokenStore::with_token("persisted")),
            AccessPolicy::for_application(Application::Committees),
        );

        let snapshot = manager.bootstrap().await.unwrap();

        assert_eq!(snapshot.phase, SessionPhase::Authenticated);
        assert_eq!(
            snapshot.assignment.and_then(|a| a.role),
            Some(Role::DistrictCoordination)
        );
        assert!(manager.can(Capability::CreateCommittees));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/auth/me HTTP/1.1"));
        assert!(requests[1].starts_with("GET /api/auth/me/assignment HTTP/1.1"));
    }

    #[tokio::test]
    async fn tree_request_can_disable_pruning() {
        let (base, server) = serve_once("200 OK", "[]").await;
        let backend = HttpBackend::new(base);

        let units = backend
            .administrative_tree(&AccessToken::new("tok"), false)
            .await
            .unwrap();
        assert!(units.is_empty());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/dashboard/administrative-tree?prune_empty=false HTTP/1.1"));
    }
}
