//! API client for the imaging server.
//!
//! `ApiClient::call` is the single choke point for remote calls: it attaches
//! the bearer token, enforces the timeout, and turns every outcome into
//! either parsed JSON or a `CallError`. The typed endpoint methods below are
//! thin wrappers over it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::models::{Ack, ConfigChanges, ImageList, RestoreRequest, SaveRequest};
use crate::utils::normalize_bearer;

use super::CallError;

// ============================================================================
// Constants
// ============================================================================

/// Default per-call timeout. Restarting DRBL can take most of a minute.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoint paths on the imaging server
pub mod paths {
    pub const RESTART_SERVICE: &str = "/api/restartDrbl";
    pub const START_SERVICE: &str = "/api/startDrbl";
    pub const SET_IMAGE_MODE: &str = "/api/createImage";
    pub const APPLY_CONFIG: &str = "/api/changeConfig";
    pub const LIST_IMAGES: &str = "/api/listClones";
    pub const RESTORE_IMAGE: &str = "/api/restoreDiskImage";
    pub const SAVE_IMAGE: &str = "/api/saveDiskRam";
    pub const REFRESH_SESSION: &str = "/api/refreshToken";
    pub const END_SESSION: &str = "/api/logout";
    pub const LOGIN: &str = "/api/login";
    pub const CREATE_USER: &str = "/api/createUser";
}

#[derive(Debug, Serialize)]
struct AccountRequest<'a> {
    login: &'a str,
    password: &'a str,
}

/// Reply of login and refresh-session. Both fields must be present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// API client for the imaging server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client for the server at `base_url` (e.g. `http://drbl.lab:8080`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, CallError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use `timeout` for every endpoint method instead of the default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one request and parse the JSON reply.
    ///
    /// The whole exchange (send and body read) races `timeout`; if the timer
    /// wins the request future is dropped, which aborts the connection. No
    /// retries happen here.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let url = self.url(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, normalize_bearer(token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url = %url, "Sending request");
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) if e.is_timeout() => return Err(CallError::Timeout(timeout)),
            Ok(Err(e)) => return Err(CallError::Network(e)),
            Err(_) => {
                warn!(%method, url = %url, timeout = ?timeout, "Request timed out");
                return Err(CallError::Timeout(timeout));
            }
        };

        if !status.is_success() {
            debug!(%method, url = %url, status = status.as_u16(), "Request failed");
            return Err(CallError::from_status(status, &text));
        }

        serde_json::from_str(&text).map_err(|_| CallError::invalid_body(&text))
    }

    async fn post_ack(
        &self,
        path: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Ack, CallError> {
        self.call(Method::POST, path, Some(token), body, self.timeout)
            .await
            .map(Ack::new)
    }

    fn to_body<T: Serialize>(payload: &T) -> Value {
        // Plain structs and string maps always serialize
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }

    fn parse_credential(body: Value) -> Result<Credential, CallError> {
        let raw = body.to_string();
        match serde_json::from_value::<TokenResponse>(body) {
            Ok(TokenResponse {
                token: Some(token),
                expires_at: Some(expires_at),
            }) if !token.trim().is_empty() => Ok(Credential::new(token, expires_at)),
            _ => Err(CallError::invalid_body(&raw)),
        }
    }

    // ===== Service control =====

    /// Restart the DRBL service. Acknowledged with `status: "drbl started"`.
    pub async fn restart_service(&self, token: &str) -> Result<Ack, CallError> {
        self.post_ack(paths::RESTART_SERVICE, token, None).await
    }

    /// Start the DRBL service after a configuration change
    pub async fn start_service(&self, token: &str) -> Result<Ack, CallError> {
        self.post_ack(paths::START_SERVICE, token, None).await
    }

    /// Put Clonezilla into select_in_client mode so clients can create an image
    pub async fn set_image_mode(&self, token: &str) -> Result<Ack, CallError> {
        self.post_ack(paths::SET_IMAGE_MODE, token, None).await
    }

    /// Send changed configuration fields. Success is the absence of `error`.
    pub async fn apply_config(&self, token: &str, changes: &ConfigChanges) -> Result<Ack, CallError> {
        let body = Self::to_body(changes);
        self.post_ack(paths::APPLY_CONFIG, token, Some(&body)).await
    }

    // ===== Images =====

    /// List images on the server, normalising the `images` field
    pub async fn list_images(&self, token: &str) -> Result<ImageList, CallError> {
        let body = self
            .call(Method::GET, paths::LIST_IMAGES, Some(token), None, self.timeout)
            .await?;
        Ok(Ack::new(body).images().unwrap_or_default())
    }

    pub async fn restore_image(&self, token: &str, request: &RestoreRequest) -> Result<Ack, CallError> {
        let body = Self::to_body(request);
        self.post_ack(paths::RESTORE_IMAGE, token, Some(&body)).await
    }

    pub async fn save_image(&self, token: &str, request: &SaveRequest) -> Result<Ack, CallError> {
        let body = Self::to_body(request);
        self.post_ack(paths::SAVE_IMAGE, token, Some(&body)).await
    }

    // ===== Session =====

    /// Exchange the current token for a new credential
    pub async fn refresh_session(&self, token: &str) -> Result<Credential, CallError> {
        let body = self
            .call(Method::POST, paths::REFRESH_SESSION, Some(token), None, self.timeout)
            .await?;
        Self::parse_credential(body)
    }

    /// Tell the server the session is over. Any 2xx counts, whatever the body.
    pub async fn end_session(&self, token: &str) -> Result<(), CallError> {
        match self
            .call(Method::POST, paths::END_SESSION, Some(token), None, self.timeout)
            .await
        {
            Ok(_) | Err(CallError::InvalidBody(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Authenticate and return a fresh credential
    pub async fn login(&self, login: &str, password: &str) -> Result<Credential, CallError> {
        let body = Self::to_body(&AccountRequest { login, password });
        let reply = self
            .call(Method::POST, paths::LOGIN, None, Some(&body), self.timeout)
            .await?;
        Self::parse_credential(reply)
    }

    /// Register a new operator account. Any 2xx counts, whatever the body.
    pub async fn create_user(&self, login: &str, password: &str) -> Result<(), CallError> {
        let body = Self::to_body(&AccountRequest { login, password });
        match self
            .call(Method::POST, paths::CREATE_USER, None, Some(&body), self.timeout)
            .await
        {
            Ok(_) | Err(CallError::InvalidBody(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(server.base_url()).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = ApiClient::new("http://drbl.lab:8080/").unwrap();
        assert_eq!(api.base_url(), "http://drbl.lab:8080");
        assert_eq!(api.url("/api/login"), "http://drbl.lab:8080/api/login");
        assert_eq!(api.url("api/login"), "http://drbl.lab:8080/api/login");
        assert_eq!(api.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_call_attaches_bearer_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(paths::RESTART_SERVICE)
                    .header("Authorization", "Bearer abc");
                then.status(200).json_body(json!({"status": "drbl started"}));
            })
            .await;

        let ack = client(&server).restart_service("Bearer abc").await.unwrap();
        assert_eq!(ack.status(), Some("drbl started"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_typed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(paths::SAVE_IMAGE);
                then.status(500).body("disk busy");
            })
            .await;

        let request = SaveRequest { image: "lab-a".into() };
        let err = client(&server).save_image("abc", &request).await.unwrap_err();
        match err {
            CallError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "disk busy");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_keeps_raw_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(paths::SET_IMAGE_MODE);
                then.status(200).body("<html>proxy error</html>");
            })
            .await;

        let err = client(&server).set_image_mode("abc").await.unwrap_err();
        match err {
            CallError::InvalidBody(raw) => assert_eq!(raw, "<html>proxy error</html>"),
            other => panic!("expected InvalidBody, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(paths::RESTART_SERVICE);
                then.status(200)
                    .delay(Duration::from_millis(2000))
                    .json_body(json!({"status": "drbl started"}));
            })
            .await;

        let api = client(&server).with_timeout(Duration::from_millis(100));
        let err = api.restart_service("abc").await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn test_restore_sends_expected_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(paths::RESTORE_IMAGE)
                    .json_body(json!({"image": "lab-a", "clientsToWait": 3, "maxTimeToWait": 120}));
                then.status(200).json_body(json!({"status": "disk restore started"}));
            })
            .await;

        let request = RestoreRequest {
            image: "lab-a".into(),
            clients_to_wait: 3,
            max_time_to_wait: 120,
        };
        let ack = client(&server).restore_image("abc", &request).await.unwrap();
        assert_eq!(ack.status(), Some("disk restore started"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_images_accepts_both_shapes() {
        let delimited = MockServer::start_async().await;
        delimited
            .mock_async(|when, then| {
                when.method(GET).path(paths::LIST_IMAGES);
                then.status(200).json_body(json!({"images": "lab-a, lab-b"}));
            })
            .await;
        let images = client(&delimited).list_images("abc").await.unwrap();
        assert_eq!(images.into_vec(), vec!["lab-a", "lab-b"]);

        let array = MockServer::start_async().await;
        array
            .mock_async(|when, then| {
                when.method(GET).path(paths::LIST_IMAGES);
                then.status(200).json_body(json!({"images": ["lab-c"]}));
            })
            .await;
        let images = client(&array).list_images("abc").await.unwrap();
        assert_eq!(images.into_vec(), vec!["lab-c"]);

        let missing = MockServer::start_async().await;
        missing
            .mock_async(|when, then| {
                when.method(GET).path(paths::LIST_IMAGES);
                then.status(200).json_body(json!({}));
            })
            .await;
        assert!(client(&missing).list_images("abc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_requires_token_and_expiry() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(paths::REFRESH_SESSION);
                then.status(200).json_body(json!({"token": "new"}));
            })
            .await;

        let err = client(&server).refresh_session("old").await.unwrap_err();
        assert!(matches!(err, CallError::InvalidBody(_)));
    }

    #[tokio::test]
    async fn test_refresh_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(paths::REFRESH_SESSION)
                    .header("Authorization", "Bearer old");
                then.status(200)
                    .json_body(json!({"token": "new", "expiresAt": "2030-01-01T00:00:00Z"}));
            })
            .await;

        let credential = client(&server).refresh_session("old").await.unwrap();
        assert_eq!(credential.token, "new");
        assert_eq!(credential.expires_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[tokio::test]
    async fn test_login_sends_credentials_without_auth() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(paths::LOGIN)
                    .json_body(json!({"login": "admin", "password": "secret"}));
                then.status(200)
                    .json_body(json!({"token": "t1", "expiresAt": "2030-01-01T00:00:00Z"}));
            })
            .await;

        let credential = client(&server).login("admin", "secret").await.unwrap();
        assert_eq!(credential.token, "t1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_end_session_accepts_empty_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(paths::END_SESSION);
                then.status(200);
            })
            .await;

        assert!(client(&server).end_session("abc").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        // Port 9 (discard) is closed on test machines
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = api.restart_service("abc").await.unwrap_err();
        assert!(matches!(err, CallError::Network(_)), "got {err:?}");
    }
}
