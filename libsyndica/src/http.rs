//! Request pipeline shared by all platform adapters
//!
//! Every outgoing request goes through [`ApiClient`]: auth is attached
//! according to the platform's scheme, request/response metadata is logged
//! with secret values redacted, and failures are classified into the
//! [`ApiError`] taxonomy. OAuth-guarded clients refresh their access token
//! transparently before the request; a failed refresh classifies as
//! `AuthExpired` so callers can prompt for re-authentication specifically.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::credentials::OAuthCredentials;
use crate::error::{ApiError, Result};
use crate::types::PlatformId;

/// Leeway subtracted from token expiry so a token is refreshed shortly
/// before the platform would reject it.
const EXPIRY_LEEWAY_SECS: i64 = 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How a platform expects authentication on each request.
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` header.
    Bearer(SecretString),
    /// Access key appended to the query string of every request.
    QueryKey { param: String, key: SecretString },
    /// OAuth access token with transparent refresh.
    OAuth(Mutex<TokenState>),
}

impl AuthScheme {
    pub fn from_oauth(creds: OAuthCredentials) -> Self {
        AuthScheme::OAuth(Mutex::new(TokenState::new(creds)))
    }
}

/// Cached OAuth token material guarded by the pipeline.
pub struct TokenState {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: Option<i64>,
    client_id: String,
    client_secret: SecretString,
    token_url: String,
}

impl TokenState {
    pub fn new(creds: OAuthCredentials) -> Self {
        Self {
            access_token: creds.access_token,
            refresh_token: creds.refresh_token,
            expires_at: creds.expires_at,
            client_id: creds.client_id,
            client_secret: creds.client_secret,
            token_url: creds.token_url,
        }
    }

    /// A token with no recorded expiry is trusted until the platform says
    /// otherwise.
    fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(at) => now + EXPIRY_LEEWAY_SECS >= at,
            None => false,
        }
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

enum Payload {
    None,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(reqwest::multipart::Form),
}

/// HTTP client bound to one platform's base URL and auth scheme.
pub struct ApiClient {
    platform: PlatformId,
    base_url: String,
    auth: AuthScheme,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(platform: PlatformId, base_url: impl Into<String>, auth: AuthScheme) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Unknown(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            platform,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            http,
        })
    }

    pub fn platform(&self) -> PlatformId {
        self.platform
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.send(Method::GET, path, query, Payload::None).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        self.send(Method::POST, path, &[], Payload::Json(body)).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
    ) -> Result<T> {
        let owned = form
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.send(Method::POST, path, query, Payload::Form(owned))
            .await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        self.send(Method::POST, path, query, Payload::Multipart(form))
            .await
    }

    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.send(Method::DELETE, path, query, Payload::None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Payload,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut pairs: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        // Auth attachment. The secret query param is tracked by name so it
        // can be redacted from the log line below.
        let mut secret_param = None;
        let bearer = match &self.auth {
            AuthScheme::Bearer(token) => Some(token.expose_secret().to_string()),
            AuthScheme::QueryKey { param, key } => {
                secret_param = Some(param.clone());
                pairs.push((param.clone(), key.expose_secret().to_string()));
                None
            }
            AuthScheme::OAuth(_) => Some(self.current_access_token().await?),
        };

        debug!(
            platform = %self.platform,
            %method,
            path,
            query = %redact_query(&pairs, secret_param.as_deref()),
            "sending platform request"
        );

        let mut request = self.http.request(method.clone(), &url).query(&pairs);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request = match payload {
            Payload::None => request,
            Payload::Json(body) => request.json(&body),
            Payload::Form(form) => request.form(&form),
            Payload::Multipart(form) => request.multipart(form),
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        debug!(platform = %self.platform, %method, path, status = status.as_u16(), "platform response");

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                ApiError::Unknown(format!(
                    "{}: failed to decode response from {}: {}",
                    self.platform, path, e
                ))
                .into()
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body).into())
    }

    /// Returns a valid access token, refreshing first when the cached one
    /// has expired. Only meaningful for `AuthScheme::OAuth`.
    async fn current_access_token(&self) -> Result<String> {
        let AuthScheme::OAuth(state) = &self.auth else {
            return Err(ApiError::Unknown("not an OAuth client".to_string()).into());
        };

        let now = chrono::Utc::now().timestamp();
        let (expired, access, refresh, token_url, client_id, client_secret) = {
            let guard = state.lock().expect("token state poisoned");
            (
                guard.is_expired(now),
                guard.access_token.expose_secret().to_string(),
                guard.refresh_token.expose_secret().to_string(),
                guard.token_url.clone(),
                guard.client_id.clone(),
                guard.client_secret.expose_secret().to_string(),
            )
        };

        if !expired {
            return Ok(access);
        }

        debug!(platform = %self.platform, "access token expired, refreshing");

        let response = self
            .http
            .post(&token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                ApiError::AuthExpired(format!(
                    "{}: token refresh request failed: {}",
                    self.platform, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(platform = %self.platform, status = status.as_u16(), "token refresh rejected");
            return Err(ApiError::AuthExpired(format!(
                "{}: token refresh rejected with status {}: {}",
                self.platform,
                status.as_u16(),
                extract_error_message(&body)
            ))
            .into());
        }

        let fresh: RefreshResponse = response.json().await.map_err(|e| {
            ApiError::AuthExpired(format!(
                "{}: malformed token refresh response: {}",
                self.platform, e
            ))
        })?;

        let access = fresh.access_token.clone();
        let mut guard = state.lock().expect("token state poisoned");
        guard.access_token = SecretString::from(fresh.access_token);
        guard.expires_at = fresh.expires_in.map(|secs| now + secs);
        if let Some(rotated) = fresh.refresh_token {
            guard.refresh_token = SecretString::from(rotated);
        }

        Ok(access)
    }
}

/// Classify a transport-level failure: no HTTP response was received.
fn classify_transport(error: &reqwest::Error) -> crate::error::SyndicaError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        ApiError::NetworkUnreachable(error.to_string()).into()
    } else {
        ApiError::Unknown(error.to_string()).into()
    }
}

/// Classify an HTTP error status into the uniform taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => ApiError::AuthExpired(message),
        404 => ApiError::NotFound(message),
        400 => ApiError::InvalidRequest(message),
        500..=599 => ApiError::PlatformUnavailable(format!("{}: {}", status.as_u16(), message)),
        code => ApiError::Unknown(format!("{}: {}", code, message)),
    }
}

/// Pull a human-readable message out of a platform error body.
///
/// Platforms disagree on the envelope; the common shapes are tried in
/// order and the raw body is the fallback.
pub(crate) fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for path in [
            &["error", "message"][..],
            &["error", "error_user_msg"][..],
            &["message"][..],
            &["error_description"][..],
            &["detail"][..],
        ] {
            let mut cursor = &value;
            let mut found = true;
            for segment in path {
                match cursor.get(segment) {
                    Some(next) => cursor = next,
                    None => {
                        found = false;
                        break;
                    }
                }
            }
            if found {
                if let Some(text) = cursor.as_str() {
                    return text.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error detail provided".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

/// Render query pairs for logging with the secret parameter value hidden.
pub(crate) fn redact_query(pairs: &[(String, String)], secret_param: Option<&str>) -> String {
    pairs
        .iter()
        .map(|(k, v)| {
            if secret_param == Some(k.as_str()) {
                format!("{}=***", k)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_auth() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::AuthExpired(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            ApiError::AuthExpired(_)
        ));
    }

    #[test]
    fn test_classify_status_not_found() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_classify_status_invalid_request_keeps_message_verbatim() {
        let body = r#"{"error": {"message": "Message must not be empty"}}"#;
        match classify_status(StatusCode::BAD_REQUEST, body) {
            ApiError::InvalidRequest(msg) => assert_eq!(msg, "Message must not be empty"),
            other => panic!("expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_status_server_errors() {
        for code in [500u16, 502, 503, 599] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(
                matches!(classify_status(status, ""), ApiError::PlatformUnavailable(_)),
                "status {} should classify as PlatformUnavailable",
                code
            );
        }
    }

    #[test]
    fn test_classify_status_other() {
        assert!(matches!(
            classify_status(StatusCode::IM_A_TEAPOT, "short and stout"),
            ApiError::Unknown(_)
        ));
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error": {"message": "nope"}}"#),
            "nope"
        );
        assert_eq!(extract_error_message(r#"{"message": "denied"}"#), "denied");
        assert_eq!(
            extract_error_message(r#"{"error_description": "expired"}"#),
            "expired"
        );
        assert_eq!(extract_error_message("plain text"), "plain text");
        assert_eq!(extract_error_message("  "), "no error detail provided");
    }

    #[test]
    fn test_redact_query_hides_secret_param() {
        let pairs = vec![
            ("limit".to_string(), "5".to_string()),
            ("access_token".to_string(), "very-secret".to_string()),
        ];
        let rendered = redact_query(&pairs, Some("access_token"));
        assert_eq!(rendered, "limit=5&access_token=***");
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn test_redact_query_without_secret() {
        let pairs = vec![("limit".to_string(), "5".to_string())];
        assert_eq!(redact_query(&pairs, None), "limit=5");
    }

    fn token_state(expires_at: Option<i64>) -> TokenState {
        TokenState::new(OAuthCredentials {
            access_token: SecretString::from("at".to_string()),
            refresh_token: SecretString::from("rt".to_string()),
            expires_at,
            client_id: "cid".to_string(),
            client_secret: SecretString::from("cs".to_string()),
            token_url: "https://example.com/token".to_string(),
        })
    }

    #[test]
    fn test_token_state_expiry() {
        let now = 1_000_000;
        assert!(!token_state(None).is_expired(now));
        assert!(!token_state(Some(now + 3600)).is_expired(now));
        // Inside the leeway window counts as expired.
        assert!(token_state(Some(now + 30)).is_expired(now));
        assert!(token_state(Some(now - 10)).is_expired(now));
    }
}
