//! Error types for Syndica

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyndicaError>;

#[derive(Error, Debug)]
pub enum SyndicaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Platform API error: {0}")]
    Api(#[from] ApiError),

    #[error("State error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyndicaError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicaError::InvalidInput(_) => 3,
            SyndicaError::Api(ApiError::AuthExpired(_)) => 2,
            SyndicaError::Credential(_) => 2,
            SyndicaError::Api(_) => 1,
            SyndicaError::Config(_) => 1,
            SyndicaError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("No credentials found for {platform}: {hint}")]
    Missing { platform: String, hint: String },

    #[error("Failed to read credential file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed credential data for {platform}: {reason}")]
    Malformed { platform: String, reason: String },
}

/// Uniform classification of platform API failures.
///
/// Every adapter surfaces transport and HTTP errors through this taxonomy so
/// callers can decide what to do without inspecting platform-specific shapes:
///
/// - `AuthExpired`: re-authenticate; do not retry as-is
/// - `NotFound`: treat the resource as gone; do not retry
/// - `InvalidRequest`: the platform rejected the request; message is verbatim
/// - `PlatformUnavailable`: server-side failure; safe to retry later
/// - `NetworkUnreachable`: no response received; check connectivity
/// - `MediaUnavailable`: the post's media cannot be delivered to this platform
/// - `Unknown`: anything else, with the raw message attached
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("authentication expired or rejected: {0}")]
    AuthExpired(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("unexpected platform error: {0}")]
    Unknown(String),
}

impl ApiError {
    /// Whether a later retry of the same request could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::PlatformUnavailable(_) | ApiError::NetworkUnreachable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = SyndicaError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_auth_expired() {
        let error = SyndicaError::Api(ApiError::AuthExpired("token expired".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_missing_credentials() {
        let error = SyndicaError::Credential(CredentialError::Missing {
            platform: "facebook".to_string(),
            hint: "set facebook.access_token_file".to_string(),
        });
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_api_errors() {
        for error in [
            ApiError::NotFound("gone".to_string()),
            ApiError::InvalidRequest("bad".to_string()),
            ApiError::PlatformUnavailable("503".to_string()),
            ApiError::NetworkUnreachable("dns".to_string()),
            ApiError::MediaUnavailable("no public url".to_string()),
            ApiError::Unknown("?".to_string()),
        ] {
            assert_eq!(SyndicaError::Api(error).exit_code(), 1);
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::PlatformUnavailable("502".to_string()).is_retryable());
        assert!(ApiError::NetworkUnreachable("timeout".to_string()).is_retryable());
        assert!(!ApiError::AuthExpired("401".to_string()).is_retryable());
        assert!(!ApiError::NotFound("404".to_string()).is_retryable());
        assert!(!ApiError::InvalidRequest("400".to_string()).is_retryable());
        assert!(!ApiError::MediaUnavailable("raw blob".to_string()).is_retryable());
    }

    #[test]
    fn test_error_message_formatting() {
        let error = SyndicaError::Api(ApiError::InvalidRequest(
            "message must not be empty".to_string(),
        ));
        assert_eq!(
            format!("{}", error),
            "Platform API error: invalid request: message must not be empty"
        );
    }

    #[test]
    fn test_error_conversion_from_api_error() {
        let api_error = ApiError::NotFound("post 123".to_string());
        let error: SyndicaError = api_error.into();
        assert!(matches!(error, SyndicaError::Api(ApiError::NotFound(_))));
    }

    #[test]
    fn test_credential_missing_message_names_platform() {
        let error = CredentialError::Missing {
            platform: "tiktok".to_string(),
            hint: "set tiktok.token_file in the config".to_string(),
        };
        let message = format!("{}", error);
        assert!(message.contains("tiktok"));
        assert!(message.contains("token_file"));
    }
}
