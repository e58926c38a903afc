use std::path::PathBuf;

/// Failure kinds of an authorization or refresh step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthErrorKind {
    #[error("Client configuration is missing or incomplete")]
    ConfigError,

    #[error("Authorization was denied")]
    AuthorizationDenied,

    #[error("Network is unavailable")]
    NetworkUnavailable,

    #[error("Authorization grant was rejected by the token endpoint")]
    InvalidGrant,

    #[error("Failed to load authentication page. Please try again.")]
    PageLoadError,

    #[error("Server returned a malformed response")]
    MalformedResponse,
}

impl AuthErrorKind {
    /// Whether the failure ends the current flow and resets to signed out.
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthErrorKind::ConfigError | AuthErrorKind::InvalidGrant)
    }

    /// Whether the user can be offered a retry affordance.
    pub fn is_retryable(self) -> bool {
        !self.is_terminal()
    }

    pub fn code(self) -> &'static str {
        match self {
            AuthErrorKind::ConfigError => "config_error",
            AuthErrorKind::AuthorizationDenied => "authorization_denied",
            AuthErrorKind::NetworkUnavailable => "network_unavailable",
            AuthErrorKind::InvalidGrant => "invalid_grant",
            AuthErrorKind::PageLoadError => "page_load_error",
            AuthErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwiftyError {
    #[error("{0}")]
    Auth(#[from] AuthErrorKind),

    #[error("Not signed in. Run: swiftyhub login")]
    NotSignedIn,

    #[error("Access token was rejected by the API")]
    Unauthorized,

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Error in config {}: {detail}", path.display())]
    ConfigError { path: PathBuf, detail: String },

    #[error("Token storage error: {0}")]
    StorageError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SwiftyError {
    /// Error code string for structured JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            SwiftyError::Auth(kind) => kind.code(),
            SwiftyError::NotSignedIn => "not_signed_in",
            SwiftyError::Unauthorized => "unauthorized",
            SwiftyError::MissingConfig(_) => "config_error",
            SwiftyError::ConfigError { .. } => "config_error",
            SwiftyError::StorageError(_) => "storage_error",
            SwiftyError::ProtocolError(_) => "protocol_error",
            SwiftyError::IoError(_) => "io_error",
        }
    }

    /// The auth failure kind, if this error came out of the OAuth flow.
    pub fn auth_kind(&self) -> Option<AuthErrorKind> {
        match self {
            SwiftyError::Auth(kind) => Some(*kind),
            SwiftyError::MissingConfig(_) | SwiftyError::ConfigError { .. } => {
                Some(AuthErrorKind::ConfigError)
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let SwiftyError::MissingConfig(names) = self {
            obj.insert("missing".into(), serde_json::json!(names));
        }
        obj.insert("message".into(), serde_json::Value::String(self.to_string()));
        obj.insert("code".into(), serde_json::Value::String(self.code().to_string()));
        serde_json::json!({ "error": obj })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_config_lists_every_name() {
        let err = SwiftyError::MissingConfig(vec![
            "SWIFTY_CLIENT_ID".into(),
            "SWIFTY_REDIRECT_URI".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required configuration: SWIFTY_CLIENT_ID, SWIFTY_REDIRECT_URI"
        );
    }

    #[test]
    fn display_config_error() {
        let err = SwiftyError::ConfigError {
            path: PathBuf::from("/home/user/.swiftyhub/swiftyhub.json"),
            detail: "invalid JSON".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error in config /home/user/.swiftyhub/swiftyhub.json: invalid JSON"
        );
    }

    #[test]
    fn auth_kind_wraps_transparently() {
        let err: SwiftyError = AuthErrorKind::NetworkUnavailable.into();
        assert_eq!(err.to_string(), "Network is unavailable");
        assert_eq!(err.code(), "network_unavailable");
        assert_eq!(err.auth_kind(), Some(AuthErrorKind::NetworkUnavailable));
    }

    #[test]
    fn terminal_kinds() {
        assert!(AuthErrorKind::ConfigError.is_terminal());
        assert!(AuthErrorKind::InvalidGrant.is_terminal());
        assert!(AuthErrorKind::NetworkUnavailable.is_retryable());
        assert!(AuthErrorKind::PageLoadError.is_retryable());
        assert!(AuthErrorKind::AuthorizationDenied.is_retryable());
        assert!(AuthErrorKind::MalformedResponse.is_retryable());
    }

    #[test]
    fn config_errors_map_to_config_kind() {
        assert_eq!(
            SwiftyError::MissingConfig(vec!["X".into()]).auth_kind(),
            Some(AuthErrorKind::ConfigError)
        );
        assert_eq!(SwiftyError::NotSignedIn.auth_kind(), None);
    }

    #[test]
    fn error_to_json_structure() {
        let err = SwiftyError::MissingConfig(vec!["SWIFTY_CLIENT_ID".into()]);
        let json = err.to_json();
        let error_obj = json.get("error").expect("should have error key");
        assert_eq!(error_obj["code"], "config_error");
        assert_eq!(error_obj["missing"][0], "SWIFTY_CLIENT_ID");
        assert!(error_obj["message"]
            .as_str()
            .unwrap()
            .contains("SWIFTY_CLIENT_ID"));
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(SwiftyError::NotSignedIn.code(), "not_signed_in");
        assert_eq!(SwiftyError::Unauthorized.code(), "unauthorized");
        assert_eq!(SwiftyError::StorageError("e".into()).code(), "storage_error");
        assert_eq!(SwiftyError::ProtocolError("e".into()).code(), "protocol_error");
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "test");
        assert_eq!(SwiftyError::IoError(io_err).code(), "io_error");
    }
}
