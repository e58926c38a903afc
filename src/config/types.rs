use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.intra.42.fr";
pub const DEFAULT_SCOPE: &str = "public";
pub const DEFAULT_AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";
pub const DEFAULT_PROFILE_PATH: &str = "/v2/me";

/// Settings as they appear in a config file. Every field is optional here;
/// [`super::loader::resolve`] fills defaults and rejects missing required ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub authorize_path: Option<String>,
    #[serde(default)]
    pub token_path: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub system_browser: Option<bool>,
    #[serde(default)]
    pub pkce: Option<bool>,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

/// Validated client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub api_base: String,
    pub authorize_path: String,
    pub token_path: String,
    pub profile_path: String,
    pub system_browser: bool,
    pub pkce: bool,
    pub store_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Minimal config with library defaults for everything optional.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            authorize_path: DEFAULT_AUTHORIZE_PATH.to_string(),
            token_path: DEFAULT_TOKEN_PATH.to_string(),
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
            system_browser: false,
            pkce: false,
            store_path: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn authorize_endpoint(&self) -> String {
        join_url(&self.api_base, &self.authorize_path)
    }

    pub fn token_endpoint(&self) -> String {
        join_url(&self.api_base, &self.token_path)
    }

    pub fn profile_endpoint(&self) -> String {
        join_url(&self.api_base, &self.profile_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
