use crate::config::ClientConfig;
use crate::error::AuthErrorKind;
use crate::oauth::nonce::{generate_pkce, generate_state, PkceChallenge};
use crate::types::AuthOutcome;

/// How the authorization page has to be shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// In-app browsing surface that reports every navigation.
    Embedded,
    /// External browser; the redirect comes back to a loopback listener.
    SystemBrowser,
}

/// One login attempt. Discarded once a redirect is seen or the attempt is
/// cancelled.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub auth_url: String,
    pub redirect_uri: String,
    pub state: String,
    pub presentation: Presentation,
    pkce: Option<PkceChallenge>,
}

impl AuthorizationRequest {
    pub fn code_verifier(&self) -> Option<&str> {
        self.pkce.as_ref().map(|p| p.code_verifier.as_str())
    }
}

/// Builds authorization requests. Pure construction, no network.
#[derive(Debug, Clone)]
pub struct AuthorizationLauncher {
    config: ClientConfig,
}

impl AuthorizationLauncher {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a new attempt with a fresh `state`.
    pub fn begin(&self) -> AuthOutcome {
        match self.build_request() {
            Ok(request) => AuthOutcome::NeedsBrowser(request),
            Err(kind) => AuthOutcome::Failed(kind),
        }
    }

    fn build_request(&self) -> Result<AuthorizationRequest, AuthErrorKind> {
        let cfg = &self.config;
        if cfg.client_id.trim().is_empty() || cfg.redirect_uri.trim().is_empty() {
            tracing::error!("Authorization requested without client id or redirect URI");
            return Err(AuthErrorKind::ConfigError);
        }

        let state = generate_state();
        let pkce = cfg.pkce.then(generate_pkce);

        let mut params: Vec<(&str, &str)> = vec![
            ("client_id", cfg.client_id.as_str()),
            ("redirect_uri", cfg.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", cfg.scope.as_str()),
            ("state", state.as_str()),
        ];
        if let Some(ref challenge) = pkce {
            params.push(("code_challenge", challenge.code_challenge.as_str()));
            params.push(("code_challenge_method", "S256"));
        }

        let endpoint = cfg.authorize_endpoint();
        let auth_url = reqwest::Url::parse_with_params(&endpoint, &params).map_err(|e| {
            tracing::error!("Invalid authorization endpoint {endpoint}: {e}");
            AuthErrorKind::ConfigError
        })?;

        Ok(AuthorizationRequest {
            auth_url: auth_url.into(),
            redirect_uri: cfg.redirect_uri.clone(),
            state,
            presentation: self.presentation(),
            pkce,
        })
    }

    /// The system browser can only hand the redirect back through a loopback
    /// listener; custom schemes need the embedded surface.
    fn presentation(&self) -> Presentation {
        if self.config.system_browser && is_loopback_http(&self.config.redirect_uri) {
            Presentation::SystemBrowser
        } else {
            Presentation::Embedded
        }
    }
}

/// `http://127.0.0.1:PORT/...` or `http://localhost:PORT/...`
pub fn is_loopback_http(uri: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(uri) else {
        return false;
    };
    url.scheme() == "http"
        && matches!(url.host_str(), Some("127.0.0.1") | Some("localhost") | Some("[::1]"))
        && url.port().is_some()
}
