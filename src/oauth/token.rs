use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::AuthErrorKind;
use crate::types::Session;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7200;

/// What is being traded at the token endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    AuthorizationCode {
        /// Already percent-decoded; see [`decode_param`].
        code: &'a str,
        redirect_uri: &'a str,
        code_verifier: Option<&'a str>,
    },
    RefreshToken(&'a str),
}

/// Decode `%XX` escapes of a raw redirect parameter once, before it is sent
/// form-encoded. `+` stays literal; malformed escapes and non-UTF-8 results
/// leave the value untouched.
pub fn decode_param(raw: &str) -> Cow<'_, str> {
    if !raw.contains('%') {
        return Cow::Borrowed(raw);
    }
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            out.push((hex_value(bytes[i + 1]) << 4) | hex_value(bytes[i + 2]));
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(raw),
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }
}

impl std::fmt::Debug for dyn TokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExchange").finish()
    }
}

#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trade a grant for a fresh session. One network call, no retries.
    async fn exchange(&self, grant: Grant<'_>) -> Result<Session, AuthErrorKind>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    /// A refresh response may omit `refresh_token`, meaning the old one stays
    /// valid. A code exchange without one cannot produce a session.
    fn into_session(self, grant: Grant<'_>) -> Result<Session, AuthErrorKind> {
        let refresh_token = match (self.refresh_token, grant) {
            (Some(token), _) if !token.is_empty() => token,
            (_, Grant::RefreshToken(previous)) => previous.to_string(),
            _ => {
                tracing::warn!("Token response carried no refresh token");
                return Err(AuthErrorKind::MalformedResponse);
            }
        };
        if self.access_token.is_empty() {
            return Err(AuthErrorKind::MalformedResponse);
        }
        let lifetime = self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(Session {
            access_token: self.access_token,
            refresh_token,
            token_type: self.token_type,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(lifetime),
            profile: None,
        })
    }
}

/// Classify a non-success status from the token endpoint.
///
/// 4xx means the grant itself was refused, except 408/429 which are about
/// the request rather than the credential.
fn classify_status(status: reqwest::StatusCode) -> AuthErrorKind {
    match status.as_u16() {
        408 | 429 => AuthErrorKind::NetworkUnavailable,
        400..=499 => AuthErrorKind::InvalidGrant,
        _ => AuthErrorKind::NetworkUnavailable,
    }
}

/// Talks to the authorization server's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: Option<String>,
}

impl TokenExchangeClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            token_endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn form<'a>(&'a self, grant: &Grant<'a>) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("grant_type", grant.grant_type()),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        match *grant {
            Grant::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                form.push(("code", code));
                form.push(("redirect_uri", redirect_uri));
                if let Some(verifier) = code_verifier {
                    form.push(("code_verifier", verifier));
                }
            }
            Grant::RefreshToken(token) => form.push(("refresh_token", token)),
        }
        form
    }
}

#[async_trait]
impl TokenExchange for TokenExchangeClient {
    async fn exchange(&self, grant: Grant<'_>) -> Result<Session, AuthErrorKind> {
        let grant_type = grant.grant_type();
        let resp = self
            .http
            .post(&self.token_endpoint)
            .form(&self.form(&grant))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Token request ({grant_type}) failed: {e}");
                AuthErrorKind::NetworkUnavailable
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body: TokenErrorBody = resp.json().await.unwrap_or_default();
            tracing::warn!(
                "Token endpoint rejected {grant_type} with status {status}: {} {}",
                body.error.as_deref().unwrap_or("-"),
                body.error_description.as_deref().unwrap_or("")
            );
            return Err(classify_status(status));
        }

        let token_resp: TokenResponse = resp.json().await.map_err(|e| {
            tracing::warn!("Failed to parse token response: {e}");
            AuthErrorKind::MalformedResponse
        })?;

        token_resp.into_session(grant)
    }
}
