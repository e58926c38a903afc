use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::profile::Profile;
use crate::error::AuthErrorKind;
use crate::oauth::launcher::AuthorizationRequest;

/// A live, authenticated session.
///
/// Only `refresh_token` ever leaves memory (through the token store).
#[derive(Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Option<Profile>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds of validity left, clamped at zero.
    pub fn seconds_remaining(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    /// `Authorization` header value for API calls.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("profile", &self.profile.as_ref().map(|p| p.login.as_str()))
            .finish()
    }
}

/// Result of one step of the login flow.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// The caller must present a browser surface for this request.
    NeedsBrowser(AuthorizationRequest),
    Authenticated(Session),
    Failed(AuthErrorKind),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn error(&self) -> Option<AuthErrorKind> {
        match self {
            AuthOutcome::Failed(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// States of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SignedOut,
    Authorizing,
    AwaitingRedirect,
    Exchanging,
    SignedIn,
    Refreshing,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::SignedOut => "signed_out",
            SessionState::Authorizing => "authorizing",
            SessionState::AwaitingRedirect => "awaiting_redirect",
            SessionState::Exchanging => "exchanging",
            SessionState::SignedIn => "signed_in",
            SessionState::Refreshing => "refreshing",
        }
    }

    /// A login attempt is open (browser presented or code being exchanged).
    pub fn is_login_in_flight(self) -> bool {
        matches!(
            self,
            SessionState::Authorizing | SessionState::AwaitingRedirect | SessionState::Exchanging
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
