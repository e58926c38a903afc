use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::api::profile::{Profile, ProfileClient, ProfileSource};
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{AuthErrorKind, SwiftyError};
use crate::oauth::interceptor::{Interception, NavigationEvent, RedirectInterceptor};
use crate::oauth::launcher::{AuthorizationLauncher, AuthorizationRequest};
use crate::oauth::store::TokenStore;
use crate::oauth::token::{decode_param, Grant, TokenExchange, TokenExchangeClient};
use crate::types::{AuthOutcome, Session, SessionState};

const TRANSITION_BUFFER: usize = 64;

/// The open login attempt: the request and the surface watching for its
/// redirect.
#[derive(Debug)]
struct PendingLogin {
    request: AuthorizationRequest,
    interceptor: RedirectInterceptor,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    session: Option<Session>,
    pending: Option<PendingLogin>,
    /// Bumped whenever a flow is cancelled, superseded or logged out.
    /// Network results tagged with an older epoch are dropped.
    epoch: u64,
    /// Bumped whenever a new session is installed.
    revision: u64,
    /// Bumped whenever a refresh exchange completes, successful or not.
    refreshes: u64,
    last_refresh_error: Option<AuthErrorKind>,
}

impl Inner {
    fn marks(&self) -> Marks {
        Marks {
            revision: self.revision,
            refreshes: self.refreshes,
        }
    }
}

/// Counters observed together with a session, so a caller that later
/// waits for the refresh lock can tell whether a refresh already ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marks {
    revision: u64,
    refreshes: u64,
}

/// Point-in-time view for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub online: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub login: Option<String>,
}

/// Owns the one live session of the process and drives login, refresh and
/// logout.
#[derive(Debug)]
pub struct SessionController {
    launcher: AuthorizationLauncher,
    exchange: Arc<dyn TokenExchange>,
    profiles: Arc<dyn ProfileSource>,
    store: Arc<dyn TokenStore>,
    connectivity: ConnectivityMonitor,
    inner: Mutex<Inner>,
    /// Held for the duration of any refresh-token exchange and while a login
    /// is being opened.
    refresh_lock: tokio::sync::Mutex<()>,
    session_tx: watch::Sender<Option<Session>>,
    transitions_tx: broadcast::Sender<SessionState>,
}

impl SessionController {
    /// Controller talking to the real token and profile endpoints.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Self {
        let http = reqwest::Client::new();
        let exchange = Arc::new(TokenExchangeClient::with_http(http.clone(), &config));
        let profiles = Arc::new(ProfileClient::with_http(http, &config));
        Self::with_parts(
            AuthorizationLauncher::new(config),
            exchange,
            profiles,
            store,
            ConnectivityMonitor::new(),
        )
    }

    pub fn with_parts(
        launcher: AuthorizationLauncher,
        exchange: Arc<dyn TokenExchange>,
        profiles: Arc<dyn ProfileSource>,
        store: Arc<dyn TokenStore>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        let (transitions_tx, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            launcher,
            exchange,
            profiles,
            store,
            connectivity,
            inner: Mutex::new(Inner {
                state: SessionState::SignedOut,
                session: None,
                pending: None,
                epoch: 0,
                revision: 0,
                refreshes: 0,
                last_refresh_error: None,
            }),
            refresh_lock: tokio::sync::Mutex::new(()),
            session_tx,
            transitions_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, inner: &mut Inner, state: SessionState) {
        if inner.state != state {
            tracing::debug!("Session state {} -> {}", inner.state, state);
        }
        inner.state = state;
        // No receivers is fine.
        let _ = self.transitions_tx.send(state);
    }

    /// Resting state once a flow step ends without a new session.
    fn settle(&self, inner: &mut Inner) {
        let next = if inner.session.is_some() {
            SessionState::SignedIn
        } else {
            SessionState::SignedOut
        };
        self.enter(inner, next);
    }

    /// `SignedIn` entry action: keep the session, persist its refresh token,
    /// tell subscribers.
    fn install(&self, inner: &mut Inner, session: Session) -> Session {
        if let Err(e) = self.store.save(&session.refresh_token) {
            // The session still works for this run; only restart recovery is lost.
            tracing::error!("Failed to persist refresh token: {e}");
        }
        inner.session = Some(session.clone());
        inner.revision += 1;
        self.enter(inner, SessionState::SignedIn);
        self.session_tx.send_replace(Some(session.clone()));
        session
    }

    /// Forced sign-out: forget the session and the stored refresh token.
    fn drop_session(&self, inner: &mut Inner) -> Result<(), SwiftyError> {
        inner.epoch += 1;
        inner.pending = None;
        let had_session = inner.session.take().is_some();
        self.enter(inner, SessionState::SignedOut);
        if had_session {
            self.session_tx.send_replace(None);
        }
        self.store.clear()
    }

    fn drop_session_logged(&self, inner: &mut Inner) {
        if let Err(e) = self.drop_session(inner) {
            tracing::error!("Failed to clear token store: {e}");
        }
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// The request currently waiting for its redirect, if any.
    pub fn pending_request(&self) -> Option<AuthorizationRequest> {
        self.lock().pending.as_ref().map(|p| p.request.clone())
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn config(&self) -> &ClientConfig {
        self.launcher.config()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state,
            online: self.connectivity.is_online(),
            expires_at: inner.session.as_ref().map(|s| s.expires_at),
            login: inner
                .session
                .as_ref()
                .and_then(|s| s.profile.as_ref())
                .map(|p| p.login.clone()),
        }
    }

    /// Session changes: `Some` on sign-in and every refresh, `None` on sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session_tx.subscribe()
    }

    /// Every state entered, in order.
    pub fn transitions(&self) -> broadcast::Receiver<SessionState> {
        self.transitions_tx.subscribe()
    }

    /// Cold start: restore the session from a stored refresh token without
    /// showing any browser.
    ///
    /// A network failure here leaves the controller signed out with the
    /// token still stored, so a later attempt can succeed.
    pub async fn init(&self) -> SessionState {
        let _guard = self.refresh_lock.lock().await;

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Could not read token store: {e}");
                None
            }
        };
        let Some(refresh_token) = stored else {
            tracing::debug!("No stored refresh token; staying signed out");
            return self.state();
        };

        let epoch = {
            let inner = self.lock();
            if inner.session.is_some() || inner.state != SessionState::SignedOut {
                return inner.state;
            }
            inner.epoch
        };

        match self.refresh_locked(refresh_token, epoch).await {
            Ok(_) => tracing::info!("Session restored from stored refresh token"),
            Err(e) => tracing::info!("Silent refresh did not restore a session: {e}"),
        }
        self.state()
    }

    /// Exchange a refresh token. Caller must hold `refresh_lock`.
    async fn refresh_locked(
        &self,
        refresh_token: String,
        epoch: u64,
    ) -> Result<(Session, Marks), SwiftyError> {
        {
            let mut inner = self.lock();
            self.enter(&mut inner, SessionState::Refreshing);
        }

        let result = self
            .exchange
            .exchange(Grant::RefreshToken(&refresh_token))
            .await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::warn!("Discarding refresh result; session was signed out meanwhile");
            return Err(SwiftyError::NotSignedIn);
        }

        inner.refreshes += 1;
        inner.last_refresh_error = result.as_ref().err().copied();
        match result {
            Ok(mut session) => {
                if session.profile.is_none() {
                    session.profile = inner.session.as_ref().and_then(|s| s.profile.clone());
                }
                let session = self.install(&mut inner, session);
                Ok((session, inner.marks()))
            }
            Err(AuthErrorKind::InvalidGrant) => {
                tracing::info!("Refresh token rejected; signing out");
                self.drop_session_logged(&mut inner);
                Err(AuthErrorKind::InvalidGrant.into())
            }
            Err(kind) => {
                // The in-memory session, if any, may still be valid.
                self.settle(&mut inner);
                Err(kind.into())
            }
        }
    }

    /// Refresh the live session. Concurrent callers share one exchange: a
    /// caller that waited while another refresh completed gets that result,
    /// failure included, instead of spending the refresh token again.
    pub async fn refresh(&self) -> Result<Session, SwiftyError> {
        let seen = self.lock().marks();
        self.refresh_since(seen).await.map(|(session, _)| session)
    }

    /// Refresh unless a refresh finished after `seen` was observed.
    async fn refresh_since(&self, seen: Marks) -> Result<(Session, Marks), SwiftyError> {
        let _guard = self.refresh_lock.lock().await;

        let (refresh_token, epoch) = {
            let inner = self.lock();
            match inner.session {
                Some(ref session) if inner.revision != seen.revision => {
                    return Ok((session.clone(), inner.marks()));
                }
                _ if inner.refreshes != seen.refreshes => {
                    if let Some(kind) = inner.last_refresh_error {
                        return Err(kind.into());
                    }
                }
                _ => {}
            }
            match inner.session {
                Some(ref session) => (session.refresh_token.clone(), inner.epoch),
                None => return Err(SwiftyError::NotSignedIn),
            }
        };
        self.refresh_locked(refresh_token, epoch).await
    }

    /// The live session with a usable access token, refreshing first if the
    /// current one expired.
    async fn usable_session(&self) -> Result<(Session, Marks), SwiftyError> {
        let (session, state, seen) = {
            let inner = self.lock();
            (inner.session.clone(), inner.state, inner.marks())
        };
        match session {
            Some(session) if !session.is_expired() => Ok((session, seen)),
            Some(_) => {
                tracing::debug!("Access token expired; refreshing");
                self.refresh_since(seen).await
            }
            // A cold-start refresh is running; wait for its outcome.
            None if state == SessionState::Refreshing => self.refresh_since(seen).await,
            None => Err(SwiftyError::NotSignedIn),
        }
    }

    /// A usable access token, refreshing first if the current one expired.
    pub async fn access_token(&self) -> Result<String, SwiftyError> {
        Ok(self.usable_session().await?.0.access_token)
    }

    /// Open a login attempt.
    ///
    /// Already signed in: returns the current session. A login already in
    /// flight is superseded: its request is cancelled and any exchange it
    /// dispatched is discarded.
    pub async fn begin_login(&self) -> AuthOutcome {
        let _guard = self.refresh_lock.lock().await;
        let mut inner = self.lock();

        if let Some(ref session) = inner.session {
            return AuthOutcome::Authenticated(session.clone());
        }
        if inner.pending.take().is_some() || inner.state.is_login_in_flight() {
            tracing::info!("Superseding the open login attempt");
            inner.epoch += 1;
        }
        if !self.connectivity.is_online() {
            tracing::warn!("Starting login while the device is marked offline");
        }

        self.enter(&mut inner, SessionState::Authorizing);
        match self.launcher.begin() {
            AuthOutcome::NeedsBrowser(request) => {
                let interceptor = RedirectInterceptor::new(
                    request.redirect_uri.clone(),
                    request.state.clone(),
                    self.connectivity.clone(),
                );
                inner.pending = Some(PendingLogin {
                    request: request.clone(),
                    interceptor,
                });
                self.enter(&mut inner, SessionState::AwaitingRedirect);
                AuthOutcome::NeedsBrowser(request)
            }
            AuthOutcome::Authenticated(session) => {
                AuthOutcome::Authenticated(self.install(&mut inner, session))
            }
            AuthOutcome::Failed(kind) => {
                self.enter(&mut inner, SessionState::SignedOut);
                AuthOutcome::Failed(kind)
            }
        }
    }

    /// Feed one event from the browser surface.
    ///
    /// Returns `None` while the flow is still going (or the event was
    /// ignored or the attempt was cancelled). `Failed(PageLoadError)` keeps
    /// the attempt open for a retry; every other outcome ends it.
    pub async fn handle_navigation(&self, event: NavigationEvent) -> Option<AuthOutcome> {
        let (code, request, epoch) = {
            let mut inner = self.lock();
            let pending = inner.pending.as_mut()?;
            let interception = pending.interceptor.handle(event)?;
            match interception {
                Interception::Code(code) => {
                    let pending = inner.pending.take()?;
                    self.enter(&mut inner, SessionState::Exchanging);
                    (code, pending.request, inner.epoch)
                }
                Interception::Failed(AuthErrorKind::PageLoadError) => {
                    return Some(AuthOutcome::Failed(AuthErrorKind::PageLoadError));
                }
                Interception::Failed(kind) => {
                    inner.pending = None;
                    self.settle(&mut inner);
                    return Some(AuthOutcome::Failed(kind));
                }
                Interception::Cancelled => {
                    tracing::debug!("Browser surface closed; login cancelled");
                    inner.pending = None;
                    self.settle(&mut inner);
                    return None;
                }
            }
        };

        self.exchange_code(code, request, epoch).await
    }

    async fn exchange_code(
        &self,
        code: String,
        request: AuthorizationRequest,
        epoch: u64,
    ) -> Option<AuthOutcome> {
        let code = decode_param(&code);
        let grant = Grant::AuthorizationCode {
            code: &code,
            redirect_uri: &request.redirect_uri,
            code_verifier: request.code_verifier(),
        };
        let result = self.exchange.exchange(grant).await;

        let mut inner = self.lock();
        if inner.epoch != epoch || inner.state != SessionState::Exchanging {
            tracing::warn!("Discarding token exchange result for a cancelled login");
            return None;
        }

        match result {
            Ok(session) => {
                tracing::info!("Signed in");
                Some(AuthOutcome::Authenticated(self.install(&mut inner, session)))
            }
            Err(AuthErrorKind::InvalidGrant) => {
                self.drop_session_logged(&mut inner);
                Some(AuthOutcome::Failed(AuthErrorKind::InvalidGrant))
            }
            Err(kind) => {
                self.settle(&mut inner);
                Some(AuthOutcome::Failed(kind))
            }
        }
    }

    /// Abort the open login attempt, if any. An exchange already on the wire
    /// completes but its result is dropped.
    pub fn cancel_login(&self) {
        let mut inner = self.lock();
        let was_open = inner.pending.take().is_some();
        if was_open || inner.state == SessionState::Exchanging {
            tracing::debug!("Login cancelled");
            inner.epoch += 1;
            self.settle(&mut inner);
        }
    }

    /// Sign out and forget the stored refresh token. A no-op when there is
    /// nothing to forget.
    pub fn logout(&self) -> Result<(), SwiftyError> {
        let mut inner = self.lock();
        let idle = inner.state == SessionState::SignedOut
            && inner.session.is_none()
            && inner.pending.is_none();
        if idle && self.store.load()?.is_none() {
            tracing::debug!("Logout requested while already signed out");
            return Ok(());
        }

        self.drop_session(&mut inner)?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Fetch the user record and attach it to the live session.
    ///
    /// A rejected access token gets one refresh and one retry.
    pub async fn fetch_profile(&self) -> Result<Profile, SwiftyError> {
        let (session, seen) = self.usable_session().await?;
        let profile = match self.profiles.fetch_profile(&session.access_token).await {
            Err(SwiftyError::Unauthorized) => {
                tracing::debug!("Access token rejected by the API; refreshing once");
                let (session, _) = self.refresh_since(seen).await?;
                self.profiles.fetch_profile(&session.access_token).await?
            }
            other => other?,
        };

        let mut inner = self.lock();
        if let Some(ref mut session) = inner.session {
            session.profile = Some(profile.clone());
            self.session_tx.send_replace(Some(session.clone()));
        }
        Ok(profile)
    }
}
