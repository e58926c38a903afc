use crate::connectivity::ConnectivityMonitor;
use crate::error::AuthErrorKind;

/// Load-failure descriptions that mean the device cannot reach the network,
/// as opposed to the page itself failing.
const NETWORK_SIGNATURES: &[&str] = &[
    "net::",
    "err_connection_",
    "err_internet_disconnected",
    "err_name_not_resolved",
    "err_address_unreachable",
    "err_network_changed",
    "connection refused",
    "host unreachable",
    "network is unreachable",
    "could not resolve host",
    "dns",
    "offline",
];

/// Events reported by the browser surface, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    LoadStarted { url: String },
    Navigated { url: String },
    Loaded,
    LoadFailed { description: String },
    /// User asked to reload after a non-network failure.
    Retry,
    /// Surface dismissed, by the user or programmatically.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptorState {
    Loading,
    Active,
    Matched,
    Errored,
    Closed,
}

/// What the interceptor has to tell its owner after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Redirect carried a code for the current request. Surface closed.
    Code(String),
    /// Flow failed. `PageLoadError` leaves the surface open for a retry;
    /// every other kind closes it.
    Failed(AuthErrorKind),
    /// Surface closed without a redirect.
    Cancelled,
}

impl Interception {
    pub fn closes_surface(&self) -> bool {
        !matches!(self, Interception::Failed(AuthErrorKind::PageLoadError))
    }
}

/// Watches navigation inside the browser surface for the redirect URI.
///
/// Purely synchronous: each event is consumed as it arrives and there are no
/// timers.
#[derive(Debug)]
pub struct RedirectInterceptor {
    redirect_uri: String,
    expected_state: String,
    state: InterceptorState,
    connectivity: ConnectivityMonitor,
}

impl RedirectInterceptor {
    pub fn new(
        redirect_uri: impl Into<String>,
        expected_state: impl Into<String>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            expected_state: expected_state.into(),
            state: InterceptorState::Loading,
            connectivity,
        }
    }

    pub fn state(&self) -> InterceptorState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, InterceptorState::Matched | InterceptorState::Closed)
    }

    /// Feed one navigation event. Events after the surface closed are ignored.
    pub fn handle(&mut self, event: NavigationEvent) -> Option<Interception> {
        if !self.is_open() {
            tracing::debug!("Ignoring {event:?} on closed surface");
            return None;
        }

        match event {
            NavigationEvent::LoadStarted { url } | NavigationEvent::Navigated { url } => {
                if url.starts_with(&self.redirect_uri) {
                    self.state = InterceptorState::Matched;
                    return Some(self.inspect_redirect(&url));
                }
                if self.state != InterceptorState::Errored {
                    self.state = InterceptorState::Loading;
                }
                None
            }
            NavigationEvent::Loaded => {
                if self.state == InterceptorState::Loading {
                    self.state = InterceptorState::Active;
                }
                // A page came back, so the network is reachable again.
                self.connectivity.mark_online();
                None
            }
            NavigationEvent::LoadFailed { description } => {
                tracing::debug!("Browser surface load failed: {description}");
                if is_network_failure(&description) {
                    self.connectivity.mark_offline();
                    self.state = InterceptorState::Closed;
                    Some(Interception::Failed(AuthErrorKind::NetworkUnavailable))
                } else {
                    self.state = InterceptorState::Errored;
                    Some(Interception::Failed(AuthErrorKind::PageLoadError))
                }
            }
            NavigationEvent::Retry => {
                if self.state == InterceptorState::Errored {
                    self.state = InterceptorState::Loading;
                }
                None
            }
            NavigationEvent::Closed => {
                self.state = InterceptorState::Closed;
                Some(Interception::Cancelled)
            }
        }
    }

    fn inspect_redirect(&self, url: &str) -> Interception {
        let params = RedirectParams::parse(url);

        if let Some(error) = params.error {
            tracing::info!("Authorization server returned error '{error}'");
            return Interception::Failed(AuthErrorKind::AuthorizationDenied);
        }
        if params.state != Some(self.expected_state.as_str()) {
            tracing::warn!("Redirect state does not match the open request; rejecting");
            return Interception::Failed(AuthErrorKind::AuthorizationDenied);
        }
        match params.code {
            Some(code) => Interception::Code(code.to_string()),
            None => Interception::Failed(AuthErrorKind::AuthorizationDenied),
        }
    }
}

/// Raw query parameters of a redirect. Values are kept exactly as they
/// appeared; `+` and `%XX` are not decoded.
#[derive(Debug, Default, PartialEq, Eq)]
struct RedirectParams<'a> {
    code: Option<&'a str>,
    state: Option<&'a str>,
    error: Option<&'a str>,
}

impl<'a> RedirectParams<'a> {
    fn parse(url: &'a str) -> Self {
        let mut params = RedirectParams::default();
        let Some((_, query)) = url.split_once('?') else {
            return params;
        };
        let query = query.split('#').next().unwrap_or(query);

        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match key {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value);
            }
        }
        params
    }
}

fn is_network_failure(description: &str) -> bool {
    let lower = description.to_ascii_lowercase();
    NETWORK_SIGNATURES.iter().any(|sig| lower.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIRECT: &str = "myapp://auth";

    fn interceptor() -> (RedirectInterceptor, ConnectivityMonitor) {
        let connectivity = ConnectivityMonitor::new();
        (
            RedirectInterceptor::new(REDIRECT, "xyz", connectivity.clone()),
            connectivity,
        )
    }

    fn nav(url: &str) -> NavigationEvent {
        NavigationEvent::Navigated { url: url.into() }
    }

    #[test]
    fn extracts_code_from_matching_redirect() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?code=abc123&state=xyz"));
        assert_eq!(out, Some(Interception::Code("abc123".into())));
        assert_eq!(i.state(), InterceptorState::Matched);
        assert!(!i.is_open());
    }

    #[test]
    fn code_is_not_url_decoded() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?state=xyz&code=a+b%2Fc"));
        assert_eq!(out, Some(Interception::Code("a+b%2Fc".into())));
    }

    #[test]
    fn non_matching_urls_keep_loading() {
        let (mut i, _) = interceptor();
        assert_eq!(i.handle(nav("https://signin.intra.42.fr/users/sign_in")), None);
        assert_eq!(i.state(), InterceptorState::Loading);
        assert_eq!(i.handle(NavigationEvent::Loaded), None);
        assert_eq!(i.state(), InterceptorState::Active);
        // redirect URI appears only inside the query, not as a prefix
        assert_eq!(
            i.handle(nav("https://api.intra.42.fr/oauth/authorize?redirect_uri=myapp://auth?code=1")),
            None
        );
        assert!(i.is_open());
    }

    #[test]
    fn state_mismatch_is_denied() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?code=abc123&state=forged"));
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::AuthorizationDenied)));
    }

    #[test]
    fn missing_state_is_denied() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?code=abc123"));
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::AuthorizationDenied)));
    }

    #[test]
    fn error_parameter_is_denied() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?error=access_denied&state=xyz"));
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::AuthorizationDenied)));
        assert!(!i.is_open());
    }

    #[test]
    fn redirect_without_code_is_denied() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?state=xyz&code="));
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::AuthorizationDenied)));
    }

    #[test]
    fn fragment_is_not_part_of_the_code() {
        let (mut i, _) = interceptor();
        let out = i.handle(nav("myapp://auth?state=xyz&code=abc#_=_"));
        assert_eq!(out, Some(Interception::Code("abc".into())));
    }

    #[test]
    fn load_start_on_redirect_also_matches() {
        let (mut i, _) = interceptor();
        let out = i.handle(NavigationEvent::LoadStarted {
            url: "myapp://auth?code=c1&state=xyz".into(),
        });
        assert_eq!(out, Some(Interception::Code("c1".into())));
    }

    #[test]
    fn connection_failure_marks_offline_and_closes() {
        let (mut i, connectivity) = interceptor();
        let out = i.handle(NavigationEvent::LoadFailed {
            description: "net::ERR_CONNECTION_REFUSED".into(),
        });
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::NetworkUnavailable)));
        assert!(!connectivity.is_online());
        assert!(!i.is_open());
        assert!(out.unwrap().closes_surface());
    }

    #[test]
    fn page_failure_allows_retry() {
        let (mut i, connectivity) = interceptor();
        let out = i.handle(NavigationEvent::LoadFailed {
            description: "HTTP 500 Internal Server Error".into(),
        });
        assert_eq!(out, Some(Interception::Failed(AuthErrorKind::PageLoadError)));
        assert!(!out.unwrap().closes_surface());
        assert!(connectivity.is_online());
        assert_eq!(i.state(), InterceptorState::Errored);

        assert_eq!(i.handle(NavigationEvent::Retry), None);
        assert_eq!(i.state(), InterceptorState::Loading);
        let out = i.handle(nav("myapp://auth?code=after-retry&state=xyz"));
        assert_eq!(out, Some(Interception::Code("after-retry".into())));
    }

    #[test]
    fn successful_load_restores_connectivity() {
        let (mut i, connectivity) = interceptor();
        connectivity.mark_offline();
        i.handle(NavigationEvent::Loaded);
        assert!(connectivity.is_online());
    }

    #[test]
    fn close_cancels_and_later_events_are_ignored() {
        let (mut i, _) = interceptor();
        assert_eq!(i.handle(NavigationEvent::Closed), Some(Interception::Cancelled));
        assert_eq!(i.handle(nav("myapp://auth?code=late&state=xyz")), None);
    }

    #[test]
    fn events_after_match_are_ignored() {
        let (mut i, _) = interceptor();
        i.handle(nav("myapp://auth?code=first&state=xyz"));
        assert_eq!(i.handle(nav("myapp://auth?code=second&state=xyz")), None);
        assert_eq!(i.handle(NavigationEvent::Closed), None);
    }

    #[test]
    fn network_signatures() {
        assert!(is_network_failure("net::ERR_INTERNET_DISCONNECTED"));
        assert!(is_network_failure("ERR_NAME_NOT_RESOLVED"));
        assert!(is_network_failure("Connection refused (os error 111)"));
        assert!(!is_network_failure("SSL certificate error"));
        assert!(!is_network_failure("404 Not Found"));
    }
}
