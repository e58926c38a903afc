use std::io::IsTerminal;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::{AuthErrorKind, SwiftyError};
use crate::oauth::interceptor::NavigationEvent;
use crate::oauth::launcher::{AuthorizationRequest, Presentation};
use crate::oauth::loopback::LoopbackListener;
use crate::session::SessionController;
use crate::types::AuthOutcome;

/// Default time allowed for the user to finish signing in.
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;

pub fn login_timeout(secs: Option<u64>) -> Duration {
    Duration::from_secs(secs.unwrap_or(DEFAULT_LOGIN_TIMEOUT_SECS))
}

/// Interpret one line typed into the terminal surface.
fn parse_line(line: &str) -> NavigationEvent {
    match line.trim() {
        "" => NavigationEvent::Closed,
        "retry" => NavigationEvent::Retry,
        url => NavigationEvent::Navigated {
            url: url.to_string(),
        },
    }
}

fn open_in_browser(url: &str, no_browser: bool) {
    if no_browser {
        return;
    }
    if let Err(e) = webbrowser::open(url) {
        tracing::warn!("Could not open a browser: {e}");
        eprintln!("Could not open a browser; open the URL above manually.");
    }
}

/// Run the login command to completion.
pub async fn run_login(
    controller: &SessionController,
    no_browser: bool,
    timeout: Duration,
) -> Result<(), SwiftyError> {
    controller.init().await;

    let request = match controller.begin_login().await {
        AuthOutcome::Authenticated(_) => {
            println!("Already signed in.");
            return Ok(());
        }
        AuthOutcome::Failed(kind) => return Err(kind.into()),
        AuthOutcome::NeedsBrowser(request) => request,
    };

    let finished = match request.presentation {
        Presentation::SystemBrowser => via_loopback(controller, &request, no_browser, timeout).await,
        Presentation::Embedded => {
            let stdin = BufReader::new(tokio::io::stdin());
            via_terminal(controller, &request, no_browser, timeout, stdin).await
        }
    };

    match finished {
        Ok(Some(AuthOutcome::Authenticated(_))) => {}
        Ok(Some(AuthOutcome::Failed(kind))) => return Err(kind.into()),
        Ok(Some(AuthOutcome::NeedsBrowser(_))) | Ok(None) => {
            eprintln!("Login cancelled.");
            return Ok(());
        }
        Err(e) => {
            controller.cancel_login();
            return Err(e);
        }
    }

    match controller.fetch_profile().await {
        Ok(profile) => println!("Signed in as {}.", profile.login),
        Err(e) => {
            tracing::warn!("Signed in, but the profile could not be loaded: {e}");
            println!("Signed in.");
        }
    }
    Ok(())
}

/// The terminal stands in for the embedded browser surface: every pasted
/// line is a navigation. An empty line or end of input closes it.
async fn via_terminal<R>(
    controller: &SessionController,
    request: &AuthorizationRequest,
    no_browser: bool,
    timeout: Duration,
    input: R,
) -> Result<Option<AuthOutcome>, SwiftyError>
where
    R: AsyncBufRead + Unpin,
{
    let prompt = std::io::stderr().is_terminal();
    eprintln!("Open this URL to sign in:\n\n  {}\n", request.auth_url);
    open_in_browser(&request.auth_url, no_browser);
    eprintln!(
        "Paste the address the browser was redirected to ({}...), or press Enter to cancel.",
        request.redirect_uri
    );

    drive_terminal(controller, input, prompt, timeout).await
}

/// Only waiting for input is bounded by `timeout`; a code exchange that has
/// been dispatched always runs to completion.
async fn drive_terminal<R>(
    controller: &SessionController,
    input: R,
    prompt: bool,
    timeout: Duration,
) -> Result<Option<AuthOutcome>, SwiftyError>
where
    R: AsyncBufRead + Unpin,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut lines = input.lines();
    loop {
        if prompt {
            eprint!("> ");
        }
        let line = match tokio::time::timeout_at(deadline, lines.next_line()).await {
            Ok(line) => line?,
            Err(_) => {
                controller.cancel_login();
                eprintln!("Timed out after {}s.", timeout.as_secs());
                return Ok(None);
            }
        };
        let event = match line {
            Some(line) => parse_line(&line),
            None => NavigationEvent::Closed,
        };
        match controller.handle_navigation(event).await {
            Some(AuthOutcome::Failed(AuthErrorKind::PageLoadError)) => {
                eprintln!("The page failed to load. Type 'retry' to try again.");
            }
            Some(outcome) => return Ok(Some(outcome)),
            None if controller.pending_request().is_none() => return Ok(None),
            None => {}
        }
    }
}

/// External browser with a loopback redirect URI.
async fn via_loopback(
    controller: &SessionController,
    request: &AuthorizationRequest,
    no_browser: bool,
    timeout: Duration,
) -> Result<Option<AuthOutcome>, SwiftyError> {
    let listener = LoopbackListener::bind(&request.redirect_uri).await?;
    eprintln!("Open this URL to sign in:\n\n  {}\n", request.auth_url);
    open_in_browser(&request.auth_url, no_browser);

    let event = match listener.accept(timeout).await? {
        Some(url) => NavigationEvent::Navigated { url },
        None => NavigationEvent::Closed,
    };
    Ok(controller.handle_navigation(event).await)
}
