use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::SwiftyError;

const DONE_PAGE: &str = "<!DOCTYPE html><html><body><h1>Signed in</h1>\
                         <p>You can close this window and return to the terminal.</p></body></html>";

/// Listener for a loopback redirect URI such as
/// `http://127.0.0.1:8976/callback`.
///
/// Bind before the browser is opened so the redirect cannot arrive first.
#[derive(Debug)]
pub struct LoopbackListener {
    listener: TcpListener,
    origin: String,
    path: String,
}

impl LoopbackListener {
    pub async fn bind(redirect_uri: &str) -> Result<Self, SwiftyError> {
        let url = reqwest::Url::parse(redirect_uri)
            .map_err(|e| SwiftyError::ProtocolError(format!("Invalid redirect URI: {e}")))?;
        let port = url.port().ok_or_else(|| {
            SwiftyError::ProtocolError(format!("Redirect URI {redirect_uri} has no port"))
        })?;
        let host = match url.host_str() {
            Some("[::1]") => "[::1]",
            _ => "127.0.0.1",
        };
        let listener = TcpListener::bind(format!("{host}:{port}")).await?;
        tracing::debug!("Waiting for the redirect on {host}:{port}");

        Ok(Self {
            listener,
            origin: url.origin().ascii_serialization(),
            path: url.path().to_string(),
        })
    }

    /// Wait for the browser's request to the redirect path and return the
    /// full URL it asked for. Other requests (preconnects, `/favicon.ico`)
    /// get a 404 and the wait goes on. `None` means nothing arrived in time.
    pub async fn accept(self, timeout: Duration) -> Result<Option<String>, SwiftyError> {
        match tokio::time::timeout(timeout, self.next_redirect()).await {
            Ok(result) => result.map(Some),
            Err(_) => {
                tracing::info!("No redirect after {}s", timeout.as_secs());
                Ok(None)
            }
        }
    }

    async fn next_redirect(&self) -> Result<String, SwiftyError> {
        loop {
            let (mut stream, _) = self.listener.accept().await?;

            let mut buf = vec![0u8; 8192];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!("Dropped connection on the redirect listener: {e}");
                    continue;
                }
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let target = request_target(&request).filter(|t| target_path(t) == self.path);
            let Some(target) = target else {
                tracing::debug!("Ignoring non-redirect request on the loopback listener");
                if n > 0 {
                    let _ = respond(&mut stream, "404 Not Found", "").await;
                }
                continue;
            };

            let url = format!("{}{}", self.origin, target);
            if let Err(e) = respond(&mut stream, "200 OK", DONE_PAGE).await {
                tracing::debug!("Could not answer the browser: {e}");
            }
            return Ok(url);
        }
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn target_path(target: &str) -> &str {
    target.split(['?', '#']).next().unwrap_or(target)
}

/// Path and query from `GET /callback?code=... HTTP/1.1`, untouched.
fn request_target(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let _method = parts.next()?;
    parts.next().filter(|target| target.starts_with('/'))
}
