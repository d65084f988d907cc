//! Loopback HTTP listener that receives the OAuth redirect.

use crate::callback::{CallbackOutcome, OAuthCallbackHandler};
use crate::error::{AuthError, AuthResult};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

const MAX_HEADER_LINES: usize = 100;

pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
    timeout: Duration,
}

impl CallbackServer {
    /// Listen on `127.0.0.1:port`. Port 0 picks a free port.
    pub async fn bind(port: u16, timeout: Duration) -> AuthResult<Self> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::Callback(format!("Failed to bind to {}: {}", addr, e)))?;
        let port = listener.local_addr()?.port();

        info!(port, "OAuth callback server listening");
        Ok(Self {
            listener,
            port,
            timeout,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Serve until one `/callback` request was handled, or fail with
    /// [`AuthError::CallbackTimeout`].
    pub async fn run(self, handler: &OAuthCallbackHandler) -> AuthResult<CallbackOutcome> {
        match tokio::time::timeout(self.timeout, self.serve(handler)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "OAuth callback timed out");
                Err(AuthError::CallbackTimeout)
            }
        }
    }

    async fn serve(&self, handler: &OAuthCallbackHandler) -> AuthResult<CallbackOutcome> {
        loop {
            let (mut socket, peer) = self.listener.accept().await?;
            debug!(peer = %peer, "Callback connection accepted");

            let target = match read_callback_target(&mut socket).await {
                Ok(Some(target)) => target,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "Malformed callback request");
                    continue;
                }
            };

            let url = Url::parse(&format!("http://localhost:{}{}", self.port, target))
                .map_err(|e| AuthError::Callback(format!("Invalid callback URL: {}", e)))?;
            let outcome = handler.handle(&url).await;

            if let Err(e) = send_response(&mut socket, 200, "OK", &landing_page(&outcome)).await {
                warn!(error = %e, "Failed to answer callback request");
            }
            return Ok(outcome);
        }
    }
}

/// Read one request; return its target if it is `GET /callback...`.
/// Anything else is answered here and yields `None`.
async fn read_callback_target(socket: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(&mut *socket);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    let mut header = String::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }
    drop(reader);

    let Some(rest) = request_line.strip_prefix("GET ") else {
        send_response(socket, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    };
    let target = rest
        .split_once(" HTTP/")
        .map(|(target, _)| target)
        .unwrap_or(rest)
        .trim();

    let path = target.split('?').next().unwrap_or_default();
    debug!(path, "Callback request received");

    if path != "/callback" {
        send_response(socket, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    }
    Ok(Some(target.to_string()))
}

async fn send_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await
}

fn landing_page(outcome: &CallbackOutcome) -> String {
    let (title, color, detail) = match outcome {
        CallbackOutcome::LoggedIn(user) => (
            "Signed in",
            "#22c55e",
            format!("Signed in as {}.", escape_html(&user.username)),
        ),
        CallbackOutcome::Failed(reason) => (
            "Sign-in failed",
            "#ef4444",
            escape_html(reason),
        ),
        CallbackOutcome::NoToken => (
            "Nothing to do",
            "#888888",
            "No sign-in token was received.".to_string(),
        ),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>subreg - {title}</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px;">
<h1 style="color: {color};">{title}</h1>
<p style="color: #666;">{detail}</p>
<p style="color: #888; font-size: 14px;">You can close this window and return to the terminal.</p>
</div>
</body>
</html>"#
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
