//! Local callback server for browser-based OAuth sign-in.
//!
//! The provider redirects the browser back to `http://localhost:<port>/callback`
//! with tokens (or an error) in the query string. The caller opens the
//! browser; this server waits for exactly one callback, answers it with a
//! small HTML page, and shuts down.

use crate::types::OAuthProvider;
use crate::{AuthError, AuthResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Default OAuth callback port.
pub const DEFAULT_OAUTH_PORT: u16 = 9741;

/// Default OAuth timeout in seconds.
pub const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 120;

/// What came back on the OAuth redirect.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// Provider access token (if successful).
    pub access_token: Option<String>,
    /// Provider refresh token (if successful).
    pub refresh_token: Option<String>,
    /// Error message (cancelled, denied, timed out).
    pub error: Option<String>,
}

impl CallbackOutcome {
    fn tokens(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            error: Some(error.into()),
        }
    }

    /// Whether tokens were received.
    pub fn succeeded(&self) -> bool {
        self.access_token.is_some()
    }
}

/// OAuth callback server that listens for the provider redirect.
pub struct CallbackServer {
    port: u16,
    timeout_secs: u64,
}

impl CallbackServer {
    /// Create a new callback server.
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }

    /// Create with default settings.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_OAUTH_PORT, DEFAULT_OAUTH_TIMEOUT_SECS)
    }

    /// The redirect URL the provider must send the browser back to.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Build the provider authorize URL for a given OAuth provider.
    pub fn authorize_url(&self, provider_base: &str, provider: OAuthProvider) -> String {
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}",
            provider_base,
            provider.as_str(),
            percent_encode(&self.callback_url())
        )
    }

    /// Bind the local port and wait for a single callback (or the timeout).
    ///
    /// Timeout and cancelled flows come back as a failed [`CallbackOutcome`],
    /// not an error; only failing to bind the port is an `Err`.
    pub async fn wait_for_callback(&self) -> AuthResult<CallbackOutcome> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::Config(format!("failed to bind OAuth callback port {}: {}", addr, e))
        })?;

        info!(port = self.port, "OAuth callback server listening");

        let (tx, rx) = oneshot::channel::<CallbackOutcome>();
        let tx = Arc::new(tokio::sync::Mutex::new(Some(tx)));

        let server_handle = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, tx).await {
                                    error!(error = %e, "error handling OAuth callback connection");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "OAuth callback accept error");
                            break;
                        }
                    }
                }
            }
        });

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => CallbackOutcome::failed("internal error: callback channel closed"),
            Err(_) => CallbackOutcome::failed("OAuth timed out"),
        };

        server_handle.abort();

        Ok(outcome)
    }
}

/// Handle one incoming HTTP connection on the callback port.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    tx: Arc<tokio::sync::Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "received OAuth callback request");

    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    let query = path.find('?').map(|idx| &path[idx + 1..]).unwrap_or("");
    let params = parse_query(query);

    let outcome = if let Some(err) = params.get("error") {
        send_response(&mut writer, 200, "OK", &result_page(false, err)).await?;
        CallbackOutcome::failed(err.clone())
    } else if let Some(token) = params.get("access_token") {
        send_response(
            &mut writer,
            200,
            "OK",
            &result_page(true, "You can close this window and return to Statcheck."),
        )
        .await?;
        CallbackOutcome::tokens(token.clone(), params.get("refresh_token").cloned())
    } else {
        let msg = "missing required parameters";
        send_response(&mut writer, 200, "OK", &result_page(false, msg)).await?;
        CallbackOutcome::failed(msg)
    };

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(outcome);
    }

    Ok(())
}

/// Parse a URL query string into decoded key/value pairs.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.to_string();
            let value = percent_decode(parts.next().unwrap_or(""));
            Some((key, value))
        })
        .collect()
}

/// Send a minimal HTTP response.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// The page shown in the browser after the redirect lands.
fn result_page(success: bool, detail: &str) -> String {
    let (title, heading) = if success {
        ("Statcheck - Signed In", "Signed in!")
    } else {
        ("Statcheck - Sign-In Failed", "Sign-in failed")
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>{}</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<h1>{}</h1>
<p>{}</p>
</body>
</html>"#,
        title, heading, detail
    )
}

/// Minimal percent-encoding for redirect URLs.
fn percent_encode(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => result.push(c),
            _ => {
                for byte in c.to_string().as_bytes() {
                    result.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    result
}

/// Minimal percent-decoding for callback query values.
fn percent_decode(s: &str) -> String {
    let mut result = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                result.push(byte);
            }
        } else if c == '+' {
            result.push(b' ');
        } else {
            result.push(c as u8);
        }
    }

    String::from_utf8_lossy(&result).to_string()
}
