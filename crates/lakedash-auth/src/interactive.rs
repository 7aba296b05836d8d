//! Interactive browser sign-in flow.
//!
//! Authorization-code flow with PKCE against the tenant's authorization
//! endpoint. [`InteractiveFlow::begin`] binds a loopback redirect listener
//! and returns the authorization URL; the caller surfaces it (typically by
//! opening the system browser) and then awaits [`PendingInteractiveAuth::wait`],
//! which blocks until the user completes consent or the upper bound elapses.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use uuid::Uuid;

use crate::authority::Authority;
use crate::error::AuthError;
use crate::pkce::PkcePair;
use crate::response::parse_token_grant;
use crate::token::AccessToken;
use crate::SQL_ENDPOINT_SCOPE;

/// Upper bound on the consent wait when none is configured.
const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Page shown in the browser once the redirect lands.
const REDIRECT_LANDING_PAGE: &str =
    "<html><body><p>Sign-in complete. You can close this tab and return to the dashboard.</p></body></html>";

/// Parameters extracted from the loopback redirect request.
#[derive(Debug)]
struct RedirectParams {
    code: String,
    state: String,
}

/// Parse the request line of the redirect hitting the loopback listener.
///
/// Expects `GET /?code=...&state=... HTTP/1.1`. A redirect carrying an
/// `error` parameter (user declined, policy block) fails with the raw query.
fn parse_redirect_request(request_line: &str) -> Result<RedirectParams, AuthError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::InvalidRedirect(format!("malformed request: {request_line}")))?;

    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if error.is_some() {
        return Err(AuthError::Declined {
            raw: query.to_string(),
        });
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(RedirectParams { code, state }),
        _ => Err(AuthError::InvalidRedirect(format!(
            "redirect missing code or state: {query}"
        ))),
    }
}

/// Interactive browser flow against a tenant authority.
#[derive(Debug, Clone)]
pub struct InteractiveFlow {
    http: reqwest::Client,
    authority: Authority,
    client_id: String,
    consent_timeout: Duration,
}

impl InteractiveFlow {
    /// Create a flow for the given authority and public client.
    pub fn new(authority: Authority, client_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            authority,
            client_id: client_id.into(),
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }

    /// Override the upper bound on the consent wait.
    #[must_use]
    pub fn consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Bind the loopback redirect listener and build the authorization URL.
    ///
    /// # Errors
    ///
    /// Fails if the listener cannot bind or the endpoint URL is unusable.
    pub async fn begin(&self) -> Result<PendingInteractiveAuth, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let redirect_uri = format!("http://{}/", listener.local_addr()?);

        let pkce = PkcePair::generate();
        let state = Uuid::new_v4().to_string();

        let mut authorize_url = self.authority.authorize_endpoint()?;
        authorize_url
            .query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("scope", SQL_ENDPOINT_SCOPE)
            .append_pair("state", &state)
            .append_pair("code_challenge", pkce.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("prompt", "select_account");

        tracing::info!(
            redirect_uri = %redirect_uri,
            "waiting for interactive sign-in on loopback redirect"
        );

        Ok(PendingInteractiveAuth {
            http: self.http.clone(),
            token_endpoint: self.authority.token_endpoint()?,
            client_id: self.client_id.clone(),
            listener,
            redirect_uri,
            authorize_url,
            pkce,
            state,
            consent_timeout: self.consent_timeout,
        })
    }
}

/// An interactive sign-in waiting for the browser redirect.
#[derive(Debug)]
pub struct PendingInteractiveAuth {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    listener: TcpListener,
    redirect_uri: String,
    authorize_url: Url,
    pkce: PkcePair,
    state: String,
    consent_timeout: Duration,
}

impl PendingInteractiveAuth {
    /// The URL the operator's browser must visit to grant consent.
    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Block until the redirect lands, then exchange the code for a token.
    ///
    /// # Errors
    ///
    /// [`AuthError::Timeout`] when the consent window lapses;
    /// [`AuthError::Declined`] when the provider redirects with an error;
    /// [`AuthError::ProviderResponse`] when the code exchange yields no token.
    pub async fn wait(self) -> Result<AccessToken, AuthError> {
        let timeout = self.consent_timeout;
        let code = match tokio::time::timeout(timeout, self.receive_code()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(AuthError::Timeout {
                    seconds: timeout.as_secs(),
                });
            }
        };

        let body = self
            .http
            .post(self.token_endpoint.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code", code.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", self.pkce.verifier()),
                ("scope", SQL_ENDPOINT_SCOPE),
            ])
            .send()
            .await?
            .text()
            .await?;

        let token = parse_token_grant(&body)?;
        tracing::info!("interactive sign-in completed");
        Ok(token)
    }

    async fn receive_code(&self) -> Result<String, AuthError> {
        let (mut stream, _) = self.listener.accept().await?;
        let request_line = read_request_line(&mut stream).await?;
        let outcome = parse_redirect_request(&request_line);

        // Always answer the browser, even on a declined redirect.
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            REDIRECT_LANDING_PAGE.len(),
            REDIRECT_LANDING_PAGE
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await.ok();

        let params = outcome?;
        if params.state != self.state {
            return Err(AuthError::InvalidRedirect(
                "state mismatch on authorization redirect".into(),
            ));
        }
        Ok(params.code)
    }
}

/// Read up to the first CRLF of the redirect request.
async fn read_request_line(stream: &mut TcpStream) -> Result<String, AuthError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(2).any(|w| w == b"\r\n") || buf.len() > 8 * 1024 {
            break;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    Ok(text.lines().next().unwrap_or_default().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_redirect_with_code_and_state() {
        let params =
            parse_redirect_request("GET /?code=AUTHCODE123&state=abc-def HTTP/1.1").unwrap();
        assert_eq!(params.code, "AUTHCODE123");
        assert_eq!(params.state, "abc-def");
    }

    #[test]
    fn test_parse_redirect_declined() {
        let line = "GET /?error=access_denied&error_description=AADSTS65004&state=s HTTP/1.1";
        match parse_redirect_request(line) {
            Err(AuthError::Declined { raw }) => assert!(raw.contains("AADSTS65004")),
            other => panic!("expected declined, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_redirect_missing_code() {
        let result = parse_redirect_request("GET /favicon.ico HTTP/1.1");
        assert!(matches!(result, Err(AuthError::InvalidRedirect(_))));
    }

    #[tokio::test]
    async fn test_authorize_url_carries_pkce_and_state() {
        let authority = Authority::new("tenant-x").unwrap();
        let flow = InteractiveFlow::new(authority, "client-y");
        let pending = flow.begin().await.unwrap();

        let url = pending.authorize_url();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(pairs["client_id"], "client-y");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["scope"], SQL_ENDPOINT_SCOPE);
        assert!(pairs["redirect_uri"].starts_with("http://127.0.0.1:"));
        assert!(!pairs["state"].is_empty());
    }

    #[test]
    fn test_consent_timeout_is_bounded() {
        tokio_test::block_on(async {
            let authority = Authority::new("tenant-x").unwrap();
            let flow = InteractiveFlow::new(authority, "client-y")
                .consent_timeout(Duration::from_millis(20));
            let pending = flow.begin().await.unwrap();

            match pending.wait().await {
                Err(AuthError::Timeout { .. }) => {}
                other => panic!("expected timeout, got {other:?}"),
            }
        });
    }
}
