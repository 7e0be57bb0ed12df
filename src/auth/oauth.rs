//! Google OAuth: the loopback PKCE sign-in and refresh token exchange.

use anyhow::{Context, Result, anyhow};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::{Error as HttpError, HttpClientError};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use reqwest::redirect::Policy;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tiny_http::{Request, Response, Server};
use url::Url;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const CALLBACK_WAIT: Duration = Duration::from_secs(120);
const CALLBACK_POLL: Duration = Duration::from_millis(500);

/// Read, label and send access to the mailbox.
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// What the token endpoint handed back.
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl From<BasicTokenResponse> for Tokens {
    fn from(t: BasicTokenResponse) -> Self {
        Self {
            access_token: t.access_token().secret().to_string(),
            refresh_token: t.refresh_token().map(|r| r.secret().to_string()),
            expires_in: t.expires_in().map(|d| d.as_secs()),
        }
    }
}

fn google_client(client_id: &str, client_secret: Option<&str>) -> Result<BasicClient> {
    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        client_secret.map(|s| ClientSecret::new(s.to_string())),
        AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
        Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
    ))
}

/// Blocking HTTP for the token endpoint, giving up after `timeout`.
/// Redirects are not followed.
fn http_client(
    timeout: Duration,
) -> impl Fn(HttpRequest) -> Result<HttpResponse, HttpClientError> {
    move |request| {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(HttpError::Reqwest)?;
        let mut builder = client
            .request(request.method, request.url.as_str())
            .body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_bytes());
        }
        let response = builder.send().map_err(HttpError::Reqwest)?;
        let status_code = response.status();
        let headers = response.headers().to_owned();
        let body = response.bytes().map_err(HttpError::Reqwest)?.to_vec();
        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

pub fn refresh_access_token(
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
    timeout: Duration,
) -> Result<Tokens> {
    let token = google_client(client_id, client_secret)?
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request(http_client(timeout))
        .context("refreshing access token")?;
    Ok(token.into())
}

/// Sign in through the browser and exchange the returned code.
///
/// A one-shot HTTP listener on `redirect_uri` catches the redirect, so the
/// URI must point at this machine.
pub fn perform_pkce_flow(
    client_id: &str,
    client_secret: Option<&str>,
    redirect_uri: &str,
    scope: &str,
    timeout: Duration,
) -> Result<Tokens> {
    let redirect =
        Url::parse(redirect_uri).with_context(|| format!("invalid redirect_uri {redirect_uri:?}"))?;
    let addr = loopback_addr(&redirect)?;

    // listen before the browser can possibly redirect
    let server = Server::http(addr)
        .map_err(|e| anyhow!("cannot listen for the OAuth callback on {addr}: {e}"))?;

    let client = google_client(client_id, client_secret)?
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (auth_url, csrf) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(scope.to_string()))
        // Google only issues a refresh token for offline access with consent
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();

    println!("Sign in to Gmail in your browser:\n{auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        log::warn!("could not open browser automatically: {e}");
    }

    let code = wait_for_code(&server, &redirect, &csrf)?;
    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(verifier)
        .request(http_client(timeout))
        .map_err(|e| {
            log::error!("token exchange failed: {e:?}");
            anyhow!("token exchange failed: {e}")
        })?;
    Ok(token.into())
}

/// Socket to bind for `redirect`; `localhost` binds the IPv4 loopback.
fn loopback_addr(redirect: &Url) -> Result<SocketAddr> {
    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri has no host"))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri has no port"))?;
    let ip = match host {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .trim_matches(|c| c == '[' || c == ']')
            .parse::<IpAddr>()
            .map_err(|_| anyhow!("redirect_uri host must be localhost or an IP, got {other}"))?,
    };
    Ok(SocketAddr::new(ip, port))
}

fn wait_for_code(server: &Server, redirect: &Url, csrf: &CsrfToken) -> Result<String> {
    let deadline = Instant::now() + CALLBACK_WAIT;
    while Instant::now() < deadline {
        let Ok(Some(request)) = server.recv_timeout(CALLBACK_POLL) else {
            continue;
        };
        match callback_code(redirect, request.url(), csrf) {
            Some(code) => {
                reply(request, "Signed in. You can close this tab.");
                return Ok(code);
            }
            None => reply(request, "No authorization code in this request."),
        }
    }
    Err(anyhow!(
        "no authorization code received within {}s",
        CALLBACK_WAIT.as_secs()
    ))
}

/// The `code` of a callback request, provided its `state` matches.
fn callback_code(redirect: &Url, path_and_query: &str, csrf: &CsrfToken) -> Option<String> {
    let url = redirect.join(path_and_query).ok()?;
    let mut code = None;
    let mut state_ok = false;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state_ok = v == csrf.secret().as_str(),
            _ => {}
        }
    }
    if code.is_some() && !state_ok {
        log::warn!("ignoring OAuth callback with mismatched state");
        return None;
    }
    code
}

fn reply(request: Request, text: &str) {
    if let Err(e) = request.respond(Response::from_string(text)) {
        log::debug!("could not answer OAuth callback: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect() -> Url {
        Url::parse("http://127.0.0.1:8080/callback").unwrap()
    }

    #[test]
    fn callback_requires_matching_state() {
        let csrf = CsrfToken::new("xyz".into());
        assert_eq!(
            callback_code(&redirect(), "/callback?code=abc&state=xyz", &csrf),
            Some("abc".to_string())
        );
        assert_eq!(callback_code(&redirect(), "/callback?code=abc&state=nope", &csrf), None);
        assert_eq!(callback_code(&redirect(), "/favicon.ico", &csrf), None);
    }

    #[test]
    fn localhost_binds_loopback() {
        let url = Url::parse("http://localhost:9000/cb").unwrap();
        assert_eq!(
            loopback_addr(&url).unwrap(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000)
        );
        assert!(loopback_addr(&Url::parse("http://example.com/cb").unwrap()).is_err());
    }

    fn token_request(addr: SocketAddr) -> HttpRequest {
        HttpRequest {
            url: Url::parse(&format!("http://{addr}/token")).unwrap(),
            method: oauth2::http::Method::POST,
            headers: Default::default(),
            body: b"grant_type=refresh_token".to_vec(),
        }
    }

    #[test]
    fn token_endpoint_that_never_answers_times_out() {
        // accepted by the listener but never answered
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();

        let started = Instant::now();
        let result = http_client(Duration::from_millis(300))(token_request(addr));
        assert!(matches!(result, Err(HttpError::Reqwest(e)) if e.is_timeout()));
        assert!(started.elapsed() < Duration::from_secs(10));
        drop(server);
    }

    #[test]
    fn token_endpoint_reply_is_passed_through() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        let answer = std::thread::spawn(move || {
            let request = server.recv().unwrap();
            assert_eq!(request.url(), "/token");
            request
                .respond(Response::from_string("{}").with_status_code(400))
                .unwrap();
        });

        let resp = http_client(Duration::from_secs(5))(token_request(addr)).unwrap();
        assert_eq!(resp.status_code.as_u16(), 400);
        assert_eq!(resp.body, b"{}");
        answer.join().unwrap();
    }
}
