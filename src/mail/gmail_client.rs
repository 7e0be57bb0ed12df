use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use crate::auth::token_manager::TokenManager;
use crate::error::MailError;
use crate::mail::api::{ApiMessage, Label, LabelList, MailService, MessagePage, Profile};
use crate::mail::decoders::encode_base64url;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

struct Session {
    access_token: String,
    address: String,
}

/// Gmail REST client with a lazily built, droppable session.
///
/// Tokens come from the cache or a refresh only. Signing in through the
/// browser happens at startup and on `reconnect`.
pub struct GmailClient {
    http: Client,
    tokens: TokenManager,
    base_url: String,
    session: Option<Session>,
}

impl GmailClient {
    pub fn new(tokens: TokenManager, timeout: Duration) -> Result<Self, MailError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            tokens,
            base_url: GMAIL_API_BASE.to_string(),
            session: None,
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn session(&mut self) -> Result<&Session, MailError> {
        if self.session.is_none() {
            let access_token = self
                .tokens
                .access_token_noninteractive()
                .map_err(|e| MailError::Auth(e.to_string()))?;
            let resp = self
                .http
                .get(format!("{}/profile", self.base_url))
                .bearer_auth(&access_token)
                .send()?;
            let profile: Profile = self.check(resp)?.json()?;
            log::info!("authenticated as {}", profile.email_address);
            self.session = Some(Session {
                access_token,
                address: profile.email_address,
            });
        }
        self.session
            .as_ref()
            .ok_or_else(|| MailError::Auth("no session".into()))
    }

    fn check(&self, resp: Response) -> Result<Response, MailError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let err = status_error(status, &resp.text().unwrap_or_default());
        if err.is_auth() {
            self.tokens.invalidate_access_token();
        }
        Err(err)
    }

    /// Run one request; any failure drops the session.
    fn execute(
        &mut self,
        build: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<Response, MailError> {
        let result = self.try_execute(build);
        if result.is_err() {
            self.session = None;
        }
        result
    }

    fn try_execute(
        &mut self,
        build: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<Response, MailError> {
        let token = self.session()?.access_token.clone();
        let resp = build(&self.http).bearer_auth(&token).send()?;
        self.check(resp)
    }

    fn get_json<T: DeserializeOwned>(
        &mut self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailError> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self.execute(|http| http.get(url).query(query))?;
        match resp.json() {
            Ok(v) => Ok(v),
            Err(e) => {
                self.session = None;
                Err(e.into())
            }
        }
    }

    fn post_json(&mut self, path: &str, body: serde_json::Value) -> Result<(), MailError> {
        let url = format!("{}/{path}", self.base_url);
        self.execute(|http| http.post(url).json(&body))?;
        Ok(())
    }
}

/// The error for a non-success reply. Rejected credentials are `Auth`.
fn status_error(status: StatusCode, body: &str) -> MailError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return MailError::Auth(message);
    }
    MailError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Query parameters for `users.messages.list`.
fn list_params<'a>(
    label_id: Option<&'a str>,
    query: &'a str,
    page_token: Option<&'a str>,
) -> Vec<(&'static str, &'a str)> {
    let mut params = vec![("q", query)];
    if let Some(label) = label_id {
        params.push(("labelIds", label));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token));
    }
    params
}

impl MailService for GmailClient {
    fn profile_address(&mut self) -> Result<String, MailError> {
        let result = self.session().map(|s| s.address.clone());
        if result.is_err() {
            self.session = None;
        }
        result
    }

    fn list_labels(&mut self) -> Result<Vec<Label>, MailError> {
        let list: LabelList = self.get_json("labels", &[])?;
        Ok(list.labels)
    }

    fn list_unread(
        &mut self,
        label_id: Option<&str>,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<MessagePage, MailError> {
        self.get_json("messages", &list_params(label_id, query, page_token))
    }

    fn get_message(&mut self, id: &str) -> Result<ApiMessage, MailError> {
        self.get_json(&format!("messages/{id}"), &[("format", "full")])
    }

    fn modify_labels(
        &mut self,
        id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<(), MailError> {
        self.post_json(
            &format!("messages/{id}/modify"),
            json!({ "addLabelIds": add, "removeLabelIds": remove }),
        )
    }

    fn send_raw(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError> {
        self.post_json(
            "messages/send",
            json!({ "raw": encode_base64url(raw), "threadId": thread_id }),
        )
    }

    fn create_draft(&mut self, raw: &[u8], thread_id: Option<&str>) -> Result<(), MailError> {
        self.post_json(
            "drafts",
            json!({ "message": { "raw": encode_base64url(raw), "threadId": thread_id } }),
        )
    }

    fn invalidate(&mut self) {
        self.session = None;
    }

    /// Drop everything cached and run the browser flow again.
    fn reconnect(&mut self) -> Result<String, MailError> {
        self.session = None;
        self.tokens.invalidate_access_token();
        self.tokens
            .authenticate_interactively()
            .map_err(|e| MailError::Auth(e.to_string()))?;
        self.profile_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens_file;
    use std::path::Path;
    use std::thread::{self, JoinHandle};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tiny_http::{Response as StubResponse, Server};

    fn tokens(path: &Path, client_id: &str) -> TokenManager {
        TokenManager::new(
            client_id,
            None,
            "http://127.0.0.1:9/callback",
            path.to_path_buf(),
            Duration::from_secs(5),
        )
    }

    fn cache_token(path: &Path) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        tokens_file::save_tokens(path, Some("tok"), Some(now + 600)).unwrap();
    }

    /// Answers requests with `replies` in order and returns what was asked.
    fn serve(replies: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let base = format!("http://{}", server.server_addr());
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in replies {
                let request = server.recv().unwrap();
                let bearer = request
                    .headers()
                    .iter()
                    .any(|h| h.field.equiv("Authorization") && h.value.as_str() == "Bearer tok");
                assert!(bearer, "missing bearer token on {}", request.url());
                seen.push(request.url().to_string());
                request
                    .respond(StubResponse::from_string(body).with_status_code(status))
                    .unwrap();
            }
            seen
        });
        (base, handle)
    }

    #[test]
    fn list_params_skip_missing_values() {
        assert_eq!(list_params(None, "is:unread", None), vec![("q", "is:unread")]);
        assert_eq!(
            list_params(Some("INBOX"), "is:unread", Some("p2")),
            vec![("q", "is:unread"), ("labelIds", "INBOX"), ("pageToken", "p2")]
        );
    }

    #[test]
    fn rejected_credentials_are_auth_errors() {
        let body = r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#;
        let err = status_error(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(&err, MailError::Auth(m) if m == "Invalid Credentials"));
        assert!(status_error(StatusCode::FORBIDDEN, "").is_auth());

        match status_error(StatusCode::NOT_FOUND, "<html>") {
            MailError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn signed_out_session_fails_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let tm = tokens(&dir.path().join("tokens.json"), "menubar-mail-test-no-session");
        let mut client = GmailClient::new(tm, Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");

        assert!(client.profile_address().unwrap_err().is_auth());
        assert!(client.list_labels().unwrap_err().is_auth());
    }

    #[test]
    fn unauthorized_clears_cached_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        cache_token(&path);
        let (base, server) = serve(vec![(
            401,
            r#"{"error":{"code":401,"message":"Invalid Credentials"}}"#,
        )]);
        let tm = tokens(&path, "menubar-mail-test-401");
        let mut client = GmailClient::new(tm, Duration::from_secs(5))
            .unwrap()
            .with_base_url(base);

        let err = client.profile_address().unwrap_err();
        assert!(matches!(&err, MailError::Auth(m) if m == "Invalid Credentials"));
        assert!(!path.exists());
        assert_eq!(server.join().unwrap(), vec!["/profile"]);

        // nothing cached any more, so no request goes out
        assert!(client.profile_address().unwrap_err().is_auth());
    }

    #[test]
    fn failed_request_rebuilds_session_next_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        cache_token(&path);
        let profile = r#"{"emailAddress":"me@example.com"}"#;
        let (base, server) = serve(vec![
            (200, profile),
            (500, r#"{"error":{"code":500,"message":"Backend Error"}}"#),
            (200, profile),
            (200, r#"{"messages":[{"id":"m1","threadId":"t1"}]}"#),
        ]);
        let tm = tokens(&path, "menubar-mail-test-500");
        let mut client = GmailClient::new(tm, Duration::from_secs(5))
            .unwrap()
            .with_base_url(base);

        match client.list_unread(Some("INBOX"), "is:unread", Some("p2")) {
            Err(MailError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Backend Error");
            }
            other => panic!("unexpected {other:?}"),
        }
        // a server error leaves the token alone
        assert!(path.exists());

        let page = client.list_unread(None, "is:unread", None).unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(
            server.join().unwrap(),
            vec![
                "/profile",
                "/messages?q=is%3Aunread&labelIds=INBOX&pageToken=p2",
                "/profile",
                "/messages?q=is%3Aunread",
            ]
        );
    }
}
