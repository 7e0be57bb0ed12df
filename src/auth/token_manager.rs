use anyhow::{Result, anyhow};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::auth::oauth::{self, GMAIL_MODIFY_SCOPE, Tokens};
use crate::auth::{token_store, tokens_file};
use crate::config::{self, Config};

/// Used when the provider does not say how long a token lives.
const FALLBACK_LIFETIME_SECS: i64 = 3500;

#[derive(Clone)]
pub struct TokenManager {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    tokens_path: PathBuf,
    timeout: Duration,
}

impl TokenManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
        tokens_path: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            tokens_path,
            timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client_id = cfg.client_id.clone();
        let client_secret = token_store::load_client_secret(&client_id)?
            .or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok());

        Ok(Self::new(
            client_id,
            client_secret,
            cfg.redirect_uri(),
            config::tokens_path()?,
            Duration::from_secs(cfg.request_timeout_secs()),
        ))
    }

    /// Returns a valid access token; refreshes/PKCE if needed.
    pub fn get_access_token(&self) -> Result<String> {
        match self.access_token_noninteractive() {
            Ok(at) => Ok(at),
            Err(e) => {
                log::info!("{e}, starting browser sign-in");
                self.authenticate_interactively()
            }
        }
    }

    /// A valid access token from the cache or the stored refresh token.
    /// Never opens a browser; fails when neither works.
    pub fn access_token_noninteractive(&self) -> Result<String> {
        let now = now_epoch()?;

        // 1) cached & not expired
        if let Some(tf) = tokens_file::load_tokens(&self.tokens_path)? {
            if let Some(at) = tf.valid_token(now) {
                return Ok(at.to_string());
            }
        }

        // 2) refresh if possible
        let rt = match token_store::load_refresh_token(&self.client_id) {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("could not read refresh token from keyring: {e}");
                None
            }
        };
        let Some(rt) = rt else {
            return Err(anyhow!("not signed in"));
        };
        match oauth::refresh_access_token(
            &self.client_id,
            self.client_secret.as_deref(),
            &rt,
            self.timeout,
        ) {
            Ok(t) => self.store(t, now),
            Err(e) => {
                log::warn!("refresh failed: {e:#}");
                Err(anyhow!("session expired: {e}"))
            }
        }
    }

    /// Run the browser flow regardless of what is cached.
    pub fn authenticate_interactively(&self) -> Result<String> {
        let now = now_epoch()?;
        let t = oauth::perform_pkce_flow(
            &self.client_id,
            self.client_secret.as_deref(),
            &self.redirect_uri,
            GMAIL_MODIFY_SCOPE,
            self.timeout,
        )?;
        self.store(t, now)
    }

    /// Forget the cached access token so the next call refreshes it.
    pub fn invalidate_access_token(&self) {
        if let Err(e) = tokens_file::clear_tokens(&self.tokens_path) {
            log::warn!("could not clear token cache: {e}");
        }
    }

    fn store(&self, t: Tokens, now: i64) -> Result<String> {
        if let Some(rt) = &t.refresh_token {
            if let Err(e) = token_store::save_refresh_token(&self.client_id, rt) {
                log::warn!("could not store refresh token in keyring: {e}");
            }
        }
        let exp = t
            .expires_in
            .map(|s| now + s as i64)
            .unwrap_or(now + FALLBACK_LIFETIME_SECS);
        tokens_file::save_tokens(&self.tokens_path, Some(&t.access_token), Some(exp))?;
        Ok(t.access_token)
    }
}

fn now_epoch() -> Result<i64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn manager(tokens_path: &Path, client_id: &str) -> TokenManager {
        TokenManager::new(
            client_id,
            None,
            "http://127.0.0.1:9/callback",
            tokens_path.to_path_buf(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn cached_token_is_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let later = now_epoch().unwrap() + 600;
        tokens_file::save_tokens(&path, Some("cached"), Some(later)).unwrap();

        let tm = manager(&path, "menubar-mail-test-cached");
        assert_eq!(tm.access_token_noninteractive().unwrap(), "cached");
    }

    #[test]
    fn without_credentials_fails_instead_of_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let tm = manager(&path, "menubar-mail-test-signed-out");
        assert!(tm.access_token_noninteractive().is_err());

        // an expired access token is no better than none
        tokens_file::save_tokens(&path, Some("stale"), Some(1)).unwrap();
        assert!(tm.access_token_noninteractive().is_err());
    }
}
