use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Non-secret token metadata: the short-lived access token and its expiry.
#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensFile {
    pub access_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
}

impl TokensFile {
    /// The access token, if it is still valid at `now`.
    pub fn valid_token(&self, now: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp => Some(at.as_str()),
            _ => None,
        }
    }
}

pub fn save_tokens(
    path: &Path,
    access_token: Option<&str>,
    expires_at_epoch: Option<i64>,
) -> Result<()> {
    let tf = TokensFile {
        access_token: access_token.map(|s| s.to_string()),
        expires_at_epoch,
    };
    let s = serde_json::to_string_pretty(&tf)?;
    fs::write(path, s)?;
    Ok(())
}

/// Load tokens file if present
pub fn load_tokens(path: &Path) -> Result<Option<TokensFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    let tf: TokensFile = serde_json::from_str(&s)?;
    Ok(Some(tf))
}

pub fn clear_tokens(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}
