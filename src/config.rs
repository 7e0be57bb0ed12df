use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const APP_NAME: &str = "menubar_mail";

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 1;

/// OAuth client registration and transport knobs, stored as TOML.
///
/// User preferences (interval, labels, ...) live in [`crate::settings`].
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .max(1)
    }
}

/// `<config_dir>/menubar_mail`, created on demand.
pub fn app_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join(APP_NAME);
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("settings"))
}

pub fn tokens_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("tokens.json"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_fields_missing() {
        let cfg: Config = toml::from_str(r#"client_id = "abc""#).unwrap();
        assert_eq!(cfg.redirect_uri(), DEFAULT_REDIRECT_URI);
        assert_eq!(cfg.request_timeout_secs(), 1);
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let cfg: Config = toml::from_str(
            r#"
            client_id = "abc"
            request_timeout_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.request_timeout_secs(), 1);
    }
}
