use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

use crate::config::APP_NAME;

fn refresh_key(client_id: &str) -> String {
    format!("refresh_token:{client_id}")
}

fn secret_key(client_id: &str) -> String {
    format!("client_secret:{client_id}")
}

fn save(key: &str, value: &str) -> Result<()> {
    let entry = Entry::new(APP_NAME, key);
    entry?.set_password(value).map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

fn load(key: &str) -> Result<Option<String>> {
    let entry = Entry::new(APP_NAME, key);
    match entry?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

fn delete(key: &str) -> Result<()> {
    let entry = Entry::new(APP_NAME, key);
    match entry?.delete_credential() {
        Ok(()) | Err(KeyringError::NoEntry) => Ok(()),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

/// Save the refresh token issued to this OAuth client.
pub fn save_refresh_token(client_id: &str, refresh_token: &str) -> Result<()> {
    save(&refresh_key(client_id), refresh_token)
}

pub fn load_refresh_token(client_id: &str) -> Result<Option<String>> {
    load(&refresh_key(client_id))
}

pub fn delete_refresh_token(client_id: &str) -> Result<()> {
    delete(&refresh_key(client_id))
}

/// Save a client secret into the keyring, keyed by client_id
pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    save(&secret_key(client_id), client_secret)
}

/// Load client secret from keyring by client_id
pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    load(&secret_key(client_id))
}
