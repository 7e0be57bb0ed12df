//! OS integration: browser, start-at-login registration, reset and uninstall.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::auth::token_store;
use crate::config::{self, APP_NAME};
use crate::domain::message::NO_SCOPE;

const GMAIL_URL: &str = "https://mail.google.com";

/// Web UI address for a scope; no scope opens the account's default view.
pub fn gmail_url(scope: Option<&str>) -> String {
    let Some(scope) = scope.filter(|s| !s.is_empty() && *s != NO_SCOPE) else {
        return GMAIL_URL.to_string();
    };
    let Ok(mut url) = Url::parse(&format!("{GMAIL_URL}/mail/u/0/")) else {
        return GMAIL_URL.to_string();
    };
    url.set_fragment(Some(&format!("label/{scope}")));
    url.to_string()
}

pub fn open_gmail(scope: Option<&str>) {
    let url = gmail_url(scope);
    if let Err(e) = open::that(&url) {
        log::warn!("could not open {url}: {e}");
    }
}

/// Where start-at-login registration lives on this platform.
pub fn login_item_path() -> Result<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("no home dir"))?;
        Ok(home
            .join("Library/LaunchAgents")
            .join(format!("{APP_NAME}.plist")))
    }
    #[cfg(not(target_os = "macos"))]
    {
        let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
        Ok(dir.join("autostart").join(format!("{APP_NAME}.desktop")))
    }
}

#[cfg(target_os = "macos")]
pub fn login_item_contents(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
        <key>Label</key>
        <string>{APP_NAME}</string>
        <key>ProgramArguments</key>
        <array>
            <string>{}</string>
        </array>
        <key>RunAtLoad</key>
        <true/>
</dict>
</plist>
"#,
        exe.display()
    )
}

#[cfg(not(target_os = "macos"))]
pub fn login_item_contents(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\nType=Application\nName={APP_NAME}\nExec=\"{}\"\nTerminal=true\nX-GNOME-Autostart-enabled=true\n",
        exe.display()
    )
}

pub fn register_login_item() -> Result<()> {
    let path = login_item_path()?;
    let exe = std::env::current_exe()?;
    write_login_item(&path, &exe)?;
    log::info!("registered login item {}", path.display());
    Ok(())
}

fn write_login_item(path: &Path, exe: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, login_item_contents(exe))
        .with_context(|| format!("writing {}", path.display()))
}

pub fn unregister_login_item() -> Result<()> {
    let path = login_item_path()?;
    if !path.exists() {
        return Ok(());
    }
    #[cfg(target_os = "macos")]
    {
        let status = std::process::Command::new("launchctl")
            .arg("unload")
            .arg(&path)
            .status();
        if let Err(e) = status {
            log::warn!("launchctl unload failed: {e}");
        }
    }
    fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
    Ok(())
}

/// Forget everything: login item, settings, cached and stored credentials.
pub fn reset(client_id: Option<&str>) -> Result<()> {
    unregister_login_item()?;
    if let Some(id) = client_id {
        if let Err(e) = token_store::delete_refresh_token(id) {
            log::warn!("could not delete refresh token: {e}");
        }
    }
    let dir = config::app_dir()?;
    fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
    println!("Removed {}", dir.display());
    Ok(())
}

/// `/Applications/X.app` when `exe` runs from inside an app bundle.
pub fn app_bundle(exe: &Path) -> Option<PathBuf> {
    exe.ancestors()
        .find(|p| p.extension().is_some_and(|e| e == "app"))
        .filter(|bundle| exe.starts_with(bundle.join("Contents/MacOS")))
        .map(Path::to_path_buf)
}

/// Reset, then delete the installed bundle if we are running from one.
pub fn remove_me(client_id: Option<&str>) -> Result<()> {
    reset(client_id)?;
    let exe = std::env::current_exe()?;
    match app_bundle(&exe) {
        Some(bundle) => {
            fs::remove_dir_all(&bundle)
                .with_context(|| format!("removing {}", bundle.display()))?;
            println!("Removed {}", bundle.display());
        }
        None => println!("{} is not in an app bundle", exe.display()),
    }
    Ok(())
}
