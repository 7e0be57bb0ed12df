use anyhow::{Result, anyhow};
use clap::Parser;
use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use menubar_mail::app::App;
use menubar_mail::auth::{token_manager::TokenManager, token_store};
use menubar_mail::config::{self, Config, load_config};
use menubar_mail::daemon;
use menubar_mail::mail::{MailService, gmail_client::GmailClient};
use menubar_mail::settings::Settings;
use menubar_mail::system;
use menubar_mail::terminal::run_terminal;

#[derive(Parser)]
#[command(name = "menubar_mail", version)]
#[command(about = "Unread Gmail messages in a terminal menu", long_about = None)]
struct Cli {
    /// Reset, then remove the application bundle
    #[arg(short, long)]
    uninstall: bool,

    /// Remove the login item, settings and stored credentials
    #[arg(short, long)]
    reset: bool,

    /// Check once and print the unread messages
    #[arg(short, long)]
    commandline: bool,

    /// Store the OAuth client secret in keyring
    #[arg(long, value_name = "CLIENT_ID")]
    set_client_secret: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(client_id) = cli.set_client_secret {
        eprintln!("Paste client secret (end with Ctrl-D):");
        let mut secret = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
        let secret = secret.trim();
        token_store::save_client_secret(&client_id, secret)?;
        println!("Saved client secret for client_id {}", client_id);
        return Ok(());
    }

    if cli.uninstall {
        return system::remove_me(configured_client_id().as_deref());
    }
    if cli.reset {
        return system::reset(configured_client_id().as_deref());
    }

    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
    let settings = Settings::load(&config::settings_path()?)?;
    let token_mgr = TokenManager::from_config(&cfg)?;
    // sign in while the terminal is still in normal mode; polling never prompts
    token_mgr.get_access_token()?;
    let mut client = GmailClient::new(
        token_mgr,
        Duration::from_secs(cfg.request_timeout_secs()),
    )?;

    if cli.commandline {
        print!("{}", daemon::run_once(&mut client, &settings)?);
        return Ok(());
    }

    let address = client.profile_address()?;
    log::info!("watching {address}");

    let (tx, rx) = mpsc::channel();
    let mut app = App::new(client, settings)
        .with_notifications(tx)
        .with_client_id(cfg.client_id.clone());
    app.state.address = address;

    run_terminal(&mut app, rx).map_err(|e| anyhow!("{e:?}"))?;

    if app.uninstall_requested {
        system::remove_me(app.client_id())?;
    }
    Ok(())
}

/// Client id from an existing config, without writing a template.
fn configured_client_id() -> Option<String> {
    let path = config::config_path().ok()?;
    let text = fs::read_to_string(path).ok()?;
    let cfg: Config = toml::from_str(&text).ok()?;
    Some(cfg.client_id)
}
