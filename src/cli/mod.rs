//! CLI module for the commitmail command-line interface.
//!
//! With no subcommand the binary runs the webhook server. Subcommands work
//! offline against the local configuration:
//! - `preview --event-type <type> <payload>` - Compose a notification and print it
//! - `check-config` - Validate the configuration file and style table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, StorageBackend};
use crate::notifications::email::mailbox_local_part;
use crate::notifications::OutgoingEmail;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "commitmail")]
#[command(author, version, about = "Turns GitHub push and commit comment webhooks into threaded email", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "COMMITMAIL_CONFIG", default_value = "commitmail.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose the email a webhook payload would produce, without sending it
    Preview {
        /// Event type, as GitHub sends it in X-GitHub-Event
        #[arg(short, long, default_value = "push")]
        event_type: String,
        /// File holding the JSON payload
        payload: PathBuf,
    },

    /// Validate the configuration file and style table
    CheckConfig,
}

pub async fn run_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Some(Commands::Preview {
            event_type,
            payload,
        }) => cmd_preview(config, event_type, payload).await,
        Some(Commands::CheckConfig) => cmd_check_config(&cli.config),
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

async fn cmd_preview(config: &Config, event_type: &str, payload_path: &Path) -> Result<()> {
    let payload = std::fs::read(payload_path)
        .with_context(|| format!("Failed to read payload: {}", payload_path.display()))?;

    let service = crate::build_notification_service(config).await?;
    match service.preview(event_type, &payload).await? {
        Some(email) => print!("{}", format_preview(&email, &config.mail.sender_domain)),
        None => println!("No notification for event type {:?}", event_type),
    }
    Ok(())
}

fn format_preview(email: &OutgoingEmail, sender_domain: &str) -> String {
    let mut out = format!(
        "From: \"{}\" <{}@{}>\nSubject: {}\n",
        email.sender_name(),
        mailbox_local_part(email.sender_local()),
        sender_domain,
        email.subject()
    );
    for (name, value) in email.headers() {
        out.push_str(&format!("{}: {}\n", name, value));
    }
    out.push('\n');
    out.push_str(email.html_body());
    out.push('\n');
    out
}

fn cmd_check_config(config_path: &Path) -> Result<()> {
    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("Defaults will be used when starting the server.");
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration file");
        }
    };

    let styles = config.styles.load().context("Invalid style table")?;
    let tz = config.display.tz()?;

    println!("[OK] Configuration file is valid!");
    println!();
    println!("=== Configuration Summary ===");
    println!();
    println!("Server:");
    println!("  Listen:       {}:{}", config.server.host, config.server.port);
    println!("  Data Dir:     {}", config.server.data_dir.display());
    println!();
    println!("Mail:");
    println!(
        "  SMTP:         {}:{} ({})",
        config.mail.smtp_host,
        config.mail.smtp_port,
        if config.mail.smtp_tls { "TLS" } else { "plain" }
    );
    println!("  Sender:       <login>@{}", config.mail.sender_domain);
    println!(
        "  Recipient:    {}",
        config.mail.recipient.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Display:");
    println!("  Time Zone:    {}", tz);
    println!(
        "  Styles:       {} keys ({})",
        styles.len(),
        config
            .styles
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in".to_string())
    );
    println!();
    println!(
        "Storage:        {}",
        match config.storage.backend {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    );
    println!();

    let warnings = config_warnings(&config);
    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in warnings {
            println!("  [!] {}", warning);
        }
        println!();
    }

    Ok(())
}

fn config_warnings(config: &Config) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.webhooks.github_secret.is_none() {
        warnings.push("No webhook secret configured - webhooks will accept unsigned requests");
    }
    if config.mail.recipient.is_none() {
        warnings.push("No mail recipient configured - every delivery will fail");
    }
    if config.github.token.is_none() {
        warnings.push("No GitHub token configured - markdown rendering is rate limited");
    }
    if config.storage.backend == StorageBackend::Memory {
        warnings.push("In-memory storage - comment threading is lost on restart");
    }
    warnings
}
