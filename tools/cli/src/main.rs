//! Keyward CLI - manage the credentials used by the scraper.
//!
//! Every command opens the key vault (generating it on first use) and the
//! account table under one configuration directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use keyward_accounts::{Account, AccountRegistry, QuotaStatus, SelectionPolicy};
use keyward_common::Error;
use keyward_crypto::{EncryptionConfig, KeyPair};
use keyward_vault::{KeyVault, VaultLayout};

#[derive(Parser)]
#[command(name = "keyward")]
#[command(about = "Keyward - Encrypted credential store for scraper accounts")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration directory (default: platform config dir + "keyward").
    #[arg(long, env = "KEYWARD_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Print machine-readable JSON where supported.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the key vault if it does not exist yet.
    Init,

    /// Add an account. The password is prompted for.
    Create {
        /// Account username.
        username: String,
    },

    /// Show one account.
    Show {
        /// Account username.
        username: String,
    },

    /// List all accounts.
    List,

    /// Rename an account and/or change its password.
    Edit {
        /// Current username.
        username: String,

        /// New username.
        #[arg(short = 'u', long = "username")]
        new_username: Option<String>,

        /// Prompt for a new password.
        #[arg(short, long)]
        password: bool,
    },

    /// Delete an account after checking its password.
    Delete {
        /// Account username.
        username: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Check a password against the stored one.
    Verify {
        /// Account username.
        username: String,
    },

    /// Pick an account that is not over quota and print its username.
    Pick,

    /// Flag an account as over quota as of now.
    Exceeded {
        /// Account username.
        username: String,
    },

    /// Put an account back into rotation.
    Reset {
        /// Account username.
        username: String,
    },

    /// Reset accounts whose quota window has passed.
    Sweep,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let layout = match cli.config_dir {
        Some(dir) => VaultLayout::new(dir),
        None => VaultLayout::system_default().context("Cannot resolve configuration directory")?,
    };

    match cli.command {
        Commands::Init => cmd_init(&layout),
        Commands::Create { username } => cmd_create(&layout, &username),
        Commands::Show { username } => cmd_show(&layout, &username, cli.json),
        Commands::List => cmd_list(&layout, cli.json),
        Commands::Edit {
            username,
            new_username,
            password,
        } => cmd_edit(&layout, &username, new_username.as_deref(), password),
        Commands::Delete { username, yes } => cmd_delete(&layout, &username, yes),
        Commands::Verify { username } => cmd_verify(&layout, &username),
        Commands::Pick => cmd_pick(&layout),
        Commands::Exceeded { username } => cmd_exceeded(&layout, &username),
        Commands::Reset { username } => cmd_reset(&layout, &username),
        Commands::Sweep => cmd_sweep(&layout),
    }
}

/// Loaded keypair and open account table.
struct Session {
    keys: KeyPair,
    accounts: AccountRegistry,
}

impl Session {
    fn open(layout: &VaultLayout) -> Result<Self> {
        let keys = KeyVault::open(layout.clone(), EncryptionConfig::default())
            .context("Failed to open key vault")?;
        let accounts = AccountRegistry::open(layout.accounts_file(), SelectionPolicy::Uniform)
            .context("Failed to open account table")?;
        Ok(Self { keys, accounts })
    }

    fn close(self) -> Result<()> {
        self.accounts
            .close()
            .context("Failed to write account table")
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Prompt twice and require both entries to match.
fn prompt_new_password() -> Result<Zeroizing<String>> {
    let password = prompt_password("Enter password: ")?;
    let confirm = prompt_password("Confirm password: ")?;

    if password.as_str() != confirm.as_str() {
        anyhow::bail!("Passwords do not match");
    }

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    Ok(password)
}

/// Ask for the account's current password and fail unless it matches.
fn require_password(session: &Session, username: &str) -> Result<()> {
    let candidate = prompt_password(&format!("Current password for {}: ", username))?;
    let matches = session
        .accounts
        .verify_password(username, &candidate, session.keys.private_key())
        .with_context(|| format!("Failed to verify password for {}", username))?;

    if !matches {
        anyhow::bail!("Password does not match");
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn account_json(username: &str, account: &Account) -> serde_json::Value {
    serde_json::json!({
        "username": username,
        "created_at": account.created_at.to_rfc3339(),
        "exceed_quota": account.exceed_quota,
        "exceed_time": account.exceed_time.map(|t| t.to_rfc3339()),
    })
}

fn print_account(username: &str, account: &Account) {
    println!("Account: {}", username);
    println!("  Created: {}", format_time(Some(account.created_at)));
    println!(
        "  Quota: {}",
        if account.exceed_quota {
            "exceeded"
        } else {
            "available"
        }
    );
    println!("  Exceeded at: {}", format_time(account.exceed_time));
}

/// Create the key vault. An incomplete vault is reported, never replaced.
fn cmd_init(layout: &VaultLayout) -> Result<()> {
    let vault = KeyVault::new(layout.clone(), EncryptionConfig::default());

    let generated = vault
        .generate_if_absent()
        .context("Failed to generate keys")?;
    vault.load().context("Failed to load keys")?;

    if generated {
        println!("Key vault created at {}", layout.keys_dir().display());
    } else {
        println!("Key vault already present at {}", layout.keys_dir().display());
    }
    Ok(())
}

/// Add an account.
fn cmd_create(layout: &VaultLayout, username: &str) -> Result<()> {
    let session = Session::open(layout)?;
    let password = prompt_new_password()?;

    session
        .accounts
        .create(username, &password, session.keys.public_key())
        .with_context(|| format!("Failed to create account {}", username))?;

    println!("Account created: {}", username);
    session.close()
}

/// Show one account.
fn cmd_show(layout: &VaultLayout, username: &str, json: bool) -> Result<()> {
    let session = Session::open(layout)?;

    let account = session
        .accounts
        .read(username)
        .ok_or_else(|| Error::AccountNotFound(username.to_string()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&account_json(username, &account))?
        );
    } else {
        print_account(username, &account);
    }
    session.close()
}

/// List all accounts.
fn cmd_list(layout: &VaultLayout, json: bool) -> Result<()> {
    let session = Session::open(layout)?;
    let accounts = session.accounts.list();

    if json {
        let entries: Vec<_> = accounts
            .iter()
            .map(|(username, account)| account_json(username, account))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if accounts.is_empty() {
        println!("No accounts.");
    } else {
        println!("{} account(s):", accounts.len());
        for (username, account) in &accounts {
            let status = if account.exceed_quota {
                format!("exceeded {}", format_time(account.exceed_time))
            } else {
                "available".to_string()
            };
            println!("  {} ({})", username, status);
        }
    }
    session.close()
}

/// Rename an account and/or change its password.
fn cmd_edit(
    layout: &VaultLayout,
    username: &str,
    new_username: Option<&str>,
    change_password: bool,
) -> Result<()> {
    if new_username.is_none() && !change_password {
        anyhow::bail!("Nothing to change. Pass --username and/or --password");
    }

    let session = Session::open(layout)?;
    require_password(&session, username)?;

    let new_password = if change_password {
        Some(prompt_new_password()?)
    } else {
        None
    };

    session
        .accounts
        .edit(
            session.keys.public_key(),
            username,
            new_username,
            new_password.as_ref().map(|p| p.as_str()),
        )
        .with_context(|| format!("Failed to update account {}", username))?;

    println!("Account updated: {}", new_username.unwrap_or(username));
    session.close()
}

/// Delete an account.
fn cmd_delete(layout: &VaultLayout, username: &str, yes: bool) -> Result<()> {
    let session = Session::open(layout)?;
    require_password(&session, username)?;

    if !yes && !confirm(&format!("Delete account {}?", username))? {
        println!("Cancelled.");
        return session.close();
    }

    session
        .accounts
        .delete(username)
        .with_context(|| format!("Failed to delete account {}", username))?;

    println!("Account deleted: {}", username);
    session.close()
}

/// Check a password.
fn cmd_verify(layout: &VaultLayout, username: &str) -> Result<()> {
    let session = Session::open(layout)?;
    let candidate = prompt_password("Password: ")?;

    let matches = session
        .accounts
        .verify_password(username, &candidate, session.keys.private_key())
        .with_context(|| format!("Failed to verify password for {}", username))?;
    session.close()?;

    if !matches {
        anyhow::bail!("Password does not match");
    }
    println!("Password matches.");
    Ok(())
}

/// Pick an available account.
fn cmd_pick(layout: &VaultLayout) -> Result<()> {
    let session = Session::open(layout)?;

    let (username, _password) = session
        .accounts
        .select_account(session.keys.private_key())
        .context("Failed to select an account")?;

    println!("{}", username);
    session.close()
}

/// Flag an account as over quota.
fn cmd_exceeded(layout: &VaultLayout, username: &str) -> Result<()> {
    let session = Session::open(layout)?;

    session
        .accounts
        .mark_exceeded(username)
        .with_context(|| format!("Failed to update account {}", username))?;

    info!("Account {} marked as over quota", username);
    session.close()
}

/// Put an account back into rotation.
fn cmd_reset(layout: &VaultLayout, username: &str) -> Result<()> {
    let session = Session::open(layout)?;

    session
        .accounts
        .update_quota(username, QuotaStatus::Available)
        .with_context(|| format!("Failed to update account {}", username))?;

    info!("Account {} is available again", username);
    session.close()
}

/// Reset expired quota flags.
fn cmd_sweep(layout: &VaultLayout) -> Result<()> {
    let session = Session::open(layout)?;

    let reset = session
        .accounts
        .sweep_quota()
        .context("Failed to sweep quota flags")?;

    println!("Reset {} account(s).", reset);
    session.close()
}
