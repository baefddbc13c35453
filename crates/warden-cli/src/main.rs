//! Warden CLI - Command-line administration
//!
//! Usage:
//!   warden user create --username <u> --email <e> --password <p> [--role admin]
//!   warden user list [--limit 50] [--offset 0]
//!   warden user set-role <username> <role>
//!   warden user delete <username>
//!   warden token inspect <token> [--kind access|refresh]
//!   warden token revoke <token>
//!   warden ledger prune
//!
//! Reads the same configuration as the API server (`WARDEN_CONFIG` plus
//! environment overrides) and requires the PostgreSQL backend.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use warden_core::{
    connect_stores, AppConfig, AuthService, DatabaseBackend, Registration, Role, TokenKind,
    WardenError,
};

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Warden credential and session authority administration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Inspect or revoke tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Maintain the revocation ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user account
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "WARDEN_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        /// `user` or `admin`
        #[arg(long)]
        role: Option<Role>,
    },
    /// List user accounts
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Change a user's role
    SetRole { username: String, role: Role },
    /// Delete a user account
    Delete { username: String },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Verify a token and print its identity
    Inspect {
        token: String,
        /// Require a specific kind; any kind is accepted when omitted
        #[arg(long)]
        kind: Option<TokenKind>,
    },
    /// Revoke a token (access or refresh)
    Revoke { token: String },
}

#[derive(Subcommand, Debug)]
enum LedgerAction {
    /// Delete entries whose tokens have already expired
    Prune,
}

#[derive(Serialize)]
struct Rejected<'a> {
    valid: bool,
    reason: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(&config);
    ensure_persistent(&config)?;

    let (store, ledger) = connect_stores(&config.database).await?;
    let auth = AuthService::new(&config, store, ledger)?;

    match cli.command {
        Commands::User { action } => run_user(&auth, action).await,
        Commands::Token { action } => run_token(&auth, action).await,
        Commands::Ledger { action } => match action {
            LedgerAction::Prune => {
                let removed = auth.prune_revocations(chrono::Utc::now()).await?;
                tracing::info!(removed, "Pruned revocation ledger");
                println!("Pruned {removed} expired revocation entries");
                Ok(())
            }
        },
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("warden_core={},warden_cli=info", config.logging.level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// The memory backend would discard every change on exit
fn ensure_persistent(config: &AppConfig) -> anyhow::Result<()> {
    if config.database.backend == DatabaseBackend::Memory {
        bail!("the memory backend does not persist; set DATABASE_BACKEND=postgres and DATABASE_URL");
    }
    Ok(())
}

async fn run_user(auth: &AuthService, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::Create {
            username,
            email,
            password,
            role,
        } => {
            let registered = auth
                .register(Registration {
                    username: Some(username),
                    password: Some(password),
                    email: Some(email),
                    role: role.map(|r| r.as_str().to_string()),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&registered.user)?);
        }
        UserAction::List { limit, offset } => {
            let users = auth.store().list(limit, offset).await?;
            let public: Vec<_> = users.iter().map(|u| u.to_public()).collect();
            println!("{}", serde_json::to_string_pretty(&public)?);
        }
        UserAction::SetRole { username, role } => {
            let user = auth.set_role(&username, role).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserAction::Delete { username } => {
            let user = auth.delete_user(&username).await?;
            println!("Deleted user {} ({})", user.username, user.id);
        }
    }
    Ok(())
}

async fn run_token(auth: &AuthService, action: TokenAction) -> anyhow::Result<()> {
    match action {
        TokenAction::Inspect { token, kind } => {
            let verified = match kind {
                Some(kind) => auth.verify(&token, kind).await,
                None => auth.verifier().verify_any(&token).await,
            };
            match verified {
                Ok(identity) => println!("{}", serde_json::to_string_pretty(&identity)?),
                Err(WardenError::Unauthorized(rejection)) => {
                    let rejected = Rejected {
                        valid: false,
                        reason: rejection.reason(),
                    };
                    println!("{}", serde_json::to_string_pretty(&rejected)?);
                    bail!("token rejected: {}", rejection.reason());
                }
                Err(e) => return Err(e.into()),
            }
        }
        TokenAction::Revoke { token } => {
            let identity = auth.revoke(&token).await?;
            println!(
                "Revoked {} token {} for user {}",
                identity.kind.as_str(),
                identity.token_id,
                identity.user_id
            );
        }
    }
    Ok(())
}
