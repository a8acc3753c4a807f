//! userhub CLI - operator tooling
//!
//! Usage:
//!   userhub hash-password <password>
//!   userhub issue-token --subject <id> --role admin --kind access --ttl 15m
//!   userhub inspect-token <token>
//!   userhub check-config --file userhub.toml

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use userhub_api::auth::jwt::now_secs;
use userhub_api::auth::{validate_password_strength, CredentialVerifier, TokenCodec, TokenKind};
use userhub_core::{parse_duration_secs, AppConfig, Identity, Role};

#[derive(Parser)]
#[command(name = "userhub")]
#[command(about = "userhub operator tools")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override it
    #[arg(long, global = true, env = "USERHUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Access,
    Refresh,
}

impl From<KindArg> for TokenKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Access => TokenKind::Access,
            KindArg::Refresh => TokenKind::Refresh,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password with the server's Argon2id parameters
    HashPassword {
        password: String,
    },
    /// Sign a token with the configured secrets
    IssueToken {
        /// Subject (user id)
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "user")]
        role: Role,
        #[arg(long, value_enum, default_value = "access")]
        kind: KindArg,
        /// Lifetime such as `15m`, `7d` or plain seconds; defaults to the configured TTL
        #[arg(long)]
        ttl: Option<String>,
    },
    /// Verify a token's signature and print its claims
    InspectToken {
        token: String,
        /// Expected class; tried as access then refresh when omitted
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Load and validate configuration
    CheckConfig {
        /// Overrides the global `--config`
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn load_config(file: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match file {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    if let Err(e) = validate_password_strength(password) {
        tracing::warn!("{e}");
    }
    Ok(CredentialVerifier::default().hash(password)?)
}

fn issue_token(
    config: &AppConfig,
    subject: String,
    role: Role,
    kind: TokenKind,
    ttl: Option<&str>,
) -> anyhow::Result<String> {
    config.validate()?;

    let ttl_secs = match ttl {
        Some(value) => parse_duration_secs(value)
            .with_context(|| format!("Invalid duration: {value}"))?,
        None => match kind {
            TokenKind::Access => config.auth.access_ttl_secs,
            TokenKind::Refresh => config.auth.refresh_ttl_secs,
        },
    };

    let issued = TokenCodec::new(&config.auth).issue(&Identity::new(subject, role), kind, ttl_secs)?;
    Ok(issued.token)
}

fn inspect_token(
    config: &AppConfig,
    token: &str,
    kind: Option<TokenKind>,
) -> anyhow::Result<serde_json::Value> {
    config.validate()?;

    let codec = TokenCodec::new(&config.auth);
    let claims = match kind {
        Some(kind) => codec.decode(token, kind)?,
        None => codec.decode_any(token)?,
    };
    if let Some(expected) = kind {
        if claims.kind != expected {
            bail!("Token is a {} token, expected {expected}", claims.kind);
        }
    }

    Ok(serde_json::json!({
        "kind": claims.kind.as_str(),
        "expired": claims.is_expired_at(now_secs()),
        "claims": claims,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userhub=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
        Commands::IssueToken {
            subject,
            role,
            kind,
            ttl,
        } => {
            let config = load_config(cli.config)?;
            println!(
                "{}",
                issue_token(&config, subject, role, kind.into(), ttl.as_deref())?
            );
        }
        Commands::InspectToken { token, kind } => {
            let config = load_config(cli.config)?;
            let report = inspect_token(&config, &token, kind.map(Into::into))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CheckConfig { file } => {
            let config = load_config(file.or(cli.config))?;
            config.validate()?;
            println!("Configuration OK");
            println!("  listen:        {}:{}", config.server.host, config.server.port);
            println!("  api prefix:    {}", config.server.api_prefix);
            println!("  access ttl:    {}s", config.auth.access_ttl_secs);
            println!("  refresh ttl:   {}s", config.auth.refresh_ttl_secs);
            println!(
                "  refresh key:   {}",
                if config.auth.jwt_refresh_secret.is_some() {
                    "separate"
                } else {
                    "shared with access"
                }
            );
            println!(
                "  user store:    {}",
                if config.database.url.is_some() {
                    "postgres"
                } else {
                    "in-memory"
                }
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use userhub_core::AuthConfig;

    fn config() -> AppConfig {
        AppConfig {
            auth: AuthConfig::with_secret("cli-secret"),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_parses_issue_token() {
        let cli = Cli::try_parse_from([
            "userhub",
            "issue-token",
            "--subject",
            "u1",
            "--role",
            "admin",
            "--kind",
            "refresh",
            "--ttl",
            "7d",
        ])
        .unwrap();

        match cli.command {
            Commands::IssueToken { role, kind, ttl, .. } => {
                assert_eq!(role, Role::Admin);
                assert!(matches!(kind, KindArg::Refresh));
                assert_eq!(ttl.as_deref(), Some("7d"));
            }
            _ => panic!("expected issue-token"),
        }
    }

    #[test]
    fn test_issue_then_inspect() {
        let config = config();
        let token = issue_token(&config, "u1".into(), Role::Admin, TokenKind::Access, Some("15m"))
            .unwrap();

        let report = inspect_token(&config, &token, None).unwrap();
        assert_eq!(report["kind"], "access");
        assert_eq!(report["expired"], false);
        assert_eq!(report["claims"]["sub"], "u1");
        assert_eq!(report["claims"]["role"], "admin");

        assert!(inspect_token(&config, &token, Some(TokenKind::Refresh)).is_err());
    }

    #[test]
    fn test_issue_requires_secret() {
        let result = issue_token(&AppConfig::default(), "u1".into(), Role::User, TokenKind::Access, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_ttl() {
        assert!(issue_token(&config(), "u1".into(), Role::User, TokenKind::Access, Some("soon")).is_err());
    }
}
