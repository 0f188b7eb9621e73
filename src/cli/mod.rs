//! Command-line interface, parsed with clap.

mod commands;

pub use commands::{cmd_cleanup_tokens, cmd_create_user, cmd_revoke_user};

use clap::{Parser, Subcommand};

use crate::domain::Role;

/// lingoquiz - multilingual quiz platform
#[derive(Parser)]
#[command(name = "lingoquiz")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the maintenance scheduler
    #[command(alias = "daemon", alias = "-d", alias = "--daemon")]
    Serve,

    /// Write a default config.toml if none exists
    #[command(alias = "--init")]
    Init,

    /// Create an account directly in the database
    CreateUser {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
        /// admin, creator or user
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
    },

    /// Delete expired and revoked tokens once
    CleanupTokens {
        /// Defaults to `security.tokens.cleanup_retention_days`
        #[arg(long)]
        retention_days: Option<i64>,
    },

    /// Revoke every token of a user
    RevokeUser { username: String },
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse::<Role>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_alias_maps_to_serve() {
        let cli = Cli::try_parse_from(["lingoquiz", "daemon"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn test_create_user_parses_role() {
        let cli = Cli::try_parse_from([
            "lingoquiz",
            "create-user",
            "anna",
            "anna@example.com",
            "--password",
            "secret123",
            "--role",
            "creator",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateUser { username, role, .. }) => {
                assert_eq!(username, "anna");
                assert_eq!(role, Role::Creator);
            }
            _ => panic!("expected create-user"),
        }

        assert!(
            Cli::try_parse_from([
                "lingoquiz",
                "create-user",
                "anna",
                "anna@example.com",
                "--password",
                "x",
                "--role",
                "root",
            ])
            .is_err()
        );
    }
}
