//! Command-line interface for strictly_drinks.

use clap::{Parser, Subcommand};

/// Strictly Drinks - dice decide who owes the next round
#[derive(Parser, Debug)]
#[command(name = "strictly_drinks")]
#[command(about = "Drink-debt dice game engine with session ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, default_value = "strictly_drinks.toml")]
    pub config: std::path::PathBuf,

    /// Database path, overriding config and environment (":memory:" for in-memory)
    #[arg(long)]
    pub database: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Start a new ledger session in a channel
    NewSession {
        /// Channel identifier
        channel: String,

        /// Who opens the session
        #[arg(long, default_value = "cli")]
        created_by: String,
    },

    /// Show the active session's leaderboard for a channel
    Leaderboard {
        /// Channel identifier
        channel: String,
    },

    /// List a player's debts, oldest first
    Debts {
        /// Player identifier
        player: String,
    },

    /// Pay a player's oldest unpaid debt
    Pay {
        /// Player identifier
        player: String,
    },

    /// Force a game closed
    Abandon {
        /// Game identifier
        game: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "strictly_drinks",
            "--database",
            ":memory:",
            "serve",
            "--port",
            "8080",
        ])
        .expect("parse");
        assert_eq!(cli.database.as_deref(), Some(":memory:"));
        assert!(matches!(
            cli.command,
            Command::Serve {
                port: Some(8080),
                host: None
            }
        ));
    }

    #[test]
    fn test_parse_new_session() {
        let cli = Cli::try_parse_from(["strictly_drinks", "new-session", "#bar"]).expect("parse");
        match cli.command {
            Command::NewSession {
                channel,
                created_by,
            } => {
                assert_eq!(channel, "#bar");
                assert_eq!(created_by, "cli");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
