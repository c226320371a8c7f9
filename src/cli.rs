//! Command-line interface definition for chat-memory
//!
//! This module defines the CLI structure using clap's derive API. The
//! commands are a thin boundary over the history service and turn driver.

use clap::{Parser, Subcommand};

/// chat-memory - conversation memory for chat services
///
/// Inspect, page through and maintain stored conversations, or record a
/// streamed turn into a conversation.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-memory")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Use the process-local store instead of redis
    #[arg(long)]
    pub memory: bool,

    /// Override the redis connection URL
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read and maintain conversation history
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Record one turn: stdin lines are the streamed reply fragments
    Record {
        /// Conversation id (a new one is generated when omitted)
        id: Option<String>,

        /// The user message that started the turn
        #[arg(short, long)]
        message: String,
    },
}

/// History subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// Show stored messages, oldest first
    Show {
        /// Conversation id
        id: String,

        /// Only show the most recent N messages
        #[arg(short, long)]
        last: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one page of history, newest first
    Page {
        /// Conversation id
        id: String,

        /// Page number, starting at 1 (page 1 holds the newest messages)
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Page size (defaults to history.default_page_size)
        #[arg(short, long)]
        size: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show existence, message count and remaining TTL
    Info {
        /// Conversation id
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Reset the expiration window without changing content
    Refresh {
        /// Conversation id
        id: String,
    },

    /// Delete a conversation
    Clear {
        /// Conversation id
        id: String,
    },

    /// Check which of the given conversations exist
    Check {
        /// Conversation ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List all live conversations (administrators only)
    List {
        /// Only list ids starting with this prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Administrator key
        #[arg(long)]
        admin_key: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_history_page_defaults() {
        let cli = Cli::try_parse_from(["chat-memory", "history", "page", "c1"]).unwrap();
        if let Commands::History {
            command: HistoryCommand::Page { id, page, size, json },
        } = cli.command
        {
            assert_eq!(id, "c1");
            assert_eq!(page, 1);
            assert_eq!(size, None);
            assert!(!json);
        } else {
            panic!("Expected History Page command");
        }
    }

    #[test]
    fn test_cli_parse_history_show_last() {
        let cli =
            Cli::try_parse_from(["chat-memory", "history", "show", "c1", "--last", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::History {
                command: HistoryCommand::Show { last: Some(5), .. }
            }
        ));
    }

    #[test]
    fn test_cli_parse_check_requires_ids() {
        assert!(Cli::try_parse_from(["chat-memory", "history", "check"]).is_err());

        let cli = Cli::try_parse_from(["chat-memory", "history", "check", "a", "b"]).unwrap();
        if let Commands::History {
            command: HistoryCommand::Check { ids },
        } = cli.command
        {
            assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        } else {
            panic!("Expected History Check command");
        }
    }

    #[test]
    fn test_cli_parse_record() {
        let cli = Cli::try_parse_from(["chat-memory", "--memory", "record", "c9", "-m", "hello"])
            .unwrap();
        assert!(cli.memory);
        if let Commands::Record { id, message } = cli.command {
            assert_eq!(id.as_deref(), Some("c9"));
            assert_eq!(message, "hello");
        } else {
            panic!("Expected Record command");
        }
    }

    #[test]
    fn test_cli_parse_list_with_prefix() {
        let cli = Cli::try_parse_from([
            "chat-memory",
            "history",
            "list",
            "--prefix",
            "user-",
            "--admin-key",
            "k",
        ])
        .unwrap();
        if let Commands::History {
            command:
                HistoryCommand::List {
                    prefix, admin_key, ..
                },
        } = cli.command
        {
            assert_eq!(prefix, "user-");
            assert_eq!(admin_key.as_deref(), Some("k"));
        } else {
            panic!("Expected History List command");
        }
    }
}
