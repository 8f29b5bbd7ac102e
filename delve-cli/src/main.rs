//! Delve CLI: research a topic from the terminal.
//!
//! Runs the four-phase research engine against a query and prints the report.

mod commands;
mod render;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Delve: LLM-driven topic research
#[derive(Parser, Debug)]
#[command(name = "delve", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Workspace directory (for `.delve/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Research a topic and print the report
    Research(ResearchArgs),
    /// List recorded research sessions, or show one by id
    Sessions {
        /// Session id to print the report for
        id: Option<uuid::Uuid>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct ResearchArgs {
    /// The research question or topic
    pub query: String,

    /// Print the report as JSON instead of formatted text
    #[arg(long)]
    pub json: bool,

    /// LLM model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// LLM provider (anthropic, openai, or any OpenAI-compatible name)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Do not record this run to the session directory
    #[arg(long)]
    pub no_session: bool,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default `.delve/config.toml` into the workspace
    Init,
    /// Print the effective merged configuration as TOML
    Show,
}

fn stderr_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(stderr_filter(cli.verbose, cli.quiet)));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "delve", "delve")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from(".delve").join("logs"));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "delve.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_research_command() {
        let cli = Cli::try_parse_from([
            "delve",
            "research",
            "how does tokio schedule tasks",
            "--json",
            "--model",
            "gpt-4o-mini",
            "--no-session",
        ])
        .unwrap();
        match cli.command {
            Commands::Research(args) => {
                assert_eq!(args.query, "how does tokio schedule tasks");
                assert!(args.json);
                assert!(args.no_session);
                assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
                assert!(args.provider.is_none());
            }
            other => panic!("Expected research command, got {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["delve", "sessions", "-vv", "-w", "/tmp"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.workspace, PathBuf::from("/tmp"));
        assert!(matches!(cli.command, Commands::Sessions { id: None }));
    }

    #[test]
    fn test_sessions_accepts_session_id() {
        let nil = "00000000-0000-0000-0000-000000000000";
        let cli = Cli::try_parse_from(["delve", "sessions", nil]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sessions { id: Some(id) } if id.is_nil()
        ));
        assert!(Cli::try_parse_from(["delve", "sessions", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_research_requires_query() {
        assert!(Cli::try_parse_from(["delve", "research"]).is_err());
    }

    #[test]
    fn test_config_show_parses() {
        let cli = Cli::try_parse_from(["delve", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_stderr_filter_levels() {
        assert_eq!(stderr_filter(0, true), "error");
        assert_eq!(stderr_filter(0, false), "info");
        assert_eq!(stderr_filter(1, false), "debug");
        assert_eq!(stderr_filter(3, true), "trace");
    }
}
