//! CLI command definitions and subcommands

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Duncall - collections call orchestrator
#[derive(Parser)]
#[command(
    name = "dc",
    about = "Dispatches collections calls, classifies outcomes, and schedules follow-ups",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load borrower profiles from a JSON file
    Ingest {
        /// Owning user id
        #[arg(short, long)]
        owner: String,

        /// JSON file with an array of borrower profiles
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run a call batch over the eligible borrowers
    Dispatch {
        /// Owning user id
        #[arg(short, long)]
        owner: String,

        /// Restrict the batch to one category (consistent, inconsistent, overdue)
        #[arg(long)]
        category: Option<String>,

        /// Concurrent call attempts (overrides config)
        #[arg(long)]
        max_parallel: Option<usize>,
    },

    /// Show the borrower table for an owner
    Report {
        /// Owning user id
        #[arg(short, long)]
        owner: String,

        /// Render as CSV instead of a table
        #[arg(long)]
        csv: bool,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Reset borrower call state back to idle
    #[command(group = ArgGroup::new("target").required(true).args(["borrower", "all"]))]
    Reset {
        /// Owning user id
        #[arg(short, long)]
        owner: String,

        /// Reset a single borrower by id
        #[arg(short, long)]
        borrower: Option<String>,

        /// Reset every borrower for this owner
        #[arg(long)]
        all: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_ingest() {
        let cli = Cli::parse_from(["dc", "ingest", "--owner", "u1", "--file", "borrowers.json"]);
        if let Command::Ingest { owner, file } = cli.command {
            assert_eq!(owner, "u1");
            assert_eq!(file, PathBuf::from("borrowers.json"));
        } else {
            panic!("Expected Ingest command");
        }
    }

    #[test]
    fn test_cli_parse_dispatch_with_overrides() {
        let cli = Cli::parse_from([
            "dc",
            "dispatch",
            "--owner",
            "u1",
            "--category",
            "overdue",
            "--max-parallel",
            "8",
        ]);
        if let Command::Dispatch {
            owner,
            category,
            max_parallel,
        } = cli.command
        {
            assert_eq!(owner, "u1");
            assert_eq!(category.as_deref(), Some("overdue"));
            assert_eq!(max_parallel, Some(8));
        } else {
            panic!("Expected Dispatch command");
        }
    }

    #[test]
    fn test_cli_parse_report_csv() {
        let cli = Cli::parse_from(["dc", "report", "--owner", "u1", "--csv"]);
        assert!(matches!(
            cli.command,
            Command::Report { csv: true, output: None, .. }
        ));
    }

    #[test]
    fn test_cli_reset_requires_a_target() {
        assert!(Cli::try_parse_from(["dc", "reset", "--owner", "u1"]).is_err());
        assert!(Cli::try_parse_from(["dc", "reset", "--owner", "u1", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["dc", "reset", "--owner", "u1", "--borrower", "b1"]).is_ok());
        assert!(
            Cli::try_parse_from(["dc", "reset", "--owner", "u1", "--borrower", "b1", "--all"])
                .is_err()
        );
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["dc", "-c", "/path/to/duncall.yml", "report", "--owner", "u1"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/duncall.yml")));
    }
}
