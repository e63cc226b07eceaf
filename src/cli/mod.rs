//! CLI argument parsing for hostrelay.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Hostrelay: deliver script tasks to a desktop host application.
///
/// Producers drop task files into the task store; the engine picks them up,
/// screens them, and walks an ordered chain of execution strategies until the
/// host runs them. If every strategy fails, a manual launcher is left next to
/// the task file.
///
/// `--check` and `--execute` print a JSON result on stdout and exit non-zero
/// whenever `success` is false.
#[derive(Parser, Debug)]
#[command(name = "hostrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Probe the host application and report whether it is ready.
    #[arg(long, conflicts_with = "execute")]
    pub check: bool,

    /// Run one payload now, bypassing the queue. Use `-` to read stdin.
    #[arg(long, value_name = "PAYLOAD")]
    pub execute: Option<String>,

    /// Config file (default: <config dir>/hostrelay/config.yaml).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands for hostrelay.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the task store and dispatch tasks until stopped.
    ///
    /// Starts the watcher and executor threads in the foreground.
    Run(RunArgs),

    /// Write a task file into the task store for the engine to pick up.
    ///
    /// The payload is screened first; a rejected payload is never written.
    Submit(PayloadArgs),

    /// Screen a payload against the deny-list without writing or running it.
    Screen(PayloadArgs),
}

/// Arguments for the `run` command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Scan the store once, dispatch what was found, and exit.
    #[arg(long)]
    pub once: bool,

    /// Stop after this many seconds instead of running until interrupted.
    #[arg(long, value_name = "SECS", conflicts_with = "once")]
    pub duration: Option<u64>,
}

/// A payload given inline or read from stdin.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Script text, or `-` to read it from stdin.
    #[arg(value_name = "PAYLOAD")]
    pub payload: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_flag() {
        let cli = Cli::try_parse_from(["hostrelay", "--check"]).unwrap();
        assert!(cli.check);
        assert!(cli.execute.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_execute_with_config() {
        let cli = Cli::try_parse_from([
            "hostrelay",
            "--execute",
            "alert(1);",
            "--config",
            "/tmp/hostrelay.yaml",
        ])
        .unwrap();

        assert_eq!(cli.execute.as_deref(), Some("alert(1);"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hostrelay.yaml")));
    }

    #[test]
    fn test_check_conflicts_with_execute() {
        assert!(Cli::try_parse_from(["hostrelay", "--check", "--execute", "x"]).is_err());
    }

    #[test]
    fn test_run_once_and_verbosity() {
        let cli = Cli::try_parse_from(["hostrelay", "-vv", "run", "--once"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Some(Command::Run(args)) => assert!(args.once),
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_run_once_conflicts_with_duration() {
        assert!(Cli::try_parse_from(["hostrelay", "run", "--once", "--duration", "5"]).is_err());
    }

    #[test]
    fn test_submit_payload() {
        let cli = Cli::try_parse_from(["hostrelay", "submit", "-"]).unwrap();
        match cli.command {
            Some(Command::Submit(args)) => assert_eq!(args.payload, "-"),
            other => panic!("expected submit, got {:?}", other),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["hostrelay", "screen", "x", "--config", "c.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
    }
}
