//! Command implementations for hostrelay.
//!
//! `dispatch` routes the parsed CLI to a handler. Handlers return the
//! process exit code so that structured results can be printed on stdout
//! and still end the process non-zero; hard errors (bad config, I/O) are
//! returned as `RelayError` and reported by `main`.

mod check;
mod execute;
mod run;
mod screen;
mod submit;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::error::{RelayError, Result};
use serde::Serialize;
use std::io::Read;

/// Dispatch the parsed command line to its implementation.
pub fn dispatch(cli: Cli) -> Result<i32> {
    if (cli.check || cli.execute.is_some()) && cli.command.is_some() {
        return Err(RelayError::UserError(
            "--check and --execute cannot be combined with a subcommand".to_string(),
        ));
    }

    let config = Config::resolve(cli.config.as_deref())?;

    if cli.check {
        return check::cmd_check(&config);
    }
    if let Some(payload) = cli.execute {
        let payload = read_payload(&payload)?;
        return execute::cmd_execute(&config, &payload);
    }

    match cli.command {
        Some(Command::Run(args)) => run::cmd_run(&config, &args),
        Some(Command::Submit(args)) => submit::cmd_submit(&config, &read_payload(&args.payload)?),
        Some(Command::Screen(args)) => screen::cmd_screen(&config, &read_payload(&args.payload)?),
        None => Err(RelayError::UserError(
            "no command given; use --check, --execute <PAYLOAD>, or a subcommand (see --help)"
                .to_string(),
        )),
    }
}

/// Resolve a payload argument; `-` reads all of stdin.
fn read_payload(arg: &str) -> Result<String> {
    let payload = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| RelayError::UserError(format!("failed to read payload from stdin: {}", e)))?;
        buf
    } else {
        arg.to_string()
    };

    if payload.trim().is_empty() {
        return Err(RelayError::UserError("payload is empty".to_string()));
    }
    Ok(payload)
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RelayError::UserError(format!("failed to serialize result: {}", e)))?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_with_subcommand_is_user_error() {
        let cli = Cli {
            check: true,
            execute: None,
            config: None,
            verbose: 0,
            command: Some(Command::Screen(crate::cli::PayloadArgs {
                payload: "x".to_string(),
            })),
        };
        let err = dispatch(cli).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USER_ERROR);
    }

    #[test]
    fn test_read_payload_inline() {
        assert_eq!(read_payload("alert(1);").unwrap(), "alert(1);");
    }

    #[test]
    fn test_read_payload_rejects_blank() {
        let err = read_payload("  \n").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USER_ERROR);
    }
}
