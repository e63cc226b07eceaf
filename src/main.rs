//! Entry point for the `hostrelay` CLI. It parses arguments, installs
//! logging, dispatches to the command handler, and maps errors to exit
//! codes.

use hostrelay::cli::Cli;
use hostrelay::{commands, logging};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    match commands::dispatch(cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
