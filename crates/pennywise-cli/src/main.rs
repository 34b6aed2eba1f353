mod cli;
mod dispatch;
mod output;
mod stdout_io;

use std::process::ExitCode;

use clap::{Parser, error::ErrorKind};
use pennywise_core::CoreError;
use stdout_io::write_stdout_text;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PENNYWISE_LOG";

const ROOT_HELP: &str = "Pennywise - personal finance ledger with recurring transactions and insights

Usage:
  pennywise <command>

Start here:
  pennywise user add --email <email> --name <name>
  pennywise recurring add --help
  pennywise insights weekly --user <user-id>
";

const TOP_LEVEL_HELP: &str = "Pennywise - personal finance ledger with recurring transactions and insights

USAGE: pennywise [--json] [--home <path>] [--now <timestamp>] <command>

Set up:
  pennywise user add --email <email> --name <name>        Create a user
  pennywise account add --user <id> --name <name>         Open an account
  pennywise category list --user <id>                     Show system and custom categories

Record money:
  pennywise tx add --user <id> --account <id> ...         Record one income or expense
  pennywise tx list --user <id>                           Query transactions
  pennywise budget set --user <id> --category <id> ...    Set a monthly budget

Recurring transactions:
  1. pennywise recurring add --help                       Read how schedules advance
  2. pennywise recurring due --user <id>                  See rules ready to execute
  3. pennywise recurring run --user <id> <rule-id>        Execute one rule
  4. pennywise recurring process-due                      Execute every due auto rule

Reports:
  pennywise report summary --user <id> [--month YYYY-MM]  Income, expense, balance
  pennywise report spending --user <id>                   Spending per category
  pennywise report budgets --user <id>                    Progress against budgets

Insights:
  pennywise insights weekly --user <id>                   Anomalies, habits, savings ideas
  pennywise insights budget-alerts --user <id>            Budgets near or over the limit
  pennywise insights list --user <id>                     Stored insights, highest priority first

Add --json to any command for the machine-readable envelope.
Set PENNYWISE_LOG (e.g. `debug`) to see diagnostics on stderr.
";

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(code) => code,
    }
}

/// Diagnostics go to stderr so stdout stays parseable.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        eprintln!("pennywise: logging was already initialized");
    }
}

fn run() -> Result<ExitCode, ExitCode> {
    let raw_args = std::env::args().collect::<Vec<String>>();
    if raw_args.len() == 1 {
        if write_stdout_text(ROOT_HELP).is_err() {
            return Err(ExitCode::from(2));
        }
        return Ok(ExitCode::SUCCESS);
    }
    let cli = match cli::Cli::try_parse() {
        Ok(value) => value,
        Err(err) => return handle_parse_error(&raw_args, &err),
    };
    let mode = output::mode_for_cli(&cli);

    match dispatch::dispatch(&cli) {
        Ok(success) => {
            debug!(command = %success.command, "command succeeded");
            if output::print_success(&success, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            debug!(code = %error.code, kind = ?error.kind, "command failed");
            if output::print_failure(&error, mode).is_err() {
                return Err(ExitCode::from(2));
            }
            Err(exit_code_for_error(&error))
        }
    }
}

fn handle_parse_error(raw_args: &[String], err: &clap::Error) -> Result<ExitCode, ExitCode> {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            let text = if is_top_level_help_request(raw_args) {
                TOP_LEVEL_HELP.to_string()
            } else {
                err.to_string()
            };
            if write_stdout_text(&text).is_err() {
                return Err(ExitCode::from(2));
            }
            return Ok(ExitCode::SUCCESS);
        }
        ErrorKind::DisplayVersion => {
            if write_stdout_text(&err.to_string()).is_err() {
                return Err(ExitCode::from(2));
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let command_hint = if matches!(
        err.kind(),
        ErrorKind::MissingRequiredArgument
            | ErrorKind::InvalidValue
            | ErrorKind::ValueValidation
            | ErrorKind::WrongNumberOfValues
            | ErrorKind::UnknownArgument
            | ErrorKind::InvalidSubcommand
    ) {
        command_path_from_args(raw_args)
    } else {
        None
    };
    let clean_message = strip_clap_boilerplate(&err.to_string());
    let parse_error = CoreError::invalid_argument_for_command(&clean_message, command_hint.as_deref());
    let mode = infer_requested_output_mode(raw_args);
    if output::print_failure(&parse_error, mode).is_err() {
        return Err(ExitCode::from(2));
    }
    Err(ExitCode::from(1))
}

fn is_top_level_help_request(raw_args: &[String]) -> bool {
    raw_args.len() == 2 && matches!(raw_args[1].as_str(), "--help" | "-h")
}

/// Drops clap's trailing Usage line and "For more information" hint; the
/// rendered error carries its own next steps.
fn strip_clap_boilerplate(message: &str) -> String {
    let trimmed = if let Some(pos) = message.find("\n\nUsage:") {
        &message[..pos]
    } else if let Some(pos) = message.find("\nFor more information") {
        &message[..pos]
    } else {
        message
    };
    trimmed.trim_end().to_string()
}

/// The `group subcommand` pair named on the command line, for help hints.
/// Values of global flags are skipped so `--home /x tx add` still yields
/// `tx add`.
fn command_path_from_args(raw_args: &[String]) -> Option<String> {
    let mut words = Vec::new();
    let mut skip_value = false;
    for value in raw_args.iter().skip(1) {
        if skip_value {
            skip_value = false;
            continue;
        }
        if value.starts_with('-') {
            skip_value = matches!(value.as_str(), "--home" | "--now");
            continue;
        }
        words.push(value.as_str());
        if words.len() == 2 {
            break;
        }
    }

    match words.as_slice() {
        [group, sub] if is_known_group(group) => Some(format!("{group} {sub}")),
        [group, ..] if is_known_group(group) => Some((*group).to_string()),
        _ => None,
    }
}

fn is_known_group(word: &str) -> bool {
    matches!(
        word,
        "user" | "account" | "category" | "tx" | "budget" | "recurring" | "report" | "insights"
    )
}

fn exit_code_for_error(error: &CoreError) -> ExitCode {
    if error.is_internal() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

fn infer_requested_output_mode(raw_args: &[String]) -> output::OutputMode {
    if raw_args.iter().skip(1).any(|value| value == "--json") {
        return output::OutputMode::Json;
    }
    output::OutputMode::Text
}
