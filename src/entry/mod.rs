use std::ffi::OsString;
use std::path::Path;

use clap::{CommandFactory, FromArgMatches};
use tracing::warn;

use crate::app;
use crate::args::{Command, RunArgs};
use crate::config::{DEFAULT_CONFIG_FILES, load_config};
use crate::error::{AppError, AppResult, ValidationError};
use crate::logger::init_logging;
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

/// Binary entry point: parses arguments, runs the selected scene and fails
/// when any threshold was breached.
///
/// # Errors
///
/// Returns an error when arguments or configuration are invalid, the run
/// fails, or thresholds are breached.
pub fn run() -> AppResult<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    init_logging(args.verbose, args.no_color);
    let file = load_config(args.config.as_deref())?;

    if args.command == Some(Command::List) {
        print!("{}", app::render_listing(file.as_ref()));
        return Ok(());
    }

    let resolved = app::resolve_run(&args, file.as_ref(), |key| std::env::var(key).ok())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(ValidationError::RuntimeBuildFailed { source: err }))?;

    runtime.block_on(async {
        let (shutdown_tx, _shutdown_rx) = shutdown_channel();
        let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

        let outcome = app::run_load_test(resolved, &shutdown_tx).await;
        drop(shutdown_tx.send(()));
        if let Err(err) = signal_handle.await {
            warn!("Signal handler task failed: {}", err);
        }

        let outcome = outcome?;
        if outcome.breaches.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(ValidationError::ThresholdsBreached {
                count: outcome.breaches.len(),
            }))
        }
    })
}

fn parse_args() -> AppResult<Option<RunArgs>> {
    let mut cmd = RunArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    Ok(Some(RunArgs::from_arg_matches(&matches)?))
}

/// Bare invocations print help unless a scene can come from the
/// environment or a default config file.
fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    std::env::var_os("SCENE").is_none() && !has_default_config()
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}
