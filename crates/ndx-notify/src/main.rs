//! NDX Notify CLI
//!
//! Exit codes: 0 when every event was sent or skipped, 1 when some events
//! failed, 2 when the command could not run.

use anyhow::Result;
use clap::ArgMatches;
use ndx_notify::commands::{self, ProcessArgs};
use ndx_notify::{cli, logging};
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::command().get_matches();
    logging::init(matches.get_flag("log-json"));

    match run(&matches).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<bool> {
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut stdout = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("process", sub)) => {
            let args = ProcessArgs {
                input: sub
                    .get_one::<String>("input")
                    .cloned()
                    .unwrap_or_else(|| "-".into()),
                config: config_path,
                sandbox: sub.get_flag("sandbox"),
                leases: sub.get_one::<String>("leases").map(PathBuf::from),
            };
            commands::run_process(&args, &mut stdout).await
        }
        Some(("render", sub)) => {
            let config = commands::load_config(config_path.as_deref())?;
            let template_id = sub
                .get_one::<String>("template")
                .map_or("", String::as_str);
            let personalisation = commands::parse_personalisation(
                sub.get_many::<String>("set")
                    .into_iter()
                    .flatten()
                    .map(String::as_str),
            )?;
            commands::run_render(&config, template_id, &personalisation, &mut stdout)?;
            Ok(true)
        }
        Some(("check-config", _)) => {
            let config = commands::load_config(config_path.as_deref())?;
            commands::run_check_config(&config, &mut stdout)?;
            Ok(true)
        }
        _ => {
            cli::command().print_help()?;
            Ok(true)
        }
    }
}
