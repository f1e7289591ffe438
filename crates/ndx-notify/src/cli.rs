//! Command line definition

use clap::{Arg, ArgAction, Command};

/// Build the `ndx-notify` command
#[must_use]
pub fn command() -> Command {
    Command::new("ndx-notify")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Idempotent delivery of NDX lease notifications")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("process")
                .about("Process lease events from a file or stdin")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .required(true)
                        .value_name("FILE|-")
                        .help("JSON array or JSON lines of EventBridge events; '-' reads stdin"),
                )
                .arg(
                    Arg::new("sandbox")
                        .long("sandbox")
                        .action(ArgAction::SetTrue)
                        .help("Render and record emails locally instead of calling Notify"),
                )
                .arg(
                    Arg::new("leases")
                        .long("leases")
                        .value_name("FILE")
                        .help("JSON array of lease records used for enrichment"),
                ),
        )
        .subcommand(
            Command::new("render")
                .about("Render a template locally")
                .arg(
                    Arg::new("template")
                        .long("template")
                        .short('t')
                        .required(true)
                        .help("Template id"),
                )
                .arg(
                    Arg::new("set")
                        .long("set")
                        .value_name("KEY=VALUE")
                        .action(ArgAction::Append)
                        .help("Personalisation value, repeatable"),
                ),
        )
        .subcommand(
            Command::new("check-config").about("Validate configuration and list template routes"),
        )
}
