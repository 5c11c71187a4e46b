//! Command-line interface for the Plaza server.

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};

/// Options that override the configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file.
    pub config_path: PathBuf,
    /// Overrides `server.bind_address`.
    pub bind_address: Option<String>,
    /// Overrides `logging.level`.
    pub log_level: Option<String>,
    /// Forces JSON log output.
    pub json_logs: bool,
    /// Overrides `server.idle_timeout_secs`.
    pub idle_timeout_secs: Option<u64>,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            bind_address: matches.get_one::<String>("bind").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            idle_timeout_secs: matches.get_one::<u64>("idle-timeout").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("plaza-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Real-time presence and movement gateway for shared 2D spaces")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 0.0.0.0:3001)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("idle-timeout")
                .long("idle-timeout")
                .value_name("SECS")
                .help("Close connections silent for this long (0 disables)")
                .value_parser(clap::value_parser!(u64)),
        )
}
