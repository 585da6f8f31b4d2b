// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use bookwire_config::{Config, ConfigManager, LogLevel};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

mod commands;
mod listen;

fn build_cli() -> Command {
    Command::new("bookwire")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live notification client for a BookLore-style library server")
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config directory)")
                .global(true),
        )
        .subcommand(
            Command::new("listen")
                .about("Connect and print live notifications until Ctrl-C")
                .arg(
                    Arg::new("url")
                        .short('u')
                        .long("url")
                        .value_name("URL")
                        .help("WebSocket endpoint, e.g. ws://localhost:6060/ws"),
                )
                .arg(
                    Arg::new("token")
                        .short('t')
                        .long("token")
                        .value_name("TOKEN")
                        .help("Bearer token sent when connecting"),
                )
                .arg(
                    Arg::new("topic")
                        .long("topic")
                        .value_name("NAME")
                        .help("Only listen to this topic (repeatable)")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(Command::new("topics").about("List topics and their broker destinations"))
        .subcommand(
            Command::new("config")
                .about("Manage the configuration file")
                .subcommand(Command::new("init").about("Write a default config file if none exists"))
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("path").about("Print the config file location")),
        )
}

fn config_manager(matches: &ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config-dir") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir))
            .with_context(|| format!("Failed to use config directory {}", dir)),
        None => ConfigManager::new().context("Failed to locate config directory"),
    }
}

fn init_logging(level: LogLevel) {
    // RUST_LOG still wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;
    let config: Config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;

    init_logging(config.app.log_level);
    console::set_colors_enabled(config.app.color_output);

    match matches.subcommand() {
        Some(("listen", sub_matches)) => {
            let config = commands::apply_listen_flags(config, sub_matches)?;
            listen::run(config).await
        }
        Some(("topics", _)) => {
            commands::show_topics(&config);
            Ok(())
        }
        Some(("config", sub_matches)) => match sub_matches.subcommand() {
            Some(("init", _)) => commands::config_init(&manager),
            Some(("show", _)) => commands::config_show(&config),
            Some(("path", _)) => {
                println!("{}", manager.config_path().display());
                Ok(())
            }
            _ => {
                build_cli()
                    .find_subcommand_mut("config")
                    .map(|cmd| cmd.print_help())
                    .transpose()?;
                Ok(())
            }
        },
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
