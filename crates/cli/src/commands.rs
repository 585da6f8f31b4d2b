// FILE: crates/cli/src/commands.rs

use anyhow::{anyhow, bail, Context, Result};
use bookwire_channel::{ChannelConfig, HeartBeat};
use bookwire_config::{Config, ConfigManager};
use bookwire_core::{
    LogNotification, MetadataBatchProgress, Topic, TaskProgress, TaskStatus,
};
use bookwire_dispatch::SessionConfig;
use clap::ArgMatches;
use console::style;

/// Applies `listen` flags over the loaded config, then validates the result
pub fn apply_listen_flags(mut config: Config, matches: &ArgMatches) -> Result<Config> {
    if let Some(url) = matches.get_one::<String>("url") {
        config.server.url = url.clone();
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config.server.token = Some(token.clone());
    }
    if let Some(topics) = matches.get_many::<String>("topic") {
        let topics: Vec<String> = topics.cloned().collect();
        parse_topics(&topics)?;
        config.notifications.topics = topics;
    }

    if let Err(errors) = config.validate() {
        let details: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
        bail!("Invalid settings:\n{}", details.join("\n"));
    }
    Ok(config)
}

/// Parses topic names, rejecting unknown ones with the list of valid names
pub fn parse_topics(names: &[String]) -> Result<Vec<Topic>> {
    names
        .iter()
        .map(|name| {
            name.parse::<Topic>().map_err(|_| {
                let known: Vec<&str> = Topic::ALL.iter().map(Topic::name).collect();
                anyhow!("Unknown topic '{}' (known: {})", name, known.join(", "))
            })
        })
        .collect()
}

/// Channel settings derived from the config
pub fn channel_config(config: &Config) -> ChannelConfig {
    ChannelConfig::default()
        .with_host(config.server.host())
        .with_token(config.server.token.clone())
        .with_heartbeat(HeartBeat::new(
            config.server.heartbeat_outgoing_ms,
            config.server.heartbeat_incoming_ms,
        ))
        .with_connect_timeout(config.server.connect_timeout())
        .with_reconnect(config.reconnect.to_backoff_policy())
        .with_buffer(config.notifications.buffer)
}

/// Session settings derived from the config
pub fn session_config(config: &Config) -> SessionConfig {
    SessionConfig::default()
        .with_topics(config.notifications.enabled_topics())
        .with_destination_prefix(config.server.destination_prefix.clone())
}

/// List topics with their destinations
pub fn show_topics(config: &Config) {
    let enabled = config.notifications.enabled_topics();
    let prefix = &config.server.destination_prefix;

    println!("\n{} Topics", style(Topic::ALL.len()).bold().cyan());
    println!("{}", "=".repeat(60));
    for topic in Topic::ALL {
        let marker = if enabled.contains(&topic) {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!("{} {:<30} {}", marker, topic.name(), topic.destination(prefix));
    }
}

/// Write a default config file
pub fn config_init(manager: &ConfigManager) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write default config")?;

    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!(
            "Config already exists at {}",
            manager.config_path().display()
        );
    }
    Ok(())
}

/// Print the effective configuration with the token masked
pub fn config_show(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if shown.server.token.is_some() {
        shown.server.token = Some(mask_token());
    }
    let text = toml::to_string_pretty(&shown).context("Failed to render configuration")?;
    println!("{}", text);
    Ok(())
}

fn mask_token() -> String {
    "********".to_string()
}

pub fn format_log(log: &LogNotification) -> String {
    format!("{} {}", style("log").blue().bold(), log)
}

pub fn format_task(progress: &TaskProgress) -> String {
    let status = match progress.task_status {
        TaskStatus::Completed => style(progress.task_status.to_string()).green(),
        TaskStatus::Failed | TaskStatus::Cancelled => style(progress.task_status.to_string()).red(),
        _ => style(progress.task_status.to_string()).yellow(),
    };
    let mut line = format!(
        "{} {} {:>3}% {}",
        style("task").magenta().bold(),
        progress.task_id,
        progress.progress,
        status
    );
    if let Some(message) = &progress.message {
        line.push_str(&format!(" {}", truncate(message, 60)));
    }
    line
}

pub fn format_batch(progress: &MetadataBatchProgress) -> String {
    format!(
        "{} {} {}/{} ({:.0}%) {:?}",
        style("metadata").cyan().bold(),
        progress.task_id,
        progress.completed,
        progress.total,
        progress.percentage(),
        progress.status
    )
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}
