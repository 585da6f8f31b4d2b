//! Edge case and error scenario tests

use bookwire_config::{Config, ConfigManager, LogLevel};
use std::fs;
use tempfile::TempDir;

fn setup_test_manager() -> Result<(TempDir, ConfigManager), Box<dyn std::error::Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let temp_dir = TempDir::new()?;
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())?;
    Ok((temp_dir, manager))
}

fn write_config(manager: &ConfigManager, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = manager.config_path();
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, content)?;
    Ok(())
}

#[test]
fn test_corrupted_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    write_config(&manager, "this is not valid TOML {{{")?;

    assert!(manager.load().is_err());
    assert_eq!(manager.load_or_default(), Config::default());

    Ok(())
}

#[test]
fn test_save_creates_parent_directories() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let nested_path = temp_dir.path().join("a").join("b").join("c");
    let manager = ConfigManager::with_directory(nested_path)?;

    manager.save(&Config::default())?;
    assert!(manager.config_path().exists());

    Ok(())
}

#[test]
fn test_concurrent_config_loads() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let config_dir = temp_dir.path().to_path_buf();
    let manager = ConfigManager::with_directory(config_dir.clone())?;
    manager.initialize()?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dir = config_dir.clone();
            std::thread::spawn(move || {
                let mgr = ConfigManager::with_directory(dir).ok()?;
                let mut last = None;
                for _ in 0..10 {
                    last = mgr.load().ok();
                }
                last
            })
        })
        .collect();

    for handle in handles {
        let loaded = handle.join().map_err(|_| "thread panicked")?;
        assert_eq!(loaded, Some(Config::default()));
    }

    Ok(())
}

#[test]
fn test_boundary_values_validation() {
    let mut config = Config::default();

    config.notifications.buffer = 1;
    assert!(config.validate().is_ok());

    config.notifications.buffer = 0;
    assert!(config.validate().is_err());

    config.notifications.buffer = 64;
    config.server.heartbeat_outgoing_ms = 0;
    config.server.heartbeat_incoming_ms = 0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_topic_list_is_valid() {
    let mut config = Config::default();
    config.notifications.topics.clear();

    assert!(config.validate().is_ok());
    assert!(config.notifications.enabled_topics().is_empty());
}

#[test]
fn test_unknown_topic_names_reported() {
    let mut config = Config::default();
    config.notifications.topics = vec!["log".to_string(), "book-explode".to_string()];

    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "notifications.topics");
    assert_eq!(config.notifications.enabled_topics().len(), 1);
}

#[test]
fn test_duplicate_topic_names_reported() {
    let mut config = Config::default();
    config.notifications.topics = vec!["log".to_string(), "log".to_string()];

    assert!(config.validate().is_err());
}

#[test]
fn test_wss_with_path_and_port_accepted() {
    let mut config = Config::default();
    config.server.url = "wss://books.example.org:8443/api/ws".to_string();

    assert!(config.validate().is_ok());
    assert_eq!(config.server.host(), "books.example.org");
}

#[test]
fn test_reconnect_max_below_initial_rejected() {
    let mut config = Config::default();
    config.reconnect.initial_delay_ms = 10_000;
    config.reconnect.max_delay_ms = 1_000;

    let errors = config.validate().unwrap_err();
    assert!(errors.iter().any(|e| e.field == "reconnect.max_delay_ms"));
}

#[test]
fn test_rapid_saves() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    for buffer in 1..=20 {
        manager.update(|config| config.notifications.buffer = buffer)?;
    }

    assert_eq!(manager.load()?.notifications.buffer, 20);

    Ok(())
}

#[test]
fn test_all_validation_errors_collected() {
    let mut config = Config::default();
    config.server.url = "localhost".to_string();
    config.server.destination_prefix = "queue".to_string();
    config.reconnect.multiplier = 0.5;
    config.notifications.buffer = 0;

    let errors = config.validate().unwrap_err();
    assert!(errors.len() >= 4);
}

#[test]
fn test_config_file_deleted_during_operation() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    fs::remove_file(manager.config_path())?;

    assert_eq!(manager.load()?, Config::default());

    Ok(())
}

#[test]
fn test_partial_config_toml() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    write_config(
        &manager,
        r#"
version = 1

[server]
url = "wss://partial.example.org/ws"
token = "abc"

[app]
log_level = "debug"
"#,
    )?;

    let config = manager.load()?;
    assert_eq!(config.server.url, "wss://partial.example.org/ws");
    assert_eq!(config.server.token.as_deref(), Some("abc"));
    assert_eq!(config.app.log_level, LogLevel::Debug);
    assert_eq!(config.reconnect, Default::default());
    assert_eq!(config.notifications.buffer, 64);

    Ok(())
}

#[test]
fn test_unknown_keys_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    write_config(
        &manager,
        r#"
version = 1

[server]
url = "ws://localhost:6060/ws"
legacy_option = true

[player]
default_volume = 50
"#,
    )?;

    let config = manager.load()?;
    assert_eq!(config.server.url, "ws://localhost:6060/ws");

    Ok(())
}

#[test]
fn test_update_with_invalid_value() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;
    manager.initialize()?;

    let result = manager.update(|config| {
        config.server.connect_timeout_secs = 0;
    });
    assert!(result.is_err());

    assert_eq!(manager.load()?.server.connect_timeout_secs, 10);

    Ok(())
}

#[test]
fn test_backup_preserved_on_failed_save() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, manager) = setup_test_manager()?;

    manager.save(&Config::default())?;
    manager.save(&Config::default())?;

    let backup_path = manager.config_path().with_extension("toml.backup");
    assert!(backup_path.exists());

    let mut invalid = Config::default();
    invalid.notifications.buffer = 0;
    assert!(manager.save(&invalid).is_err());

    assert!(backup_path.exists());
    assert_eq!(manager.load()?, Config::default());

    Ok(())
}
