// FILE: crates/cli/src/listen.rs

use crate::commands::{channel_config, format_batch, format_log, format_task, session_config};
use anyhow::{Context, Result};
use bookwire_channel::{ConnectionState, MessageChannel, WebSocketConnector};
use bookwire_config::Config;
use bookwire_dispatch::{NotificationQueue, Session, Sinks};
use console::style;
use std::sync::Arc;

/// Connects, activates a session and prints sink changes until Ctrl-C
pub async fn run(config: Config) -> Result<()> {
    let connector = WebSocketConnector::new(config.server.url.clone())
        .context("Invalid server URL")?
        .with_token(config.server.token.clone());
    let channel = Arc::new(MessageChannel::new(connector, channel_config(&config)));
    let session = Session::new(Arc::clone(&channel), session_config(&config));

    println!(
        "{} Listening on {} for {} topic(s), Ctrl-C to stop",
        style("▶").green().bold(),
        style(&config.server.url).bold(),
        session.routes().len()
    );

    // The token is attached up front, so authentication is ready immediately
    session
        .set_authentication_ready(true)
        .context("Failed to activate notification session")?;
    log::info!(
        "Session {} subscribed to {:?} on {}",
        session.id(),
        session.active_topics(),
        config.server.url
    );

    let result = print_changes(&channel, session.sinks()).await;

    session.deactivate();
    channel.disconnect().await;

    let stats = session.stats();
    log::info!("Session {} closed after {} message(s)", session.id(), stats.received());
    println!(
        "\n{} {} delivered, {} undecodable, {} rejected",
        style("■").dim(),
        stats.delivered,
        stats.decode_failures,
        stats.sink_rejections
    );
    result
}

async fn print_changes(channel: &MessageChannel, sinks: &Sinks) -> Result<()> {
    let mut state = channel.connection().state_changes();
    let mut latest_log = sinks.latest_log.observe();
    let mut tasks = sinks.tasks.observe();
    let mut batches = sinks.metadata_progress.observe();
    let mut duplicates = sinks.duplicates.observe();
    let mut bookdrop = sinks.bookdrop.observe();
    let mut books = sinks.books.observe();

    // Skip the values present before anything arrived
    latest_log.borrow_and_update();
    tasks.borrow_and_update();
    batches.borrow_and_update();
    duplicates.borrow_and_update();
    bookdrop.borrow_and_update();
    books.borrow_and_update();

    let mut seen_books = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for Ctrl-C")?;
                return Ok(());
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                log::debug!("Connection state changed to {}", current);
                println!("{}", format_state(current));
            }
            Ok(()) = latest_log.changed() => {
                println!("{}", format_log(&latest_log.borrow_and_update()));
            }
            Ok(()) = tasks.changed() => {
                // Clone out so the watch is not borrowed while the board is cleared
                let latest = tasks.borrow_and_update().latest.clone();
                if let Some(progress) = latest {
                    println!("{}", format_task(&progress));
                    if progress.task_status.is_terminal() {
                        retire_finished(sinks);
                    }
                }
            }
            Ok(()) = batches.changed() => {
                let latest = batches.borrow_and_update().latest.clone();
                if let Some(progress) = latest {
                    println!("{}", format_batch(&progress));
                    if progress.status.is_finished() {
                        retire_finished(sinks);
                    }
                }
            }
            Ok(()) = duplicates.changed() => {
                duplicates.borrow_and_update();
                for file in drain(&*sinks.duplicates) {
                    println!(
                        "{} {}",
                        style("duplicate").yellow().bold(),
                        file.full_path.as_deref().or(file.file_name.as_deref()).unwrap_or("<unnamed>")
                    );
                }
            }
            Ok(()) = bookdrop.changed() => {
                bookdrop.borrow_and_update();
                for file in drain(&*sinks.bookdrop) {
                    println!(
                        "{} {} pending of {}",
                        style("bookdrop").yellow().bold(),
                        file.pending_count,
                        file.total_count
                    );
                }
            }
            Ok(()) = books.changed() => {
                let count = books.borrow_and_update().len();
                if count != seen_books {
                    println!("{} {} book(s) known", style("books").green().bold(), count);
                    seen_books = count;
                }
            }
        }
    }
}

/// Drops finished tasks and batches once they have been printed
fn retire_finished(sinks: &Sinks) -> usize {
    let removed = sinks.tasks.clear_finished() + sinks.metadata_progress.clear_finished();
    if removed > 0 {
        log::debug!("Cleared {} finished task(s)", removed);
    }
    removed
}

/// Takes every queued item, oldest first
fn drain<T: Clone + Send + Sync>(queue: &NotificationQueue<T>) -> Vec<T> {
    std::iter::from_fn(|| queue.pop()).collect()
}

pub fn format_state(state: ConnectionState) -> String {
    match state {
        ConnectionState::Connected => format!("{} {}", style("●").green(), state),
        ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => {
            format!("{} {}", style("●").yellow(), state)
        }
        ConnectionState::Disconnected | ConnectionState::Closed => {
            format!("{} {}", style("●").red(), state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwire_core::{
        BookdropFile, MetadataBatchProgress, MetadataBatchStatus, TaskProgress, TaskStatus,
    };

    #[test]
    fn test_format_state_mentions_attempt() {
        console::set_colors_enabled(false);
        assert_eq!(
            format_state(ConnectionState::Reconnecting { attempt: 3 }),
            "● reconnecting (attempt 3)"
        );
        assert!(format_state(ConnectionState::Connected).ends_with("connected"));
    }

    #[test]
    fn test_retire_finished_bounds_boards() {
        let sinks = Sinks::default();
        sinks.tasks.record(TaskProgress::new("scan", 100, TaskStatus::Completed));
        sinks.tasks.record(TaskProgress::new("import", 10, TaskStatus::InProgress));
        sinks.metadata_progress.record(MetadataBatchProgress {
            task_id: "job".to_string(),
            completed: 4,
            total: 4,
            message: None,
            status: MetadataBatchStatus::Completed,
            review: false,
        });

        assert_eq!(retire_finished(&sinks), 2);
        assert_eq!(sinks.tasks.len(), 1);
        assert!(sinks.metadata_progress.is_empty());
        assert!(sinks.metadata_progress.latest().is_none());
        assert_eq!(retire_finished(&sinks), 0);
    }

    #[test]
    fn test_drain_empties_queue_in_order() {
        let queue = NotificationQueue::new();
        for pending in [1, 2, 3] {
            queue.push(BookdropFile {
                pending_count: pending,
                ..Default::default()
            });
        }

        let drained: Vec<u32> = drain(&queue).iter().map(|f| f.pending_count).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let mut config = Config::default();
        config.server.url = "http://localhost:6060/ws".to_string();

        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid server URL"));
    }
}
