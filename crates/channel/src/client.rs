// crates/channel/src/client.rs
//! Message channel: one broker connection shared by many watches
//!
//! A background driver task owns the transport. It connects under the
//! reconnect policy, performs the STOMP handshake, subscribes every
//! registered watch and then pumps frames until the connection is lost or
//! the channel is shut down. Watches survive reconnects untouched; delivery
//! is at-most-once and nothing is replayed across a reconnect.

use crate::error::{ChannelError, ChannelResult};
use crate::frame::{Command, Frame};
use crate::heartbeat::{HeartBeat, HeartBeatTiming};
use crate::transport::{Connector, Transport};
use bookwire_resilience::{retry_async, BackoffPolicy, Timeout};
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

/// Settings for a [`MessageChannel`]
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Virtual host sent in CONNECT
    pub host: String,
    /// Bearer token sent in CONNECT
    pub token: Option<String>,
    /// Heart-beats we offer (outgoing) and ask for (incoming)
    pub heartbeat: HeartBeat,
    /// Bound on transport setup plus the CONNECT handshake
    pub connect_timeout: Duration,
    /// Backoff between connection attempts
    pub reconnect: BackoffPolicy,
    /// Messages buffered per watch before overflow is dropped
    pub buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            token: None,
            heartbeat: HeartBeat::new(20_000, 0),
            connect_timeout: Duration::from_secs(10),
            reconnect: BackoffPolicy::unlimited()
                .with_initial_delay(Duration::from_secs(5))
                .with_max_delay(Duration::from_secs(60))
                .with_multiplier(1.5),
            buffer: 64,
        }
    }
}

impl ChannelConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartBeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: BackoffPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the per-watch buffer; zero is raised to one
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

/// Observable state of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Handshake done, subscriptions installed
    Connected,
    /// Connection lost or refused; `attempt` counts tries since the last success
    Reconnecting { attempt: usize },
    /// Shut down for good
    Closed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {})", attempt),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// A message delivered to a watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Destination the broker delivered on
    pub destination: String,
    /// Subscription id the message arrived through
    pub subscription: String,
    pub message_id: Option<String>,
    /// Raw body, usually JSON
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// Handle on the connection started by [`MessageChannel::connect`]
#[derive(Debug, Clone)]
pub struct Connection {
    state: watch::Receiver<ConnectionState>,
}

impl Connection {
    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver yielding the current state and every later change
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Waits until connected; fails if the channel closes first
    pub async fn wait_connected(&mut self) -> ChannelResult<()> {
        let state = self
            .state
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Closed))
            .await
            .map_err(|_| ChannelError::Closed)?;
        let closed = matches!(*state, ConnectionState::Closed);
        drop(state);

        if closed {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

enum Request {
    Subscribe(u64),
    Unsubscribe(u64),
}

struct WatchEntry {
    destination: String,
    sender: mpsc::Sender<Message>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    watches: BTreeMap<u64, WatchEntry>,
}

struct Shared {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    registry: Mutex<Registry>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    requests: mpsc::UnboundedSender<Request>,
    /// Held by the running driver for its whole lifetime
    request_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Request>>,
}

fn subscription_id(id: u64) -> String {
    format!("sub-{}", id)
}

fn parse_subscription_id(raw: &str) -> Option<u64> {
    raw.strip_prefix("sub-")?.parse().ok()
}

impl Shared {
    fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            log::debug!("Channel to {} is {}", self.connector.endpoint(), next);
        }
    }

    fn register(&self, destination: String) -> ChannelResult<(u64, mpsc::Receiver<Message>)> {
        if self.is_shut_down() {
            return Err(ChannelError::Closed);
        }

        let (sender, receiver) = mpsc::channel(self.config.buffer.max(1));
        let id = {
            let mut registry = self
                .registry
                .lock()
                .map_err(|_| ChannelError::LockPoisoned("watch registry"))?;
            let id = registry.next_id;
            registry.next_id += 1;
            registry.watches.insert(
                id,
                WatchEntry {
                    destination: destination.clone(),
                    sender,
                },
            );
            id
        };

        log::debug!("Watching {} as {}", destination, subscription_id(id));
        // The driver may not be running yet; the request waits in the queue
        let _ = self.requests.send(Request::Subscribe(id));
        Ok((id, receiver))
    }

    fn release(&self, id: u64) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.watches.remove(&id);
        }
        let _ = self.requests.send(Request::Unsubscribe(id));
    }

    fn registered(&self) -> Vec<(u64, String)> {
        match self.registry.lock() {
            Ok(registry) => registry
                .watches
                .iter()
                .map(|(id, entry)| (*id, entry.destination.clone()))
                .collect(),
            Err(_) => {
                log::error!("Watch registry lock poisoned; nothing to resubscribe");
                Vec::new()
            }
        }
    }

    fn destination_of(&self, id: u64) -> Option<String> {
        self.registry
            .lock()
            .ok()?
            .watches
            .get(&id)
            .map(|entry| entry.destination.clone())
    }

    fn watch_count(&self) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.watches.len())
            .unwrap_or(0)
    }

    /// Routes every frame in an inbound transport message
    fn dispatch(&self, text: &str) -> ChannelResult<()> {
        let frames = match Frame::parse_all(text) {
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("Dropping unparsable message from broker: {}", e);
                return Ok(());
            }
        };

        for frame in frames {
            match frame.command {
                Command::Message => self.deliver(frame),
                Command::Error => return Err(ChannelError::Rejected(error_reason(&frame))),
                Command::Receipt => {
                    log::debug!("Receipt {}", frame.header("receipt-id").unwrap_or("?"))
                }
                other => log::debug!("Ignoring {} frame", other),
            }
        }
        Ok(())
    }

    fn deliver(&self, frame: Frame) {
        let Some(subscription) = frame.header("subscription").map(str::to_string) else {
            log::debug!("MESSAGE without subscription header dropped");
            return;
        };
        let Some(id) = parse_subscription_id(&subscription) else {
            log::debug!("MESSAGE for foreign subscription {} dropped", subscription);
            return;
        };

        let registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(_) => {
                log::error!("Watch registry lock poisoned; message dropped");
                return;
            }
        };
        let Some(entry) = registry.watches.get(&id) else {
            // Watch dropped while the UNSUBSCRIBE was in flight
            return;
        };

        let message = Message {
            destination: frame
                .header("destination")
                .map(str::to_string)
                .unwrap_or_else(|| entry.destination.clone()),
            message_id: frame.header("message-id").map(str::to_string),
            subscription,
            body: frame.body,
            received_at: Utc::now(),
        };

        match entry.sender.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(message)) => log::warn!(
                "Watch on {} is lagging; dropped message {}",
                entry.destination,
                message.message_id.as_deref().unwrap_or("?")
            ),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Ends every watch stream and marks the channel closed
    fn finish(&self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.watches.clear();
        }
        self.set_state(ConnectionState::Closed);
    }
}

fn error_reason(frame: &Frame) -> String {
    frame
        .header("message")
        .map(str::to_string)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| frame.body.trim().to_string())
}

/// Client side of the broker connection
///
/// `connect` starts the background driver; `watch` may be called before or
/// after connecting and keeps delivering across reconnects.
pub struct MessageChannel {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MessageChannel {
    /// Creates a channel; nothing happens on the network until `connect`
    pub fn new<C>(connector: C, config: ChannelConfig) -> Self
    where
        C: Connector + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        let (requests, request_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                config,
                connector: Arc::new(connector),
                registry: Mutex::new(Registry::default()),
                state,
                shutdown,
                requests,
                request_rx: tokio::sync::Mutex::new(request_rx),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Handle on the connection state without starting anything
    pub fn connection(&self) -> Connection {
        Connection {
            state: self.shared.state.subscribe(),
        }
    }

    /// Starts the driver if it is not already running
    ///
    /// Idempotent: while a driver is alive this only returns a new handle.
    /// Connection failures never surface here; they show up as
    /// [`ConnectionState::Reconnecting`] while the driver keeps trying.
    pub fn connect(&self) -> ChannelResult<Connection> {
        if self.shared.is_shut_down() {
            return Err(ChannelError::Closed);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let mut driver = self
            .driver
            .lock()
            .map_err(|_| ChannelError::LockPoisoned("channel driver"))?;
        let running = driver.as_ref().is_some_and(|handle| !handle.is_finished());
        if !running {
            log::info!("Connecting to {}", self.shared.connector.endpoint());
            *driver = Some(runtime.spawn(run(Arc::clone(&self.shared))));
        }

        Ok(self.connection())
    }

    /// Subscribes to a broker destination
    ///
    /// The returned [`Watch`] yields messages in broker order. Dropping it
    /// unsubscribes.
    pub fn watch(&self, destination: impl Into<String>) -> ChannelResult<Watch> {
        let destination = destination.into();
        let (id, receiver) = self.shared.register(destination.clone())?;
        Ok(Watch {
            id,
            destination,
            receiver,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Number of live watches
    pub fn watch_count(&self) -> usize {
        self.shared.watch_count()
    }

    /// Sends DISCONNECT, stops the driver and ends every watch
    ///
    /// The channel cannot be reconnected afterwards.
    pub async fn disconnect(&self) {
        self.shared.shutdown.send_replace(true);

        let handle = self.driver.lock().ok().and_then(|mut driver| driver.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("Channel driver ended abnormally: {}", e);
            }
        }

        self.shared.finish();
        log::info!("Disconnected from {}", self.shared.connector.endpoint());
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        self.shared.shutdown.send_replace(true);
    }
}

/// A live subscription to one destination
///
/// Ends (`None`) only when the channel is disconnected or dropped.
pub struct Watch {
    id: u64,
    destination: String,
    receiver: mpsc::Receiver<Message>,
    shared: Arc<Shared>,
}

impl Watch {
    /// Subscription id used on the wire
    pub fn subscription_id(&self) -> String {
        subscription_id(self.id)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Waits for the next message
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Stream for Watch {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl fmt::Debug for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .finish()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        log::debug!("Releasing {} on {}", subscription_id(self.id), self.destination);
        self.shared.release(self.id);
    }
}

struct Live {
    transport: Box<dyn Transport>,
    timing: HeartBeatTiming,
}

impl Live {
    async fn send(&mut self, frame: Frame) -> ChannelResult<()> {
        log::debug!("-> {}", frame);
        self.transport.send(frame.encode()).await
    }

    async fn close(mut self) {
        if let Err(e) = self.send(Frame::disconnect(None)).await {
            log::debug!("DISCONNECT not sent: {}", e);
        }
        if let Err(e) = self.transport.close().await {
            log::debug!("Transport close failed: {}", e);
        }
    }
}

enum PumpExit {
    Shutdown,
    Lost(ChannelError),
}

async fn run(shared: Arc<Shared>) {
    let mut requests = shared.request_rx.lock().await;
    let mut shutdown = shared.shutdown.subscribe();
    let policy = shared.config.reconnect.clone();
    let mut reconnecting = false;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let established = tokio::select! {
            _ = shutdown.changed() => break,
            result = retry_async(&policy, |attempt| {
                establish(Arc::clone(&shared), attempt, reconnecting)
            }) => result,
        };

        let mut live = match established {
            Ok(live) => live,
            Err(e) => {
                log::error!(
                    "Giving up on {} after {} attempt(s): {}",
                    shared.connector.endpoint(),
                    e.attempts().unwrap_or(1),
                    e
                );
                shared.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        shared.set_state(ConnectionState::Connected);
        log::info!("Connected to {}", shared.connector.endpoint());

        match pump(&shared, &mut live, &mut requests, &mut shutdown).await {
            PumpExit::Shutdown => {
                live.close().await;
                break;
            }
            PumpExit::Lost(e) => {
                if e.is_retryable() {
                    log::warn!("Lost connection to {}: {}", shared.connector.endpoint(), e);
                } else {
                    log::error!("Lost connection to {}: {}", shared.connector.endpoint(), e);
                }
                let _ = live.transport.close().await;
                reconnecting = true;
                shared.set_state(ConnectionState::Reconnecting { attempt: 1 });

                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(policy.delay_for_attempt(1)) => {}
                }
            }
        }
    }

    shared.finish();
}

async fn establish(shared: Arc<Shared>, attempt: usize, reconnecting: bool) -> ChannelResult<Live> {
    let state = if attempt == 0 && !reconnecting {
        ConnectionState::Connecting
    } else {
        ConnectionState::Reconnecting {
            attempt: attempt + usize::from(reconnecting),
        }
    };
    shared.set_state(state);

    let timeout = Timeout::new(shared.config.connect_timeout);
    let result = match timeout.execute(handshake(&shared)).await {
        Ok(result) => result,
        Err(e) => Err(ChannelError::from(e)),
    };

    if let Err(e) = &result {
        log::warn!(
            "Connection attempt to {} failed: {}",
            shared.connector.endpoint(),
            e
        );
    }
    result
}

async fn handshake(shared: &Shared) -> ChannelResult<Live> {
    let config = &shared.config;
    let mut transport = shared.connector.connect().await?;
    transport
        .send(Frame::connect(&config.host, config.token.as_deref(), config.heartbeat).encode())
        .await?;

    loop {
        let text = match transport.recv().await {
            Some(text) => text?,
            None => return Err(ChannelError::ConnectionClosed),
        };

        for frame in Frame::parse_all(&text)? {
            match frame.command {
                Command::Connected => {
                    let timing = HeartBeatTiming::from_connected(
                        config.heartbeat,
                        frame.header("heart-beat"),
                    )?;
                    log::debug!(
                        "STOMP {} session, heart-beats {:?}",
                        frame.header("version").unwrap_or("1.2"),
                        timing
                    );
                    return Ok(Live { transport, timing });
                }
                Command::Error => return Err(ChannelError::Rejected(error_reason(&frame))),
                other => log::debug!("Ignoring {} before CONNECTED", other),
            }
        }
    }
}

async fn pump(
    shared: &Shared,
    live: &mut Live,
    requests: &mut mpsc::UnboundedReceiver<Request>,
    shutdown: &mut watch::Receiver<bool>,
) -> PumpExit {
    let mut subscribed = HashSet::new();
    for (id, destination) in shared.registered() {
        if let Err(e) = live
            .send(Frame::subscribe(&subscription_id(id), &destination))
            .await
        {
            return PumpExit::Lost(e);
        }
        subscribed.insert(id);
    }

    let mut beat = live.timing.send_every.and_then(|every| {
        let start = Instant::now().checked_add(every)?;
        Some(tokio::time::interval_at(start, every))
    });
    let mut last_inbound = Instant::now();

    loop {
        let deadline = live
            .timing
            .expect_within
            .and_then(|window| last_inbound.checked_add(window));

        tokio::select! {
            _ = shutdown.changed() => return PumpExit::Shutdown,
            request = requests.recv() => {
                let Some(request) = request else {
                    return PumpExit::Shutdown;
                };
                if let Err(e) = apply(shared, live, &mut subscribed, request).await {
                    return PumpExit::Lost(e);
                }
            }
            incoming = live.transport.recv() => match incoming {
                None => return PumpExit::Lost(ChannelError::ConnectionClosed),
                Some(Err(e)) => return PumpExit::Lost(e),
                Some(Ok(text)) => {
                    last_inbound = Instant::now();
                    if let Err(e) = shared.dispatch(&text) {
                        return PumpExit::Lost(e);
                    }
                }
            },
            _ = next_beat(&mut beat) => {
                if let Err(e) = live.transport.send("\n".to_string()).await {
                    return PumpExit::Lost(e);
                }
            }
            _ = expire(deadline) => return PumpExit::Lost(ChannelError::HeartbeatTimeout),
        }
    }
}

async fn apply(
    shared: &Shared,
    live: &mut Live,
    subscribed: &mut HashSet<u64>,
    request: Request,
) -> ChannelResult<()> {
    match request {
        Request::Subscribe(id) => {
            if subscribed.contains(&id) {
                return Ok(());
            }
            let Some(destination) = shared.destination_of(id) else {
                return Ok(());
            };
            live.send(Frame::subscribe(&subscription_id(id), &destination))
                .await?;
            subscribed.insert(id);
        }
        Request::Unsubscribe(id) => {
            if subscribed.remove(&id) {
                live.send(Frame::unsubscribe(&subscription_id(id))).await?;
            }
        }
    }
    Ok(())
}

async fn next_beat(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChannelConfig::default();
        assert_eq!(config.heartbeat, HeartBeat::new(20_000, 0));
        assert_eq!(config.buffer, 64);
        assert_eq!(config.reconnect.max_attempts(), None);
    }

    #[test]
    fn test_buffer_floor() {
        let config = ChannelConfig::default().with_buffer(0);
        assert_eq!(config.buffer, 1);
    }

    #[test]
    fn test_subscription_ids() {
        assert_eq!(subscription_id(3), "sub-3");
        assert_eq!(parse_subscription_id("sub-3"), Some(3));
        assert_eq!(parse_subscription_id("other-3"), None);
        assert_eq!(parse_subscription_id("sub-x"), None);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "reconnecting (attempt 2)"
        );
        assert!(!ConnectionState::Closed.is_connected());
    }

    #[test]
    fn test_error_reason_prefers_message_header() {
        let frame = Frame::new(Command::Error)
            .with_header("message", "bad token")
            .with_body("details");
        assert_eq!(error_reason(&frame), "bad token");

        let frame = Frame::new(Command::Error).with_body(" details \n");
        assert_eq!(error_reason(&frame), "details");
    }

    #[test]
    fn test_connect_outside_runtime_fails() {
        let broker = crate::memory::MemoryBroker::new();
        let channel = MessageChannel::new(broker.connector(), ChannelConfig::default());
        assert!(matches!(channel.connect(), Err(ChannelError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_watch_before_connect_is_registered() {
        let broker = crate::memory::MemoryBroker::new();
        let channel = MessageChannel::new(broker.connector(), ChannelConfig::default());

        let watch = channel.watch("/user/queue/log").unwrap();
        assert_eq!(watch.subscription_id(), "sub-0");
        assert_eq!(channel.watch_count(), 1);

        drop(watch);
        assert_eq!(channel.watch_count(), 0);
    }
}
