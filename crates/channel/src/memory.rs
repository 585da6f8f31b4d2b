// crates/channel/src/memory.rs
//! In-process STOMP broker
//!
//! Speaks just enough STOMP to stand in for the library server in tests and
//! demos: it answers CONNECT, tracks subscriptions per connection and routes
//! published bodies to every matching subscription as MESSAGE frames.

use crate::error::{ChannelError, ChannelResult};
use crate::frame::{Command, Frame};
use crate::heartbeat::HeartBeat;
use crate::transport::{Connector, Transport};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
struct BrokerState {
    reachable: bool,
    reject_reason: Option<String>,
    heartbeat: HeartBeat,
    next_connection: u64,
    next_message: u64,
    connect_attempts: usize,
    connections: BTreeMap<u64, BrokerConnection>,
    received: Vec<Frame>,
}

struct BrokerConnection {
    outbound: mpsc::UnboundedSender<String>,
    /// Subscription id -> destination
    subscriptions: BTreeMap<String, String>,
}

/// Shared handle to an in-memory broker
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    changed: Arc<Notify>,
}

impl MemoryBroker {
    /// Creates a reachable broker with heart-beats disabled
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                reachable: true,
                ..Default::default()
            })),
            changed: Arc::new(Notify::new()),
        }
    }

    /// Connector that opens transports to this broker
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            broker: self.clone(),
        }
    }

    // A panic inside a test must not cascade through every later assertion
    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn touch(&self) {
        self.changed.notify_waiters();
    }

    /// Refuses (false) or accepts (true) new connections
    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Answers CONNECT with an ERROR frame while set
    pub fn reject_connections(&self, reason: Option<&str>) {
        self.state().reject_reason = reason.map(str::to_string);
    }

    /// Heart-beat header sent back in CONNECTED
    pub fn set_heartbeat(&self, heartbeat: HeartBeat) {
        self.state().heartbeat = heartbeat;
    }

    /// Drops every open connection as if the network went away
    pub fn drop_connections(&self) {
        self.state().connections.clear();
        self.touch();
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.state().connections.len()
    }

    /// Number of transport connects attempted, refused ones included
    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    /// Active subscriptions across all connections
    pub fn subscription_count(&self) -> usize {
        self.state()
            .connections
            .values()
            .map(|c| c.subscriptions.len())
            .sum()
    }

    /// Destinations with at least one active subscription, sorted, with repeats
    pub fn subscribed_destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self
            .state()
            .connections
            .values()
            .flat_map(|c| c.subscriptions.values().cloned())
            .collect();
        destinations.sort();
        destinations
    }

    /// Every client frame received so far, in arrival order
    pub fn received_frames(&self) -> Vec<Frame> {
        self.state().received.clone()
    }

    /// Sends `body` to every subscription on `destination`
    ///
    /// Returns the number of MESSAGE frames delivered.
    pub fn publish(&self, destination: &str, body: &str) -> usize {
        let mut state = self.state();
        let mut delivered = 0;
        let mut next_message = state.next_message;

        for connection in state.connections.values() {
            for (id, subscribed) in &connection.subscriptions {
                if subscribed != destination {
                    continue;
                }
                let frame = Frame::new(Command::Message)
                    .with_header("destination", destination)
                    .with_header("subscription", id.as_str())
                    .with_header("message-id", next_message.to_string())
                    .with_header("content-type", "application/json")
                    .with_body(body);
                next_message += 1;
                if connection.outbound.send(frame.encode()).is_ok() {
                    delivered += 1;
                }
            }
        }

        state.next_message = next_message;
        delivered
    }

    /// Sends a raw text message down every connection
    pub fn send_raw(&self, text: &str) {
        for connection in self.state().connections.values() {
            let _ = connection.outbound.send(text.to_string());
        }
    }

    /// Waits until the subscription count equals `count`
    pub async fn wait_for_subscriptions(&self, count: usize) {
        loop {
            let notified = self.changed.notified();
            if self.subscription_count() == count {
                return;
            }
            notified.await;
        }
    }

    /// Waits until the number of open connections equals `count`
    pub async fn wait_for_connections(&self, count: usize) {
        loop {
            let notified = self.changed.notified();
            if self.connection_count() == count {
                return;
            }
            notified.await;
        }
    }

    /// Waits until at least `count` connects have been attempted
    pub async fn wait_for_connect_attempts(&self, count: usize) {
        loop {
            let notified = self.changed.notified();
            if self.connect_attempts() >= count {
                return;
            }
            notified.await;
        }
    }

    fn open(&self) -> ChannelResult<(u64, mpsc::UnboundedReceiver<String>)> {
        let mut state = self.state();
        state.connect_attempts += 1;
        if !state.reachable {
            drop(state);
            self.touch();
            return Err(ChannelError::Transport("connection refused".to_string()));
        }

        let (outbound, inbound) = mpsc::unbounded_channel();
        let id = state.next_connection;
        state.next_connection += 1;
        state.connections.insert(
            id,
            BrokerConnection {
                outbound,
                subscriptions: BTreeMap::new(),
            },
        );
        drop(state);
        self.touch();
        Ok((id, inbound))
    }

    fn close(&self, connection: u64) {
        self.state().connections.remove(&connection);
        self.touch();
    }

    fn handle(&self, connection: u64, text: &str) -> ChannelResult<()> {
        let frames = Frame::parse_all(text)?;
        let mut state = self.state();
        if !state.connections.contains_key(&connection) {
            return Err(ChannelError::ConnectionClosed);
        }

        let mut close_after = false;
        for frame in frames {
            state.received.push(frame.clone());
            let reject_reason = state.reject_reason.clone();
            let heartbeat = state.heartbeat;
            let Some(conn) = state.connections.get_mut(&connection) else {
                break;
            };

            match frame.command {
                Command::Connect | Command::Stomp => {
                    let reply = match reject_reason {
                        Some(reason) => {
                            close_after = true;
                            Frame::new(Command::Error)
                                .with_header("message", reason.as_str())
                                .with_body(reason)
                        }
                        None => Frame::new(Command::Connected)
                            .with_header("version", "1.2")
                            .with_header("heart-beat", heartbeat.to_string()),
                    };
                    let _ = conn.outbound.send(reply.encode());
                }
                Command::Subscribe => {
                    if let (Some(id), Some(destination)) =
                        (frame.header("id"), frame.header("destination"))
                    {
                        conn.subscriptions
                            .insert(id.to_string(), destination.to_string());
                    }
                }
                Command::Unsubscribe => {
                    if let Some(id) = frame.header("id") {
                        conn.subscriptions.remove(id);
                    }
                }
                Command::Disconnect => {
                    if let Some(receipt) = frame.header("receipt") {
                        let reply =
                            Frame::new(Command::Receipt).with_header("receipt-id", receipt);
                        let _ = conn.outbound.send(reply.encode());
                    }
                    close_after = true;
                }
                _ => {}
            }
        }

        if close_after {
            state.connections.remove(&connection);
        }
        drop(state);
        self.touch();
        Ok(())
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens [`MemoryTransport`]s to a [`MemoryBroker`]
#[derive(Clone)]
pub struct MemoryConnector {
    broker: MemoryBroker,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>> {
        let (connection, inbound) = self.broker.open()?;
        Ok(Box::new(MemoryTransport {
            broker: self.broker.clone(),
            connection,
            inbound,
        }))
    }

    fn endpoint(&self) -> String {
        "memory://broker".to_string()
    }
}

/// One client connection to a [`MemoryBroker`]
pub struct MemoryTransport {
    broker: MemoryBroker,
    connection: u64,
    inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> ChannelResult<()> {
        self.broker.handle(self.connection, &text)
    }

    async fn recv(&mut self) -> Option<ChannelResult<String>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> ChannelResult<()> {
        self.broker.close(self.connection);
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.broker.close(self.connection);
    }
}
