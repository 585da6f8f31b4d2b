// crates/dispatch/src/session.rs
//! Session lifecycle: activation gating, delivery tasks and teardown

use crate::error::{DispatchError, DispatchResult};
use crate::router::{Route, RoutingTable};
use crate::sinks::Sinks;
use crate::stats::{DeliverySnapshot, DeliveryStats};
use bookwire_channel::{MessageChannel, Watch};
use bookwire_core::{Topic, DEFAULT_DESTINATION_PREFIX};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Which topics a session routes and where they live on the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub topics: Vec<Topic>,
    pub destination_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            topics: Topic::ALL.to_vec(),
            destination_prefix: DEFAULT_DESTINATION_PREFIX.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_topics(mut self, topics: impl IntoIterator<Item = Topic>) -> Self {
        self.topics = topics.into_iter().collect();
        self
    }

    pub fn with_destination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.destination_prefix = prefix.into();
        self
    }
}

/// Where a session is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Waiting for authentication
    Uninitialized,
    /// Installing subscriptions
    Activating,
    /// Every route has its subscription
    Active,
    /// Subscriptions released; the session cannot be reused
    TornDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::TornDown => "torn down",
        };
        f.write_str(name)
    }
}

struct Lifecycle {
    state: LifecycleState,
    tasks: Vec<JoinHandle<()>>,
}

/// One authenticated client lifetime
///
/// Owns the sinks and every subscription made for them. Activation happens
/// once; later readiness signals are ignored. Dropping the session tears
/// it down.
pub struct Session {
    id: Uuid,
    channel: Arc<MessageChannel>,
    sinks: Sinks,
    routes: RoutingTable,
    stats: Arc<DeliveryStats>,
    authentication_ready: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    /// Open while deliveries may reach the sinks; held for the length of
    /// each delivery so sink updates never overlap
    gate: Arc<Mutex<bool>>,
}

impl Session {
    /// Creates a session with fresh sinks
    pub fn new(channel: Arc<MessageChannel>, config: SessionConfig) -> Self {
        Self::with_sinks(channel, Sinks::new(), config)
    }

    /// Creates a session feeding existing sinks
    pub fn with_sinks(channel: Arc<MessageChannel>, sinks: Sinks, config: SessionConfig) -> Self {
        let routes = RoutingTable::new(&sinks, &config.topics, &config.destination_prefix);
        let id = Uuid::new_v4();
        log::debug!("Session {} routes {} topic(s)", id, routes.len());

        Self {
            id,
            channel,
            sinks,
            routes,
            stats: Arc::new(DeliveryStats::new()),
            authentication_ready: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Uninitialized,
                tasks: Vec::new(),
            }),
            gate: Arc::new(Mutex::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sinks(&self) -> &Sinks {
        &self.sinks
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn channel(&self) -> &Arc<MessageChannel> {
        &self.channel
    }

    fn lifecycle(&self) -> DispatchResult<MutexGuard<'_, Lifecycle>> {
        self.lifecycle
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("session lifecycle"))
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle()
            .map(|lifecycle| lifecycle.state)
            .unwrap_or(LifecycleState::TornDown)
    }

    pub fn is_authentication_ready(&self) -> bool {
        self.authentication_ready.load(Ordering::SeqCst)
    }

    /// Mirrors the channel's connection state
    pub fn is_transport_connected(&self) -> bool {
        self.channel.state().is_connected()
    }

    /// Installs one subscription per route and starts delivering
    ///
    /// Returns `Ok(false)` when the session is already activating or active.
    pub fn activate(&self) -> DispatchResult<bool> {
        let mut lifecycle = self.lifecycle()?;
        match lifecycle.state {
            LifecycleState::TornDown => return Err(DispatchError::TornDown),
            LifecycleState::Activating | LifecycleState::Active => {
                log::debug!("Session {} already {}; ignoring activation", self.id, lifecycle.state);
                return Ok(false);
            }
            LifecycleState::Uninitialized => {}
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
        lifecycle.state = LifecycleState::Activating;

        let watches = match self.open_watches() {
            Ok(watches) => watches,
            Err(e) => {
                lifecycle.state = LifecycleState::Uninitialized;
                return Err(e);
            }
        };

        lifecycle.tasks = watches
            .into_iter()
            .map(|(route, watch)| {
                runtime.spawn(deliver(
                    watch,
                    route,
                    Arc::clone(&self.gate),
                    Arc::clone(&self.stats),
                ))
            })
            .collect();
        lifecycle.state = LifecycleState::Active;

        log::info!(
            "Session {} active with {} subscription(s)",
            self.id,
            lifecycle.tasks.len()
        );
        Ok(true)
    }

    fn open_watches(&self) -> DispatchResult<Vec<(Route, Watch)>> {
        self.channel.connect()?;
        self.routes
            .routes()
            .iter()
            .map(|route| {
                let watch = self.channel.watch(route.destination.clone())?;
                Ok((route.clone(), watch))
            })
            .collect()
    }

    /// Records the authentication signal, activating on `true`
    ///
    /// A `false` signal only clears the flag; live subscriptions stay.
    pub fn set_authentication_ready(&self, ready: bool) -> DispatchResult<bool> {
        self.authentication_ready.store(ready, Ordering::SeqCst);
        if ready {
            self.activate()
        } else {
            Ok(false)
        }
    }

    /// Waits for the first `true` on `ready`, then activates
    pub async fn activate_when_ready(&self, mut ready: watch::Receiver<bool>) -> DispatchResult<bool> {
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| DispatchError::ReadinessClosed)?;
        self.set_authentication_ready(true)
    }

    /// Stops deliveries and releases every subscription
    ///
    /// Safe before activation and when called again.
    pub fn deactivate(&self) {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if lifecycle.state == LifecycleState::TornDown {
                return;
            }
            lifecycle.state = LifecycleState::TornDown;
            std::mem::take(&mut lifecycle.tasks)
        };

        // Waits out a delivery already in progress
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;

        for task in &tasks {
            task.abort();
        }
        log::info!(
            "Session {} torn down, released {} subscription(s)",
            self.id,
            tasks.len()
        );
    }

    /// Subscriptions held by the session
    pub fn subscription_count(&self) -> usize {
        self.lifecycle()
            .map(|lifecycle| lifecycle.tasks.len())
            .unwrap_or(0)
    }

    /// Topics with a live subscription
    pub fn active_topics(&self) -> Vec<Topic> {
        if self.state() == LifecycleState::Active {
            self.routes.topics()
        } else {
            Vec::new()
        }
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn deliver(
    mut watch: Watch,
    route: Route,
    gate: Arc<Mutex<bool>>,
    stats: Arc<DeliveryStats>,
) {
    while let Some(message) = watch.recv().await {
        let open = {
            let Ok(open) = gate.lock() else {
                log::error!("Delivery gate poisoned; stopping {}", route.topic);
                break;
            };
            if *open {
                match route.deliver(&message.body) {
                    Ok(()) => stats.record_delivered(),
                    Err(e) if e.is_sink_rejection() => stats.record_sink_rejection(),
                    Err(_) => stats.record_decode_failure(),
                }
            }
            *open
        };
        if !open {
            break;
        }
    }
    log::debug!("Delivery for {} on {} ended", route.topic, watch.destination());
}
