// crates/dispatch/src/router.rs
//! Topic routing table: destination -> decoder -> sink

use crate::error::DispatchResult;
use crate::sinks::{NotificationSink, Sinks};
use bookwire_core::{decoder_for, Decoder, Topic};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Delivery path for one topic
#[derive(Clone)]
pub struct Route {
    pub topic: Topic,
    /// Broker destination the route subscribes to
    pub destination: String,
    decoder: Decoder,
    sink: Arc<dyn NotificationSink>,
}

impl Route {
    pub fn new(topic: Topic, destination: String, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            topic,
            destination,
            decoder: decoder_for(topic),
            sink,
        }
    }

    /// Decodes one message body and hands the result to the sink
    ///
    /// Failures are logged and returned; the sink is left untouched when
    /// decoding fails.
    pub fn deliver(&self, body: &str) -> DispatchResult<()> {
        let notification = (self.decoder)(body).map_err(|e| {
            log::warn!("Dropping {} message: {}", self.topic, e);
            e
        })?;

        log::debug!("{}: {}", self.topic, notification.summary());
        self.sink.update(notification).map_err(|e| {
            log::debug!("{} rejected {} message: {}", self.sink.name(), self.topic, e);
            e
        })
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("topic", &self.topic)
            .field("destination", &self.destination)
            .field("sink", &self.sink.name())
            .finish()
    }
}

/// One route per enabled topic, in catalogue order
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Builds routes for `topics` under `prefix`
    ///
    /// Repeated topics collapse into one route, so a topic never gets a
    /// second subscription.
    pub fn new(sinks: &Sinks, topics: &[Topic], prefix: &str) -> Self {
        let wanted: HashSet<Topic> = topics.iter().copied().collect();
        let routes = Topic::ALL
            .into_iter()
            .filter(|topic| wanted.contains(topic))
            .map(|topic| Route::new(topic, topic.destination(prefix), sinks.sink_for(topic)))
            .collect();
        Self { routes }
    }

    /// Routes for every known topic
    pub fn all(sinks: &Sinks, prefix: &str) -> Self {
        Self::new(sinks, &Topic::ALL, prefix)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route_for(&self, topic: Topic) -> Option<&Route> {
        self.routes.iter().find(|route| route.topic == topic)
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.routes.iter().map(|route| route.topic).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
