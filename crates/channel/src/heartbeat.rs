// crates/channel/src/heartbeat.rs
//! STOMP heart-beat header and negotiation

use crate::error::{ChannelError, ChannelResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for a negotiated interval; the broker controls its half of the header
pub const MAX_HEARTBEAT_MS: u64 = 60 * 60 * 1000;

/// A `heart-beat` header value: `outgoing,incoming` in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartBeat {
    /// Smallest interval at which the sender can emit heart-beats (0 = cannot)
    pub outgoing: u64,
    /// Desired interval at which the sender wants to receive them (0 = does not)
    pub incoming: u64,
}

impl HeartBeat {
    pub fn new(outgoing: u64, incoming: u64) -> Self {
        Self { outgoing, incoming }
    }

    /// Heart-beats disabled in both directions
    pub fn disabled() -> Self {
        Self::default()
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing, self.incoming)
    }
}

impl FromStr for HeartBeat {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ChannelError::Frame(format!("bad heart-beat header '{}'", s));
        let (outgoing, incoming) = s.split_once(',').ok_or_else(bad)?;
        Ok(Self {
            outgoing: outgoing.trim().parse().map_err(|_| bad())?,
            incoming: incoming.trim().parse().map_err(|_| bad())?,
        })
    }
}

/// Agreed heart-beat timing for one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartBeatTiming {
    /// How often we must send an EOL to the broker
    pub send_every: Option<Duration>,
    /// Silence longer than this means the connection is dead
    pub expect_within: Option<Duration>,
}

impl HeartBeatTiming {
    /// Negotiates timing from our offer and the broker's CONNECTED header
    ///
    /// The receive window is twice the agreed interval so one late beat is
    /// tolerated. Intervals above [`MAX_HEARTBEAT_MS`] are clamped to it.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> Self {
        let agreed = |ours: u64, theirs: u64| ours.max(theirs).min(MAX_HEARTBEAT_MS);
        let send_every = (client.outgoing > 0 && server.incoming > 0)
            .then(|| Duration::from_millis(agreed(client.outgoing, server.incoming)));
        let expect_within = (client.incoming > 0 && server.outgoing > 0).then(|| {
            Duration::from_millis(agreed(client.incoming, server.outgoing).saturating_mul(2))
        });
        Self {
            send_every,
            expect_within,
        }
    }

    /// Reads the broker's `heart-beat` header, treating absence as disabled
    pub fn from_connected(client: HeartBeat, header: Option<&str>) -> ChannelResult<Self> {
        let server = header
            .map(str::parse::<HeartBeat>)
            .transpose()?
            .unwrap_or_default();
        Ok(Self::negotiate(client, server))
    }
}
