//! The seam between the engines and the transport.
//!
//! Engines address events to a [`Recipient`] and hand them to a
//! [`Broadcaster`]. The transport task owns group membership and framing. The
//! bundled [`ChannelBroadcaster`] pushes every event into one ordered
//! [`tokio::sync::mpsc`] channel, so the order in which an engine emits events
//! for a recipient is the order in which the transport sees them.

use tokio::sync::mpsc;

use crate::events::ServerEvent;
use crate::ids::{InstanceId, PlayerId, ZoneId};

/// Who an event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// A single connected player.
    Player(PlayerId),
    /// Every player subscribed to a combat instance.
    Instance(InstanceId),
    /// Every player present in a zone.
    Zone(ZoneId),
}

/// An addressed event waiting for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub event: ServerEvent,
}

/// Sink for outbound events. Implementations must preserve call order per
/// recipient.
pub trait Broadcaster: Send + Sync {
    /// Queue an event for delivery.
    fn send(&self, to: Recipient, event: ServerEvent);

    /// Queue an event for a single player.
    fn to_player(&self, player: PlayerId, event: ServerEvent) {
        self.send(Recipient::Player(player), event);
    }

    /// Queue an event for everyone in a combat instance.
    fn to_instance(&self, instance: InstanceId, event: ServerEvent) {
        self.send(Recipient::Instance(instance), event);
    }
}

/// [`Broadcaster`] backed by an unbounded mpsc channel.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelBroadcaster {
    /// Create a broadcaster and the receiving end the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn send(&self, to: Recipient, event: ServerEvent) {
        let name = event.name();
        if self.tx.send(Outbound { to, event }).is_err() {
            tracing::debug!("Transport gone, dropping {name} for {to:?}");
        }
    }
}
