//! Push notifications for the presentation layer
//!
//! Every field transition and mutation milestone is broadcast so a UI can
//! re-render without polling.

use crate::client::state::{ErrorInfo, FieldState};
use crate::contract::{Field, Value};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Events emitted by the state client
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientEvent {
    /// A cached field changed status or value
    FieldChanged {
        field: Field,
        state: FieldState<Value>,
    },
    /// Authorization was granted and the call dispatched
    MutationSubmitted { operation: String, account: String },
    /// The call was included; `confirmed` tells whether read-after-write succeeded
    MutationIncluded {
        operation: String,
        tx_hash: String,
        block_number: u64,
        confirmed: bool,
    },
    /// The mutation ended without being included
    MutationFailed { operation: String, error: ErrorInfo },
}

/// Fan-out of client events
#[derive(Debug)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send an event to all current subscribers
    pub fn broadcast(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_with_no_subscribers() {
        let broadcaster = EventBroadcaster::default();
        assert_eq!(broadcaster.subscriber_count(), 0);
        broadcaster.broadcast(ClientEvent::MutationSubmitted {
            operation: "increaseNumber".into(),
            account: "0xabc".into(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = ClientEvent::FieldChanged {
            field: Field::Number,
            state: FieldState::stale(Value::Uint(3)),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("FieldChanged"));
        assert!(json.contains("\"field\":\"number\""));
        assert!(json.contains("\"status\":\"stale\""));
    }
}
