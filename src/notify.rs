//! Change notices for clients watching an event.

use crate::domain::{EventId, ExpenseId, ParticipantId};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;

/// What changed in an event's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeNotice {
    EntryAdded { expense: ExpenseId },
    EntryRemoved { expense: ExpenseId },
    EntryEdited { expense: ExpenseId },
    ParticipantJoined { participant: ParticipantId },
    ParticipantLeft { participant: ParticipantId },
}

/// Delivers change notices to whoever is listening. Called only after a
/// change has been committed.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn broadcast(&self, event_id: EventId, notice: ChangeNotice);
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<(EventId, ChangeNotice)>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(EventId, ChangeNotice)> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn broadcast(&self, event_id: EventId, notice: ChangeNotice) {
        // An error only means nobody is subscribed right now.
        match self.sender.send((event_id, notice)) {
            Ok(receivers) => {
                tracing::debug!(event_id = %event_id, ?notice, receivers, "notice broadcast")
            }
            Err(_) => tracing::trace!(event_id = %event_id, ?notice, "no subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();
        notifier.broadcast(EventId(1), ChangeNotice::EntryAdded { expense: ExpenseId(5) });

        let (event_id, notice) = rx.recv().await.unwrap();
        assert_eq!(event_id, EventId(1));
        assert_eq!(notice, ChangeNotice::EntryAdded { expense: ExpenseId(5) });
    }

    #[test]
    fn test_broadcast_without_subscribers_is_fine() {
        let notifier = BroadcastNotifier::default();
        notifier.broadcast(
            EventId(1),
            ChangeNotice::ParticipantLeft {
                participant: ParticipantId(2),
            },
        );
    }

    #[test]
    fn test_notice_serialization() {
        let json = serde_json::to_value(ChangeNotice::EntryRemoved { expense: ExpenseId(3) })
            .unwrap();
        assert_eq!(json, serde_json::json!({"kind": "entryRemoved", "expense": 3}));
    }
}
