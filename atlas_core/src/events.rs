use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

use atlas_schema::{CellDetail, SelectionKind, SelectionSnapshot};

/// Notifications the engine sends to its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SelectionChanged {
        kind: SelectionKind,
        snapshot: SelectionSnapshot,
    },
    CellClicked {
        detail: CellDetail,
    },
    SelectionSaved {
        snapshot: SelectionSnapshot,
    },
    SummarizeRequested {
        snapshot: SelectionSnapshot,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::SelectionChanged { .. } => "selection_changed",
            EngineEvent::CellClicked { .. } => "cell_clicked",
            EngineEvent::SelectionSaved { .. } => "selection_saved",
            EngineEvent::SummarizeRequested { .. } => "summarize_requested",
        }
    }
}

/// Fan-out of engine events to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&mut self, event: EngineEvent) {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        let pruned = before - self.subscribers.len();
        tracing::trace!(
            target: "atlas::engine",
            event = event.name(),
            subscribers = self.subscribers.len(),
            pruned,
            "events.published"
        );
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut bus = EventBus::default();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        bus.publish(EngineEvent::SelectionSaved {
            snapshot: SelectionSnapshot::default(),
        });
        assert_eq!(bus.subscriber_count(), 1);
        let received: Vec<_> = kept.try_iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name(), "selection_saved");
    }
}
