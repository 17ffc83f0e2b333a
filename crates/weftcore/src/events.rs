use crate::graph::{ArcId, GraphId, NodeId};
use crate::process::ProcessId;
use crate::token::TokenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the interpreter at every token transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessEvent {
    ProcessStarted {
        process_id: ProcessId,
        graph_id: GraphId,
        graph_name: String,
        timestamp: DateTime<Utc>,
    },
    ProcessCompleted {
        process_id: ProcessId,
        timestamp: DateTime<Utc>,
    },
    NodeTokenCreated {
        process_id: ProcessId,
        token_id: TokenId,
        node_id: NodeId,
        node_name: String,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeTokenCompleted {
        process_id: ProcessId,
        token_id: TokenId,
        node_id: NodeId,
        label: String,
        timestamp: DateTime<Utc>,
    },
    NodeDiscarded {
        process_id: ProcessId,
        token_id: TokenId,
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    NodeSkipped {
        process_id: ProcessId,
        token_id: TokenId,
        node_id: NodeId,
        label: String,
        timestamp: DateTime<Utc>,
    },
    NodeParked {
        process_id: ProcessId,
        token_id: TokenId,
        node_id: NodeId,
        node_name: String,
        timestamp: DateTime<Utc>,
    },
    ArcTokenCreated {
        process_id: ProcessId,
        token_id: TokenId,
        arc_id: ArcId,
        label: String,
        timestamp: DateTime<Utc>,
    },
    ArcTokenCompleted {
        process_id: ProcessId,
        token_id: TokenId,
        arc_id: ArcId,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus carrying [`ProcessEvent`]s to any number of
/// subscribers. Emission never blocks; events published with no
/// subscriber are dropped.
pub struct EventBus {
    sender: broadcast::Sender<ProcessEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ProcessEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let process_id = uuid::Uuid::new_v4();
        bus.emit(ProcessEvent::ProcessCompleted {
            process_id,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            ProcessEvent::ProcessCompleted { process_id: id, .. } => {
                assert_eq!(id, process_id)
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(ProcessEvent::ProcessCompleted {
            process_id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
        });
    }
}
