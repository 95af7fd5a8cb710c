use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{PollStatus, VoteChoice};

/// Events broadcast to every subscriber of a poll, including the voter whose
/// own write produced them. `vote_id` lets subscribers deduplicate
/// at-least-once redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PollEvent {
    VoteInserted {
        poll_id: Uuid,
        vote_id: Uuid,
        choice: VoteChoice,
    },
    PollStatusChanged {
        poll_id: Uuid,
        status: PollStatus,
    },
}

impl PollEvent {
    pub fn poll_id(&self) -> Uuid {
        match self {
            PollEvent::VoteInserted { poll_id, .. } => *poll_id,
            PollEvent::PollStatusChanged { poll_id, .. } => *poll_id,
        }
    }
}

/// Wire envelope for cross-instance fan-out. `origin` identifies the
/// publishing process so the Redis bridge can drop its own publications
/// instead of delivering them twice.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub origin: Uuid,
    #[serde(flatten)]
    pub event: PollEvent,
}
