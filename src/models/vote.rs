use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::VoterIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    OptionA,
    OptionB,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::OptionA => "option_a",
            VoteChoice::OptionB => "option_b",
        }
    }
}

impl std::str::FromStr for VoteChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "option_a" => Ok(VoteChoice::OptionA),
            "option_b" => Ok(VoteChoice::OptionB),
            other => Err(format!("unknown vote choice: {}", other)),
        }
    }
}

/// An immutable vote record. Never edited after insertion; removed only when
/// its poll is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub voter: VoterIdentity,
    pub choice: VoteChoice,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(poll_id: Uuid, voter: VoterIdentity, choice: VoteChoice, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            poll_id,
            voter,
            choice,
            created_at: now,
        }
    }
}

/// Per-option tallies, always recomputable from stored votes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub option_a: i64,
    pub option_b: i64,
}

impl VoteCount {
    pub fn increment(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::OptionA => self.option_a += 1,
            VoteChoice::OptionB => self.option_b += 1,
        }
    }

    /// Saturating rollback of an optimistic increment.
    pub fn decrement(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::OptionA => self.option_a = (self.option_a - 1).max(0),
            VoteChoice::OptionB => self.option_b = (self.option_b - 1).max(0),
        }
    }

    pub fn total(&self) -> i64 {
        self.option_a + self.option_b
    }
}

// Vote request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter: VoterIdentity,
    pub choice: VoteChoice,
}

/// Business outcome of a vote submission. `AlreadyVoted` and `PollClosed`
/// are ordinary results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    Accepted { vote_id: Uuid },
    AlreadyVoted,
    PollClosed,
}

// Vote response
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    #[serde(flatten)]
    pub outcome: VoteOutcome,
    pub counts: VoteCount,
}
