use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{VoteCount, VoterIdentity};

/// Fixed lifetime policy: every poll expires 24 hours after creation.
pub const POLL_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Active,
    Closed,
    Deleted,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Active => "active",
            PollStatus::Closed => "closed",
            PollStatus::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for PollStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PollStatus::Active),
            "closed" => Ok(PollStatus::Closed),
            "deleted" => Ok(PollStatus::Deleted),
            other => Err(format!("unknown poll status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: Uuid,
    pub created_by: VoterIdentity,
    pub option_a_label: Option<String>,
    pub option_b_label: Option<String>,
    pub option_a_image: Option<String>,
    pub option_b_image: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    /// Stored status. Readers must not trust this alone; see
    /// `poll_service::effective_status`.
    pub status: PollStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(req: CreatePollRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_by: req.creator,
            option_a_label: req.option_a_label,
            option_b_label: req.option_b_label,
            option_a_image: req.option_a_image,
            option_b_image: req.option_b_image,
            description: req.description,
            is_public: req.is_public,
            status: PollStatus::Active,
            expires_at: now + Duration::hours(POLL_LIFETIME_HOURS),
            created_at: now,
        }
    }
}

// Create poll request
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollRequest {
    pub creator: VoterIdentity,
    #[validate(length(max = 80, message = "Option label too long"))]
    pub option_a_label: Option<String>,
    #[validate(length(max = 80, message = "Option label too long"))]
    pub option_b_label: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub option_a_image: Option<String>,
    #[validate(url(message = "Invalid image URL"))]
    pub option_b_image: Option<String>,
    #[validate(length(max = 500, message = "Description too long"))]
    pub description: Option<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
}

fn default_is_public() -> bool {
    true
}

// Poll response with effective status and fresh counts
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub id: Uuid,
    pub option_a_label: Option<String>,
    pub option_b_label: Option<String>,
    pub option_a_image: Option<String>,
    pub option_b_image: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub status: PollStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub counts: VoteCount,
}

impl PollResponse {
    pub fn new(poll: Poll, effective: PollStatus, counts: VoteCount) -> Self {
        Self {
            id: poll.id,
            option_a_label: poll.option_a_label,
            option_b_label: poll.option_b_label,
            option_a_image: poll.option_a_image,
            option_b_image: poll.option_b_image,
            description: poll.description,
            is_public: poll.is_public,
            status: effective,
            expires_at: poll.expires_at,
            created_at: poll.created_at,
            counts,
        }
    }
}
