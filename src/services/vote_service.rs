use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    PollEvent, PollStatus, Vote, VoteChoice, VoteCount, VoteOutcome, VoterIdentity,
    is_valid_anon_token,
};
use crate::services::poll_service::effective_status;
use crate::services::realtime_service::RealtimeHub;
use crate::store::{PollStore, VoteInsert};

/// Record a vote at most once per identity per poll.
///
/// Eligibility is evaluated here, at write time: a request that raced past
/// an `active` status on the client is still rejected once `now` has reached
/// the poll's expiry. A uniqueness conflict is the idempotency guarantee at
/// work, not an error.
pub async fn submit_vote(
    store: &dyn PollStore,
    hub: &RealtimeHub,
    poll_id: Uuid,
    voter: VoterIdentity,
    choice: VoteChoice,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    if let VoterIdentity::Anonymous(token) = &voter {
        if !is_valid_anon_token(token) {
            return Err(AppError::Validation(
                "Malformed anonymous voter token".to_string(),
            ));
        }
    }

    let poll = store
        .fetch_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    if effective_status(poll.status, poll.expires_at, now) != PollStatus::Active {
        return Ok(VoteOutcome::PollClosed);
    }

    let vote = Vote::new(poll_id, voter, choice, now);
    match store.insert_vote(&vote).await? {
        VoteInsert::DuplicateIdentity => {
            tracing::debug!(poll_id = %poll_id, "Duplicate vote attempt ignored");
            Ok(VoteOutcome::AlreadyVoted)
        }
        VoteInsert::Inserted => {
            // Broadcast strictly after the durable write succeeded.
            hub.publish(PollEvent::VoteInserted {
                poll_id,
                vote_id: vote.id,
                choice,
            })
            .await;
            tracing::debug!(poll_id = %poll_id, vote_id = %vote.id, "Vote recorded");
            Ok(VoteOutcome::Accepted { vote_id: vote.id })
        }
    }
}

/// Authoritative tallies, computed fresh on every call.
pub async fn counts_for(store: &dyn PollStore, poll_id: Uuid) -> Result<VoteCount> {
    store.count_votes(poll_id).await
}
