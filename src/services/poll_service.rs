use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{CreatePollRequest, Poll, PollEvent, PollResponse, PollStatus};
use crate::services::realtime_service::RealtimeHub;
use crate::store::PollStore;

/// The status a poll actually has right now, regardless of what the status
/// column says. A stale stored `active` never permits a vote after expiry;
/// `deleted` takes precedence over everything.
pub fn effective_status(
    stored: PollStatus,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> PollStatus {
    match stored {
        PollStatus::Deleted => PollStatus::Deleted,
        _ if now >= expires_at => PollStatus::Closed,
        stored => stored,
    }
}

pub async fn create_poll(
    store: &dyn PollStore,
    req: CreatePollRequest,
    now: DateTime<Utc>,
) -> Result<Poll> {
    let poll = Poll::new(req, now);
    store.insert_poll(&poll).await?;

    tracing::info!(poll_id = %poll.id, expires_at = %poll.expires_at, "Poll created");
    Ok(poll)
}

pub async fn get_poll(
    store: &dyn PollStore,
    poll_id: Uuid,
    now: DateTime<Utc>,
) -> Result<PollResponse> {
    let poll = store
        .fetch_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    let effective = effective_status(poll.status, poll.expires_at, now);
    if effective == PollStatus::Deleted {
        return Err(AppError::NotFound("Poll not found".to_string()));
    }

    let counts = store.count_votes(poll_id).await?;
    Ok(PollResponse::new(poll, effective, counts))
}

/// Explicit close. Idempotent: closing an already-closed or deleted poll is
/// a no-op and broadcasts nothing.
pub async fn close_poll(store: &dyn PollStore, hub: &RealtimeHub, poll_id: Uuid) -> Result<()> {
    store
        .fetch_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    if store.mark_closed(poll_id).await? {
        hub.publish(PollEvent::PollStatusChanged {
            poll_id,
            status: PollStatus::Closed,
        })
        .await;
        tracing::info!(poll_id = %poll_id, "Poll closed");
    }

    Ok(())
}

/// Explicit deletion, cascading removal of the poll's votes. Idempotent for
/// already-deleted polls.
pub async fn delete_poll(store: &dyn PollStore, hub: &RealtimeHub, poll_id: Uuid) -> Result<()> {
    store
        .fetch_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    if store.delete_poll(poll_id).await? {
        hub.publish(PollEvent::PollStatusChanged {
            poll_id,
            status: PollStatus::Deleted,
        })
        .await;
        tracing::info!(poll_id = %poll_id, "Poll deleted");
    }

    Ok(())
}

/// Eagerly close every expired-but-still-active poll. Failures propagate to
/// the caller: a missed sweep only delays eventual consistency, the lazy
/// `effective_status` check remains the safety net.
pub async fn sweep_expired(store: &dyn PollStore, now: DateTime<Utc>) -> Result<u64> {
    store.sweep_expired(now).await
}
