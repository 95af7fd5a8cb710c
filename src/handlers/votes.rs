use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    models::{VoteCount, VoteRequest, VoteResponse},
    services::vote_service,
};

pub async fn submit_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    // Rate limiting per identity across all polls
    if let Some(redis) = &state.redis {
        let rate_limit_key = format!("vote:{}", payload.voter.storage_key());
        if !redis
            .check_rate_limit(&rate_limit_key, state.config.vote_rate_limit, 3600)
            .await?
        {
            return Err(AppError::RateLimit);
        }
    }

    let outcome = vote_service::submit_vote(
        state.store.as_ref(),
        &state.hub,
        poll_id,
        payload.voter,
        payload.choice,
        Utc::now(),
    )
    .await?;

    let counts = vote_service::counts_for(state.store.as_ref(), poll_id).await?;
    Ok(Json(VoteResponse { outcome, counts }))
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<VoteCount>> {
    state
        .store
        .fetch_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

    let counts = vote_service::counts_for(state.store.as_ref(), poll_id).await?;
    Ok(Json(counts))
}
