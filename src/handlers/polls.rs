use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::Result,
    models::{CreatePollRequest, PollResponse, VoteCount},
    services::poll_service,
};

pub async fn create_poll(
    State(state): State<AppState>,
    Json(payload): Json<CreatePollRequest>,
) -> Result<Json<PollResponse>> {
    payload.validate()?;

    let poll = poll_service::create_poll(state.store.as_ref(), payload, Utc::now()).await?;
    let status = poll.status;
    Ok(Json(PollResponse::new(poll, status, VoteCount::default())))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<PollResponse>> {
    let response = poll_service::get_poll(state.store.as_ref(), poll_id, Utc::now()).await?;
    Ok(Json(response))
}

pub async fn close_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<Value>> {
    poll_service::close_poll(state.store.as_ref(), &state.hub, poll_id).await?;
    Ok(Json(json!({ "message": "Poll closed" })))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<Value>> {
    poll_service::delete_poll(state.store.as_ref(), &state.hub, poll_id).await?;
    Ok(Json(json!({ "message": "Poll deleted" })))
}

/// Operator-invoked expiration sweep. Safe to call repeatedly or
/// concurrently; each call only touches rows still matching the
/// active-and-expired predicate.
pub async fn sweep_expired(State(state): State<AppState>) -> Result<Json<Value>> {
    let closed = poll_service::sweep_expired(state.store.as_ref(), Utc::now()).await?;
    Ok(Json(json!({ "closed": closed })))
}
