use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

use crate::client::vote_state::PollVoteState;
use crate::error::{AppError, Result};
use crate::models::{VoteChoice, VoteCount, VoteOutcome, VoteRequest, VoteResponse};

/// Upper bound on how long a submission may hold the UI in `submitting`.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// The voting core's view of the server: submit a vote, query authoritative
/// counts. Idempotent under retry for the same (poll, identity).
#[async_trait]
pub trait VoteGateway: Send + Sync {
    async fn submit(&self, poll_id: Uuid, request: &VoteRequest) -> Result<VoteOutcome>;

    async fn counts(&self, poll_id: Uuid) -> Result<VoteCount>;
}

/// HTTP gateway speaking to the poll service's REST surface.
pub struct HttpVoteGateway {
    base_url: String,
    http: reqwest::Client,
}

impl HttpVoteGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl VoteGateway for HttpVoteGateway {
    async fn submit(&self, poll_id: Uuid, request: &VoteRequest) -> Result<VoteOutcome> {
        let url = format!("{}/api/polls/{}/vote", self.base_url, poll_id);
        let response: VoteResponse = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.outcome)
    }

    async fn counts(&self, poll_id: Uuid) -> Result<VoteCount> {
        let url = format!("{}/api/polls/{}/results", self.base_url, poll_id);
        let counts: VoteCount = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(counts)
    }
}

/// Drive one submission through the state machine: apply the optimistic
/// update, await the gateway with a bounded timeout, and reconcile.
///
/// The machine ends in `voted` or `error`, never stuck in `submitting`. An
/// `AlreadyVoted` outcome is followed by a counts resync so a vote
/// rediscovered after a reload is not displayed twice.
pub async fn cast_vote(
    state: &mut PollVoteState,
    gateway: &dyn VoteGateway,
    choice: VoteChoice,
) -> Result<VoteOutcome> {
    state
        .begin_submit(choice, Utc::now())
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let request = VoteRequest {
        voter: state.voter().clone(),
        choice,
    };

    match tokio::time::timeout(SUBMIT_TIMEOUT, gateway.submit(state.poll_id(), &request)).await {
        Ok(Ok(outcome)) => {
            match outcome {
                VoteOutcome::Accepted { vote_id } => state.resolve_accepted(vote_id),
                VoteOutcome::AlreadyVoted => {
                    state.resolve_already_voted();
                    match gateway.counts(state.poll_id()).await {
                        Ok(counts) => state.resync(counts),
                        Err(e) => {
                            tracing::warn!("Failed to resync counts after duplicate vote: {}", e)
                        }
                    }
                }
                VoteOutcome::PollClosed => state.resolve_poll_closed(),
            }
            Ok(outcome)
        }
        Ok(Err(e)) => {
            state.resolve_failure(e.to_string());
            Err(e)
        }
        Err(_) => {
            state.resolve_failure("vote submission timed out");
            Err(AppError::Timeout)
        }
    }
}
