use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{PollEvent, PollStatus, VoteChoice, VoteCount, VoterIdentity};

/// How long a just-submitted vote's broadcast echo is recognized and
/// swallowed instead of incrementing the displayed tally a second time.
pub const ECHO_WINDOW_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStage {
    Idle,
    Submitting,
    Voted,
    Error,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteStateError {
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("this poll has already been voted on")]
    AlreadyVoted,
}

/// One just-submitted vote awaiting its broadcast echo. Keyed by this
/// machine's (poll, identity) plus the submitted choice, so concurrent
/// polls suppress independently.
#[derive(Debug)]
struct PendingEcho {
    choice: VoteChoice,
    vote_id: Option<Uuid>,
    expires_at: DateTime<Utc>,
}

/// Per-poll, per-identity voting state as the UI sees it.
///
/// Pure and synchronous: the caller feeds it the submission outcome and the
/// broadcast events in whatever order they arrive, and the displayed counts
/// stay correct under either ordering. The displayed tally converges to the
/// authoritative counts as events (or a resync) land.
#[derive(Debug)]
pub struct PollVoteState {
    poll_id: Uuid,
    voter: VoterIdentity,
    stage: VoteStage,
    status: PollStatus,
    counts: VoteCount,
    /// Choice whose optimistic increment is live for the in-flight attempt.
    attempt: Option<VoteChoice>,
    attempts_made: u32,
    pending_echo: Option<PendingEcho>,
    seen_votes: HashSet<Uuid>,
    last_error: Option<String>,
}

impl PollVoteState {
    pub fn new(
        poll_id: Uuid,
        voter: VoterIdentity,
        status: PollStatus,
        counts: VoteCount,
    ) -> Self {
        Self {
            poll_id,
            voter,
            stage: VoteStage::Idle,
            status,
            counts,
            attempt: None,
            attempts_made: 0,
            pending_echo: None,
            seen_votes: HashSet::new(),
            last_error: None,
        }
    }

    pub fn poll_id(&self) -> Uuid {
        self.poll_id
    }

    pub fn voter(&self) -> &VoterIdentity {
        &self.voter
    }

    pub fn stage(&self) -> VoteStage {
        self.stage
    }

    pub fn status(&self) -> PollStatus {
        self.status
    }

    pub fn counts(&self) -> VoteCount {
        self.counts
    }

    pub fn has_voted(&self) -> bool {
        matches!(self.stage, VoteStage::Submitting | VoteStage::Voted)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start a submission: applies the optimistic increment and arms echo
    /// suppression before any network result is known. `Voted` is terminal;
    /// a failed attempt may be retried from `Error`.
    pub fn begin_submit(
        &mut self,
        choice: VoteChoice,
        now: DateTime<Utc>,
    ) -> Result<(), VoteStateError> {
        match self.stage {
            VoteStage::Submitting => return Err(VoteStateError::SubmissionInFlight),
            VoteStage::Voted => return Err(VoteStateError::AlreadyVoted),
            VoteStage::Idle | VoteStage::Error => {}
        }

        self.stage = VoteStage::Submitting;
        self.last_error = None;
        self.attempt = Some(choice);
        self.attempts_made += 1;
        self.counts.increment(choice);
        self.pending_echo = Some(PendingEcho {
            choice,
            vote_id: None,
            expires_at: now + Duration::seconds(ECHO_WINDOW_SECS),
        });
        Ok(())
    }

    /// The gateway acknowledged the write. The optimistic increment already
    /// counted it; the broadcast echo is recognized by its vote id (or by
    /// the armed suppression entry if the echo won the race).
    pub fn resolve_accepted(&mut self, vote_id: Uuid) {
        self.stage = VoteStage::Voted;
        self.attempt = None;
        self.seen_votes.insert(vote_id);
        if let Some(pending) = &mut self.pending_echo {
            pending.vote_id = Some(vote_id);
        }
    }

    /// The identity already holds a vote on this poll. A repeat attempt in
    /// this session rolls its own increment back; a first attempt is a
    /// previously-recorded vote rediscovered after a reload, and its
    /// increment stands until the caller resyncs from authoritative counts.
    pub fn resolve_already_voted(&mut self) {
        if self.attempts_made > 1 {
            if let Some(choice) = self.attempt.take() {
                self.counts.decrement(choice);
            }
        }
        self.stage = VoteStage::Voted;
        self.attempt = None;
        // No insert happened for this attempt, so no echo is coming.
        self.pending_echo = None;
    }

    /// The poll was closed (or expired) by the time the write was evaluated.
    pub fn resolve_poll_closed(&mut self) {
        self.rollback_attempt();
        self.status = PollStatus::Closed;
        self.stage = VoteStage::Error;
        self.last_error = Some("Poll is closed".to_string());
    }

    /// Transport-level failure or timeout. Retry is the caller's choice.
    pub fn resolve_failure(&mut self, reason: impl Into<String>) {
        self.rollback_attempt();
        self.stage = VoteStage::Error;
        self.last_error = Some(reason.into());
    }

    fn rollback_attempt(&mut self) {
        if let Some(choice) = self.attempt.take() {
            self.counts.decrement(choice);
        }
        self.pending_echo = None;
    }

    /// Merge a broadcast event into the displayed state. Every
    /// `VoteInserted` increments the tally unless it is a redelivery of an
    /// already-seen vote or the echo of this machine's own just-submitted
    /// one.
    pub fn apply(&mut self, event: &PollEvent, now: DateTime<Utc>) {
        match event {
            PollEvent::VoteInserted {
                poll_id,
                vote_id,
                choice,
            } => {
                if *poll_id != self.poll_id {
                    return;
                }
                if self.seen_votes.contains(vote_id) {
                    return;
                }
                if self
                    .pending_echo
                    .as_ref()
                    .is_some_and(|pending| now >= pending.expires_at)
                {
                    self.pending_echo = None;
                }
                let is_own_echo = self.pending_echo.as_ref().is_some_and(|pending| {
                    pending.choice == *choice && pending.vote_id.is_none_or(|id| id == *vote_id)
                });
                if is_own_echo {
                    // The echo of our own optimistic update.
                    self.pending_echo = None;
                    self.seen_votes.insert(*vote_id);
                    return;
                }
                self.seen_votes.insert(*vote_id);
                self.counts.increment(*choice);
            }
            PollEvent::PollStatusChanged { poll_id, status } => {
                if *poll_id == self.poll_id {
                    self.status = *status;
                }
            }
        }
    }

    /// Replace the displayed tally with authoritative counts after a
    /// subscription gap. Events already merged stay deduplicated by id.
    pub fn resync(&mut self, counts: VoteCount) {
        self.counts = counts;
    }
}
