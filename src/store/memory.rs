use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Poll, PollStatus, Vote, VoteCount, VoterIdentity};
use crate::store::{PollStore, VoteInsert};

/// In-memory reference implementation of [`PollStore`]. Backs the test suite
/// and embedded deployments; must stay behaviorally indistinguishable from
/// the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    polls: HashMap<Uuid, Poll>,
    votes: HashMap<Uuid, Vec<Vote>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: &Poll) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.polls.insert(poll.id, poll.clone());
        Ok(())
    }

    async fn fetch_poll(&self, poll_id: Uuid) -> Result<Option<Poll>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.polls.get(&poll_id).cloned())
    }

    async fn insert_vote(&self, vote: &Vote) -> Result<VoteInsert> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.polls.contains_key(&vote.poll_id) {
            return Err(AppError::NotFound("Poll not found".to_string()));
        }

        let votes = inner.votes.entry(vote.poll_id).or_default();
        let key = vote.voter.storage_key();
        if votes.iter().any(|v| v.voter.storage_key() == key) {
            return Ok(VoteInsert::DuplicateIdentity);
        }

        votes.push(vote.clone());
        Ok(VoteInsert::Inserted)
    }

    async fn find_vote(&self, poll_id: Uuid, voter: &VoterIdentity) -> Result<Option<Vote>> {
        let inner = self.inner.lock().unwrap();
        let key = voter.storage_key();
        Ok(inner
            .votes
            .get(&poll_id)
            .and_then(|votes| votes.iter().find(|v| v.voter.storage_key() == key))
            .cloned())
    }

    async fn count_votes(&self, poll_id: Uuid) -> Result<VoteCount> {
        let inner = self.inner.lock().unwrap();
        let mut counts = VoteCount::default();
        if let Some(votes) = inner.votes.get(&poll_id) {
            for vote in votes {
                counts.increment(vote.choice);
            }
        }
        Ok(counts)
    }

    async fn mark_closed(&self, poll_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.polls.get_mut(&poll_id) {
            Some(poll) if poll.status == PollStatus::Active => {
                poll.status = PollStatus::Closed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_poll(&self, poll_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let transitioned = match inner.polls.get_mut(&poll_id) {
            Some(poll) if poll.status != PollStatus::Deleted => {
                poll.status = PollStatus::Deleted;
                true
            }
            _ => false,
        };
        if transitioned {
            inner.votes.remove(&poll_id);
        }
        Ok(transitioned)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut swept = 0;
        for poll in inner.polls.values_mut() {
            if poll.status == PollStatus::Active && poll.expires_at <= now {
                poll.status = PollStatus::Closed;
                swept += 1;
            }
        }
        Ok(swept)
    }
}
