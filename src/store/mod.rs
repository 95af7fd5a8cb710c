//! Durable storage contract for polls and votes.
//!
//! The uniqueness-constrained vote insert is the only strict serialization
//! point in the system; every implementation must evaluate it atomically at
//! write time.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Poll, Vote, VoteCount, VoterIdentity};

/// Result of a uniqueness-constrained vote insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteInsert {
    Inserted,
    /// The (poll, identity) pair already holds a vote. The stored choice is
    /// left untouched.
    DuplicateIdentity,
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: &Poll) -> Result<()>;

    async fn fetch_poll(&self, poll_id: Uuid) -> Result<Option<Poll>>;

    /// Insert a vote, enforcing at-most-one-vote-per-identity-per-poll.
    async fn insert_vote(&self, vote: &Vote) -> Result<VoteInsert>;

    async fn find_vote(&self, poll_id: Uuid, voter: &VoterIdentity) -> Result<Option<Vote>>;

    /// Authoritative tallies, indistinguishable from a live scan.
    async fn count_votes(&self, poll_id: Uuid) -> Result<VoteCount>;

    /// Close a still-active poll. Returns whether a transition happened;
    /// already-closed or deleted polls are a no-op.
    async fn mark_closed(&self, poll_id: Uuid) -> Result<bool>;

    /// Mark a poll deleted and cascade removal of its votes. Returns whether
    /// a transition happened.
    async fn delete_poll(&self, poll_id: Uuid) -> Result<bool>;

    /// Rewrite stored status to closed for every active poll whose expiry
    /// has passed. Returns the number of polls updated. Safe to run
    /// concurrently: each invocation only touches rows still matching the
    /// predicate.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
