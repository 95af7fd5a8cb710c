//! Client-side voting core: identity resolution, the optimistic vote state
//! machine, and the gateway it submits through. Transport-agnostic apart
//! from the bundled HTTP gateway; event delivery comes from a
//! `RealtimeHub` subscription or any equivalent stream the embedder wires
//! in.

pub mod gateway;
pub mod identity;
pub mod token_store;
pub mod vote_state;

pub use gateway::{HttpVoteGateway, SUBMIT_TIMEOUT, VoteGateway, cast_vote};
pub use identity::IdentityResolver;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use vote_state::{ECHO_WINDOW_SECS, PollVoteState, VoteStage, VoteStateError};
