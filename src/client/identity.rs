use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::client::token_store::{TokenStore, generate_token, is_token_stale};
use crate::error::Result;
use crate::models::{VoterIdentity, is_valid_anon_token};

/// Produces the canonical voter identity for a poll: the registered user id
/// when the session is authenticated, otherwise the poll's anonymous token,
/// minting and persisting one on first use.
pub struct IdentityResolver {
    session_user: Option<Uuid>,
    tokens: Arc<dyn TokenStore>,
}

impl IdentityResolver {
    pub fn new(session_user: Option<Uuid>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            session_user,
            tokens,
        }
    }

    pub fn resolve(&self, poll_id: Uuid, now: DateTime<Utc>) -> Result<VoterIdentity> {
        if let Some(user_id) = self.session_user {
            return Ok(VoterIdentity::User(user_id));
        }
        Ok(VoterIdentity::Anonymous(
            self.get_or_create_token(poll_id, now)?,
        ))
    }

    pub fn get_or_create_token(&self, poll_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        if let Some(token) = self.tokens.get(poll_id)? {
            if is_valid_anon_token(&token) {
                if is_token_stale(&token, now) {
                    // Stale tokens stay in use: replacing one would let the
                    // same voter cast a second vote.
                    tracing::debug!(poll_id = %poll_id, "Reusing stale anonymous token");
                }
                return Ok(token);
            }
            tracing::warn!(poll_id = %poll_id, "Replacing malformed anonymous token");
        }

        let token = generate_token(now);
        self.tokens.set(poll_id, &token)?;
        Ok(token)
    }

    pub fn has_token(&self, poll_id: Uuid) -> Result<bool> {
        Ok(self.tokens.get(poll_id)?.is_some())
    }

    pub fn clear_token(&self, poll_id: Uuid) -> Result<()> {
        self.tokens.delete(poll_id)
    }
}
