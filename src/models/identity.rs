use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

/// Anonymous tokens look like `anon_{unix_ms}_{random suffix}`. The format
/// is collision-resistant in practice, not cryptographically secured; the
/// token store defends against accidental double voting, not a client
/// rewriting its own storage.
static ANON_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^anon_\d{10,16}_[A-Za-z0-9]{6,32}$").unwrap());

pub fn is_valid_anon_token(token: &str) -> bool {
    ANON_TOKEN_RE.is_match(token)
}

/// Creation time embedded in an anonymous token, when parseable.
pub fn anon_token_issued_at(token: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = token.split('_').nth(1)?.parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// The unit of vote-uniqueness enforcement: a registered user id or a
/// client-held anonymous token. One identity gets at most one vote per poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VoterIdentity {
    User(Uuid),
    Anonymous(String),
}

impl VoterIdentity {
    /// Normalized text key stored in the votes table. Both identity kinds
    /// collapse into one column so a single unique index enforces the
    /// one-vote-per-identity constraint.
    pub fn storage_key(&self) -> String {
        match self {
            VoterIdentity::User(id) => format!("user:{}", id),
            VoterIdentity::Anonymous(token) => token.clone(),
        }
    }

    /// Inverse of [`storage_key`](Self::storage_key). Anything that is not a
    /// well-formed `user:{uuid}` key is treated as an anonymous token.
    pub fn from_storage_key(key: &str) -> Self {
        if let Some(rest) = key.strip_prefix("user:") {
            if let Ok(id) = Uuid::parse_str(rest) {
                return VoterIdentity::User(id);
            }
        }
        VoterIdentity::Anonymous(key.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, VoterIdentity::Anonymous(_))
    }
}

impl std::fmt::Display for VoterIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}
