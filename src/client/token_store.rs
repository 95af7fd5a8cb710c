use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::anon_token_issued_at;

/// Tokens older than this are considered stale. Informational only: a vote
/// already cast with a stale token stays valid, and the token keeps being
/// reused so the voter cannot accidentally vote twice.
pub const TOKEN_MAX_AGE_DAYS: i64 = 30;

/// Client-side durable key-value area holding one anonymous token per poll.
/// Injected rather than ambient; the server never invents or rewrites
/// entries, it only accepts the token as a voter-identity value.
pub trait TokenStore: Send + Sync {
    fn get(&self, poll_id: Uuid) -> Result<Option<String>>;
    fn set(&self, poll_id: Uuid, token: &str) -> Result<()>;
    fn delete(&self, poll_id: Uuid) -> Result<()>;
}

pub fn generate_token(now: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..8).map(|_| char::from(rng.sample(Alphanumeric))).collect();
    format!("anon_{}_{}", now.timestamp_millis(), suffix)
}

pub fn is_token_stale(token: &str, now: DateTime<Utc>) -> bool {
    anon_token_issued_at(token)
        .map(|issued| now - issued > Duration::days(TOKEN_MAX_AGE_DAYS))
        .unwrap_or(true)
}

/// In-memory token store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<Uuid, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, poll_id: Uuid) -> Result<Option<String>> {
        Ok(self.tokens.lock().unwrap().get(&poll_id).cloned())
    }

    fn set(&self, poll_id: Uuid, token: &str) -> Result<()> {
        self.tokens.lock().unwrap().insert(poll_id, token.to_string());
        Ok(())
    }

    fn delete(&self, poll_id: Uuid) -> Result<()> {
        self.tokens.lock().unwrap().remove(&poll_id);
        Ok(())
    }
}

/// File-backed token store: a JSON map of poll id to token, rewritten on
/// every change. Unreadable state is discarded rather than blocking voting.
pub struct FileTokenStore {
    path: PathBuf,
    tokens: Mutex<HashMap<Uuid, String>>,
}

impl FileTokenStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tokens = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(tokens) => tokens,
                Err(e) => {
                    tracing::warn!("Discarding corrupt token store {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            tokens: Mutex::new(tokens),
        })
    }

    fn persist(&self, tokens: &HashMap<Uuid, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, poll_id: Uuid) -> Result<Option<String>> {
        Ok(self.tokens.lock().unwrap().get(&poll_id).cloned())
    }

    fn set(&self, poll_id: Uuid, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(poll_id, token.to_string());
        self.persist(&tokens)
    }

    fn delete(&self, poll_id: Uuid) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        if tokens.remove(&poll_id).is_some() {
            self.persist(&tokens)?;
        }
        Ok(())
    }
}
