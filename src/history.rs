use std::sync::Arc;
use tracing::error;

use crate::error::StoreError;
use crate::store::SharedStore;

/// Maximum number of turns kept per user (3 user/AI exchanges).
pub const MAX_HISTORY_TURNS: usize = 6;

/// Keeps the most recent `MAX_HISTORY_TURNS` entries, dropping from the front.
pub fn keep_recent(mut turns: Vec<String>) -> Vec<String> {
    if turns.len() > MAX_HISTORY_TURNS {
        turns.drain(..turns.len() - MAX_HISTORY_TURNS);
    }
    turns
}

async fn read_turns(store: &dyn SharedStore, user_id: &str) -> Result<Vec<String>, StoreError> {
    match store.get(user_id).await? {
        Some(raw) => Ok(serde_json::from_slice(&raw)?),
        None => Ok(Vec::new()),
    }
}

async fn write_turns(store: &dyn SharedStore, user_id: &str, turns: &[String]) -> Result<(), StoreError> {
    let encoded = serde_json::to_vec(turns)?;
    store.set(user_id, &encoded).await
}

// Per-user conversation history, stored under the raw user id as a JSON array.
//
// Appends are read-modify-write without locking: two concurrent requests for
// the same user may race and the last write wins.
pub struct HistoryStore {
    store: Option<Arc<dyn SharedStore>>,
}

impl HistoryStore {
    pub fn new(store: Option<Arc<dyn SharedStore>>) -> Self {
        Self { store }
    }

    /// Returns the stored history for a user, or an empty one if there is no
    /// user, no store, nothing stored, or the stored value is unreadable.
    pub async fn load(&self, user_id: Option<&str>) -> Vec<String> {
        let (Some(user_id), Some(store)) = (user_id, &self.store) else {
            return Vec::new();
        };

        match read_turns(store.as_ref(), user_id).await {
            Ok(turns) => keep_recent(turns),
            Err(e) => {
                error!(user_id, error = %e, "failed to read history, treating it as empty");
                Vec::new()
            }
        }
    }

    /// Appends turns to a user's history and persists the most recent ones.
    ///
    /// Returns the resulting history. Without a user id nothing is loaded or
    /// written and the result is empty.
    pub async fn append(&self, user_id: Option<&str>, new_turns: &[String]) -> Vec<String> {
        let Some(user_id) = user_id else {
            return Vec::new();
        };

        let mut turns = self.load(Some(user_id)).await;
        turns.extend_from_slice(new_turns);
        let turns = keep_recent(turns);

        if let Some(store) = &self.store {
            if let Err(e) = write_turns(store.as_ref(), user_id, &turns).await {
                error!(user_id, error = %e, "failed to persist history");
            }
        }

        turns
    }
}
