//! Memory subsystem — bounded per-user conversation history.
//!
//! The agent talks to history through the [`ConversationStore`] trait and is
//! handed an `Arc<dyn ConversationStore>` at construction. The only backend
//! is [`InMemoryConversationStore`]: nothing survives a restart.
//!
//! # Locking
//!
//! Each user id owns its own `Mutex`-guarded bucket. The outer `RwLock` is
//! held only long enough to look up or create a bucket, so exchanges for
//! different users never contend, while append / update / evict on the same
//! user are serialized.
//!
//! [`ConversationStore::append`] hands back an [`EntryId`]; the reply is
//! written to that entry, so overlapping exchanges of one user never
//! overwrite each other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use crate::config::DEFAULT_HISTORY_CAP;
use crate::error::AppError;

/// One message/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub message: String,
    /// Empty until the reply has been computed.
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    /// An inbound message awaiting its reply, stamped with the current time.
    pub fn pending(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            response: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Position of an appended entry in one user's history. Ids grow
/// monotonically per user and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

/// Per-user exchange history.
pub trait ConversationStore: Send + Sync {
    /// Append `entry` to `user_id`'s history, evicting the oldest entries
    /// beyond the cap.
    fn append(&self, user_id: i64, entry: ConversationEntry) -> Result<EntryId, AppError>;

    /// Set the response of entry `id`. No-op once the entry has been evicted.
    fn set_response(&self, user_id: i64, id: EntryId, response: &str) -> Result<(), AppError>;

    /// Snapshot of `user_id`'s history, oldest first.
    fn history(&self, user_id: i64) -> Result<Vec<ConversationEntry>, AppError>;
}

#[derive(Debug, Default)]
struct UserHistory {
    next_id: u64,
    entries: VecDeque<(EntryId, ConversationEntry)>,
}

type Bucket = Arc<Mutex<UserHistory>>;

/// Process-local [`ConversationStore`] with a FIFO cap per user.
pub struct InMemoryConversationStore {
    cap: usize,
    buckets: RwLock<HashMap<i64, Bucket>>,
}

impl InMemoryConversationStore {
    /// `cap` of `None` uses [`DEFAULT_HISTORY_CAP`]. A zero cap is raised to 1.
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            cap: cap.unwrap_or(DEFAULT_HISTORY_CAP).max(1),
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    fn bucket(&self, user_id: i64) -> Result<Option<Bucket>, AppError> {
        let buckets = self
            .buckets
            .read()
            .map_err(|_| AppError::Memory("conversation index lock poisoned".into()))?;
        Ok(buckets.get(&user_id).cloned())
    }

    fn bucket_or_create(&self, user_id: i64) -> Result<Bucket, AppError> {
        if let Some(bucket) = self.bucket(user_id)? {
            return Ok(bucket);
        }
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| AppError::Memory("conversation index lock poisoned".into()))?;
        Ok(buckets.entry(user_id).or_default().clone())
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(None)
    }
}

fn lock_poisoned(user_id: i64) -> AppError {
    AppError::Memory(format!("history lock poisoned for user {user_id}"))
}

impl ConversationStore for InMemoryConversationStore {
    fn append(&self, user_id: i64, entry: ConversationEntry) -> Result<EntryId, AppError> {
        let bucket = self.bucket_or_create(user_id)?;
        let mut history = bucket.lock().map_err(|_| lock_poisoned(user_id))?;
        let id = EntryId(history.next_id);
        history.next_id += 1;
        history.entries.push_back((id, entry));
        while history.entries.len() > self.cap {
            history.entries.pop_front();
        }
        Ok(id)
    }

    fn set_response(&self, user_id: i64, id: EntryId, response: &str) -> Result<(), AppError> {
        let Some(bucket) = self.bucket(user_id)? else {
            return Ok(());
        };
        let mut history = bucket.lock().map_err(|_| lock_poisoned(user_id))?;
        if let Some((_, entry)) = history.entries.iter_mut().find(|(entry_id, _)| *entry_id == id) {
            entry.response = response.to_string();
        }
        Ok(())
    }

    fn history(&self, user_id: i64) -> Result<Vec<ConversationEntry>, AppError> {
        let Some(bucket) = self.bucket(user_id)? else {
            return Ok(Vec::new());
        };
        let history = bucket.lock().map_err(|_| lock_poisoned(user_id))?;
        Ok(history.entries.iter().map(|(_, entry)| entry.clone()).collect())
    }
}
