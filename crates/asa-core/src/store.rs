//! Client-local key-value storage seam.
//!
//! The widget persists its history and dismissal flags through this trait so
//! that browser storage, files, or plain memory can back it.

use crate::error::Result;

/// Fixed key under which the conversation history is persisted.
pub const HISTORY_STORAGE_KEY: &str = "asa_chat_history";

/// Prefix of the page-scoped proactive dismissal flag.
pub const PROACTIVE_CLOSED_KEY_PREFIX: &str = "asa_proactive_closed";

/// Builds the dismissal key for one page, so a new page resets eligibility.
pub fn proactive_closed_key(page_url: &str) -> String {
    format!("{PROACTIVE_CLOSED_KEY_PREFIX}:{page_url}")
}

/// String-to-string storage with get/set/remove semantics.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}
