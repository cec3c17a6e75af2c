//! Generative provider and proactive cache seams used by the relay.

use crate::conversation::ConversationTurn;
use crate::error::ChatError;
use std::time::Duration;

/// Timeout for a chat turn.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for proactive message generation and the API-key probe.
pub const PROACTIVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Lifetime of a cached proactive message.
pub const PROACTIVE_CACHE_TTL: Duration = Duration::from_secs(3600);

/// A fully assembled provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Conversation contents, oldest first; the last entry is the new user turn.
    pub contents: Vec<ConversationTurn>,
    pub system_instruction: String,
    pub timeout: Duration,
}

/// A text-generation endpoint.
///
/// Implementations return the first candidate's text verbatim or one of the
/// remote [`ChatError`] kinds. They never retry.
#[async_trait::async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<String, ChatError>;
}

/// Shared store of generated proactive messages.
///
/// Concurrent reads are expected; writes for the same key carry equivalent
/// content, so last-writer-wins is fine.
#[async_trait::async_trait]
pub trait ProactiveCache: Send + Sync {
    /// Returns the live entry for `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    async fn put(&self, key: String, message: String, ttl: Duration);

    /// Drops every entry and returns how many were removed.
    async fn clear(&self) -> usize;
}
