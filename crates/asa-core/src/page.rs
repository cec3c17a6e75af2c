//! Page context and the chat request built from it.

use crate::conversation::{ConversationTurn, truncate_chars};
use serde::{Deserialize, Serialize};

/// Maximum page content, in characters, sent to the relay and to the provider.
pub const MAX_PAGE_CONTENT_CHARS: usize = 4000;

/// The page the visitor is looking at.
///
/// Recomputed per page load; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub content: String,
}

impl PageContext {
    /// Builds a context, truncating `content` to [`MAX_PAGE_CONTENT_CHARS`].
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
        .truncated()
    }

    /// Extracts context from raw page text: whitespace runs collapse to one
    /// space, the result is trimmed and truncated.
    pub fn from_page_text(url: impl Into<String>, title: impl Into<String>, raw_text: &str) -> Self {
        let collapsed = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::new(url, title, collapsed)
    }

    /// Returns the context with `content` cut to [`MAX_PAGE_CONTENT_CHARS`].
    ///
    /// Idempotent: already-short content is left untouched.
    pub fn truncated(mut self) -> Self {
        self.content = truncate_chars(&self.content, MAX_PAGE_CONTENT_CHARS);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.title.is_empty() && self.content.is_empty()
    }
}

/// One send action from the widget, consumed once by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ConversationTurn>,
    pub context: PageContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, history: Vec<ConversationTurn>, context: PageContext) -> Self {
        Self {
            message: message.into(),
            history,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_truncated_to_exact_bound() {
        let context = PageContext::new("https://shop.test", "Shop", "x".repeat(5000));
        assert_eq!(context.content.chars().count(), MAX_PAGE_CONTENT_CHARS);
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let content = "y".repeat(MAX_PAGE_CONTENT_CHARS);
        let once = PageContext::new("u", "t", content.clone());
        let twice = once.clone().truncated();
        assert_eq!(once, twice);
        assert_eq!(twice.content, content);
    }

    #[test]
    fn test_from_page_text_collapses_whitespace() {
        let context = PageContext::from_page_text("u", "t", "  Organic\n\n  cotton\t\tshirts  ");
        assert_eq!(context.content, "Organic cotton shirts");
    }
}
