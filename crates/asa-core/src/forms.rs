//! Request bodies of the relay endpoints.
//!
//! Field names follow the form posted by the widget (`currentPageUrl`, ...).
//! `history` travels as a JSON-encoded string inside the form.

use crate::config::PageKind;
use crate::conversation::{ConversationHistory, sanitize_history_json};
use crate::page::{ChatRequest, PageContext};
use serde::{Deserialize, Serialize};

/// Body of `POST /chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatForm {
    pub message: String,
    pub history: String,
    pub current_page_url: String,
    pub current_page_title: String,
    pub current_page_content: String,
}

impl ChatForm {
    pub fn new(message: impl Into<String>, history: &ConversationHistory, context: &PageContext) -> Self {
        Self {
            message: message.into(),
            history: history.to_json().unwrap_or_else(|_| "[]".to_string()),
            current_page_url: context.url.clone(),
            current_page_title: context.title.clone(),
            current_page_content: context.content.clone(),
        }
    }

    /// Decodes into a relay request. Malformed history entries are dropped
    /// and page content is truncated.
    pub fn into_request(self) -> ChatRequest {
        let history = sanitize_history_json(&self.history);
        let context = PageContext::new(
            self.current_page_url,
            self.current_page_title,
            self.current_page_content,
        );
        ChatRequest::new(self.message.trim(), history, context)
    }
}

/// Body of `POST /proactive-message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProactiveForm {
    pub current_page_url: String,
    pub current_page_title: String,
    pub current_page_content: String,
}

impl ProactiveForm {
    pub fn new(context: &PageContext) -> Self {
        Self {
            current_page_url: context.url.clone(),
            current_page_title: context.title.clone(),
            current_page_content: context.content.clone(),
        }
    }

    /// The page context exactly as received (not yet truncated).
    pub fn into_context(self) -> PageContext {
        PageContext {
            url: self.current_page_url,
            title: self.current_page_title,
            content: self.current_page_content,
        }
    }
}

/// Body of `POST /test-api-key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeyForm {
    pub api_key: String,
}

/// Query of `GET /widget-settings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetSettingsQuery {
    /// `front_page`, `page`, `post`, `archive` or anything else.
    pub page_kind: Option<String>,
}

impl WidgetSettingsQuery {
    pub fn page_kind(&self) -> Option<PageKind> {
        self.page_kind.as_deref().map(PageKind::parse)
    }
}
