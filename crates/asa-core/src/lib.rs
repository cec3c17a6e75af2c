//! Domain layer for the ASA chat relay.
//!
//! Holds the conversation model, page context, configuration, the response
//! envelope, and the traits the relay and widget are composed from.

pub mod config;
pub mod conversation;
pub mod envelope;
pub mod error;
pub mod forms;
pub mod page;
pub mod provider;
pub mod store;

pub use config::{Settings, SettingsProvider, StaticSettings, WidgetSettings};
pub use conversation::{ConversationHistory, ConversationTurn, Role};
pub use envelope::{Envelope, ErrorStyle};
pub use error::{AsaError, ChatError};
pub use forms::{ApiKeyForm, ChatForm, ProactiveForm};
pub use page::{ChatRequest, PageContext};
pub use provider::{GenerationRequest, GenerativeBackend, ProactiveCache};
pub use store::KeyValueStore;
