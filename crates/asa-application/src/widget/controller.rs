//! WidgetController - client-side owner of the chat session.
//!
//! Holds the bounded conversation history, the rendered bubbles and the
//! proactive bubble state. History is persisted to the local store after
//! every successful append; failed exchanges never reach it.

use super::transport::RelayTransport;
use crate::markdown::{escape_html, render_markdown};
use asa_core::config::WidgetSettings;
use asa_core::conversation::{ConversationHistory, ConversationTurn, Role, sanitize_history};
use asa_core::forms::{ChatForm, ProactiveForm};
use asa_core::page::PageContext;
use asa_core::store::{HISTORY_STORAGE_KEY, KeyValueStore, proactive_closed_key};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long a shown proactive bubble stays up without interaction.
pub const PROACTIVE_AUTO_HIDE: Duration = Duration::from_secs(15);

pub const ERROR_PREFIX: &str = "Sorry, an error occurred: ";
pub const NO_RESPONSE_TEXT: &str = "No response received.";
pub const SERVER_ERROR_TEXT: &str = "Sorry, could not communicate with the server. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Message,
    /// Transient, dismissible, never persisted.
    Error,
}

/// One rendered message bubble. `html` is always safe to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub sender: Sender,
    pub kind: BubbleKind,
    pub html: String,
}

impl Bubble {
    fn for_turn(turn: &ConversationTurn) -> Self {
        match turn.role {
            Role::User => Self {
                sender: Sender::User,
                kind: BubbleKind::Message,
                html: escape_html(&turn.text),
            },
            Role::Model => Self {
                sender: Sender::Bot,
                kind: BubbleKind::Message,
                html: render_markdown(&turn.text),
            },
        }
    }

    fn error(text: &str) -> Self {
        Self {
            sender: Sender::Bot,
            kind: BubbleKind::Error,
            html: escape_html(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty message, no API key, or a send already in flight.
    Ignored,
    Replied(String),
    /// The error bubble text that was shown.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProactiveOutcome {
    /// No API key, dismissed on this page, or already requested.
    Skipped,
    /// Relay unreachable or returned no message. Nothing is shown.
    Failed,
    AppendedToChat(String),
    /// Held until the bubble is shown or the chat is opened.
    Buffered(String),
}

struct WidgetState {
    history: ConversationHistory,
    bubbles: Vec<Bubble>,
    input_enabled: bool,
    typing: bool,
    chat_open: bool,
    pending_proactive: Option<String>,
    visible_proactive: Option<String>,
    proactive_requested: bool,
    // Bumped whenever the bubble is shown or hidden so stale auto-hide timers
    // do nothing.
    bubble_epoch: u64,
}

/// Chat widget session for one page view.
#[derive(Clone)]
pub struct WidgetController {
    transport: Arc<dyn RelayTransport>,
    local: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    settings: WidgetSettings,
    page: PageContext,
    state: Arc<Mutex<WidgetState>>,
}

impl WidgetController {
    /// Restores persisted history and renders it.
    ///
    /// Stored history that is not a JSON array is discarded and removed.
    /// Input stays disabled when no API key is configured.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        local: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        settings: WidgetSettings,
        page: PageContext,
    ) -> Self {
        let history = restore_history(local.as_ref(), settings.history_limit);
        let bubbles = history.iter().map(Bubble::for_turn).collect();
        let input_enabled = settings.has_api_key;

        Self {
            transport,
            local,
            session,
            page: page.truncated(),
            settings,
            state: Arc::new(Mutex::new(WidgetState {
                history,
                bubbles,
                input_enabled,
                typing: false,
                chat_open: false,
                pending_proactive: None,
                visible_proactive: None,
                proactive_requested: false,
                bubble_epoch: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dismissed_key(&self) -> String {
        proactive_closed_key(&self.page.url)
    }

    fn persist(&self, history: &ConversationHistory) {
        let result = history
            .to_json()
            .map_err(asa_core::AsaError::from)
            .and_then(|json| self.local.set(HISTORY_STORAGE_KEY, &json));
        if let Err(err) = result {
            tracing::warn!("[Widget] Failed to persist history: {}", err);
        }
    }

    fn append_turn(&self, state: &mut WidgetState, turn: ConversationTurn) {
        state.bubbles.push(Bubble::for_turn(&turn));
        state.history.push(turn);
        self.persist(&state.history);
    }

    /// Sends one user message and waits for the reply.
    ///
    /// The user turn is recorded before the call. The relay receives the
    /// history as it stood before that turn plus the message itself.
    pub async fn send(&self, message: &str) -> SendOutcome {
        let text = message.trim();
        let form = {
            let mut state = self.state();
            if text.is_empty() || !self.settings.has_api_key || !state.input_enabled {
                return SendOutcome::Ignored;
            }
            let form = ChatForm::new(text, &state.history, &self.page);
            self.append_turn(&mut state, ConversationTurn::user(text));
            state.input_enabled = false;
            state.typing = true;
            form
        };

        let response = self.transport.send_chat(form).await;

        let mut state = self.state();
        state.typing = false;
        state.input_enabled = true;

        let failure = match response {
            Ok(envelope) => match envelope.text() {
                Some(reply) => {
                    let reply = reply.to_string();
                    self.append_turn(&mut state, ConversationTurn::model(reply.clone()));
                    return SendOutcome::Replied(reply);
                }
                None => format!(
                    "{ERROR_PREFIX}{}",
                    envelope
                        .error_message()
                        .filter(|message| !message.is_empty())
                        .unwrap_or(NO_RESPONSE_TEXT)
                ),
            },
            Err(err) => {
                tracing::warn!("[Widget] Chat request failed: {}", err);
                SERVER_ERROR_TEXT.to_string()
            }
        };

        state.bubbles.push(Bubble::error(&failure));
        SendOutcome::Failed(failure)
    }

    /// Requests the proactive question for this page, at most once per page
    /// view. Failures are silent.
    pub async fn fetch_proactive_message(&self) -> ProactiveOutcome {
        if !self.settings.has_api_key || self.is_proactive_dismissed() {
            return ProactiveOutcome::Skipped;
        }
        {
            let mut state = self.state();
            if state.proactive_requested {
                return ProactiveOutcome::Skipped;
            }
            state.proactive_requested = true;
        }

        let envelope = match self.transport.fetch_proactive(ProactiveForm::new(&self.page)).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!("[Widget] Proactive request failed: {}", err);
                return ProactiveOutcome::Failed;
            }
        };
        let Some(message) = envelope.text().map(str::to_string) else {
            tracing::debug!(
                "[Widget] No proactive message: {}",
                envelope.error_message().unwrap_or_default()
            );
            return ProactiveOutcome::Failed;
        };

        let mut state = self.state();
        if state.chat_open {
            self.append_turn(&mut state, ConversationTurn::model(message.clone()));
            ProactiveOutcome::AppendedToChat(message)
        } else {
            state.pending_proactive = Some(message.clone());
            ProactiveOutcome::Buffered(message)
        }
    }

    /// Shows the buffered proactive message after the configured delay and
    /// hides it again after [`PROACTIVE_AUTO_HIDE`].
    pub async fn run_proactive_bubble(&self) {
        tokio::time::sleep(Duration::from_millis(self.settings.proactive_delay_ms)).await;

        let epoch = {
            let mut state = self.state();
            let Some(message) = state.pending_proactive.clone() else {
                return;
            };
            if state.chat_open || self.is_proactive_dismissed() {
                return;
            }
            state.visible_proactive = Some(message);
            state.bubble_epoch += 1;
            state.bubble_epoch
        };

        tokio::time::sleep(PROACTIVE_AUTO_HIDE).await;

        let mut state = self.state();
        if state.bubble_epoch == epoch {
            self.hide_bubble(&mut state, false);
        }
    }

    /// Fetches the proactive message and, if buffered, runs the bubble.
    pub fn spawn_proactive(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            if let ProactiveOutcome::Buffered(_) = controller.fetch_proactive_message().await {
                controller.run_proactive_bubble().await;
            }
        })
    }

    fn hide_bubble(&self, state: &mut WidgetState, permanent: bool) {
        state.visible_proactive = None;
        state.bubble_epoch += 1;
        if permanent {
            if let Err(err) = self.session.set(&self.dismissed_key(), "true") {
                tracing::warn!("[Widget] Failed to record proactive dismissal: {}", err);
            }
        }
    }

    /// Hides the external bubble; `permanent` suppresses it for the rest of
    /// the session on this page.
    pub fn hide_proactive_bubble(&self, permanent: bool) {
        let mut state = self.state();
        self.hide_bubble(&mut state, permanent);
    }

    /// The bubble's close button.
    pub fn dismiss_proactive(&self) {
        self.hide_proactive_bubble(true);
    }

    pub fn is_proactive_dismissed(&self) -> bool {
        self.session.get(&self.dismissed_key()).as_deref() == Some("true")
    }

    /// Opens the chat window and moves a buffered proactive message into
    /// the conversation unless it is already the last turn.
    pub fn open_chat(&self) {
        let mut state = self.state();
        self.hide_bubble(&mut state, false);
        state.chat_open = true;

        if let Some(message) = state.pending_proactive.take() {
            let already_shown = state.history.last().is_some_and(|turn| turn.text == message);
            if !already_shown {
                self.append_turn(&mut state, ConversationTurn::model(message));
            }
        }
    }

    pub fn close_chat(&self) {
        self.state().chat_open = false;
    }

    /// Empties history and rendered messages when `confirmed`.
    pub fn clear_history(&self, confirmed: bool) -> bool {
        if !confirmed {
            return false;
        }
        let mut state = self.state();
        state.history.clear();
        state.bubbles.clear();
        if let Err(err) = self.local.remove(HISTORY_STORAGE_KEY) {
            tracing::warn!("[Widget] Failed to clear stored history: {}", err);
        }
        true
    }

    /// Removes every error bubble.
    pub fn dismiss_errors(&self) {
        self.state()
            .bubbles
            .retain(|bubble| bubble.kind != BubbleKind::Error);
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.state().history.to_vec()
    }

    pub fn bubbles(&self) -> Vec<Bubble> {
        self.state().bubbles.clone()
    }

    pub fn input_enabled(&self) -> bool {
        self.state().input_enabled
    }

    pub fn is_typing(&self) -> bool {
        self.state().typing
    }

    pub fn is_chat_open(&self) -> bool {
        self.state().chat_open
    }

    pub fn visible_proactive(&self) -> Option<String> {
        self.state().visible_proactive.clone()
    }

    pub fn pending_proactive(&self) -> Option<String> {
        self.state().pending_proactive.clone()
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }
}

fn restore_history(store: &dyn KeyValueStore, limit: usize) -> ConversationHistory {
    let Some(raw) = store.get(HISTORY_STORAGE_KEY) else {
        return ConversationHistory::new(limit);
    };

    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) if value.is_array() => ConversationHistory::from_turns(sanitize_history(&value), limit),
        _ => {
            tracing::warn!("[Widget] Discarding unreadable chat history");
            if let Err(err) = store.remove(HISTORY_STORAGE_KEY) {
                tracing::warn!("[Widget] Failed to remove unreadable history: {}", err);
            }
            ConversationHistory::new(limit)
        }
    }
}
