//! How the widget reaches the relay.

use crate::relay_service::RelayService;
use asa_core::envelope::Envelope;
use asa_core::error::ChatError;
use asa_core::forms::{ChatForm, ProactiveForm};
use async_trait::async_trait;
use asa_core::provider::CHAT_TIMEOUT;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Client-side bound for one relay round trip, above the relay's chat timeout.
pub const RELAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(CHAT_TIMEOUT.as_secs() + 5);

/// Delivers widget requests and returns the relay's envelope.
///
/// `Err` means the relay could not be reached at all; relay-side failures
/// arrive as `Ok` envelopes with `success: false`.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send_chat(&self, form: ChatForm) -> Result<Envelope, ChatError>;

    async fn fetch_proactive(&self, form: ProactiveForm) -> Result<Envelope, ChatError>;
}

/// In-process transport calling the relay directly.
#[derive(Clone)]
pub struct LocalRelayTransport {
    relay: Arc<RelayService>,
}

impl LocalRelayTransport {
    pub fn new(relay: Arc<RelayService>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl RelayTransport for LocalRelayTransport {
    async fn send_chat(&self, form: ChatForm) -> Result<Envelope, ChatError> {
        Ok(self.relay.chat_envelope(form).await)
    }

    async fn fetch_proactive(&self, form: ProactiveForm) -> Result<Envelope, ChatError> {
        Ok(self.relay.proactive_envelope(form).await)
    }
}

/// Transport posting URL-encoded forms to a running relay server.
#[derive(Clone)]
pub struct HttpRelayTransport {
    client: Client,
    base_url: String,
}

impl HttpRelayTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, RELAY_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<F: serde::Serialize + Sync>(&self, route: &str, form: &F) -> Result<Envelope, ChatError> {
        let response = self
            .client
            .post(format!("{}{route}", self.base_url))
            .form(form)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!("[Widget] Relay unreachable: {}", err);
                ChatError::transport(err.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::HttpError {
                status: status.as_u16(),
            });
        }

        response
            .json::<Envelope>()
            .await
            .map_err(|err| ChatError::transport(err.to_string()))
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send_chat(&self, form: ChatForm) -> Result<Envelope, ChatError> {
        self.post("/chat", &form).await
    }

    async fn fetch_proactive(&self, form: ProactiveForm) -> Result<Envelope, ChatError> {
        self.post("/proactive-message", &form).await
    }
}
