//! Relay Service
//!
//! Validates widget requests, assembles the provider payload, calls the
//! generative backend and normalizes the outcome. The service holds no
//! per-user state; the proactive cache is the only shared mutable resource.

use crate::prompt::{
    cap_words, chat_system_instruction, proactive_system_instruction, proactive_user_turn,
};
use asa_core::config::SettingsProvider;
use asa_core::conversation::{ConversationTurn, MAX_TURN_TEXT_CHARS, truncate_chars};
use asa_core::envelope::{Envelope, ErrorStyle};
use asa_core::error::ChatError;
use asa_core::forms::{ApiKeyForm, ChatForm, ProactiveForm};
use asa_core::page::{ChatRequest, PageContext};
use asa_core::provider::{
    CHAT_TIMEOUT, GenerationRequest, GenerativeBackend, PROACTIVE_CACHE_TTL, PROACTIVE_TIMEOUT,
    ProactiveCache,
};
use asa_infrastructure::proactive_cache_key;
use std::sync::Arc;

const API_KEY_VALID_MESSAGE: &str = "API Key is valid.";

/// Server-side half of the chat widget.
#[derive(Clone)]
pub struct RelayService {
    settings: Arc<dyn SettingsProvider>,
    backend: Arc<dyn GenerativeBackend>,
    cache: Arc<dyn ProactiveCache>,
}

impl RelayService {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        backend: Arc<dyn GenerativeBackend>,
        cache: Arc<dyn ProactiveCache>,
    ) -> Self {
        Self {
            settings,
            backend,
            cache,
        }
    }

    pub fn settings(&self) -> &Arc<dyn SettingsProvider> {
        &self.settings
    }

    /// Answers one chat turn.
    ///
    /// The inbound history is capped per entry and never stored; the reply
    /// is returned verbatim.
    pub async fn handle_chat_turn(&self, request: ChatRequest) -> Result<String, ChatError> {
        let Some(api_key) = self.settings.api_key() else {
            return Err(ChatError::InvalidRequest);
        };
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatError::InvalidRequest);
        }

        let mut contents: Vec<ConversationTurn> = request
            .history
            .into_iter()
            .filter(|turn| !turn.text.trim().is_empty())
            .map(|turn| ConversationTurn::new(turn.role, truncate_chars(&turn.text, MAX_TURN_TEXT_CHARS)))
            .collect();
        contents.push(ConversationTurn::user(message));

        let generation = GenerationRequest {
            contents,
            system_instruction: chat_system_instruction(&self.settings.system_prompt(), &request.context),
            timeout: CHAT_TIMEOUT,
        };

        tracing::debug!(turns = generation.contents.len(), "[Relay] Forwarding chat turn");
        self.backend
            .generate(&api_key, &generation)
            .await
            .inspect_err(|err| {
                tracing::error!(kind = err.kind(), "[Relay] Chat request failed: {}", err);
            })
    }

    /// Produces the short opening question for a page.
    ///
    /// A live cache entry for `(url, content)` short-circuits the provider
    /// call. Only successful, word-capped results are cached.
    pub async fn handle_proactive_message(&self, context: PageContext) -> Result<String, ChatError> {
        let Some(api_key) = self.settings.api_key() else {
            return Err(ChatError::Unconfigured);
        };

        let cache_key = proactive_cache_key(&context.url, &context.content);
        if let Some(cached) = self.cache.get(&cache_key).await {
            tracing::debug!("[Relay] Proactive cache hit");
            return Ok(cached);
        }

        let context = context.truncated();
        let generation = GenerationRequest {
            contents: vec![ConversationTurn::user(proactive_user_turn(&context))],
            system_instruction: proactive_system_instruction(&self.settings.system_prompt(), &context),
            timeout: PROACTIVE_TIMEOUT,
        };

        let generated = self
            .backend
            .generate(&api_key, &generation)
            .await
            .inspect_err(|err| {
                tracing::error!(kind = err.kind(), "[Relay] Proactive request failed: {}", err);
            })?;

        let message = cap_words(&generated);
        self.cache
            .put(cache_key, message.clone(), PROACTIVE_CACHE_TTL)
            .await;
        tracing::info!("[Relay] Cached new proactive message");
        Ok(message)
    }

    /// Probes `api_key` with a trivial generation request.
    pub async fn test_api_key(&self, api_key: &str) -> Result<(), ChatError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ChatError::InvalidRequest);
        }

        let generation = GenerationRequest {
            contents: vec![ConversationTurn::user("Hello")],
            system_instruction: "Say hello".to_string(),
            timeout: PROACTIVE_TIMEOUT,
        };

        self.backend
            .generate(api_key, &generation)
            .await
            .map(|_| ())
            .inspect_err(|err| {
                tracing::error!(kind = err.kind(), "[Relay] API key test failed: {}", err);
            })
    }

    /// Drops every cached proactive message.
    pub async fn clear_proactive_cache(&self) -> usize {
        let removed = self.cache.clear().await;
        tracing::info!("[Relay] Cleared {} proactive cache entries", removed);
        removed
    }

    /// `POST /chat` boundary: decodes the form and wraps the outcome.
    pub async fn chat_envelope(&self, form: ChatForm) -> Envelope {
        Envelope::from_result(self.handle_chat_turn(form.into_request()).await, ErrorStyle::Plain)
    }

    /// `POST /proactive-message` boundary.
    pub async fn proactive_envelope(&self, form: ProactiveForm) -> Envelope {
        Envelope::from_result(
            self.handle_proactive_message(form.into_context()).await,
            ErrorStyle::Object,
        )
    }

    /// `POST /test-api-key` boundary.
    pub async fn test_api_key_envelope(&self, form: ApiKeyForm) -> Envelope {
        match self.test_api_key(&form.api_key).await {
            Ok(()) => Envelope::ok(serde_json::json!({ "message": API_KEY_VALID_MESSAGE })),
            Err(err) => Envelope::from_chat_error(&err, ErrorStyle::Object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asa_core::config::StaticSettings;
    use asa_infrastructure::MemoryProactiveCache;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend returning a scripted result and recording every request.
    struct ScriptedBackend {
        result: Result<String, ChatError>,
        calls: AtomicUsize,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedBackend {
        fn new(result: Result<String, ChatError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_request(&self) -> GenerationRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, _api_key: &str, request: &GenerationRequest) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            self.result.clone()
        }
    }

    fn relay(api_key: &str, backend: Arc<ScriptedBackend>) -> RelayService {
        RelayService::new(
            Arc::new(StaticSettings::with_api_key(api_key)),
            backend,
            Arc::new(MemoryProactiveCache::new()),
        )
    }

    #[tokio::test]
    async fn test_chat_without_key_is_invalid() {
        let backend = ScriptedBackend::new(Ok("unused".into()));
        let service = relay("", backend.clone());

        let result = service
            .handle_chat_turn(ChatRequest::new("hi", vec![], PageContext::default()))
            .await;

        assert_eq!(result, Err(ChatError::InvalidRequest));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_empty_message_is_invalid() {
        let backend = ScriptedBackend::new(Ok("unused".into()));
        let service = relay("key", backend.clone());

        let result = service
            .handle_chat_turn(ChatRequest::new("   ", vec![], PageContext::default()))
            .await;

        assert_eq!(result, Err(ChatError::InvalidRequest));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_payload_appends_message_after_history() {
        let backend = ScriptedBackend::new(Ok("Yes, we ship worldwide.".into()));
        let service = relay("key", backend.clone());
        let history = vec![ConversationTurn::user("Hi"), ConversationTurn::model("Hello!")];

        let reply = service
            .handle_chat_turn(ChatRequest::new(
                "Do you ship internationally?",
                history,
                PageContext::new("https://shop.test", "Shop", "Tees"),
            ))
            .await;

        assert_eq!(reply, Ok("Yes, we ship worldwide.".to_string()));
        let request = backend.last_request();
        assert_eq!(
            request.contents,
            vec![
                ConversationTurn::user("Hi"),
                ConversationTurn::model("Hello!"),
                ConversationTurn::user("Do you ship internationally?"),
            ]
        );
        assert_eq!(request.timeout, CHAT_TIMEOUT);
        assert!(request.system_instruction.contains("Current Page URL: https://shop.test"));
    }

    #[tokio::test]
    async fn test_chat_errors_pass_through() {
        let backend = ScriptedBackend::new(Err(ChatError::HttpError { status: 429 }));
        let service = relay("key", backend);

        let envelope = service
            .chat_envelope(ChatForm {
                message: "hi".into(),
                ..ChatForm::default()
            })
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.data, serde_json::json!("HTTP status: 429"));
    }

    #[tokio::test]
    async fn test_proactive_unconfigured() {
        let backend = ScriptedBackend::new(Ok("unused".into()));
        let service = relay("", backend.clone());

        let envelope = service.proactive_envelope(ProactiveForm::default()).await;

        assert_eq!(envelope.error_message(), Some("API key is not set."));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_proactive_cache_hit_skips_provider() {
        let backend = ScriptedBackend::new(Ok("Looking for organic cotton?".into()));
        let service = relay("key", backend.clone());
        let page = PageContext::new("https://shop.test/tee", "Tee", "Organic cotton tee");

        let first = service.handle_proactive_message(page.clone()).await;
        let second = service.handle_proactive_message(page).await;

        assert_eq!(first, Ok("Looking for organic cotton?".to_string()));
        assert_eq!(second, first);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_proactive_caps_words() {
        let backend = ScriptedBackend::new(Ok("What made you choose organic cotton today perhaps".into()));
        let service = relay("key", backend);

        let message = service
            .handle_proactive_message(PageContext::new("u", "t", "c"))
            .await;

        assert_eq!(message, Ok("What made you choose organic cotton today...".to_string()));
    }

    #[tokio::test]
    async fn test_proactive_failure_not_cached() {
        let backend = ScriptedBackend::new(Err(ChatError::EmptyResponse));
        let service = relay("key", backend.clone());
        let page = PageContext::new("u", "t", "c");

        assert_eq!(
            service.handle_proactive_message(page.clone()).await,
            Err(ChatError::EmptyResponse)
        );
        assert_eq!(
            service.handle_proactive_message(page).await,
            Err(ChatError::EmptyResponse)
        );
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_proactive_payload_truncates_content() {
        let backend = ScriptedBackend::new(Ok("Need help?".into()));
        let service = relay("key", backend.clone());

        service
            .handle_proactive_message(PageContext {
                url: "u".into(),
                title: "t".into(),
                content: "x".repeat(5000),
            })
            .await
            .unwrap();

        let request = backend.last_request();
        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].text.chars().count(), 4000);
        assert_eq!(request.timeout, PROACTIVE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_api_key_probe() {
        let backend = ScriptedBackend::new(Ok("Hello!".into()));
        let service = relay("", backend.clone());

        assert_eq!(service.test_api_key("  ").await, Err(ChatError::InvalidRequest));
        assert_eq!(backend.calls(), 0);

        let envelope = service
            .test_api_key_envelope(ApiKeyForm {
                api_key: "candidate".into(),
            })
            .await;
        assert!(envelope.success);
        assert_eq!(envelope.data, serde_json::json!({"message": "API Key is valid."}));
        assert_eq!(backend.last_request().system_instruction, "Say hello");
    }

    #[tokio::test]
    async fn test_clear_cache_forces_regeneration() {
        let backend = ScriptedBackend::new(Ok("Need help?".into()));
        let service = relay("key", backend.clone());
        let page = PageContext::new("u", "t", "c");

        service.handle_proactive_message(page.clone()).await.unwrap();
        assert_eq!(service.clear_proactive_cache().await, 1);
        service.handle_proactive_message(page).await.unwrap();

        assert_eq!(backend.calls(), 2);
    }
}
