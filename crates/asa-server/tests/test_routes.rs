use asa_application::RelayService;
use asa_application::widget::{HttpRelayTransport, SendOutcome, WidgetController};
use asa_core::config::{Settings, StaticSettings, WidgetSettings};
use asa_core::page::PageContext;
use asa_infrastructure::{MemoryKeyValueStore, MemoryProactiveCache};
use asa_interaction::GeminiClient;
use asa_server::{AppState, serve};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestRelay {
    base_url: String,
    provider: MockServer,
    client: reqwest::Client,
}

async fn start_relay(api_key: &str) -> TestRelay {
    start_relay_with(Settings {
        api_key: api_key.into(),
        ..Settings::default()
    })
    .await
}

async fn start_relay_with(settings: Settings) -> TestRelay {
    let provider = MockServer::start().await;
    let settings = Settings {
        endpoint: format!("{}/v1beta/models", provider.uri()),
        ..settings
    };
    let relay = RelayService::new(
        Arc::new(StaticSettings(settings.clone())),
        Arc::new(GeminiClient::from_settings(&settings)),
        Arc::new(MemoryProactiveCache::new()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, AppState::new(Arc::new(relay))));

    TestRelay {
        base_url,
        provider,
        client: reqwest::Client::new(),
    }
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}]
    }))
}

impl TestRelay {
    async fn widget_settings(&self, query: &str) -> WidgetSettings {
        self.client
            .get(format!("{}/widget-settings{query}", self.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post(&self, route: &str, form: &[(&str, &str)]) -> Value {
        self.client
            .post(format!("{}{route}", self.base_url))
            .form(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_chat_endpoint_success() {
    let relay = start_relay("key").await;
    Mock::given(method("POST"))
        .and(path_regex(":generateContent$"))
        .respond_with(reply("Yes, we ship worldwide."))
        .expect(1)
        .mount(&relay.provider)
        .await;

    let body = relay
        .post(
            "/chat",
            &[
                ("message", "Do you ship internationally?"),
                ("history", "[]"),
                ("currentPageUrl", "https://shop.test"),
                ("currentPageTitle", "Shop"),
                ("currentPageContent", "Tees"),
            ],
        )
        .await;

    assert_eq!(body, json!({"success": true, "data": "Yes, we ship worldwide."}));
}

#[tokio::test]
async fn test_chat_endpoint_errors_use_plain_data() {
    let relay = start_relay("").await;

    let body = relay.post("/chat", &[("message", "hi")]).await;

    assert_eq!(body, json!({"success": false, "data": "Invalid request"}));
}

#[tokio::test]
async fn test_proactive_endpoint_caches() {
    let relay = start_relay("key").await;
    Mock::given(method("POST"))
        .and(path_regex(":generateContent$"))
        .respond_with(reply("What made you choose organic cotton today perhaps"))
        .expect(1)
        .mount(&relay.provider)
        .await;
    let form = [
        ("currentPageUrl", "https://shop.test/tee"),
        ("currentPageTitle", "Tee"),
        ("currentPageContent", "Organic cotton tee"),
    ];

    let first = relay.post("/proactive-message", &form).await;
    let second = relay.post("/proactive-message", &form).await;

    let expected = json!({"success": true, "data": "What made you choose organic cotton today..."});
    assert_eq!(first, expected);
    assert_eq!(second, expected);

    let cleared = relay.post("/cache/clear", &[]).await;
    assert_eq!(cleared, json!({"success": true, "data": {"removed": 1}}));
}

#[tokio::test]
async fn test_proactive_endpoint_unconfigured() {
    let relay = start_relay("").await;

    let body = relay.post("/proactive-message", &[("currentPageUrl", "u")]).await;

    assert_eq!(body, json!({"success": false, "data": {"message": "API key is not set."}}));
}

#[tokio::test]
async fn test_api_key_endpoint() {
    let relay = start_relay("").await;
    Mock::given(method("POST"))
        .and(path_regex(":generateContent$"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid."}
        })))
        .mount(&relay.provider)
        .await;

    let body = relay.post("/test-api-key", &[("apiKey", "bad-key")]).await;

    assert_eq!(body, json!({"success": false, "data": {"message": "HTTP status: 400"}}));
}

#[tokio::test]
async fn test_widget_settings_hide_key() {
    let relay = start_relay("secret-key").await;

    let response = relay
        .client
        .get(format!("{}/widget-settings", relay.base_url))
        .send()
        .await
        .unwrap();
    let raw = response.text().await.unwrap();
    let settings: WidgetSettings = serde_json::from_str(&raw).unwrap();

    assert!(settings.has_api_key);
    assert_eq!(settings.history_limit, 50);
    assert!(!raw.contains("secret-key"));
}

#[tokio::test]
async fn test_widget_settings_apply_display_rules() {
    let relay = start_relay_with(Settings {
        api_key: "key".into(),
        display_types: vec!["posts".into()],
        ..Settings::default()
    })
    .await;

    assert!(relay.widget_settings("").await.display);
    assert!(relay.widget_settings("?pageKind=post").await.display);
    assert!(!relay.widget_settings("?pageKind=page").await.display);
    assert!(!relay.widget_settings("?pageKind=front_page").await.display);
    assert!(!relay.widget_settings("?pageKind=whatever").await.display);
}

#[tokio::test]
async fn test_widget_round_trip_over_http() {
    let relay = start_relay("key").await;
    Mock::given(method("POST"))
        .and(path_regex(":generateContent$"))
        .respond_with(reply("Yes, we ship worldwide."))
        .mount(&relay.provider)
        .await;

    let widget = WidgetController::new(
        Arc::new(HttpRelayTransport::new(relay.base_url.clone())),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(MemoryKeyValueStore::new()),
        Settings {
            api_key: "key".into(),
            ..Settings::default()
        }
        .widget_settings(),
        PageContext::new("https://shop.test", "Shop", "Tees"),
    );

    let outcome = widget.send("Do you ship internationally?").await;

    assert_eq!(outcome, SendOutcome::Replied("Yes, we ship worldwide.".into()));
    assert_eq!(widget.history().len(), 2);
}
