use asa_application::widget::transport::RELAY_REQUEST_TIMEOUT;
use asa_application::{HttpRelayTransport, RelayTransport};
use asa_core::error::ChatError;
use asa_core::forms::ChatForm;
use asa_core::provider::CHAT_TIMEOUT;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_form() -> ChatForm {
    ChatForm {
        message: "hi".into(),
        history: "[]".into(),
        ..ChatForm::default()
    }
}

#[test]
fn test_default_timeout_exceeds_chat_timeout() {
    assert!(RELAY_REQUEST_TIMEOUT > CHAT_TIMEOUT);
}

#[tokio::test]
async fn test_stalled_relay_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::with_timeout(server.uri(), Duration::from_millis(200));
    let result = transport.send_chat(chat_form()).await;

    assert!(matches!(result, Err(ChatError::TransportFailure(_))));
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let transport = HttpRelayTransport::new(format!("{}/", server.uri()));
    let result = transport.send_chat(chat_form()).await;

    assert_eq!(result, Err(ChatError::HttpError { status: 502 }));
}
