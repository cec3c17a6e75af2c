//! The `{ success, data }` response envelope shared by every relay endpoint.

use crate::error::ChatError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// How an error is placed into `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStyle {
    /// `data` is the message string (chat endpoint).
    Plain,
    /// `data` is `{ "message": ... }` (proactive and key-probe endpoints).
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub data: Value,
}

impl Envelope {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: data.into(),
        }
    }

    pub fn error(message: impl Into<String>, style: ErrorStyle) -> Self {
        let message = message.into();
        let data = match style {
            ErrorStyle::Plain => Value::String(message),
            ErrorStyle::Object => json!({ "message": message }),
        };
        Self {
            success: false,
            data,
        }
    }

    pub fn from_chat_error(err: &ChatError, style: ErrorStyle) -> Self {
        Self::error(err.to_string(), style)
    }

    pub fn from_result(result: Result<String, ChatError>, style: ErrorStyle) -> Self {
        match result {
            Ok(text) => Self::ok(text),
            Err(err) => Self::from_chat_error(&err, style),
        }
    }

    /// Text of a successful envelope. Empty or non-string data is not usable.
    pub fn text(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.data.as_str().filter(|text| !text.is_empty())
    }

    /// Error message for either error shape.
    pub fn error_message(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        match &self.data {
            Value::String(message) => Some(message.as_str()),
            Value::Object(map) => map.get("message").and_then(Value::as_str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope() {
        let envelope = Envelope::ok("Yes, we ship worldwide.");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "data": "Yes, we ship worldwide."})
        );
        assert_eq!(envelope.text(), Some("Yes, we ship worldwide."));
    }

    #[test]
    fn test_error_styles() {
        let plain = Envelope::from_chat_error(&ChatError::InvalidRequest, ErrorStyle::Plain);
        assert_eq!(plain.data, json!("Invalid request"));
        assert_eq!(plain.error_message(), Some("Invalid request"));

        let object = Envelope::from_chat_error(&ChatError::Unconfigured, ErrorStyle::Object);
        assert_eq!(object.data, json!({"message": "API key is not set."}));
        assert_eq!(object.error_message(), Some("API key is not set."));
        assert_eq!(object.text(), None);
    }

    #[test]
    fn test_empty_success_has_no_text() {
        assert_eq!(Envelope::ok("").text(), None);
    }
}
