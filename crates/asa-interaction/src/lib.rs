//! Provider clients for the ASA relay.

pub mod gemini_client;

pub use gemini_client::GeminiClient;
