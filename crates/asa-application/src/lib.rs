//! Application layer: the relay service, prompt assembly, Markdown rendering
//! and the widget controller.

pub mod markdown;
pub mod prompt;
pub mod relay_service;
pub mod widget;

pub use relay_service::RelayService;
pub use widget::{HttpRelayTransport, LocalRelayTransport, RelayTransport, WidgetController};
