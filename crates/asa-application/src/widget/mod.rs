//! Client-side chat widget logic, independent of any DOM.

pub mod controller;
pub mod transport;

pub use controller::{Bubble, BubbleKind, ProactiveOutcome, SendOutcome, Sender, WidgetController};
pub use transport::{HttpRelayTransport, LocalRelayTransport, RelayTransport};
