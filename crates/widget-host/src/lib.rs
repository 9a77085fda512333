//! Signaling between the embedded widget and its hosting page.
//!
//! The widget runs inside a frame the host controls; minimize, end and
//! copy-to-clipboard all have to be carried out by the host. This crate
//! defines the wire shape of those signals, a best-effort outbound bridge,
//! and the host-side controller that owns the floating button and widget
//! container lifecycle.

pub mod bridge;
pub mod embed;
pub mod signal;

pub use bridge::{ChannelHostBridge, HostBridge, NullHostBridge};
pub use embed::{EmbedController, EmbedError, EmbedStage};
pub use signal::{HostSignal, parse_host_signal};
