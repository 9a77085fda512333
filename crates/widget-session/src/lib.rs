//! Session runtime for the embedded chat widget.
//!
//! [`spawn_runtime`] wires a [`ChatTransport`] implementation and a host
//! bridge into a single owning task; callers drive it through the returned
//! [`WidgetHandle`] and observe the session on its broadcast event stream.

pub mod runtime;
pub mod suggestions;
pub mod transport;

pub use runtime::{RuntimeConfig, WidgetHandle, spawn_runtime};
pub use suggestions::{NoSuggestions, SuggestionError, SuggestionSource};
pub use transport::{ChatTransport, TransportError};
