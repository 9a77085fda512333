//! Tracing/logging bootstrap for the embed host.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,widget_embed=debug,widget_session=debug,widget_core=debug";

/// Install the global subscriber. `RUST_LOG` wins, then `WIDGET_EMBED_LOG`,
/// then a built-in default that keeps the widget crates at debug.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    env::var("WIDGET_EMBED_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
