//! Follow-up suggestion source seam.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("suggestion fetch failed: {0}")]
pub struct SuggestionError(pub String);

/// Supplies follow-up suggestion chips for the latest agent message, the
/// counterpart of the follow-up webhook configured via `pauUrl`.
///
/// Fetch failures are logged by the runtime and never surfaced to the user;
/// an empty list means no chips.
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn follow_ups(&self, agent_text: &str) -> Result<Vec<String>, SuggestionError>;
}

/// Source for deployments without a follow-up webhook configured.
#[derive(Debug, Default)]
pub struct NoSuggestions;

#[async_trait]
impl SuggestionSource for NoSuggestions {
    async fn follow_ups(&self, _agent_text: &str) -> Result<Vec<String>, SuggestionError> {
        Ok(Vec::new())
    }
}
