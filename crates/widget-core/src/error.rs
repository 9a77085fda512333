use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SessionState;

/// Broad error category used for user-facing handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid widget configuration.
    Config,
    /// Transport init/start failure.
    Connection,
    /// Per-message send failure.
    Send,
    /// Attachment upload/download failure.
    Attachment,
    /// A single inbound event could not be processed.
    MalformedEvent,
    /// Internal bug or invariant break.
    Internal,
}

/// How an error is presented to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSurface {
    /// Replaces the widget body with a dedicated explanatory view.
    Blocking,
    /// Persistent retryable-by-user banner.
    Banner,
    /// Transient toast that auto-clears after a short interval.
    Toast,
    /// Logged only, never shown.
    Silent,
}

/// Stable widget error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct WidgetError {
    /// High-level error category.
    pub category: ErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl WidgetError {
    /// Construct a new widget error.
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: SessionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in state {current:?}"),
        )
    }

    /// How this error should be presented, per category.
    pub fn surface(&self) -> ErrorSurface {
        match self.category {
            ErrorCategory::Config => ErrorSurface::Blocking,
            ErrorCategory::Connection => ErrorSurface::Banner,
            ErrorCategory::Send | ErrorCategory::Attachment => ErrorSurface::Toast,
            ErrorCategory::MalformedEvent => ErrorSurface::Silent,
            ErrorCategory::Internal => ErrorSurface::Toast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = WidgetError::invalid_state(SessionState::Idle, "send_text");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, ErrorCategory::Internal);
    }

    #[test]
    fn maps_categories_to_presentation_surfaces() {
        let config = WidgetError::new(ErrorCategory::Config, "missing_config", "no orgId");
        let connection = WidgetError::new(ErrorCategory::Connection, "start_failed", "offline");
        let send = WidgetError::new(ErrorCategory::Send, "send_failed", "timeout");
        let malformed = WidgetError::new(ErrorCategory::MalformedEvent, "bad_event", "junk");

        assert_eq!(config.surface(), ErrorSurface::Blocking);
        assert_eq!(connection.surface(), ErrorSurface::Banner);
        assert_eq!(send.surface(), ErrorSurface::Toast);
        assert_eq!(malformed.surface(), ErrorSurface::Silent);
    }
}
