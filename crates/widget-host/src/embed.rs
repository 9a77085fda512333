//! Host-side widget lifecycle: floating button and chat container.
//!
//! The injecting host keeps exactly one controller per page. All button and
//! container state lives here, behind explicit lifecycle methods, instead of
//! in ambient page-level mutable state.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::signal::HostSignal;

/// What the host page is currently showing for the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStage {
    /// Nothing injected yet, or torn down.
    Detached,
    /// Floating launcher button only.
    ButtonVisible,
    /// Chat container open, button hidden.
    Open,
    /// Chat container hidden but alive, button visible again.
    Minimized,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbedError {
    #[error("invalid embed transition: cannot {action} while {stage:?}")]
    InvalidTransition {
        stage: EmbedStage,
        action: &'static str,
    },
}

/// Lifecycle controller for one embedded widget instance.
#[derive(Debug, Clone)]
pub struct EmbedController {
    stage: EmbedStage,
    settings: Value,
}

impl EmbedController {
    pub fn new(settings: Value) -> Self {
        Self {
            stage: EmbedStage::Detached,
            settings,
        }
    }

    pub fn stage(&self) -> EmbedStage {
        self.stage
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// Inject the floating button into the page.
    pub fn attach(&mut self) -> Result<(), EmbedError> {
        match self.stage {
            EmbedStage::Detached => {
                self.stage = EmbedStage::ButtonVisible;
                debug!("embed attached");
                Ok(())
            }
            stage => Err(EmbedError::InvalidTransition {
                stage,
                action: "attach",
            }),
        }
    }

    /// Open the chat container, from the button or from a minimized state.
    pub fn open(&mut self) -> Result<(), EmbedError> {
        match self.stage {
            EmbedStage::ButtonVisible | EmbedStage::Minimized => {
                self.stage = EmbedStage::Open;
                Ok(())
            }
            stage => Err(EmbedError::InvalidTransition {
                stage,
                action: "open",
            }),
        }
    }

    /// Hide the container, keeping the session alive behind the button.
    pub fn minimize(&mut self) -> Result<(), EmbedError> {
        match self.stage {
            EmbedStage::Open => {
                self.stage = EmbedStage::Minimized;
                Ok(())
            }
            stage => Err(EmbedError::InvalidTransition {
                stage,
                action: "minimize",
            }),
        }
    }

    /// Drop the container after the session ended; the button remains.
    pub fn close(&mut self) -> Result<(), EmbedError> {
        match self.stage {
            EmbedStage::Open | EmbedStage::Minimized => {
                self.stage = EmbedStage::ButtonVisible;
                Ok(())
            }
            stage => Err(EmbedError::InvalidTransition {
                stage,
                action: "close",
            }),
        }
    }

    /// Remove everything from the page.
    pub fn detach(&mut self) {
        self.stage = EmbedStage::Detached;
        debug!("embed detached");
    }

    /// Tear down and rebuild with new settings. An attached widget comes back
    /// at the launcher button; a detached one stays detached.
    pub fn apply_settings(&mut self, settings: Value) {
        let was_attached = self.stage != EmbedStage::Detached;
        self.settings = settings;
        self.stage = if was_attached {
            EmbedStage::ButtonVisible
        } else {
            EmbedStage::Detached
        };
        debug!(was_attached, "embed settings applied");
    }

    /// Apply one inbound widget signal. Inbound traffic is untrusted, so
    /// signals that do not fit the current stage are logged and ignored
    /// rather than surfaced.
    pub fn apply_signal(&mut self, signal: &HostSignal) {
        let outcome = match signal {
            HostSignal::MinimizeChat => self.minimize(),
            HostSignal::EndChat => self.close(),
            HostSignal::SettingsUpdated { settings } => {
                self.apply_settings(settings.clone());
                Ok(())
            }
            HostSignal::CopyLink { .. } | HostSignal::CopyLinkResult { .. } => Ok(()),
        };
        if let Err(err) = outcome {
            warn!(%err, "ignoring host signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attached() -> EmbedController {
        let mut controller = EmbedController::new(json!({ "orgId": "org-1" }));
        controller.attach().expect("attach");
        controller
    }

    #[test]
    fn walks_the_full_lifecycle() {
        let mut controller = attached();
        assert_eq!(controller.stage(), EmbedStage::ButtonVisible);

        controller.open().expect("open");
        assert_eq!(controller.stage(), EmbedStage::Open);

        controller.minimize().expect("minimize");
        assert_eq!(controller.stage(), EmbedStage::Minimized);

        controller.open().expect("reopen");
        controller.close().expect("close");
        assert_eq!(controller.stage(), EmbedStage::ButtonVisible);

        controller.detach();
        assert_eq!(controller.stage(), EmbedStage::Detached);
    }

    #[test]
    fn rejects_transitions_that_skip_stages() {
        let mut controller = attached();
        assert!(matches!(
            controller.minimize(),
            Err(EmbedError::InvalidTransition { action: "minimize", .. })
        ));

        let mut detached = EmbedController::new(json!({}));
        assert!(detached.open().is_err());
        assert!(detached.close().is_err());
    }

    #[test]
    fn double_attach_is_rejected() {
        let mut controller = attached();
        assert!(controller.attach().is_err());
    }

    #[test]
    fn settings_update_rebuilds_to_button() {
        let mut controller = attached();
        controller.open().expect("open");

        controller.apply_settings(json!({ "orgId": "org-2" }));

        assert_eq!(controller.stage(), EmbedStage::ButtonVisible);
        assert_eq!(controller.settings()["orgId"], "org-2");
    }

    #[test]
    fn settings_update_while_detached_stays_detached() {
        let mut controller = EmbedController::new(json!({}));
        controller.apply_settings(json!({ "orgId": "org-2" }));
        assert_eq!(controller.stage(), EmbedStage::Detached);
    }

    #[test]
    fn inbound_signals_drive_the_lifecycle_tolerantly() {
        let mut controller = attached();
        controller.open().expect("open");

        controller.apply_signal(&HostSignal::MinimizeChat);
        assert_eq!(controller.stage(), EmbedStage::Minimized);

        controller.apply_signal(&HostSignal::EndChat);
        assert_eq!(controller.stage(), EmbedStage::ButtonVisible);

        // Out-of-place minimize is ignored, not an error.
        controller.apply_signal(&HostSignal::MinimizeChat);
        assert_eq!(controller.stage(), EmbedStage::ButtonVisible);
    }
}
