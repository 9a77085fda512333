//! Wire shape of widget-to-host and host-to-widget signals.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One structured signal crossing the widget/host boundary.
///
/// Serializes as an object with a string `action` discriminator, the shape
/// both sides exchange over the cross-frame channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostSignal {
    /// Collapse the widget container back to the floating button.
    MinimizeChat,
    /// The session ended; the host may tear the widget down.
    EndChat,
    /// Ask the host to copy `url` to the clipboard.
    #[serde(rename_all = "camelCase")]
    CopyLink { url: String },
    /// Host acknowledgment of a copy request.
    #[serde(rename_all = "camelCase")]
    CopyLinkResult { success: bool },
    /// Host pushed new widget configuration.
    #[serde(rename_all = "camelCase")]
    SettingsUpdated { settings: Value },
}

/// Parse an inbound host message, ignoring everything unrecognized.
///
/// Only object-shaped payloads with a known `action` field produce a signal;
/// strings, arrays, objects with unknown actions and malformed variants all
/// yield `None`. Inbound traffic on this channel is untrusted by contract.
pub fn parse_host_signal(payload: &Value) -> Option<HostSignal> {
    if !payload.is_object() {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_every_action_through_the_wire_shape() {
        let signals = [
            HostSignal::MinimizeChat,
            HostSignal::EndChat,
            HostSignal::CopyLink {
                url: "https://example.org/chat/123".to_owned(),
            },
            HostSignal::CopyLinkResult { success: true },
            HostSignal::SettingsUpdated {
                settings: json!({ "orgId": "org-1" }),
            },
        ];
        for signal in signals {
            let wire = serde_json::to_value(&signal).expect("serialize");
            assert!(wire.get("action").is_some_and(Value::is_string));
            assert_eq!(parse_host_signal(&wire), Some(signal));
        }
    }

    #[test]
    fn action_discriminator_is_camel_case() {
        let wire = serde_json::to_value(HostSignal::CopyLinkResult { success: false })
            .expect("serialize");
        assert_eq!(wire["action"], "copyLinkResult");
        assert_eq!(wire["success"], false);
    }

    #[test]
    fn ignores_non_object_payloads() {
        assert_eq!(parse_host_signal(&json!("minimizeChat")), None);
        assert_eq!(parse_host_signal(&json!(["endChat"])), None);
        assert_eq!(parse_host_signal(&json!(42)), None);
        assert_eq!(parse_host_signal(&Value::Null), None);
    }

    #[test]
    fn ignores_unknown_or_malformed_actions() {
        assert_eq!(parse_host_signal(&json!({ "action": "reloadPage" })), None);
        assert_eq!(parse_host_signal(&json!({ "action": "copyLink" })), None);
        assert_eq!(parse_host_signal(&json!({ "kind": "endChat" })), None);
    }
}
