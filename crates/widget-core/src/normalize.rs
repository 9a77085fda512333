//! Inbound transport event normalization.
//!
//! The transport delivers loosely structured JSON payloads whose field names
//! vary by channel and message kind. This module folds one raw payload into
//! either a canonical [`Message`], a side-channel [`Signal`], or nothing.
//! Normalization is total: malformed payloads degrade to plain text or are
//! discarded, they never fail the subscription.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;
use uuid::Uuid;

use crate::types::{
    AgentIdentity, AgentKind, Attachment, Message, MessageOrigin, PendingTransfer, QueueUpdate,
    QuickReply,
};

/// Content type identifying a structured card in an attachments list.
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Agent display names at or above this length are treated as placeholders.
pub const AGENT_NAME_MAX_CHARS: usize = 50;

/// Internal separator found in placeholder/system agent names.
const AGENT_NAME_SEPARATOR: char = '_';

const FALLBACK_FILE_NAME: &str = "file";
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Known locations for the display text, first populated wins.
const TEXT_PATHS: &[&[&str]] = &[
    &["content"],
    &["message", "content"],
    &["text"],
    &["messagePayload", "text"],
];

/// Known locations for the agent display name, in preference order.
const AGENT_NAME_PATHS: &[&[&str]] = &[
    &["sender", "displayName"],
    &["sender", "name"],
    &["agentName"],
];

/// Result of normalizing one raw transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Canonical transcript entry to upsert.
    Message(Box<Message>),
    /// Non-message fact for the session controller.
    Signal(Signal),
    /// Event carries nothing the transcript or session needs.
    Discarded,
}

/// Side-channel facts extracted instead of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Queue-status facts parsed out of a system message.
    Queue(QueueUpdate),
}

/// Normalize one raw message payload.
///
/// `timestamp_ms` is the arrival time stamped onto the resulting message;
/// payload timestamps are not trusted for ordering.
pub fn normalize_event(payload: &Value, timestamp_ms: u64) -> Normalized {
    let origin = extract_origin(payload);
    let raw_text = first_populated_string(payload, TEXT_PATHS).unwrap_or_default();
    let extraction = extract_structured_content(&raw_text);
    let attachment = extract_attachment(payload);
    let message_type = string_at(payload, &["messageType"]).map(str::to_ascii_lowercase);
    let is_system = message_type.as_deref() == Some("system");

    // System noise: queue chatter becomes a signal, empty events vanish.
    if is_system {
        if let Some(update) = queue_update_from_text(&extraction.text) {
            trace!(?update, "system message parsed as queue signal");
            return Normalized::Signal(Signal::Queue(update));
        }
        if extraction.text.is_empty() && attachment.is_none() {
            trace!("discarding empty system message");
            return Normalized::Discarded;
        }
    }

    let extracted_name = extract_agent_name(payload);
    let kind = classify_agent_kind(payload, &message_type, extracted_name.as_deref());
    let agent_identity = match origin {
        MessageOrigin::Agent => extracted_name
            .filter(|name| is_display_worthy(name))
            .map(|name| AgentIdentity { name, kind }),
        MessageOrigin::User => None,
    };

    let pending = attachment
        .as_ref()
        .filter(|attachment| attachment.needs_hydration())
        .map(|_| PendingTransfer::Downloading);

    let id = string_at(payload, &["messageId"])
        .or_else(|| string_at(payload, &["id"]))
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Normalized::Message(Box::new(Message {
        id,
        origin,
        text: extraction.text,
        timestamp_ms,
        agent_identity,
        attachment,
        pending,
        send_failed: false,
        quick_replies: extraction.quick_replies,
        structured_card: extraction.structured_card,
    }))
}

/// Normalize one raw typing payload into the boolean typing state.
pub fn normalize_typing_event(payload: &Value) -> bool {
    string_at(payload, &["typingIndicator", "state"]) == Some("typing")
}

#[derive(Debug, Default)]
struct StructuredExtraction {
    text: String,
    quick_replies: Vec<QuickReply>,
    structured_card: Option<Value>,
}

/// Hoist quick replies and cards out of a JSON-object-shaped text field.
///
/// Anything that is not a JSON object stays verbatim as plain text; parse
/// failure is silent by contract.
fn extract_structured_content(raw_text: &str) -> StructuredExtraction {
    let mut extraction = StructuredExtraction {
        text: raw_text.to_owned(),
        ..StructuredExtraction::default()
    };

    if !raw_text.trim_start().starts_with('{') {
        return extraction;
    }
    let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(raw_text) else {
        return extraction;
    };
    let parsed = Value::Object(parsed);

    if let Some(actions) = value_at(&parsed, &["suggestedActions", "actions"]).and_then(Value::as_array)
    {
        extraction.quick_replies = actions.iter().filter_map(quick_reply_from_action).collect();
        extraction.text = string_at(&parsed, &["text"]).unwrap_or_default().to_owned();
    }

    if let Some(card_attachment) = value_at(&parsed, &["attachments"])
        .and_then(Value::as_array)
        .and_then(|attachments| attachments.first())
        .filter(|attachment| {
            string_at(attachment, &["contentType"]) == Some(ADAPTIVE_CARD_CONTENT_TYPE)
        })
    {
        let card = card_attachment.get("content").cloned();
        extraction.text = string_at(&parsed, &["text"])
            .filter(|text| !text.is_empty())
            .or_else(|| card.as_ref().and_then(first_card_body_text))
            .unwrap_or_default()
            .to_owned();
        extraction.structured_card = card;
    }

    extraction
}

fn first_card_body_text(card: &Value) -> Option<&str> {
    card.get("body")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
}

fn quick_reply_from_action(action: &Value) -> Option<QuickReply> {
    let label = string_at(action, &["title"])
        .or_else(|| string_at(action, &["text"]))
        .or_else(|| string_at(action, &["value"]))?;
    let value = string_at(action, &["value"])
        .or_else(|| string_at(action, &["text"]))
        .unwrap_or(label);
    Some(QuickReply {
        label: label.to_owned(),
        value: value.to_owned(),
    })
}

fn extract_origin(payload: &Value) -> MessageOrigin {
    match string_at(payload, &["sender", "role"]) {
        Some(role) if role.eq_ignore_ascii_case("user") => MessageOrigin::User,
        _ => MessageOrigin::Agent,
    }
}

/// Map attachment metadata, preferring the explicit `fileMetadata` field over
/// the generic attachments list. Cards in the attachments list are not files.
fn extract_attachment(payload: &Value) -> Option<Attachment> {
    if let Some(meta) = payload.get("fileMetadata").filter(|meta| meta.is_object()) {
        return Some(Attachment {
            name: first_populated_string(meta, &[&["name"], &["fileName"]])
                .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned()),
            mime_type: first_populated_string(meta, &[&["type"], &["contentType"]])
                .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_owned()),
            size_bytes: u64_at(meta, &["size"]).unwrap_or(0),
            content_ref: first_populated_string(meta, &[&["url"]]),
            remote_id: id_string_at(meta, &["id"]),
        });
    }

    let entry = value_at(payload, &["attachments"])
        .and_then(Value::as_array)
        .and_then(|attachments| attachments.first())?;
    if string_at(entry, &["contentType"]) == Some(ADAPTIVE_CARD_CONTENT_TYPE) {
        return None;
    }

    Some(Attachment {
        name: first_populated_string(entry, &[&["name"], &["fileName"]])
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned()),
        mime_type: first_populated_string(entry, &[&["contentType"], &["type"]])
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_owned()),
        size_bytes: u64_at(entry, &["size"]).unwrap_or(0),
        content_ref: first_populated_string(entry, &[&["contentUrl"], &["url"]]),
        remote_id: None,
    })
}

fn extract_agent_name(payload: &Value) -> Option<String> {
    if let Some(name) = first_populated_string(payload, AGENT_NAME_PATHS) {
        return Some(name);
    }

    payload
        .get("tags")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find_map(|tag| tag.strip_prefix("agentName:"))
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

fn classify_agent_kind(
    payload: &Value,
    message_type: &Option<String>,
    extracted_name: Option<&str>,
) -> AgentKind {
    let sender_type_is_bot = string_at(payload, &["sender", "type"])
        .is_some_and(|sender_type| sender_type.eq_ignore_ascii_case("bot"));
    let message_type_is_bot = message_type.as_deref() == Some("bot");
    let has_bot_tag = value_at(payload, &["tags"])
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().filter_map(Value::as_str).any(|tag| tag == "bot"));

    if sender_type_is_bot || message_type_is_bot || has_bot_tag || extracted_name.is_none() {
        AgentKind::Bot
    } else {
        AgentKind::Human
    }
}

/// Sanity filter against placeholder/internal agent names.
fn is_display_worthy(name: &str) -> bool {
    !name.contains(AGENT_NAME_SEPARATOR) && name.chars().count() < AGENT_NAME_MAX_CHARS
}

/// Best-effort queue-status extraction from system message text.
fn queue_update_from_text(text: &str) -> Option<QueueUpdate> {
    let lower = text.to_lowercase();
    let mut update = QueueUpdate::default();

    if lower.contains("position") && lower.contains("queue") {
        update.position = position_pattern()
            .captures(&lower)
            .and_then(|captures| captures[1].parse().ok());
    }
    if lower.contains("average") || lower.contains("wait") {
        update.estimated_wait_secs = wait_minutes_pattern()
            .captures(&lower)
            .and_then(|captures| captures[1].parse::<u32>().ok())
            .map(|minutes| minutes.saturating_mul(60));
    }

    (!update.is_empty()).then_some(update)
}

fn position_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"position\D*(\d+)").expect("static pattern"))
}

fn wait_minutes_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)\s*min").expect("static pattern"))
}

/// Walk a key path into a JSON value.
fn value_at<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |current, key| current.get(key))
}

fn string_at<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(payload, path)?.as_str()
}

/// First non-empty string among the alternative locations.
fn first_populated_string(payload: &Value, paths: &[&[&str]]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| string_at(payload, path))
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

fn u64_at(payload: &Value, path: &[&str]) -> Option<u64> {
    let value = value_at(payload, path)?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
}

/// Ids may arrive as strings or numbers; keep them as strings either way.
fn id_string_at(payload: &Value, path: &[&str]) -> Option<String> {
    match value_at(payload, path)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW_MS: u64 = 1_731_000_000_000;

    fn expect_message(normalized: Normalized) -> Message {
        match normalized {
            Normalized::Message(message) => *message,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_plain_agent_text() {
        let payload = json!({ "sender": { "role": "bot" }, "content": "Hello" });
        let message = expect_message(normalize_event(&payload, NOW_MS));

        assert_eq!(message.origin, MessageOrigin::Agent);
        assert_eq!(message.text, "Hello");
        assert_eq!(message.timestamp_ms, NOW_MS);
        assert_eq!(message.agent_identity, None);
    }

    #[test]
    fn sender_role_user_is_case_insensitive() {
        let payload = json!({ "sender": { "role": "USER" }, "content": "hi" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.origin, MessageOrigin::User);
    }

    #[test]
    fn picks_first_populated_text_location() {
        let payload = json!({
            "content": "",
            "message": { "content": "nested wins" },
            "text": "ignored"
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "nested wins");
    }

    #[test]
    fn uses_payload_message_id_when_present() {
        let payload = json!({ "messageId": "m42", "content": "hi" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.id, "m42");
    }

    #[test]
    fn synthesizes_distinct_ids_when_payload_has_none() {
        let payload = json!({ "content": "hi" });
        let first = expect_message(normalize_event(&payload, NOW_MS));
        let second = expect_message(normalize_event(&payload, NOW_MS));
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn hoists_quick_replies_from_json_text() {
        let structured = json!({
            "text": "Pick one",
            "suggestedActions": {
                "actions": [
                    { "type": "imBack", "title": "Yes", "value": "yes" },
                    { "type": "imBack", "text": "No" }
                ]
            }
        });
        let payload = json!({ "content": structured.to_string(), "messageId": "m1" });
        let message = expect_message(normalize_event(&payload, NOW_MS));

        assert_eq!(message.text, "Pick one");
        assert_eq!(
            message.quick_replies,
            vec![
                QuickReply { label: "Yes".into(), value: "yes".into() },
                QuickReply { label: "No".into(), value: "No".into() },
            ]
        );
    }

    #[test]
    fn quick_reply_text_defaults_to_empty_when_structured_payload_has_none() {
        let structured = json!({
            "suggestedActions": { "actions": [{ "title": "Ok", "value": "ok" }] }
        });
        let payload = json!({ "content": structured.to_string() });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "");
    }

    #[test]
    fn hoists_adaptive_card_and_falls_back_to_card_body_text() {
        let structured = json!({
            "attachments": [{
                "contentType": ADAPTIVE_CARD_CONTENT_TYPE,
                "content": { "body": [{ "type": "TextBlock", "text": "Card says hi" }] }
            }]
        });
        let payload = json!({ "content": structured.to_string() });
        let message = expect_message(normalize_event(&payload, NOW_MS));

        assert!(message.structured_card.is_some());
        assert_eq!(message.text, "Card says hi");
        assert!(message.attachment.is_none(), "cards are not file attachments");
    }

    #[test]
    fn empty_text_field_falls_back_to_card_body_text() {
        let structured = json!({
            "text": "",
            "attachments": [{
                "contentType": ADAPTIVE_CARD_CONTENT_TYPE,
                "content": { "body": [{ "type": "TextBlock", "text": "Card says hi" }] }
            }]
        });
        let payload = json!({ "content": structured.to_string() });
        let message = expect_message(normalize_event(&payload, NOW_MS));

        assert_eq!(message.text, "Card says hi");
        assert!(message.structured_card.is_some());
    }

    #[test]
    fn malformed_json_text_stays_verbatim() {
        let payload = json!({ "content": "{not valid json" });
        let message = expect_message(normalize_event(&payload, NOW_MS));

        assert_eq!(message.text, "{not valid json");
        assert!(message.quick_replies.is_empty());
        assert!(message.structured_card.is_none());
    }

    #[test]
    fn non_object_json_text_stays_verbatim() {
        let payload = json!({ "content": "[1, 2, 3]" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "[1, 2, 3]");
    }

    #[test]
    fn maps_explicit_file_metadata_with_alternate_field_names() {
        let payload = json!({
            "messageId": "m7",
            "fileMetadata": {
                "fileName": "report.pdf",
                "contentType": "application/pdf",
                "size": 1234,
                "id": "remote-9"
            }
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        let attachment = message.attachment.expect("attachment expected");

        assert_eq!(attachment.name, "report.pdf");
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.size_bytes, 1234);
        assert_eq!(attachment.remote_id.as_deref(), Some("remote-9"));
        assert!(attachment.needs_hydration());
        assert_eq!(message.pending, Some(PendingTransfer::Downloading));
    }

    #[test]
    fn file_metadata_with_url_needs_no_hydration() {
        let payload = json!({
            "fileMetadata": { "name": "cat.png", "type": "image/png", "url": "https://x/cat.png" }
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        let attachment = message.attachment.expect("attachment expected");

        assert_eq!(attachment.content_ref.as_deref(), Some("https://x/cat.png"));
        assert!(!attachment.needs_hydration());
        assert_eq!(message.pending, None);
    }

    #[test]
    fn falls_back_to_generic_attachments_list() {
        let payload = json!({
            "content": "here you go",
            "attachments": [{ "name": "doc.pdf", "contentType": "application/pdf", "contentUrl": "https://x/doc" }]
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        let attachment = message.attachment.expect("attachment expected");

        assert_eq!(attachment.name, "doc.pdf");
        assert_eq!(attachment.content_ref.as_deref(), Some("https://x/doc"));
        assert_eq!(attachment.remote_id, None);
    }

    #[test]
    fn discards_empty_system_messages() {
        let payload = json!({ "messageType": "system", "content": "" });
        assert_eq!(normalize_event(&payload, NOW_MS), Normalized::Discarded);
    }

    #[test]
    fn keeps_empty_non_system_messages() {
        let payload = json!({ "content": "" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "");
    }

    #[test]
    fn parses_queue_position_from_system_message() {
        let payload = json!({
            "messageType": "system",
            "content": "You are in position 3 in the queue"
        });
        match normalize_event(&payload, NOW_MS) {
            Normalized::Signal(Signal::Queue(update)) => {
                assert_eq!(update.position, Some(3));
                assert_eq!(update.estimated_wait_secs, None);
            }
            other => panic!("expected queue signal, got {other:?}"),
        }
    }

    #[test]
    fn parses_average_wait_minutes_as_seconds() {
        let payload = json!({
            "messageType": "system",
            "content": "Average wait time: 5 minutes"
        });
        match normalize_event(&payload, NOW_MS) {
            Normalized::Signal(Signal::Queue(update)) => {
                assert_eq!(update.estimated_wait_secs, Some(300));
            }
            other => panic!("expected queue signal, got {other:?}"),
        }
    }

    #[test]
    fn non_matching_system_text_stays_a_message() {
        let payload = json!({ "messageType": "system", "content": "Agent joined the conversation" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "Agent joined the conversation");
    }

    #[test]
    fn queue_words_in_ordinary_text_do_not_signal() {
        let payload = json!({ "content": "position 3 in the queue" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.text, "position 3 in the queue");
    }

    #[test]
    fn extracts_agent_name_with_preference_order() {
        let payload = json!({
            "content": "hi",
            "sender": { "displayName": "Dana", "name": "fallback" }
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        let identity = message.agent_identity.expect("identity expected");
        assert_eq!(identity.name, "Dana");
        assert_eq!(identity.kind, AgentKind::Human);
    }

    #[test]
    fn extracts_agent_name_from_tags() {
        let payload = json!({ "content": "hi", "tags": ["priority", "agentName:Sam"] });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity.map(|i| i.name), Some("Sam".to_owned()));
    }

    #[test]
    fn placeholder_names_are_filtered_but_message_survives() {
        let payload = json!({ "content": "hi", "sender": { "displayName": "system_agent_01" } });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity, None);
        assert_eq!(message.text, "hi");
    }

    #[test]
    fn over_long_names_are_filtered() {
        let long_name = "a".repeat(AGENT_NAME_MAX_CHARS);
        let payload = json!({ "content": "hi", "sender": { "displayName": long_name } });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity, None);
    }

    #[test]
    fn classifies_bot_when_no_name_extractable() {
        let payload = json!({ "content": "hi", "messageId": "m1" });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        // No identity to display, and the default classification is bot.
        assert_eq!(message.agent_identity, None);
    }

    #[test]
    fn named_sender_with_bot_tag_classifies_as_bot() {
        let payload = json!({
            "content": "hi",
            "sender": { "displayName": "Helper" },
            "tags": ["bot"]
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity.map(|i| i.kind), Some(AgentKind::Bot));
    }

    #[test]
    fn named_human_sender_classifies_as_human() {
        let payload = json!({ "content": "hi", "sender": { "displayName": "Dana", "type": "agent" } });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity.map(|i| i.kind), Some(AgentKind::Human));
    }

    #[test]
    fn user_messages_never_carry_agent_identity() {
        let payload = json!({
            "content": "hi",
            "sender": { "role": "user", "displayName": "Dana" }
        });
        let message = expect_message(normalize_event(&payload, NOW_MS));
        assert_eq!(message.agent_identity, None);
    }

    #[test]
    fn typing_payload_maps_to_boolean_state() {
        assert!(normalize_typing_event(&json!({ "typingIndicator": { "state": "typing" } })));
        assert!(!normalize_typing_event(&json!({ "typingIndicator": { "state": "idle" } })));
        assert!(!normalize_typing_event(&json!({})));
    }
}
