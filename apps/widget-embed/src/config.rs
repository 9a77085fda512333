//! Widget configuration parsed from an embed query string.
//!
//! The hosting page passes configuration to the widget frame as URL query
//! parameters; the same string works here as a CLI argument or the
//! `WIDGET_EMBED_QUERY` environment variable.

use std::{error::Error, fmt};

const DEFAULT_CHANNEL_ID: &str = "lcw";

/// Configuration required to open a chat session against an org.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Organization identifier.
    pub org_id: String,
    /// Organization endpoint base URL.
    pub org_url: String,
    /// Widget deployment identifier.
    pub widget_id: String,
    /// Display name shown in the widget header.
    pub company: Option<String>,
    /// Header icon URL.
    pub header_icon: Option<String>,
    /// Follow-up suggestion webhook URL.
    pub pau_url: Option<String>,
    /// Agent-list webhook URL.
    pub agents_url: Option<String>,
    /// Backend channel identifier.
    pub channel_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required query parameter is absent or empty.
    MissingKey { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { key } => write!(f, "missing required widget parameter '{key}'"),
        }
    }
}

impl Error for ConfigError {}

impl WidgetConfig {
    /// Parse from a query string like `orgId=o1&orgUrl=https...&widgetId=w1`.
    /// A leading `?` is tolerated.
    pub fn from_query(query: &str) -> Result<Self, ConfigError> {
        let pairs: Vec<(String, String)> = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_owned(), decode_component(value)),
                None => (pair.to_owned(), String::new()),
            })
            .collect();

        Self::from_lookup(|key| {
            pairs
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, value)| value.clone())
        })
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        Ok(Self {
            org_id: required(&mut lookup, "orgId")?,
            org_url: required(&mut lookup, "orgUrl")?,
            widget_id: required(&mut lookup, "widgetId")?,
            company: optional(&mut lookup, "company"),
            header_icon: optional(&mut lookup, "headerIcon"),
            pau_url: optional(&mut lookup, "pauUrl"),
            agents_url: optional(&mut lookup, "agentsUrl"),
            channel_id: optional(&mut lookup, "channelId")
                .unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_owned()),
        })
    }
}

fn required<F>(lookup: &mut F, key: &'static str) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::MissingKey { key })
}

fn optional<F>(lookup: &mut F, key: &str) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Decode `+` and `%XX` escapes; malformed escapes pass through verbatim.
fn decode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut bytes = raw.bytes().peekable();
    let mut buf = Vec::new();
    while let Some(byte) = bytes.next() {
        match byte {
            b'+' => buf.push(b' '),
            b'%' => {
                let hi = bytes.peek().copied();
                if let Some(hi) = hi.and_then(hex_digit) {
                    bytes.next();
                    if let Some(lo) = bytes.peek().copied().and_then(hex_digit) {
                        bytes.next();
                        buf.push(hi * 16 + lo);
                        continue;
                    }
                    buf.push(b'%');
                    buf.push(to_hex_char(hi));
                } else {
                    buf.push(b'%');
                }
            }
            other => buf.push(other),
        }
    }
    out.push_str(&String::from_utf8_lossy(&buf));
    out
}

fn hex_digit(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|digit| digit as u8)
}

fn to_hex_char(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        _ => b'a' + (nibble - 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<WidgetConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        WidgetConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn parses_required_fields_and_defaults() {
        let cfg = config_from_pairs(&[
            ("orgId", "org-1"),
            ("orgUrl", "https://chat.example.org"),
            ("widgetId", "widget-1"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.org_id, "org-1");
        assert_eq!(cfg.org_url, "https://chat.example.org");
        assert_eq!(cfg.widget_id, "widget-1");
        assert_eq!(cfg.channel_id, DEFAULT_CHANNEL_ID);
        assert_eq!(cfg.company, None);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = config_from_pairs(&[("orgId", "org-1"), ("orgUrl", "https://x")])
            .expect_err("widgetId is required");
        assert_eq!(err, ConfigError::MissingKey { key: "widgetId" });
    }

    #[test]
    fn empty_required_value_counts_as_missing() {
        let err = config_from_pairs(&[
            ("orgId", "  "),
            ("orgUrl", "https://x"),
            ("widgetId", "w"),
        ])
        .expect_err("blank orgId is missing");
        assert_eq!(err, ConfigError::MissingKey { key: "orgId" });
    }

    #[test]
    fn parses_a_full_query_string() {
        let cfg = WidgetConfig::from_query(
            "?orgId=org-1&orgUrl=https%3A%2F%2Fchat.example.org&widgetId=w1\
             &company=Acme+Support&channelId=custom",
        )
        .expect("query should parse");

        assert_eq!(cfg.org_url, "https://chat.example.org");
        assert_eq!(cfg.company.as_deref(), Some("Acme Support"));
        assert_eq!(cfg.channel_id, "custom");
    }

    #[test]
    fn malformed_percent_escape_passes_through() {
        let cfg = WidgetConfig::from_query("orgId=a%2&orgUrl=u&widgetId=w")
            .expect("query should parse");
        assert_eq!(cfg.org_id, "a%2");
    }
}
