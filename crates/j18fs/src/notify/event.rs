//! Notification events.
//!
//! An event is either synthesised by the status fetcher or decoded from a
//! plugin message pushed by the host. Either way it goes through the same
//! dispatcher and is consumed immediately.

use std::fmt;

use serde_json::Value;

/// What a plugin message asks for. Only `Popup` is ever rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Popup,
    /// Any other `type`, or the empty string when the payload had none
    Other(String),
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "popup" => EventKind::Popup,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// Popup style, matching the host notification library's types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Severity {
    Notice,
    #[default]
    Info,
    Success,
    Error,
    /// A style not known to j18fs, passed through verbatim
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Other(s) => s,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        match s {
            "notice" => Severity::Notice,
            "info" => Severity::Info,
            "success" => Severity::Success,
            "error" => Severity::Error,
            other => Severity::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Plugin the event claims to come from
    pub origin_plugin: String,
    pub kind: EventKind,
    /// Popup body; may carry simple markup such as `<b>`
    pub message: String,
    pub severity: Severity,
    /// `false` keeps the popup until the user dismisses it
    pub auto_hide: bool,
}

impl NotificationEvent {
    /// A sticky info popup attributed to `origin_plugin`.
    pub fn sticky_info(origin_plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin_plugin: origin_plugin.into(),
            kind: EventKind::Popup,
            message: message.into(),
            severity: Severity::Info,
            auto_hide: false,
        }
    }

    /// Decode a pushed plugin message.
    ///
    /// Missing fields fall back to safe values: no `type` yields an empty
    /// `Other` kind, `msgType` defaults to info, `hide` to true and `msg` to the
    /// empty string. A boolean `hide` is honoured and an explicit `null` means
    /// sticky; any other value falls back to the default.
    pub fn from_push(plugin: &str, payload: &Value) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .map(EventKind::from)
            .unwrap_or_else(|| EventKind::Other(String::new()));

        let message = match payload.get("msg") {
            Some(Value::String(s)) => s.clone(),
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        let severity = payload
            .get("msgType")
            .and_then(Value::as_str)
            .map(Severity::from)
            .unwrap_or_default();

        // A present but null `hide` keeps the popup on screen
        let auto_hide = match payload.get("hide") {
            None => true,
            Some(Value::Null) => false,
            Some(Value::Bool(hide)) => *hide,
            Some(_) => true,
        };

        Self {
            origin_plugin: plugin.to_string(),
            kind,
            message,
            severity,
            auto_hide,
        }
    }
}

/// Whether a payload is the host's bare status broadcast
/// (`{filament, filament2, active_tool}` with no `type`).
pub fn is_status_broadcast(payload: &Value) -> bool {
    payload.get("type").is_none()
        && (payload.get("filament").is_some() || payload.get("filament2").is_some())
}
