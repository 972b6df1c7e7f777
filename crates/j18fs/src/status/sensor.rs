use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumIter;

/// A filament sensor code as reported by the host.
///
/// The host encodes readings as text: `"-1"` for an unwired sensor, `"0"` for
/// an empty sensor and `"1"` when filament is present. Everything else,
/// including a missing key or a non-string value, is an error reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SensorReading {
    #[strum(to_string = "Sensor not used")]
    Unused,
    #[strum(to_string = "No filament detected")]
    Absent,
    #[strum(to_string = "Filament detected")]
    Present,
    #[strum(to_string = "Error")]
    Unknown,
}

impl SensorReading {
    /// Translate a textual code
    pub fn from_code(code: &str) -> Self {
        match code {
            "-1" => SensorReading::Unused,
            "0" => SensorReading::Absent,
            "1" => SensorReading::Present,
            _ => SensorReading::Unknown,
        }
    }

    /// Translate a raw JSON value. Only strings carry a code; a missing key
    /// counts as `Unknown`, never as `Unused`.
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        match value {
            Some(serde_json::Value::String(code)) => Self::from_code(code),
            _ => SensorReading::Unknown,
        }
    }

    /// Human-readable label shown in popups
    pub fn label(&self) -> String {
        self.to_string()
    }
}

/// The two independent sensor inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum SensorChannel {
    Filament1,
    Filament2,
}

impl SensorChannel {
    /// Response key carrying this channel's code
    pub fn key(&self) -> &'static str {
        match self {
            SensorChannel::Filament1 => "filament",
            SensorChannel::Filament2 => "filament2",
        }
    }

    /// Prefix used in the status message
    pub fn title(&self) -> &'static str {
        match self {
            SensorChannel::Filament1 => "Filament 1",
            SensorChannel::Filament2 => "Filament 2",
        }
    }
}

/// Body of `GET /plugin/<identity>/status`.
///
/// Fields stay raw so a malformed value degrades only its own channel. Only a
/// JSON object decodes; fields are looked up by key, never by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filament2: Option<serde_json::Value>,

    /// Tool the host is printing with; informational
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tool: Option<serde_json::Value>,
}

impl From<serde_json::Map<String, serde_json::Value>> for StatusResponse {
    fn from(mut body: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            filament: body.remove("filament"),
            filament2: body.remove("filament2"),
            active_tool: body.remove("active_tool"),
        }
    }
}

impl StatusResponse {
    pub fn active_tool(&self) -> Option<i64> {
        self.active_tool.as_ref().and_then(|v| v.as_i64())
    }

    pub fn reading(&self, channel: SensorChannel) -> SensorReading {
        let value = match channel {
            SensorChannel::Filament1 => self.filament.as_ref(),
            SensorChannel::Filament2 => self.filament2.as_ref(),
        };
        SensorReading::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_codes() {
        assert_eq!(SensorReading::from_code("-1").label(), "Sensor not used");
        assert_eq!(SensorReading::from_code("0").label(), "No filament detected");
        assert_eq!(SensorReading::from_code("1").label(), "Filament detected");
    }

    #[test]
    fn test_unknown_codes() {
        for code in ["", "2", "-2", "01", " 1", "true", "filament"] {
            assert_eq!(SensorReading::from_code(code), SensorReading::Unknown, "{code:?}");
        }
        assert_eq!(SensorReading::Unknown.label(), "Error");
    }

    #[test]
    fn test_missing_value_is_error_not_unused() {
        assert_eq!(SensorReading::from_value(None), SensorReading::Unknown);
        assert_ne!(SensorReading::from_value(None), SensorReading::Unused);
    }

    #[test]
    fn test_non_string_values_are_errors() {
        assert_eq!(SensorReading::from_value(Some(&json!(1))), SensorReading::Unknown);
        assert_eq!(SensorReading::from_value(Some(&json!(-1))), SensorReading::Unknown);
        assert_eq!(SensorReading::from_value(Some(&json!(null))), SensorReading::Unknown);
        assert_eq!(SensorReading::from_value(Some(&json!("1"))), SensorReading::Present);
    }

    #[test]
    fn test_channels_are_independent() {
        let response: StatusResponse =
            serde_json::from_value(json!({"filament": "0", "filament2": 7})).unwrap();

        assert_eq!(response.reading(SensorChannel::Filament1), SensorReading::Absent);
        assert_eq!(response.reading(SensorChannel::Filament2), SensorReading::Unknown);
    }

    #[test]
    fn test_array_body_is_rejected() {
        assert!(serde_json::from_value::<StatusResponse>(json!(["1", "0"])).is_err());
        assert!(serde_json::from_value::<StatusResponse>(json!("1")).is_err());
    }

    #[test]
    fn test_unrelated_keys_are_ignored() {
        let response: StatusResponse =
            serde_json::from_value(json!({"extra": "1", "filament2": "0"})).unwrap();

        assert_eq!(response.reading(SensorChannel::Filament1), SensorReading::Unknown);
        assert_eq!(response.reading(SensorChannel::Filament2), SensorReading::Absent);
    }

    #[test]
    fn test_backend_status_dict() {
        let response: StatusResponse = serde_json::from_value(
            json!({"filament": "1", "filament2": "-1", "active_tool": 1}),
        )
        .unwrap();

        assert_eq!(response.active_tool(), Some(1));
        assert_eq!(response.reading(SensorChannel::Filament2), SensorReading::Unused);
    }
}
