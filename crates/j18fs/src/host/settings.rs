use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Settings state owned by the host, keyed by plugin identity.
///
/// Mirrors the host's `settings.plugins` tree. j18fs only ever reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostSettings {
    plugins: HashMap<String, Value>,
}

impl HostSettings {
    pub fn new(plugins: HashMap<String, Value>) -> Self {
        Self { plugins }
    }

    /// Raw settings tree for `identity` (test-only accessor).
    #[cfg(test)]
    pub(crate) fn get(&self, identity: &str) -> Option<&Value> {
        self.plugins.get(identity)
    }

    /// Typed settings for `identity`; host defaults when the host has none.
    pub fn plugin_settings(&self, identity: &str) -> Result<PluginSettings, serde_json::Error> {
        match self.plugins.get(identity) {
            Some(value) => serde_json::from_value(value.clone()),
            None => Ok(PluginSettings::default()),
        }
    }
}

/// GPIO numbering scheme the host plugin uses for its pins.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PinMode {
    /// Physical header numbering
    #[default]
    Board,
    /// Broadcom channel numbering
    Bcm,
}

impl From<u8> for PinMode {
    fn from(value: u8) -> Self {
        match value {
            0 => PinMode::Board,
            _ => PinMode::Bcm,
        }
    }
}

impl PinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinMode::Board => "board",
            PinMode::Bcm => "bcm",
        }
    }
}

impl From<PinMode> for u8 {
    fn from(mode: PinMode) -> Self {
        match mode {
            PinMode::Board => 0,
            PinMode::Bcm => 1,
        }
    }
}

/// The host's settings for the filament sensor plugin.
///
/// Captured once when the widget binds and never written back. Defaults match
/// the ones the host plugin registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    pub enabled: bool,

    /// Sensor 1 pin, -1 when not wired
    pub pin: i32,

    /// Sensor 1 debounce in milliseconds
    pub bounce: u32,

    /// Pin level that means "no filament" for sensor 1 (0 = normally open)
    pub switch: u8,

    /// G-code sent when sensor 1 runs out, one command per line
    pub gcode_pin: String,

    pub pin2: i32,
    pub bounce2: u32,
    pub switch2: u8,
    pub gcode_pin2: String,

    pub mode: PinMode,

    /// Pause the print when the active tool runs out
    pub pause_print: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            pin: -1,
            bounce: 250,
            switch: 0,
            gcode_pin: String::new(),
            pin2: -1,
            bounce2: 250,
            switch2: 0,
            gcode_pin2: String::new(),
            mode: PinMode::Board,
            pause_print: true,
        }
    }
}

impl PluginSettings {
    pub fn has_pin(&self) -> bool {
        self.pin != -1
    }

    pub fn has_pin2(&self) -> bool {
        self.pin2 != -1
    }
}
