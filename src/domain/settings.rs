use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "ble_led_blinker".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Blinker configuration. Defaults target the BMDWare LED control
/// characteristic; any field can be overridden from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Advertised peripheral name to connect to. Left unset, the blinker
    /// only logs discovered devices and never connects.
    #[serde(default)]
    pub target_peripheral_name: Option<String>,

    #[serde(default = "default_led_char_uuid")]
    pub led_characteristic_uuid: String,
    #[serde(default = "default_on_command")]
    pub on_command: Vec<u8>,
    #[serde(default = "default_off_command")]
    pub off_command: Vec<u8>,

    #[serde(default = "default_blink_delay_secs")]
    pub blink_delay_secs: f64,
    #[serde(default = "default_blink_count")]
    pub blink_count: u32,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_peripheral_name: None,
            led_characteristic_uuid: default_led_char_uuid(),
            on_command: default_on_command(),
            off_command: default_off_command(),
            blink_delay_secs: default_blink_delay_secs(),
            blink_count: default_blink_count(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_led_char_uuid() -> String {
    crate::infrastructure::bluetooth::protocol::LED_CHAR_UUID.to_string()
}
fn default_on_command() -> Vec<u8> {
    crate::infrastructure::bluetooth::protocol::LedCommand::On
        .as_bytes()
        .to_vec()
}
fn default_off_command() -> Vec<u8> {
    crate::infrastructure::bluetooth::protocol::LedCommand::Off
        .as_bytes()
        .to_vec()
}
fn default_blink_delay_secs() -> f64 {
    1.0
}
fn default_blink_count() -> u32 {
    10
}

impl Settings {
    /// Load settings from a JSON file, or use the built-in defaults when no
    /// path is given. Settings are never written back.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&contents)?)
            }
            None => Ok(Self::default()),
        }
    }
}
