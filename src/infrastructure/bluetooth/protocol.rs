//! LED control protocol for the BMDWare evaluation firmware.
//!
//! The blinker drives a single writable characteristic; the two command
//! payloads below switch the onboard LED on and off.

use anyhow::Result;
use uuid::Uuid;

/// BMDWare LED control characteristic UUID
pub const LED_CHAR_UUID: &str = "2413b43f-707f-90bd-2045-2ab8807571b7";

/// Commands accepted by the LED control characteristic
#[derive(Debug, Clone, Copy)]
pub enum LedCommand {
    On,
    Off,
}

impl LedCommand {
    /// Get the raw bytes for this command
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::On => &[0x54, 0x09, 0x00],
            Self::Off => &[0x55],
        }
    }
}

/// Parse a characteristic UUID from its string form
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(uuid_str)?)
}
