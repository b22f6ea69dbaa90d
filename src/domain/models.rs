//! Core types shared between the state machine and the BLE infrastructure.

use thiserror::Error;
use uuid::Uuid;

/// Reported state of the Bluetooth radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOn,
    PoweredOff,
    Resetting,
    Unauthorized,
    Unsupported,
    Unknown,
}

/// Diagnostic conditions. These are logged and never escalated: the demo has
/// no retry or recovery path for any of them.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("Bluetooth radio unavailable: {0:?}")]
    RadioUnavailable(RadioState),
    #[error("peripheral reported no {0}")]
    DiscoveryEmpty(&'static str),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Input events delivered to the controller, one at a time, over a single
/// channel. Generic over the device handle `D` and characteristic handle `C`
/// so the transition logic stays independent of the BLE backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BlinkerEvent<D, C> {
    /// Radio state notification from the adapter.
    Radio(RadioState),
    /// An advertisement was received while scanning.
    Advertisement {
        device: D,
        name: Option<String>,
        rssi: Option<i16>,
    },
    /// The outstanding connection attempt succeeded.
    Connected,
    /// The outstanding connection attempt failed.
    ConnectionFailed(String),
    /// The peripheral dropped the connection.
    Disconnected,
    /// Service discovery finished; carries the number of services found.
    ServicesDiscovered(usize),
    /// Characteristics of one discovered service, as (handle, UUID) pairs.
    CharacteristicsDiscovered(Vec<(C, Uuid)>),
    /// Completion report for an earlier write.
    WriteCompleted(Result<(), String>),
    /// The blink timer fired.
    Tick,
}

/// Side effects requested by the controller. The infrastructure layer
/// executes these against the real adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<D, C> {
    /// Start an unfiltered scan.
    StartScan,
    StopScan,
    Connect(D),
    DiscoverServices(D),
    /// Write `payload` to the characteristic, without response.
    Write {
        device: D,
        characteristic: C,
        payload: Vec<u8>,
    },
    /// Arm the one-shot blink timer.
    ScheduleTick,
}
