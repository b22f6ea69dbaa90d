//! Bluetooth Module
//!
//! BLE central plumbing for the LED blinker, built on `btleplug`.
//!
//! ## Modules
//!
//! - [`protocol`] - LED command bytes, target characteristic UUID, UUID parsing
//! - [`scanner`] - scan control and the adapter event pump
//! - [`connection`] - connect, GATT discovery, and characteristic writes
//! - [`service`] - event loop wiring the adapter to the blink controller

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;

pub use service::BlinkerService;

/// Controller event specialized to the btleplug handle types.
pub type Event =
    crate::domain::models::BlinkerEvent<btleplug::platform::Peripheral, btleplug::api::Characteristic>;

