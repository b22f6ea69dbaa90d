//! BLE Scanner Module
//!
//! Scan control plus the pump that turns adapter events into controller
//! events.

use crate::domain::models::RadioState;
use crate::infrastructure::bluetooth::Event;
use anyhow::Result;
use btleplug::api::{Central, CentralEvent, CentralState, Peripheral as _, ScanFilter};
use btleplug::platform::Adapter;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// BLE scanner. The scan is deliberately unfiltered; name matching happens
/// in the controller.
pub struct BleScanner {
    adapter: Adapter,
    scanning: bool,
}

impl BleScanner {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            scanning: false,
        }
    }

    /// Start scanning for BLE devices
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting BLE scan");
        self.adapter.start_scan(ScanFilter::default()).await?;
        self.scanning = true;
        Ok(())
    }

    /// Stop scanning
    pub async fn stop(&mut self) -> Result<()> {
        if self.scanning {
            info!("Stopping BLE scan");
            self.adapter.stop_scan().await?;
            self.scanning = false;
        }
        Ok(())
    }
}

/// Map the adapter's power state onto the controller's radio states.
pub fn radio_state_from(state: CentralState) -> RadioState {
    match state {
        CentralState::PoweredOn => RadioState::PoweredOn,
        CentralState::PoweredOff => RadioState::PoweredOff,
        CentralState::Unknown => RadioState::Unknown,
    }
}

/// Forward adapter events to the controller channel until the adapter stream
/// or the receiver goes away.
pub fn spawn_event_pump(
    adapter: Adapter,
    event_sender: mpsc::UnboundedSender<Event>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = match adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Could not subscribe to adapter events: {e}");
                return;
            }
        };

        while let Some(event) = events.next().await {
            let forwarded = match event {
                CentralEvent::StateUpdate(state) => {
                    Some(Event::Radio(radio_state_from(state)))
                }
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    // The advertisement callback needs the peripheral handle
                    // and its advertised name.
                    let Ok(peripheral) = adapter.peripheral(&id).await else {
                        continue;
                    };
                    let properties = peripheral.properties().await.ok().flatten();
                    let (name, rssi) = match properties {
                        Some(p) => (p.local_name, p.rssi),
                        None => (None, None),
                    };
                    Some(Event::Advertisement {
                        device: peripheral,
                        name,
                        rssi,
                    })
                }
                CentralEvent::DeviceDisconnected(_) => Some(Event::Disconnected),
                _ => None,
            };

            if let Some(event) = forwarded {
                if event_sender.send(event).is_err() {
                    break;
                }
            }
        }
    })
}
