//! BLE Connection Module
//!
//! Connection attempts, GATT discovery, and characteristic writes. Results
//! are reported back to the controller as events on the shared channel, so
//! the controller sees one sequential stream.

use crate::infrastructure::bluetooth::Event;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tokio::sync::mpsc;
use tracing::{error, info};

/// BLE connection handler
pub struct BleConnection {
    event_sender: mpsc::UnboundedSender<Event>,
}

impl BleConnection {
    pub fn new(event_sender: mpsc::UnboundedSender<Event>) -> Self {
        Self { event_sender }
    }

    /// Issue a connection request. The outcome arrives later as a
    /// `Connected` or `ConnectionFailed` event.
    pub fn connect(&self, device: Peripheral) {
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            let event = match device.connect().await {
                Ok(()) => Event::Connected,
                Err(e) => Event::ConnectionFailed(e.to_string()),
            };
            let _ = sender.send(event);
        });
    }

    /// Run GATT discovery. Emits one `ServicesDiscovered` event with the
    /// service count, then one `CharacteristicsDiscovered` event per service.
    pub fn discover_services(&self, device: Peripheral) {
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            if let Err(e) = device.discover_services().await {
                // No retry and no timeout: the controller simply never
                // advances past service discovery.
                error!("Service discovery failed: {e}");
                return;
            }

            let services = device.services();
            info!("Discovered {} services", services.len());
            if sender.send(Event::ServicesDiscovered(services.len())).is_err() {
                return;
            }

            for service in services {
                let characteristics: Vec<(Characteristic, uuid::Uuid)> = service
                    .characteristics
                    .into_iter()
                    .map(|c| {
                        let uuid = c.uuid;
                        (c, uuid)
                    })
                    .collect();
                if sender
                    .send(Event::CharacteristicsDiscovered(characteristics))
                    .is_err()
                {
                    return;
                }
            }
        });
    }

    /// Write without response. The completion report is diagnostic only.
    pub async fn write(
        &self,
        device: &Peripheral,
        characteristic: &Characteristic,
        payload: &[u8],
    ) {
        let result = device
            .write(characteristic, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| e.to_string());
        let _ = self.event_sender.send(Event::WriteCompleted(result));
    }
}
