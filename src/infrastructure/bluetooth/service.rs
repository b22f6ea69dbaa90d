//! Bluetooth Service Module
//!
//! Wires the blink controller to the btleplug adapter: seeds the radio
//! state, pumps adapter events into the controller, and executes the
//! actions it returns.

use crate::domain::blinker::{BlinkConfig, BlinkController};
use crate::domain::models::Action;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::{
    connection::BleConnection,
    protocol,
    scanner::{self, BleScanner},
    Event,
};
use anyhow::Result;
use btleplug::api::{Central, Characteristic};
use btleplug::platform::{Adapter, Peripheral};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Top-level blinker service owning the event loop.
pub struct BlinkerService {
    adapter: Adapter,
    scanner: BleScanner,
    connection: BleConnection,
    controller: BlinkController<Peripheral, Characteristic>,
    blink_delay: Duration,
    event_sender: mpsc::UnboundedSender<Event>,
    event_receiver: mpsc::UnboundedReceiver<Event>,
}

impl BlinkerService {
    pub fn new(adapter: Adapter, settings: &Settings) -> Result<Self> {
        let config = BlinkConfig {
            target_name: settings.target_peripheral_name.clone(),
            led_characteristic: protocol::parse_uuid(&settings.led_characteristic_uuid)?,
            on_command: settings.on_command.clone(),
            off_command: settings.off_command.clone(),
            blink_count: settings.blink_count,
        };

        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Ok(Self {
            scanner: BleScanner::new(adapter.clone()),
            connection: BleConnection::new(event_sender.clone()),
            controller: BlinkController::new(config),
            blink_delay: Duration::from_secs_f64(settings.blink_delay_secs),
            adapter,
            event_sender,
            event_receiver,
        })
    }

    /// Run until the controller finishes its blink sequence or the radio
    /// becomes unavailable.
    pub async fn run(mut self) -> Result<()> {
        // Seed the controller with the current radio state; later changes
        // arrive through the event pump.
        let initial_state = self.adapter.adapter_state().await?;
        let _ = self
            .event_sender
            .send(Event::Radio(scanner::radio_state_from(initial_state)));

        let pump = scanner::spawn_event_pump(self.adapter.clone(), self.event_sender.clone());

        while let Some(event) = self.event_receiver.recv().await {
            let actions = self.controller.handle_event(event);
            for action in actions {
                self.execute(action).await;
            }
            if self.controller.phase().is_terminal() {
                break;
            }
        }

        // Report completions that raced the final transition.
        while let Ok(event) = self.event_receiver.try_recv() {
            let _ = self.controller.handle_event(event);
        }

        pump.abort();
        info!("Blinker stopped");
        Ok(())
    }

    async fn execute(&mut self, action: Action<Peripheral, Characteristic>) {
        match action {
            Action::StartScan => {
                if let Err(e) = self.scanner.start().await {
                    error!("Failed to start scan: {e:#}");
                }
            }
            Action::StopScan => {
                if let Err(e) = self.scanner.stop().await {
                    error!("Failed to stop scan: {e:#}");
                }
            }
            Action::Connect(device) => self.connection.connect(device),
            Action::DiscoverServices(device) => self.connection.discover_services(device),
            Action::Write {
                device,
                characteristic,
                payload,
            } => {
                self.connection
                    .write(&device, &characteristic, &payload)
                    .await;
            }
            Action::ScheduleTick => {
                // One-shot timer; the controller reschedules itself while
                // toggles remain.
                let sender = self.event_sender.clone();
                let delay = self.blink_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(Event::Tick);
                });
            }
        }
    }
}
