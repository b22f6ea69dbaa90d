//! LED blink controller state machine.
//!
//! `BlinkController` owns no I/O. It consumes [`BlinkerEvent`]s delivered by
//! the bluetooth service over a single channel and answers with [`Action`]s
//! for the service to execute, so every transition can be exercised in tests
//! with plain handle types.

use crate::domain::models::{Action, BlinkerEvent, Fault, RadioState};
use std::mem;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Static configuration for one blink run.
#[derive(Debug, Clone)]
pub struct BlinkConfig {
    /// Advertised name to connect to. `None` means log discoveries only.
    pub target_name: Option<String>,
    /// UUID of the LED control characteristic.
    pub led_characteristic: Uuid,
    pub on_command: Vec<u8>,
    pub off_command: Vec<u8>,
    /// Number of toggles before the controller finishes.
    pub blink_count: u32,
}

/// Controller phase. Handles only exist in the phases where they are valid:
/// the peripheral from `Connecting` onward, the characteristic in `Ready`.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase<D, C> {
    Idle,
    Scanning,
    Connecting {
        device: D,
    },
    ServiceDiscovery {
        device: D,
    },
    CharacteristicDiscovery {
        device: D,
    },
    Ready {
        device: D,
        characteristic: C,
        light_on: bool,
        remaining: u32,
    },
    Finished,
    Unavailable(RadioState),
}

impl<D, C> Phase<D, C> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Unavailable(_))
    }
}

pub struct BlinkController<D, C> {
    config: BlinkConfig,
    phase: Phase<D, C>,
}

impl<D: Clone, C: Clone> BlinkController<D, C> {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> &Phase<D, C> {
        &self.phase
    }

    /// Apply one event and return the side effects to perform.
    pub fn handle_event(&mut self, event: BlinkerEvent<D, C>) -> Vec<Action<D, C>> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        match event {
            BlinkerEvent::Radio(RadioState::PoweredOn) => self.on_powered_on(),
            BlinkerEvent::Radio(state) => self.on_radio_unavailable(state),
            BlinkerEvent::Advertisement { device, name, rssi } => {
                self.on_advertisement(device, name, rssi)
            }
            BlinkerEvent::Connected => self.on_connected(),
            BlinkerEvent::ConnectionFailed(reason) => {
                warn!("{}", Fault::ConnectionFailed(reason));
                Vec::new()
            }
            BlinkerEvent::Disconnected => {
                // No reconnection in this demo; just note it. Disconnects of
                // unrelated devices seen while scanning stay at debug.
                if matches!(self.phase, Phase::Idle | Phase::Scanning) {
                    debug!("Unrelated peripheral disconnected");
                } else {
                    info!("Peripheral disconnected");
                }
                Vec::new()
            }
            BlinkerEvent::ServicesDiscovered(count) => self.on_services_discovered(count),
            BlinkerEvent::CharacteristicsDiscovered(characteristics) => {
                self.on_characteristics_discovered(characteristics)
            }
            BlinkerEvent::WriteCompleted(result) => {
                match result {
                    Ok(()) => debug!("Write completed"),
                    Err(reason) => warn!("{}", Fault::WriteFailed(reason)),
                }
                Vec::new()
            }
            BlinkerEvent::Tick => self.on_tick(),
        }
    }

    fn on_powered_on(&mut self) -> Vec<Action<D, C>> {
        if !matches!(self.phase, Phase::Idle) {
            debug!("Radio powered on, already past Idle");
            return Vec::new();
        }

        info!("BLE is now powered on");
        match &self.config.target_name {
            Some(name) => info!("Looking for \"{name}\""),
            None => warn!("Set target_peripheral_name to connect; discovery logging only"),
        }

        self.phase = Phase::Scanning;
        vec![Action::StartScan]
    }

    fn on_radio_unavailable(&mut self, state: RadioState) -> Vec<Action<D, C>> {
        warn!("{}", Fault::RadioUnavailable(state));
        let was_scanning = matches!(self.phase, Phase::Scanning);
        self.phase = Phase::Unavailable(state);
        if was_scanning {
            vec![Action::StopScan]
        } else {
            Vec::new()
        }
    }

    fn on_advertisement(
        &mut self,
        device: D,
        name: Option<String>,
        rssi: Option<i16>,
    ) -> Vec<Action<D, C>> {
        if !matches!(self.phase, Phase::Scanning) {
            return Vec::new();
        }

        // Unnamed advertisements carry nothing to match against.
        let Some(name) = name else {
            return Vec::new();
        };

        info!("Found \"{name}\" (RSSI: {rssi:?})");

        if self.config.target_name.as_deref() != Some(name.as_str()) {
            return Vec::new();
        }

        info!("Connecting to \"{name}\"");
        self.phase = Phase::Connecting {
            device: device.clone(),
        };
        vec![Action::StopScan, Action::Connect(device)]
    }

    fn on_connected(&mut self) -> Vec<Action<D, C>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connecting { device } => {
                info!("Connected, discovering services");
                self.phase = Phase::ServiceDiscovery {
                    device: device.clone(),
                };
                vec![Action::DiscoverServices(device)]
            }
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    fn on_services_discovered(&mut self, count: usize) -> Vec<Action<D, C>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::ServiceDiscovery { device } => {
                if count == 0 {
                    warn!("{}", Fault::DiscoveryEmpty("services"));
                    self.phase = Phase::ServiceDiscovery { device };
                } else {
                    info!("Discovered {count} services");
                    self.phase = Phase::CharacteristicDiscovery { device };
                }
            }
            other => self.phase = other,
        }
        Vec::new()
    }

    fn on_characteristics_discovered(
        &mut self,
        characteristics: Vec<(C, Uuid)>,
    ) -> Vec<Action<D, C>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::CharacteristicDiscovery { device } => {
                if characteristics.is_empty() {
                    warn!("{}", Fault::DiscoveryEmpty("characteristics"));
                    self.phase = Phase::CharacteristicDiscovery { device };
                    return Vec::new();
                }

                // First match wins; remaining services are ignored.
                let matched = characteristics
                    .into_iter()
                    .find(|(_, uuid)| *uuid == self.config.led_characteristic);

                match matched {
                    Some((characteristic, _)) => {
                        info!("Set LED characteristic");
                        if self.config.blink_count == 0 {
                            self.phase = Phase::Finished;
                            Vec::new()
                        } else {
                            self.phase = Phase::Ready {
                                device,
                                characteristic,
                                light_on: false,
                                remaining: self.config.blink_count,
                            };
                            vec![Action::ScheduleTick]
                        }
                    }
                    None => {
                        self.phase = Phase::CharacteristicDiscovery { device };
                        Vec::new()
                    }
                }
            }
            other => {
                self.phase = other;
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self) -> Vec<Action<D, C>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Ready {
                device,
                characteristic,
                light_on,
                remaining,
            } => {
                info!("Toggling LED");
                let payload = if light_on {
                    self.config.off_command.clone()
                } else {
                    self.config.on_command.clone()
                };

                let mut actions = vec![Action::Write {
                    device: device.clone(),
                    characteristic: characteristic.clone(),
                    payload,
                }];

                let remaining = remaining - 1;
                if remaining > 0 {
                    self.phase = Phase::Ready {
                        device,
                        characteristic,
                        light_on: !light_on,
                        remaining,
                    };
                    actions.push(Action::ScheduleTick);
                } else {
                    info!("Blink sequence complete");
                    self.phase = Phase::Finished;
                }
                actions
            }
            other => {
                // A stale tick after the chain ended is harmless.
                self.phase = other;
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestController = BlinkController<u32, &'static str>;
    type TestEvent = BlinkerEvent<u32, &'static str>;
    type TestAction = Action<u32, &'static str>;

    const LED_UUID: Uuid = Uuid::from_u128(0x2413b43f_707f_90bd_2045_2ab8807571b7);
    const OTHER_UUID: Uuid = Uuid::from_u128(0xdeadbeef_0000_0000_0000_000000000000);

    fn controller(target: Option<&str>, blink_count: u32) -> TestController {
        BlinkController::new(BlinkConfig {
            target_name: target.map(String::from),
            led_characteristic: LED_UUID,
            on_command: vec![0x54, 0x09, 0x00],
            off_command: vec![0x55],
            blink_count,
        })
    }

    fn advertisement(device: u32, name: &str) -> TestEvent {
        BlinkerEvent::Advertisement {
            device,
            name: Some(name.to_string()),
            rssi: Some(-60),
        }
    }

    /// Drive a controller all the way to Ready with one service that carries
    /// the LED characteristic.
    fn ready_controller(blink_count: u32) -> TestController {
        let mut c = controller(Some("demo"), blink_count);
        assert_eq!(
            c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn)),
            vec![TestAction::StartScan]
        );
        assert_eq!(
            c.handle_event(advertisement(7, "demo")),
            vec![TestAction::StopScan, TestAction::Connect(7)]
        );
        assert_eq!(
            c.handle_event(BlinkerEvent::Connected),
            vec![TestAction::DiscoverServices(7)]
        );
        c.handle_event(BlinkerEvent::ServicesDiscovered(1));
        let actions =
            c.handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![("led", LED_UUID)]));
        assert_eq!(actions, vec![TestAction::ScheduleTick]);
        c
    }

    fn written_payloads(actions: &[TestAction]) -> Vec<Vec<u8>> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Write { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn connects_only_to_first_matching_name() {
        let mut c = controller(Some("demo"), 2);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));

        assert_eq!(c.handle_event(advertisement(1, "other")), vec![]);
        assert_eq!(
            c.handle_event(advertisement(2, "demo")),
            vec![TestAction::StopScan, TestAction::Connect(2)]
        );
        // A second match while connecting must not preempt the first.
        assert_eq!(c.handle_event(advertisement(3, "demo")), vec![]);
        assert_eq!(
            c.phase(),
            &Phase::Connecting { device: 2 },
            "first match stays the connection target"
        );
    }

    #[test]
    fn unnamed_advertisements_are_ignored() {
        let mut c = controller(Some("demo"), 1);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        let actions = c.handle_event(BlinkerEvent::Advertisement {
            device: 1,
            name: None,
            rssi: None,
        });
        assert!(actions.is_empty());
        assert_eq!(c.phase(), &Phase::Scanning);
    }

    #[test]
    fn without_target_name_never_connects() {
        let mut c = controller(None, 5);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        assert_eq!(c.handle_event(advertisement(1, "demo")), vec![]);
        assert_eq!(c.handle_event(advertisement(2, "anything")), vec![]);
        assert_eq!(c.phase(), &Phase::Scanning);
    }

    #[test]
    fn commands_alternate_starting_with_on() {
        let mut c = ready_controller(4);
        let mut payloads = Vec::new();
        for _ in 0..4 {
            payloads.extend(written_payloads(&c.handle_event(BlinkerEvent::Tick)));
        }
        assert_eq!(
            payloads,
            vec![
                vec![0x54, 0x09, 0x00],
                vec![0x55],
                vec![0x54, 0x09, 0x00],
                vec![0x55],
            ]
        );
    }

    #[test]
    fn stops_after_blink_count_toggles() {
        let mut c = ready_controller(3);
        for _ in 0..3 {
            let actions = c.handle_event(BlinkerEvent::Tick);
            assert_eq!(written_payloads(&actions).len(), 1);
        }
        assert_eq!(c.phase(), &Phase::Finished);

        // Stale ticks after the chain ended must not write.
        for _ in 0..5 {
            assert!(c.handle_event(BlinkerEvent::Tick).is_empty());
        }
    }

    #[test]
    fn last_toggle_does_not_reschedule() {
        let mut c = ready_controller(1);
        let actions = c.handle_event(BlinkerEvent::Tick);
        assert_eq!(written_payloads(&actions).len(), 1);
        assert!(!actions.contains(&TestAction::ScheduleTick));
        assert_eq!(c.phase(), &Phase::Finished);
    }

    #[test]
    fn zero_services_reports_and_stays_put() {
        let mut c = controller(Some("demo"), 2);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        c.handle_event(advertisement(1, "demo"));
        c.handle_event(BlinkerEvent::Connected);

        assert!(c.handle_event(BlinkerEvent::ServicesDiscovered(0)).is_empty());
        assert_eq!(c.phase(), &Phase::ServiceDiscovery { device: 1 });
        assert!(c.handle_event(BlinkerEvent::Tick).is_empty());
    }

    #[test]
    fn missing_characteristic_never_blinks() {
        let mut c = controller(Some("demo"), 2);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        c.handle_event(advertisement(1, "demo"));
        c.handle_event(BlinkerEvent::Connected);
        c.handle_event(BlinkerEvent::ServicesDiscovered(2));

        let actions =
            c.handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![("x", OTHER_UUID)]));
        assert!(actions.is_empty());
        assert_eq!(c.phase(), &Phase::CharacteristicDiscovery { device: 1 });
        assert!(c.handle_event(BlinkerEvent::Tick).is_empty());
    }

    #[test]
    fn characteristic_match_in_later_service() {
        let mut c = controller(Some("demo"), 1);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        c.handle_event(advertisement(1, "demo"));
        c.handle_event(BlinkerEvent::Connected);
        c.handle_event(BlinkerEvent::ServicesDiscovered(2));

        assert!(c
            .handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![("x", OTHER_UUID)]))
            .is_empty());
        let actions = c.handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![
            ("y", OTHER_UUID),
            ("led", LED_UUID),
        ]));
        assert_eq!(actions, vec![TestAction::ScheduleTick]);
    }

    #[test]
    fn radio_off_cancels_scan_and_is_terminal() {
        let mut c = controller(Some("demo"), 2);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));

        let actions = c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOff));
        assert_eq!(actions, vec![TestAction::StopScan]);
        assert!(c.phase().is_terminal());

        // Nothing resumes after the radio goes away.
        assert!(c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn)).is_empty());
        assert!(c.handle_event(advertisement(1, "demo")).is_empty());
    }

    #[test]
    fn radio_unavailable_outside_scan_does_not_stop_scan() {
        let mut c = controller(Some("demo"), 2);
        let actions = c.handle_event(BlinkerEvent::Radio(RadioState::Unsupported));
        assert!(actions.is_empty());
        assert_eq!(c.phase(), &Phase::Unavailable(RadioState::Unsupported));
    }

    #[test]
    fn disconnect_produces_no_transition() {
        let mut c = ready_controller(2);
        assert!(c.handle_event(BlinkerEvent::Disconnected).is_empty());
        // The toggle chain keeps going, matching the source's behavior.
        assert_eq!(written_payloads(&c.handle_event(BlinkerEvent::Tick)).len(), 1);
    }

    #[test]
    fn write_failure_does_not_stop_the_chain() {
        let mut c = ready_controller(2);
        c.handle_event(BlinkerEvent::Tick);
        assert!(c
            .handle_event(BlinkerEvent::WriteCompleted(Err("gatt error".into())))
            .is_empty());
        assert_eq!(written_payloads(&c.handle_event(BlinkerEvent::Tick)).len(), 1);
        assert_eq!(c.phase(), &Phase::Finished);
    }

    #[test]
    fn zero_blink_count_finishes_without_writing() {
        let mut c = controller(Some("demo"), 0);
        c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn));
        c.handle_event(advertisement(1, "demo"));
        c.handle_event(BlinkerEvent::Connected);
        c.handle_event(BlinkerEvent::ServicesDiscovered(1));
        let actions =
            c.handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![("led", LED_UUID)]));
        assert!(actions.is_empty());
        assert_eq!(c.phase(), &Phase::Finished);
    }

    /// End-to-end scenario: target "demo", two toggles, a non-matching
    /// advertisement first.
    #[test]
    fn demo_scenario_two_toggles() {
        let mut c = controller(Some("demo"), 2);

        assert_eq!(
            c.handle_event(BlinkerEvent::Radio(RadioState::PoweredOn)),
            vec![TestAction::StartScan]
        );
        assert!(c.handle_event(advertisement(1, "other")).is_empty());
        assert_eq!(
            c.handle_event(advertisement(2, "demo")),
            vec![TestAction::StopScan, TestAction::Connect(2)]
        );
        assert_eq!(
            c.handle_event(BlinkerEvent::Connected),
            vec![TestAction::DiscoverServices(2)]
        );
        c.handle_event(BlinkerEvent::ServicesDiscovered(1));
        assert_eq!(
            c.handle_event(BlinkerEvent::CharacteristicsDiscovered(vec![("led", LED_UUID)])),
            vec![TestAction::ScheduleTick]
        );

        let first = c.handle_event(BlinkerEvent::Tick);
        assert_eq!(written_payloads(&first), vec![vec![0x54, 0x09, 0x00]]);
        assert!(first.contains(&TestAction::ScheduleTick));

        let second = c.handle_event(BlinkerEvent::Tick);
        assert_eq!(written_payloads(&second), vec![vec![0x55]]);
        assert!(!second.contains(&TestAction::ScheduleTick));

        assert_eq!(c.phase(), &Phase::Finished);
        assert!(c.handle_event(BlinkerEvent::Tick).is_empty());
    }
}
