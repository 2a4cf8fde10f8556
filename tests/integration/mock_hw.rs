//! Mock hardware adapters for integration tests.
//!
//! The tank and clock mocks hand out shared handles so a test can move the
//! water level or the clock after the adapters have been moved into the
//! service.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tankwatch::app::events::AppEvent;
use tankwatch::app::ports::{ActuatorPort, ClockPort, ConfigPort, EventSink};
use tankwatch::config::SystemConfig;
use tankwatch::error::{ConfigError, SensorError};
use tankwatch::sensors::pulse_timer::RangeFinder;

// ── ManualClock ───────────────────────────────────────────────

/// Test clock; cloned handles share one time base.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms * 1000);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }
}

impl ClockPort for ManualClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

// ── SimTank ───────────────────────────────────────────────────

/// Ultrasonic sensor over a simulated tank.  Every measurement returns the
/// current distance (or failure); inter-sample pauses advance the clock.
#[derive(Debug, Clone)]
pub struct SimTank {
    distance: Rc<Cell<Result<f32, SensorError>>>,
    clock: ManualClock,
    pub measurements: Rc<Cell<u32>>,
}

impl SimTank {
    pub fn new(clock: &ManualClock, distance_cm: f32) -> Self {
        Self {
            distance: Rc::new(Cell::new(Ok(distance_cm))),
            clock: clock.clone(),
            measurements: Rc::new(Cell::new(0)),
        }
    }

    pub fn set_distance(&self, distance_cm: f32) {
        self.distance.set(Ok(distance_cm));
    }

    /// Distance for a fill level under the default 200/10 cm calibration.
    pub fn set_percent(&self, percent: f32) {
        self.set_distance(200.0 - percent / 100.0 * 190.0);
    }

    pub fn fail(&self, error: SensorError) {
        self.distance.set(Err(error));
    }
}

impl RangeFinder for SimTank {
    fn measure(&mut self) -> Result<f32, SensorError> {
        self.measurements.set(self.measurements.get() + 1);
        self.distance.get()
    }

    fn pause_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }

    fn set_timeout_us(&mut self, _timeout_us: u32) {}
}

// ── RecordingRelay ────────────────────────────────────────────

/// Records every write to the pump relay.
#[derive(Debug, Default)]
pub struct RecordingRelay {
    pub writes: Vec<bool>,
}

impl RecordingRelay {
    pub fn energized(&self) -> bool {
        self.writes.last().copied().unwrap_or(false)
    }
}

impl ActuatorPort for RecordingRelay {
    fn set_actuator(&mut self, energized: bool) {
        self.writes.push(energized);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MemConfigStore ────────────────────────────────────────────

/// In-memory [`ConfigPort`] that counts saves.
#[derive(Debug, Default)]
pub struct MemConfigStore {
    stored: RefCell<Option<SystemConfig>>,
    pub saves: Cell<u32>,
}

impl MemConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Option<SystemConfig> {
        self.stored.borrow().clone()
    }
}

impl ConfigPort for MemConfigStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.stored.borrow_mut() = Some(config.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
