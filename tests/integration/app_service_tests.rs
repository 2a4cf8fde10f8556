//! Integration tests for the AppService → pipelines → pump FSM → relay chain.
//!
//! These run on the host (x86_64) and drive whole control cycles against
//! simulated tanks, a manual clock and a recording relay.

use crate::mock_hw::{ManualClock, MemConfigStore, RecordingRelay, RecordingSink, SimTank};

use tankwatch::app::commands::AppCommand;
use tankwatch::app::events::AppEvent;
use tankwatch::app::ports::ConfigPort;
use tankwatch::app::service::AppService;
use tankwatch::config::{CalibrationPair, PumpMode, SystemConfig, TankMode};
use tankwatch::error::{AppError, ConfigError, PumpFault, SensorError};
use tankwatch::fsm::PumpState;
use tankwatch::sensors::TankId;

type App = AppService<SimTank, RecordingRelay, ManualClock>;

struct Rig {
    app: App,
    clock: ManualClock,
    tank1: SimTank,
    tank2: SimTank,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: SystemConfig) -> Self {
        let clock = ManualClock::new();
        let tank1 = SimTank::new(&clock, 100.0);
        let tank2 = SimTank::new(&clock, 100.0);
        let t2 = config.is_dual().then(|| tank2.clone());
        let mut app = AppService::new(
            config,
            tank1.clone(),
            t2,
            RecordingRelay::default(),
            clock.clone(),
        );
        let mut sink = RecordingSink::new();
        app.start(&mut sink);
        Self {
            app,
            clock,
            tank1,
            tank2,
            sink,
        }
    }

    fn tick(&mut self) -> PumpState {
        self.app.tick(&mut self.sink);
        self.app.pump_state()
    }

    fn command(&mut self, cmd: AppCommand) -> Result<(), AppError> {
        self.app.handle_command(cmd, &mut self.sink)
    }

    fn relay(&self) -> &RecordingRelay {
        self.app.pump().actuator()
    }
}

fn auto_config() -> SystemConfig {
    let mut cfg = SystemConfig::default();
    cfg.pump.mode = PumpMode::Automatic;
    cfg
}

fn dual_auto_config() -> SystemConfig {
    let mut cfg = auto_config();
    cfg.tank_mode = TankMode::Dual;
    cfg
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_releases_relay_and_reports_off() {
    let rig = Rig::new(SystemConfig::default());
    assert_eq!(rig.relay().writes, vec![false]);
    assert!(matches!(
        rig.sink.events.as_slice(),
        [AppEvent::Started(PumpState::Off)]
    ));
}

// ── Automatic fill cycle ──────────────────────────────────────

#[test]
fn automatic_fill_cycle() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.set_percent(10.0);

    assert_eq!(rig.tick(), PumpState::On);
    assert!(rig.relay().energized());

    // Full, but the minimum run time has not elapsed yet.
    rig.tank1.set_percent(95.0);
    rig.clock.advance_secs(5);
    assert_eq!(rig.tick(), PumpState::On);

    rig.clock.advance_secs(6);
    assert_eq!(rig.tick(), PumpState::Cooldown);
    assert!(!rig.relay().energized());

    // Low again, but cooldown blocks a restart.
    rig.tank1.set_percent(10.0);
    rig.clock.advance_secs(30);
    assert_eq!(rig.tick(), PumpState::Cooldown);

    rig.clock.advance_secs(31);
    assert_eq!(rig.tick(), PumpState::Off);
    assert_eq!(rig.tick(), PumpState::On);

    // One write per relay intent change.
    assert_eq!(rig.relay().writes, vec![false, true, false, true]);
}

#[test]
fn tick_emits_state_change_then_telemetry() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.set_percent(10.0);
    rig.sink.take();
    rig.tick();

    let events = rig.sink.take();
    assert!(matches!(
        events.as_slice(),
        [
            AppEvent::StateChanged {
                from: PumpState::Off,
                to: PumpState::On
            },
            AppEvent::Telemetry(_)
        ]
    ));
}

#[test]
fn level_between_thresholds_holds_state() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.set_percent(50.0);
    for _ in 0..5 {
        rig.clock.advance_secs(5);
        assert_eq!(rig.tick(), PumpState::Off);
    }
}

// ── Run-time limits ───────────────────────────────────────────

#[test]
fn max_run_time_latches_error_until_reset() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.set_percent(10.0);
    assert_eq!(rig.tick(), PumpState::On);

    rig.clock.advance_secs(3600);
    rig.sink.take();
    assert_eq!(rig.tick(), PumpState::Error);
    assert!(!rig.relay().energized());
    let events = rig.sink.take();
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::EmergencyStop(PumpFault::MaxRunTimeExceeded))));
    assert_eq!(
        rig.app.build_telemetry().last_error,
        Some("Maximum run time exceeded")
    );

    // Latched: neither the low level nor a manual request restarts it.
    rig.clock.advance_secs(120);
    assert_eq!(rig.tick(), PumpState::Error);
    assert_eq!(
        rig.command(AppCommand::PumpOn),
        Err(AppError::Pump(PumpFault::LatchedError))
    );
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::CommandRejected(PumpFault::LatchedError))));

    rig.command(AppCommand::ResetFault).unwrap();
    assert_eq!(rig.app.pump_state(), PumpState::Off);
    assert_eq!(rig.tick(), PumpState::On);
}

#[test]
fn manual_run_hits_safety_limit() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.tank1.set_percent(50.0);
    rig.tick();
    rig.command(AppCommand::PumpOn).unwrap();

    rig.clock.advance_secs(3600);
    assert_eq!(rig.tick(), PumpState::Error);
    assert_eq!(
        rig.app.pump().last_error(),
        Some(PumpFault::SafetyLimitReached)
    );

    // Switching to manual clears the latch; the reason stays reported.
    rig.command(AppCommand::SetMode(PumpMode::Manual)).unwrap();
    assert_eq!(rig.app.pump_state(), PumpState::Off);
    assert_eq!(
        rig.app.build_telemetry().last_error,
        Some("Safety limit reached")
    );
}

// ── Manual control ────────────────────────────────────────────

#[test]
fn manual_mode_ignores_level() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.tank1.set_percent(95.0);
    rig.tick();

    rig.command(AppCommand::PumpOn).unwrap();
    assert!(rig.relay().energized());

    rig.clock.advance_secs(30);
    assert_eq!(rig.tick(), PumpState::On);

    rig.command(AppCommand::PumpOff).unwrap();
    assert_eq!(rig.app.pump_state(), PumpState::Cooldown);
    assert!(!rig.relay().energized());

    assert_eq!(
        rig.command(AppCommand::PumpOn),
        Err(AppError::Pump(PumpFault::InCooldown))
    );
    assert_eq!(
        rig.command(AppCommand::PumpOff),
        Err(AppError::Pump(PumpFault::NotRunning))
    );
    assert_eq!(rig.relay().writes, vec![false, true, false]);
}

#[test]
fn manual_start_blocked_by_dry_source() {
    let mut cfg = SystemConfig::default();
    cfg.tank_mode = TankMode::Dual;
    let mut rig = Rig::new(cfg);
    rig.tank1.set_percent(50.0);
    rig.tank2.set_percent(2.0);
    rig.tick();

    assert_eq!(
        rig.command(AppCommand::PumpOn),
        Err(AppError::Pump(PumpFault::SourceTooLow))
    );
    assert_eq!(rig.app.pump_state(), PumpState::Off);
    assert!(!rig.relay().energized());
}

// ── Dual tank / dry-run protection ────────────────────────────

#[test]
fn source_running_dry_stops_pump() {
    let mut rig = Rig::new(dual_auto_config());
    rig.tank1.set_percent(10.0);
    rig.tank2.set_percent(50.0);
    assert_eq!(rig.tick(), PumpState::On);

    rig.tank2.set_percent(3.0);
    rig.clock.advance_secs(5);
    assert_eq!(rig.tick(), PumpState::Error);
    assert!(!rig.relay().energized());
    assert_eq!(rig.app.pump().last_error(), Some(PumpFault::SourceTooLow));
}

#[test]
fn dry_source_prevents_auto_start() {
    let mut rig = Rig::new(dual_auto_config());
    rig.tank1.set_percent(10.0);
    rig.tank2.set_percent(3.0);
    for _ in 0..3 {
        assert_eq!(rig.tick(), PumpState::Off);
    }
}

#[test]
fn failed_source_reading_uses_last_good_level() {
    let mut rig = Rig::new(dual_auto_config());
    rig.tank1.set_percent(10.0);
    rig.tank2.set_percent(60.0);
    assert_eq!(rig.tick(), PumpState::On);

    rig.tank2.fail(SensorError::Timeout);
    rig.clock.advance_secs(5);
    assert_eq!(rig.tick(), PumpState::On);

    let t = rig.app.build_telemetry();
    let tank2 = t.tank2.expect("dual mode reports tank 2");
    assert!(!tank2.valid);
    assert_eq!(tank2.error, Some(SensorError::Timeout));
    assert!(tank2.last_good_percent.is_some());
}

#[test]
fn source_never_read_counts_as_empty() {
    let mut rig = Rig::new(dual_auto_config());
    rig.tank1.set_percent(10.0);
    rig.tank2.fail(SensorError::Timeout);
    for _ in 0..3 {
        assert_eq!(rig.tick(), PumpState::Off);
    }
}

// ── Sensor failures ───────────────────────────────────────────

#[test]
fn invalid_level_neither_starts_nor_stops() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.fail(SensorError::Timeout);
    assert_eq!(rig.tick(), PumpState::Off);

    rig.tank1.set_percent(10.0);
    assert_eq!(rig.tick(), PumpState::On);

    // Sensor drops out while running: the pump keeps running...
    rig.tank1.fail(SensorError::OutOfRange);
    rig.clock.advance_secs(20);
    assert_eq!(rig.tick(), PumpState::On);

    // ...but the run-time limit still applies.
    rig.clock.advance_secs(3600);
    assert_eq!(rig.tick(), PumpState::Error);
}

#[test]
fn sensor_health_edges_are_reported() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.tank1.set_percent(50.0);
    rig.tick();

    rig.tank1.fail(SensorError::Timeout);
    for _ in 0..4 {
        rig.tick();
    }
    assert!(!rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::SensorHealth { .. })));

    rig.tick();
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::SensorHealth {
            tank: TankId::Tank1,
            healthy: false
        }
    )));
    assert!(!rig.app.tank1().is_healthy());

    let t = rig.app.build_telemetry();
    assert!(!t.tank1.valid);
    assert!(!t.tank1.healthy);
    let last_good = t.tank1.last_good_percent.expect("one good reading");
    assert!((last_good - 50.0).abs() < 0.1);

    rig.sink.take();
    rig.tank1.set_percent(50.0);
    rig.tick();
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::SensorHealth {
            tank: TankId::Tank1,
            healthy: true
        }
    )));
}

#[test]
fn acquisition_takes_configured_sample_count() {
    let mut cfg = SystemConfig::default();
    cfg.sensor.sample_count = 7;
    let mut rig = Rig::new(cfg);
    rig.tick();
    assert_eq!(rig.tank1.measurements.get(), 7);
    // Single mode never touches the second sensor.
    assert_eq!(rig.tank2.measurements.get(), 0);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn calibration_change_is_applied_and_auto_saved() {
    let mut rig = Rig::new(SystemConfig::default());
    let store = MemConfigStore::new();
    let calib = CalibrationPair::new(150.0, 20.0).unwrap();

    rig.command(AppCommand::SetCalibration {
        tank: TankId::Tank1,
        calibration: calib,
    })
    .unwrap();
    assert_eq!(rig.app.tank1().calibration(), calib);
    assert!(rig.app.is_config_dirty());

    rig.clock.advance_secs(1);
    assert!(!rig.app.auto_save_if_needed(&store));
    rig.clock.advance_secs(5);
    assert!(rig.app.auto_save_if_needed(&store));
    assert!(!rig.app.auto_save_if_needed(&store));

    assert_eq!(store.saves.get(), 1);
    assert_eq!(store.load().unwrap().tank1.calibration, calib);
}

#[test]
fn invalid_calibration_is_rejected() {
    let mut rig = Rig::new(SystemConfig::default());
    let bad = CalibrationPair {
        empty_cm: 10.0,
        full_cm: 200.0,
    };
    let r = rig.command(AppCommand::SetCalibration {
        tank: TankId::Tank1,
        calibration: bad,
    });
    assert!(matches!(
        r,
        Err(AppError::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(rig.app.config().tank1.calibration, CalibrationPair::default());
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn runtime_config_switches_to_automatic() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.tank1.set_percent(10.0);
    assert_eq!(rig.tick(), PumpState::Off);

    rig.command(AppCommand::UpdateConfig(Box::new(auto_config())))
        .unwrap();
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ConfigApplied)));
    assert_eq!(rig.app.pump().mode(), PumpMode::Automatic);
    assert_eq!(rig.tick(), PumpState::On);
}

#[test]
fn invalid_runtime_config_changes_nothing() {
    let mut rig = Rig::new(SystemConfig::default());
    let mut cfg = auto_config();
    cfg.pump.thresholds.auto_on_threshold = 95.0;

    let r = rig.command(AppCommand::UpdateConfig(Box::new(cfg)));
    assert!(matches!(
        r,
        Err(AppError::Config(ConfigError::ValidationFailed(_)))
    ));
    assert_eq!(rig.app.config(), &SystemConfig::default());
    assert_eq!(rig.app.pump().mode(), PumpMode::Manual);
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn explicit_save_flushes_on_next_check() {
    let mut rig = Rig::new(SystemConfig::default());
    let store = MemConfigStore::new();
    // Well inside the auto-save debounce window.
    rig.clock.advance_secs(1);
    rig.command(AppCommand::SaveConfig).unwrap();
    assert!(rig.app.auto_save_if_needed(&store));
    assert_eq!(store.stored(), Some(SystemConfig::default()));
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_serializes_to_json() {
    let mut rig = Rig::new(auto_config());
    rig.tank1.set_percent(10.0);
    rig.tick();

    let json = rig.app.build_telemetry().to_json().unwrap();
    assert!(json.contains("\"pump_state\":\"ON\""), "{json}");
    assert!(json.contains("\"pump_mode\":\"Automatic\""), "{json}");
    assert!(json.contains("\"tank2\":null"), "{json}");
}
