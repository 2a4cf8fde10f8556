//! Application service — the hexagonal core.
//!
//! [`AppService`] owns one acquisition pipeline per tank and the pump
//! controller, and runs them as a single periodic cycle.  All I/O flows
//! through port traits, making the whole service testable with mock
//! adapters.
//!
//! ```text
//!  RangeFinder ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!   (tank 1/2)     │          AppService          │
//!                  │  pipelines · pump controller │
//!  ActuatorPort ◀──│                              │ ◀──▶ ConfigPort
//!                  └──────────────────────────────┘
//! ```
//!
//! ## Invalid readings
//!
//! An invalid tank-1 reading never reaches the automatic start/stop
//! branch: the pump is only supervised (run-time and dry-run limits) for
//! that cycle.  In dual-tank mode an invalid source reading falls back to
//! the last valid source level, or to 0 % (unsafe) if there is none.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::control::pump::PumpController;
use crate::error::{AppError, ConfigError, PumpFault};
use crate::fsm::PumpState;
use crate::sensors::pipeline::DistanceAcquisitionPipeline;
use crate::sensors::pulse_timer::RangeFinder;
use crate::sensors::TankId;

use super::commands::AppCommand;
use super::events::{AppEvent, TankTelemetry, TelemetryData};
use super::ports::{ActuatorPort, ClockPort, ConfigPort, EventSink};

/// Delay between the last config change and the automatic save (ms).
pub const AUTO_SAVE_DELAY_MS: u64 = 5_000;

/// Source level assumed when no source tank is measured.
pub const SINGLE_TANK_SOURCE_PERCENT: f32 = 100.0;

/// Load the stored configuration, falling back to defaults when it is
/// missing, corrupted or invalid.
pub fn load_or_default(storage: &impl ConfigPort) -> SystemConfig {
    match storage.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<R, A, C> {
    config: SystemConfig,
    clock: C,
    tank1: DistanceAcquisitionPipeline<R, C>,
    /// Fitted source-tank sensor; only read in dual-tank mode.
    tank2: Option<DistanceAcquisitionPipeline<R, C>>,
    pump: PumpController<A, C>,
    cycle_count: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
    /// Explicit save pending; skips the debounce.
    save_requested: bool,
}

impl<R, A, C> AppService<R, A, C>
where
    R: RangeFinder,
    A: ActuatorPort,
    C: ClockPort + Clone,
{
    /// Construct the service.  `tank2` is the source-tank ranger, if
    /// fitted.
    ///
    /// Does **not** touch hardware. Call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, tank1: R, tank2: Option<R>, actuator: A, clock: C) -> Self {
        if config.is_dual() && tank2.is_none() {
            warn!("Dual-tank mode without a tank 2 sensor: source treated as empty");
        }
        let tank1 = DistanceAcquisitionPipeline::new(
            TankId::Tank1,
            tank1,
            clock.clone(),
            config.tank1.calibration,
            &config.sensor,
        );
        let tank2 = tank2.map(|r| {
            DistanceAcquisitionPipeline::new(
                TankId::Tank2,
                r,
                clock.clone(),
                config.tank2.calibration,
                &config.sensor,
            )
        });
        let pump = PumpController::new(actuator, clock.clone(), &config.pump);

        Self {
            config,
            clock,
            tank1,
            tank2,
            pump,
            cycle_count: 0,
            config_dirty: false,
            dirty_since_ms: 0,
            save_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Prepare sensors, release the relay and report the initial state.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        if let Err(e) = self.tank1.begin() {
            warn!("Tank1: sensor init failed: {}", e);
        }
        if let Some(t2) = self.tank2.as_mut() {
            if let Err(e) = t2.begin() {
                warn!("Tank2: sensor init failed: {}", e);
            }
        }
        self.pump.begin();
        sink.emit(&AppEvent::Started(self.pump.state()));
        info!(
            "AppService started ({:?} tank mode, pump {:?})",
            self.config.tank_mode,
            self.pump.mode()
        );
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full cycle: acquire → pump update → telemetry.
    ///
    /// Blocks for the duration of the acquisitions.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        self.cycle_count += 1;
        let prev_state = self.pump.state();

        // 1. Acquire
        let healthy_before = self.tank1.is_healthy();
        let reading = self.tank1.read_level();
        self.report_health(TankId::Tank1, healthy_before, self.tank1.is_healthy(), sink);

        let source = self.acquire_source(sink);

        // 2. Pump
        let result = match reading.level() {
            Some(level) => self.pump.update(level, source),
            None => self.pump.supervise(source),
        };
        if let Err(fault) = result {
            sink.emit(&AppEvent::EmergencyStop(fault));
        }
        self.emit_state_change(prev_state, sink);

        // 3. Telemetry
        sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Rejections are returned, not retried.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        sink: &mut impl EventSink,
    ) -> Result<(), AppError> {
        let prev_state = self.pump.state();
        let result = self.apply_command(cmd, sink);
        if let Err(AppError::Pump(fault)) = result {
            sink.emit(&AppEvent::CommandRejected(fault));
        }
        self.emit_state_change(prev_state, sink);
        result
    }

    fn apply_command(
        &mut self,
        cmd: AppCommand,
        sink: &mut impl EventSink,
    ) -> Result<(), AppError> {
        match cmd {
            AppCommand::PumpOn => self.pump.turn_on()?,
            AppCommand::PumpOff => self.pump.turn_off()?,
            AppCommand::SetMode(mode) => {
                self.pump.set_mode(mode);
                if self.config.pump.mode != mode {
                    self.config.pump.mode = mode;
                    self.mark_config_dirty();
                }
            }
            AppCommand::ResetFault => {
                if !self.pump.reset_fault() {
                    info!("Reset requested with no latched fault");
                }
            }
            AppCommand::SetThresholds { on, off } => {
                self.pump.set_thresholds(on, off)?;
                self.config.pump.thresholds.auto_on_threshold = on;
                self.config.pump.thresholds.auto_off_threshold = off;
                self.mark_config_dirty();
            }
            AppCommand::SetCalibration { tank, calibration } => {
                match tank {
                    TankId::Tank1 => {
                        self.tank1.set_calibration(calibration)?;
                        self.config.tank1.calibration = calibration;
                    }
                    TankId::Tank2 => {
                        let t2 = self.tank2.as_mut().ok_or(ConfigError::ValidationFailed(
                            "tank 2 sensor not fitted",
                        ))?;
                        t2.set_calibration(calibration)?;
                        self.config.tank2.calibration = calibration;
                    }
                }
                self.mark_config_dirty();
            }
            AppCommand::UpdateConfig(new_config) => {
                self.apply_config(*new_config)?;
                sink.emit(&AppEvent::ConfigApplied);
            }
            AppCommand::SaveConfig => {
                self.mark_config_dirty();
                self.save_requested = true;
                info!("Explicit config save requested (flushes on next save check)");
            }
        }
        Ok(())
    }

    /// Validate and apply a complete configuration.  On error nothing
    /// changes.
    fn apply_config(&mut self, new: SystemConfig) -> Result<(), ConfigError> {
        new.validate()?;
        if new.is_dual() && self.tank2.is_none() {
            return Err(ConfigError::ValidationFailed(
                "dual mode requires a tank 2 sensor",
            ));
        }

        self.tank1.set_calibration(new.tank1.calibration)?;
        self.tank1.apply_tuning(&new.sensor);
        if let Some(t2) = self.tank2.as_mut() {
            if new.is_dual() {
                t2.set_calibration(new.tank2.calibration)?;
            }
            t2.apply_tuning(&new.sensor);
        }
        self.pump.apply_config(&new.pump)?;

        if new.tank1.trig_gpio != self.config.tank1.trig_gpio
            || new.tank1.echo_gpio != self.config.tank1.echo_gpio
            || new.tank2.trig_gpio != self.config.tank2.trig_gpio
            || new.tank2.echo_gpio != self.config.tank2.echo_gpio
            || new.pump.relay_gpio != self.config.pump.relay_gpio
        {
            info!("GPIO assignment changed; takes effect after restart");
        }

        self.config = new;
        self.mark_config_dirty();
        info!("Configuration updated at runtime");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the latest readings and pump status.
    pub fn build_telemetry(&self) -> TelemetryData {
        let status = self.pump.status();
        let tank2 = self
            .tank2
            .as_ref()
            .filter(|_| self.config.is_dual())
            .map(|t2| {
                TankTelemetry::new(TankId::Tank2, t2.latest(), t2.last_reading(), t2.is_healthy())
            });
        TelemetryData {
            uptime_ms: self.clock.now_ms(),
            tank1: TankTelemetry::new(
                TankId::Tank1,
                self.tank1.latest(),
                self.tank1.last_reading(),
                self.tank1.is_healthy(),
            ),
            tank2,
            pump_state: status.state,
            pump_mode: status.mode,
            run_time_ms: status.run_time_ms,
            cooldown_remaining_ms: status.cooldown_remaining_ms,
            last_error: status.last_error.map(PumpFault::as_str),
        }
    }

    pub fn pump_state(&self) -> PumpState {
        self.pump.state()
    }

    pub fn pump(&self) -> &PumpController<A, C> {
        &self.pump
    }

    pub fn tank1(&self) -> &DistanceAcquisitionPipeline<R, C> {
        &self.tank1
    }

    pub fn tank2(&self) -> Option<&DistanceAcquisitionPipeline<R, C>> {
        self.tank2.as_ref()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Cycles executed since startup.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn acquire_source(&mut self, sink: &mut impl EventSink) -> f32 {
        if !self.config.is_dual() {
            return SINGLE_TANK_SOURCE_PERCENT;
        }
        let Some(t2) = self.tank2.as_mut() else {
            return 0.0;
        };

        let healthy_before = t2.is_healthy();
        let reading = t2.read_level();
        let healthy_after = t2.is_healthy();
        let fallback = t2.last_reading().map(|r| r.level_percent);
        self.report_health(TankId::Tank2, healthy_before, healthy_after, sink);

        reading.level().unwrap_or_else(|| match fallback {
            Some(level) => {
                warn!("Tank2: invalid reading, using last good level {:.1}%", level);
                level
            }
            None => {
                warn!("Tank2: no valid reading yet, source treated as empty");
                0.0
            }
        })
    }

    fn report_health(
        &self,
        tank: TankId,
        before: bool,
        after: bool,
        sink: &mut impl EventSink,
    ) {
        if before != after {
            sink.emit(&AppEvent::SensorHealth {
                tank,
                healthy: after,
            });
        }
    }

    fn emit_state_change(&self, from: PumpState, sink: &mut impl EventSink) {
        let to = self.pump.state();
        if to != from {
            sink.emit(&AppEvent::StateChanged { from, to });
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.clock.now_ms();
        }
    }

    /// Save once the config has been stable for [`AUTO_SAVE_DELAY_MS`],
    /// or right away after an explicit save request.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let since = self.clock.now_ms().saturating_sub(self.dirty_since_ms);
        if !self.save_requested && since < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Save immediately if dirty (call before a planned restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                info!("Config force-saved");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
