use chrono::{DateTime, Duration, Utc};
use contracts::{Band, Drive, EngineConfig, TickReport, TriggerEvent, SCHEMA_VERSION_V1};
use tracing::info;

use crate::config::{validate_config, ConfigError};
use crate::drive::apply_tick;
use crate::gain::GainModel;
use crate::log::TriggerLog;
use crate::policy::{PolicyError, ThresholdPolicy};
use crate::registry::DriveRegistry;

/// Decides whether a band transition fires a trigger. Fires only on a rise
/// into `triggered` or above, so a drive sitting in a pressing band stays
/// quiet until it climbs further or drops out and climbs back. A fire
/// within the cooldown window is suppressed, escalations included.
pub fn evaluate_trigger(
    drive: &Drive,
    previous_band: Band,
    new_band: Band,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Option<TriggerEvent> {
    if !(new_band > previous_band && new_band.is_pressing()) {
        return None;
    }
    if let Some(last) = drive.last_triggered_at {
        if now.signed_duration_since(last) < cooldown {
            return None;
        }
    }
    Some(TriggerEvent::new(drive, new_band, now))
}

/// Advances every drive to `now` and fires rising-edge triggers into the log.
#[derive(Debug, Clone)]
pub struct TickEngine {
    policy: ThresholdPolicy,
    cooldown: Duration,
}

impl TickEngine {
    pub fn new(policy: ThresholdPolicy, cooldown: Duration) -> Self {
        Self { policy, cooldown }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let policy = validate_config(config)?;
        Ok(Self::new(policy, config.cooldown()))
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    /// One engine tick: per-drive accrual, classification, and trigger
    /// evaluation. Drives are independent; no drive's outcome reads another
    /// drive's state.
    pub fn tick_all(
        &self,
        registry: &mut DriveRegistry,
        log: &mut TriggerLog,
        gain: &dyn GainModel,
        now: DateTime<Utc>,
    ) -> Result<TickReport, PolicyError> {
        let mut fired = Vec::new();
        let mut anomalies = Vec::new();
        let mut drives_ticked = 0;

        for drive in registry.iter_mut() {
            drives_ticked += 1;
            let previous_band = self.policy.band_for(drive.pressure, drive.threshold)?;
            let gain_rate = gain.gain_rate(drive, now);
            let update = apply_tick(drive, gain_rate, now);
            if let Some(anomaly) = update.anomaly {
                anomalies.push(anomaly);
            }
            let new_band = self.policy.band_for(drive.pressure, drive.threshold)?;
            if let Some(event) = evaluate_trigger(drive, previous_band, new_band, now, self.cooldown)
            {
                info!(
                    drive = %drive.name,
                    band = %new_band,
                    pressure = drive.pressure,
                    "drive trigger fired"
                );
                drive.last_triggered_at = Some(now);
                log.append(event.clone());
                fired.push(event);
            }
        }

        Ok(TickReport {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            ticked_at: now,
            drives_ticked,
            fired,
            anomalies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contracts::{AnomalyKind, DriveSpec};

    use crate::gain::ConfiguredGain;

    fn spec(name: &str, threshold: f64, gain_rate: f64) -> DriveSpec {
        DriveSpec {
            name: name.to_string(),
            description: String::new(),
            threshold,
            gain_rate,
            decay_rate: 0.0,
            gain_boost: None,
        }
    }

    fn test_config(cooldown_minutes: i64) -> EngineConfig {
        EngineConfig {
            cooldown_minutes,
            drives: vec![spec("alpha", 10.0, 2.0), spec("beta", 10.0, 0.5)],
            ..EngineConfig::default()
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
    }

    fn ticked(
        engine: &TickEngine,
        registry: &mut DriveRegistry,
        log: &mut TriggerLog,
        now: DateTime<Utc>,
    ) -> TickReport {
        engine
            .tick_all(registry, log, &ConfiguredGain, now)
            .unwrap()
    }

    #[test]
    fn rising_edge_fires_once_then_sustained_band_stays_quiet() {
        let config = test_config(60);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        let init = ticked(&engine, &mut registry, &mut log, at(9, 0));
        assert_eq!(init.schema_version, SCHEMA_VERSION_V1);
        assert_eq!(init.drives_ticked, 2);
        assert!(init.fired.is_empty());

        // alpha reaches exactly its threshold: 5h * 2.0/h = 10.0.
        let crossing = ticked(&engine, &mut registry, &mut log, at(14, 0));
        assert_eq!(crossing.fired.len(), 1);
        assert_eq!(crossing.fired[0].drive_name, "alpha");
        assert_eq!(crossing.fired[0].band, Band::Triggered);

        // Still triggered an hour later; no new edge, cooldown long expired.
        let sustained = ticked(&engine, &mut registry, &mut log, at(15, 0));
        assert!(sustained.fired.is_empty());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn escalation_into_higher_band_fires_after_cooldown() {
        let config = test_config(60);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        ticked(&engine, &mut registry, &mut log, at(14, 0));
        assert_eq!(log.len(), 1);

        // alpha climbs from 10.0 to 15.0, crossing into crisis 2.5h after
        // the first fire.
        let escalated = ticked(&engine, &mut registry, &mut log, at(16, 30));
        assert_eq!(escalated.fired.len(), 1);
        assert_eq!(escalated.fired[0].band, Band::Crisis);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn cooldown_suppresses_even_escalation() {
        let config = test_config(240);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        let first = ticked(&engine, &mut registry, &mut log, at(14, 0));
        assert_eq!(first.fired.len(), 1);

        // Crisis crossing 2.5h later falls inside the 4h cooldown.
        let suppressed = ticked(&engine, &mut registry, &mut log, at(16, 30));
        assert!(suppressed.fired.is_empty());
        assert_eq!(
            registry.get("alpha").unwrap().last_triggered_at,
            Some(at(14, 0))
        );

        // Emergency crossing 5h after the fire is past the cooldown.
        let released = ticked(&engine, &mut registry, &mut log, at(19, 0));
        assert_eq!(released.fired.len(), 1);
        assert_eq!(released.fired[0].band, Band::Emergency);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn refire_after_satisfaction_requires_new_rising_edge() {
        let config = test_config(60);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        ticked(&engine, &mut registry, &mut log, at(14, 0));
        assert_eq!(log.len(), 1);

        registry.satisfy("alpha", 10.0, at(14, 30)).unwrap();

        // Below every band now; climbing but not yet pressing fires nothing.
        let quiet = ticked(&engine, &mut registry, &mut log, at(15, 0));
        assert!(quiet.fired.is_empty());

        // A fresh crossing well past the cooldown fires again.
        let refired = ticked(&engine, &mut registry, &mut log, at(20, 0));
        assert_eq!(refired.fired.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn drives_cross_and_fire_independently() {
        let config = test_config(60);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        let report = ticked(&engine, &mut registry, &mut log, at(14, 0));

        let names: Vec<&str> = report.fired.iter().map(|e| e.drive_name.as_str()).collect();
        assert_eq!(names, vec!["alpha"]);
        assert_eq!(registry.get("beta").unwrap().last_triggered_at, None);
        assert_eq!(registry.get("beta").unwrap().pressure, 2.5);
    }

    #[test]
    fn clock_backward_is_reported_per_drive() {
        let config = test_config(60);
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        ticked(&engine, &mut registry, &mut log, at(14, 0));

        let backward = ticked(&engine, &mut registry, &mut log, at(13, 0));
        assert_eq!(backward.anomalies.len(), 2);
        for anomaly in &backward.anomalies {
            assert_eq!(anomaly.kind, AnomalyKind::ClockMovedBackward);
        }
        assert!(backward.fired.is_empty());
        assert_eq!(registry.get("alpha").unwrap().pressure, 10.0);
        assert_eq!(registry.get("alpha").unwrap().last_tick_at, Some(at(13, 0)));
    }

    #[test]
    fn neutral_to_emergency_jump_fires_single_event_at_peak_band() {
        let config = EngineConfig {
            drives: vec![spec("spike", 10.0, 30.0)],
            ..EngineConfig::default()
        };
        let engine = TickEngine::from_config(&config).unwrap();
        let mut registry = DriveRegistry::bootstrap(&config);
        let mut log = TriggerLog::new();

        ticked(&engine, &mut registry, &mut log, at(9, 0));
        let report = ticked(&engine, &mut registry, &mut log, at(10, 0));

        assert_eq!(report.fired.len(), 1);
        assert_eq!(report.fired[0].band, Band::Emergency);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn fire_at_exact_cooldown_boundary_is_allowed() {
        let mut drive = spec("alpha", 10.0, 2.0).to_drive();
        drive.pressure = 10.0;
        drive.last_triggered_at = Some(at(14, 0));

        let suppressed = evaluate_trigger(
            &drive,
            Band::Neutral,
            Band::Triggered,
            at(14, 59),
            Duration::minutes(60),
        );
        assert!(suppressed.is_none());

        let fired = evaluate_trigger(
            &drive,
            Band::Neutral,
            Band::Triggered,
            at(15, 0),
            Duration::minutes(60),
        );
        assert!(fired.is_some());
    }

    #[test]
    fn evaluate_requires_a_rise_into_a_pressing_band() {
        let drive = spec("alpha", 10.0, 2.0).to_drive();
        let cooldown = Duration::minutes(60);
        let now = at(12, 0);

        assert!(evaluate_trigger(&drive, Band::Available, Band::Elevated, now, cooldown).is_none());
        assert!(evaluate_trigger(&drive, Band::Elevated, Band::Triggered, now, cooldown).is_some());
        assert!(evaluate_trigger(&drive, Band::Crisis, Band::Triggered, now, cooldown).is_none());
        assert!(evaluate_trigger(&drive, Band::Triggered, Band::Triggered, now, cooldown).is_none());
        assert!(evaluate_trigger(&drive, Band::Neutral, Band::Emergency, now, cooldown).is_some());
    }
}
