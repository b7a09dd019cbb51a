use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use contracts::{Drive, EngineConfig};

/// Source of the per-tick gain rate for a drive, in pressure per hour.
/// Lets deployments wire contextual need detectors in front of the engine
/// without the engine knowing where rates come from.
pub trait GainModel: Send + Sync {
    fn gain_rate(&self, drive: &Drive, now: DateTime<Utc>) -> f64;
}

/// Uses each drive's configured base rate unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredGain;

impl GainModel for ConfiguredGain {
    fn gain_rate(&self, drive: &Drive, _now: DateTime<Utc>) -> f64 {
        drive.gain_rate
    }
}

/// Overlays boolean context signals onto the configured rates: a drive
/// whose spec names an active signal accrues at its boosted rate instead of
/// the base rate. Unknown signals and drives fall back to the base rate.
#[derive(Debug, Clone)]
pub struct SignalGain<'a> {
    config: &'a EngineConfig,
    signals: &'a BTreeMap<String, bool>,
}

impl<'a> SignalGain<'a> {
    pub fn new(config: &'a EngineConfig, signals: &'a BTreeMap<String, bool>) -> Self {
        Self { config, signals }
    }
}

impl GainModel for SignalGain<'_> {
    fn gain_rate(&self, drive: &Drive, _now: DateTime<Utc>) -> f64 {
        let boost = self
            .config
            .spec_for(&drive.name)
            .and_then(|spec| spec.gain_boost.as_ref());
        match boost {
            Some(boost) if self.signals.get(&boost.signal).copied().unwrap_or(false) => {
                boost.boosted_rate
            }
            _ => drive.gain_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contracts::{DriveSpec, GainBoost};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn boosted_config() -> EngineConfig {
        EngineConfig {
            drives: vec![DriveSpec {
                name: "connection".to_string(),
                description: String::new(),
                threshold: 20.0,
                gain_rate: 0.9,
                decay_rate: 0.25,
                gain_boost: Some(GainBoost {
                    signal: "unread_messages".to_string(),
                    boosted_rate: 1.8,
                }),
            }],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn configured_gain_returns_base_rate() {
        let drive = boosted_config().drives[0].to_drive();
        assert_eq!(ConfiguredGain.gain_rate(&drive, now()), 0.9);
    }

    #[test]
    fn signal_gain_boosts_while_signal_is_active() {
        let config = boosted_config();
        let drive = config.drives[0].to_drive();
        let signals = BTreeMap::from([("unread_messages".to_string(), true)]);
        let gain = SignalGain::new(&config, &signals);
        assert_eq!(gain.gain_rate(&drive, now()), 1.8);
    }

    #[test]
    fn inactive_or_absent_signal_falls_back_to_base_rate() {
        let config = boosted_config();
        let drive = config.drives[0].to_drive();

        let inactive = BTreeMap::from([("unread_messages".to_string(), false)]);
        assert_eq!(SignalGain::new(&config, &inactive).gain_rate(&drive, now()), 0.9);

        let absent = BTreeMap::new();
        assert_eq!(SignalGain::new(&config, &absent).gain_rate(&drive, now()), 0.9);
    }

    #[test]
    fn drive_without_spec_uses_its_own_rate() {
        let config = boosted_config();
        let mut drive = config.drives[0].to_drive();
        drive.name = "unlisted".to_string();
        let signals = BTreeMap::from([("unread_messages".to_string(), true)]);
        assert_eq!(SignalGain::new(&config, &signals).gain_rate(&drive, now()), 0.9);
    }
}
