//! Durable facade over the drive engine, plus the HTTP server on top of it.
//!
//! `EngineApi` owns the sqlite state store and reloads drive state around
//! every operation, so each call sees whatever the previous one persisted,
//! whether that call came from this process or an earlier one. The clock is
//! always passed in; nothing here reads wall time for engine decisions.

mod persistence;
mod server;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use contracts::{
    ContextDocument, Drive, DriveView, EngineConfig, EngineStatus, StateSnapshot, TickReport,
    TriggerEvent, SCHEMA_VERSION_V1,
};
use drive_core::{
    validate_config, ConfigError, DriveRegistry, PolicyError, SatisfactionError, SignalGain,
    ThresholdPolicy, TickEngine, TriggerLog,
};
use tracing::{info, warn};

pub use persistence::{PersistenceError, RecoveryReport, SqliteStateStore};
pub use server::{serve, ServerError};

#[derive(Debug)]
pub enum EngineError {
    Config(ConfigError),
    Policy(PolicyError),
    Satisfaction(SatisfactionError),
    Persistence(PersistenceError),
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "config rejected: {err}"),
            Self::Policy(err) => write!(f, "classification failed: {err}"),
            Self::Satisfaction(err) => write!(f, "satisfaction failed: {err}"),
            Self::Persistence(err) => write!(f, "persistence failed: {err}"),
            Self::ConfigIo { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            Self::ConfigParse { path, source } => {
                write!(f, "cannot parse config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<PolicyError> for EngineError {
    fn from(value: PolicyError) -> Self {
        Self::Policy(value)
    }
}

impl From<SatisfactionError> for EngineError {
    fn from(value: SatisfactionError) -> Self {
        Self::Satisfaction(value)
    }
}

impl From<PersistenceError> for EngineError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<EngineConfig, EngineError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| EngineError::ConfigIo {
        path: path.to_path_buf(),
        source: err,
    })?;
    serde_json::from_str(&raw).map_err(|err| EngineError::ConfigParse {
        path: path.to_path_buf(),
        source: err,
    })
}

pub fn write_config_file(path: impl AsRef<Path>, config: &EngineConfig) -> Result<(), EngineError> {
    let path = path.as_ref();
    let raw = serde_json::to_string_pretty(config).map_err(|err| EngineError::ConfigParse {
        path: path.to_path_buf(),
        source: err,
    })?;
    fs::write(path, raw).map_err(|err| EngineError::ConfigIo {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Boolean signal map for gain boosts. A missing file just means no
/// signals are active; a file that exists but will not parse is an error.
pub fn read_signals_file(path: impl AsRef<Path>) -> Result<BTreeMap<String, bool>, EngineError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path).map_err(|err| EngineError::ConfigIo {
        path: path.to_path_buf(),
        source: err,
    })?;
    serde_json::from_str(&raw).map_err(|err| EngineError::ConfigParse {
        path: path.to_path_buf(),
        source: err,
    })
}

#[derive(Debug)]
pub struct EngineApi {
    store: SqliteStateStore,
    config: EngineConfig,
    policy: ThresholdPolicy,
    config_path: Option<PathBuf>,
}

impl EngineApi {
    pub fn open(db_path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let policy = validate_config(&config)?;
        let store = SqliteStateStore::open_or_recover(db_path)?;
        Ok(Self {
            store,
            config,
            policy,
            config_path: None,
        })
    }

    /// Like `open`, but the config comes from a json file that is re-read
    /// before every tick, so edits take effect on the next engine cycle.
    pub fn open_with_config_file(
        db_path: impl AsRef<Path>,
        config_path: impl AsRef<Path>,
    ) -> Result<Self, EngineError> {
        let config_path = config_path.as_ref();
        let config = read_config_file(config_path)?;
        let mut api = Self::open(db_path, config)?;
        api.config_path = Some(config_path.to_path_buf());
        Ok(api)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads state, bootstrapping and repairing as needed, and persists the
    /// result so the next open starts clean.
    pub fn initialize_state(&mut self, now: DateTime<Utc>) -> Result<RecoveryReport, EngineError> {
        let (registry, _log, recovery) = self.load_state()?;
        self.store.save(&registry, &[], now)?;
        Ok(recovery)
    }

    /// One engine cycle: reload config if it is file-backed, advance every
    /// drive to `now`, fire rising-edge triggers, persist.
    pub fn tick(
        &mut self,
        signals: &BTreeMap<String, bool>,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        self.refresh_config()?;
        let (mut registry, mut log, _recovery) = self.load_state()?;
        let already_logged = log.len();

        let engine = TickEngine::new(self.policy, self.config.cooldown());
        let gain = SignalGain::new(&self.config, signals);
        let report = engine.tick_all(&mut registry, &mut log, &gain, now)?;

        self.store
            .save(&registry, &log.events()[already_logged..], now)?;
        Ok(report)
    }

    /// Applies a satisfaction delta and persists. The drive's clock state is
    /// untouched; only pressure moves.
    pub fn satisfy(
        &mut self,
        name: &str,
        delta: f64,
        now: DateTime<Utc>,
    ) -> Result<DriveView, EngineError> {
        let (mut registry, _log, _recovery) = self.load_state()?;
        registry.satisfy(name, delta, now)?;
        self.store.save(&registry, &[], now)?;

        match registry.get(name) {
            Some(drive) => self.view_of(drive),
            None => Err(EngineError::Satisfaction(SatisfactionError::UnknownDrive {
                name: name.to_string(),
            })),
        }
    }

    /// Every drive in name order.
    pub fn drives(&self) -> Result<Vec<DriveView>, EngineError> {
        let (registry, _log, _recovery) = self.load_state()?;
        registry.iter().map(|drive| self.view_of(drive)).collect()
    }

    pub fn drive(&self, name: &str) -> Result<Option<DriveView>, EngineError> {
        let (registry, _log, _recovery) = self.load_state()?;
        match registry.get(name) {
            Some(drive) => Ok(Some(self.view_of(drive)?)),
            None => Ok(None),
        }
    }

    /// Total logged count plus the most recent `limit` events, oldest first.
    pub fn triggers(&self, limit: usize) -> Result<(usize, Vec<TriggerEvent>), EngineError> {
        let (_registry, log, _recovery) = self.load_state()?;
        Ok((log.len(), log.tail(limit).to_vec()))
    }

    pub fn status(&self) -> Result<EngineStatus, EngineError> {
        let (registry, log, _recovery) = self.load_state()?;

        let mut band_counts = BTreeMap::new();
        let mut pressing = Vec::new();
        let mut most_pressing: Option<DriveView> = None;
        let mut last_tick_at = None;
        for drive in registry.iter() {
            let view = self.view_of(drive)?;
            *band_counts.entry(view.band).or_insert(0_usize) += 1;
            if view.band.is_pressing() {
                pressing.push(view.name.clone());
            }
            if most_pressing
                .as_ref()
                .map_or(true, |top| view.ratio > top.ratio)
            {
                most_pressing = Some(view);
            }
            last_tick_at = last_tick_at.max(drive.last_tick_at);
        }

        Ok(EngineStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            drive_count: registry.len(),
            band_counts,
            pressing,
            triggers_logged: log.len(),
            last_tick_at,
            most_pressing,
        })
    }

    /// Renderable snapshot for prompt injection: all drives most urgent
    /// first, the pressing subset, and the last `recent` triggers.
    pub fn context(
        &self,
        recent: usize,
        now: DateTime<Utc>,
    ) -> Result<ContextDocument, EngineError> {
        let (registry, log, _recovery) = self.load_state()?;

        let mut drives = registry
            .iter()
            .map(|drive| self.view_of(drive))
            .collect::<Result<Vec<_>, _>>()?;
        drives.sort_by(|a, b| {
            b.ratio
                .total_cmp(&a.ratio)
                .then_with(|| a.name.cmp(&b.name))
        });
        let pressing = drives
            .iter()
            .filter(|view| view.band.is_pressing())
            .map(|view| view.name.clone())
            .collect();

        Ok(ContextDocument {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            generated_at: now,
            drives,
            pressing,
            recent_triggers: log.tail(recent).to_vec(),
        })
    }

    /// The full durable document: every drive plus the whole trigger log.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<StateSnapshot, EngineError> {
        let (registry, log, _recovery) = self.load_state()?;
        Ok(StateSnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            generated_at: now,
            drives: registry.into_drives(),
            triggers: log.into_events(),
        })
    }

    /// Re-reads a file-backed config, swapping it in only if it validates.
    /// On any failure the previous config stays active and the error is
    /// returned, so a bad edit can never half-apply.
    fn refresh_config(&mut self) -> Result<(), EngineError> {
        let Some(path) = self.config_path.clone() else {
            return Ok(());
        };
        let fresh = read_config_file(&path)?;
        if fresh != self.config {
            let policy = validate_config(&fresh)?;
            info!(path = %path.display(), "applying changed engine config");
            self.config = fresh;
            self.policy = policy;
        }
        Ok(())
    }

    fn load_state(&self) -> Result<(DriveRegistry, TriggerLog, RecoveryReport), EngineError> {
        let (registry, log, recovery) = self.store.load(&self.config)?;
        if recovery.bootstrapped {
            info!(drives = registry.len(), "bootstrapped fresh drive state");
        } else if !recovery.is_clean() {
            warn!(
                repaired = recovery.repaired_drives.len(),
                dropped_rows = recovery.dropped_rows.len(),
                dropped_events = recovery.dropped_events,
                "state loaded with repairs"
            );
        }
        Ok((registry, log, recovery))
    }

    fn view_of(&self, drive: &Drive) -> Result<DriveView, EngineError> {
        let band = self.policy.band_for(drive.pressure, drive.threshold)?;
        Ok(DriveView::from_drive(drive, band))
    }
}
