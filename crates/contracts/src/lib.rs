//! v1 cross-boundary contracts for the drive engine, persistence, and API.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Classification of a drive's pressure relative to its trigger threshold.
/// Variant order is severity order, lowest first.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Neutral,
    Available,
    Elevated,
    Triggered,
    Crisis,
    Emergency,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::Neutral,
        Band::Available,
        Band::Elevated,
        Band::Triggered,
        Band::Crisis,
        Band::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Band::Neutral => "neutral",
            Band::Available => "available",
            Band::Elevated => "elevated",
            Band::Triggered => "triggered",
            Band::Crisis => "crisis",
            Band::Emergency => "emergency",
        }
    }

    /// True for `triggered` and above, the bands that demand attention.
    pub fn is_pressing(self) -> bool {
        self >= Band::Triggered
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multipliers over a drive's threshold marking the lower edge of each band.
/// Pressure below `available * threshold` is neutral. Edges are inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BandRatios {
    pub available: f64,
    pub elevated: f64,
    pub triggered: f64,
    pub crisis: f64,
    pub emergency: f64,
}

impl Default for BandRatios {
    fn default() -> Self {
        Self {
            available: 0.30,
            elevated: 0.75,
            triggered: 1.00,
            crisis: 1.50,
            emergency: 2.00,
        }
    }
}

/// Raises a drive's gain rate while a named boolean context signal is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GainBoost {
    pub signal: String,
    /// Replaces the base gain rate while the signal holds, in pressure per hour.
    pub boosted_rate: f64,
}

/// Configured parameters for one drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub threshold: f64,
    pub gain_rate: f64,
    pub decay_rate: f64,
    #[serde(default)]
    pub gain_boost: Option<GainBoost>,
}

impl DriveSpec {
    /// A fresh drive at zero pressure with this spec's parameters.
    pub fn to_drive(&self) -> Drive {
        Drive {
            name: self.name.clone(),
            description: self.description.clone(),
            pressure: 0.0,
            threshold: self.threshold,
            gain_rate: self.gain_rate,
            decay_rate: self.decay_rate,
            last_tick_at: None,
            last_triggered_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub schema_version: String,
    #[serde(default)]
    pub ratios: BandRatios,
    /// Minimum interval between trigger fires for the same drive.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    pub drives: Vec<DriveSpec>,
}

fn default_cooldown_minutes() -> i64 {
    60
}

impl EngineConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.cooldown_minutes)
    }

    pub fn spec_for(&self, name: &str) -> Option<&DriveSpec> {
        self.drives.iter().find(|spec| spec.name == name)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            ratios: BandRatios::default(),
            cooldown_minutes: default_cooldown_minutes(),
            drives: core_drive_specs(),
        }
    }
}

fn core_drive_specs() -> Vec<DriveSpec> {
    vec![
        DriveSpec {
            name: "connection".to_string(),
            description: "Need for contact and exchange with other people".to_string(),
            threshold: 20.0,
            gain_rate: 0.9,
            decay_rate: 0.25,
            gain_boost: Some(GainBoost {
                signal: "unread_messages".to_string(),
                boosted_rate: 1.8,
            }),
        },
        DriveSpec {
            name: "curiosity".to_string(),
            description: "Need to explore open questions and learn".to_string(),
            threshold: 20.0,
            gain_rate: 0.7,
            decay_rate: 0.2,
            gain_boost: None,
        },
        DriveSpec {
            name: "order".to_string(),
            description: "Need to bring structure to accumulated mess".to_string(),
            threshold: 20.0,
            gain_rate: 0.5,
            decay_rate: 0.15,
            gain_boost: None,
        },
        DriveSpec {
            name: "expression".to_string(),
            description: "Need to make or say something of one's own".to_string(),
            threshold: 20.0,
            gain_rate: 0.6,
            decay_rate: 0.2,
            gain_boost: None,
        },
        DriveSpec {
            name: "maintenance".to_string(),
            description: "Need to tend to upkeep of self and systems".to_string(),
            threshold: 20.0,
            gain_rate: 0.4,
            decay_rate: 0.1,
            gain_boost: None,
        },
    ]
}

/// A single pressure accumulator. Pressure rises with elapsed time at the
/// gain rate, falls at the decay rate, and never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drive {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pressure: f64,
    pub threshold: f64,
    pub gain_rate: f64,
    pub decay_rate: f64,
    #[serde(default)]
    pub last_tick_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Drive {
    pub fn ratio(&self) -> f64 {
        self.pressure / self.threshold
    }
}

/// Append-only record of a drive rising into `triggered` or above.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerEvent {
    pub schema_version: String,
    pub event_id: String,
    pub drive_name: String,
    pub fired_at: DateTime<Utc>,
    pub pressure: f64,
    pub threshold: f64,
    pub band: Band,
}

impl TriggerEvent {
    pub fn new(drive: &Drive, band: Band, fired_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            event_id: format!("trg-{}-{}", drive.name, fired_at.timestamp_millis()),
            drive_name: drive.name.clone(),
            fired_at,
            pressure: drive.pressure,
            threshold: drive.threshold,
            band,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ClockMovedBackward,
}

/// Non-fatal irregularity observed while advancing a drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickAnomaly {
    pub drive_name: String,
    pub kind: AnomalyKind,
    pub observed_at: DateTime<Utc>,
    pub detail: String,
}

/// Outcome of one engine tick across all drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    pub schema_version: String,
    pub ticked_at: DateTime<Utc>,
    pub drives_ticked: usize,
    pub fired: Vec<TriggerEvent>,
    pub anomalies: Vec<TickAnomaly>,
}

/// Read-model row for dashboards and context injection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveView {
    pub name: String,
    pub description: String,
    pub pressure: f64,
    pub threshold: f64,
    /// pressure / threshold, the urgency sort key.
    pub ratio: f64,
    pub band: Band,
}

impl DriveView {
    pub fn from_drive(drive: &Drive, band: Band) -> Self {
        Self {
            name: drive.name.clone(),
            description: drive.description.clone(),
            pressure: drive.pressure,
            threshold: drive.threshold,
            ratio: drive.ratio(),
            band,
        }
    }
}

/// Snapshot of the whole engine rendered for prompt or dashboard injection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextDocument {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    /// All drives, most urgent first.
    pub drives: Vec<DriveView>,
    /// Names of drives at `triggered` or above, most urgent first.
    pub pressing: Vec<String>,
    /// Most recent trigger events, oldest first.
    pub recent_triggers: Vec<TriggerEvent>,
}

impl fmt::Display for ContextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Drive state ({})", self.generated_at.to_rfc3339())?;
        for view in &self.drives {
            writeln!(
                f,
                "- {}: {:.1}/{:.1} ({:.2}) {} -- {}",
                view.name, view.pressure, view.threshold, view.ratio, view.band, view.description
            )?;
        }
        if self.pressing.is_empty() {
            writeln!(f, "Pressing: none")?;
        } else {
            writeln!(f, "Pressing: {}", self.pressing.join(", "))?;
        }
        for event in &self.recent_triggers {
            writeln!(
                f,
                "- trigger {} at {} ({:.1}/{:.1}, {})",
                event.drive_name,
                event.fired_at.to_rfc3339(),
                event.pressure,
                event.threshold,
                event.band
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineStatus {
    pub schema_version: String,
    pub drive_count: usize,
    pub band_counts: BTreeMap<Band, usize>,
    pub pressing: Vec<String>,
    pub triggers_logged: usize,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub most_pressing: Option<DriveView>,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last_tick = self
            .last_tick_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        write!(
            f,
            "drives={} pressing={} triggers={} last_tick={}",
            self.drive_count,
            self.pressing.len(),
            self.triggers_logged,
            last_tick
        )
    }
}

/// Versioned durable document: the full drive map plus the trigger log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub drives: Vec<Drive>,
    pub triggers: Vec<TriggerEvent>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DriveNotFound,
    InvalidDelta,
    InvalidConfig,
    InvalidQuery,
    ContractVersionUnsupported,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}
