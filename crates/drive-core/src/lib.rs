//! Pure drive engine: pressure accrual over wall-clock time, band
//! classification against per-drive thresholds, rising-edge trigger
//! evaluation with cooldown, and the append-only trigger log.
//!
//! Nothing here touches storage or the network; callers own both the clock
//! value passed to each operation and the durability of the results.

pub mod config;
pub mod drive;
pub mod engine;
pub mod gain;
pub mod log;
pub mod policy;
pub mod registry;

pub use config::{validate_config, ConfigError};
pub use drive::{apply_satisfaction, apply_tick, SatisfactionError, TickUpdate};
pub use engine::{evaluate_trigger, TickEngine};
pub use gain::{ConfiguredGain, GainModel, SignalGain};
pub use log::TriggerLog;
pub use policy::{PolicyError, ThresholdPolicy};
pub use registry::{DriveRegistry, RegistryError};
