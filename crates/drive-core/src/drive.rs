use std::fmt;

use chrono::{DateTime, Duration, Utc};
use contracts::{AnomalyKind, Drive, TickAnomaly};
use tracing::{debug, warn};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SatisfactionError {
    UnknownDrive { name: String },
    InvalidDelta { drive: String, delta: f64 },
}

impl fmt::Display for SatisfactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownDrive { name } => write!(f, "no drive named {name}"),
            Self::InvalidDelta { drive, delta } => {
                write!(f, "satisfaction delta for {drive} must be a non-negative number, got {delta}")
            }
        }
    }
}

impl std::error::Error for SatisfactionError {}

/// Outcome of advancing one drive to `now`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickUpdate {
    pub elapsed_hours: f64,
    pub previous_pressure: f64,
    pub anomaly: Option<TickAnomaly>,
}

/// Advances a drive to `now`. Pressure accrues `gain_rate` and sheds the
/// drive's decay rate over the elapsed wall-clock hours, floored at zero.
/// `last_tick_at` becomes `now` unconditionally so a clock step backward
/// cannot wedge the drive; the backward step itself accrues nothing and is
/// reported as an anomaly.
pub fn apply_tick(drive: &mut Drive, gain_rate: f64, now: DateTime<Utc>) -> TickUpdate {
    let previous_pressure = drive.pressure;
    let mut anomaly = None;

    let elapsed_hours = match drive.last_tick_at {
        // First observation: nothing accrues retroactively.
        None => 0.0,
        Some(prev) => {
            let elapsed = now.signed_duration_since(prev);
            if elapsed < Duration::zero() {
                warn!(
                    drive = %drive.name,
                    last_tick_at = %prev,
                    now = %now,
                    "clock moved backward, treating elapsed time as zero"
                );
                anomaly = Some(TickAnomaly {
                    drive_name: drive.name.clone(),
                    kind: AnomalyKind::ClockMovedBackward,
                    observed_at: now,
                    detail: format!(
                        "last_tick_at {} is after now {}",
                        prev.to_rfc3339(),
                        now.to_rfc3339()
                    ),
                });
                0.0
            } else {
                elapsed.num_milliseconds() as f64 / MILLIS_PER_HOUR
            }
        }
    };

    let accrued = drive.pressure + (gain_rate - drive.decay_rate) * elapsed_hours;
    drive.pressure = accrued.max(0.0);
    drive.last_tick_at = Some(now);

    TickUpdate {
        elapsed_hours,
        previous_pressure,
        anomaly,
    }
}

/// Reduces pressure by `delta`, floored at zero. Satisfaction is not a time
/// advance, so `last_tick_at` stays untouched.
pub fn apply_satisfaction(
    drive: &mut Drive,
    delta: f64,
    now: DateTime<Utc>,
) -> Result<f64, SatisfactionError> {
    if !delta.is_finite() || delta < 0.0 {
        return Err(SatisfactionError::InvalidDelta {
            drive: drive.name.clone(),
            delta,
        });
    }
    let previous = drive.pressure;
    drive.pressure = (drive.pressure - delta).max(0.0);
    debug!(
        drive = %drive.name,
        delta,
        previous,
        pressure = drive.pressure,
        at = %now,
        "satisfaction applied"
    );
    Ok(drive.pressure)
}
