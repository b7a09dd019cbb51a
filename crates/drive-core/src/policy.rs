use std::fmt;

use contracts::{Band, BandRatios};

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    RatiosNotIncreasing { detail: String },
    ThresholdNotPositive { value: f64 },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::RatiosNotIncreasing { detail } => {
                write!(f, "band ratios must be finite and strictly increasing: {}", detail)
            }
            PolicyError::ThresholdNotPositive { value } => {
                write!(f, "band classification needs a positive threshold, got {}", value)
            }
        }
    }
}

impl std::error::Error for PolicyError {}

/// Validated band ratio set and the classification rule over it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    ratios: BandRatios,
}

impl ThresholdPolicy {
    pub fn new(ratios: BandRatios) -> Result<Self, PolicyError> {
        let edges = [
            ("available", ratios.available),
            ("elevated", ratios.elevated),
            ("triggered", ratios.triggered),
            ("crisis", ratios.crisis),
            ("emergency", ratios.emergency),
        ];
        for (label, value) in edges {
            if !value.is_finite() {
                return Err(PolicyError::RatiosNotIncreasing {
                    detail: format!("{} is not finite ({})", label, value),
                });
            }
        }
        for pair in edges.windows(2) {
            let (low_label, low) = pair[0];
            let (high_label, high) = pair[1];
            if low >= high {
                return Err(PolicyError::RatiosNotIncreasing {
                    detail: format!("{} ({}) must be below {} ({})", low_label, low, high_label, high),
                });
            }
        }
        Ok(Self { ratios })
    }

    pub fn ratios(&self) -> &BandRatios {
        &self.ratios
    }

    /// Highest band whose inclusive lower edge `ratio * threshold` the
    /// pressure has reached. Comparison is against the product, not the
    /// quotient, so edges land exactly.
    pub fn band_for(&self, pressure: f64, threshold: f64) -> Result<Band, PolicyError> {
        if !(threshold > 0.0) {
            return Err(PolicyError::ThresholdNotPositive { value: threshold });
        }
        let band = if pressure >= self.ratios.emergency * threshold {
            Band::Emergency
        } else if pressure >= self.ratios.crisis * threshold {
            Band::Crisis
        } else if pressure >= self.ratios.triggered * threshold {
            Band::Triggered
        } else if pressure >= self.ratios.elevated * threshold {
            Band::Elevated
        } else if pressure >= self.ratios.available * threshold {
            Band::Available
        } else {
            Band::Neutral
        };
        Ok(band)
    }

    /// Absolute pressure at each band's lower edge for one threshold.
    pub fn absolute_edges(&self, threshold: f64) -> [(Band, f64); 5] {
        [
            (Band::Available, self.ratios.available * threshold),
            (Band::Elevated, self.ratios.elevated * threshold),
            (Band::Triggered, self.ratios.triggered * threshold),
            (Band::Crisis, self.ratios.crisis * threshold),
            (Band::Emergency, self.ratios.emergency * threshold),
        ]
    }
}
