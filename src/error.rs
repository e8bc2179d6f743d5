//! Error taxonomy of a carousel run.
//!
//! Scoring faults ([`FilterError`], [`ScoreError`]) are local to one
//! evaluation, marker faults ([`MarkerError`]) never abort anything, and only
//! [`CarouselError`] ends a run early.
use std::time::Duration;

use thiserror::Error;

/// Failure of the band-pass conditioner.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("not enough data to apply filter: {len} samples, need at least {required}")]
    InsufficientData { len: usize, required: usize },
    #[error("cannot design order-{order} band-pass {low_hz}–{high_hz} Hz at {sfreq} Hz")]
    InvalidDesign { order: usize, low_hz: f64, high_hz: f64, sfreq: f64 },
    #[error("filter initial-condition system is singular")]
    Singular,
    #[error("filter produced non-finite output")]
    NonFinite,
}

/// Failure to turn one window into a relaxation sample.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreError {
    /// Routine: the window is still too short. Skip and wait for more samples.
    #[error("not enough data to score window: {len} samples, need at least {required}")]
    InsufficientData { len: usize, required: usize },
    #[error("numerical fault while scoring: {0}")]
    Numerical(String),
}

impl From<FilterError> for ScoreError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::InsufficientData { len, required } => {
                ScoreError::InsufficientData { len, required }
            }
            other => ScoreError::Numerical(other.to_string()),
        }
    }
}

/// Failure reported by a sample source or stream resolver.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("stream lost: {0}")]
    Lost(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to deliver a marker. Logged, never retried.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("marker sink is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reasons a run ends before the carousel completes.
#[derive(Debug, Error)]
pub enum CarouselError {
    #[error("stream '{name}' not found after {timeout:?}")]
    DiscoveryTimeout { name: String, timeout: Duration },
    #[error("carousel cancelled")]
    Cancelled,
    #[error("unexpected fault: {0}")]
    Fault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_shortfall_maps_to_score_shortfall() {
        let e: ScoreError = FilterError::InsufficientData { len: 10, required: 34 }.into();
        assert_eq!(e, ScoreError::InsufficientData { len: 10, required: 34 });
    }

    #[test]
    fn other_filter_faults_are_numerical() {
        let e: ScoreError = FilterError::Singular.into();
        assert!(matches!(e, ScoreError::Numerical(_)));
    }

    #[test]
    fn discovery_timeout_names_the_stream() {
        let e = CarouselError::DiscoveryTimeout {
            name: "AURA_Filtered".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(e.to_string().contains("AURA_Filtered"));
    }
}
