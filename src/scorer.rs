//! Window → relaxation sample.
//!
//! [`WindowScorer`] is the seam between the timing state machine and the DSP
//! chain. [`RelaxationScorer`] is the production chain:
//! band-pass → band powers → theta/alpha.
use ndarray::Array2;

use crate::bands::BandPowerExtractor;
use crate::config::CarouselConfig;
use crate::error::{FilterError, ScoreError};
use crate::filter::Bandpass;
use crate::relaxation::relaxation_index;

/// Turns one [C, T] window into one scalar.
pub trait WindowScorer: Send {
    fn score(&mut self, window: &Array2<f64>) -> Result<f64, ScoreError>;
}

impl<F> WindowScorer for F
where
    F: FnMut(&Array2<f64>) -> Result<f64, ScoreError> + Send,
{
    fn score(&mut self, window: &Array2<f64>) -> Result<f64, ScoreError> {
        self(window)
    }
}

/// Zero-phase band-pass, single-segment band powers, theta/alpha on channel 0.
pub struct RelaxationScorer {
    filter: Bandpass,
    extractor: BandPowerExtractor,
}

impl RelaxationScorer {
    pub fn new(low_hz: f64, high_hz: f64, sfreq: f64, order: usize) -> Result<Self, FilterError> {
        Ok(Self {
            filter: Bandpass::design(low_hz, high_hz, sfreq, order)?,
            extractor: BandPowerExtractor::new(sfreq),
        })
    }

    pub fn from_config(cfg: &CarouselConfig) -> Result<Self, FilterError> {
        Self::new(cfg.low_hz, cfg.high_hz, cfg.sfreq, cfg.filter_order)
    }

    /// Shortest window this scorer accepts.
    pub fn min_window(&self) -> usize {
        self.filter.min_len()
    }
}

impl WindowScorer for RelaxationScorer {
    fn score(&mut self, window: &Array2<f64>) -> Result<f64, ScoreError> {
        let filtered = self.filter.apply(window)?;
        let features = self.extractor.extract(&filtered)?;
        Ok(relaxation_index(features.as_slice()))
    }
}
