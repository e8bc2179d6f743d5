//! Band-power features from a filtered window.
//!
//! Per channel, a single-segment periodogram (the window is one Welch segment):
//!
//! ```text
//! x  ← x − mean(x)                       constant detrend
//! X  = FFT(x · w)                        w = periodic Hann, len = T
//! P  = |X|² / (sfreq · Σ w²)             density scaling
//! P[1..nyq) *= 2                         one-sided spectrum
//! ```
//!
//! Band power is the mean PSD over the bins inside each band. A band that
//! contains no bin at the given resolution has power 0.
use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

use crate::error::ScoreError;

/// The five canonical EEG bands, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Edges in Hz. Lower edge inclusive; upper edge exclusive except for gamma.
    pub fn edges(self) -> (f64, f64) {
        match self {
            Band::Delta => (1.0, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
            Band::Gamma => (30.0, 100.0),
        }
    }

    pub fn contains(self, f: f64) -> bool {
        let (lo, hi) = self.edges();
        match self {
            Band::Gamma => f >= lo && f <= hi,
            _ => f >= lo && f < hi,
        }
    }

    /// Position inside one channel's five-element group.
    pub fn offset(self) -> usize {
        self as usize
    }
}

/// Band powers of one window: five values per channel, channels concatenated.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn n_channels(&self) -> usize {
        self.0.len() / Band::ALL.len()
    }

    /// Power of `band` on `channel`, if present.
    pub fn get(&self, channel: usize, band: Band) -> Option<f64> {
        self.0.get(channel * Band::ALL.len() + band.offset()).copied()
    }
}

/// Reusable extractor; keeps the FFT planner (and its plan cache) alive
/// between windows.
pub struct BandPowerExtractor {
    sfreq: f64,
    planner: FftPlanner<f64>,
}

impl BandPowerExtractor {
    pub fn new(sfreq: f64) -> Self {
        Self { sfreq, planner: FftPlanner::new() }
    }

    /// Band powers of every channel (row) of `window` ([C, T]).
    pub fn extract(&mut self, window: &Array2<f64>) -> Result<FeatureVector, ScoreError> {
        let n_t = window.ncols();
        if n_t < 2 {
            return Err(ScoreError::InsufficientData { len: n_t, required: 2 });
        }
        let mut out = Vec::with_capacity(window.nrows() * Band::ALL.len());
        for row in window.rows() {
            let x: Vec<f64> = row.to_vec();
            let (freqs, psd) = periodogram_with(&mut self.planner, &x, self.sfreq);
            for band in Band::ALL {
                out.push(band_mean(&freqs, &psd, band));
            }
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ScoreError::Numerical("non-finite band power".into()));
        }
        Ok(FeatureVector(out))
    }
}

/// One-shot convenience around [`BandPowerExtractor`].
pub fn extract_band_powers(window: &Array2<f64>, sfreq: f64) -> Result<FeatureVector, ScoreError> {
    BandPowerExtractor::new(sfreq).extract(window)
}

/// One-sided PSD of `x` (density scaling, periodic Hann, constant detrend).
///
/// Returns `(freqs, psd)`, both of length `len/2 + 1`.
pub fn periodogram(x: &[f64], sfreq: f64) -> (Vec<f64>, Vec<f64>) {
    periodogram_with(&mut FftPlanner::new(), x, sfreq)
}

fn periodogram_with(planner: &mut FftPlanner<f64>, x: &[f64], sfreq: f64) -> (Vec<f64>, Vec<f64>) {
    let n = x.len();
    if n == 0 {
        return (vec![], vec![]);
    }
    let mean = x.iter().sum::<f64>() / n as f64;
    let win = hann_periodic(n);
    let win_pow: f64 = win.iter().map(|w| w * w).sum();

    let mut buf: Vec<Complex<f64>> = x
        .iter()
        .zip(&win)
        .map(|(&v, &w)| Complex { re: (v - mean) * w, im: 0.0 })
        .collect();
    planner.plan_fft_forward(n).process(&mut buf);

    let n_bins = n / 2 + 1;
    let scale = 1.0 / (sfreq * win_pow);
    let mut psd: Vec<f64> = buf[..n_bins].iter().map(|c| c.norm_sqr() * scale).collect();
    // Double every bin that has a negative-frequency twin.
    let last_doubled = if n % 2 == 0 { n_bins - 1 } else { n_bins };
    for p in psd.iter_mut().take(last_doubled).skip(1) {
        *p *= 2.0;
    }
    let freqs = (0..n_bins).map(|k| k as f64 * sfreq / n as f64).collect();
    (freqs, psd)
}

fn band_mean(freqs: &[f64], psd: &[f64], band: Band) -> f64 {
    let (sum, count) = freqs
        .iter()
        .zip(psd)
        .filter(|(f, _)| band.contains(**f))
        .fold((0.0, 0usize), |(s, c), (_, &p)| (s + p, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Periodic Hann window (`scipy.signal.get_window('hann', n)`).
fn hann_periodic(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_window(n_ch: usize, n_t: usize, sfreq: f64, freq: f64) -> Array2<f64> {
        Array2::from_shape_fn((n_ch, n_t), |(_, t)| (2.0 * PI * freq * t as f64 / sfreq).sin())
    }

    #[test]
    fn five_values_per_channel() {
        let w = sine_window(3, 100, 250.0, 10.0);
        let f = extract_band_powers(&w, 250.0).unwrap();
        assert_eq!(f.len(), 15);
        assert_eq!(f.n_channels(), 3);
    }

    #[test]
    fn alpha_sine_peaks_in_alpha_band() {
        let w = sine_window(1, 250, 250.0, 10.0);
        let f = extract_band_powers(&w, 250.0).unwrap();
        let alpha = f.get(0, Band::Alpha).unwrap();
        for band in [Band::Delta, Band::Theta, Band::Beta, Band::Gamma] {
            assert!(alpha > 10.0 * f.get(0, band).unwrap(), "{band:?} rivals alpha");
        }
    }

    #[test]
    fn constant_signal_has_no_power() {
        let w = Array2::from_elem((2, 64), 3.0);
        let f = extract_band_powers(&w, 250.0).unwrap();
        for &v in f.as_slice() {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-20);
        }
    }

    #[test]
    fn band_edges_are_half_open_except_gamma() {
        assert!(Band::Delta.contains(1.0));
        assert!(!Band::Delta.contains(4.0));
        assert!(Band::Theta.contains(4.0));
        assert!(Band::Gamma.contains(100.0));
        assert!(!Band::Gamma.contains(100.5));
    }

    #[test]
    fn periodogram_bin_layout() {
        let (f, p) = periodogram(&[0.0; 100], 250.0);
        assert_eq!(f.len(), 51);
        assert_eq!(p.len(), 51);
        approx::assert_abs_diff_eq!(f[1], 2.5, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(f[50], 125.0, epsilon = 1e-12);
    }

    #[test]
    fn density_integrates_to_variance() {
        // Hann-windowed density PSD of a bin-centred sine integrates to its power.
        let x: Vec<f64> = (0..200).map(|t| 2.0 * (2.0 * PI * 25.0 * t as f64 / 200.0).sin()).collect();
        let (f, p) = periodogram(&x, 200.0);
        let df = f[1] - f[0];
        let total: f64 = p.iter().sum::<f64>() * df;
        approx::assert_relative_eq!(total, 2.0, max_relative = 1e-9);
    }

    #[test]
    fn too_short_window_is_insufficient() {
        let w = Array2::<f64>::zeros((1, 1));
        assert!(matches!(
            extract_band_powers(&w, 250.0),
            Err(ScoreError::InsufficientData { len: 1, required: 2 })
        ));
    }
}
