//! Butterworth band-pass design matching `scipy.signal.butter(order, [lo, hi], btype='band')`.
//!
//!   • analog prototype: `order` poles on the left half of the unit circle
//!   • pre-warp both edges: `w = 4·tan(π·f / fs)` (bilinear with fs = 2)
//!   • low-pass → band-pass: every prototype pole splits into two
//!   • bilinear transform, then expand zeros/poles into `b`, `a` polynomials
//!
//! The result is in transfer-function form with `2·order + 1` coefficients in
//! each polynomial and `a[0] == 1`.
use rustfft::num_complex::Complex;
use std::f64::consts::PI;

use crate::error::FilterError;

type C64 = Complex<f64>;

/// Transfer-function coefficients of a digital IIR filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassCoeffs {
    /// Numerator, highest power of `z⁻¹` last.
    pub b: Vec<f64>,
    /// Denominator, `a[0] == 1`.
    pub a: Vec<f64>,
}

impl BandpassCoeffs {
    /// Number of coefficients in the longer polynomial.
    pub fn kernel_len(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Shortest input `filtfilt` accepts: the odd extension needs
    /// `3 · kernel_len` samples on each side plus one anchor sample.
    pub fn min_input_len(&self) -> usize {
        3 * self.kernel_len() + 1
    }
}

/// Design a digital Butterworth band-pass filter.
///
/// `low_hz` and `high_hz` are the −3 dB edges, `sfreq` the sampling rate.
/// Fails with [`FilterError::InvalidDesign`] unless `order > 0` and
/// `0 < low_hz < high_hz < sfreq/2`.
pub fn butter_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sfreq: f64,
) -> Result<BandpassCoeffs, FilterError> {
    let nyq = 0.5 * sfreq;
    if order == 0 || !(low_hz > 0.0 && low_hz < high_hz && high_hz < nyq) {
        return Err(FilterError::InvalidDesign { order, low_hz, high_hz, sfreq });
    }

    // Normalised edges and bilinear pre-warp with fs = 2.
    let fs = 2.0;
    let warp = |f: f64| 2.0 * fs * (PI * (f / nyq) / fs).tan();
    let (wl, wh) = (warp(low_hz), warp(high_hz));
    let bw = wh - wl;
    let wo = (wl * wh).sqrt();

    // Analog low-pass prototype (unit cutoff, no zeros, k = 1).
    let proto = buttap(order);

    // Low-pass → band-pass.
    let mut poles = Vec::with_capacity(2 * order);
    for &p in &proto {
        let p_lp = p * (bw / 2.0);
        let disc = (p_lp * p_lp - C64::new(wo * wo, 0.0)).sqrt();
        poles.push(p_lp + disc);
        poles.push(p_lp - disc);
    }
    let zeros_analog = vec![C64::new(0.0, 0.0); order];
    let k_analog = bw.powi(order as i32);

    // Bilinear transform.
    let fs2 = C64::new(2.0 * fs, 0.0);
    let mut zeros: Vec<C64> = zeros_analog.iter().map(|&z| (fs2 + z) / (fs2 - z)).collect();
    let poles_z: Vec<C64> = poles.iter().map(|&p| (fs2 + p) / (fs2 - p)).collect();
    // Degree difference (poles − zeros) goes to Nyquist.
    zeros.extend(std::iter::repeat(C64::new(-1.0, 0.0)).take(poles.len() - zeros_analog.len()));

    let num: C64 = zeros_analog.iter().map(|&z| fs2 - z).product();
    let den: C64 = poles.iter().map(|&p| fs2 - p).product();
    let k = k_analog * (num / den).re;

    let b: Vec<f64> = poly(&zeros).into_iter().map(|c| k * c.re).collect();
    let a: Vec<f64> = poly(&poles_z).into_iter().map(|c| c.re).collect();
    Ok(BandpassCoeffs { b, a })
}

/// Poles of the analog Butterworth low-pass prototype of order `n`.
fn buttap(n: usize) -> Vec<C64> {
    // m = -n+1, -n+3, …, n-1
    (0..n)
        .map(|i| {
            let m = 2.0 * i as f64 - (n as f64 - 1.0);
            -C64::from_polar(1.0, PI * m / (2.0 * n as f64))
        })
        .collect()
}

/// Expand `∏ (x − rᵢ)` into coefficients, highest power first.
fn poly(roots: &[C64]) -> Vec<C64> {
    let mut c = vec![C64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![C64::new(0.0, 0.0); c.len() + 1];
        for (i, &ci) in c.iter().enumerate() {
            next[i] += ci;
            next[i + 1] -= ci * r;
        }
        c = next;
    }
    c
}
