//! Forward-backward (zero-phase) IIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, a, x, padtype='odd')`:
//!
//! 1. Odd-extend the signal by `padlen = 3 · max(len(a), len(b))` samples on
//!    each side (point reflection around the end samples).
//! 2. Run `lfilter` forward with steady-state initial conditions scaled by the
//!    first extended sample, then backward over the reversed output scaled by
//!    its first sample.
//! 3. Strip the padding.
//!
//! Inputs of `padlen` samples or fewer are rejected with
//! [`FilterError::InsufficientData`].
use ndarray::Array2;

use super::design::{butter_bandpass, BandpassCoeffs};
use crate::error::FilterError;

/// A designed band-pass filter ready to be applied to windows.
///
/// Designing is the expensive part; build one per session and reuse it.
#[derive(Debug, Clone)]
pub struct Bandpass {
    coeffs: BandpassCoeffs,
    zi: Vec<f64>,
}

impl Bandpass {
    /// Design an order-`order` Butterworth band-pass and precompute its
    /// steady-state initial conditions.
    pub fn design(low_hz: f64, high_hz: f64, sfreq: f64, order: usize) -> Result<Self, FilterError> {
        let coeffs = butter_bandpass(order, low_hz, high_hz, sfreq)?;
        let zi = lfilter_zi(&coeffs.b, &coeffs.a)?;
        Ok(Self { coeffs, zi })
    }

    pub fn coeffs(&self) -> &BandpassCoeffs {
        &self.coeffs
    }

    /// Shortest window length [`Bandpass::apply`] accepts.
    pub fn min_len(&self) -> usize {
        self.coeffs.min_input_len()
    }

    /// Zero-phase filter every channel (row) of `window` ([C, T]).
    pub fn apply(&self, window: &Array2<f64>) -> Result<Array2<f64>, FilterError> {
        let n_t = window.ncols();
        if n_t < self.min_len() {
            return Err(FilterError::InsufficientData { len: n_t, required: self.min_len() });
        }
        let mut out = Array2::<f64>::zeros(window.raw_dim());
        for (row, mut dst) in window.rows().into_iter().zip(out.rows_mut()) {
            let x: Vec<f64> = row.to_vec();
            let y = self.filtfilt(&x)?;
            dst.assign(&ndarray::ArrayView1::from(&y));
        }
        Ok(out)
    }

    /// Zero-phase filter a single 1-D signal.
    pub fn filtfilt(&self, x: &[f64]) -> Result<Vec<f64>, FilterError> {
        let (b, a) = (&self.coeffs.b, &self.coeffs.a);
        let edge = 3 * self.coeffs.kernel_len();
        if x.len() <= edge {
            return Err(FilterError::InsufficientData { len: x.len(), required: edge + 1 });
        }

        let ext = odd_extend(x, edge);

        let zi_fwd: Vec<f64> = self.zi.iter().map(|&z| z * ext[0]).collect();
        let mut y = lfilter(b, a, &ext, &zi_fwd);

        y.reverse();
        let zi_bwd: Vec<f64> = self.zi.iter().map(|&z| z * y[0]).collect();
        let mut y = lfilter(b, a, &y, &zi_bwd);
        y.reverse();

        if y.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::NonFinite);
        }
        Ok(y[edge..edge + x.len()].to_vec())
    }
}

/// Zero-phase band-pass of a [C, T] window in one call.
///
/// Designs the filter on every call; prefer [`Bandpass`] in loops.
pub fn bandpass_filter(
    window: &Array2<f64>,
    low_hz: f64,
    high_hz: f64,
    sfreq: f64,
    order: usize,
) -> Result<Array2<f64>, FilterError> {
    Bandpass::design(low_hz, high_hz, sfreq, order)?.apply(window)
}

/// Direct-form II transposed IIR filter with initial state `zi`.
///
/// `a[0]` must be 1. `zi.len()` must be `max(len(a), len(b)) - 1`.
pub fn lfilter(b: &[f64], a: &[f64], x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = a.len().max(b.len());
    let coef = |p: &[f64], i: usize| p.get(i).copied().unwrap_or(0.0);
    let mut z = zi.to_vec();
    z.resize(n - 1, 0.0);

    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = coef(b, 0) * xn + z.first().copied().unwrap_or(0.0);
        for i in 0..n.saturating_sub(2) {
            z[i] = coef(b, i + 1) * xn + z[i + 1] - coef(a, i + 1) * yn;
        }
        if n >= 2 {
            z[n - 2] = coef(b, n - 1) * xn - coef(a, n - 1) * yn;
        }
        y.push(yn);
    }
    y
}

/// Steady-state initial conditions for [`lfilter`] (step response), as in
/// `scipy.signal.lfilter_zi`.
///
/// Solves `(I − Aᵀ) zi = b[1:] − a[1:]·b[0]`, `A` being the companion matrix
/// of `a`.
pub fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>, FilterError> {
    let n = a.len().max(b.len());
    if n < 2 {
        return Ok(vec![]);
    }
    let a0 = a[0];
    let coef = |p: &[f64], i: usize| p.get(i).copied().unwrap_or(0.0) / a0;
    let m = n - 1;

    let mut mat = vec![vec![0.0_f64; m]; m];
    for (i, row) in mat.iter_mut().enumerate() {
        row[i] += 1.0;
        row[0] += coef(a, i + 1);
        if i + 1 < m {
            row[i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (1..n).map(|i| coef(b, i) - coef(a, i) * coef(b, 0)).collect();
    solve(mat, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut m: Vec<Vec<f64>>, mut v: Vec<f64>) -> Result<Vec<f64>, FilterError> {
    let n = v.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < 1e-300 {
            return Err(FilterError::Singular);
        }
        m.swap(col, pivot);
        v.swap(col, pivot);
        let pivot_row = m[col].clone();
        let pivot_v = v[col];
        for r in col + 1..n {
            let f = m[r][col] / pivot_row[col];
            if f == 0.0 {
                continue;
            }
            for (dst, &p) in m[r][col..].iter_mut().zip(&pivot_row[col..]) {
                *dst -= f * p;
            }
            v[r] -= f * pivot_v;
        }
    }
    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let s: f64 = (r + 1..n).map(|c| m[r][c] * x[c]).sum();
        x[r] = (v[r] - s) / m[r][r];
    }
    Ok(x)
}

/// Odd extension by `n` samples on both ends (point reflection).
///
/// Left:  `2·x[0]  − x[i]`       for i = n..1
/// Right: `2·x[-1] − x[-1 − i]`  for i = 1..n
///
/// Caller guarantees `x.len() > n`.
fn odd_extend(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let first = x[0];
    let last = x[len - 1];
    let mut out = Vec::with_capacity(len + 2 * n);
    out.extend((1..=n).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=n).map(|i| 2.0 * last - x[len - 1 - i]));
    out
}
