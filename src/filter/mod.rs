//! Band-limiting filter design and application.
//!
//! - [`design`]: digital Butterworth band-pass, matching
//!   `scipy.signal.butter(order, [lo, hi], btype='band')`.
//! - [`apply`]: forward-backward zero-phase filtering, matching
//!   `scipy.signal.filtfilt(b, a, x, padtype='odd')`.

pub mod apply;
pub mod design;

pub use apply::{bandpass_filter, lfilter, lfilter_zi, Bandpass};
pub use design::{butter_bandpass, BandpassCoeffs};
