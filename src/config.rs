//! Carousel configuration.
//!
//! [`CarouselConfig`] holds every tunable parameter of a run. All fields have
//! defaults matching the deployed installation (7 clips of 5/8/8/8/8/8/5 s,
//! 250 Hz stream, 1–50 Hz order-5 band-pass, 100-sample window).
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::filter::butter_bandpass;
use crate::schedule::{StimulusSlot, SLOT_COUNT};

/// Configuration for one carousel run.
///
/// All fields are `pub`, so struct-update syntax works:
///
/// ```
/// use biocarousel::CarouselConfig;
///
/// let cfg = CarouselConfig {
///     stream_name: "EEG_Raw".into(),
///     window_size: 200,
///     ..CarouselConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Name of the physiological stream to discover.
    ///
    /// Default: `"AURA_Filtered"`.
    pub stream_name: String,

    /// Channels kept from each sample (extra channels are dropped, missing
    /// ones read as 0). Must be 1–8.
    ///
    /// Default: `8`.
    pub num_channels: usize,

    /// Sampling rate assumed by the DSP stages, in Hz.
    ///
    /// Default: `250.0`.
    pub sfreq: f64,

    /// Target size of the sliding window. The buffer is trimmed back to this
    /// size whenever it reaches twice as many samples.
    ///
    /// Default: `100`.
    pub window_size: usize,

    /// Evaluate a window every `eval_stride`-th accepted sample.
    ///
    /// Default: `10`.
    pub eval_stride: u64,

    /// Publish a raw-sample event every `raw_sample_stride`-th accepted sample.
    ///
    /// Default: `5`.
    pub raw_sample_stride: u64,

    /// Band-pass lower edge in Hz. Default: `1.0`.
    pub low_hz: f64,

    /// Band-pass upper edge in Hz. Default: `50.0`.
    pub high_hz: f64,

    /// Butterworth order. Default: `5`.
    pub filter_order: usize,

    /// Duration of each of the seven slots.
    ///
    /// Default: `[5, 8, 8, 8, 8, 8, 5]`.
    pub slot_durations: [f64; SLOT_COUNT],

    /// How long the winning clip is replayed. Default: `5.0`.
    pub winner_duration: f64,

    /// Pause after every slot. Default: `0.25`.
    pub inter_slot_pause: f64,

    /// Pause between the replay's `fadeout` and `end_session`. Default: `0.25`.
    pub end_pause: f64,

    /// Bounded wait for one sample. Default: `0.01`.
    pub pull_timeout: f64,

    /// Pacing sleep after every inner-loop iteration; `0` disables it.
    ///
    /// Default: `0.01`.
    pub poll_interval: f64,

    /// How long discovery may take before the run gives up. Default: `5.0`.
    pub discovery_timeout: f64,

    /// Interval between discovery attempts. Default: `0.1`.
    pub discovery_retry: f64,

    /// Step of every cooperative sleep, i.e. worst-case cancellation latency.
    ///
    /// Default: `0.05`.
    pub cancel_step: f64,

    /// Inner-loop iterations allowed per slot before it is forced to end.
    ///
    /// Default: `10_000`.
    pub safety_limit: u64,

    /// Suffix of the terminal marker, `end_session:<tag>`.
    ///
    /// Default: `"zensync"`.
    pub end_session_tag: String,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            stream_name: "AURA_Filtered".into(),
            num_channels: 8,
            sfreq: 250.0,
            window_size: 100,
            eval_stride: 10,
            raw_sample_stride: 5,
            low_hz: 1.0,
            high_hz: 50.0,
            filter_order: 5,
            slot_durations: [5.0, 8.0, 8.0, 8.0, 8.0, 8.0, 5.0],
            winner_duration: 5.0,
            inter_slot_pause: 0.25,
            end_pause: 0.25,
            pull_timeout: 0.01,
            poll_interval: 0.01,
            discovery_timeout: 5.0,
            discovery_retry: 0.1,
            cancel_step: 0.05,
            safety_limit: 10_000,
            end_session_tag: "zensync".into(),
        }
    }
}

impl CarouselConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the pipeline cannot run with.
    ///
    /// Runs [`CarouselConfig::validate_run`], then checks the band-pass design
    /// and that `window_size` covers the filter's minimum input length.
    pub fn validate(&self) -> Result<()> {
        self.validate_run()?;
        let needed = butter_bandpass(self.filter_order, self.low_hz, self.high_hz, self.sfreq)
            .map_err(|e| anyhow!("band-pass: {e}"))?
            .min_input_len();
        if self.window_size < needed {
            bail!(
                "window_size {} is shorter than the {needed} samples an order-{} filter needs",
                self.window_size,
                self.filter_order
            );
        }
        Ok(())
    }

    /// The subset of [`CarouselConfig::validate`] the run loop itself relies
    /// on: channels, strides, timings and the safety bound.
    ///
    /// Short windows pass here; the conditioner skips them at run time.
    pub fn validate_run(&self) -> Result<()> {
        if self.stream_name.trim().is_empty() {
            bail!("stream_name must not be empty");
        }
        if !(1..=8).contains(&self.num_channels) {
            bail!("num_channels must be 1–8, got {}", self.num_channels);
        }
        if !(self.sfreq.is_finite() && self.sfreq > 0.0) {
            bail!("sfreq must be positive, got {}", self.sfreq);
        }
        if self.window_size == 0 {
            bail!("window_size must be at least 1");
        }
        if self.eval_stride == 0 || self.raw_sample_stride == 0 {
            bail!("eval_stride and raw_sample_stride must be at least 1");
        }
        let durations = self
            .slot_durations
            .iter()
            .chain([
                &self.winner_duration,
                &self.inter_slot_pause,
                &self.end_pause,
                &self.pull_timeout,
                &self.poll_interval,
                &self.discovery_timeout,
                &self.discovery_retry,
            ]);
        for &d in durations {
            if !(d.is_finite() && d >= 0.0) {
                bail!("durations must be finite and non-negative, got {d}");
            }
        }
        if !(self.cancel_step.is_finite() && self.cancel_step > 0.0) {
            bail!("cancel_step must be positive, got {}", self.cancel_step);
        }
        if self.safety_limit == 0 {
            bail!("safety_limit must be at least 1");
        }
        Ok(())
    }

    /// The seven slots of a run, in playback order.
    pub fn schedule(&self) -> [StimulusSlot; SLOT_COUNT] {
        StimulusSlot::schedule(&self.slot_durations)
    }

    pub fn winner_duration(&self) -> Duration {
        secs(self.winner_duration)
    }

    pub fn inter_slot_pause(&self) -> Duration {
        secs(self.inter_slot_pause)
    }

    pub fn end_pause(&self) -> Duration {
        secs(self.end_pause)
    }

    pub fn pull_timeout(&self) -> Duration {
        secs(self.pull_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval)
    }

    pub fn discovery_timeout(&self) -> Duration {
        secs(self.discovery_timeout)
    }

    pub fn discovery_retry(&self) -> Duration {
        secs(self.discovery_retry)
    }

    pub fn cancel_step(&self) -> Duration {
        secs(self.cancel_step)
    }
}

/// Seconds → `Duration`, clamping negatives and NaN to zero.
pub(crate) fn secs(s: f64) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_secs_f64(s)
    } else {
        Duration::ZERO
    }
}
