//! Where samples come from.
//!
//! A run asks a [`StreamResolver`] for a named stream and then pulls single
//! multichannel samples from the [`SampleSource`] it returns. Both are trait
//! objects chosen once at run start:
//!
//! | resolver              | source              | use                              |
//! |-----------------------|---------------------|----------------------------------|
//! | [`SimulatedResolver`] | [`SimulatedSource`] | demo / bench without hardware    |
//! | [`RecordingResolver`] | [`RecordingSource`] | replay of a stored safetensors   |
//!
//! A stream-network binding implements the same two traits.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{CarouselError, SourceError};
use crate::events::NotificationBus;
use crate::io::Recording;

/// One multichannel sample.
pub type Sample = Vec<f64>;

/// An open stream of multichannel samples.
pub trait SampleSource: Send {
    /// Wait at most `timeout` for the next sample.
    ///
    /// `Ok(None)` is a routine miss, not an error.
    fn pull(&mut self, timeout: Duration) -> Result<Option<Sample>, SourceError>;

    fn channel_count(&self) -> usize;

    /// Rate the stream advertises, if any.
    fn nominal_srate(&self) -> Option<f64> {
        None
    }
}

/// Finds streams by name.
pub trait StreamResolver: Send {
    /// One non-blocking lookup attempt.
    fn resolve(&mut self, name: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError>;
}

impl<R: StreamResolver + ?Sized> StreamResolver for Box<R> {
    fn resolve(&mut self, name: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError> {
        (**self).resolve(name)
    }
}

/// Poll `resolver` every `retry` until the stream appears, `timeout` elapses,
/// or the run is cancelled. Failed lookups are reported and retried.
pub fn discover(
    resolver: &mut dyn StreamResolver,
    name: &str,
    timeout: Duration,
    retry: Duration,
    cancel: &CancelToken,
    bus: &NotificationBus,
) -> Result<Box<dyn SampleSource>, CarouselError> {
    let started = Instant::now();
    let retry = retry.max(Duration::from_millis(1));
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(CarouselError::Cancelled);
        }
        attempts += 1;
        match resolver.resolve(name) {
            Ok(Some(source)) => {
                debug!(name, attempts, elapsed = ?started.elapsed(), "stream resolved");
                return Ok(source);
            }
            Ok(None) => {}
            Err(e) => bus.warning(format!("Stream lookup for '{name}' failed: {e}")),
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(CarouselError::DiscoveryTimeout { name: name.to_string(), timeout });
        }
        if !cancel.sleep(retry.min(timeout - elapsed), retry) {
            return Err(CarouselError::Cancelled);
        }
    }
}

// ── Real-time pacing ─────────────────────────────────────────────────────────

/// Releases one tick per sample period, like a live inlet filling up.
///
/// A consumer slower than the rate sees ticks queue up; the backlog is capped
/// at [`Pacer::MAX_LAG`], after which the pacer resynchronises to now.
#[derive(Debug, Clone)]
pub struct Pacer {
    period: Duration,
    next_due: Instant,
}

impl Pacer {
    pub const MAX_LAG: Duration = Duration::from_secs(1);

    pub fn new(rate_hz: f64) -> Self {
        let period = if rate_hz.is_finite() && rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / rate_hz)
        } else {
            Duration::ZERO
        };
        Self { period, next_due: Instant::now() }
    }

    /// Wait at most `timeout` for the next tick. `true` if one is due.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let now = Instant::now();
        if now < self.next_due {
            let remaining = self.next_due - now;
            if remaining > timeout {
                thread::sleep(timeout);
                return false;
            }
            thread::sleep(remaining);
        } else if now - self.next_due > Self::MAX_LAG {
            self.next_due = now;
        }
        self.next_due += self.period;
        true
    }
}

// ── Simulation ───────────────────────────────────────────────────────────────

/// Synthetic stream: per-channel theta (6 Hz) and alpha (10 Hz) sinusoids
/// plus uniform noise, paced at `sfreq`.
///
/// The theta amplitude drifts slowly so the relaxation index changes over a
/// run and different clips score differently.
#[derive(Debug)]
pub struct SimulatedSource {
    n_channels: usize,
    sfreq: f64,
    n: u64,
    rng: StdRng,
    pacer: Pacer,
    theta_amp: f64,
    alpha_amp: f64,
    noise_amp: f64,
    drift_period: f64,
}

impl SimulatedSource {
    pub fn new(n_channels: usize, sfreq: f64, seed: u64) -> Self {
        Self {
            n_channels,
            sfreq,
            n: 0,
            rng: StdRng::seed_from_u64(seed),
            pacer: Pacer::new(sfreq),
            theta_amp: 10.0,
            alpha_amp: 10.0,
            noise_amp: 2.0,
            drift_period: 37.0,
        }
    }

    /// Sample at time index `n`, without pacing.
    fn synthesize(&mut self, n: u64) -> Sample {
        let t = n as f64 / self.sfreq;
        let drift = 1.0 + 0.6 * (2.0 * PI * t / self.drift_period).sin();
        (0..self.n_channels)
            .map(|c| {
                let phase = c as f64 * 0.7;
                let theta = self.theta_amp * drift * (2.0 * PI * 6.0 * t + phase).sin();
                let alpha = self.alpha_amp * (2.0 * PI * 10.0 * t + 0.5 * phase).sin();
                let noise = self.noise_amp * self.rng.gen_range(-1.0f64..=1.0);
                theta + alpha + noise
            })
            .collect()
    }
}

impl SampleSource for SimulatedSource {
    fn pull(&mut self, timeout: Duration) -> Result<Option<Sample>, SourceError> {
        if !self.pacer.wait(timeout) {
            return Ok(None);
        }
        let n = self.n;
        self.n += 1;
        Ok(Some(self.synthesize(n)))
    }

    fn channel_count(&self) -> usize {
        self.n_channels
    }

    fn nominal_srate(&self) -> Option<f64> {
        Some(self.sfreq)
    }
}

/// Answers every lookup with a fresh [`SimulatedSource`].
#[derive(Debug, Clone)]
pub struct SimulatedResolver {
    pub n_channels: usize,
    pub sfreq: f64,
    pub seed: u64,
}

impl StreamResolver for SimulatedResolver {
    fn resolve(&mut self, name: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError> {
        info!(name, channels = self.n_channels, sfreq = self.sfreq, "using simulated stream");
        Ok(Some(Box::new(SimulatedSource::new(self.n_channels, self.sfreq, self.seed))))
    }
}

// ── Recording replay ─────────────────────────────────────────────────────────

/// Replays a [`Recording`] column by column at its own sampling rate.
/// Once exhausted every pull is a miss.
#[derive(Debug)]
pub struct RecordingSource {
    recording: Recording,
    cursor: usize,
    pacer: Pacer,
}

impl RecordingSource {
    pub fn new(recording: Recording) -> Self {
        let pacer = Pacer::new(recording.sfreq);
        Self { recording, cursor: 0, pacer }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.recording.n_samples()
    }
}

impl SampleSource for RecordingSource {
    fn pull(&mut self, timeout: Duration) -> Result<Option<Sample>, SourceError> {
        if self.is_exhausted() {
            thread::sleep(timeout);
            return Ok(None);
        }
        if !self.pacer.wait(timeout) {
            return Ok(None);
        }
        let sample = self.recording.data.column(self.cursor).to_vec();
        self.cursor += 1;
        if self.is_exhausted() {
            debug!(samples = self.cursor, "recording exhausted");
        }
        Ok(Some(sample))
    }

    fn channel_count(&self) -> usize {
        self.recording.n_channels()
    }

    fn nominal_srate(&self) -> Option<f64> {
        Some(self.recording.sfreq)
    }
}

/// Serves one recording under a fixed stream name.
#[derive(Debug, Clone)]
pub struct RecordingResolver {
    pub name: String,
    pub recording: Recording,
}

impl StreamResolver for RecordingResolver {
    fn resolve(&mut self, name: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError> {
        if name != self.name {
            return Ok(None);
        }
        Ok(Some(Box::new(RecordingSource::new(self.recording.clone()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    struct Never;

    impl StreamResolver for Never {
        fn resolve(&mut self, _: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError> {
            Ok(None)
        }
    }

    #[test]
    fn discovery_times_out() {
        let (bus, _rx) = NotificationBus::channel();
        let start = Instant::now();
        let err = discover(
            &mut Never,
            "EEG",
            Duration::from_millis(60),
            Duration::from_millis(10),
            &CancelToken::new(),
            &bus,
        )
        .err()
        .unwrap();
        assert!(matches!(err, CarouselError::DiscoveryTimeout { .. }));
        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn discovery_honours_cancellation() {
        let (bus, _rx) = NotificationBus::channel();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = discover(
            &mut Never,
            "EEG",
            Duration::from_secs(5),
            Duration::from_millis(10),
            &cancel,
            &bus,
        )
        .err()
        .unwrap();
        assert!(matches!(err, CarouselError::Cancelled));
    }

    #[test]
    fn simulated_source_is_seeded() {
        let mut a = SimulatedSource::new(3, 250.0, 7);
        let mut b = SimulatedSource::new(3, 250.0, 7);
        for n in 0..20 {
            assert_eq!(a.synthesize(n), b.synthesize(n));
        }
        assert_eq!(a.synthesize(0).len(), 3);
    }

    #[test]
    fn pacer_releases_ticks_at_rate() {
        let mut p = Pacer::new(1000.0);
        let start = Instant::now();
        let mut ticks = 0;
        while ticks < 50 {
            if p.wait(Duration::from_millis(10)) {
                ticks += 1;
            }
        }
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn recording_resolver_matches_name_only() {
        let rec = Recording {
            data: Array2::from_shape_fn((2, 3), |(c, t)| (c * 10 + t) as f64),
            sfreq: 1000.0,
            ch_names: vec![],
        };
        let mut r = RecordingResolver { name: "EEG".into(), recording: rec };
        assert!(r.resolve("other").unwrap().is_none());
        let mut s = r.resolve("EEG").unwrap().unwrap();
        assert_eq!(s.channel_count(), 2);
        let mut got = vec![];
        while got.len() < 3 {
            if let Some(x) = s.pull(Duration::from_millis(10)).unwrap() {
                got.push(x);
            }
        }
        assert_eq!(got, vec![vec![0.0, 10.0], vec![1.0, 11.0], vec![2.0, 12.0]]);
        assert_eq!(s.pull(Duration::from_millis(1)).unwrap(), None);
    }
}
