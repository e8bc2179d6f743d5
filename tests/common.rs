/// Shared helpers for the integration tests: scripted streams, capturing
/// marker sinks and event collection.
use biocarousel::{
    CancelToken, CarouselConfig, CarouselEvent, MarkerError, MarkerSink, Sample, SampleSource,
    ScoreError, SourceError, StreamResolver,
};
use crossbeam_channel::Receiver;
use ndarray::Array2;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Value the scripted source is currently emitting on every channel.
#[derive(Clone, Default)]
pub struct Level(Arc<AtomicU64>);

#[allow(unused)]
impl Level {
    pub fn new(v: f64) -> Self {
        let l = Self::default();
        l.set(v);
        l
    }

    pub fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::SeqCst);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }
}

/// Delivers a sample on every pull, all channels at the current [`Level`].
pub struct ScriptedSource {
    pub level: Level,
    pub n_channels: usize,
}

impl SampleSource for ScriptedSource {
    fn pull(&mut self, _timeout: Duration) -> Result<Option<Sample>, SourceError> {
        Ok(Some(vec![self.level.get(); self.n_channels]))
    }

    fn channel_count(&self) -> usize {
        self.n_channels
    }
}

/// Finds the stream only from the `appear_after`-th attempt on
/// (`usize::MAX` = never).
pub struct ScriptedResolver {
    pub level: Level,
    pub n_channels: usize,
    pub appear_after: usize,
    pub attempts: Arc<AtomicU64>,
}

#[allow(unused)]
impl ScriptedResolver {
    pub fn new(level: Level, n_channels: usize) -> Self {
        Self { level, n_channels, appear_after: 1, attempts: Arc::default() }
    }

    pub fn never() -> Self {
        Self { appear_after: usize::MAX, ..Self::new(Level::default(), 1) }
    }
}

impl StreamResolver for ScriptedResolver {
    fn resolve(&mut self, _name: &str) -> Result<Option<Box<dyn SampleSource>>, SourceError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) as usize + 1;
        if n < self.appear_after {
            return Ok(None);
        }
        Ok(Some(Box::new(ScriptedSource {
            level: self.level.clone(),
            n_channels: self.n_channels,
        })))
    }
}

/// Records every token. Optionally switches a [`Level`] on `Start_video_<n>`
/// (clip n plays `levels[n - 1]`) and cancels a run when a token is seen for
/// the k-th time.
#[derive(Default)]
pub struct CapturingSink {
    pub tokens: Arc<Mutex<Vec<String>>>,
    pub levels: Option<(Level, Vec<f64>)>,
    pub cancel_on: Option<(String, usize, CancelToken)>,
    pub broken: bool,
}

impl MarkerSink for CapturingSink {
    fn push(&mut self, token: &str) -> Result<(), MarkerError> {
        if self.broken {
            return Err(MarkerError::Closed);
        }
        let mut tokens = self.tokens.lock().unwrap();
        tokens.push(token.to_string());
        if let Some((level, values)) = &self.levels {
            if let Some(n) = token.strip_prefix("Start_video_").and_then(|n| n.parse::<usize>().ok())
            {
                if let Some(&v) = values.get(n - 1) {
                    level.set(v);
                }
            }
        }
        if let Some((wanted, k, cancel)) = &self.cancel_on {
            if tokens.iter().filter(|t| *t == wanted).count() == *k {
                cancel.cancel();
            }
        }
        Ok(())
    }
}

/// Scores a window as the newest sample of its first channel.
#[allow(unused)]
pub fn newest_sample(window: &Array2<f64>) -> Result<f64, ScoreError> {
    let t = window.ncols();
    if t == 0 {
        return Err(ScoreError::InsufficientData { len: 0, required: 1 });
    }
    Ok(window[[0, t - 1]])
}

/// Millisecond-scale timing so a whole run takes about a second.
#[allow(unused)]
pub fn fast_config() -> CarouselConfig {
    CarouselConfig {
        stream_name: "TestStream".into(),
        num_channels: 2,
        window_size: 4,
        eval_stride: 1,
        raw_sample_stride: 5,
        slot_durations: [0.10, 0.16, 0.16, 0.16, 0.16, 0.16, 0.10],
        winner_duration: 0.05,
        inter_slot_pause: 0.01,
        end_pause: 0.01,
        pull_timeout: 0.001,
        poll_interval: 0.001,
        discovery_timeout: 1.0,
        discovery_retry: 0.01,
        cancel_step: 0.005,
        ..CarouselConfig::default()
    }
}

/// Drain events up to and including the first `FinalResults`, or until
/// `timeout` passes.
#[allow(unused)]
pub fn collect_until_final(rx: &Receiver<CarouselEvent>, timeout: Duration) -> Vec<CarouselEvent> {
    let deadline = Instant::now() + timeout;
    let mut out = vec![];
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(ev) => {
                let done = ev.is_terminal();
                out.push(ev);
                if done {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    out
}

#[allow(unused)]
pub fn final_events(events: &[CarouselEvent]) -> Vec<&CarouselEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

#[allow(unused)]
pub fn status_lines(events: &[CarouselEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            CarouselEvent::Status { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
