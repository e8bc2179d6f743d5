//! The carousel run: discovery, seven scored clips, winner replay.
//!
//! ```text
//! Idle ─→ Discovering ─→ PerSlotLoop(0..=6) ─→ Deciding ─┬─→ WinnerReplay ─→ Completed
//!              │                 │                        └──────────────────→ Completed
//!              └────────┬────────┴──→ Cancelled (stop requested)
//!                       └───────────→ Failed    (discovery timeout, fault, panic)
//! ```
//!
//! Per slot:
//!
//! 1. `Start_video_<n>`, `fadein`
//! 2. until the slot duration elapses (or the safety bound trips): pull one
//!    sample, append to the window buffer, publish every
//!    `raw_sample_stride`-th sample, and on every `eval_stride`-th sample
//!    score the window and slide it by one
//! 3. slot result = mean of the window scores (0 if none); competitor slots
//!    publish a partial result and update the running maximum
//! 4. `fadeout`, progress, inter-slot pause
//!
//! Whatever happens, [`Carousel::run`] publishes exactly one
//! [`CarouselEvent::FinalResults`](crate::events::CarouselEvent::FinalResults).
//! Cancelled and failed runs report seven zeros and no winner. Once a winner
//! is decided the run completes; a stop during the replay only shortens it.
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, info_span};

use crate::buffer::WindowBuffer;
use crate::cancel::{CancelToken, SafetyCounter};
use crate::competition::Competition;
use crate::config::CarouselConfig;
use crate::error::{CarouselError, ScoreError};
use crate::events::NotificationBus;
use crate::schedule::{progress_percent, StimulusSlot, SLOT_COUNT};
use crate::scorer::{RelaxationScorer, WindowScorer};
use crate::source::{discover, SampleSource, StreamResolver};
use crate::trigger::{Marker, MarkerSink, TriggerChannel};

/// Accepted samples between two throttled per-evaluation status lines.
const STATUS_EVERY: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    /// Playing and scoring slot `i`.
    PerSlotLoop(usize),
    Deciding,
    WinnerReplay,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

/// What a finished run reported in its terminal event.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub phase: Phase,
    pub results: [f64; SLOT_COUNT],
    pub winner: Option<usize>,
}

impl RunOutcome {
    fn aborted(phase: Phase) -> Self {
        Self { phase, results: [0.0; SLOT_COUNT], winner: None }
    }

    /// `winner` as the wire index (−1 for none).
    pub fn winner_index(&self) -> i32 {
        self.winner.map_or(-1, |w| w as i32)
    }
}

/// One configured carousel run. Consumed by [`Carousel::run`].
pub struct Carousel {
    cfg: CarouselConfig,
    resolver: Box<dyn StreamResolver>,
    bus: NotificationBus,
    cancel: CancelToken,
    marker_sink: Option<Box<dyn MarkerSink>>,
    scorer: Option<Box<dyn WindowScorer>>,
    session_id: String,
}

impl Carousel {
    pub fn new(
        cfg: CarouselConfig,
        resolver: impl StreamResolver + 'static,
        bus: NotificationBus,
        cancel: CancelToken,
    ) -> Self {
        Self {
            cfg,
            resolver: Box::new(resolver),
            bus,
            cancel,
            marker_sink: None,
            scorer: None,
            session_id: String::new(),
        }
    }

    /// Marker destination. Without one, markers are only logged.
    pub fn with_marker_sink(mut self, sink: impl MarkerSink + 'static) -> Self {
        self.marker_sink = Some(Box::new(sink));
        self
    }

    /// Replace the default [`RelaxationScorer`].
    pub fn with_scorer(mut self, scorer: impl WindowScorer + 'static) -> Self {
        self.scorer = Some(Box::new(scorer));
        self
    }

    /// Opaque identifier of the enclosing session, attached to every log line.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CarouselConfig {
        &self.cfg
    }

    /// Execute the run on the calling thread.
    pub fn run(self) -> RunOutcome {
        let span = info_span!("carousel", session = %self.session_id);
        let _guard = span.enter();
        let bus = self.bus.clone();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| Session::new(self).run())) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(CarouselError::Cancelled)) => {
                bus.status("Carousel interrupted");
                RunOutcome::aborted(Phase::Cancelled)
            }
            Ok(Err(e)) => {
                bus.critical(format!("Carousel failed: {e}"));
                RunOutcome::aborted(Phase::Failed)
            }
            Err(payload) => {
                bus.critical(format!("Carousel fault: {}", panic_message(&*payload)));
                RunOutcome::aborted(Phase::Failed)
            }
        };
        info!(phase = ?outcome.phase, winner = outcome.winner_index(), "run finished");
        bus.final_results(outcome.results, outcome.winner);
        outcome
    }
}

impl fmt::Debug for Carousel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carousel")
            .field("cfg", &self.cfg)
            .field("session_id", &self.session_id)
            .field("custom_scorer", &self.scorer.is_some())
            .field("marker_sink", &self.marker_sink.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

// ── Session state (owned by the worker for one run) ──────────────────────────

struct Session {
    cfg: CarouselConfig,
    resolver: Box<dyn StreamResolver>,
    bus: NotificationBus,
    cancel: CancelToken,
    marker_sink: Option<Box<dyn MarkerSink>>,
    scorer: Option<Box<dyn WindowScorer>>,
    phase: Phase,
}

impl Session {
    fn new(c: Carousel) -> Self {
        Self {
            cfg: c.cfg,
            resolver: c.resolver,
            bus: c.bus,
            cancel: c.cancel,
            marker_sink: c.marker_sink,
            scorer: c.scorer,
            phase: Phase::Idle,
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    fn run(mut self) -> Result<RunOutcome, CarouselError> {
        self.cfg
            .validate_run()
            .map_err(|e| CarouselError::Fault(format!("invalid config: {e}")))?;
        let mut scorer: Box<dyn WindowScorer> = match self.scorer.take() {
            Some(s) => s,
            None => Box::new(
                RelaxationScorer::from_config(&self.cfg)
                    .map_err(|e| CarouselError::Fault(format!("filter design: {e}")))?,
            ),
        };

        let mut triggers = TriggerChannel::establish(self.marker_sink.take(), &self.bus);

        self.enter(Phase::Discovering);
        let name = self.cfg.stream_name.clone();
        self.bus.status(format!("Looking for stream '{name}'"));
        let mut source = discover(
            self.resolver.as_mut(),
            &name,
            self.cfg.discovery_timeout(),
            self.cfg.discovery_retry(),
            &self.cancel,
            &self.bus,
        )?;
        self.bus.status(format!(
            "Connected to '{name}' ({} channels, scoring {})",
            source.channel_count(),
            self.cfg.num_channels
        ));
        if let Some(rate) = source.nominal_srate() {
            if (rate - self.cfg.sfreq).abs() > 1e-6 {
                self.bus.warning(format!(
                    "Stream advertises {rate} Hz, scoring assumes {} Hz",
                    self.cfg.sfreq
                ));
            }
        }

        let mut buffer = WindowBuffer::new(self.cfg.window_size, self.cfg.num_channels);
        let mut competition = Competition::new();
        let mut results = [0.0; SLOT_COUNT];

        for slot in self.cfg.schedule() {
            if self.cancel.is_cancelled() {
                return Err(CarouselError::Cancelled);
            }
            self.enter(Phase::PerSlotLoop(slot.index));
            let value =
                self.run_slot(&slot, source.as_mut(), &mut buffer, scorer.as_mut(), &mut triggers)?;
            results[slot.index] = value;
            self.bus.status(format!("Clip {} -> avg {value:.3}", slot.clip_number()));

            if slot.is_competitor() {
                competition.offer(slot.index, value);
                self.bus.partial_result(slot.index, value);
                let leader = competition.leader().map_or(-1, |(i, _)| i as i64 + 1);
                debug!(slot = slot.index, value, max = competition.max_value(), leader, "compared");
            }

            triggers.emit(&Marker::FadeOut, &self.bus);
            self.bus.progress(progress_percent(slot.index + 1));
            if !self.cancel.sleep(self.cfg.inter_slot_pause(), self.cfg.cancel_step()) {
                return Err(CarouselError::Cancelled);
            }
        }

        self.enter(Phase::Deciding);
        let winner = competition.winner();
        match competition.leader() {
            Some((w, v)) => {
                self.bus.status(format!("Winner: clip {} (score {v:.3})", w + 1));
                self.enter(Phase::WinnerReplay);
                self.replay(w, &mut triggers);
            }
            None => self.bus.status("No winner: no competing clip scored above zero"),
        }

        self.enter(Phase::Completed);
        self.bus.status("Carousel completed");
        Ok(RunOutcome { phase: Phase::Completed, results, winner })
    }

    /// Play and score one slot. Returns the mean of its window scores.
    fn run_slot(
        &mut self,
        slot: &StimulusSlot,
        source: &mut dyn SampleSource,
        buffer: &mut WindowBuffer,
        scorer: &mut dyn WindowScorer,
        triggers: &mut TriggerChannel,
    ) -> Result<f64, CarouselError> {
        let clip = slot.clip_number();
        triggers.emit(&Marker::StartVideo(clip), &self.bus);
        triggers.emit(&Marker::FadeIn, &self.bus);
        self.bus.status(format!("Clip {clip} started ({:.1} s)", slot.duration.as_secs_f64()));

        let pull_timeout = self.cfg.pull_timeout();
        let poll = self.cfg.poll_interval();
        let mut safety = SafetyCounter::new(self.cfg.safety_limit);
        let mut accepted: u64 = 0;
        let mut values: Vec<f64> = Vec::new();
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return Err(CarouselError::Cancelled);
            }
            if safety.tick() {
                self.bus.warning(format!(
                    "Safety limit of {} iterations reached in clip {clip}; ending it early",
                    self.cfg.safety_limit
                ));
                break;
            }
            let elapsed = started.elapsed();
            if elapsed >= slot.duration {
                self.bus.status(format!(
                    "Clip {clip} done: {:.1} s / {accepted} samples",
                    elapsed.as_secs_f64()
                ));
                break;
            }

            match source.pull(pull_timeout) {
                Ok(Some(sample)) => {
                    accepted += 1;
                    buffer.append(&sample);
                    if accepted % self.cfg.raw_sample_stride == 0 {
                        let n = sample.len().min(buffer.n_channels());
                        self.bus.raw_sample(&sample[..n]);
                    }
                    if buffer.is_ready() && accepted % self.cfg.eval_stride == 0 {
                        if let Some(value) = self.evaluate(clip, accepted, buffer, scorer) {
                            values.push(value);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => self.bus.warning(format!("Error reading sample: {e}")),
            }

            if !poll.is_zero() {
                thread::sleep(poll);
            }
        }

        Ok(mean(&values))
    }

    /// Score the current window and slide it. Scoring faults are local.
    fn evaluate(
        &self,
        clip: usize,
        accepted: u64,
        buffer: &mut WindowBuffer,
        scorer: &mut dyn WindowScorer,
    ) -> Option<f64> {
        let window = buffer.snapshot_and_slide()?;
        let chatty = accepted % STATUS_EVERY == 0;
        match scorer.score(&window) {
            Ok(value) if value.is_finite() => {
                if chatty {
                    self.bus.status(format!(
                        "Clip {clip}, sample {accepted}, relaxation {value:.3}"
                    ));
                }
                Some(value)
            }
            Ok(value) => {
                if chatty {
                    self.bus.warning(format!("Clip {clip}: discarded non-finite score {value}"));
                }
                None
            }
            Err(ScoreError::InsufficientData { len, required }) => {
                debug!(len, required, "window too short, skipped");
                None
            }
            Err(e) => {
                if chatty {
                    self.bus.warning(format!("Clip {clip}: scoring error: {e}"));
                } else {
                    debug!(error = %e, "scoring error");
                }
                None
            }
        }
    }

    /// Replay the winner. A stop request only cuts the waits short: the
    /// closing markers still go out and the decided results stand.
    fn replay(&mut self, winner: usize, triggers: &mut TriggerChannel) {
        triggers.emit(&Marker::FadeIn, &self.bus);
        triggers.emit(&Marker::StartVideo(winner + 1), &self.bus);
        self.bus.status(format!(
            "Replaying clip {} for {:.1} s",
            winner + 1,
            self.cfg.winner_duration
        ));
        let step = self.cfg.cancel_step();
        let finished = self.cancel.sleep(self.cfg.winner_duration(), step);
        if !finished {
            self.bus.status("Replay interrupted");
        }
        triggers.emit(&Marker::FadeOut, &self.bus);
        if finished {
            self.cancel.sleep(self.cfg.end_pause(), step);
        }
        triggers.emit(&Marker::EndSession(self.cfg.end_session_tag.clone()), &self.bus);
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_scores_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*p), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*p), "bang");
        let p: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*p), "unknown panic");
    }

    #[test]
    fn aborted_outcome_has_no_winner() {
        let o = RunOutcome::aborted(Phase::Cancelled);
        assert_eq!(o.results, [0.0; SLOT_COUNT]);
        assert_eq!(o.winner_index(), -1);
        assert!(o.phase.is_terminal());
    }
}
