//! # biocarousel: biosignal-guided stimulus carousel
//!
//! `biocarousel` plays seven clips in sequence while scoring a live
//! physiological stream, picks the clip during which the viewer was most
//! relaxed, and replays it. Scoring runs on a dedicated worker thread; the
//! outside world sees only a one-way stream of [`CarouselEvent`]s and the
//! marker tokens sent to the presentation system.
//!
//! ## Pipeline overview
//!
//! ```text
//! StreamResolver::resolve()   discovery, retried every 100 ms for 5 s
//!   │
//!   ├─ SampleSource::pull()   bounded 10 ms wait per sample
//!   ├─ WindowBuffer           100-sample window, 1-sample slide
//!   ├─ Bandpass::apply()      Butterworth 1–50 Hz, order 5, zero-phase
//!   ├─ BandPowerExtractor     Hann periodogram → δ θ α β γ per channel
//!   ├─ relaxation_index()     θ / α on the first channel
//!   └─ mean per clip          → Competition (clips 2–6, strict max)
//!        │
//!        └─→ FinalResults([f64; 7], winner_index)   exactly once per run
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use biocarousel::{
//!     worker, CancelToken, Carousel, CarouselConfig, NotificationBus, SimulatedResolver,
//! };
//!
//! let cfg = CarouselConfig::default();
//! let (bus, events) = NotificationBus::channel();
//! let resolver = SimulatedResolver { n_channels: cfg.num_channels, sfreq: cfg.sfreq, seed: 1 };
//!
//! let carousel = Carousel::new(cfg, resolver, bus, CancelToken::new())
//!     .with_session_id("demo");
//! let run = worker::spawn(carousel).unwrap();
//!
//! for event in events.iter() {
//!     println!("{event:?}");
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! let outcome = run.join().unwrap();
//! println!("winner: {:?}", outcome.winner);
//! ```
//!
//! ## Scoring a single window
//!
//! ```
//! use biocarousel::{bandpass_filter, extract_band_powers, relaxation_index};
//! use ndarray::Array2;
//!
//! let window = Array2::from_shape_fn((2, 100), |(c, t)| ((t + c) as f64 * 0.3).sin());
//! let filtered = bandpass_filter(&window, 1.0, 50.0, 250.0, 5).unwrap();
//! let features = extract_band_powers(&filtered, 250.0).unwrap();
//! assert_eq!(features.len(), 10);
//! let score = relaxation_index(features.as_slice());
//! assert!(score >= 0.0);
//! ```

pub mod bands;
pub mod buffer;
pub mod cancel;
pub mod competition;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod io;
pub mod logging;
pub mod relaxation;
pub mod schedule;
pub mod scorer;
pub mod session;
pub mod source;
pub mod trigger;
pub mod worker;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// configuration and schedule
pub use config::CarouselConfig;
pub use schedule::{progress_percent, SlotRole, StimulusSlot, COMPETITOR_SLOTS, SLOT_COUNT};

// errors
pub use error::{CarouselError, FilterError, MarkerError, ScoreError, SourceError};

// DSP
pub use bands::{extract_band_powers, periodogram, Band, BandPowerExtractor, FeatureVector};
pub use buffer::WindowBuffer;
pub use filter::{bandpass_filter, butter_bandpass, Bandpass, BandpassCoeffs};
pub use relaxation::relaxation_index;
pub use scorer::{RelaxationScorer, WindowScorer};

// run control
pub use cancel::{CancelToken, SafetyCounter};
pub use competition::{select_winner, Competition};
pub use events::{CarouselEvent, NotificationBus};
pub use session::{Carousel, Phase, RunOutcome};
pub use worker::CarouselWorker;

// I/O collaborators
pub use io::Recording;
pub use source::{
    discover, Pacer, RecordingResolver, RecordingSource, Sample, SampleSource,
    SimulatedResolver, SimulatedSource, StreamResolver,
};
pub use trigger::{LoggingSink, Marker, MarkerSink, TriggerChannel, WriterSink};
