//! Synchronization markers sent to the presentation system.
//!
//! Marker tokens are the only wire contract with the player, so their text is
//! fixed:
//!
//! ```text
//! ZenSync_Start          probe, sent once when the channel is established
//! Start_video_<n>        clip n (1-based) starts
//! fadein / fadeout       clip transitions
//! end_session:<tag>      after the winner replay
//! ```
//!
//! Delivery is best-effort. A failed push becomes a status notification and
//! the run carries on.
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::error::MarkerError;
use crate::events::NotificationBus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    SessionStart,
    /// 1-based clip number.
    StartVideo(usize),
    FadeIn,
    FadeOut,
    EndSession(String),
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::SessionStart => f.write_str("ZenSync_Start"),
            Marker::StartVideo(n) => write!(f, "Start_video_{n}"),
            Marker::FadeIn => f.write_str("fadein"),
            Marker::FadeOut => f.write_str("fadeout"),
            Marker::EndSession(tag) => write!(f, "end_session:{tag}"),
        }
    }
}

/// Fire-and-forget destination for marker tokens.
pub trait MarkerSink: Send {
    fn push(&mut self, token: &str) -> Result<(), MarkerError>;
}

/// Stand-in used when no real sink is available. Markers only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl MarkerSink for LoggingSink {
    fn push(&mut self, token: &str) -> Result<(), MarkerError> {
        debug!(target: "marker", token, "marker (no sink)");
        Ok(())
    }
}

/// Writes one token per line and flushes after each.
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl WriterSink<File> {
    /// Append to `path`, creating it if needed.
    pub fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> MarkerSink for WriterSink<W> {
    fn push(&mut self, token: &str) -> Result<(), MarkerError> {
        writeln!(self.out, "{token}")?;
        self.out.flush()?;
        Ok(())
    }
}

/// The run's marker outlet.
pub struct TriggerChannel {
    sink: Box<dyn MarkerSink>,
    fallback: bool,
}

impl TriggerChannel {
    /// Probe `candidate` with [`Marker::SessionStart`]. If there is no
    /// candidate or the probe fails, markers go to a [`LoggingSink`].
    pub fn establish(candidate: Option<Box<dyn MarkerSink>>, bus: &NotificationBus) -> Self {
        let probe = Marker::SessionStart.to_string();
        match candidate {
            Some(mut sink) => match sink.push(&probe) {
                Ok(()) => {
                    bus.status("Trigger channel ready");
                    Self { sink, fallback: false }
                }
                Err(e) => {
                    bus.warning(format!("Trigger sink unavailable ({e}); markers will only be logged"));
                    Self::logging()
                }
            },
            None => {
                bus.status("No trigger sink configured; markers will only be logged");
                Self::logging()
            }
        }
    }

    fn logging() -> Self {
        Self { sink: Box::new(LoggingSink), fallback: true }
    }

    /// `true` when markers only reach the log.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Push one marker. Failures are reported, never returned.
    pub fn emit(&mut self, marker: &Marker, bus: &NotificationBus) -> bool {
        let token = marker.to_string();
        match self.sink.push(&token) {
            Ok(()) => {
                debug!(target: "marker", token = token.as_str(), "sent");
                true
            }
            Err(e) => {
                bus.warning(format!("Trigger '{token}' failed: {e}"));
                false
            }
        }
    }
}

impl fmt::Debug for TriggerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerChannel").field("fallback", &self.fallback).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CarouselEvent;

    struct Broken;

    impl MarkerSink for Broken {
        fn push(&mut self, _: &str) -> Result<(), MarkerError> {
            Err(MarkerError::Closed)
        }
    }

    #[test]
    fn tokens_are_literal() {
        assert_eq!(Marker::SessionStart.to_string(), "ZenSync_Start");
        assert_eq!(Marker::StartVideo(3).to_string(), "Start_video_3");
        assert_eq!(Marker::FadeIn.to_string(), "fadein");
        assert_eq!(Marker::FadeOut.to_string(), "fadeout");
        assert_eq!(Marker::EndSession("zensync".into()).to_string(), "end_session:zensync");
    }

    #[test]
    fn writer_sink_writes_lines() {
        let mut sink = WriterSink::new(Vec::new());
        sink.push("fadein").unwrap();
        sink.push("fadeout").unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "fadein\nfadeout\n");
    }

    #[test]
    fn failed_probe_falls_back_to_logging() {
        let (bus, rx) = NotificationBus::channel();
        let mut ch = TriggerChannel::establish(Some(Box::new(Broken)), &bus);
        assert!(ch.is_fallback());
        assert!(ch.emit(&Marker::FadeIn, &bus));
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, CarouselEvent::Status { text } if text.contains("unavailable"))));
    }

    #[test]
    fn emit_failure_is_reported_not_raised() {
        let (bus, rx) = NotificationBus::channel();
        let mut ch = TriggerChannel { sink: Box::new(Broken), fallback: false };
        assert!(!ch.emit(&Marker::FadeOut, &bus));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], CarouselEvent::Status { text } if text.contains("fadeout")));
    }
}
