//! Outbound notifications.
//!
//! The worker is the only producer. Delivery goes through an unbounded
//! `crossbeam-channel`, so publishing never blocks the timing loop; a consumer
//! that has gone away is ignored.
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::schedule::SLOT_COUNT;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CarouselEvent {
    /// Human-readable progress or diagnostic line.
    Status { text: String },
    /// Overall progress, 0–100, after each completed slot.
    Progress { percent: u8 },
    /// Result of a competitor slot (index 1–5).
    PartialResult { slot: usize, value: f64 },
    /// Decimated live feed of one sample.
    RawSample { channels: Vec<f64> },
    /// Terminal event, published exactly once per run.
    FinalResults { results: [f64; SLOT_COUNT], winner_index: i32 },
}

impl CarouselEvent {
    pub fn final_results(results: [f64; SLOT_COUNT], winner: Option<usize>) -> Self {
        CarouselEvent::FinalResults {
            results,
            winner_index: winner.map_or(-1, |w| w as i32),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CarouselEvent::FinalResults { .. })
    }

    /// Winning slot of a `FinalResults` event.
    pub fn winner(&self) -> Option<usize> {
        match self {
            CarouselEvent::FinalResults { winner_index, .. } if *winner_index >= 0 => {
                Some(*winner_index as usize)
            }
            _ => None,
        }
    }
}

/// Producer side of the notification channel.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: Sender<CarouselEvent>,
}

impl NotificationBus {
    /// A bus and the receiver its subscriber drains.
    pub fn channel() -> (Self, Receiver<CarouselEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }

    pub fn publish(&self, event: CarouselEvent) {
        // Disconnected receiver: nobody is listening, keep running.
        let _ = self.tx.send(event);
    }

    pub fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!(target: "carousel", "{text}");
        self.publish(CarouselEvent::Status { text });
    }

    /// Status line for a recoverable fault.
    pub fn warning(&self, text: impl Into<String>) {
        let text = text.into();
        warn!(target: "carousel", "{text}");
        self.publish(CarouselEvent::Status { text });
    }

    /// Status line for a run-ending fault.
    pub fn critical(&self, text: impl Into<String>) {
        let text = text.into();
        error!(target: "carousel", "{text}");
        self.publish(CarouselEvent::Status { text });
    }

    pub fn progress(&self, percent: u8) {
        self.publish(CarouselEvent::Progress { percent: percent.min(100) });
    }

    pub fn partial_result(&self, slot: usize, value: f64) {
        self.publish(CarouselEvent::PartialResult { slot, value });
    }

    pub fn raw_sample(&self, channels: &[f64]) {
        self.publish(CarouselEvent::RawSample { channels: channels.to_vec() });
    }

    pub fn final_results(&self, results: [f64; SLOT_COUNT], winner: Option<usize>) {
        self.publish(CarouselEvent::final_results(results, winner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_order() {
        let (bus, rx) = NotificationBus::channel();
        bus.status("hello");
        bus.progress(14);
        bus.partial_result(1, 0.5);
        let got: Vec<CarouselEvent> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                CarouselEvent::Status { text: "hello".into() },
                CarouselEvent::Progress { percent: 14 },
                CarouselEvent::PartialResult { slot: 1, value: 0.5 },
            ]
        );
    }

    #[test]
    fn publishing_without_subscriber_is_harmless() {
        let (bus, rx) = NotificationBus::channel();
        drop(rx);
        bus.status("nobody listens");
        bus.final_results([0.0; SLOT_COUNT], None);
    }

    #[test]
    fn winner_index_uses_minus_one_for_none() {
        let none = CarouselEvent::final_results([0.0; SLOT_COUNT], None);
        assert_eq!(none.winner(), None);
        assert!(none.is_terminal());
        let some = CarouselEvent::final_results([0.0; SLOT_COUNT], Some(3));
        assert_eq!(some.winner(), Some(3));
    }

    #[test]
    fn serializes_with_event_tag() {
        let ev = CarouselEvent::final_results([0.0; SLOT_COUNT], None);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "final_results");
        assert_eq!(json["winner_index"], -1);
        assert_eq!(json["results"].as_array().unwrap().len(), SLOT_COUNT);
    }
}
