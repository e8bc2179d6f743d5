//! The fixed seven-slot stimulus schedule.
//!
//! Slots 0 and 6 are fillers that frame the run; slots 1–5 compete.
use serde::Serialize;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::config::secs;

/// Slots per run.
pub const SLOT_COUNT: usize = 7;

/// Indices eligible to win.
pub const COMPETITOR_SLOTS: RangeInclusive<usize> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRole {
    /// Scored like any slot, never compared.
    Filler,
    Competitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusSlot {
    /// 0-based position in the run.
    pub index: usize,
    pub duration: Duration,
    pub role: SlotRole,
}

impl StimulusSlot {
    /// Build the seven slots from per-slot durations in seconds.
    pub fn schedule(durations: &[f64; SLOT_COUNT]) -> [StimulusSlot; SLOT_COUNT] {
        std::array::from_fn(|index| StimulusSlot {
            index,
            duration: secs(durations[index]),
            role: role_of(index),
        })
    }

    pub fn is_competitor(&self) -> bool {
        self.role == SlotRole::Competitor
    }

    /// 1-based clip number used in marker tokens and messages.
    pub fn clip_number(&self) -> usize {
        self.index + 1
    }
}

pub fn role_of(index: usize) -> SlotRole {
    if COMPETITOR_SLOTS.contains(&index) {
        SlotRole::Competitor
    } else {
        SlotRole::Filler
    }
}

/// Overall progress after `completed` slots, rounded to the nearest percent.
pub fn progress_percent(completed: usize) -> u8 {
    let done = completed.min(SLOT_COUNT);
    ((done * 100) as f64 / SLOT_COUNT as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fillers_frame_the_run() {
        let slots = StimulusSlot::schedule(&[5.0, 8.0, 8.0, 8.0, 8.0, 8.0, 5.0]);
        let roles: Vec<SlotRole> = slots.iter().map(|s| s.role).collect();
        assert_eq!(roles[0], SlotRole::Filler);
        assert_eq!(roles[6], SlotRole::Filler);
        assert!(roles[1..6].iter().all(|&r| r == SlotRole::Competitor));
        assert_eq!(slots[0].duration, Duration::from_secs(5));
        assert_eq!(slots[3].duration, Duration::from_secs(8));
        assert_eq!(slots[6].clip_number(), 7);
    }

    #[test]
    fn progress_rounds_to_nearest() {
        let expected = [14, 29, 43, 57, 71, 86, 100];
        for (i, &p) in expected.iter().enumerate() {
            assert_eq!(progress_percent(i + 1), p, "after slot {i}");
        }
        assert_eq!(progress_percent(0), 0);
        assert_eq!(progress_percent(9), 100);
    }
}
