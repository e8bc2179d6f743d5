//! Running-maximum winner selection over the competitor slots.
//!
//! The leader is replaced only by a strictly greater score, so ties keep the
//! earlier slot. The running maximum starts at [`NO_SCORE`], the relaxation
//! index's floor value: a competitor has to score above it to lead, and a run
//! whose competitors all sit at the floor has no winner.
use crate::schedule::{COMPETITOR_SLOTS, SLOT_COUNT};

/// Initial running maximum.
pub const NO_SCORE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Competition {
    max_value: f64,
    max_index: Option<usize>,
}

impl Default for Competition {
    fn default() -> Self {
        Self::new()
    }
}

impl Competition {
    pub fn new() -> Self {
        Self { max_value: NO_SCORE, max_index: None }
    }

    /// Offer the result of slot `index`. Fillers and non-finite values are
    /// ignored. Returns `true` when the slot took the lead.
    pub fn offer(&mut self, index: usize, value: f64) -> bool {
        if !COMPETITOR_SLOTS.contains(&index) || !value.is_finite() {
            return false;
        }
        if value > self.max_value {
            self.max_value = value;
            self.max_index = Some(index);
            true
        } else {
            false
        }
    }

    /// `(index, value)` of the current leader.
    pub fn leader(&self) -> Option<(usize, f64)> {
        self.max_index.map(|i| (i, self.max_value))
    }

    pub fn winner(&self) -> Option<usize> {
        self.max_index
    }

    /// Current running maximum ([`NO_SCORE`] until someone leads).
    pub fn max_value(&self) -> f64 {
        self.max_value
    }
}

/// Winner of a complete result array, or `None`.
pub fn select_winner(results: &[f64; SLOT_COUNT]) -> Option<usize> {
    let mut c = Competition::new();
    for (i, &v) in results.iter().enumerate() {
        c.offer(i, v);
    }
    c.winner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_strict_maximum_wins() {
        let r = [9.0, 0.1, 0.9, 0.4, 0.4, 0.2, 9.0];
        assert_eq!(select_winner(&r), Some(2));
    }

    #[test]
    fn ties_keep_earlier_slot() {
        let r = [0.1, 0.5, 0.5, 0.5, 0.5, 0.5, 0.1];
        assert_eq!(select_winner(&r), Some(1));
    }

    #[test]
    fn fillers_never_win() {
        let r = [100.0, 0.0, 0.0, 0.0, 0.0, 0.0, 100.0];
        assert_eq!(select_winner(&r), None);
    }

    #[test]
    fn all_zero_competitors_mean_no_winner() {
        assert_eq!(select_winner(&[0.0; SLOT_COUNT]), None);
    }

    #[test]
    fn nan_is_not_a_score() {
        let r = [0.0, f64::NAN, 0.3, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(select_winner(&r), Some(2));
    }

    #[test]
    fn offer_reports_lead_changes() {
        let mut c = Competition::new();
        assert!(c.offer(1, 0.2));
        assert!(!c.offer(2, 0.2));
        assert!(c.offer(3, 0.7));
        assert!(!c.offer(6, 5.0));
        assert_eq!(c.leader(), Some((3, 0.7)));
    }
}
