//! Sliding window over the most recent samples.
//!
//! Samples accumulate up to twice the target size. The next append first
//! keeps only the newest `target` samples, so the buffer then holds
//! `target + 1`. Once at least `target`
//! samples are held, [`WindowBuffer::snapshot_and_slide`] hands out the whole
//! buffer as a `[C, T]` window and drops the single oldest sample, so
//! consecutive windows overlap by all but one sample.
use ndarray::Array2;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct WindowBuffer {
    samples: VecDeque<Vec<f64>>,
    target: usize,
    n_channels: usize,
}

impl WindowBuffer {
    /// `target` is clamped to at least 1.
    pub fn new(target: usize, n_channels: usize) -> Self {
        let target = target.max(1);
        Self {
            samples: VecDeque::with_capacity(2 * target),
            target,
            n_channels,
        }
    }

    /// Append one sample, truncated or zero-padded to the channel count.
    pub fn append(&mut self, sample: &[f64]) {
        let mut row = vec![0.0; self.n_channels];
        let n = sample.len().min(self.n_channels);
        row[..n].copy_from_slice(&sample[..n]);

        if self.samples.len() >= 2 * self.target {
            let excess = self.samples.len() - self.target;
            self.samples.drain(..excess);
        }
        self.samples.push_back(row);
    }

    /// Enough samples for an evaluation.
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.target
    }

    /// Current contents as `[C, T]`, then drop the oldest sample.
    ///
    /// Returns `None` when the buffer is not ready.
    pub fn snapshot_and_slide(&mut self) -> Option<Array2<f64>> {
        if !self.is_ready() {
            return None;
        }
        let t = self.samples.len();
        let window = Array2::from_shape_fn((self.n_channels, t), |(c, i)| self.samples[i][c]);
        self.samples.pop_front();
        Some(window)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_to_target_at_double_capacity() {
        let mut b = WindowBuffer::new(4, 1);
        for i in 0..8 {
            b.append(&[i as f64]);
        }
        assert_eq!(b.len(), 8);
        b.append(&[8.0]);
        assert_eq!(b.len(), 5);
        let w = b.snapshot_and_slide().unwrap();
        assert_eq!(w.row(0).to_vec(), vec![4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn never_exceeds_double_target() {
        let mut b = WindowBuffer::new(10, 2);
        for i in 0..1000 {
            b.append(&[i as f64, -(i as f64)]);
            assert!(b.len() <= 20, "len {} after {} appends", b.len(), i + 1);
        }
    }

    #[test]
    fn slide_drops_exactly_one_sample() {
        let mut b = WindowBuffer::new(3, 1);
        assert!(b.snapshot_and_slide().is_none());
        for v in [1.0, 2.0, 3.0, 4.0] {
            b.append(&[v]);
        }
        let first = b.snapshot_and_slide().unwrap();
        assert_eq!(first.dim(), (1, 4));
        assert_eq!(b.len(), 3);
        let second = b.snapshot_and_slide().unwrap();
        assert_eq!(second.row(0).to_vec(), vec![2.0, 3.0, 4.0]);
        assert!(b.snapshot_and_slide().is_none());
    }

    #[test]
    fn samples_are_fitted_to_channel_count() {
        let mut b = WindowBuffer::new(1, 3);
        b.append(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        b.append(&[9.0]);
        let w = b.snapshot_and_slide().unwrap();
        assert_eq!(w.dim(), (3, 2));
        assert_eq!(w.column(0).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(w.column(1).to_vec(), vec![9.0, 0.0, 0.0]);
    }
}
