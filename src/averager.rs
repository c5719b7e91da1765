//! Decimating moving average over a fixed ring buffer.
//!
//! `N` is the buffer capacity; the active depth is anything in `0..N` and can
//! be changed at run time without reallocating. Depth 0 is pass-through.
//!
//! A new output is only reported when the cursor wraps, so chaining an inner
//! and an outer averager decimates by `inner_depth * outer_depth`. Until the
//! buffer fills for the first time every sample is reported unchanged, which
//! keeps a value available from the very first sample.

use crate::error::AveragerError;

#[derive(Clone, Debug)]
pub struct Averager<const N: usize> {
    buffer: [f32; N],
    depth: usize,
    cursor: usize,
    accumulator: f32,
    consolidated: bool,
    averaged: f32,
    timestamp: u32,
}

impl<const N: usize> Averager<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0.0; N],
            depth: 0,
            cursor: 0,
            accumulator: 0.0,
            consolidated: false,
            averaged: 0.0,
            timestamp: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reset all state and switch to `depth`.
    pub fn set_depth(&mut self, depth: usize) -> Result<(), AveragerError> {
        if depth >= N {
            return Err(AveragerError::DepthOutOfRange {
                requested: depth,
                capacity: N,
            });
        }
        self.accumulator = 0.0;
        self.cursor = 0;
        self.consolidated = false;
        self.buffer = [0.0; N];
        self.depth = depth;
        Ok(())
    }

    /// Re-zero the window at the current depth.
    pub fn reset(&mut self) {
        // depth < N holds by construction
        let _ = self.set_depth(self.depth);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Feed one sample. Returns `true` when a new output was latched.
    pub fn collect_sample(&mut self, value: f32, timestamp: u32) -> bool {
        if self.depth == 0 {
            self.accumulator = value;
            self.averaged = value;
            self.timestamp = timestamp;
            return true;
        }

        self.accumulator -= self.buffer[self.cursor];
        self.accumulator += value;
        self.buffer[self.cursor] = value;
        self.cursor += 1;

        if self.cursor >= self.depth {
            self.cursor = 0;
            self.consolidated = true;
            self.averaged = self.accumulator / self.depth as f32;
            self.timestamp = timestamp;
            return true;
        }

        if !self.consolidated {
            self.averaged = value;
            self.timestamp = timestamp;
            return true;
        }

        false
    }

    pub fn is_consolidated(&self) -> bool {
        self.consolidated
    }

    pub fn last_averaged_value(&self) -> f32 {
        self.averaged
    }

    /// Raw window sum, for channels that accumulate rather than average.
    pub fn last_cumulated_value(&self) -> f32 {
        self.accumulator
    }

    pub fn last_timestamp(&self) -> u32 {
        self.timestamp
    }
}

impl<const N: usize> Default for Averager<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean(values: &[f32]) -> f32 {
        values.iter().sum::<f32>() / values.len() as f32
    }

    #[test]
    fn depth_zero_is_pass_through() {
        let mut avg = Averager::<8>::new();
        for (i, v) in [3.0, -1.5, 42.0].iter().enumerate() {
            assert!(avg.collect_sample(*v, i as u32));
            assert_eq!(avg.last_averaged_value(), *v);
            assert_eq!(avg.last_cumulated_value(), *v);
            assert_eq!(avg.last_timestamp(), i as u32);
        }
    }

    #[test]
    fn rejects_depth_at_capacity() {
        let mut avg = Averager::<4>::new();
        assert_eq!(
            avg.set_depth(4),
            Err(AveragerError::DepthOutOfRange { requested: 4, capacity: 4 })
        );
        assert!(avg.set_depth(3).is_ok());
        assert_eq!(avg.depth(), 3);
    }

    #[test]
    fn consolidates_after_depth_samples() {
        for depth in 1..8 {
            let mut avg = Averager::<8>::new();
            avg.set_depth(depth).unwrap();
            let samples: [f32; 7] = [2.0, 4.0, 9.0, 1.0, 7.0, 3.0, 5.0];
            for (i, v) in samples[..depth].iter().enumerate() {
                assert!(!avg.is_consolidated());
                assert!(avg.collect_sample(*v, i as u32));
            }
            assert!(avg.is_consolidated());
            assert!((avg.last_averaged_value() - mean(&samples[..depth])).abs() < 1e-5);
        }
    }

    #[test]
    fn provisional_output_is_raw_sample() {
        let mut avg = Averager::<8>::new();
        avg.set_depth(4).unwrap();
        assert!(avg.collect_sample(10.0, 1));
        assert_eq!(avg.last_averaged_value(), 10.0);
        assert!(avg.collect_sample(20.0, 2));
        assert_eq!(avg.last_averaged_value(), 20.0);
        assert_eq!(avg.last_timestamp(), 2);
    }

    #[test]
    fn window_slides_over_last_depth_samples() {
        let depth = 3;
        let mut avg = Averager::<8>::new();
        avg.set_depth(depth).unwrap();
        let samples = [1.0, 2.0, 3.0, 10.0, 20.0, 30.0, 7.0, 8.0];
        for (i, v) in samples.iter().enumerate() {
            avg.collect_sample(*v, i as u32);
            if i + 1 >= depth {
                let window = &samples[i + 1 - depth..=i];
                let running = avg.last_cumulated_value() / depth as f32;
                assert!((running - mean(window)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn decimates_once_consolidated() {
        let mut avg = Averager::<8>::new();
        avg.set_depth(2).unwrap();
        assert!(avg.collect_sample(1.0, 0));
        assert!(avg.collect_sample(3.0, 1));
        assert_eq!(avg.last_averaged_value(), 2.0);

        assert!(!avg.collect_sample(5.0, 2));
        assert_eq!(avg.last_averaged_value(), 2.0);
        assert_eq!(avg.last_timestamp(), 1);

        assert!(avg.collect_sample(7.0, 3));
        assert_eq!(avg.last_averaged_value(), 6.0);
        assert_eq!(avg.last_timestamp(), 3);
    }

    #[test]
    fn set_depth_drops_previous_contributions() {
        let mut avg = Averager::<8>::new();
        avg.set_depth(2).unwrap();
        avg.collect_sample(100.0, 0);
        avg.collect_sample(100.0, 1);
        assert!(avg.is_consolidated());

        avg.set_depth(2).unwrap();
        assert!(!avg.is_consolidated());
        assert_eq!(avg.last_cumulated_value(), 0.0);
        avg.collect_sample(1.0, 2);
        avg.collect_sample(3.0, 3);
        assert_eq!(avg.last_averaged_value(), 2.0);
    }
}
