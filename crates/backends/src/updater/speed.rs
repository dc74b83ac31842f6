//! Download speed smoothing

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct SpeedSample {
    speed: f64,
}

/// Ring buffer of recent speed samples with recency-weighted averaging.
///
/// Raw per-transaction speed reports are noisy (bursty sockets, per-file
/// stalls); the UI-facing number is a weighted mean over the last few
/// samples, newer samples counting more. Samples closer together than
/// `min_interval` are folded into the previous one.
#[derive(Debug)]
pub(crate) struct SpeedBuffer {
    samples: VecDeque<SpeedSample>,
    max_size: usize,
    min_interval: Duration,
    last_sample: Option<Instant>,
}

impl SpeedBuffer {
    pub fn new(max_size: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_size),
            max_size,
            min_interval: Duration::from_millis(100),
            last_sample: None,
        }
    }

    /// Record an instantaneous aggregate speed reading, bytes/sec.
    pub fn record(&mut self, bytes_per_second: u64, now: Instant) {
        #[allow(clippy::cast_precision_loss)]
        let speed = bytes_per_second as f64;

        if let Some(last) = self.last_sample {
            if now.duration_since(last) < self.min_interval {
                if let Some(newest) = self.samples.back_mut() {
                    newest.speed = speed;
                }
                return;
            }
        }

        if self.samples.len() >= self.max_size {
            self.samples.pop_front();
        }
        self.samples.push_back(SpeedSample { speed });
        self.last_sample = Some(now);
    }

    /// Recency-weighted average of the buffered samples, bytes/sec.
    pub fn smoothed(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (i, sample) in self.samples.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let weight = 1.0 + i as f64 / self.samples.len() as f64;
            weighted_sum += sample.speed * weight;
            weight_sum += weight;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            (weighted_sum / weight_sum).max(0.0) as u64
        }
    }

    /// Drop all samples, e.g. between batches.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_reports_zero() {
        let buffer = SpeedBuffer::new(8);
        assert_eq!(buffer.smoothed(), 0);
    }

    #[test]
    fn single_sample_is_returned_as_is() {
        let mut buffer = SpeedBuffer::new(8);
        buffer.record(1024, Instant::now());
        assert_eq!(buffer.smoothed(), 1024);
    }

    #[test]
    fn newer_samples_weigh_more() {
        let mut buffer = SpeedBuffer::new(8);
        let mut now = Instant::now();
        for speed in [100u64, 100, 100, 1000] {
            buffer.record(speed, now);
            now += Duration::from_millis(200);
        }
        let smoothed = buffer.smoothed();
        // More than the plain mean of 325, less than the newest sample.
        assert!(smoothed > 325, "smoothed = {smoothed}");
        assert!(smoothed < 1000, "smoothed = {smoothed}");
    }

    #[test]
    fn buffer_is_bounded() {
        let mut buffer = SpeedBuffer::new(4);
        let mut now = Instant::now();
        for speed in 0..100u64 {
            buffer.record(speed, now);
            now += Duration::from_millis(200);
        }
        assert!(buffer.samples.len() <= 4);
    }

    #[test]
    fn clear_resets_the_estimate() {
        let mut buffer = SpeedBuffer::new(8);
        buffer.record(4096, Instant::now());
        buffer.clear();
        assert_eq!(buffer.smoothed(), 0);
    }
}
