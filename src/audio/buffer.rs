//! Sample buffer for passing stereo audio from a producer to the output device
//!
//! This module provides a fixed-capacity FIFO of interleaved stereo samples
//! (left, right, left, right, ...).
//!
//! ## Design Notes
//!
//! The buffer itself is a plain single-owner structure built on
//! `ringbuf::HeapRb`. Sharing between the producer and the real-time callback
//! is done one level up (see `controller.rs`), behind a short-held lock, so the
//! check-then-remove in `dequeue_exactly` stays atomic.

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use thiserror::Error;

/// Errors returned by [`SampleBuffer`] dequeue operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("insufficient data: requested {requested} samples, {available} available")]
    InsufficientData { requested: usize, available: usize },
}

/// Fixed-capacity circular queue of interleaved stereo samples
///
/// Writes never fail: when the queue is full the oldest sample is evicted and
/// the eviction is counted as an overrun. Reads are all-or-nothing.
///
/// ## Example
///
/// ```
/// use speaker_stream::audio::SampleBuffer;
///
/// let mut buffer = SampleBuffer::with_frames(4);
/// buffer.enqueue(0.25);
/// buffer.enqueue(-0.25);
///
/// let samples = buffer.dequeue_exactly(2).unwrap();
/// assert_eq!(samples, vec![0.25, -0.25]);
/// ```
pub struct SampleBuffer {
    ring: HeapRb<f32>,
    /// Samples evicted because the buffer was full
    overruns: u64,
}

impl SampleBuffer {
    /// Create a buffer holding `capacity` samples
    ///
    /// # Arguments
    /// * `capacity` - Number of samples (not frames). Rounded up to an even
    ///   number so left/right pairs always fit.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let capacity = capacity + capacity % 2;
        Self {
            ring: HeapRb::new(capacity),
            overruns: 0,
        }
    }

    /// Create a buffer holding `frames` stereo frames (`2 * frames` samples)
    pub fn with_frames(frames: usize) -> Self {
        Self::new(frames.saturating_mul(2))
    }

    /// Append one sample at the tail
    ///
    /// If the buffer is full the oldest sample is evicted to make room and
    /// the overrun counter is incremented.
    #[inline]
    pub fn enqueue(&mut self, sample: f32) {
        if self.ring.push_overwrite(sample).is_some() {
            self.overruns += 1;
            log::trace!("Sample buffer full, evicted oldest sample");
        }
    }

    /// Number of samples currently queued
    #[inline]
    pub fn size(&self) -> usize {
        self.ring.occupied_len()
    }

    /// Maximum number of samples the buffer holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Total samples evicted by writes into a full buffer
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Remove and return exactly `n` samples from the head
    ///
    /// Fails without touching the buffer if fewer than `n` samples are queued.
    pub fn dequeue_exactly(&mut self, n: usize) -> Result<Vec<f32>, BufferError> {
        self.ensure_available(n)?;
        let mut samples = vec![0.0; n];
        self.ring.pop_slice(&mut samples);
        Ok(samples)
    }

    /// Fill `out` completely from the head of the buffer
    ///
    /// Allocation-free variant of [`dequeue_exactly`](Self::dequeue_exactly).
    pub fn dequeue_into(&mut self, out: &mut [f32]) -> Result<(), BufferError> {
        self.ensure_available(out.len())?;
        self.ring.pop_slice(out);
        Ok(())
    }

    /// Remove `2 * frames` samples and split them into left and right channels
    ///
    /// `frames` is the shorter of the two output slices. On failure neither
    /// the buffer nor the outputs are modified.
    pub fn dequeue_stereo(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), BufferError> {
        let frames = left.len().min(right.len());
        self.ensure_available(frames * 2)?;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            // Availability was checked above, so both pops succeed
            *l = self.ring.try_pop().unwrap_or(0.0);
            *r = self.ring.try_pop().unwrap_or(0.0);
        }
        Ok(())
    }

    /// Discard all queued samples
    pub fn clear(&mut self) {
        Consumer::clear(&mut self.ring);
    }

    fn ensure_available(&self, requested: usize) -> Result<(), BufferError> {
        let available = self.size();
        if available < requested {
            Err(BufferError::InsufficientData {
                requested,
                available,
            })
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("overruns", &self.overruns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(frames: usize, pairs: &[(f32, f32)]) -> SampleBuffer {
        let mut buffer = SampleBuffer::with_frames(frames);
        for &(l, r) in pairs {
            buffer.enqueue(l);
            buffer.enqueue(r);
        }
        buffer
    }

    #[test]
    fn test_capacity_is_two_samples_per_frame() {
        let buffer = SampleBuffer::with_frames(8192);
        assert_eq!(buffer.capacity(), 16384);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_size_tracks_pairs() {
        let mut buffer = SampleBuffer::with_frames(4);
        for n in 1..=4 {
            buffer.enqueue(n as f32);
            buffer.enqueue(-(n as f32));
            assert_eq!(buffer.size(), 2 * n);
        }
        assert_eq!(buffer.overruns(), 0);
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let mut buffer = filled(4, &[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
        assert_eq!(buffer.dequeue_exactly(4).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(buffer.dequeue_exactly(2).unwrap(), vec![5.0, 6.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_insufficient_data_leaves_buffer_untouched() {
        let mut buffer = filled(4, &[(1.0, 2.0)]);
        let err = buffer.dequeue_exactly(4).unwrap_err();
        assert_eq!(
            err,
            BufferError::InsufficientData {
                requested: 4,
                available: 2
            }
        );
        assert_eq!(buffer.size(), 2);
        assert_eq!(buffer.dequeue_exactly(2).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_full_buffer_evicts_oldest_pair() {
        let mut buffer = filled(2, &[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
        assert_eq!(buffer.size(), 4);
        assert_eq!(buffer.overruns(), 2);
        // Pairing survives eviction: oldest pair went out as a whole
        assert_eq!(buffer.dequeue_exactly(4).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let mut buffer = filled(2, &[(1.0, 2.0), (3.0, 4.0)]);
        buffer.dequeue_exactly(2).unwrap();
        buffer.enqueue(5.0);
        buffer.enqueue(6.0);
        assert_eq!(buffer.dequeue_exactly(4).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_dequeue_then_requeue_restores_contents() {
        let pairs = [(0.1, -0.1), (0.2, -0.2), (0.3, -0.3)];
        let mut buffer = filled(4, &pairs);

        let head = buffer.dequeue_exactly(6).unwrap();
        for &sample in &head {
            buffer.enqueue(sample);
        }

        let again = buffer.dequeue_exactly(6).unwrap();
        assert_eq!(again, head);
        assert_eq!(again, vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);
    }

    #[test]
    fn test_dequeue_stereo_deinterleaves() {
        let mut buffer = filled(4, &[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
        let mut left = [0.0; 2];
        let mut right = [0.0; 2];

        buffer.dequeue_stereo(&mut left, &mut right).unwrap();

        assert_eq!(left, [1.0, 3.0]);
        assert_eq!(right, [2.0, 4.0]);
        assert_eq!(buffer.dequeue_exactly(2).unwrap(), vec![5.0, 6.0]);
    }

    #[test]
    fn test_dequeue_stereo_failure_leaves_outputs() {
        let mut buffer = filled(4, &[(1.0, 2.0)]);
        let mut left = [9.0; 2];
        let mut right = [9.0; 2];

        assert!(buffer.dequeue_stereo(&mut left, &mut right).is_err());
        assert_eq!(left, [9.0; 2]);
        assert_eq!(right, [9.0; 2]);
        assert_eq!(buffer.size(), 2);
    }

    #[test]
    fn test_dequeue_into_and_clear() {
        let mut buffer = filled(4, &[(1.0, 2.0), (3.0, 4.0)]);
        let mut out = [0.0; 2];
        buffer.dequeue_into(&mut out).unwrap();
        assert_eq!(out, [1.0, 2.0]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.dequeue_into(&mut out).is_err());
    }
}
