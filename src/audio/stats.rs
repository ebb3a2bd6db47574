//! Stream statistics
//!
//! Counters are updated from the real-time callback, so everything here is a
//! relaxed atomic. Readers take a [`StatsReport`] snapshot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared between the producer, the device callback and readers
#[derive(Debug, Default)]
pub struct StreamStats {
    callbacks: AtomicU64,
    frames_played: AtomicU64,
    overruns: AtomicU64,
    underruns: AtomicU64,
    hook_invocations: AtomicU64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_callback(&self) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_frames_played(&self, frames: u64) {
        self.frames_played.fetch_add(frames, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts every silent block, including the expected ones on an empty buffer
    #[inline]
    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hook_invocation(&self) {
        self.hook_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overrun_count(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn underrun_count(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn hook_invocation_count(&self) -> u64 {
        self.hook_invocations.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames_played: self.frames_played.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            hook_invocations: self.hook_invocations.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.frames_played.store(0, Ordering::Relaxed);
        self.overruns.store(0, Ordering::Relaxed);
        self.underruns.store(0, Ordering::Relaxed);
        self.hook_invocations.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsReport {
    pub callbacks: u64,
    pub frames_played: u64,
    pub overruns: u64,
    pub underruns: u64,
    pub hook_invocations: u64,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stream Statistics")?;
        writeln!(f, "=================")?;
        writeln!(f, "Callbacks: {}", self.callbacks)?;
        writeln!(f, "Frames played: {}", self.frames_played)?;
        writeln!(f, "Underrun hook calls: {}", self.hook_invocations)?;
        writeln!(f, "Overruns: {}", self.overruns)?;
        write!(f, "Underruns: {}", self.underruns)
    }
}
