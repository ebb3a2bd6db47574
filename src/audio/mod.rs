//! Audio module - buffering between the sample producer and the output device
//!
//! This module provides:
//! - Sample buffer: fixed-capacity FIFO of interleaved stereo samples
//! - Stream controller: start/stop lifecycle and the device fill callback
//! - Stream statistics and configuration

mod buffer;
mod config;
mod controller;
mod retry;
mod stats;

// Re-export public types
pub use buffer::{BufferError, SampleBuffer};
pub use config::StreamConfig;
pub use controller::{
    ErrorHandler, SampleWriter, StreamController, StreamControllerBuilder, StreamState,
    UnderrunHook,
};
pub use stats::{StatsReport, StreamStats};
