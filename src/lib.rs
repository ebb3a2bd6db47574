//! speaker-stream
//!
//! Streams interleaved stereo samples from an application producer to a
//! real-time audio output callback, with overrun/underrun handling and a
//! retrying start for suspended devices.

pub mod audio;
pub mod platform;
pub mod settings;

pub use audio::{SampleBuffer, SampleWriter, StreamConfig, StreamController, StreamState};
pub use platform::{CpalPlatform, OutputDevice, OutputPlatform, PlatformError};
