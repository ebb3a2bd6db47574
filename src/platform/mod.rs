//! Output device platform
//!
//! This module provides:
//! - `OutputPlatform` / `OutputDevice` traits: the minimal contract the
//!   stream controller needs from an audio backend
//! - `CpalPlatform`: the cpal implementation used by the binary

mod cpal_output;
#[cfg(test)]
pub(crate) mod mock;

use thiserror::Error;

pub use cpal_output::{CpalDevice, CpalPlatform};

/// Device callback: fills the left and right output slices for one block
pub type RenderCallback = Box<dyn FnMut(&mut [f32], &mut [f32]) + Send + 'static>;

/// Parameters requested when acquiring an output device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub channels: u16,
    /// Frames per callback
    pub block_size: u32,
    /// `None` uses the device default
    pub sample_rate: Option<u32>,
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("no output device available")]
    NoDevice,

    #[error("output device is suspended")]
    Suspended,

    #[error("a render callback is already registered")]
    AlreadyRegistered,

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to query device config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to pause output stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("{0}")]
    Backend(String),
}

/// Result of [`OutputPlatform::acquire`]
///
/// A suspended device is still returned so the caller can release it
/// before retrying.
#[derive(Debug)]
pub enum Acquisition<D> {
    Ready(D),
    Suspended(D),
}

/// An audio backend able to hand out stereo output devices
pub trait OutputPlatform: Send + 'static {
    type Device: OutputDevice;

    /// Whether audio output is supported at all on this system
    fn is_available(&self) -> bool;

    /// Open an output device configured per `config`
    fn acquire(&mut self, config: &DeviceConfig)
        -> Result<Acquisition<Self::Device>, PlatformError>;
}

/// An acquired output device
///
/// Teardown is always `deregister_callback` followed by `release`, so no
/// callback runs against a released device.
pub trait OutputDevice: Send + 'static {
    /// Start invoking `callback` once per block
    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), PlatformError>;

    /// Stop invoking the callback and disconnect the output.
    /// A no-op if nothing is registered.
    fn deregister_callback(&mut self) -> Result<(), PlatformError>;

    /// Release the device
    fn release(self) -> Result<(), PlatformError>;

    fn sample_rate(&self) -> u32;

    fn name(&self) -> String {
        "Unknown".to_string()
    }
}
