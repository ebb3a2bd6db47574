//! cpal output backend
//!
//! Opens the default output device of the default host and drives a
//! [`RenderCallback`] from the cpal data callback. The callback works on
//! planar `f32` left/right slices; conversion to the device's interleaved
//! native format happens here.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use super::{Acquisition, DeviceConfig, OutputDevice, OutputPlatform, PlatformError, RenderCallback};

/// Fallback rate for a device that cannot report its own config
const FALLBACK_SAMPLE_RATE: u32 = 48_000;

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. The stream is only
/// created, paused and dropped while the owning controller's control lock is
/// held, so it is never touched from two threads at once.
struct StreamHandle(cpal::Stream);

unsafe impl Send for StreamHandle {}

/// The system's default cpal host
#[derive(Debug, Default)]
pub struct CpalPlatform;

impl CpalPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl OutputPlatform for CpalPlatform {
    type Device = CpalDevice;

    fn is_available(&self) -> bool {
        !cpal::available_hosts().is_empty()
    }

    fn acquire(&mut self, config: &DeviceConfig) -> Result<Acquisition<CpalDevice>, PlatformError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(PlatformError::NoDevice)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = match device.default_output_config() {
            Ok(c) => c,
            Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => {
                log::debug!("Output device '{}' not available yet", name);
                let stream_config = cpal::StreamConfig {
                    channels: config.channels,
                    sample_rate: cpal::SampleRate(config.sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE)),
                    buffer_size: cpal::BufferSize::Default,
                };
                return Ok(Acquisition::Suspended(CpalDevice {
                    device,
                    name,
                    stream_config,
                    sample_format: cpal::SampleFormat::F32,
                    stream: None,
                }));
            }
            Err(e) => return Err(e.into()),
        };

        // Some backends only accept block sizes in a device-specific range
        let buffer_size = match supported.buffer_size() {
            cpal::SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&config.block_size) =>
            {
                cpal::BufferSize::Fixed(config.block_size)
            }
            cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Fixed(config.block_size),
            other => {
                log::warn!(
                    "Block size {} not supported by '{}' ({:?}), using device default",
                    config.block_size,
                    name,
                    other
                );
                cpal::BufferSize::Default
            }
        };

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config
                .sample_rate
                .map(cpal::SampleRate)
                .unwrap_or_else(|| supported.sample_rate()),
            buffer_size,
        };

        log::info!("Using output device: {} ({:?})", name, stream_config);

        Ok(Acquisition::Ready(CpalDevice {
            device,
            name,
            stream_config,
            sample_format: supported.sample_format(),
            stream: None,
        }))
    }
}

/// A cpal output device, optionally with a running stream
pub struct CpalDevice {
    device: cpal::Device,
    name: String,
    stream_config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    stream: Option<StreamHandle>,
}

impl OutputDevice for CpalDevice {
    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), PlatformError> {
        if self.stream.is_some() {
            return Err(PlatformError::AlreadyRegistered);
        }

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &self.stream_config, callback),
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &self.stream_config, callback),
            cpal::SampleFormat::U16 => build_stream::<u16>(&self.device, &self.stream_config, callback),
            format => return Err(PlatformError::UnsupportedFormat(format!("{format:?}"))),
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => PlatformError::Suspended,
            e => PlatformError::BuildStream(e),
        })?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => PlatformError::Suspended,
            e => PlatformError::PlayStream(e),
        })?;

        self.stream = Some(StreamHandle(stream));
        Ok(())
    }

    fn deregister_callback(&mut self) -> Result<(), PlatformError> {
        // Dropping the stream detaches the callback even if pause fails
        match self.stream.take() {
            Some(StreamHandle(stream)) => stream.pause().map_err(PlatformError::from),
            None => Ok(()),
        }
    }

    fn release(mut self) -> Result<(), PlatformError> {
        self.stream = None;
        log::debug!("Released output device '{}'", self.name);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: RenderCallback,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);

    // Pre-allocated planar buffers (grow on first oversized callback, then stable)
    let initial = match config.buffer_size {
        cpal::BufferSize::Fixed(frames) => frames as usize,
        cpal::BufferSize::Default => 0,
    };
    let mut left = vec![0.0f32; initial];
    let mut right = vec![0.0f32; initial];

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            if left.len() < frames {
                left.resize(frames, 0.0);
                right.resize(frames, 0.0);
            }

            callback(&mut left[..frames], &mut right[..frames]);
            write_interleaved(data, channels, &left[..frames], &right[..frames]);
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )
}

/// Interleave planar stereo into the device buffer
fn write_interleaved<T: Sample + FromSample<f32>>(
    data: &mut [T],
    channels: usize,
    left: &[f32],
    right: &[f32],
) {
    for ((frame, &l), &r) in data.chunks_exact_mut(channels).zip(left).zip(right) {
        if channels >= 2 {
            frame[0] = T::from_sample(l);
            frame[1] = T::from_sample(r);
            // Fill any extra channels with silence
            for ch in frame.iter_mut().skip(2) {
                *ch = T::EQUILIBRIUM;
            }
        } else {
            frame[0] = T::from_sample((l + r) / 2.0);
        }
    }
}
