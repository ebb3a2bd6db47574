//! Stream controller - connects a sample producer to the output device
//!
//! The producer pushes stereo pairs with `write_sample` at its own pace. The
//! device calls `fill` once per block on its real-time thread. Between the
//! two sits a [`SampleBuffer`] behind a lock that is only ever held for a
//! bounded copy, and never while the underrun hook runs.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped --start()--> Starting --device ready--> Running --stop()--> Stopped
//!                      Starting --suspended--> Starting (delayed retry)
//! ```
//!
//! A device that is ready at once goes straight from `Stopped` to `Running`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::buffer::{BufferError, SampleBuffer};
use super::config::StreamConfig;
use super::retry::RetryTimer;
use super::stats::StreamStats;
use crate::platform::{Acquisition, OutputDevice, OutputPlatform, PlatformError};

/// Called from the device callback when the buffer holds fewer samples than
/// the block needs.
///
/// Arguments are a writer for topping up the buffer, the number of samples
/// currently buffered and the number needed. The hook runs inline with the
/// device deadline: it must only do fast, bounded work (such as draining an
/// in-memory queue) and must never block on I/O.
pub type UnderrunHook = Box<dyn Fn(&SampleWriter, usize, usize) + Send + Sync>;

/// Receives device errors that the controller recovers from on its own
pub type ErrorHandler = Box<dyn Fn(&PlatformError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    /// Waiting for a suspended device, with a retry pending
    Starting,
    Running,
}

/// State shared with producers and the device callback
struct Shared {
    buffer: Mutex<SampleBuffer>,
    /// Only written while the buffer lock is held
    running: AtomicBool,
    /// Stereo frames, the overrun threshold
    buffer_size: usize,
    underrun_hook: Option<UnderrunHook>,
    stats: StreamStats,
}

impl Shared {
    fn write_sample(&self, left: f32, right: f32) {
        let mut buffer = self.buffer.lock();
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let overrun = buffer.size() / 2 >= self.buffer_size;
        buffer.enqueue(left);
        buffer.enqueue(right);
        drop(buffer);

        if overrun {
            self.stats.record_overrun();
            log::warn!("Buffer overrun");
        }
    }

    fn fill(self: &Arc<Self>, left: &mut [f32], right: &mut [f32]) {
        self.stats.record_callback();
        let frames = left.len().min(right.len());
        let needed = frames * 2;

        if let Some(hook) = &self.underrun_hook {
            let buffered = self.buffer.lock().size();
            if buffered < needed {
                self.stats.record_hook_invocation();
                let writer = SampleWriter {
                    shared: Arc::clone(self),
                };
                hook(&writer, buffered, needed);
            }
        }

        let result = self
            .buffer
            .lock()
            .dequeue_stereo(&mut left[..frames], &mut right[..frames]);

        match result {
            Ok(()) => self.stats.add_frames_played(frames as u64),
            Err(BufferError::InsufficientData { available, .. }) => {
                self.stats.record_underrun();
                // An empty buffer is expected right after start or stop
                if available > 0 {
                    log::warn!(
                        "Buffer underrun (needed {}, got {})",
                        frames,
                        available / 2
                    );
                }
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }

    /// Flip the running flag; stopping also discards everything buffered
    fn set_running(&self, running: bool) {
        let mut buffer = self.buffer.lock();
        if !running {
            buffer.clear();
        }
        self.running.store(running, Ordering::Release);
    }
}

/// Cloneable producer handle
///
/// Lets a producer thread (or the underrun hook) write samples without
/// access to the controller itself.
#[derive(Clone)]
pub struct SampleWriter {
    shared: Arc<Shared>,
}

impl SampleWriter {
    /// See [`StreamController::write_sample`]
    #[inline]
    pub fn write_sample(&self, left: f32, right: f32) {
        self.shared.write_sample(left, right);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn buffered_samples(&self) -> usize {
        self.shared.buffer.lock().size()
    }
}

struct Control<P: OutputPlatform> {
    platform: P,
    /// Present only while a callback is registered on it
    device: Option<P::Device>,
    state: StreamState,
    pending_retry: Option<RetryTimer>,
    next_retry_id: u64,
}

struct Inner<P: OutputPlatform> {
    shared: Arc<Shared>,
    control: Mutex<Control<P>>,
    config: StreamConfig,
    error_handler: ErrorHandler,
}

impl<P: OutputPlatform> Inner<P> {
    fn start_locked(self: &Arc<Self>, control: &mut Control<P>) {
        if control.state == StreamState::Running {
            log::debug!("Stream already running");
            return;
        }

        // Audio is optional: no platform support means no sound, not an error
        if !control.platform.is_available() {
            log::info!("Audio output is not supported on this system");
            return;
        }

        if let Some(timer) = control.pending_retry.take() {
            timer.cancel();
        }

        let mut device = match control.platform.acquire(&self.config.device_config()) {
            Ok(Acquisition::Ready(device)) => device,
            Ok(Acquisition::Suspended(device)) => {
                self.release_device(device);
                self.schedule_retry(control);
                return;
            }
            Err(e) => {
                (self.error_handler)(&e);
                control.state = StreamState::Stopped;
                return;
            }
        };

        self.shared.set_running(true);

        let shared = Arc::clone(&self.shared);
        let render = move |left: &mut [f32], right: &mut [f32]| shared.fill(left, right);
        match device.register_callback(Box::new(render)) {
            Ok(()) => {
                log::info!(
                    "Audio started on '{}' at {} Hz",
                    device.name(),
                    device.sample_rate()
                );
                control.device = Some(device);
                control.state = StreamState::Running;
            }
            Err(PlatformError::Suspended) => {
                self.shared.set_running(false);
                self.release_device(device);
                self.schedule_retry(control);
            }
            Err(e) => {
                self.shared.set_running(false);
                (self.error_handler)(&e);
                self.release_device(device);
                control.state = StreamState::Stopped;
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, control: &mut Control<P>) {
        let id = control.next_retry_id;
        control.next_retry_id += 1;

        let delay = self.config.retry_delay();
        log::debug!("Output device suspended, retrying start in {:?}", delay);

        let weak = Arc::downgrade(self);
        let scheduled = RetryTimer::schedule(id, delay, move || {
            if let Some(inner) = weak.upgrade() {
                inner.retry(id);
            }
        });

        match scheduled {
            Ok(timer) => {
                control.pending_retry = Some(timer);
                control.state = StreamState::Starting;
            }
            Err(e) => {
                log::error!("Failed to schedule start retry: {}", e);
                control.state = StreamState::Stopped;
            }
        }
    }

    fn retry(self: &Arc<Self>, id: u64) {
        let mut control = self.control.lock();
        // A timer cancelled after it woke up can still get here
        if control.pending_retry.as_ref().map(RetryTimer::id) != Some(id) {
            return;
        }
        control.pending_retry = None;
        self.start_locked(&mut control);
    }

    fn release_device(&self, device: P::Device) {
        if let Err(e) = device.release() {
            (self.error_handler)(&e);
        }
    }
}

/// Owns the sample buffer and the output device for one stereo stream
///
/// ## Example
///
/// ```no_run
/// use speaker_stream::audio::{StreamConfig, StreamController};
/// use speaker_stream::platform::CpalPlatform;
///
/// let controller = StreamController::builder(CpalPlatform::new())
///     .config(StreamConfig::default())
///     .on_underrun(|writer, buffered, needed| {
///         for _ in (buffered..needed).step_by(2) {
///             writer.write_sample(0.0, 0.0);
///         }
///     })
///     .build();
///
/// controller.start();
/// controller.write_sample(0.5, -0.5);
/// controller.stop();
/// ```
pub struct StreamController<P: OutputPlatform> {
    inner: Arc<Inner<P>>,
}

impl<P: OutputPlatform> StreamController<P> {
    pub fn new(platform: P, config: StreamConfig) -> Self {
        Self::builder(platform).config(config).build()
    }

    pub fn builder(platform: P) -> StreamControllerBuilder<P> {
        StreamControllerBuilder {
            platform,
            config: StreamConfig::default(),
            underrun_hook: None,
            error_handler: None,
        }
    }

    /// Acquire the output device and begin playback
    ///
    /// A no-op when audio is unsupported or the stream is already running.
    /// If the device is suspended, it is released and the start is retried
    /// after `retry_delay` until it succeeds or [`stop`](Self::stop) is called.
    pub fn start(&self) {
        let mut control = self.inner.control.lock();
        self.inner.start_locked(&mut control);
    }

    /// Stop playback and release the device
    ///
    /// Cancels any pending retry, deregisters the callback, releases the
    /// device and discards buffered samples. Teardown errors go to the error
    /// handler and never cut the sequence short. Calling it again is a no-op.
    pub fn stop(&self) {
        let mut control = self.inner.control.lock();

        if let Some(timer) = control.pending_retry.take() {
            log::debug!("Cancelling pending start retry {}", timer.id());
            timer.cancel();
        }

        if let Some(mut device) = control.device.take() {
            if let Err(e) = device.deregister_callback() {
                (self.inner.error_handler)(&e);
            }
            self.inner.release_device(device);
        }

        self.inner.shared.set_running(false);

        if control.state != StreamState::Stopped {
            log::info!("Audio stopped");
        }
        control.state = StreamState::Stopped;
    }

    /// Stop if running or starting, start otherwise
    pub fn toggle(&self) {
        if self.state() == StreamState::Stopped {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Queue one stereo frame
    ///
    /// Discarded while not running. Writing into a full buffer still succeeds
    /// (the oldest frame is dropped) and is reported as an overrun.
    #[inline]
    pub fn write_sample(&self, left: f32, right: f32) {
        self.inner.shared.write_sample(left, right);
    }

    /// Render one block into `left` and `right`
    ///
    /// This is the device callback; the frame count is the length of the
    /// output slices. Either the whole block is real audio or the whole
    /// block is silence.
    pub fn fill(&self, left: &mut [f32], right: &mut [f32]) {
        self.inner.shared.fill(left, right);
    }

    pub fn writer(&self) -> SampleWriter {
        SampleWriter {
            shared: Arc::clone(&self.inner.shared),
        }
    }

    pub fn state(&self) -> StreamState {
        self.inner.control.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.inner.shared.running.load(Ordering::Acquire)
    }

    /// Samples (not frames) currently buffered
    pub fn buffered_samples(&self) -> usize {
        self.inner.shared.buffer.lock().size()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.inner.shared.stats
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    /// Name of the device currently playing, if any
    pub fn device_name(&self) -> Option<String> {
        self.inner.control.lock().device.as_ref().map(|d| d.name())
    }

    /// Sample rate of the device currently playing, if any
    pub fn sample_rate(&self) -> Option<u32> {
        self.inner.control.lock().device.as_ref().map(|d| d.sample_rate())
    }
}

impl<P: OutputPlatform> Drop for StreamController<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct StreamControllerBuilder<P: OutputPlatform> {
    platform: P,
    config: StreamConfig,
    underrun_hook: Option<UnderrunHook>,
    error_handler: Option<ErrorHandler>,
}

impl<P: OutputPlatform> StreamControllerBuilder<P> {
    /// Default: [`StreamConfig::default`]
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// See [`UnderrunHook`]
    pub fn on_underrun<F>(mut self, hook: F) -> Self
    where
        F: Fn(&SampleWriter, usize, usize) + Send + Sync + 'static,
    {
        self.underrun_hook = Some(Box::new(hook));
        self
    }

    /// Default: log the error
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&PlatformError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> StreamController<P> {
        let buffer_size = self.config.buffer_size.max(1);

        let shared = Arc::new(Shared {
            buffer: Mutex::new(SampleBuffer::with_frames(buffer_size)),
            running: AtomicBool::new(false),
            buffer_size,
            underrun_hook: self.underrun_hook,
            stats: StreamStats::new(),
        });

        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Box::new(|e| log::error!("Audio device error: {}", e)));

        StreamController {
            inner: Arc::new(Inner {
                shared,
                control: Mutex::new(Control {
                    platform: self.platform,
                    device: None,
                    state: StreamState::Stopped,
                    pending_retry: None,
                    next_retry_id: 0,
                }),
                config: self.config,
                error_handler,
            }),
        }
    }
}
