//! speaker-stream - plays a Lissajous test figure through the default output device
//!
//! Left = X, right = Y, so the output draws the figure on an XY oscilloscope.
//! A producer thread keeps the stream buffer about half full while the
//! underrun hook tops it up from the same generator if the producer falls
//! behind.
//!
//! Usage: `speaker-stream [seconds]`

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use speaker_stream::audio::{StreamController, StreamState};
use speaker_stream::platform::CpalPlatform;
use speaker_stream::settings::StreamSettings;

/// How often the producer thread wakes up
const PRODUCER_INTERVAL: Duration = Duration::from_millis(10);

/// Assumed rate until the device reports its own
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Lissajous figure traced `frequency` times per second
///
/// ## Parametric Equation
/// ```text
/// x = sin(a * t + delta)
/// y = sin(b * t)
/// ```
struct Lissajous {
    a: f32,
    b: f32,
    delta: f32,
    volume: f32,
    frequency: f32,
    sample_rate: f32,
    /// Position within one trace (0.0 to 1.0)
    phase: f32,
}

impl Lissajous {
    fn from_settings(settings: &StreamSettings) -> Self {
        Self {
            a: settings.lissajous_a,
            b: settings.lissajous_b,
            delta: settings.lissajous_delta,
            volume: settings.volume.clamp(0.0, 1.0),
            frequency: settings.frequency,
            sample_rate: DEFAULT_SAMPLE_RATE as f32,
            phase: 0.0,
        }
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1) as f32;
    }

    fn next_frame(&mut self) -> (f32, f32) {
        let t = self.phase * TAU;
        let x = (self.a * t + self.delta).sin() * self.volume;
        let y = (self.b * t).sin() * self.volume;

        self.phase = (self.phase + self.frequency / self.sample_rate).fract();
        (x, y)
    }
}

fn main() {
    env_logger::init();
    log::info!("Starting speaker-stream");

    let settings = StreamSettings::load();
    let duration = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .unwrap_or(settings.duration_secs);

    let generator = Arc::new(Mutex::new(Lissajous::from_settings(&settings)));

    let hook_generator = Arc::clone(&generator);
    let controller = StreamController::builder(CpalPlatform::new())
        .config(settings.stream.clone())
        .on_underrun(move |writer, buffered, needed| {
            // Never wait on the producer from the device thread
            if let Some(mut generator) = hook_generator.try_lock() {
                for _ in 0..(needed - buffered) / 2 {
                    let (x, y) = generator.next_frame();
                    writer.write_sample(x, y);
                }
            }
        })
        .build();

    controller.start();

    // A suspended device may take a few retries to come up
    let deadline = Instant::now() + Duration::from_secs(2);
    while controller.state() == StreamState::Starting && Instant::now() < deadline {
        thread::sleep(PRODUCER_INTERVAL);
    }

    match controller.sample_rate() {
        Some(rate) => generator.lock().set_sample_rate(rate),
        None => log::warn!(
            "Output not running yet (state: {:?}), producing at {} Hz",
            controller.state(),
            DEFAULT_SAMPLE_RATE
        ),
    }

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let writer = controller.writer();
        let generator = Arc::clone(&generator);
        let done = Arc::clone(&done);
        let target = controller.config().buffer_size.max(1) / 2;

        thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let buffered_frames = writer.buffered_samples() / 2;
                if writer.is_running() && buffered_frames < target {
                    let mut generator = generator.lock();
                    for _ in buffered_frames..target {
                        let (x, y) = generator.next_frame();
                        writer.write_sample(x, y);
                    }
                }
                thread::sleep(PRODUCER_INTERVAL);
            }
        })
    };

    log::info!("Playing for {} seconds", duration);
    thread::sleep(Duration::from_secs(duration));

    done.store(true, Ordering::Relaxed);
    if producer.join().is_err() {
        log::error!("Producer thread panicked");
    }
    controller.stop();

    println!("{}", controller.stats().report());
}
