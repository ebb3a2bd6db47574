//! Scripted platform for tests
//!
//! Acquisitions follow a queue of outcomes; once the queue is empty every
//! acquisition is ready. The registered callback is exposed through
//! [`MockProbe::render`] so tests can play the role of the device clock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Acquisition, DeviceConfig, OutputDevice, OutputPlatform, PlatformError, RenderCallback};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Ready,
    Suspended,
    /// Ready device whose callback registration fails
    RegisterFails,
    NoDevice,
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockOutcome>,
    callback: Option<Arc<Mutex<RenderCallback>>>,
    acquisitions: usize,
    registrations: usize,
    deregistrations: usize,
    releases: usize,
    last_config: Option<DeviceConfig>,
    fail_teardown: bool,
}

/// Test-side view of a [`MockPlatform`]
#[derive(Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    /// Invoke the registered callback like a device would. Returns `false`
    /// if no callback is registered.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) -> bool {
        // Clone the handle so the callback runs without holding the state lock
        let callback = self.state.lock().callback.clone();
        match callback {
            Some(cb) => {
                let mut render = cb.lock();
                (*render)(left, right);
                true
            }
            None => false,
        }
    }

    pub fn has_callback(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    pub fn acquisitions(&self) -> usize {
        self.state.lock().acquisitions
    }

    pub fn registrations(&self) -> usize {
        self.state.lock().registrations
    }

    pub fn deregistrations(&self) -> usize {
        self.state.lock().deregistrations
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn last_config(&self) -> Option<DeviceConfig> {
        self.state.lock().last_config
    }

    /// Make deregistration and release report errors
    pub fn fail_teardown(&self) {
        self.state.lock().fail_teardown = true;
    }
}

pub struct MockPlatform {
    available: bool,
    probe: MockProbe,
}

impl MockPlatform {
    pub fn new(script: impl IntoIterator<Item = MockOutcome>) -> (Self, MockProbe) {
        let probe = MockProbe::default();
        probe.state.lock().script = script.into_iter().collect();
        (
            Self {
                available: true,
                probe: probe.clone(),
            },
            probe,
        )
    }

    pub fn unavailable() -> (Self, MockProbe) {
        let (mut platform, probe) = Self::new([]);
        platform.available = false;
        (platform, probe)
    }
}

impl OutputPlatform for MockPlatform {
    type Device = MockDevice;

    fn is_available(&self) -> bool {
        self.available
    }

    fn acquire(&mut self, config: &DeviceConfig) -> Result<Acquisition<MockDevice>, PlatformError> {
        let mut state = self.probe.state.lock();
        state.acquisitions += 1;
        state.last_config = Some(*config);
        let outcome = state.script.pop_front().unwrap_or(MockOutcome::Ready);
        drop(state);

        let device = MockDevice {
            probe: self.probe.clone(),
            registered: false,
            fail_register: outcome == MockOutcome::RegisterFails,
        };
        match outcome {
            MockOutcome::Ready | MockOutcome::RegisterFails => Ok(Acquisition::Ready(device)),
            MockOutcome::Suspended => Ok(Acquisition::Suspended(device)),
            MockOutcome::NoDevice => Err(PlatformError::NoDevice),
        }
    }
}

pub struct MockDevice {
    probe: MockProbe,
    registered: bool,
    fail_register: bool,
}

impl OutputDevice for MockDevice {
    fn register_callback(&mut self, callback: RenderCallback) -> Result<(), PlatformError> {
        if self.fail_register {
            return Err(PlatformError::Backend("mock registration failure".into()));
        }
        if self.registered {
            return Err(PlatformError::AlreadyRegistered);
        }
        let mut state = self.probe.state.lock();
        state.registrations += 1;
        state.callback = Some(Arc::new(Mutex::new(callback)));
        self.registered = true;
        Ok(())
    }

    fn deregister_callback(&mut self) -> Result<(), PlatformError> {
        if !self.registered {
            return Ok(());
        }
        self.registered = false;
        let mut state = self.probe.state.lock();
        state.deregistrations += 1;
        state.callback = None;
        if state.fail_teardown {
            return Err(PlatformError::Backend("mock disconnect failure".into()));
        }
        Ok(())
    }

    fn release(self) -> Result<(), PlatformError> {
        let mut state = self.probe.state.lock();
        state.releases += 1;
        if state.fail_teardown {
            return Err(PlatformError::Backend("mock release failure".into()));
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}
