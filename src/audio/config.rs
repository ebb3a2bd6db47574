//! Stream configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::platform::DeviceConfig;

/// Tunables for a [`StreamController`](super::StreamController)
///
/// Fields use `#[serde(default)]` so partially written settings files
/// still load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Buffer size in stereo frames. The sample buffer holds twice as many samples.
    pub buffer_size: usize,
    /// Frames per device callback
    pub block_size: u32,
    /// Delay before retrying a start on a suspended device, in milliseconds
    pub retry_delay_ms: u64,
    /// Requested sample rate. `None` uses the device default.
    pub sample_rate: Option<u32>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            block_size: 1024,
            retry_delay_ms: 500,
            sample_rate: None,
        }
    }
}

impl StreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Device parameters derived from this config (always stereo)
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            channels: 2,
            block_size: self.block_size,
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.buffer_size, 8192);
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.retry_delay(), Duration::from_millis(500));

        let device = config.device_config();
        assert_eq!(device.channels, 2);
        assert_eq!(device.block_size, 1024);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: StreamConfig = serde_json::from_str(r#"{ "buffer_size": 4 }"#).unwrap();
        assert_eq!(config.buffer_size, 4);
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.sample_rate, None);
    }
}
