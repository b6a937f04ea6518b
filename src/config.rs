//! Task periods and receiver tuning.

use core::time::Duration;
use log::LevelFilter;
use thiserror::Error;

/// Size of the scratch buffer used to discard bytes the decoder does not retain.
pub const DISCARD_CHUNK_LEN: usize = 64;

/// How the receiver hands bytes to the decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReceiverMode {
    /// The decoder pulls bytes from the device on demand.
    #[default]
    Streaming,

    /// One read of the largest message fills a buffer that is decoded whole.
    Buffered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiverConfig {
    pub mode: ReceiverMode,

    /// Commands held by the command channel.
    pub queue_capacity: usize,

    /// Longest wait for space in a full command channel before dropping.
    pub send_timeout: Duration,

    /// Sleep after a failed transfer start or decode.
    pub backoff: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            mode: ReceiverMode::default(),
            queue_capacity: 8,
            send_timeout: Duration::from_millis(10),
            backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Longest wait for each device probe at startup.
    pub probe_timeout: Duration,
    pub sensor_period: Duration,
    pub estimator_period: Duration,
    pub vehicle_period: Duration,
    pub telemetry_period: Duration,
    pub receiver: ReceiverConfig,

    /// Most verbose level written to the log device.
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(10),
            sensor_period: Duration::from_millis(5),
            estimator_period: Duration::from_millis(5),
            vehicle_period: Duration::from_millis(10),
            telemetry_period: Duration::from_millis(100),
            receiver: ReceiverConfig::default(),
            log_level: LevelFilter::Info,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be zero")]
    ZeroPeriod(&'static str),
}

impl Config {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Check that every task period is non-zero, so each `dt` is strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("sensor_period", self.sensor_period),
            ("estimator_period", self.estimator_period),
            ("vehicle_period", self.vehicle_period),
            ("telemetry_period", self.telemetry_period),
        ];

        match periods.iter().find(|(_, period)| period.is_zero()) {
            Some(&(name, _)) => Err(ConfigError::ZeroPeriod(name)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn sensor_period(mut self, period: Duration) -> Self {
        self.config.sensor_period = period;
        self
    }

    pub fn estimator_period(mut self, period: Duration) -> Self {
        self.config.estimator_period = period;
        self
    }

    pub fn vehicle_period(mut self, period: Duration) -> Self {
        self.config.vehicle_period = period;
        self
    }

    pub fn telemetry_period(mut self, period: Duration) -> Self {
        self.config.telemetry_period = period;
        self
    }

    pub fn receiver_mode(mut self, mode: ReceiverMode) -> Self {
        self.config.receiver.mode = mode;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.receiver.queue_capacity = capacity;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.config.receiver.send_timeout = timeout;
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.config.receiver.backoff = backoff;
        self
    }

    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
