//! Timing and sizing knobs for a rootmesh node
//!
//! Defaults follow the reference radio deployment. Tests and simulations
//! shrink `interval` to run the same protocol at compressed scale.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default protocol interval (5 s)
pub const DEFAULT_INTERVAL_MS: u64 = 5000;

/// Default number of root info requests before electing
pub const DEFAULT_SEARCH_RETRIES: u32 = 3;

/// Default number of vote broadcast rounds
pub const DEFAULT_VOTE_ROUNDS: u32 = 3;

/// Default inbound queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 6;

/// Default wait for a free queue slot before dropping a frame
pub const DEFAULT_ENQUEUE_TIMEOUT_MS: u64 = 512;

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Root info requests sent before falling back to an election
    pub search_retries: u32,

    /// Pause between search attempts and between vote rounds
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,

    /// Vote broadcast rounds per election
    pub vote_rounds: u32,

    /// Period of the presence advertisement
    #[serde(rename = "advertise_interval_ms", with = "duration_ms")]
    pub advertise_interval: Duration,

    /// Inbound frame queue depth
    pub queue_capacity: usize,

    /// How long the receive hook waits for a free queue slot
    #[serde(rename = "enqueue_timeout_ms", with = "duration_ms")]
    pub enqueue_timeout: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            search_retries: DEFAULT_SEARCH_RETRIES,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            vote_rounds: DEFAULT_VOTE_ROUNDS,
            advertise_interval: Duration::from_millis(DEFAULT_INTERVAL_MS * 2),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            enqueue_timeout: Duration::from_millis(DEFAULT_ENQUEUE_TIMEOUT_MS),
        }
    }
}

impl MeshConfig {
    /// Same protocol shape with every timer derived from `interval`
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.advertise_interval = interval * 2;
        self
    }

    pub fn with_search_retries(mut self, retries: u32) -> Self {
        self.search_retries = retries;
        self
    }

    pub fn with_vote_rounds(mut self, rounds: u32) -> Self {
        self.vote_rounds = rounds;
        self
    }

    pub fn with_advertise_interval(mut self, interval: Duration) -> Self {
        self.advertise_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Quiet period after the last vote round before voting closes
    pub fn settle_period(&self) -> Duration {
        self.interval * self.vote_rounds
    }

    /// Worst-case time from start until an isolated node has elected itself
    /// and closed voting
    pub fn convergence_bound(&self) -> Duration {
        self.interval * self.search_retries + self.interval * self.vote_rounds + self.settle_period()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_retries == 0 {
            return Err(ConfigError::Zero("search_retries"));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Zero("interval"));
        }
        if self.vote_rounds == 0 {
            return Err(ConfigError::Zero("vote_rounds"));
        }
        if self.advertise_interval.is_zero() {
            return Err(ConfigError::Zero("advertise_interval"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
