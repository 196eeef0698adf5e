// src/config.rs

//! Client configuration: retry policy, timeouts and feature toggles.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the command dispatch core.
///
/// The embedding application deserializes this from its own configuration
/// source; every field has a sensible default so `ClientConfig::default()`
/// works for tests and simple setups.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for a single command attempt on the wire.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// How many times a retriable failure is retried after the first attempt.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between a retriable failure and the next attempt.
    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub retry_interval: Duration,

    /// Rewrites `EVAL` into `EVALSHA` with transparent `SCRIPT LOAD` on
    /// NOSCRIPT, trading one round trip of script text for a digest.
    #[serde(default)]
    pub use_script_cache: bool,

    /// Connections reserved for subscriptions, referenced by the
    /// subscribe-timeout guidance.
    #[serde(default = "default_subscription_pool_size")]
    pub subscription_pool_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_interval: default_retry_interval(),
            use_script_cache: false,
            subscription_pool_size: default_subscription_pool_size(),
        }
    }
}

impl ClientConfig {
    /// The budget granted to subscription establishment before a
    /// [`SubscribeTimeout`](crate::core::SpinelClientError::SubscribeTimeout)
    /// is raised: one full attempt plus every configured retry pause.
    pub fn subscription_timeout(&self) -> Duration {
        self.timeout + self.retry_interval * self.retry_attempts
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_interval() -> Duration {
    Duration::from_millis(1500)
}

fn default_subscription_pool_size() -> usize {
    50
}
