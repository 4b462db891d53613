//! Engine configuration

use std::time::Duration;

/// Default per-resource invocation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for a convergence run
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on a single module invocation
    pub timeout: Duration,
    /// Maximum number of independent resources invoked at once
    pub jobs: usize,
    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            jobs: 1,
            event_channel_capacity: 1024,
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency limit; zero is treated as one
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}
