//! Failure injection for the scripted server

use crate::runtime::FetchOutcome;

/// A failure to return instead of the scripted response
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Outcome returned while the failure is active
    pub outcome: FetchOutcome,
    /// Number of requests to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Network failure on every request
    pub fn network(reason: impl Into<String>) -> Self {
        Self {
            outcome: FetchOutcome::Network(reason.into()),
            fail_count: None,
        }
    }

    /// Non-success HTTP status on every request
    pub fn status(status: u16) -> Self {
        Self {
            outcome: FetchOutcome::Status(status),
            fail_count: None,
        }
    }

    /// Successful responses that lack the ETag header
    pub fn missing_etag() -> Self {
        Self {
            outcome: FetchOutcome::MissingEtag,
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector consulted before every scripted response
#[derive(Debug, Default)]
pub struct FailureInjector {
    config: Option<FailureConfig>,
    calls: u32,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure
    pub fn inject(&mut self, config: FailureConfig) {
        self.config = Some(config);
        self.calls = 0;
    }

    /// Clear the active failure
    pub fn clear(&mut self) {
        self.config = None;
        self.calls = 0;
    }

    /// Returns the failure outcome if this request should fail
    pub fn check(&mut self) -> Option<FetchOutcome> {
        let config = self.config.as_ref()?;
        self.calls += 1;

        if let Some(limit) = config.fail_count {
            if self.calls > limit {
                return None;
            }
        }

        Some(config.outcome.clone())
    }
}
