//! Scripted HEAD responses

use std::collections::VecDeque;

use super::failure::{FailureConfig, FailureInjector};
use crate::runtime::FetchOutcome;

/// Serves scripted outcomes in order, repeating the last one when exhausted
#[derive(Debug, Default)]
pub struct ScriptedServer {
    responses: VecDeque<FetchOutcome>,
    last: Option<FetchOutcome>,
    failures: FailureInjector,
    requests: usize,
}

impl ScriptedServer {
    /// Create a server with no responses scripted
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses
    pub fn push_responses(&mut self, responses: impl IntoIterator<Item = FetchOutcome>) {
        self.responses.extend(responses);
    }

    /// Queue a successful response with the given ETag
    pub fn push_etag(&mut self, etag: impl Into<String>) {
        self.responses.push_back(FetchOutcome::Etag(etag.into()));
    }

    /// Inject a failure ahead of the scripted responses
    pub fn inject_failure(&mut self, config: FailureConfig) {
        self.failures.inject(config);
    }

    /// Clear an injected failure
    pub fn clear_failure(&mut self) {
        self.failures.clear();
    }

    /// Answer one request
    pub fn respond(&mut self) -> FetchOutcome {
        self.requests += 1;

        if let Some(failure) = self.failures.check() {
            return failure;
        }

        match self.responses.pop_front() {
            Some(outcome) => {
                self.last = Some(outcome.clone());
                outcome
            }
            None => self
                .last
                .clone()
                .unwrap_or_else(|| FetchOutcome::Network("no response scripted".to_string())),
        }
    }

    /// Number of requests served
    pub fn requests(&self) -> usize {
        self.requests
    }
}
