use std::time::Duration;

use http::{HeaderMap, Uri};
use http_batch_core::Boundary;

use super::RetryPolicy;

/// Settings shared by every batch created from one client.
///
/// Built and validated by [`BatchClientBuilder`](crate::BatchClientBuilder).
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// The batch endpoint every outer request is POSTed to.
    pub batch_url: Uri,
    /// Headers added to every outer request.
    pub default_headers: HeaderMap,
    /// Per-round timeout covering send and receive of the outer request.
    pub timeout: Option<Duration>,
    /// Cap and pacing of follow-up rounds.
    pub retry_policy: RetryPolicy,
    /// Preferred boundary for outgoing batches.
    pub boundary: Boundary,
}

impl BatchConfig {
    pub fn new(batch_url: Uri) -> Self {
        Self {
            batch_url,
            default_headers: HeaderMap::new(),
            timeout: None,
            retry_policy: RetryPolicy::default(),
            boundary: Boundary::default(),
        }
    }
}
