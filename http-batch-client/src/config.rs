//! Configuration for batch execution.
//!
//! - [`BatchConfig`]: Resolved per-client settings (endpoint, headers, timeout)
//! - [`RetryPolicy`]: Cap and pacing of follow-up rounds

mod batch;
mod retry;

pub use batch::BatchConfig;
pub use retry::{defaults, ExponentialBackoff, RetryPolicy};
