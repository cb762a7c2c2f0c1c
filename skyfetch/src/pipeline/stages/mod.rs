//! Built-in pipeline stages.
//!
//! - [`RetryStage`]: resubmits 429/5xx failures with a fixed delay
//! - [`LogStage`]: debug logging of requests and outcomes
//! - [`CacheStage`]: coalescing, cache reads and cache writes

mod cache;
mod log;
mod retry;

pub use cache::CacheStage;
pub use log::LogStage;
pub use retry::RetryStage;
