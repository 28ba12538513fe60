//! Connection-level helpers independent of the driver.

pub mod retry;

pub use retry::{RetryConfig, retry, retry_with_backoff};
