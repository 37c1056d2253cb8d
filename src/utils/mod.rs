pub mod log_hub;
pub mod logging;
pub mod retry;

pub use log_hub::{LogEvent, LogHub, LogSubscription};
pub use retry::{retry_with_backoff, Backoff, RetryError, RetryPolicy};
