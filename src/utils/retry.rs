//! 带退避的重试工具
//!
//! 上传和 PDF 下载都通过这里重试，失败时返回 `RetryError` 而不是直接 panic

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// 重试间隔策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 第 n 次失败后等待 `base * n`
    Linear(Duration),
    /// 每次等待相同时间
    Fixed(Duration),
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// `max_attempts` 为 0 时按 1 次处理
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 `attempt` 次（从 1 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear(base) => base.saturating_mul(attempt.max(1)),
            Backoff::Fixed(delay) => delay,
        }
    }
}

/// 重试耗尽后的结果
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "已尝试 {} 次仍失败: {}", self.attempts, self.last_error)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// 按策略重试 `op`，直到成功或次数用完
///
/// 最后一次失败之后不再等待。
pub async fn retry_with_backoff<T, E, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    "⚠️ {} 第 {}/{} 次尝试失败: {}",
                    label, attempt, policy.max_attempts, e
                );
                if attempt >= policy.max_attempts {
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
