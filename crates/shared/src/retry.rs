//! 重试策略与执行器
//!
//! 提供指数退避重试机制。会员账户采用乐观锁写入，版本冲突后需要重新读取、重新计算再提交，
//! 由本模块统一驱动。业务逻辑错误（如积分不足）不应被重试，由调用方通过 `is_retryable` 闭包控制。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// RetryPolicy：重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略配置
///
/// 使用指数退避避免重试风暴：首次失败等 initial_delay，之后每次乘以 multiplier，
/// 直到达到最大间隔或最大重试次数。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
    /// 每次重试的退避倍数
    pub multiplier: f64,
}

impl RetryPolicy {
    /// 立即重试、不等待的策略，适合内存存储与测试
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// 计算第 N 次重试的等待时间（attempt 从 0 开始）
    ///
    /// 公式: initial_delay * multiplier^attempt，结果不超过 max_delay。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// 是否应继续重试
    ///
    /// attempt 表示已经失败的次数，当 attempt < max_retries 时返回 true。
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

// ---------------------------------------------------------------------------
// retry_with_policy：带重试的异步执行器
// ---------------------------------------------------------------------------

/// 按策略重复执行异步操作
///
/// `is_retryable` 判定错误是否值得再试一次（账户与等级写入只对版本冲突返回 true），
/// 其余错误原样返回。每次重试都会重新调用 `operation`，由它负责重新读取最新状态。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failures: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) if failures == 0 => return Ok(value),
            Ok(value) => {
                info!(operation = operation_name, retries = failures, "重试后提交成功");
                return Ok(value);
            }
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => err,
        };

        if !policy.should_retry(failures) {
            warn!(
                operation = operation_name,
                retries = failures,
                error = %err,
                "重试次数已用尽"
            );
            return Err(err);
        }

        let delay = policy.delay_for_attempt(failures);
        metrics::counter!("loyalty_concurrency_retries_total", "operation" => operation_name.to_string())
            .increment(1);
        warn!(
            operation = operation_name,
            retry = failures + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "写入冲突，退避后重试"
        );

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoyaltyError;
    use std::cell::Cell;

    fn conflict() -> LoyaltyError {
        LoyaltyError::Internal("版本冲突".to_string())
    }

    fn is_conflict(err: &LoyaltyError) -> bool {
        matches!(err, LoyaltyError::Internal(_))
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(30),
            multiplier: 2.0,
        };

        let delays: Vec<u64> = (0..5)
            .map(|n| policy.delay_for_attempt(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);
    }

    #[test]
    fn test_immediate_policy() {
        let policy = RetryPolicy::immediate(2);
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
        assert_eq!(policy.delay_for_attempt(7), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_conflicts_then_commit() {
        let calls = Cell::new(0);
        let result = retry_with_policy(&RetryPolicy::immediate(4), "commit", is_conflict, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: Result<(), LoyaltyError> =
            retry_with_policy(&RetryPolicy::immediate(2), "commit", is_conflict, || {
                calls.set(calls.get() + 1);
                async { Err(conflict()) }
            })
            .await;

        assert!(is_conflict(&result.unwrap_err()));
        // 首次执行 + 2 次重试
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_business_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), LoyaltyError> =
            retry_with_policy(&RetryPolicy::immediate(5), "commit", is_conflict, || {
                calls.set(calls.get() + 1);
                async { Err(LoyaltyError::Validation("积分不足".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(LoyaltyError::Validation(_))));
        assert_eq!(calls.get(), 1);
    }
}
