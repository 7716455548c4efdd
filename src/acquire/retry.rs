//! # 重试执行器
//!
//! 对零参数操作做有限次重试，等待时间指数增长：
//! 第 `k` 次失败后等待 `base_delay * backoff_base^k`，最后一次尝试后不再等待。
//!
//! 重试耗尽不是错误：若曾出现错误，最后一条写入错误日志，然后返回 `None`，
//! 由流水线进入下一阶段。
//!
//! ## 依赖关系
//! - 被 `acquire/pipeline.rs` 使用
//! - `Sleeper` 同时被 `batch/runner.rs` 用于批次间限速

use super::{ErrorLog, Lookup};

use std::sync::Arc;
use std::time::Duration;

/// 阻塞等待的抽象，测试中替换为记录型实现
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// 直接阻塞当前线程
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// 单次等待的默认上限
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（至少 1）
    pub max_retries: u32,
    /// 指数退避底数
    pub backoff_base: f64,
    /// 基础等待时间
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            backoff_base: 2.0,
            base_delay: Duration::from_secs(2),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次（从 0 开始）失败后的等待时间，不超过 `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_base.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .map(|d| d.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// 重试执行器
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// 执行操作直到找到结果或尝试次数耗尽
    pub fn execute<T, F>(
        &self,
        stage: &str,
        formula: &str,
        errors: &mut ErrorLog,
        mut operation: F,
    ) -> Option<T>
    where
        F: FnMut() -> Lookup<T>,
    {
        let attempts = self.policy.attempts();
        let mut last_error: Option<String> = None;

        for attempt in 0..attempts {
            match operation() {
                Lookup::Found(value) => {
                    if attempt > 0 {
                        tracing::debug!(stage, formula, attempt = attempt + 1, "succeeded after retry");
                    }
                    return Some(value);
                }
                Lookup::Empty => {
                    tracing::debug!(stage, formula, attempt = attempt + 1, "no result");
                }
                Lookup::Failed(err) => {
                    tracing::warn!(
                        stage,
                        formula,
                        attempt = attempt + 1,
                        "attempt failed: {}",
                        err
                    );
                    last_error = Some(err);
                }
            }

            if attempt + 1 < attempts {
                let wait = self.policy.delay_for(attempt);
                tracing::debug!(stage, formula, "retrying in {:?}", wait);
                self.sleeper.sleep(wait);
            }
        }

        if let Some(err) = last_error {
            tracing::error!(stage, formula, "giving up after {} attempts", attempts);
            errors.record(
                stage,
                formula,
                format!("{} (after {} attempts)", err, attempts),
            );
        }

        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// 记录等待时间而不真正阻塞
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub waits: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.waits.borrow_mut().push(duration);
        }
    }

    fn executor(max_retries: u32, sleeper: Arc<RecordingSleeper>) -> RetryExecutor {
        RetryExecutor::new(
            RetryPolicy {
                max_retries,
                backoff_base: 2.0,
                base_delay: Duration::from_secs(1),
                max_delay: DEFAULT_MAX_DELAY,
            },
            sleeper,
        )
    }

    #[test]
    fn test_always_failing_operation_exhausts_attempts() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = executor(4, sleeper.clone());
        let mut log = ErrorLog::new();
        let calls = Cell::new(0);

        let result: Option<()> = retry.execute("database", "NaCl", &mut log, || {
            calls.set(calls.get() + 1);
            Lookup::Failed(format!("timeout #{}", calls.get()))
        });

        assert!(result.is_none());
        assert_eq!(calls.get(), 4);
        assert_eq!(
            *sleeper.waits.borrow(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(log.len(), 1);
        assert!(log.entries()[0].message.starts_with("timeout #4"));
        assert_eq!(log.entries()[0].stage, "database");
    }

    #[test]
    fn test_success_after_transient_failure() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = executor(5, sleeper.clone());
        let mut log = ErrorLog::new();
        let calls = Cell::new(0);

        let result = retry.execute("database", "GaN", &mut log, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Lookup::Failed("HTTP 503".to_string())
            } else {
                Lookup::Found("structure")
            }
        });

        assert_eq!(result, Some("structure"));
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.waits.borrow().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_empty_results_retry_without_logging() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = executor(3, sleeper.clone());
        let mut log = ErrorLog::new();
        let calls = Cell::new(0);

        let result: Option<u8> = retry.execute("substitution", "MgInP2", &mut log, || {
            calls.set(calls.get() + 1);
            Lookup::Empty
        });

        assert!(result.is_none());
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.waits.borrow().len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = executor(0, sleeper.clone());
        let mut log = ErrorLog::new();
        let calls = Cell::new(0);

        let _: Option<()> = retry.execute("database", "Si", &mut log, || {
            calls.set(calls.get() + 1);
            Lookup::Failed("down".to_string())
        });

        assert_eq!(calls.get(), 1);
        assert!(sleeper.waits.borrow().is_empty());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base: 2.0,
            base_delay: Duration::from_millis(500),
            max_delay: DEFAULT_MAX_DELAY,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 25,
            backoff_base: 10.0,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(20));
        assert_eq!(policy.delay_for(2), Duration::from_secs(60));
        assert_eq!(policy.delay_for(24), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_long_schedule_never_overflows() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let retry = RetryExecutor::new(
            RetryPolicy {
                max_retries: 25,
                backoff_base: 10.0,
                base_delay: Duration::from_secs(2),
                ..RetryPolicy::default()
            },
            sleeper.clone(),
        );
        let mut log = ErrorLog::new();

        let result: Option<()> = retry.execute("database", "GaN", &mut log, || Lookup::Empty);

        assert!(result.is_none());
        let waits = sleeper.waits.borrow();
        assert_eq!(waits.len(), 24);
        assert!(waits.iter().all(|w| *w <= DEFAULT_MAX_DELAY));
        assert_eq!(waits[23], DEFAULT_MAX_DELAY);
        assert!(log.is_empty());
    }
}
