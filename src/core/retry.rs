//! 重试预算：连续失败 + 累计重试双计数器
//!
//! 连续计数在反思成功时清零，累计计数单调递增；两者各有上限，先查连续再查累计。
//! 决策本身是纯函数，计数的自增与重试延迟由调用方（ActionLoop）负责。

use std::time::Duration;

use crate::act::TaskOutcome;

/// 一次任务执行内的重试计数；显式传入传出，不藏在闭包里
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// 连续失败次数，反思成功时清零
    pub retry_count: u32,
    /// 累计重试次数，任务生命周期内只增不减
    pub total_retry_attempts: u32,
}

impl RetryState {
    /// 一次失败后的计数自增（两个计数器同步 +1）
    pub fn bump(&mut self) {
        self.retry_count += 1;
        self.total_retry_attempts += 1;
    }

    /// 反思成功：连续计数清零，累计计数保持
    pub fn reset_consecutive(&mut self) {
        self.retry_count = 0;
    }
}

/// 重试决策结果
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// 还在预算内，调用方自增计数并延迟后重试
    Continue,
    /// 预算耗尽，携带终止结果
    Terminate(TaskOutcome),
}

/// 重试策略：两个上限与固定重试延迟
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub max_total_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_total_retries: 10,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, max_total_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            max_total_retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// 两次重试之间的固定延迟
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 先查连续失败上限，再查累计上限；reason 存在时附加到终止消息尾部
    pub fn decide(&self, state: &RetryState, reason: Option<&str>) -> RetryDecision {
        if state.retry_count >= self.max_retries {
            let comments = match reason {
                Some(r) => format!("连续异常达到最大次数({}): {}", self.max_retries, r),
                None => format!("连续执行失败达到最大次数({})", self.max_retries),
            };
            return RetryDecision::Terminate(TaskOutcome::failure(comments));
        }
        if state.total_retry_attempts >= self.max_total_retries {
            let comments = match reason {
                Some(r) => format!("达到最大总重试次数({}): {}", self.max_total_retries, r),
                None => format!("达到最大总重试次数({})", self.max_total_retries),
            };
            return RetryDecision::Terminate(TaskOutcome::failure(comments));
        }
        RetryDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::act::TaskStatus;

    #[test]
    fn test_consecutive_ceiling_named_in_message() {
        let policy = RetryPolicy::new(3, 10, 0);
        let state = RetryState {
            retry_count: 3,
            total_retry_attempts: 3,
        };
        match policy.decide(&state, None) {
            RetryDecision::Terminate(outcome) => {
                assert_eq!(outcome.status, TaskStatus::Failure);
                assert!(outcome.comments.contains("(3)"));
                assert!(outcome.comments.contains("连续"));
            }
            RetryDecision::Continue => panic!("expected terminate"),
        }
    }

    #[test]
    fn test_total_ceiling_even_without_streak() {
        // 连续计数从未到 3，但累计达到 10
        let policy = RetryPolicy::new(3, 10, 0);
        let state = RetryState {
            retry_count: 1,
            total_retry_attempts: 10,
        };
        match policy.decide(&state, None) {
            RetryDecision::Terminate(outcome) => {
                assert!(outcome.comments.contains("最大总重试次数(10)"));
            }
            RetryDecision::Continue => panic!("expected terminate"),
        }
    }

    #[test]
    fn test_reason_appended() {
        let policy = RetryPolicy::new(2, 10, 0);
        let state = RetryState {
            retry_count: 2,
            total_retry_attempts: 5,
        };
        match policy.decide(&state, Some("connection refused")) {
            RetryDecision::Terminate(outcome) => {
                assert!(outcome.comments.ends_with("connection refused"));
            }
            RetryDecision::Continue => panic!("expected terminate"),
        }
    }

    #[test]
    fn test_consecutive_checked_before_total() {
        // 两个上限同时越界时，报连续失败上限
        let policy = RetryPolicy::new(3, 3, 0);
        let state = RetryState {
            retry_count: 3,
            total_retry_attempts: 3,
        };
        match policy.decide(&state, None) {
            RetryDecision::Terminate(outcome) => {
                assert!(outcome.comments.contains("连续"));
            }
            RetryDecision::Continue => panic!("expected terminate"),
        }
    }

    #[test]
    fn test_under_budget_continues() {
        let policy = RetryPolicy::default();
        let state = RetryState {
            retry_count: 1,
            total_retry_attempts: 4,
        };
        assert!(matches!(
            policy.decide(&state, None),
            RetryDecision::Continue
        ));
    }

    #[test]
    fn test_bump_and_reset_invariant() {
        let mut state = RetryState::default();
        state.bump();
        state.bump();
        assert_eq!(state.retry_count, 2);
        state.reset_consecutive();
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.total_retry_attempts, 2);
        assert!(state.total_retry_attempts >= state.retry_count);
    }
}
