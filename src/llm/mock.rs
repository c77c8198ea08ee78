//! Mock 能力实现（用于测试，无需 API）
//!
//! MockThinking 按脚本依次吐出提案；MockReflection 按脚本给出评判，
//! 脚本耗尽后重复最后一项，便于本地跑通完整控制循环。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::act::ActionResult;
use crate::core::AgentError;
use crate::llm::{Reflection, ReflectionStatus, ReflectionVerdict, Thinking};

/// Mock 思考：依次返回预置的提案文本
pub struct MockThinking {
    proposals: Vec<String>,
    cursor: AtomicUsize,
}

impl MockThinking {
    pub fn new(proposals: Vec<String>) -> Self {
        Self {
            proposals,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 单提案便捷构造
    pub fn single(proposal: impl Into<String>) -> Self {
        Self::new(vec![proposal.into()])
    }
}

#[async_trait]
impl Thinking for MockThinking {
    async fn think(
        &self,
        _requirement: &str,
        _reflection: Option<&str>,
    ) -> Result<String, AgentError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = idx.min(self.proposals.len().saturating_sub(1));
        self.proposals
            .get(idx)
            .cloned()
            .ok_or_else(|| AgentError::ThinkingError("mock has no proposals".to_string()))
    }
}

/// Mock 反思：依次返回预置评判，耗尽后重复最后一项
pub struct MockReflection {
    verdicts: Vec<ReflectionVerdict>,
    cursor: AtomicUsize,
}

impl MockReflection {
    pub fn new(verdicts: Vec<ReflectionVerdict>) -> Self {
        Self {
            verdicts,
            cursor: AtomicUsize::new(0),
        }
    }

    /// 恒定成功
    pub fn always_success() -> Self {
        Self::new(vec![ReflectionVerdict::success()])
    }

    /// 恒定失败，携带固定意见
    pub fn always_failure(comments: impl Into<String>) -> Self {
        Self::new(vec![ReflectionVerdict::failure(comments)])
    }
}

#[async_trait]
impl Reflection for MockReflection {
    async fn reflect(
        &self,
        _requirement: &str,
        _result: &ActionResult,
        _conversation_id: &str,
    ) -> Result<ReflectionVerdict, AgentError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = idx.min(self.verdicts.len().saturating_sub(1));
        self.verdicts
            .get(idx)
            .cloned()
            .ok_or_else(|| AgentError::ReflectionError("mock has no verdicts".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::act::{ActionMeta, ActionResult};

    #[tokio::test]
    async fn test_mock_thinking_repeats_last() {
        let mock = MockThinking::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(mock.think("req", None).await.unwrap(), "a");
        assert_eq!(mock.think("req", None).await.unwrap(), "b");
        assert_eq!(mock.think("req", None).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn test_mock_reflection_script() {
        let mock = MockReflection::new(vec![
            ReflectionVerdict::failure("try again"),
            ReflectionVerdict::success(),
        ]);
        let result = ActionResult::success("u", "ok", ActionMeta::default());
        let first = mock.reflect("req", &result, "conv").await.unwrap();
        assert_eq!(first.status, ReflectionStatus::Failure);
        let second = mock.reflect("req", &result, "conv").await.unwrap();
        assert_eq!(second.status, ReflectionStatus::Success);
    }
}
