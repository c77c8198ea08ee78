//! 外部能力抽象：思考与反思
//!
//! 控制循环不关心 prompt 模板与具体后端；Thinking 给出下一步动作的文本提案，
//! Reflection 评判动作结果是否满足需求。两者都可能挂起任意长时间。

use async_trait::async_trait;
use serde::Serialize;

use crate::act::ActionResult;
use crate::core::AgentError;

/// 默认模型凭据；浏览器动作转发沙箱前注入其参数
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub model_name: String,
    pub api_url: String,
    pub api_key: String,
}

/// 思考能力：根据需求与上一轮反思意见给出文本提案
#[async_trait]
pub trait Thinking: Send + Sync {
    /// reflection 为上一轮失败时反思给出的修正意见（若有）
    async fn think(
        &self,
        requirement: &str,
        reflection: Option<&str>,
    ) -> Result<String, AgentError>;
}

/// 反思评判状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionStatus {
    Success,
    Failure,
}

/// 反思评判结果：状态 + 修正意见
#[derive(Debug, Clone)]
pub struct ReflectionVerdict {
    pub status: ReflectionStatus,
    pub comments: String,
}

impl ReflectionVerdict {
    pub fn success() -> Self {
        Self {
            status: ReflectionStatus::Success,
            comments: String::new(),
        }
    }

    pub fn failure(comments: impl Into<String>) -> Self {
        Self {
            status: ReflectionStatus::Failure,
            comments: comments.into(),
        }
    }
}

/// 反思能力：评判一次动作结果是否满足任务需求
#[async_trait]
pub trait Reflection: Send + Sync {
    async fn reflect(
        &self,
        requirement: &str,
        result: &ActionResult,
        conversation_id: &str,
    ) -> Result<ReflectionVerdict, AgentError>;
}
