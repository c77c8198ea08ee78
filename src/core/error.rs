//! Agent 错误类型
//!
//! 与 RetryPolicy 配合：循环单次迭代内的任何错误都折算进同一套重试预算，
//! 仅终止时的 reason 文本不同。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（解析、调度、容器、路径逃逸等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Action execution failed: {0}")]
    ActionFailed(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Thinking error: {0}")]
    ThinkingError(String),

    #[error("Reflection error: {0}")]
    ReflectionError(String),

    /// 镜像拉取 / 容器创建启动失败，不在内部重试，直接上抛
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Container runtime error: {0}")]
    ContainerRuntime(String),

    /// 解析后的路径逃出允许的工作目录
    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
