//! 任务与终止结果
//!
//! Task 是控制循环的只读输入；TaskOutcome 是每个任务恰好一个的终止结果；
//! TaskContext 承载一次执行的可变上下文（会话、记忆、进度通道、反思反馈）。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::memory::LocalMemory;
use crate::progress::ProgressSender;

/// 待执行任务：需求文本与声明的工具列表（首个为主工具）
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub requirement: String,
    pub tools: Vec<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, requirement: impl Into<String>, tools: Vec<String>) -> Self {
        Self {
            id: id.into(),
            requirement: requirement.into(),
            tools,
        }
    }

    /// 任务声明的主工具：执行的动作类型与其一致且成功时，任务提前完成
    pub fn primary_tool(&self) -> Option<&str> {
        self.tools.first().map(String::as_str)
    }
}

/// 任务终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure,
}

/// 任务终止结果：成功携带最终内容与记忆摘要，失败携带上限说明
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub content: String,
    pub comments: String,
    pub memorized: String,
}

impl TaskOutcome {
    pub fn success(content: impl Into<String>, memorized: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Success,
            content: content.into(),
            comments: "Task Success !".to_string(),
            memorized: memorized.into(),
        }
    }

    pub fn failure(comments: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failure,
            content: String::new(),
            comments: comments.into(),
            memorized: String::new(),
        }
    }
}

/// 一次任务执行的可变上下文
pub struct TaskContext {
    /// 会话标识；前 6 位决定会话子目录 Conversation_<id6>
    pub conversation_id: String,
    pub memory: Arc<Mutex<LocalMemory>>,
    /// 进度消息通道；None 时所有进度静默丢弃
    pub progress_tx: Option<ProgressSender>,
    /// 上一轮失败时反思给出的修正意见，注入下一次思考
    pub reflection: Option<String>,
    /// 任务产出的文件路径（meta.filepath 累积）
    pub generated_files: Vec<String>,
}

impl TaskContext {
    pub fn new(conversation_id: impl Into<String>, memory: Arc<Mutex<LocalMemory>>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            memory,
            progress_tx: None,
            reflection: None,
            generated_files: Vec::new(),
        }
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.progress_tx = Some(tx);
        self
    }
}
