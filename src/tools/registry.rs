//! 本地工具注册表
//!
//! write_code / terminal_run / read_file / browser 之外的动作类型走这里：
//! 实现 Tool trait（name / description / execute）按名注册，调度器按动作类型查找，
//! 输出归一为 content + meta。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::act::ActionMeta;

/// 本地工具输出：正文与可选元数据
#[derive(Debug, Default)]
pub struct ToolOutput {
    pub content: String,
    pub meta: ActionMeta,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            meta: ActionMeta::default(),
        }
    }
}

/// 工具 trait：名称、描述、异步执行（args 为动作 params 的 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（即动作的 type 字段）
    fn name(&self) -> &str;

    /// 工具描述（供思考能力理解功能）
    fn description(&self) -> &str;

    async fn execute(&self, args: Value) -> Result<ToolOutput, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}
