//! 动作模型与解析
//!
//! 思考输出 -> resolve_actions 提取 JSON（```json 围栏或裸 JSON，对象或数组）->
//! 按 type 字段映射为带类型的 Action 变体；未知类型落入 Tool 变体由注册表处理。
//! 线上格式保持 {"type": ..., "params": {...}}，经 to_wire 还原。

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::AgentError;

/// 一个待执行的动作；路径类字段由调度器重写到会话子目录后不再变化
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    WriteCode {
        path: String,
        content: String,
    },
    TerminalRun {
        command: String,
        cwd: Option<String>,
    },
    ReadFile {
        path: String,
    },
    Browser {
        question: String,
        url: Option<String>,
        browser_code: Option<String>,
    },
    /// 任务完成信号，由 ActionLoop 拦截，不进入调度器
    Finish {
        message: String,
    },
    /// 其他已注册的本地工具类型
    Tool {
        name: String,
        params: Value,
    },
}

impl Action {
    /// 动作类型名（线上格式与进度消息中的 action_type）
    pub fn type_name(&self) -> &str {
        match self {
            Action::WriteCode { .. } => "write_code",
            Action::TerminalRun { .. } => "terminal_run",
            Action::ReadFile { .. } => "read_file",
            Action::Browser { .. } => "browser",
            Action::Finish { .. } => "finish",
            Action::Tool { name, .. } => name,
        }
    }

    /// 运行前进度消息里的动作描述
    pub fn describe(&self) -> String {
        match self {
            Action::WriteCode { path, .. } => format!("Writing file {}", path),
            Action::TerminalRun { command, .. } => format!("Running command: {}", command),
            Action::ReadFile { path } => format!("Reading file {}", path),
            Action::Browser { question, .. } => format!("Browsing: {}", question),
            Action::Finish { .. } => "Finishing task".to_string(),
            Action::Tool { name, .. } => format!("Invoking tool {}", name),
        }
    }

    /// 还原为线上格式 {"type": ..., "params": {...}}
    pub fn to_wire(&self) -> Value {
        match self {
            Action::WriteCode { path, content } => json!({
                "type": "write_code",
                "params": { "path": path, "content": content },
            }),
            Action::TerminalRun { command, cwd } => json!({
                "type": "terminal_run",
                "params": { "command": command, "cwd": cwd },
            }),
            Action::ReadFile { path } => json!({
                "type": "read_file",
                "params": { "path": path },
            }),
            Action::Browser {
                question,
                url,
                browser_code,
            } => json!({
                "type": "browser",
                "params": {
                    "question": question,
                    "url": url,
                    "browser_code": browser_code,
                },
            }),
            Action::Finish { message } => json!({
                "type": "finish",
                "params": { "message": message },
            }),
            Action::Tool { name, params } => json!({
                "type": name,
                "params": params,
            }),
        }
    }
}

fn param_str(params: &Value, key: &str) -> Option<String> {
    params.get(key).and_then(|v| v.as_str()).map(String::from)
}

/// 从单个 JSON 对象构造 Action；缺 type 字段时返回 None
fn action_from_value(value: &Value) -> Option<Action> {
    let type_name = value.get("type")?.as_str()?;
    let params = value.get("params").cloned().unwrap_or_else(|| json!({}));

    let action = match type_name {
        "write_code" => Action::WriteCode {
            path: param_str(&params, "path").unwrap_or_default(),
            content: param_str(&params, "content").unwrap_or_default(),
        },
        "terminal_run" => Action::TerminalRun {
            command: param_str(&params, "command").unwrap_or_default(),
            cwd: param_str(&params, "cwd"),
        },
        "read_file" => Action::ReadFile {
            path: param_str(&params, "path").unwrap_or_default(),
        },
        "browser" => Action::Browser {
            question: param_str(&params, "question").unwrap_or_default(),
            url: param_str(&params, "url"),
            browser_code: param_str(&params, "browser_code"),
        },
        "finish" => Action::Finish {
            message: param_str(&params, "message").unwrap_or_default(),
        },
        other => Action::Tool {
            name: other.to_string(),
            params,
        },
    };
    Some(action)
}

/// 解析思考输出：提取 JSON 块并映射为零或多个 Action
///
/// 找不到 JSON 块时返回空 Vec（交给重试预算）；JSON 存在但格式非法时返回 JsonParseError。
pub fn resolve_actions(proposal: &str) -> Result<Vec<Action>, AgentError> {
    let trimmed = proposal.trim();

    // 尝试提取 JSON 块（```json ... ``` 或裸 JSON 对象/数组，以先出现者为准）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else {
        let obj = trimmed.find('{');
        let arr = trimmed.find('[');
        let slice = match (obj, arr) {
            (Some(o), Some(a)) if a < o => trimmed.rfind(']').map(|end| (a, end)),
            (Some(o), _) => trimmed.rfind('}').map(|end| (o, end)),
            (None, Some(a)) => trimmed.rfind(']').map(|end| (a, end)),
            (None, None) => return Ok(Vec::new()),
        };
        match slice {
            Some((start, end)) if end > start => &trimmed[start..=end],
            _ => return Ok(Vec::new()),
        }
    };

    if json_str.is_empty() {
        return Ok(Vec::new());
    }

    let parsed: Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    let actions = match &parsed {
        Value::Array(items) => items.iter().filter_map(action_from_value).collect(),
        Value::Object(_) => action_from_value(&parsed).into_iter().collect(),
        _ => Vec::new(),
    };
    Ok(actions)
}

/// 动作执行状态；控制循环只依据它分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failure,
}

/// 动作结果元数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionMeta {
    #[serde(default)]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 统一的动作结果：本地处理器、沙箱调用与传输失败都归一到此形状
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meta: ActionMeta,
    #[serde(default)]
    pub uuid: String,
}

impl ActionResult {
    pub fn success(uuid: &str, content: impl Into<String>, meta: ActionMeta) -> Self {
        Self {
            status: ActionStatus::Success,
            content: content.into(),
            meta,
            uuid: uuid.to_string(),
        }
    }

    pub fn failure(uuid: &str, content: impl Into<String>, meta: ActionMeta) -> Self {
        Self {
            status: ActionStatus::Failure,
            content: content.into(),
            meta,
            uuid: uuid.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fenced_single_action() {
        let proposal = r#"I will write the file now.
```json
{"type": "write_code", "params": {"path": "src/main.py", "content": "print(1)"}}
```"#;
        let actions = resolve_actions(proposal).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0],
            Action::WriteCode {
                path: "src/main.py".to_string(),
                content: "print(1)".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_action_array_takes_all() {
        let proposal = r#"[
            {"type": "terminal_run", "params": {"command": "ls -la"}},
            {"type": "finish", "params": {"message": "done"}}
        ]"#;
        let actions = resolve_actions(proposal).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].type_name(), "terminal_run");
        assert_eq!(actions[1].type_name(), "finish");
    }

    #[test]
    fn test_resolve_unknown_type_falls_to_tool() {
        let proposal = r#"{"type": "web_search", "params": {"query": "rust"}}"#;
        let actions = resolve_actions(proposal).unwrap();
        match &actions[0] {
            Action::Tool { name, params } => {
                assert_eq!(name, "web_search");
                assert_eq!(params["query"], "rust");
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_plain_text_yields_nothing() {
        assert!(resolve_actions("I am still thinking about it.").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_malformed_json_is_error() {
        let err = resolve_actions(r#"{"type": "finish", "params": }"#).unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }

    #[test]
    fn test_wire_round_trip() {
        let action = Action::TerminalRun {
            command: "python main.py".to_string(),
            cwd: Some("./Conversation_abc123".to_string()),
        };
        let wire = action.to_wire();
        assert_eq!(wire["type"], "terminal_run");
        assert_eq!(wire["params"]["command"], "python main.py");
        let back = action_from_value(&wire).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_result_wire_shape() {
        let raw = r#"{"status": "failure", "content": "boom", "meta": {"action_type": "terminal_run", "error": "exit 1"}, "uuid": "u-1"}"#;
        let result: ActionResult = serde_json::from_str(raw).unwrap();
        assert!(!result.is_success());
        assert_eq!(result.meta.error.as_deref(), Some("exit 1"));
    }
}
