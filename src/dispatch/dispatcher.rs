//! 动作调度器
//!
//! 把已解析的动作路由到本地处理器或沙箱端点，并把所有出口归一为 ActionResult：
//! write_code / read_file 走本地，terminal_run / browser 经沙箱 HTTP，
//! 其余已注册类型走工具注册表，未注册类型返回 failure。
//! 路径类参数在执行前被重写到 Conversation_<会话前6位> 子目录下，多会话共用
//! 一个沙箱时以此隔离；结果落任务记忆并发出归一化进度消息。

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::act::{Action, ActionMeta, ActionResult, TaskContext};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::dispatch::sandbox::{BrowserHistory, SandboxClient};
use crate::extract::extract_answers_from_browser_history;
use crate::llm::LlmConfig;
use crate::progress::{send_progress, ProgressUpdate};
use crate::runtime::RuntimeManager;
use crate::tools::{ReadFileHandler, ToolRegistry, WriteCodeHandler};

/// 结果写入记忆时标记为 memorized 的动作类型（参与任务完成摘要）
const MEMORIZED_TYPES: &[&str] = &["read_file"];

/// 会话子目录名：会话标识前 6 位
fn session_dir(conversation_id: &str) -> String {
    let prefix: String = conversation_id.chars().take(6).collect();
    format!("Conversation_{}", prefix)
}

/// 路径类参数重写到会话子目录（每个动作只重写一次，重写后不再变化）
fn rewrite_session_paths(action: Action, conversation_id: &str) -> Action {
    let dir = session_dir(conversation_id);
    match action {
        Action::WriteCode { path, content } => Action::WriteCode {
            path: Path::new(&dir).join(path).to_string_lossy().into_owned(),
            content,
        },
        Action::ReadFile { path } => Action::ReadFile {
            path: Path::new(&dir).join(path).to_string_lossy().into_owned(),
        },
        Action::TerminalRun { command, cwd } => Action::TerminalRun {
            command,
            cwd: Some(match cwd {
                Some(cwd) => Path::new(&dir).join(cwd).to_string_lossy().into_owned(),
                None => format!("./{}", dir),
            }),
        },
        other => other,
    }
}

/// 动作调度器
pub struct ActionDispatcher {
    runtime: Arc<Mutex<RuntimeManager>>,
    sandbox: SandboxClient,
    write_code: WriteCodeHandler,
    read_file: ReadFileHandler,
    tools: ToolRegistry,
    llm: LlmConfig,
    action_timeout: Duration,
    browser_timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(cfg: &AppConfig, runtime: Arc<Mutex<RuntimeManager>>) -> Result<Self, AgentError> {
        let workspace = cfg.app.workspace_dir();
        Ok(Self {
            runtime,
            sandbox: SandboxClient::new(&cfg.proxy)?,
            write_code: WriteCodeHandler::new(&workspace),
            read_file: ReadFileHandler::new(&workspace),
            tools: ToolRegistry::new(),
            llm: LlmConfig {
                model_name: cfg.llm.model_name.clone(),
                api_url: cfg.llm.api_url.clone(),
                api_key: cfg.llm.api_key.clone(),
            },
            action_timeout: Duration::from_secs(cfg.action.timeout_secs),
            browser_timeout: Duration::from_secs(cfg.action.browser_timeout_secs),
        })
    }

    /// 注册额外的本地工具类型
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// 确保沙箱可寻址并取动作执行服务器端口（connect 幂等，错误直接上抛）
    async fn sandbox_port(&self) -> Result<u16, AgentError> {
        let mut runtime = self.runtime.lock().await;
        let ports = runtime.connect().await?;
        Ok(ports.host_port)
    }

    /// 执行一个动作并发出记忆/进度副作用
    ///
    /// 传输层失败归一为 failure 结果；路径逃逸与沙箱供给失败是硬错误，
    /// 由控制循环的顶层兜底折进重试预算。
    pub async fn execute(
        &self,
        action: Action,
        ctx: &mut TaskContext,
        task_id: &str,
    ) -> Result<ActionResult, AgentError> {
        let uuid = Uuid::new_v4().to_string();
        let start = Instant::now();

        send_progress(
            &ctx.progress_tx,
            ProgressUpdate::new(
                "running",
                action.describe(),
                action.type_name(),
                task_id,
                &uuid,
            ),
        );

        let action = rewrite_session_paths(action, &ctx.conversation_id);
        let action_type = action.type_name().to_string();

        let result = match &action {
            Action::WriteCode { path, content } => self.write_code.run(path, content, &uuid),
            Action::ReadFile { path } => self.read_file.run(path, &uuid)?,
            Action::TerminalRun { .. } => {
                let port = self.sandbox_port().await?;
                self.sandbox
                    .execute_action(port, action.to_wire(), &action_type, &uuid, self.action_timeout)
                    .await
            }
            Action::Browser { question, .. } => {
                let port = self.sandbox_port().await?;
                // 把默认模型凭据注入动作参数，沙箱内浏览器代理用它驱动 LLM
                let mut wire = action.to_wire();
                wire["params"]["llm_config"] = serde_json::json!(&self.llm);
                let mut result = self
                    .sandbox
                    .execute_action(port, wire, &action_type, &uuid, self.browser_timeout)
                    .await;
                if result.is_success() {
                    if let Some(json) = result.meta.json.clone() {
                        if let Ok(history) = serde_json::from_value::<BrowserHistory>(json) {
                            let enhanced = extract_answers_from_browser_history(
                                &history.browser_history,
                                question,
                            );
                            // 提取结果与原问题有实质差别时才覆盖正文
                            if enhanced.trim() != question.trim() {
                                result.content = enhanced;
                            }
                        }
                    }
                }
                result
            }
            Action::Finish { message } => ActionResult::success(
                &uuid,
                message.clone(),
                ActionMeta {
                    action_type: "finish".to_string(),
                    ..ActionMeta::default()
                },
            ),
            Action::Tool { name, params } => match self.tools.get(name) {
                Some(tool) => match tool.execute(params.clone()).await {
                    Ok(output) => ActionResult::success(
                        &uuid,
                        output.content,
                        ActionMeta {
                            action_type: name.clone(),
                            ..output.meta
                        },
                    ),
                    Err(e) => {
                        return Err(AgentError::ActionFailed(format!("{}: {}", name, e)));
                    }
                },
                None => ActionResult::failure(
                    &uuid,
                    format!("Unknown action type: {}", name),
                    ActionMeta {
                        action_type: name.clone(),
                        error: Some(format!("Unknown action type: {}", name)),
                        ..ActionMeta::default()
                    },
                ),
            },
        };

        let audit = serde_json::json!({
            "event": "action_audit",
            "action": action_type,
            "ok": result.is_success(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "uuid": uuid,
        });
        tracing::info!(audit = %audit.to_string(), "dispatch");

        self.handle_memory(&result, &action_type, ctx).await;

        send_progress(
            &ctx.progress_tx,
            ProgressUpdate::new(
                match result.status {
                    crate::act::ActionStatus::Success => "success",
                    crate::act::ActionStatus::Failure => "failure",
                },
                result.content.clone(),
                &action_type,
                task_id,
                &result.uuid,
            )
            .with_url(result.meta.url.clone())
            .with_json(result.meta.json.clone())
            .with_filepath(result.meta.filepath.clone()),
        );

        Ok(result)
    }

    /// 成功结果写入任务记忆；仅 MEMORIZED_TYPES 中的类型参与完成摘要
    async fn handle_memory(&self, result: &ActionResult, action_type: &str, ctx: &TaskContext) {
        if !result.is_success() {
            return;
        }
        let memorized = MEMORIZED_TYPES.contains(&action_type);
        ctx.memory
            .lock()
            .await
            .add_message("user", &result.content, Some(action_type), memorized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_dir_uses_first_six_chars() {
        assert_eq!(
            session_dir("abcdef-1234-5678"),
            "Conversation_abcdef"
        );
        assert_eq!(session_dir("ab"), "Conversation_ab");
    }

    #[test]
    fn test_rewrite_write_code_path() {
        let action = Action::WriteCode {
            path: "src/app.py".to_string(),
            content: "x".to_string(),
        };
        match rewrite_session_paths(action, "abcdef-99") {
            Action::WriteCode { path, .. } => {
                assert_eq!(path, "Conversation_abcdef/src/app.py");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rewrite_terminal_run_defaults_cwd() {
        let action = Action::TerminalRun {
            command: "ls".to_string(),
            cwd: None,
        };
        match rewrite_session_paths(action, "abcdef-99") {
            Action::TerminalRun { cwd, .. } => {
                assert_eq!(cwd.as_deref(), Some("./Conversation_abcdef"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rewrite_leaves_browser_untouched() {
        let action = Action::Browser {
            question: "q".to_string(),
            url: None,
            browser_code: None,
        };
        assert_eq!(
            rewrite_session_paths(action.clone(), "abcdef"),
            action
        );
    }
}
