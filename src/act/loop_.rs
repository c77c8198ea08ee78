//! 动作执行主循环
//!
//! 思考 -> 解析 -> 校验 -> 调度 -> 反思 -> 继续 / 重试 / 终止。
//! 解析不出动作、反思判失败与迭代内任何错误都折进同一套双计数器重试预算，
//! 只有终止消息的 reason 文本不同；反思成功则连续计数清零。
//! 每个任务恰好返回一个终止结果。

use std::sync::Arc;

use tokio::time::sleep;

use crate::act::{resolve_actions, Action, Task, TaskContext, TaskOutcome};
use crate::core::{AgentError, RetryDecision, RetryPolicy, RetryState};
use crate::dispatch::ActionDispatcher;
use crate::llm::{Reflection, ReflectionStatus, Thinking};
use crate::progress::{send_progress, ProgressUpdate};

/// 单次迭代的出口
enum Iteration {
    /// 终止（finish 动作或主工具完成）
    Finish(TaskOutcome),
    /// 反思成功但任务未完，回到思考
    Continue,
    /// 提案里解析不出动作
    NoAction,
    /// 反思判失败，携带关联 uuid 与修正意见
    ReflectedFailure {
        uuid: String,
        action_type: String,
        comments: String,
    },
}

/// 动作循环会话：外部能力 + 调度器 + 重试策略
pub struct ActSession {
    thinking: Arc<dyn Thinking>,
    reflection: Arc<dyn Reflection>,
    dispatcher: ActionDispatcher,
    policy: RetryPolicy,
}

impl ActSession {
    pub fn new(
        thinking: Arc<dyn Thinking>,
        reflection: Arc<dyn Reflection>,
        dispatcher: ActionDispatcher,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            thinking,
            reflection,
            dispatcher,
            policy,
        }
    }

    /// 执行任务直到完成或预算耗尽；每个任务恰好一个终止结果
    pub async fn run_task(&self, task: &Task, ctx: &mut TaskContext) -> TaskOutcome {
        let mut state = RetryState::default();

        loop {
            match self.iteration(task, ctx, &mut state).await {
                Ok(Iteration::Finish(outcome)) => return outcome,
                Ok(Iteration::Continue) => {}
                Ok(Iteration::NoAction) => {
                    match self.policy.decide(&state, None) {
                        RetryDecision::Terminate(outcome) => return outcome,
                        RetryDecision::Continue => {
                            sleep(self.policy.delay()).await;
                            state.bump();
                            self.log_retry(&state);
                        }
                    }
                }
                Ok(Iteration::ReflectedFailure {
                    uuid,
                    action_type,
                    comments,
                }) => {
                    // 当前动作的失败进度（尽力而为，无 uuid 时跳过）
                    if !uuid.is_empty() {
                        send_progress(
                            &ctx.progress_tx,
                            ProgressUpdate::new(
                                "failure",
                                format!("Action failed: {}", comments),
                                &action_type,
                                &task.id,
                                &uuid,
                            ),
                        );
                    }
                    match self.policy.decide(&state, Some(&comments)) {
                        RetryDecision::Terminate(outcome) => return outcome,
                        RetryDecision::Continue => {
                            state.bump();
                            // 反思意见注入下一轮思考，并落任务记忆
                            ctx.reflection = Some(comments.clone());
                            ctx.memory
                                .lock()
                                .await
                                .add_message("user", &comments, None, false);
                            sleep(self.policy.delay()).await;
                            self.log_retry(&state);
                        }
                    }
                }
                Err(e) => {
                    // 迭代内任何未处理错误：折进同一套预算，错误文本作 reason
                    tracing::error!(error = %e, task = %task.id, "task iteration error");
                    match self.policy.decide(&state, Some(&e.to_string())) {
                        RetryDecision::Terminate(outcome) => return outcome,
                        RetryDecision::Continue => {
                            state.bump();
                            sleep(self.policy.delay()).await;
                            self.log_retry(&state);
                        }
                    }
                }
            }
        }
    }

    fn log_retry(&self, state: &RetryState) {
        tracing::info!(
            "Retrying ({}/{}). Total attempts: {}/{}",
            state.retry_count,
            self.policy.max_retries,
            state.total_retry_attempts,
            self.policy.max_total_retries
        );
    }

    /// 一次完整迭代：思考、解析、校验、调度、反思
    async fn iteration(
        &self,
        task: &Task,
        ctx: &mut TaskContext,
        state: &mut RetryState,
    ) -> Result<Iteration, AgentError> {
        // 1. 思考
        let proposal = self
            .thinking
            .think(&task.requirement, ctx.reflection.as_deref())
            .await?;
        tracing::debug!(task = %task.id, proposal_len = proposal.len(), "thinking done");

        // 2. 解析，取第一个动作
        let actions = resolve_actions(&proposal)?;
        let Some(action) = actions.into_iter().next() else {
            return Ok(Iteration::NoAction);
        };
        tracing::debug!(task = %task.id, action = %action.type_name(), "action resolved");

        // 3. finish 信号直接终止，不进调度器
        if let Action::Finish { message } = &action {
            return Ok(Iteration::Finish(self.finish(message, ctx, &task.id).await));
        }

        // 4. 调度执行
        let action_type = action.type_name().to_string();
        let result = self.dispatcher.execute(action, ctx, &task.id).await?;
        if let Some(filepath) = &result.meta.filepath {
            ctx.generated_files.push(filepath.clone());
        }

        // 5. 反思评判
        let verdict = self
            .reflection
            .reflect(&task.requirement, &result, &ctx.conversation_id)
            .await?;

        match verdict.status {
            ReflectionStatus::Success => {
                state.reset_consecutive();
                // 执行的动作就是任务声明的主工具且调度本身成功：任务完成
                if task.primary_tool() == Some(action_type.as_str()) && result.is_success() {
                    return Ok(Iteration::Finish(
                        self.finish(&result.content, ctx, &task.id).await,
                    ));
                }
                Ok(Iteration::Continue)
            }
            ReflectionStatus::Failure => Ok(Iteration::ReflectedFailure {
                uuid: result.uuid.clone(),
                action_type,
                comments: verdict.comments,
            }),
        }
    }

    /// 终止成功路径：取记忆摘要、发最终进度、组装终止结果
    async fn finish(&self, message: &str, ctx: &TaskContext, task_id: &str) -> TaskOutcome {
        let memorized = ctx.memory.lock().await.memorized_content();
        let outcome = TaskOutcome::success(message, memorized.clone());
        send_progress(
            &ctx.progress_tx,
            ProgressUpdate::new("success", message, "finish", task_id, "")
                .with_comments(outcome.comments.clone())
                .with_memorized(memorized),
        );
        outcome
    }
}
