//! 动作循环集成测试
//!
//! 用 Mock 思考/反思与假容器运行时跑完整控制循环：
//! 本地动作不应触达沙箱，重试预算的两个上限在循环层面可观察。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use drone::act::{ActSession, Task, TaskContext, TaskStatus};
use drone::config::AppConfig;
use drone::core::RetryPolicy;
use drone::dispatch::ActionDispatcher;
use drone::llm::{MockReflection, MockThinking, Reflection, Thinking};
use drone::memory::LocalMemory;
use drone::runtime::{
    ContainerError, ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeManager,
};

/// 假容器运行时：本地动作的测试里任何触达都是错误
struct IdleRuntime;

#[async_trait]
impl ContainerRuntime for IdleRuntime {
    async fn inspect(&self, _name: &str) -> Result<ContainerInfo, ContainerError> {
        Err(ContainerError::Api("sandbox must not be touched".to_string()))
    }

    async fn create(&self, _spec: &ContainerSpec) -> Result<(), ContainerError> {
        Err(ContainerError::Api("sandbox must not be touched".to_string()))
    }

    async fn start(&self, _name: &str) -> Result<(), ContainerError> {
        Err(ContainerError::Api("sandbox must not be touched".to_string()))
    }

    async fn inspect_image(&self, _image: &str) -> Result<(), ContainerError> {
        Err(ContainerError::Api("sandbox must not be touched".to_string()))
    }

    async fn pull_image(&self, _image: &str) -> Result<(), ContainerError> {
        Err(ContainerError::Api("sandbox must not be touched".to_string()))
    }
}

fn build_session(
    cfg: &AppConfig,
    thinking: Arc<dyn Thinking>,
    reflection: Arc<dyn Reflection>,
    policy: RetryPolicy,
) -> ActSession {
    let runtime = Arc::new(Mutex::new(RuntimeManager::new(Arc::new(IdleRuntime), cfg)));
    let dispatcher = ActionDispatcher::new(cfg, runtime).unwrap();
    ActSession::new(thinking, reflection, dispatcher, policy)
}

fn context_for(conversation_id: &str, task_id: &str) -> TaskContext {
    let memory = Arc::new(Mutex::new(LocalMemory::new(task_id)));
    TaskContext::new(conversation_id, memory)
}

#[tokio::test]
async fn test_write_code_task_finishes_in_one_iteration() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_dir = Some(workspace.path().to_path_buf());

    let proposal = r#"```json
{"type": "write_code", "params": {"path": "hello.py", "content": "print('hi')"}}
```"#;
    let session = build_session(
        &cfg,
        Arc::new(MockThinking::single(proposal)),
        Arc::new(MockReflection::always_success()),
        RetryPolicy::new(3, 10, 0),
    );

    // 主工具即 write_code：一次迭代内完成
    let task = Task::new("t1", "Create hello.py", vec!["write_code".to_string()]);
    let mut ctx = context_for("abcdef-conversation", &task.id);
    let outcome = session.run_task(&task, &mut ctx).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.comments, "Task Success !");
    assert!(outcome.content.contains("Wrote file"));

    // 路径被重写到会话子目录
    let written = workspace
        .path()
        .join("Conversation_abcdef")
        .join("hello.py");
    assert_eq!(std::fs::read_to_string(&written).unwrap(), "print('hi')");
    assert_eq!(ctx.generated_files.len(), 1);
}

#[tokio::test]
async fn test_finish_action_terminates_immediately() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_dir = Some(workspace.path().to_path_buf());

    let proposal = r#"{"type": "finish", "params": {"message": "all done"}}"#;
    let session = build_session(
        &cfg,
        Arc::new(MockThinking::single(proposal)),
        Arc::new(MockReflection::always_success()),
        RetryPolicy::new(3, 10, 0),
    );

    let task = Task::new("t2", "Trivial", vec![]);
    let mut ctx = context_for("conv-finish", &task.id);
    let outcome = session.run_task(&task, &mut ctx).await;

    assert_eq!(outcome.status, TaskStatus::Success);
    assert_eq!(outcome.content, "all done");
}

#[tokio::test]
async fn test_reflected_failures_hit_consecutive_ceiling() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_dir = Some(workspace.path().to_path_buf());

    let proposal = r#"{"type": "write_code", "params": {"path": "a.txt", "content": "x"}}"#;
    let session = build_session(
        &cfg,
        Arc::new(MockThinking::single(proposal)),
        Arc::new(MockReflection::always_failure("wrong content")),
        RetryPolicy::new(2, 10, 0),
    );

    let task = Task::new("t3", "Never satisfied", vec![]);
    let mut ctx = context_for("conv-fail", &task.id);
    let outcome = session.run_task(&task, &mut ctx).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    // 终止消息点名连续上限并附上反思意见
    assert!(outcome.comments.contains("(2)"));
    assert!(outcome.comments.contains("wrong content"));

    // 反思意见作为反馈注入了上下文与记忆
    assert_eq!(ctx.reflection.as_deref(), Some("wrong content"));
    assert!(ctx
        .memory
        .lock()
        .await
        .entries()
        .iter()
        .any(|e| e.content == "wrong content"));
}

#[tokio::test]
async fn test_unparseable_proposals_hit_ceiling() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_dir = Some(workspace.path().to_path_buf());

    let session = build_session(
        &cfg,
        Arc::new(MockThinking::single("I am not sure what to do next.")),
        Arc::new(MockReflection::always_success()),
        RetryPolicy::new(3, 10, 0),
    );

    let task = Task::new("t4", "Confusing", vec![]);
    let mut ctx = context_for("conv-parse", &task.id);
    let outcome = session.run_task(&task, &mut ctx).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert!(outcome.comments.contains("(3)"));
}

#[tokio::test]
async fn test_total_ceiling_across_reset_streaks() {
    let workspace = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.app.workspace_dir = Some(workspace.path().to_path_buf());

    // 失败-成功交替：连续计数不断清零，但累计计数一路走到总上限。
    // 任务无主工具，成功迭代只会回到思考继续循环；
    // 第 5 次失败时累计已达 4，未有任何连续 streak 触到 3。
    let mut verdicts = Vec::new();
    for _ in 0..4 {
        verdicts.push(drone::llm::ReflectionVerdict::failure("flaky step"));
        verdicts.push(drone::llm::ReflectionVerdict::success());
    }
    verdicts.push(drone::llm::ReflectionVerdict::failure("flaky step"));
    let proposal = r#"{"type": "write_code", "params": {"path": "a.txt", "content": "x"}}"#;
    let session = build_session(
        &cfg,
        Arc::new(MockThinking::single(proposal)),
        Arc::new(drone::llm::MockReflection::new(verdicts)),
        RetryPolicy::new(3, 4, 0),
    );

    let task = Task::new("t5", "Flaky", vec![]);
    let mut ctx = context_for("conv-total", &task.id);
    let outcome = session.run_task(&task, &mut ctx).await;

    assert_eq!(outcome.status, TaskStatus::Failure);
    assert!(outcome.comments.contains("最大总重试次数(4)"));
}
