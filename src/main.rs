//! Drone - Rust 智能体执行沙箱
//!
//! 入口：初始化日志、加载配置、连接容器运行时并对命令行给出的需求跑一次
//! 动作循环。思考/反思能力是外部接口，二进制内用 Mock 实现做本地干跑，
//! 接入真实后端时替换两处 Arc 即可。

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use drone::act::{ActSession, Task, TaskContext};
use drone::config::load_config;
use drone::core::RetryPolicy;
use drone::dispatch::ActionDispatcher;
use drone::llm::{MockReflection, MockThinking};
use drone::memory::LocalMemory;
use drone::runtime::{DockerClient, RuntimeManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("Failed to load config")?;

    // 确保宿主机工作目录存在（bind mount 到沙箱 /workspace）
    let workspace = cfg.app.workspace_dir();
    std::fs::create_dir_all(&workspace).context("Failed to create workspace dir")?;

    let requirement = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let requirement = if requirement.is_empty() {
        "Say hello".to_string()
    } else {
        requirement
    };

    let docker = DockerClient::connect(cfg.docker.host_addr.as_deref())
        .context("Failed to connect container runtime")?;
    let runtime = Arc::new(Mutex::new(RuntimeManager::new(Arc::new(docker), &cfg)));
    let dispatcher =
        ActionDispatcher::new(&cfg, runtime).context("Failed to build dispatcher")?;

    // 干跑：Mock 思考直接给出 finish 动作；接入真实思考/反思后端时替换这两行
    let proposal = serde_json::json!({
        "type": "finish",
        "params": { "message": format!("Echo from Mock: {}", requirement) },
    })
    .to_string();
    let thinking = Arc::new(MockThinking::single(proposal));
    let reflection = Arc::new(MockReflection::always_success());

    let policy = RetryPolicy::new(
        cfg.retry.max_retries,
        cfg.retry.max_total_retries,
        cfg.retry.delay_ms,
    );
    let session = ActSession::new(thinking, reflection, dispatcher, policy);

    let task = Task::new("1", requirement, vec![]);
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let memory = Arc::new(Mutex::new(
        LocalMemory::new(task.id.clone()).with_persistence(&workspace),
    ));
    let mut ctx = TaskContext::new(conversation_id, memory);

    let outcome = session.run_task(&task, &mut ctx).await;
    tracing::info!(
        status = ?outcome.status,
        comments = %outcome.comments,
        "task finished: {}",
        outcome.content
    );

    Ok(())
}
