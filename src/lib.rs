//! Drone - Rust 智能体执行沙箱
//!
//! 把自然语言任务驱动为一串离散动作（写文件 / 读文件 / 跑命令 / 驱动浏览器），
//! 在 Docker 沙箱内逐个执行，按双计数器重试预算决定继续、重试或终止。
//!
//! 模块划分：
//! - **act**: 动作模型、任务上下文与主控制循环（思考 -> 解析 -> 调度 -> 反思）
//! - **config**: 应用配置加载（TOML + 环境变量 DRONE__*）
//! - **core**: 错误类型与重试预算
//! - **dispatch**: 动作调度器与沙箱 HTTP 客户端
//! - **extract**: 浏览器轨迹内容提取
//! - **llm**: 思考 / 反思外部能力抽象与 Mock 实现
//! - **memory**: 按任务的追加式记忆日志
//! - **progress**: 归一化进度消息与通道
//! - **runtime**: 容器客户端抽象、端口分配与沙箱生命周期
//! - **tools**: 本地工具注册表与 write_code / read_file 处理器

pub mod act;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod extract;
pub mod llm;
pub mod memory;
pub mod progress;
pub mod runtime;
pub mod tools;

pub use act::{ActSession, Task, TaskContext, TaskOutcome};
