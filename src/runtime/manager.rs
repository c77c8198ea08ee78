//! 沙箱运行时管理
//!
//! 保证进程内恰好存在一个可寻址的沙箱容器：存在性检查、创建、启动、端口发现与
//! 镜像准备。端口总是从活容器的已发布映射反推，绝不为既有容器重新分配，因此
//! connect 可重复调用且结果一致。容器运行时的任何错误不在内部重试，直接上抛。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::runtime::docker::{
    ContainerError, ContainerRuntime, ContainerSpec, ContainerStatus, PortMapping,
};
use crate::runtime::ports::{
    find_available_port, APP_PORT_RANGE_1, APP_PORT_RANGE_2, EXECUTION_SERVER_PORT_RANGE,
    VSCODE_PORT_RANGE,
};

/// 沙箱内动作执行服务器的启动脚本
const ACTION_SERVER_CMD: &str = "sandbox/action_execution_server.js";
/// 容器内工作目录
const SANDBOX_WORKDIR: &str = "/sandbox/code";
/// 宿主机工作目录在容器内的挂载点
const WORKSPACE_MOUNT: &str = "/workspace";

/// 沙箱的四个已发布端口，按区间归类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerPorts {
    /// 动作执行服务器
    pub host_port: u16,
    /// 容器内 IDE
    pub vscode_port: u16,
    pub app_port_1: u16,
    pub app_port_2: u16,
}

/// 按四个互斥区间把已发布映射归类为 ContainerPorts；缺一即为容器形态异常
fn classify_ports(mappings: &[PortMapping]) -> Result<ContainerPorts, AgentError> {
    let mut host_port = None;
    let mut vscode_port = None;
    let mut app_port_1 = None;
    let mut app_port_2 = None;
    for m in mappings {
        match m.container_port {
            p if p >= EXECUTION_SERVER_PORT_RANGE.0 && p <= EXECUTION_SERVER_PORT_RANGE.1 => {
                host_port = Some(m.host_port)
            }
            p if p >= VSCODE_PORT_RANGE.0 && p <= VSCODE_PORT_RANGE.1 => {
                vscode_port = Some(m.host_port)
            }
            p if p >= APP_PORT_RANGE_1.0 && p <= APP_PORT_RANGE_1.1 => {
                app_port_1 = Some(m.host_port)
            }
            p if p >= APP_PORT_RANGE_2.0 && p <= APP_PORT_RANGE_2.1 => {
                app_port_2 = Some(m.host_port)
            }
            _ => {}
        }
    }
    match (host_port, vscode_port, app_port_1, app_port_2) {
        (Some(host_port), Some(vscode_port), Some(app_port_1), Some(app_port_2)) => {
            Ok(ContainerPorts {
                host_port,
                vscode_port,
                app_port_1,
                app_port_2,
            })
        }
        _ => Err(AgentError::Provisioning(
            "sandbox container is missing published port mappings".to_string(),
        )),
    }
}

/// 沙箱运行时管理器：一个命名容器的生命周期与端口
pub struct RuntimeManager {
    runtime: Arc<dyn ContainerRuntime>,
    container_name: String,
    image: String,
    workspace_dir: PathBuf,
    ports: Option<ContainerPorts>,
}

impl RuntimeManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, cfg: &AppConfig) -> Self {
        Self {
            runtime,
            container_name: cfg.docker.container_name.clone(),
            image: cfg.docker.image.clone(),
            workspace_dir: cfg.app.workspace_dir(),
            ports: None,
        }
    }

    /// 最近一次 connect 得到的端口
    pub fn ports(&self) -> Option<ContainerPorts> {
        self.ports
    }

    /// 操作容器前必须先 connect：
    /// 容器不存在则创建并启动；已退出则启动；运行中则直接使用。
    /// 最后从活容器的已发布映射归类出四个端口（幂等，不会二次创建/启动）。
    pub async fn connect(&mut self) -> Result<ContainerPorts, AgentError> {
        match self.runtime.inspect(&self.container_name).await {
            Ok(info) => match info.status {
                ContainerStatus::Exited => {
                    tracing::info!(container = %self.container_name, "container exited, starting");
                    self.runtime
                        .start(&self.container_name)
                        .await
                        .map_err(|e| AgentError::ContainerRuntime(e.to_string()))?;
                }
                ContainerStatus::Running => {
                    tracing::debug!(container = %self.container_name, "container is running");
                }
                ContainerStatus::Other => {}
            },
            Err(ContainerError::NotFound(_)) => {
                self.init().await?;
            }
            Err(e) => return Err(AgentError::ContainerRuntime(e.to_string())),
        }

        let info = self
            .runtime
            .inspect(&self.container_name)
            .await
            .map_err(|e| AgentError::ContainerRuntime(e.to_string()))?;
        let ports = classify_ports(&info.ports)?;
        self.ports = Some(ports);
        Ok(ports)
    }

    /// 初始化容器：分配四个端口、准备镜像、创建并启动
    async fn init(&mut self) -> Result<(), AgentError> {
        tracing::info!(container = %self.container_name, image = %self.image, "initializing sandbox container");

        let host_port = find_available_port(EXECUTION_SERVER_PORT_RANGE).await?;
        let vscode_port = find_available_port(VSCODE_PORT_RANGE).await?;
        let app_port_1 = find_available_port(APP_PORT_RANGE_1).await?;
        let app_port_2 = find_available_port(APP_PORT_RANGE_2).await?;

        self.ensure_image_exists().await?;

        let spec = ContainerSpec {
            name: self.container_name.clone(),
            image: self.image.clone(),
            cmd: vec![
                "node".to_string(),
                ACTION_SERVER_CMD.to_string(),
                "--port".to_string(),
                host_port.to_string(),
                "--vscode_port".to_string(),
                vscode_port.to_string(),
            ],
            working_dir: SANDBOX_WORKDIR.to_string(),
            binds: vec![format!(
                "{}:{}:rw",
                self.workspace_dir.display(),
                WORKSPACE_MOUNT
            )],
            ports: vec![host_port, vscode_port, app_port_1, app_port_2],
        };

        self.runtime
            .create(&spec)
            .await
            .map_err(|e| AgentError::Provisioning(format!("create container: {}", e)))?;
        self.runtime
            .start(&self.container_name)
            .await
            .map_err(|e| AgentError::Provisioning(format!("start container: {}", e)))?;
        Ok(())
    }

    /// 镜像准备：已存在即为空操作；缺失则拉取到完成；其他检查错误直接上抛
    async fn ensure_image_exists(&self) -> Result<(), AgentError> {
        match self.runtime.inspect_image(&self.image).await {
            Ok(()) => {
                tracing::info!(image = %self.image, "image already exists");
                Ok(())
            }
            Err(ContainerError::NotFound(_)) => {
                tracing::info!(image = %self.image, "image not found locally, pulling from registry");
                self.runtime
                    .pull_image(&self.image)
                    .await
                    .map_err(|e| AgentError::Provisioning(format!("pull image: {}", e)))?;
                tracing::info!(image = %self.image, "image pulled successfully");
                Ok(())
            }
            Err(e) => Err(AgentError::ContainerRuntime(format!(
                "inspect image: {}",
                e
            ))),
        }
    }
}
