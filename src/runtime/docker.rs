//! 容器运行时客户端
//!
//! 把 Docker Engine API 收窄为 ContainerRuntime trait（查、建、启、查镜像、拉镜像），
//! RuntimeManager 只依赖该 trait，测试用假实现即可覆盖。真实实现基于 bollard：
//! 默认连本机 socket，配置 host_addr 时连远程 daemon。

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::models::{
    ContainerCreateBody, ContainerStateStatusEnum, HostConfig, PortBinding, PortMap,
};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, CreateImageOptionsBuilder, InspectContainerOptions,
    StartContainerOptions,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use thiserror::Error;

/// 容器运行时调用错误；NotFound 单列，容器/镜像缺失走创建或拉取分支
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("container runtime api error: {0}")]
    Api(String),
}

/// 容器状态（只区分调度关心的两种，其余归 Other）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Exited,
    Other,
}

/// 一条已发布端口映射：容器端口 -> 宿主机端口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

/// 容器检查结果
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub status: ContainerStatus,
    pub ports: Vec<PortMapping>,
}

/// 容器创建参数：镜像、启动命令、工作目录、bind mount 与 1:1 发布端口
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub working_dir: String,
    pub binds: Vec<String>,
    pub ports: Vec<u16>,
}

/// 收窄后的容器运行时接口
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn inspect(&self, name: &str) -> Result<ContainerInfo, ContainerError>;
    async fn create(&self, spec: &ContainerSpec) -> Result<(), ContainerError>;
    async fn start(&self, name: &str) -> Result<(), ContainerError>;
    /// 镜像存在返回 Ok，缺失返回 NotFound
    async fn inspect_image(&self, image: &str) -> Result<(), ContainerError>;
    /// 拉取镜像直至完成；进度写入日志
    async fn pull_image(&self, image: &str) -> Result<(), ContainerError>;
}

/// bollard 实现
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// host_addr 为远程 daemon 地址（如 tcp://10.0.0.2:2375）；None 走本机默认
    pub fn connect(host_addr: Option<&str>) -> Result<Self, ContainerError> {
        let docker = match host_addr {
            Some(addr) => Docker::connect_with_http(addr, 120, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| ContainerError::Api(e.to_string()))?;
        Ok(Self { docker })
    }
}

fn map_bollard_error(what: &str, err: bollard::errors::Error) -> ContainerError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => ContainerError::NotFound(what.to_string()),
        other => ContainerError::Api(other.to_string()),
    }
}

fn map_status(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        _ => ContainerStatus::Other,
    }
}

/// 解析 bollard 的端口映射表（"30001/tcp" -> [{HostPort: "30001"}]）
fn map_ports(ports: Option<PortMap>) -> Vec<PortMapping> {
    let mut mappings = Vec::new();
    let Some(ports) = ports else {
        return mappings;
    };
    for (key, bindings) in ports {
        let Some(container_port) = key.split('/').next().and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };
        let host_port = bindings
            .iter()
            .flatten()
            .filter_map(|b| b.host_port.as_deref())
            .find_map(|p| p.parse::<u16>().ok());
        if let Some(host_port) = host_port {
            mappings.push(PortMapping {
                container_port,
                host_port,
            });
        }
    }
    mappings
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn inspect(&self, name: &str) -> Result<ContainerInfo, ContainerError> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_bollard_error(name, e))?;
        Ok(ContainerInfo {
            status: map_status(info.state.and_then(|s| s.status)),
            ports: map_ports(info.network_settings.and_then(|n| n.ports)),
        })
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<(), ContainerError> {
        let mut exposed: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut bindings: PortMap = HashMap::new();
        for port in &spec.ports {
            let key = format!("{}/tcp", port);
            exposed.insert(key.clone(), HashMap::new());
            bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(port.to_string()),
                }]),
            );
        }

        let config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            working_dir: Some(spec.working_dir.clone()),
            exposed_ports: Some(exposed),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                port_bindings: Some(bindings),
                auto_remove: Some(false),
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptionsBuilder::new().name(&spec.name).build()),
                config,
            )
            .await
            .map_err(|e| map_bollard_error(&spec.name, e))?;
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<(), ContainerError> {
        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .map_err(|e| map_bollard_error(name, e))
    }

    async fn inspect_image(&self, image: &str) -> Result<(), ContainerError> {
        self.docker
            .inspect_image(image)
            .await
            .map(|_| ())
            .map_err(|e| map_bollard_error(image, e))
    }

    async fn pull_image(&self, image: &str) -> Result<(), ContainerError> {
        let (from_image, tag) = match image.rsplit_once(':') {
            Some((img, tag)) => (img, tag),
            None => (image, "latest"),
        };
        let options = CreateImageOptionsBuilder::new()
            .from_image(from_image)
            .tag(tag)
            .build();

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| map_bollard_error(image, e))?;
            if let Some(error) = info.error {
                return Err(ContainerError::Api(format!("pull image: {}", error)));
            }
            if let Some(status) = info.status {
                tracing::debug!(
                    image = %image,
                    progress = info.progress.as_deref().unwrap_or(""),
                    "{}",
                    status
                );
            }
        }
        Ok(())
    }
}
