//! 沙箱运行时：容器客户端抽象、端口分配与生命周期管理

pub mod docker;
pub mod manager;
pub mod ports;

pub use docker::{
    ContainerError, ContainerInfo, ContainerRuntime, ContainerSpec, ContainerStatus, DockerClient,
    PortMapping,
};
pub use manager::{ContainerPorts, RuntimeManager};
pub use ports::{
    find_available_port, APP_PORT_RANGE_1, APP_PORT_RANGE_2, EXECUTION_SERVER_PORT_RANGE,
    VSCODE_PORT_RANGE,
};
