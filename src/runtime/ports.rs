//! 端口分配：四个互不相交的固定区间
//!
//! 执行服务器 / IDE / 两个应用端口各占一个区间，通过本机可绑定性扫描取第一个
//! 空闲端口；区间互斥保证四个端口两两不同。

use crate::core::AgentError;

/// 沙箱动作执行服务器端口区间
pub const EXECUTION_SERVER_PORT_RANGE: (u16, u16) = (30000, 39999);
/// 沙箱内 IDE 端口区间
pub const VSCODE_PORT_RANGE: (u16, u16) = (40000, 49999);
/// 应用预留端口区间 1
pub const APP_PORT_RANGE_1: (u16, u16) = (50000, 54999);
/// 应用预留端口区间 2
pub const APP_PORT_RANGE_2: (u16, u16) = (55000, 59999);

/// 在区间内扫描第一个可本机绑定的 TCP 端口
pub async fn find_available_port(range: (u16, u16)) -> Result<u16, AgentError> {
    for port in range.0..=range.1 {
        if tokio::net::TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
            return Ok(port);
        }
    }
    Err(AgentError::Provisioning(format!(
        "no free tcp port in range {}-{}",
        range.0, range.1
    )))
}
