//! 沙箱 HTTP 客户端
//!
//! POST /execute_action 把动作转发到容器内的动作执行服务器。客户端进程启动时
//! 按代理配置构造一次并注入各处，不做隐式全局单例。超时与连接失败不抛错，
//! 归一为 failure 结果参与正常的反思/重试循环；已发出的调用其沙箱侧副作用
//! 可能仍会落地，不回滚。

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::act::{ActionMeta, ActionResult};
use crate::config::ProxySection;
use crate::core::AgentError;
use crate::extract::BrowserTraceEntry;

/// 浏览器自动化服务器的轨迹载荷（result.meta.json 的形状）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserHistory {
    #[serde(default)]
    pub browser_history: Vec<BrowserTraceEntry>,
    #[serde(default)]
    pub browser_history_screenshot: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ExecuteActionResponse {
    data: ActionResult,
}

/// 代理感知的沙箱客户端
pub struct SandboxClient {
    client: reqwest::Client,
}

impl SandboxClient {
    /// 从代理配置构造；host 未配置或显式禁用时直连
    pub fn new(proxy: &ProxySection) -> Result<Self, AgentError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(proxy.connect_timeout_secs));
        if let Some(url) = proxy.proxy_url() {
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| AgentError::ConfigError(format!("invalid proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::ConfigError(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    /// 转发动作到沙箱执行服务器；任何传输层失败（超时/连接/非 2xx/坏响应体）
    /// 都折算成 failure 结果
    pub async fn execute_action(
        &self,
        host_port: u16,
        action_wire: Value,
        action_type: &str,
        uuid: &str,
        timeout: Duration,
    ) -> ActionResult {
        let url = format!("http://localhost:{}/execute_action", host_port);
        let body = json!({ "action": action_wire, "uuid": uuid });

        tracing::debug!(url = %url, action = %action_type, uuid = %uuid, "sending action to sandbox");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(r) => r,
            Err(e) => return transport_failure(uuid, action_type, &e.to_string()),
        };

        match response.json::<ExecuteActionResponse>().await {
            Ok(wrapper) => {
                let mut result = wrapper.data;
                if result.uuid.is_empty() {
                    result.uuid = uuid.to_string();
                }
                result
            }
            Err(e) => transport_failure(uuid, action_type, &e.to_string()),
        }
    }
}

fn transport_failure(uuid: &str, action_type: &str, error: &str) -> ActionResult {
    tracing::warn!(action = %action_type, uuid = %uuid, error = %error, "sandbox action failed");
    ActionResult::failure(
        uuid,
        format!("Sandbox action failed: {}", error),
        ActionMeta {
            action_type: action_type.to_string(),
            error: Some(error.to_string()),
            ..ActionMeta::default()
        },
    )
}
