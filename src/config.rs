//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DRONE__*` 覆盖（双下划线表示嵌套，
//! 如 `DRONE__DOCKER__HOST_ADDR=tcp://10.0.0.2:2375`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub docker: DockerSection,
    #[serde(default)]
    pub proxy: ProxySection,
    #[serde(default)]
    pub action: ActionSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// [app] 段：应用名与宿主机工作目录（bind mount 到沙箱 /workspace）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 宿主机工作目录，未设置时用 ./workspace
    pub workspace_dir: Option<PathBuf>,
}

impl AppSection {
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("workspace"))
    }
}

/// [docker] 段：daemon 地址、镜像与容器名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DockerSection {
    /// 远程 daemon 地址（如 tcp://10.0.0.2:2375）；未设置时走本机默认 socket
    pub host_addr: Option<String>,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            host_addr: None,
            image: default_image(),
            container_name: default_container_name(),
        }
    }
}

fn default_image() -> String {
    "beehive/drone-runtime-sandbox:latest".to_string()
}

fn default_container_name() -> String {
    "drone-runtime-sandbox".to_string()
}

/// [proxy] 段：出站代理；host 为空或 disabled 时直连
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySection {
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub disabled: bool,
    /// 建连超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            protocol: default_proxy_protocol(),
            host: None,
            port: None,
            disabled: false,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl ProxySection {
    /// 组装代理 URL；未配置 host 或显式禁用时返回 None
    pub fn proxy_url(&self) -> Option<String> {
        if self.disabled {
            return None;
        }
        let host = self.host.as_deref()?;
        if host.is_empty() {
            return None;
        }
        match self.port {
            Some(port) => Some(format!("{}://{}:{}", self.protocol, host, port)),
            None => Some(format!("{}://{}", self.protocol, host)),
        }
    }
}

/// [action] 段：单步动作的沙箱调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActionSection {
    #[serde(default = "default_action_timeout_secs")]
    pub timeout_secs: u64,
    /// 浏览器自动化更慢，单独的更长超时
    #[serde(default = "default_browser_timeout_secs")]
    pub browser_timeout_secs: u64,
}

impl Default for ActionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_action_timeout_secs(),
            browser_timeout_secs: default_browser_timeout_secs(),
        }
    }
}

fn default_action_timeout_secs() -> u64 {
    30
}

fn default_browser_timeout_secs() -> u64 {
    90
}

/// [retry] 段：连续 / 累计重试上限与固定重试延迟
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_total_retries")]
    pub max_total_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_total_retries: default_max_total_retries(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_total_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// [llm] 段：默认模型凭据，浏览器动作转发前注入其参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            api_url: default_api_url(),
            api_key: String::new(),
        }
    }
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            docker: DockerSection::default(),
            proxy: ProxySection::default(),
            action: ActionSection::default(),
            retry: RetrySection::default(),
            llm: LlmSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 DRONE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DRONE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DRONE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
