use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::output::OutputFormat;
use crate::utils::error::{Result, XuiError};

mod validator;
pub use validator::Validator;

/// 面板连接配置
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 面板主机名或 IP
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 面板的 URI 路径前缀 (webBasePath)
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default)]
    pub ssl: bool,
    /// 单次请求超时 (秒)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 上游代理, 例如 "socks5://127.0.0.1:1080"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// 命令行输出格式
    #[serde(default)]
    pub output: OutputFormat,
}

fn default_port() -> u16 {
    2053
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_timeout() -> u64 {
    5
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_path", &self.base_path)
            .field("ssl", &self.ssl)
            .field("timeout_secs", &self.timeout_secs)
            .field("proxy", &self.proxy)
            .field("username", &self.username)
            .field("password", &"***")
            .field("output", &self.output)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            base_path: default_base_path(),
            ssl: false,
            timeout_secs: default_timeout(),
            proxy: None,
            username: String::new(),
            password: String::new(),
            output: OutputFormat::default(),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// 从文件加载配置 (`.toml` 按 TOML 解析, 其余按 JSON)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let config: ClientConfig = if is_toml {
            toml::from_str(&content).map_err(|e| XuiError::Config(e.to_string()))?
        } else {
            serde_json::from_str(&content)?
        };
        debug!("配置已加载: {}", path.display());

        // 验证配置
        Validator::validate(&config)?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `http[s]://host:port/base/`, 末尾恰好一个斜杠
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let path = self.base_path.trim_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}/", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}/", scheme, self.host, self.port, path)
        }
    }
}
