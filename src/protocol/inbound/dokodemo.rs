use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 任意门 (dokodemo-door) 入站设置: 转发到固定目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DokodemoSettings {
    pub address: String,
    pub port: u16,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(rename = "followRedirect", default)]
    pub follow_redirect: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DokodemoSettings {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            network: default_network(),
            follow_redirect: false,
            extra: Map::new(),
        }
    }
}

fn default_network() -> String {
    "tcp,udp".to_string()
}
