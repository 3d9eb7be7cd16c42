use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// freedom (直连) 出站设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FreedomSettings {
    /// AsIs / UseIP / UseIPv4 / UseIPv6 ...
    #[serde(rename = "domainStrategy", skip_serializing_if = "Option::is_none", default)]
    pub domain_strategy: Option<String>,
    /// 强制发往的目标, 形如 "127.0.0.1:80"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fragment: Option<Value>,
    #[serde(rename = "proxyProtocol", skip_serializing_if = "Option::is_none", default)]
    pub proxy_protocol: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// dns 出站设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DnsOutboundSettings {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,
    #[serde(rename = "nonIPQuery", skip_serializing_if = "Option::is_none", default)]
    pub non_ip_query: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackholeResponse {
    /// "none" 或 "http"
    #[serde(rename = "type")]
    pub response_type: String,
}

/// blackhole (阻断) 出站设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlackholeSettings {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response: Option<BlackholeResponse>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlackholeSettings {
    /// 返回 HTTP 403 后关闭连接
    pub fn http() -> Self {
        Self {
            response: Some(BlackholeResponse {
                response_type: "http".to_string(),
            }),
            extra: Map::new(),
        }
    }
}
