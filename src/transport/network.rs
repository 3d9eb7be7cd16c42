//! 各传输方式的设置块
//!
//! 字段名与面板 / Xray 的 JSON 键一致, 默认值取自面板新建入站时的取值。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::crypto::random_string;
use crate::utils::serde_helpers::is_false;

/// 伪装头 (`header: { type, request?, response? }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderObject {
    #[serde(rename = "type", default = "default_header_type")]
    pub header_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub response: Option<Value>,
}

impl Default for HeaderObject {
    fn default() -> Self {
        Self {
            header_type: default_header_type(),
            request: None,
            response: None,
        }
    }
}

impl HeaderObject {
    pub fn of(header_type: impl Into<String>) -> Self {
        Self {
            header_type: header_type.into(),
            ..Self::default()
        }
    }
}

fn default_header_type() -> String {
    "none".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

/// `tcpSettings`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TcpSettings {
    #[serde(rename = "acceptProxyProtocol", default)]
    pub accept_proxy_protocol: bool,
    #[serde(default)]
    pub header: HeaderObject,
}

impl TcpSettings {
    /// HTTP 伪装; 请求与响应都给出时才写入
    pub fn http_obfuscation(request: Value, response: Value) -> Self {
        Self {
            accept_proxy_protocol: false,
            header: HeaderObject {
                header_type: "http".to_string(),
                request: Some(request),
                response: Some(response),
            },
        }
    }
}

/// `kcpSettings` (mKCP)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcpSettings {
    #[serde(default = "default_mtu")]
    pub mtu: u32,
    #[serde(default = "default_tti")]
    pub tti: u32,
    #[serde(rename = "uplinkCapacity", default = "default_uplink")]
    pub uplink_capacity: u32,
    #[serde(rename = "downlinkCapacity", default = "default_downlink")]
    pub downlink_capacity: u32,
    #[serde(default)]
    pub congestion: bool,
    #[serde(rename = "readBufferSize", default = "default_read_buffer")]
    pub read_buffer_size: u32,
    #[serde(rename = "writeBufferSize", default = "default_write_buffer")]
    pub write_buffer_size: u32,
    #[serde(default)]
    pub header: HeaderObject,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub seed: Option<String>,
}

impl Default for KcpSettings {
    fn default() -> Self {
        Self {
            mtu: default_mtu(),
            tti: default_tti(),
            uplink_capacity: default_uplink(),
            downlink_capacity: default_downlink(),
            congestion: false,
            read_buffer_size: default_read_buffer(),
            write_buffer_size: default_write_buffer(),
            header: HeaderObject::default(),
            seed: None,
        }
    }
}

fn default_mtu() -> u32 {
    1350
}
fn default_tti() -> u32 {
    50
}
fn default_uplink() -> u32 {
    5
}
fn default_downlink() -> u32 {
    20
}
fn default_read_buffer() -> u32 {
    2
}
fn default_write_buffer() -> u32 {
    5
}

/// `wsSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsSettings {
    #[serde(rename = "acceptProxyProtocol", default)]
    pub accept_proxy_protocol: bool,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub headers: Map<String, Value>,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self::new("/")
    }
}

impl WsSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            accept_proxy_protocol: false,
            path: path.into(),
            host: None,
            headers: Map::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }
}

/// `httpSettings` (HTTP/2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default)]
    pub host: Vec<String>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub read_idle_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub health_check_timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub headers: Option<Value>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: Vec::new(),
            path: default_path(),
            method: Some("PUT".to_string()),
            read_idle_timeout: None,
            health_check_timeout: Some(15),
            headers: None,
        }
    }
}

/// `quicSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuicSettings {
    #[serde(default = "default_header_type")]
    pub security: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub header: HeaderObject,
}

impl Default for QuicSettings {
    /// 未指定密钥时随机生成 12 位
    fn default() -> Self {
        Self {
            security: "none".to_string(),
            key: random_string(12),
            header: HeaderObject::default(),
        }
    }
}

/// `dsSettings` (Unix domain socket)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainSocketSettings {
    pub path: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub padding: bool,
}

impl DomainSocketSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// `grpcSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrpcSettings {
    #[serde(rename = "serviceName", default)]
    pub service_name: String,
    #[serde(rename = "multiMode", default)]
    pub multi_mode: bool,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u32,
    #[serde(default = "default_grpc_health_timeout")]
    pub health_check_timeout: u32,
    #[serde(default)]
    pub permit_without_stream: bool,
    #[serde(default)]
    pub initial_windows_size: u32,
}

impl Default for GrpcSettings {
    /// 未指定 serviceName 时随机生成 12 位
    fn default() -> Self {
        Self::new(random_string(12))
    }
}

impl GrpcSettings {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            multi_mode: false,
            idle_timeout: default_idle_timeout(),
            health_check_timeout: default_grpc_health_timeout(),
            permit_without_stream: false,
            initial_windows_size: 0,
        }
    }
}

fn default_idle_timeout() -> u32 {
    60
}
fn default_grpc_health_timeout() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ws_wire_shape() {
        let ws = WsSettings::new("/ray").with_header("Host", "cdn.example.com");
        let v = serde_json::to_value(&ws).unwrap();
        assert_eq!(
            v,
            json!({
                "acceptProxyProtocol": false,
                "path": "/ray",
                "headers": {"Host": "cdn.example.com"}
            })
        );
    }

    #[test]
    fn test_grpc_defaults() {
        let grpc: GrpcSettings = serde_json::from_value(json!({"serviceName": "svc"})).unwrap();
        assert_eq!(grpc.service_name, "svc");
        assert_eq!(grpc.idle_timeout, 60);
        assert_eq!(grpc.health_check_timeout, 20);
        assert_eq!(GrpcSettings::default().service_name.len(), 12);
    }

    #[test]
    fn test_kcp_defaults_from_empty_block() {
        let kcp: KcpSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(kcp, KcpSettings::default());
        assert_eq!(kcp.header.header_type, "none");
    }

    #[test]
    fn test_domain_socket_abstract_key() {
        let ds: DomainSocketSettings =
            serde_json::from_value(json!({"path": "/run/xray.sock", "abstract": true})).unwrap();
        assert!(ds.is_abstract);
        let v = serde_json::to_value(&ds).unwrap();
        assert_eq!(v, json!({"path": "/run/xray.sock", "abstract": true}));
    }
}
