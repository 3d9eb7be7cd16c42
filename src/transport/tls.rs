use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::crypto::{generate_x25519_keypair, random_short_id};
use crate::utils::serde_helpers::is_false;

/// TLS 证书: 文件路径或内联 PEM 行
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(rename = "certificateFile", skip_serializing_if = "Option::is_none", default)]
    pub certificate_file: Option<String>,
    #[serde(rename = "keyFile", skip_serializing_if = "Option::is_none", default)]
    pub key_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub certificate: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Certificate {
    pub fn from_files(certificate_file: impl Into<String>, key_file: impl Into<String>) -> Self {
        Self {
            certificate_file: Some(certificate_file.into()),
            key_file: Some(key_file.into()),
            ..Self::default()
        }
    }
}

/// `tlsSettings`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsSettings {
    #[serde(rename = "serverName", default)]
    pub server_name: String,
    #[serde(rename = "rejectUnknownSni", default)]
    pub reject_unknown_sni: bool,
    #[serde(rename = "allowInsecure", default, skip_serializing_if = "is_false")]
    pub allow_insecure: bool,
    #[serde(default)]
    pub alpn: Vec<String>,
    #[serde(rename = "minVersion", default = "default_min_version")]
    pub min_version: String,
    #[serde(rename = "maxVersion", default = "default_max_version")]
    pub max_version: String,
    #[serde(rename = "cipherSuites", default)]
    pub cipher_suites: String,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(rename = "disableSystemRoot", default, skip_serializing_if = "is_false")]
    pub disable_system_root: bool,
    #[serde(rename = "enableSessionResumption", default, skip_serializing_if = "is_false")]
    pub enable_session_resumption: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub fingerprint: String,
    /// 面板附加的客户端提示 (`allowInsecure` / `fingerprint`)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub settings: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self::new("")
    }
}

impl TlsSettings {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            reject_unknown_sni: false,
            allow_insecure: false,
            alpn: vec!["h2".to_string(), "http/1.1".to_string()],
            min_version: default_min_version(),
            max_version: default_max_version(),
            cipher_suites: String::new(),
            certificates: Vec::new(),
            disable_system_root: false,
            enable_session_resumption: false,
            fingerprint: String::new(),
            settings: None,
            extra: Map::new(),
        }
    }

    pub fn with_certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }
}

fn default_min_version() -> String {
    "1.2".to_string()
}

fn default_max_version() -> String {
    "1.3".to_string()
}

/// REALITY 入站附带的客户端参数 (`realitySettings.settings`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealityClientSettings {
    #[serde(rename = "publicKey", default)]
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(rename = "serverName", default)]
    pub server_name: String,
    #[serde(rename = "spiderX", default)]
    pub spider_x: String,
}

/// `realitySettings`
///
/// 入站使用 `dest` / `serverNames` / `privateKey` / `shortIds`,
/// 出站使用 `serverName` / `publicKey` / `shortId`; 空字段不输出。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealitySettings {
    #[serde(default, skip_serializing_if = "is_false")]
    pub show: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub xver: u8,
    /// 回落目标, 例如 "www.microsoft.com:443"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest: String,
    /// 允许的 SNI 列表
    #[serde(rename = "serverNames", default, skip_serializing_if = "Vec::is_empty")]
    pub server_names: Vec<String>,
    /// X25519 私钥 (Base64)
    #[serde(rename = "privateKey", default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,
    #[serde(rename = "minClientVer", default, skip_serializing_if = "String::is_empty")]
    pub min_client_ver: String,
    #[serde(rename = "maxClientVer", default, skip_serializing_if = "String::is_empty")]
    pub max_client_ver: String,
    #[serde(rename = "maxTimeDiff", default, skip_serializing_if = "is_zero_u64")]
    pub max_time_diff: u64,
    /// 允许的 Short ID 列表
    #[serde(rename = "shortIds", default, skip_serializing_if = "Vec::is_empty")]
    pub short_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub settings: Option<RealityClientSettings>,

    #[serde(rename = "serverName", default, skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(rename = "publicKey", default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    #[serde(rename = "shortId", default, skip_serializing_if = "String::is_empty")]
    pub short_id: String,
    #[serde(rename = "spiderX", default, skip_serializing_if = "String::is_empty")]
    pub spider_x: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_zero(v: &u8) -> bool {
    *v == 0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

impl RealitySettings {
    /// 入站 REALITY: 使用给定密钥对
    pub fn server(
        dest: impl Into<String>,
        server_names: Vec<String>,
        private_key: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            dest: dest.into(),
            server_names,
            private_key: private_key.into(),
            short_ids: vec![random_short_id(8)],
            settings: Some(RealityClientSettings {
                public_key: public_key.into(),
                fingerprint: "chrome".to_string(),
                server_name: String::new(),
                spider_x: "/".to_string(),
            }),
            ..Self::default()
        }
    }

    /// 入站 REALITY: 本地生成密钥对
    pub fn generate() -> Self {
        let keypair = generate_x25519_keypair();
        Self::server(
            "yahoo.com:443",
            vec!["yahoo.com".to_string(), "www.yahoo.com".to_string()],
            keypair.private_key,
            keypair.public_key,
        )
    }

    /// 出站 REALITY
    pub fn client(
        server_name: impl Into<String>,
        public_key: impl Into<String>,
        short_id: impl Into<String>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            fingerprint: "chrome".to_string(),
            public_key: public_key.into(),
            short_id: short_id.into(),
            ..Self::default()
        }
    }

    pub fn is_server_side(&self) -> bool {
        !self.private_key.is_empty()
    }
}
