use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Account, AccountRoster};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrojanServer {
    pub address: String,
    pub port: u16,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Trojan 出站设置 (`{ "servers": [...] }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrojanOutboundSettings {
    #[serde(default)]
    pub servers: Vec<TrojanServer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrojanOutboundSettings {
    pub fn new(address: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            servers: vec![TrojanServer {
                address: address.into(),
                port,
                password: password.into(),
                email: None,
                level: None,
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksServer {
    pub address: String,
    pub port: u16,
    pub method: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub uot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Shadowsocks 出站设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksOutboundSettings {
    #[serde(default)]
    pub servers: Vec<ShadowsocksServer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShadowsocksOutboundSettings {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        method: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            servers: vec![ShadowsocksServer {
                address: address.into(),
                port,
                method: method.into(),
                password: password.into(),
                uot: None,
                email: None,
                level: None,
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }
}

/// SOCKS / HTTP 上游服务器, 用户以 `user` 定位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyServer {
    pub address: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<Account>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

account_roster!(ProxyServer, users);

impl AccountRoster for ProxyServer {}

/// SOCKS / HTTP 出站设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyServers {
    #[serde(default)]
    pub servers: Vec<ProxyServer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProxyServers {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            servers: vec![ProxyServer {
                address: address.into(),
                port,
                users: Vec::new(),
                extra: Map::new(),
            }],
            extra: Map::new(),
        }
    }

    pub fn server(&self) -> Option<&ProxyServer> {
        self.servers.first()
    }

    pub fn server_mut(&mut self) -> Option<&mut ProxyServer> {
        self.servers.first_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_server_accounts() {
        let mut settings = ProxyServers::new("10.0.0.2", 1080);
        let server = settings.server_mut().unwrap();
        server.add_account(Some("u1".into()), Some("p1".into()));
        assert!(server.has_account("u1"));

        let v = serde_json::to_value(&settings).unwrap();
        assert_eq!(v["servers"][0]["users"][0]["pass"], "p1");

        let mut bare = ProxyServers::new("10.0.0.3", 1080);
        let v = serde_json::to_value(&bare).unwrap();
        assert!(v["servers"][0].get("users").is_none());
        assert!(!bare.server_mut().unwrap().remove_account("u1"));
    }
}
