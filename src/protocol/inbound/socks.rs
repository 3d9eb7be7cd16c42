use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Account, AccountRoster};

/// SOCKS 入站设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocksSettings {
    /// "password" 或 "noauth"
    #[serde(default = "default_auth")]
    pub auth: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub udp: bool,
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SocksSettings {
    fn default() -> Self {
        Self {
            auth: default_auth(),
            accounts: Vec::new(),
            udp: false,
            ip: default_ip(),
            extra: Map::new(),
        }
    }
}

impl SocksSettings {
    pub fn requires_password(&self) -> bool {
        self.auth == "password"
    }
}

fn default_auth() -> String {
    "password".to_string()
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

account_roster!(SocksSettings, accounts);

impl AccountRoster for SocksSettings {}
