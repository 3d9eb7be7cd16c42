use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Account, AccountRoster};

/// HTTP 代理入站设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HttpInboundSettings {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(rename = "allowTransparent", default)]
    pub allow_transparent: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

account_roster!(HttpInboundSettings, accounts);

impl AccountRoster for HttpInboundSettings {}
