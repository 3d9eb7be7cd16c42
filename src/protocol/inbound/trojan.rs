use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Client, ClientOptions, ClientRoster};
use crate::utils::crypto::random_string;

/// Trojan 入站设置 (客户端以密码定位)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrojanSettings {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub fallbacks: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

client_roster!(TrojanSettings, client => client.password.as_deref());

impl ClientRoster for TrojanSettings {
    fn build_client(&self, options: ClientOptions) -> Client {
        let mut client = options.into_client();
        client.password.get_or_insert_with(|| random_string(12));
        client
    }
}
