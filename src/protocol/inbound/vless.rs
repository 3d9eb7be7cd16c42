use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Client, ClientOptions, ClientRoster};
use crate::utils::crypto::random_uuid;

/// VLESS 入站设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlessSettings {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default = "default_decryption")]
    pub decryption: String,
    #[serde(default)]
    pub fallbacks: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for VlessSettings {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            decryption: default_decryption(),
            fallbacks: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn default_decryption() -> String {
    "none".to_string()
}

client_roster!(VlessSettings, client => client.id.as_deref());

impl ClientRoster for VlessSettings {
    fn build_client(&self, options: ClientOptions) -> Client {
        let mut client = options.into_client();
        client.id.get_or_insert_with(random_uuid);
        client.flow.get_or_insert_with(String::new);
        client
    }
}
