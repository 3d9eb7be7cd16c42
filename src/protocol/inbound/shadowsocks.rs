use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Client, ClientOptions, ClientRoster};
use crate::utils::crypto::random_string;

pub const AES_128_GCM: &str = "aes-128-gcm";
pub const AES_256_GCM: &str = "aes-256-gcm";
pub const CHACHA20_POLY1305: &str = "chacha20-poly1305";
pub const XCHACHA20_POLY1305: &str = "xchacha20-poly1305";
pub const BLAKE3_AES_128_GCM: &str = "2022-blake3-aes-128-gcm";
pub const BLAKE3_AES_256_GCM: &str = "2022-blake3-aes-256-gcm";
pub const BLAKE3_CHACHA20_POLY1305: &str = "2022-blake3-chacha20-poly1305";

/// 按加密方式生成密码
///
/// 2022 系列要求 Base64 编码的定长密钥 (16 / 32 字节), 其余方式为 12 位随机串。
pub fn generate_password(method: &str) -> String {
    let key_len = match method {
        BLAKE3_AES_128_GCM => 16,
        BLAKE3_AES_256_GCM | BLAKE3_CHACHA20_POLY1305 => 32,
        _ => return random_string(12),
    };
    let mut key = vec![0u8; key_len];
    rand::thread_rng().fill_bytes(&mut key);
    general_purpose::STANDARD.encode(key)
}

/// Shadowsocks 入站设置 (客户端以 email 定位)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ShadowsocksSettings {
    fn default() -> Self {
        Self::new(AES_128_GCM)
    }
}

impl ShadowsocksSettings {
    pub fn new(method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            password: generate_password(&method),
            method,
            network: default_network(),
            clients: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn default_method() -> String {
    AES_128_GCM.to_string()
}

fn default_network() -> String {
    "tcp,udp".to_string()
}

client_roster!(ShadowsocksSettings, client => Some(client.email.as_str()));

impl ClientRoster for ShadowsocksSettings {
    fn build_client(&self, options: ClientOptions) -> Client {
        let mut client = options.into_client();
        let method = client.method.get_or_insert_with(|| self.method.clone()).clone();
        client
            .password
            .get_or_insert_with(|| generate_password(&method));
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2022_password_lengths() {
        let key = general_purpose::STANDARD
            .decode(generate_password(BLAKE3_AES_128_GCM))
            .unwrap();
        assert_eq!(key.len(), 16);
        let key = general_purpose::STANDARD
            .decode(generate_password(BLAKE3_CHACHA20_POLY1305))
            .unwrap();
        assert_eq!(key.len(), 32);
        assert_eq!(generate_password(AES_256_GCM).len(), 12);
    }

    #[test]
    fn test_client_inherits_method() {
        let mut settings = ShadowsocksSettings::new(BLAKE3_AES_256_GCM);
        let email = settings.add_client(ClientOptions::new().email("dave"));
        assert_eq!(email, "dave");
        let client = settings.get_client("dave").unwrap();
        assert_eq!(client.method.as_deref(), Some(BLAKE3_AES_256_GCM));
        assert_eq!(client.password.as_ref().unwrap().len(), 44);
    }
}
