use base64::{engine::general_purpose, Engine as _};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

/// X25519 密钥对 (Xray 格式: URL-safe Base64, 无填充)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X25519KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// 生成 REALITY 使用的 X25519 密钥对
pub fn generate_x25519_keypair() -> X25519KeyPair {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public_key = PublicKey::from(&secret);

    X25519KeyPair {
        private_key: general_purpose::URL_SAFE_NO_PAD.encode(secret.to_bytes()),
        public_key: general_purpose::URL_SAFE_NO_PAD.encode(public_key.as_bytes()),
    }
}

/// 由私钥推导公钥
pub fn public_key_from_private(private_key: &str) -> Result<String, base64::DecodeError> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(private_key.trim_end_matches('='))?;
    if bytes.len() != 32 {
        return Err(base64::DecodeError::InvalidLength);
    }
    let mut array = [0u8; 32];
    array.copy_from_slice(&bytes);
    let public_key = PublicKey::from(&StaticSecret::from(array));
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(public_key.as_bytes()))
}

/// 随机字母数字串 (邮箱 / 密码 / subId 默认值)
///
/// 不适合作为高强度密钥。
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn random_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// REALITY short id: `bytes` 个随机字节的十六进制
pub fn random_short_id(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes.min(8)];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// 随机端口 (1024..=65535)
pub fn random_port() -> u16 {
    rand::thread_rng().gen_range(1024..=65535)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = generate_x25519_keypair();

        // 32 字节无填充 Base64 为 43 个字符
        assert_eq!(keypair.private_key.len(), 43);
        assert_eq!(keypair.public_key.len(), 43);
    }

    #[test]
    fn test_public_key_derivation() {
        let keypair = generate_x25519_keypair();
        let derived = public_key_from_private(&keypair.private_key).unwrap();
        assert_eq!(derived, keypair.public_key);
    }

    #[test]
    fn test_public_key_invalid_length() {
        assert!(public_key_from_private("AAAA").is_err());
    }

    #[test]
    fn test_random_helpers() {
        let s = random_string(12);
        assert_eq!(s.len(), 12);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(Uuid::parse_str(&random_uuid()).is_ok());
        assert_eq!(random_short_id(8).len(), 16);
        assert!(random_port() >= 1024);
    }
}
