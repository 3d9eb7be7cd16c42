use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::Roster;
use crate::utils::crypto::random_uuid;

/// vnext 服务器上的用户 (以 id 定位)
pub trait VnextUser {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmessUser {
    pub id: String,
    #[serde(rename = "alterId", default)]
    pub alter_id: u16,
    #[serde(default = "default_security")]
    pub security: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VmessUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alter_id: 0,
            security: default_security(),
            level: None,
            email: None,
            extra: Map::new(),
        }
    }

    pub fn generate() -> Self {
        Self::new(random_uuid())
    }
}

fn default_security() -> String {
    "auto".to_string()
}

impl VnextUser for VmessUser {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VlessUser {
    pub id: String,
    #[serde(default = "default_encryption")]
    pub encryption: String,
    #[serde(default)]
    pub flow: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VlessUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            encryption: default_encryption(),
            flow: String::new(),
            level: None,
            email: None,
            extra: Map::new(),
        }
    }

    pub fn generate() -> Self {
        Self::new(random_uuid())
    }

    pub fn with_flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = flow.into();
        self
    }
}

fn default_encryption() -> String {
    "none".to_string()
}

impl VnextUser for VlessUser {
    fn id(&self) -> &str {
        &self.id
    }
}

/// 一个 vnext 服务器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnextServer<U> {
    pub address: String,
    pub port: u16,
    #[serde(default = "Vec::new")]
    pub users: Vec<U>,
}

impl<U: VnextUser> Roster for VnextServer<U> {
    type Entry = U;

    fn entries(&self) -> &[U] {
        &self.users
    }

    fn entries_mut(&mut self) -> &mut Vec<U> {
        &mut self.users
    }

    fn key_of(entry: &U) -> Option<&str> {
        Some(entry.id())
    }
}

impl<U: VnextUser> VnextServer<U> {
    pub fn add_user(&mut self, user: U) -> String {
        let id = user.id().to_string();
        self.users.push(user);
        id
    }

    pub fn get_user(&self, id: &str) -> Option<&U> {
        self.find(id)
    }

    pub fn has_user(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn update_user<F: FnOnce(&mut U)>(&mut self, id: &str, f: F) -> bool {
        self.modify(id, f)
    }

    pub fn remove_user(&mut self, id: &str) -> bool {
        self.take(id).is_some()
    }
}

/// VMess / VLESS 出站设置 (`{ "vnext": [...] }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VnextSettings<U> {
    #[serde(default = "Vec::new")]
    pub vnext: Vec<VnextServer<U>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<U> VnextSettings<U> {
    pub fn new(address: impl Into<String>, port: u16, users: Vec<U>) -> Self {
        Self {
            vnext: vec![VnextServer {
                address: address.into(),
                port,
                users,
            }],
            extra: Map::new(),
        }
    }

    /// 第一个服务器
    pub fn server(&self) -> Option<&VnextServer<U>> {
        self.vnext.first()
    }

    pub fn server_mut(&mut self) -> Option<&mut VnextServer<U>> {
        self.vnext.first_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vless_vnext_wire_shape() {
        let settings = VnextSettings::new(
            "example.com",
            443,
            vec![VlessUser::new("b831381d-6324-4d53-ad4f-8cda48b30811").with_flow("xtls-rprx-vision")],
        );
        let v = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            v,
            json!({
                "vnext": [{
                    "address": "example.com",
                    "port": 443,
                    "users": [{
                        "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
                        "encryption": "none",
                        "flow": "xtls-rprx-vision"
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_vnext_user_crud() {
        let mut settings: VnextSettings<VmessUser> = VnextSettings::new("1.2.3.4", 10086, Vec::new());
        let server = settings.server_mut().unwrap();
        let id = server.add_user(VmessUser::generate());
        server.add_user(VmessUser::new("second"));

        assert!(server.update_user(&id, |u| u.alter_id = 4));
        assert_eq!(server.get_user(&id).unwrap().alter_id, 4);
        assert!(server.remove_user(&id));
        assert!(!server.has_user(&id));
        assert_eq!(server.users.len(), 1);
    }
}
