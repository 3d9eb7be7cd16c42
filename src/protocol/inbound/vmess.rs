use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::client::{Client, ClientOptions, ClientRoster};
use crate::utils::crypto::random_uuid;

/// VMess 入站设置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VmessSettings {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// 面板路径用 id, 按 email 查找同样可行
client_roster!(VmessSettings, client => client.id.as_deref(), or email);

impl ClientRoster for VmessSettings {
    fn build_client(&self, options: ClientOptions) -> Client {
        let mut client = options.into_client();
        client.id.get_or_insert_with(random_uuid);
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::client::Roster;

    #[test]
    fn test_lookup_by_id_or_email() {
        let mut settings = VmessSettings::default();
        let id = settings.add_client(ClientOptions::new().email("alice"));
        settings.add_client(ClientOptions::new().email("bob"));

        assert!(settings.has_client("alice"));
        assert_eq!(settings.get_client(&id).unwrap().email, "alice");
        assert_eq!(
            VmessSettings::key_of(settings.get_client("alice").unwrap()),
            Some(id.as_str())
        );

        assert!(settings.update_client("alice", &ClientOptions::new().limit_ip(2u32)));
        assert_eq!(settings.get_client(&id).unwrap().limit_ip, 2);

        assert!(settings.remove_client("alice"));
        assert!(!settings.has_client(&id));
        assert_eq!(settings.clients().len(), 1);
        assert!(!settings.update_client("nobody", &ClientOptions::new()));
    }
}
