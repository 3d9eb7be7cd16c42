//! 客户端 / 账户列表
//!
//! 每种协议用不同字段定位客户端: VLESS 用 `id`, VMess 用 `id` 或 `email`,
//! Trojan 用 `password`, Shadowsocks 用 `email`, SOCKS / HTTP 账户用 `user`。
//! 查找一律取第一个匹配项。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::crypto::random_string;
use crate::utils::serde_helpers::{default_true, millis};

/// 多用户协议的客户端条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "limitIp", default)]
    pub limit_ip: u32,
    /// 流量上限 (字节, 0 为不限)
    #[serde(rename = "totalGB", default)]
    pub total_traffic: u64,
    /// 过期时间 (Unix 秒, 0 为永不过期)
    #[serde(rename = "expiryTime", with = "millis", default)]
    pub expiry_time: i64,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(rename = "tgId", default, skip_serializing_if = "Option::is_none")]
    pub tg_id: Option<TgId>,
    #[serde(rename = "subId", default)]
    pub sub_id: String,
    #[serde(default)]
    pub reset: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Telegram 用户 id, 按读入时的形式原样写回
///
/// 面板未绑定时写作空串, 旧版本里也见过字符串形式的数字。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TgId {
    Id(i64),
    Text(String),
    Raw(Value),
}

impl TgId {
    pub fn id(&self) -> Option<i64> {
        match self {
            TgId::Id(n) => Some(*n),
            TgId::Text(s) => s.trim().parse().ok(),
            TgId::Raw(_) => None,
        }
    }
}

impl Default for TgId {
    fn default() -> Self {
        TgId::Text(String::new())
    }
}

impl Client {
    /// 已绑定的 Telegram 用户 id
    pub fn telegram_id(&self) -> Option<i64> {
        self.tg_id.as_ref().and_then(TgId::id)
    }
}

/// 新增 / 更新客户端的可选字段; 更新时只覆盖给出的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOptions {
    pub id: Option<String>,
    pub password: Option<String>,
    pub method: Option<String>,
    pub flow: Option<String>,
    pub email: Option<String>,
    pub enable: Option<bool>,
    pub total_traffic: Option<u64>,
    pub expiry_time: Option<i64>,
    pub limit_ip: Option<u32>,
    pub tg_id: Option<i64>,
    pub sub_id: Option<String>,
    pub reset: Option<u32>,
}

macro_rules! option_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, value: impl Into<$ty>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    option_setters! {
        id: String,
        password: String,
        method: String,
        flow: String,
        email: String,
        enable: bool,
        total_traffic: u64,
        expiry_time: i64,
        limit_ip: u32,
        tg_id: i64,
        sub_id: String,
        reset: u32,
    }

    /// 以默认值补齐 (email 8 位随机, subId 16 位随机, 启用, tgId 空串)
    pub fn into_client(self) -> Client {
        Client {
            id: self.id,
            password: self.password,
            method: self.method,
            flow: self.flow,
            email: self.email.unwrap_or_else(|| random_string(8)),
            limit_ip: self.limit_ip.unwrap_or(0),
            total_traffic: self.total_traffic.unwrap_or(0),
            expiry_time: self.expiry_time.unwrap_or(0),
            enable: self.enable.unwrap_or(true),
            tg_id: Some(self.tg_id.map(TgId::Id).unwrap_or_default()),
            sub_id: self.sub_id.unwrap_or_else(|| random_string(16)),
            reset: self.reset.unwrap_or(0),
            extra: Map::new(),
        }
    }

    pub fn apply_to(&self, client: &mut Client) {
        if let Some(v) = &self.id {
            client.id = Some(v.clone());
        }
        if let Some(v) = &self.password {
            client.password = Some(v.clone());
        }
        if let Some(v) = &self.method {
            client.method = Some(v.clone());
        }
        if let Some(v) = &self.flow {
            client.flow = Some(v.clone());
        }
        if let Some(v) = &self.email {
            client.email = v.clone();
        }
        if let Some(v) = self.enable {
            client.enable = v;
        }
        if let Some(v) = self.total_traffic {
            client.total_traffic = v;
        }
        if let Some(v) = self.expiry_time {
            client.expiry_time = v;
        }
        if let Some(v) = self.limit_ip {
            client.limit_ip = v;
        }
        if let Some(v) = self.tg_id {
            client.tg_id = Some(TgId::Id(v));
        }
        if let Some(v) = &self.sub_id {
            client.sub_id = v.clone();
        }
        if let Some(v) = self.reset {
            client.reset = v;
        }
    }
}

/// 按键定位条目的有序列表
pub trait Roster {
    type Entry;

    fn entries(&self) -> &[Self::Entry];
    fn entries_mut(&mut self) -> &mut Vec<Self::Entry>;
    fn key_of(entry: &Self::Entry) -> Option<&str>;

    /// 条目是否由 `key` 定位; 默认只比较 `key_of`
    fn matches(entry: &Self::Entry, key: &str) -> bool {
        Self::key_of(entry) == Some(key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries().iter().position(|e| Self::matches(e, key))
    }

    fn find(&self, key: &str) -> Option<&Self::Entry> {
        self.position(key).map(|i| &self.entries()[i])
    }

    fn modify<F: FnOnce(&mut Self::Entry)>(&mut self, key: &str, f: F) -> bool {
        match self.position(key) {
            Some(i) => {
                f(&mut self.entries_mut()[i]);
                true
            }
            None => false,
        }
    }

    /// 删除并返回条目, 其后条目前移
    fn take(&mut self, key: &str) -> Option<Self::Entry> {
        let i = self.position(key)?;
        Some(self.entries_mut().remove(i))
    }
}

/// 入站客户端列表 (VMess / VLESS / Trojan / Shadowsocks)
pub trait ClientRoster: Roster<Entry = Client> {
    /// 按协议补齐新客户端的默认字段
    fn build_client(&self, options: ClientOptions) -> Client;

    fn clients(&self) -> &[Client] {
        self.entries()
    }

    /// 添加客户端, 返回其定位键
    fn add_client(&mut self, options: ClientOptions) -> String {
        let client = self.build_client(options);
        let key = Self::key_of(&client).unwrap_or_default().to_string();
        self.entries_mut().push(client);
        key
    }

    fn get_client(&self, key: &str) -> Option<&Client> {
        self.find(key)
    }

    fn has_client(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn update_client(&mut self, key: &str, options: &ClientOptions) -> bool {
        self.modify(key, |client| options.apply_to(client))
    }

    fn remove_client(&mut self, key: &str) -> bool {
        self.take(key).is_some()
    }

    fn client_by_email(&self, email: &str) -> Option<&Client> {
        self.clients().iter().find(|c| c.email == email)
    }
}

/// SOCKS / HTTP 账户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user: String,
    pub pass: String,
}

impl Account {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

/// 以 `user` 定位的账户列表
pub trait AccountRoster: Roster<Entry = Account> {
    fn accounts(&self) -> &[Account] {
        self.entries()
    }

    /// 添加账户 (用户名 8 位随机, 密码 12 位随机), 返回用户名
    fn add_account(&mut self, user: Option<String>, pass: Option<String>) -> String {
        let account = Account {
            user: user.unwrap_or_else(|| random_string(8)),
            pass: pass.unwrap_or_else(|| random_string(12)),
        };
        let user = account.user.clone();
        self.entries_mut().push(account);
        user
    }

    fn get_account(&self, user: &str) -> Option<&Account> {
        self.find(user)
    }

    fn has_account(&self, user: &str) -> bool {
        self.position(user).is_some()
    }

    fn update_account(&mut self, user: &str, new_user: Option<String>, new_pass: Option<String>) -> bool {
        self.modify(user, |account| {
            if let Some(u) = new_user {
                account.user = u;
            }
            if let Some(p) = new_pass {
                account.pass = p;
            }
        })
    }

    fn remove_account(&mut self, user: &str) -> bool {
        self.take(user).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Accounts(Vec<Account>);

    impl Roster for Accounts {
        type Entry = Account;

        fn entries(&self) -> &[Account] {
            &self.0
        }

        fn entries_mut(&mut self) -> &mut Vec<Account> {
            &mut self.0
        }

        fn key_of(entry: &Account) -> Option<&str> {
            Some(&entry.user)
        }
    }

    impl AccountRoster for Accounts {}

    #[test]
    fn test_client_wire_format() {
        let raw = json!({
            "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "flow": "",
            "email": "alice",
            "limitIp": 2,
            "totalGB": 10737418240u64,
            "expiryTime": 1767225600000i64,
            "enable": true,
            "tgId": "",
            "subId": "x7k2",
            "reset": 0,
            "comment": "vip"
        });
        let client: Client = serde_json::from_value(raw).unwrap();
        assert_eq!(client.expiry_time, 1_767_225_600);
        assert_eq!(client.total_traffic, 10 * 1024 * 1024 * 1024);
        assert_eq!(client.tg_id, Some(TgId::Text(String::new())));
        assert_eq!(client.telegram_id(), None);
        assert_eq!(client.extra["comment"], "vip");

        let v = serde_json::to_value(&client).unwrap();
        assert_eq!(v["expiryTime"], 1_767_225_600_000i64);
        assert_eq!(v["tgId"], "");
        assert_eq!(v["comment"], "vip");
    }

    #[test]
    fn test_tg_id_keeps_wire_form() {
        for raw in [json!(""), json!("123"), json!(123), json!(1.5)] {
            let client: Client = serde_json::from_value(json!({"email": "a", "tgId": raw})).unwrap();
            assert_eq!(serde_json::to_value(&client).unwrap()["tgId"], raw);
        }
        let client: Client = serde_json::from_value(json!({"email": "a"})).unwrap();
        assert!(client.tg_id.is_none());
        assert!(serde_json::to_value(&client).unwrap().get("tgId").is_none());

        let mut client = ClientOptions::new().into_client();
        assert_eq!(serde_json::to_value(&client).unwrap()["tgId"], "");
        ClientOptions::new().tg_id(42i64).apply_to(&mut client);
        assert_eq!(client.telegram_id(), Some(42));
    }

    #[test]
    fn test_options_fill_and_apply() {
        let mut client = ClientOptions::new().email("bob").into_client();
        assert_eq!(client.email, "bob");
        assert_eq!(client.sub_id.len(), 16);
        assert!(client.enable);

        ClientOptions::new()
            .total_traffic(1024u64)
            .enable(false)
            .apply_to(&mut client);
        assert_eq!(client.total_traffic, 1024);
        assert!(!client.enable);
        assert_eq!(client.email, "bob");
    }

    #[test]
    fn test_account_roster() {
        let mut accounts = Accounts(Vec::new());
        let user = accounts.add_account(None, Some("secret".into()));
        assert_eq!(user.len(), 8);
        accounts.add_account(Some("carol".into()), None);

        assert!(accounts.update_account("carol", None, Some("new".into())));
        assert_eq!(accounts.get_account("carol").unwrap().pass, "new");
        assert!(!accounts.update_account("nobody", None, None));

        assert!(accounts.remove_account(&user));
        assert_eq!(accounts.accounts().len(), 1);
        assert_eq!(accounts.accounts()[0].user, "carol");
    }
}
