//! 入站管理 (`panel/inbound/*`)
//!
//! 面板为入站提供独立接口, 记录中的 `settings` / `streamSettings` / `sniffing`
//! 是 JSON 字符串。部分更新以面板上的原始记录为底, 未给出的字段原样回传。

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Validator;
use crate::network::{form, form_value, Reply, Session};
use crate::protocol::inbound::{InboundConfig, InboundWire};
use crate::protocol::{Client, ClientOptions, Protocol};
use crate::utils::error::{Result, XuiError};

/// 表单中随入站提交的键, 顺序与面板一致
const FORM_KEYS: [&str; 12] = [
    "up",
    "down",
    "total",
    "remark",
    "enable",
    "expiryTime",
    "listen",
    "port",
    "protocol",
    "settings",
    "streamSettings",
    "sniffing",
];

fn field_i64(record: &Map<String, Value>, key: &str) -> i64 {
    match record.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn field_str(record: &Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// 记录中以 JSON 文本保存的块; 空串与缺失都视为无
fn json_text(record: &Map<String, Value>, key: &str) -> Result<Option<Value>> {
    match record.get(key) {
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(serde_json::from_str(s)?)),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Ok(Some(other.clone())),
    }
}

/// 面板上的一条入站
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub id: u64,
    pub remark: String,
    pub enable: bool,
    /// 已上传 / 已下载 (字节)
    pub up: u64,
    pub down: u64,
    /// 流量上限 (字节, 0 为不限)
    pub total: u64,
    /// 过期时间 (Unix 秒, 0 为永不过期)
    pub expiry_time: i64,
    pub tag: String,
    pub config: InboundConfig,
    record: Map<String, Value>,
}

impl Inbound {
    /// 由 `panel/inbound/list` 中的一条记录解码
    pub fn from_record(record: Map<String, Value>) -> Result<Self> {
        let port = field_i64(&record, "port");
        let port = u16::try_from(port)
            .map_err(|_| XuiError::validation(format!("入站端口超出范围: {}", port)))?;
        let wire = InboundWire {
            protocol: Protocol::from(field_str(&record, "protocol")),
            listen: field_str(&record, "listen"),
            port,
            settings: json_text(&record, "settings")?.unwrap_or_else(|| json!({})),
            stream_settings: json_text(&record, "streamSettings")?,
            sniffing: json_text(&record, "sniffing")?,
        };

        Ok(Self {
            id: field_i64(&record, "id").max(0) as u64,
            remark: field_str(&record, "remark"),
            enable: record.get("enable").and_then(Value::as_bool).unwrap_or(true),
            up: field_i64(&record, "up").max(0) as u64,
            down: field_i64(&record, "down").max(0) as u64,
            total: field_i64(&record, "total").max(0) as u64,
            expiry_time: field_i64(&record, "expiryTime") / 1000,
            tag: field_str(&record, "tag"),
            config: InboundConfig::from_wire(wire)?,
            record,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.config.protocol()
    }

    pub fn port(&self) -> u16 {
        self.config.port()
    }

    /// 面板返回的原始记录
    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// `settings` 原始文本
    pub fn settings_text(&self) -> &str {
        self.record
            .get("settings")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// 各客户端的流量统计 (`clientStats`)
    pub fn client_stats(&self) -> &[Value] {
        self.record
            .get("clientStats")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Serialize for Inbound {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

/// 新增入站的参数
#[derive(Debug, Clone, PartialEq)]
pub struct NewInbound {
    pub config: InboundConfig,
    pub remark: String,
    pub total: u64,
    /// Unix 秒
    pub expiry_time: i64,
    pub up: u64,
    pub down: u64,
    pub enable: bool,
}

impl NewInbound {
    pub fn new(config: InboundConfig) -> Self {
        Self {
            config,
            remark: String::new(),
            total: 0,
            expiry_time: 0,
            up: 0,
            down: 0,
            enable: true,
        }
    }

    pub fn remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    pub fn total(mut self, bytes: u64) -> Self {
        self.total = bytes;
        self
    }

    pub fn expiry_time(mut self, secs: i64) -> Self {
        self.expiry_time = secs;
        self
    }

    pub fn traffic(mut self, up: u64, down: u64) -> Self {
        self.up = up;
        self.down = down;
        self
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }
}

/// 部分更新; 未给出的字段沿用面板上的现值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundUpdate {
    pub config: Option<InboundConfig>,
    pub remark: Option<String>,
    pub total: Option<u64>,
    pub expiry_time: Option<i64>,
    pub up: Option<u64>,
    pub down: Option<u64>,
    pub enable: Option<bool>,
}

impl InboundUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: InboundConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn total(mut self, bytes: u64) -> Self {
        self.total = Some(bytes);
        self
    }

    pub fn expiry_time(mut self, secs: i64) -> Self {
        self.expiry_time = Some(secs);
        self
    }

    pub fn up(mut self, bytes: u64) -> Self {
        self.up = Some(bytes);
        self
    }

    pub fn down(mut self, bytes: u64) -> Self {
        self.down = Some(bytes);
        self
    }

    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = Some(enable);
        self
    }
}

/// 表单字段表, 按键覆盖
struct InboundForm(Vec<(String, String)>);

impl InboundForm {
    fn from_record(record: &Map<String, Value>) -> Self {
        Self(
            FORM_KEYS
                .iter()
                .map(|key| {
                    let value = record.get(*key).map(form_value).unwrap_or_default();
                    (key.to_string(), value)
                })
                .collect(),
        )
    }

    fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
    }

    fn set_config(&mut self, config: &InboundConfig) -> Result<()> {
        let wire = config.to_wire()?;
        self.set("listen", &wire.listen);
        self.set("port", wire.port);
        self.set("protocol", wire.protocol);
        self.set("settings", serde_json::to_string(&wire.settings)?);
        if let Some(stream) = &wire.stream_settings {
            self.set("streamSettings", serde_json::to_string(stream)?);
        }
        if let Some(sniffing) = &wire.sniffing {
            self.set("sniffing", serde_json::to_string(sniffing)?);
        }
        Ok(())
    }

    fn into_fields(self) -> Vec<(String, String)> {
        self.0
    }
}

/// 按任一可查找字段定位客户端, 返回面板路径使用的定位值与条目
fn located_client(inbound: &Inbound, key: &str) -> Result<(String, Client)> {
    let client = inbound.config.find_client(key).cloned().ok_or_else(|| {
        XuiError::not_found(format!("client {} in inbound {}", key, inbound.id))
    })?;
    let remote_key = inbound
        .config
        .client_key(&client)
        .unwrap_or(key)
        .to_string();
    Ok((remote_key, client))
}

fn single_client_settings(client: &Client) -> Result<String> {
    Ok(serde_json::to_string(&json!({ "clients": [client] }))?)
}

#[derive(Clone)]
pub struct InboundManager {
    session: Session,
}

impl InboundManager {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// 新增入站, 返回面板保存后的记录
    pub async fn add(&self, inbound: NewInbound) -> Result<Reply<Inbound>> {
        Validator::validate_inbound(&inbound.config)?;

        let mut fields = InboundForm::from_record(&Map::new());
        fields.set("up", inbound.up);
        fields.set("down", inbound.down);
        fields.set("total", inbound.total);
        fields.set("remark", &inbound.remark);
        fields.set("enable", inbound.enable);
        fields.set("expiryTime", inbound.expiry_time.saturating_mul(1000));
        fields.set_config(&inbound.config)?;

        let reply = self
            .session
            .post("panel/inbound/add", fields.into_fields())
            .await?;
        let reply = reply.try_map(|r| match r.obj {
            Value::Object(record) => Inbound::from_record(record),
            other => Err(XuiError::validation(format!("面板未返回入站记录: {}", other))),
        })?;
        info!(
            "➕ 入站已添加 (id {}, {} 端口 {})",
            reply.response.id,
            reply.response.protocol(),
            reply.response.port()
        );
        Ok(reply)
    }

    pub async fn list(&self) -> Result<Reply<Vec<Inbound>>> {
        self.session
            .post("panel/inbound/list", Vec::new())
            .await?
            .try_map(|r| match r.obj {
                Value::Array(records) => records
                    .into_iter()
                    .filter_map(|record| match record {
                        Value::Object(map) => Some(Inbound::from_record(map)),
                        _ => None,
                    })
                    .collect(),
                Value::Null => Ok(Vec::new()),
                other => Err(XuiError::validation(format!("入站列表不是数组: {}", other))),
            })
    }

    /// 取回全部入站后按 id 查找
    pub async fn get(&self, id: u64) -> Result<Reply<Inbound>> {
        self.list().await?.try_map(|inbounds| {
            inbounds.into_iter().find(|i| i.id == id).ok_or_else(|| {
                debug!("入站 {} 不存在", id);
                XuiError::not_found(format!("inbound {}", id))
            })
        })
    }

    pub async fn exist(&self, id: u64) -> Result<Reply<bool>> {
        Ok(self
            .list()
            .await?
            .map(|inbounds| inbounds.iter().any(|i| i.id == id)))
    }

    /// 部分更新; 提交的配置协议必须与现有入站一致
    pub async fn update(&self, id: u64, update: InboundUpdate) -> Result<Reply<Inbound>> {
        let start = Instant::now();
        let existing = self.get(id).await?.into_inner();

        let mut fields = InboundForm::from_record(existing.record());
        if let Some(config) = &update.config {
            if config.protocol() != existing.protocol() {
                warn!(
                    "入站 {} 协议不一致: {} -> {}",
                    id,
                    existing.protocol(),
                    config.protocol()
                );
                return Err(XuiError::ProtocolMismatch {
                    expected: existing.protocol().to_string(),
                    found: config.protocol().to_string(),
                });
            }
            Validator::validate_inbound(config)?;
            fields.set_config(config)?;
        }
        if let Some(remark) = &update.remark {
            fields.set("remark", remark);
        }
        if let Some(total) = update.total {
            fields.set("total", total);
        }
        if let Some(expiry) = update.expiry_time {
            fields.set("expiryTime", expiry.saturating_mul(1000));
        }
        if let Some(up) = update.up {
            fields.set("up", up);
        }
        if let Some(down) = update.down {
            fields.set("down", down);
        }
        if let Some(enable) = update.enable {
            fields.set("enable", enable);
        }

        let reply = self
            .session
            .post(&format!("panel/inbound/update/{}", id), fields.into_fields())
            .await?;
        info!("✏️ 入站 {} 已更新", id);

        match reply.response.obj {
            Value::Object(record) => {
                let inbound = Inbound::from_record(record)?;
                Ok(Reply {
                    response: inbound,
                    size: reply.size,
                    time_taken: reply.time_taken,
                }
                .since(start))
            }
            _ => Ok(self.get(id).await?.since(start)),
        }
    }

    pub async fn delete(&self, id: u64) -> Result<Reply<u64>> {
        let reply = self
            .session
            .post(&format!("panel/inbound/del/{}", id), Vec::new())
            .await?;
        info!("🗑 入站 {} 已删除", id);
        Ok(reply.map(|_| id))
    }

    /// 单个入站的 JSON 文本 (与列表中的记录相同)
    pub async fn export(&self, id: u64) -> Result<Reply<String>> {
        self.get(id)
            .await?
            .try_map(|inbound| Ok(serde_json::to_string(inbound.record())?))
    }

    /// 导入 [`export`](Self::export) 得到的 JSON 文本
    pub async fn import(&self, data: &str) -> Result<Reply<Inbound>> {
        let record: Value = serde_json::from_str(data)?;
        let Value::Object(record) = record else {
            return Err(XuiError::validation("导入数据必须是 JSON 对象"));
        };
        // 先在本地解码一次, 拒绝无法识别的记录
        let parsed = Inbound::from_record(record)?;
        Validator::validate_inbound(&parsed.config)?;

        let reply = self
            .session
            .post("panel/inbound/import", form([("data", data)]))
            .await?;
        info!("📥 入站已导入 ({} 端口 {})", parsed.protocol(), parsed.port());
        reply.try_map(|r| match r.obj {
            Value::Object(record) => Inbound::from_record(record),
            _ => Ok(parsed),
        })
    }

    /// 向入站添加客户端, 返回其定位值
    pub async fn add_client(&self, inbound_id: u64, options: ClientOptions) -> Result<Reply<String>> {
        let start = Instant::now();
        let inbound = self.get(inbound_id).await?.into_inner();
        let client = inbound.config.build_client(options)?;
        let key = inbound
            .config
            .client_key(&client)
            .unwrap_or_default()
            .to_string();

        let fields = form([
            ("id", inbound_id.to_string()),
            ("settings", single_client_settings(&client)?),
        ]);
        let reply = self.session.post("panel/inbound/addClient", fields).await?;
        info!("👤 入站 {} 已添加客户端 {}", inbound_id, client.email);
        Ok(reply.map(|_| key).since(start))
    }

    /// 只覆盖 `options` 中给出的字段
    pub async fn update_client(
        &self,
        inbound_id: u64,
        key: &str,
        options: &ClientOptions,
    ) -> Result<Reply<Client>> {
        let start = Instant::now();
        let inbound = self.get(inbound_id).await?.into_inner();
        let (remote_key, mut client) = located_client(&inbound, key)?;
        options.apply_to(&mut client);

        let fields = form([
            ("id", inbound_id.to_string()),
            ("settings", single_client_settings(&client)?),
        ]);
        let reply = self
            .session
            .post(&format!("panel/inbound/updateClient/{}", remote_key), fields)
            .await?;
        info!("👤 入站 {} 的客户端 {} 已更新", inbound_id, client.email);
        Ok(reply.map(|_| client).since(start))
    }

    pub async fn delete_client(&self, inbound_id: u64, key: &str) -> Result<Reply<String>> {
        let start = Instant::now();
        let inbound = self.get(inbound_id).await?.into_inner();
        let (remote_key, client) = located_client(&inbound, key)?;

        let reply = self
            .session
            .post(
                &format!("panel/inbound/{}/delClient/{}", inbound_id, remote_key),
                Vec::new(),
            )
            .await?;
        info!("👤 入站 {} 的客户端 {} 已删除", inbound_id, client.email);
        Ok(reply.map(|r| r.msg).since(start))
    }

    /// 客户端最近使用的 IP
    pub async fn client_ips(&self, email: &str) -> Result<Reply<Value>> {
        self.session
            .post(&format!("panel/inbound/clientIps/{}", email), Vec::new())
            .await?
            .try_map(|r| r.obj_decoded().or(Ok(r.obj)))
    }

    pub async fn clear_client_ips(&self, email: &str) -> Result<Reply<String>> {
        Ok(self
            .session
            .post(&format!("panel/inbound/clearClientIps/{}", email), Vec::new())
            .await?
            .map(|r| r.msg))
    }

    pub async fn reset_client_traffic(&self, inbound_id: u64, email: &str) -> Result<Reply<String>> {
        Ok(self
            .session
            .post(
                &format!("panel/inbound/{}/resetClientTraffic/{}", inbound_id, email),
                Vec::new(),
            )
            .await?
            .map(|r| r.msg))
    }

    /// 在线客户端的 email
    pub async fn onlines(&self) -> Result<Reply<Vec<String>>> {
        self.session
            .post("panel/inbound/onlines", Vec::new())
            .await?
            .try_map(|r| r.obj_as::<Option<Vec<String>>>().map(Option::unwrap_or_default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vmess_record() -> Map<String, Value> {
        let record = json!({
            "id": 5,
            "up": 1024,
            "down": 2048,
            "total": 0,
            "remark": "old",
            "enable": true,
            "expiryTime": 1_700_000_000_000i64,
            "clientStats": [{"email": "alice", "up": 0, "down": 0}],
            "listen": "",
            "port": 10086,
            "protocol": "vmess",
            "settings": "{\"clients\":[{\"id\":\"b831381d-6324-4d53-ad4f-8cda48b30811\",\"email\":\"alice\",\"limitIp\":0,\"totalGB\":0,\"expiryTime\":0,\"enable\":true,\"tgId\":\"\",\"subId\":\"abc\",\"reset\":0}]}",
            "streamSettings": "{\"network\":\"ws\",\"security\":\"none\",\"wsSettings\":{\"path\":\"/v\"}}",
            "tag": "inbound-10086",
            "sniffing": "{\"enabled\":true,\"destOverride\":[\"http\",\"tls\"]}"
        });
        match record {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_record_decoding() {
        let inbound = Inbound::from_record(vmess_record()).unwrap();
        assert_eq!(inbound.id, 5);
        assert_eq!(inbound.expiry_time, 1_700_000_000);
        assert_eq!(inbound.protocol(), Protocol::Vmess);
        assert_eq!(inbound.client_stats().len(), 1);
        let stream = inbound.config.stream_settings().unwrap();
        assert_eq!(stream.ws().unwrap().path, "/v");
        let client = inbound
            .config
            .find_client("b831381d-6324-4d53-ad4f-8cda48b30811")
            .unwrap();
        assert_eq!(client.email, "alice");
        assert_eq!(client.telegram_id(), None);
    }

    #[test]
    fn test_form_keeps_untouched_text() {
        let record = vmess_record();
        let mut fields = InboundForm::from_record(&record);
        fields.set("remark", "new");
        let fields = fields.into_fields();

        let get = |k: &str| fields.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(get("remark").as_deref(), Some("new"));
        assert_eq!(get("settings").as_deref(), record["settings"].as_str());
        assert_eq!(get("expiryTime").as_deref(), Some("1700000000000"));
        assert_eq!(get("enable").as_deref(), Some("true"));
        assert_eq!(fields.len(), FORM_KEYS.len());
    }

    #[test]
    fn test_empty_stream_text_is_none() {
        let mut record = vmess_record();
        record.insert("protocol".into(), json!("socks"));
        record.insert("settings".into(), json!("{\"auth\":\"noauth\",\"udp\":false}"));
        record.insert("streamSettings".into(), json!(""));
        record.insert("sniffing".into(), json!(""));
        let inbound = Inbound::from_record(record).unwrap();
        assert!(inbound.config.stream_settings().is_none());
        assert_eq!(inbound.protocol(), Protocol::Socks);
    }
}
