//! 出站管理
//!
//! 面板没有出站接口, 所有操作都作用于配置文档的 `outbounds` 数组。条目按原始
//! JSON 修改, 未改动的出站与未建模的键原样上传。

use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{Document, XrayApi};
use crate::config::Validator;
use crate::network::Reply;
use crate::protocol::{Outbound, OutboundConfig};
use crate::utils::error::{Result, XuiError};

/// 部分更新; 未给出的字段保留现值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundUpdate {
    /// 新协议配置 (settings / streamSettings 一并替换)
    pub config: Option<OutboundConfig>,
    pub tag: Option<String>,
    pub send_through: Option<String>,
    pub proxy_settings: Option<Value>,
    pub mux: Option<Value>,
}

impl OutboundUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: OutboundConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn send_through(mut self, address: impl Into<String>) -> Self {
        self.send_through = Some(address.into());
        self
    }

    pub fn proxy_settings(mut self, proxy_settings: Value) -> Self {
        self.proxy_settings = Some(proxy_settings);
        self
    }

    pub fn mux(mut self, mux: Value) -> Self {
        self.mux = Some(mux);
        self
    }

    fn apply(&self, entry: &mut Map<String, Value>) -> Result<()> {
        if let Some(config) = &self.config {
            let (settings, stream_settings) = config.to_parts()?;
            entry.insert("protocol".into(), Value::String(config.protocol().to_string()));
            set_or_remove(entry, "settings", settings);
            set_or_remove(entry, "streamSettings", stream_settings);
        }
        if let Some(tag) = &self.tag {
            entry.insert("tag".into(), Value::String(tag.clone()));
        }
        if let Some(address) = &self.send_through {
            entry.insert("sendThrough".into(), Value::String(address.clone()));
        }
        if let Some(proxy) = &self.proxy_settings {
            entry.insert("proxySettings".into(), proxy.clone());
        }
        if let Some(mux) = &self.mux {
            entry.insert("mux".into(), mux.clone());
        }
        Ok(())
    }
}

fn set_or_remove(entry: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            entry.insert(key.to_string(), v);
        }
        None => {
            entry.remove(key);
        }
    }
}

fn entry_tag(entry: &Value) -> Option<&str> {
    entry.get("tag").and_then(Value::as_str)
}

/// 文档中的 `outbounds` 数组; 缺失时插入空数组
fn outbounds_mut(document: &mut Document) -> Result<&mut Vec<Value>> {
    document
        .entry("outbounds")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| XuiError::validation("outbounds 不是数组"))
}

#[derive(Clone)]
pub struct OutboundManager {
    xray: XrayApi,
}

impl OutboundManager {
    pub fn new(xray: XrayApi) -> Self {
        Self { xray }
    }

    pub async fn list(&self) -> Result<Reply<Vec<Outbound>>> {
        self.xray.document().await?.try_map(|mut doc| {
            let entries = std::mem::take(outbounds_mut(&mut doc)?);
            entries.into_iter().map(Outbound::from_value).collect()
        })
    }

    /// 第一个 tag 匹配的出站
    pub async fn get(&self, tag: &str) -> Result<Reply<Outbound>> {
        self.list().await?.try_map(|outbounds| {
            outbounds.into_iter().find(|o| o.tag == tag).ok_or_else(|| {
                debug!("出站 {} 不存在", tag);
                XuiError::not_found(format!("outbound {}", tag))
            })
        })
    }

    pub async fn exist(&self, tag: &str) -> Result<Reply<bool>> {
        Ok(self
            .list()
            .await?
            .map(|outbounds| outbounds.iter().any(|o| o.tag == tag)))
    }

    /// 追加到 `outbounds` 末尾
    pub async fn add(&self, outbound: Outbound) -> Result<Reply<Outbound>> {
        let start = Instant::now();
        Validator::validate_outbound(&outbound)?;
        let mut document = self.xray.document().await?.into_inner();

        let outbounds = outbounds_mut(&mut document)?;
        if outbounds.iter().any(|o| entry_tag(o) == Some(outbound.tag.as_str())) {
            warn!("出站 tag {} 已存在, 按 tag 的操作将只命中第一个", outbound.tag);
        }
        outbounds.push(outbound.to_value()?);

        let reply = self.xray.upload(&document).await?;
        info!("➕ 出站已添加 ({} {})", outbound.tag, outbound.config.protocol());
        Ok(reply.map(|_| outbound).since(start))
    }

    /// 修改第一个 tag 匹配的出站
    pub async fn update(&self, tag: &str, update: OutboundUpdate) -> Result<Reply<Outbound>> {
        let start = Instant::now();
        let mut document = self.xray.document().await?.into_inner();

        let entry = outbounds_mut(&mut document)?
            .iter_mut()
            .find(|o| entry_tag(o) == Some(tag))
            .ok_or_else(|| XuiError::not_found(format!("outbound {}", tag)))?;
        let map = entry
            .as_object_mut()
            .ok_or_else(|| XuiError::validation(format!("出站 {} 不是对象", tag)))?;
        update.apply(map)?;
        let updated = Outbound::from_value(entry.clone())?;
        Validator::validate_outbound(&updated)?;

        let reply = self.xray.upload(&document).await?;
        info!("✏️ 出站 {} 已更新", tag);
        Ok(reply.map(|_| updated).since(start))
    }

    /// 删除第一个 tag 匹配的出站
    pub async fn delete(&self, tag: &str) -> Result<Reply<String>> {
        let start = Instant::now();
        let mut document = self.xray.document().await?.into_inner();

        let outbounds = outbounds_mut(&mut document)?;
        let index = outbounds
            .iter()
            .position(|o| entry_tag(o) == Some(tag))
            .ok_or_else(|| XuiError::not_found(format!("outbound {}", tag)))?;
        outbounds.remove(index);

        let reply = self.xray.upload(&document).await?;
        info!("🗑 出站 {} 已删除", tag);
        Ok(reply.map(|_| tag.to_string()).since(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::outbound::FreedomSettings;
    use serde_json::json;

    #[test]
    fn test_update_keeps_unknown_keys() {
        let mut entry = match json!({
            "tag": "direct",
            "protocol": "freedom",
            "settings": {"domainStrategy": "AsIs"},
            "targetStrategy": "UseIPv4"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        OutboundUpdate::new()
            .tag("direct-v4")
            .mux(json!({"enabled": false}))
            .apply(&mut entry)
            .unwrap();
        assert_eq!(entry["tag"], "direct-v4");
        assert_eq!(entry["settings"], json!({"domainStrategy": "AsIs"}));
        assert_eq!(entry["targetStrategy"], "UseIPv4");
        assert_eq!(entry["mux"]["enabled"], false);
    }

    #[test]
    fn test_config_replacement_drops_stale_stream() {
        let mut entry = match json!({
            "tag": "proxy",
            "protocol": "vless",
            "settings": {"vnext": []},
            "streamSettings": {"network": "ws"}
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        OutboundUpdate::new()
            .config(OutboundConfig::Freedom(FreedomSettings::default()))
            .apply(&mut entry)
            .unwrap();
        assert_eq!(entry["protocol"], "freedom");
        assert!(entry.get("streamSettings").is_none());
    }
}
