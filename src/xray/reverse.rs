//! 反向代理 (`reverse` 节): bridge 与 portal 均以 tag 定位

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{Document, XrayApi};
use crate::network::Reply;
use crate::utils::error::{Result, XuiError};

pub const DEFAULT_DOMAIN: &str = "reverse.xui";

/// bridge 或 portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseEndpoint {
    pub tag: String,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl ReverseEndpoint {
    pub fn new(tag: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            tag: tag.into(),
            domain: domain.unwrap_or_else(default_domain),
        }
    }
}

fn find<'a>(list: &'a [ReverseEndpoint], tag: &str) -> Option<&'a ReverseEndpoint> {
    list.iter().find(|e| e.tag == tag)
}

fn update(list: &mut [ReverseEndpoint], tag: &str, new_tag: Option<String>, domain: Option<String>) -> bool {
    match list.iter_mut().find(|e| e.tag == tag) {
        Some(entry) => {
            if let Some(t) = new_tag {
                entry.tag = t;
            }
            if let Some(d) = domain {
                entry.domain = d;
            }
            true
        }
        None => false,
    }
}

fn remove(list: &mut Vec<ReverseEndpoint>, tag: &str) -> bool {
    match list.iter().position(|e| e.tag == tag) {
        Some(i) => {
            list.remove(i);
            true
        }
        None => false,
    }
}

/// 文档的 `reverse` 节; 空列表不写出
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reverse {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bridges: Vec<ReverseEndpoint>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub portals: Vec<ReverseEndpoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reverse {
    pub fn is_empty(&self) -> bool {
        self.bridges.is_empty() && self.portals.is_empty() && self.extra.is_empty()
    }

    /// 追加 bridge; 未给出 domain 时用 `reverse.xui`
    pub fn add_bridge(&mut self, tag: impl Into<String>, domain: Option<String>) {
        self.bridges.push(ReverseEndpoint::new(tag, domain));
    }

    pub fn get_bridge(&self, tag: &str) -> Option<&ReverseEndpoint> {
        find(&self.bridges, tag)
    }

    pub fn has_bridge(&self, tag: &str) -> bool {
        self.get_bridge(tag).is_some()
    }

    pub fn update_bridge(&mut self, tag: &str, new_tag: Option<String>, domain: Option<String>) -> bool {
        update(&mut self.bridges, tag, new_tag, domain)
    }

    pub fn delete_bridge(&mut self, tag: &str) -> bool {
        remove(&mut self.bridges, tag)
    }

    pub fn add_portal(&mut self, tag: impl Into<String>, domain: Option<String>) {
        self.portals.push(ReverseEndpoint::new(tag, domain));
    }

    pub fn get_portal(&self, tag: &str) -> Option<&ReverseEndpoint> {
        find(&self.portals, tag)
    }

    pub fn has_portal(&self, tag: &str) -> bool {
        self.get_portal(tag).is_some()
    }

    pub fn update_portal(&mut self, tag: &str, new_tag: Option<String>, domain: Option<String>) -> bool {
        update(&mut self.portals, tag, new_tag, domain)
    }

    pub fn delete_portal(&mut self, tag: &str) -> bool {
        remove(&mut self.portals, tag)
    }
}

#[derive(Clone)]
pub struct ReverseManager {
    xray: XrayApi,
}

impl ReverseManager {
    pub fn new(xray: XrayApi) -> Self {
        Self { xray }
    }

    /// 读取 `reverse` 节; 文档中没有时返回空值
    pub async fn load(&self) -> Result<Reply<Reverse>> {
        self.xray.document().await?.try_map(|mut doc| match doc.remove("reverse") {
            Some(Value::Null) | None => Ok(Reverse::default()),
            Some(value) => Ok(serde_json::from_value(value)?),
        })
    }

    /// 上传整个 `reverse` 节, 其余节原样保留
    pub async fn commit(&self, reverse: &Reverse) -> Result<Reply<Document>> {
        for endpoint in reverse.bridges.iter().chain(&reverse.portals) {
            if endpoint.tag.is_empty() {
                return Err(XuiError::validation("反向代理 tag 不能为空"));
            }
        }
        let mut partial = Document::new();
        partial.insert("reverse".into(), serde_json::to_value(reverse)?);
        let reply = self.xray.update_sections(partial).await?;
        info!(
            "🔁 反向代理已提交 ({} bridge, {} portal)",
            reverse.bridges.len(),
            reverse.portals.len()
        );
        Ok(reply)
    }

    /// 读取、修改并提交; `f` 返回 Err 时不上传
    pub async fn modify<T, F>(&self, f: F) -> Result<Reply<T>>
    where
        F: FnOnce(&mut Reverse) -> Result<T>,
    {
        let mut reverse = self.load().await?.into_inner();
        let value = f(&mut reverse)?;
        Ok(self.commit(&reverse).await?.map(|_| value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bridge_portal_crud() {
        let mut reverse = Reverse::default();
        reverse.add_bridge("bridge", None);
        reverse.add_portal("portal", Some("tunnel.example.com".into()));

        assert_eq!(reverse.get_bridge("bridge").unwrap().domain, DEFAULT_DOMAIN);
        assert!(reverse.update_portal("portal", Some("portal-2".into()), None));
        assert!(!reverse.has_portal("portal"));
        assert_eq!(reverse.get_portal("portal-2").unwrap().domain, "tunnel.example.com");

        assert!(reverse.delete_bridge("bridge"));
        assert!(!reverse.delete_bridge("bridge"));
        assert_eq!(
            serde_json::to_value(&reverse).unwrap(),
            json!({"portals": [{"tag": "portal-2", "domain": "tunnel.example.com"}]})
        );
    }

    #[test]
    fn test_missing_domain_defaults() {
        let reverse: Reverse =
            serde_json::from_value(json!({"bridges": [{"tag": "b"}]})).unwrap();
        assert_eq!(reverse.bridges[0].domain, "reverse.xui");
        assert!(reverse.portals.is_empty());
        assert!(!reverse.is_empty());
    }
}
