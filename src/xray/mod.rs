//! Xray 配置文档 (`panel/xray*`) 及其上的入站 / 出站 / 路由 / 反向代理管理
//!
//! 面板只提供整份文档的读取与整体写回。`panel/xray` 的 `obj` 是一个 JSON 字符串,
//! 其中 `xraySetting` 才是文档本身 (有的版本里它又是一层字符串)。这层双重编码只在
//! [`XrayApi::document`] 与 [`XrayApi::upload`] 中处理, 其余代码只见到解码后的对象。
//!
//! 每次修改都是"读取 → 合并 → 整体上传", 面板没有条件写入: 两个调用方同时修改
//! 同一节时, 后写入者覆盖先写入者。

pub mod inbound;
pub mod outbound;
pub mod reverse;
pub mod routing;

pub use inbound::{Inbound, InboundManager, InboundUpdate, NewInbound};
pub use outbound::{OutboundManager, OutboundUpdate};
pub use reverse::{Reverse, ReverseEndpoint, ReverseManager};
pub use routing::{Balancer, Routing, RoutingManager, Rule, RuleKey};

use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info};

use crate::network::{form, Reply, Session};
use crate::utils::error::{Result, XuiError};

/// 解码后的 Xray 配置文档
pub type Document = Map<String, Value>;

/// 从 `panel/xray` 的 `obj` 中取出文档
fn extract_document(settings: Value) -> Result<Document> {
    let document = match settings {
        Value::Object(mut map) => map
            .remove("xraySetting")
            .ok_or_else(|| XuiError::not_found("xraySetting"))?,
        other => {
            return Err(XuiError::validation(format!(
                "面板返回的 xray 设置不是对象: {}",
                other
            )))
        }
    };
    let document = match document {
        Value::String(s) => serde_json::from_str(&s)?,
        other => other,
    };
    match document {
        Value::Object(map) => Ok(map),
        other => Err(XuiError::validation(format!("xraySetting 不是对象: {}", other))),
    }
}

#[derive(Clone)]
pub struct XrayApi {
    session: Session,
}

impl XrayApi {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// 面板返回的完整设置 (`xraySetting`, `inboundTags`, `outboundTestUrl` ...)
    pub async fn settings(&self) -> Result<Reply<Value>> {
        self.session
            .post("panel/xray", Vec::new())
            .await?
            .try_map(|r| r.obj_decoded())
    }

    /// 完整的 Xray 配置文档
    pub async fn document(&self) -> Result<Reply<Document>> {
        self.settings().await?.try_map(extract_document)
    }

    /// 文档中的一节; 不存在时返回 NotFound
    pub async fn section(&self, key: &str) -> Result<Reply<Value>> {
        self.document().await?.try_map(|mut doc| {
            doc.remove(key)
                .ok_or_else(|| XuiError::not_found(format!("xray section {}", key)))
        })
    }

    /// 文档中的多节, 按给出的顺序
    pub async fn sections(&self, keys: &[&str]) -> Result<Reply<Document>> {
        self.document().await?.try_map(|mut doc| {
            keys.iter()
                .map(|key| match doc.remove(*key) {
                    Some(v) => Ok((key.to_string(), v)),
                    None => Err(XuiError::not_found(format!("xray section {}", key))),
                })
                .collect()
        })
    }

    /// 重新读取文档, 以 `partial` 的顶层键覆盖后整体上传; 返回上传的文档
    pub async fn update_sections(&self, partial: Document) -> Result<Reply<Document>> {
        let start = Instant::now();
        let mut document = self.document().await?.into_inner();
        let keys: Vec<&str> = partial.keys().map(String::as_str).collect();
        debug!("合并文档节: {:?}", keys);
        for (key, value) in partial {
            document.insert(key, value);
        }
        let reply = self.upload(&document).await?;
        Ok(reply.map(|_| document).since(start))
    }

    /// 以单个表单字段 `xraySetting` 上传整份文档
    pub async fn upload(&self, document: &Document) -> Result<Reply<String>> {
        let text = serde_json::to_string(document)?;
        let reply = self
            .session
            .post("panel/xray/update", form([("xraySetting", text)]))
            .await?;
        info!("📝 Xray 配置已上传");
        Ok(reply.map(|r| r.msg))
    }

    /// 重启 Xray 使配置生效
    pub async fn restart(&self) -> Result<Reply<String>> {
        let reply = self.session.post("server/restartXrayService", Vec::new()).await?;
        info!("🔄 Xray 服务已重启");
        Ok(reply.map(|r| r.msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_nested_string_document() {
        let inner = json!({"log": {"loglevel": "warning"}, "outbounds": []});
        let settings = json!({
            "xraySetting": serde_json::to_string(&inner).unwrap(),
            "inboundTags": ["inbound-443"]
        });
        let doc = extract_document(settings).unwrap();
        assert_eq!(Value::Object(doc), inner);
    }

    #[test]
    fn test_extract_missing_document() {
        let err = extract_document(json!({"inboundTags": []})).unwrap_err();
        assert_eq!(err.code(), 404);
        assert!(extract_document(json!({"xraySetting": "[1,2]"})).is_err());
    }
}
