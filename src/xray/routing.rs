//! 路由 (`routing` 节)
//!
//! [`RoutingManager::load`] 返回一个 [`Routing`] 值, 对它的增删改都是纯内存操作,
//! 最后由 [`RoutingManager::commit`] 整节上传。
//!
//! 远端格式中规则没有 id, 以 (入站 tag 集合, 出站 tag) 作为 [`RuleKey`] 定位,
//! 多条规则匹配时取第一条。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Document, XrayApi};
use crate::config::Validator;
use crate::network::Reply;
use crate::utils::error::{Result, XuiError};
use crate::utils::serde_helpers::{one_or_many, port_list};

fn default_rule_type() -> String {
    "field".to_string()
}

/// 一条路由规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "type", default = "default_rule_type")]
    pub rule_type: String,
    #[serde(rename = "domainMatcher", skip_serializing_if = "Option::is_none", default)]
    pub domain_matcher: Option<String>,
    #[serde(
        rename = "inboundTag",
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub inbound_tag: Vec<String>,
    #[serde(rename = "outboundTag", skip_serializing_if = "Option::is_none", default)]
    pub outbound_tag: Option<String>,
    #[serde(rename = "balancerTag", skip_serializing_if = "Option::is_none", default)]
    pub balancer_tag: Option<String>,
    #[serde(
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub user: Vec<String>,
    /// "tcp" / "udp" / "tcp,udp"
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub network: Option<String>,
    #[serde(
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub protocol: Vec<String>,
    #[serde(
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub domain: Vec<String>,
    #[serde(
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub ip: Vec<String>,
    /// 如 "53,443,1000-2000"
    #[serde(with = "port_list", skip_serializing_if = "Option::is_none", default)]
    pub port: Option<String>,
    #[serde(
        deserialize_with = "one_or_many::deserialize",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub source: Vec<String>,
    #[serde(
        rename = "sourcePort",
        with = "port_list",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub source_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attrs: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            rule_type: default_rule_type(),
            domain_matcher: None,
            inbound_tag: Vec::new(),
            outbound_tag: None,
            balancer_tag: None,
            user: Vec::new(),
            network: None,
            protocol: Vec::new(),
            domain: Vec::new(),
            ip: Vec::new(),
            port: None,
            source: Vec::new(),
            source_port: None,
            attrs: None,
            extra: Map::new(),
        }
    }
}

macro_rules! list_setters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field<I, S>(mut self, values: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.$field = values.into_iter().map(Into::into).collect();
                self
            }
        )*
    };
}

macro_rules! text_setters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    list_setters!(inbound_tag, user, protocol, domain, ip, source);
    text_setters!(outbound_tag, balancer_tag, network, domain_matcher, port, source_port);

    pub fn attrs(mut self, attrs: Value) -> Self {
        self.attrs = Some(attrs);
        self
    }

    /// 本规则的定位键
    pub fn key(&self) -> RuleKey {
        RuleKey {
            inbound_tags: self.inbound_tag.clone(),
            outbound_tag: self.outbound_tag.clone().unwrap_or_default(),
        }
    }
}

/// 规则定位键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleKey {
    pub inbound_tags: Vec<String>,
    pub outbound_tag: String,
}

impl RuleKey {
    pub fn new<I, S>(inbound_tags: I, outbound_tag: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inbound_tags: inbound_tags.into_iter().map(Into::into).collect(),
            outbound_tag: outbound_tag.into(),
        }
    }

    /// 出站 tag 相同, 且键中每个入站 tag 都在规则中; 规则不限入站时匹配任意集合
    pub fn matches(&self, rule: &Rule) -> bool {
        if rule.outbound_tag.as_deref().unwrap_or_default() != self.outbound_tag {
            return false;
        }
        rule.inbound_tag.is_empty()
            || self
                .inbound_tags
                .iter()
                .all(|tag| rule.inbound_tag.contains(tag))
    }
}

/// 负载均衡器
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Balancer {
    pub tag: String,
    #[serde(default)]
    pub selector: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub strategy: Option<Value>,
    #[serde(rename = "fallbackTag", skip_serializing_if = "Option::is_none", default)]
    pub fallback_tag: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Balancer {
    pub fn new<I, S>(tag: impl Into<String>, selector: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag: tag.into(),
            selector: selector.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// 文档的 `routing` 节
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Routing {
    #[serde(rename = "domainStrategy", skip_serializing_if = "String::is_empty", default)]
    pub domain_strategy: String,
    #[serde(rename = "domainMatcher", skip_serializing_if = "String::is_empty", default)]
    pub domain_matcher: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub balancers: Vec<Balancer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Routing {
    pub fn get_rule(&self, key: &RuleKey) -> Option<&Rule> {
        self.rules.iter().find(|r| key.matches(r))
    }

    pub fn has_rule(&self, key: &RuleKey) -> bool {
        self.get_rule(key).is_some()
    }

    /// 追加到规则列表末尾
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// 在最前面插入 (优先匹配)
    pub fn insert_rule(&mut self, rule: Rule) {
        self.rules.insert(0, rule);
    }

    /// 替换第一条匹配的规则, 位置不变
    pub fn update_rule(&mut self, key: &RuleKey, rule: Rule) -> bool {
        match self.rules.iter_mut().find(|r| key.matches(r)) {
            Some(slot) => {
                *slot = rule;
                true
            }
            None => {
                debug!("没有匹配 {:?} 的路由规则", key);
                false
            }
        }
    }

    /// 删除第一条匹配的规则
    pub fn delete_rule(&mut self, key: &RuleKey) -> bool {
        match self.rules.iter().position(|r| key.matches(r)) {
            Some(i) => {
                self.rules.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn get_balancer(&self, tag: &str) -> Option<&Balancer> {
        self.balancers.iter().find(|b| b.tag == tag)
    }

    pub fn add_balancer(&mut self, balancer: Balancer) {
        self.balancers.push(balancer);
    }

    pub fn delete_balancer(&mut self, tag: &str) -> bool {
        match self.balancers.iter().position(|b| b.tag == tag) {
            Some(i) => {
                self.balancers.remove(i);
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct RoutingManager {
    xray: XrayApi,
}

impl RoutingManager {
    pub fn new(xray: XrayApi) -> Self {
        Self { xray }
    }

    /// 读取 `routing` 节; 文档中没有时返回空路由
    pub async fn load(&self) -> Result<Reply<Routing>> {
        self.xray.document().await?.try_map(|mut doc| match doc.remove("routing") {
            Some(Value::Null) | None => Ok(Routing::default()),
            Some(value) => Ok(serde_json::from_value(value)?),
        })
    }

    /// 校验后上传整个 `routing` 节, 其余节原样保留
    pub async fn commit(&self, routing: &Routing) -> Result<Reply<Document>> {
        for rule in &routing.rules {
            Validator::validate_rule(rule)?;
        }
        let mut partial = Document::new();
        partial.insert("routing".into(), serde_json::to_value(routing)?);
        let reply = self.xray.update_sections(partial).await?;
        info!("🧭 路由已提交 ({} 条规则)", routing.rules.len());
        Ok(reply)
    }

    /// 读取、修改并提交; `f` 返回 Err 时不上传
    pub async fn modify<T, F>(&self, f: F) -> Result<Reply<T>>
    where
        F: FnOnce(&mut Routing) -> Result<T>,
    {
        let mut routing = self.load().await?.into_inner();
        let value = f(&mut routing)?;
        Ok(self.commit(&routing).await?.map(|_| value))
    }

    /// 修改第一条匹配的规则并提交; 没有匹配时返回 NotFound
    pub async fn update_rule(&self, key: &RuleKey, rule: Rule) -> Result<Reply<Rule>> {
        self.modify(|routing| {
            if routing.update_rule(key, rule.clone()) {
                Ok(rule)
            } else {
                Err(XuiError::not_found(format!(
                    "rule {:?} -> {}",
                    key.inbound_tags, key.outbound_tag
                )))
            }
        })
        .await
    }

    /// 删除第一条匹配的规则并提交; 没有匹配时返回 NotFound
    pub async fn delete_rule(&self, key: &RuleKey) -> Result<Reply<Rule>> {
        self.modify(|routing| {
            let index = routing
                .rules
                .iter()
                .position(|r| key.matches(r))
                .ok_or_else(|| {
                    XuiError::not_found(format!(
                        "rule {:?} -> {}",
                        key.inbound_tags, key.outbound_tag
                    ))
                })?;
            Ok(routing.rules.remove(index))
        })
        .await
    }

    pub async fn add_rule(&self, rule: Rule) -> Result<Reply<Rule>> {
        self.modify(|routing| {
            routing.add_rule(rule.clone());
            Ok(rule)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Routing {
        serde_json::from_value(json!({
            "domainStrategy": "AsIs",
            "rules": [
                {"type": "field", "inboundTag": ["api"], "outboundTag": "api"},
                {"type": "field", "outboundTag": "blocked", "ip": ["geoip:private"]},
                {"type": "field", "inboundTag": ["in-1", "in-2"], "outboundTag": "proxy", "port": 443},
                {"type": "field", "inboundTag": "in-1", "outboundTag": "proxy", "ruleTag": "second"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_rule_key_matching() {
        let routing = sample();
        let key = RuleKey::new(["in-1"], "proxy");
        let rule = routing.get_rule(&key).unwrap();
        assert_eq!(rule.port.as_deref(), Some("443"));

        // 无入站 tag 的规则匹配任意集合
        assert!(routing.has_rule(&RuleKey::new(["anything"], "blocked")));
        assert!(!routing.has_rule(&RuleKey::new(["in-3"], "proxy")));
        assert!(!routing.has_rule(&RuleKey::new(Vec::<String>::new(), "direct")));
    }

    #[test]
    fn test_update_and_delete_first_match() {
        let mut routing = sample();
        let key = RuleKey::new(["in-1"], "proxy");
        let replacement = Rule::new()
            .inbound_tag(["in-1"])
            .outbound_tag("proxy")
            .network("udp");
        assert!(routing.update_rule(&key, replacement));
        assert_eq!(routing.rules[2].network.as_deref(), Some("udp"));
        assert_eq!(routing.rules[3].extra["ruleTag"], "second");

        assert!(routing.delete_rule(&key));
        assert_eq!(routing.rules.len(), 3);
        assert_eq!(routing.rules[2].extra["ruleTag"], "second");
        assert!(!routing.delete_rule(&RuleKey::new(["x"], "none")));
    }

    #[test]
    fn test_rule_builder_wire_shape() {
        let rule = Rule::new()
            .domain(["geosite:category-ads-all"])
            .outbound_tag("blocked")
            .source_port("1000-2000");
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "field",
                "outboundTag": "blocked",
                "domain": ["geosite:category-ads-all"],
                "sourcePort": "1000-2000"
            })
        );
    }

    #[test]
    fn test_empty_balancers_omitted() {
        let mut routing = Routing::default();
        assert_eq!(serde_json::to_value(&routing).unwrap(), json!({"rules": []}));
        routing.add_balancer(Balancer::new("b1", ["proxy-"]));
        assert_eq!(routing.get_balancer("b1").unwrap().selector, vec!["proxy-"]);
        assert!(routing.delete_balancer("b1"));
        assert!(routing.balancers.is_empty());
    }
}
