//! 出站协议配置
//!
//! 出站没有独立的面板接口, 只存在于 Xray 配置文档的 `outbounds` 数组中,
//! 以 `tag` 区分。

mod direct;
mod servers;
mod vnext;

pub use direct::{BlackholeResponse, BlackholeSettings, DnsOutboundSettings, FreedomSettings};
pub use servers::{
    ProxyServer, ProxyServers, ShadowsocksOutboundSettings, ShadowsocksServer,
    TrojanOutboundSettings, TrojanServer,
};
pub use vnext::{VlessUser, VmessUser, VnextServer, VnextSettings, VnextUser};

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::protocol::Protocol;
use crate::transport::StreamSettings;
use crate::utils::error::{Result, XuiError};

/// 带可选流设置的代理出站
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOutbound<S> {
    pub settings: S,
    pub stream_settings: Option<StreamSettings>,
}

impl<S> ProxyOutbound<S> {
    pub fn new(settings: S) -> Self {
        Self {
            settings,
            stream_settings: None,
        }
    }

    pub fn with_stream(mut self, stream_settings: StreamSettings) -> Self {
        self.stream_settings = Some(stream_settings);
        self
    }
}

/// 出站协议配置
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundConfig {
    Vmess(ProxyOutbound<VnextSettings<VmessUser>>),
    Vless(ProxyOutbound<VnextSettings<VlessUser>>),
    Trojan(ProxyOutbound<TrojanOutboundSettings>),
    Shadowsocks(ProxyOutbound<ShadowsocksOutboundSettings>),
    Socks(ProxyOutbound<ProxyServers>),
    Http(ProxyOutbound<ProxyServers>),
    Freedom(FreedomSettings),
    Dns(DnsOutboundSettings),
    Blackhole(BlackholeSettings),
    /// 未建模的协议 (wireguard / loopback ...), 原样保留
    Other {
        protocol: String,
        settings: Option<Value>,
        stream_settings: Option<Value>,
    },
}

fn parse<S: DeserializeOwned>(settings: Option<Value>) -> Result<S> {
    Ok(serde_json::from_value(
        settings.unwrap_or_else(|| Value::Object(Map::new())),
    )?)
}

fn parse_proxy<S: DeserializeOwned>(
    settings: Option<Value>,
    stream_settings: Option<Value>,
) -> Result<ProxyOutbound<S>> {
    Ok(ProxyOutbound {
        settings: parse(settings)?,
        stream_settings: stream_settings.map(serde_json::from_value).transpose()?,
    })
}

fn proxy_parts<S: Serialize>(p: &ProxyOutbound<S>) -> Result<(Option<Value>, Option<Value>)> {
    Ok((
        Some(serde_json::to_value(&p.settings)?),
        p.stream_settings
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?,
    ))
}

impl OutboundConfig {
    pub fn protocol(&self) -> Protocol {
        match self {
            OutboundConfig::Vmess(_) => Protocol::Vmess,
            OutboundConfig::Vless(_) => Protocol::Vless,
            OutboundConfig::Trojan(_) => Protocol::Trojan,
            OutboundConfig::Shadowsocks(_) => Protocol::Shadowsocks,
            OutboundConfig::Socks(_) => Protocol::Socks,
            OutboundConfig::Http(_) => Protocol::Http,
            OutboundConfig::Freedom(_) => Protocol::Freedom,
            OutboundConfig::Dns(_) => Protocol::Dns,
            OutboundConfig::Blackhole(_) => Protocol::Blackhole,
            OutboundConfig::Other { protocol, .. } => Protocol::from(protocol.clone()),
        }
    }

    pub fn stream_settings(&self) -> Option<&StreamSettings> {
        match self {
            OutboundConfig::Vmess(p) => p.stream_settings.as_ref(),
            OutboundConfig::Vless(p) => p.stream_settings.as_ref(),
            OutboundConfig::Trojan(p) => p.stream_settings.as_ref(),
            OutboundConfig::Shadowsocks(p) => p.stream_settings.as_ref(),
            OutboundConfig::Socks(p) => p.stream_settings.as_ref(),
            OutboundConfig::Http(p) => p.stream_settings.as_ref(),
            _ => None,
        }
    }

    /// 由 `protocol` / `settings` / `streamSettings` 三部分解码
    pub fn from_parts(
        protocol: &Protocol,
        settings: Option<Value>,
        stream_settings: Option<Value>,
    ) -> Result<Self> {
        Ok(match protocol {
            Protocol::Vmess => OutboundConfig::Vmess(parse_proxy(settings, stream_settings)?),
            Protocol::Vless => OutboundConfig::Vless(parse_proxy(settings, stream_settings)?),
            Protocol::Trojan => OutboundConfig::Trojan(parse_proxy(settings, stream_settings)?),
            Protocol::Shadowsocks => {
                OutboundConfig::Shadowsocks(parse_proxy(settings, stream_settings)?)
            }
            Protocol::Socks => OutboundConfig::Socks(parse_proxy(settings, stream_settings)?),
            Protocol::Http => OutboundConfig::Http(parse_proxy(settings, stream_settings)?),
            Protocol::Freedom => OutboundConfig::Freedom(parse(settings)?),
            Protocol::Dns => OutboundConfig::Dns(parse(settings)?),
            Protocol::Blackhole => OutboundConfig::Blackhole(parse(settings)?),
            other => OutboundConfig::Other {
                protocol: other.as_str().to_string(),
                settings,
                stream_settings,
            },
        })
    }

    /// 编码为 (`settings`, `streamSettings`)
    pub fn to_parts(&self) -> Result<(Option<Value>, Option<Value>)> {
        match self {
            OutboundConfig::Vmess(p) => proxy_parts(p),
            OutboundConfig::Vless(p) => proxy_parts(p),
            OutboundConfig::Trojan(p) => proxy_parts(p),
            OutboundConfig::Shadowsocks(p) => proxy_parts(p),
            OutboundConfig::Socks(p) => proxy_parts(p),
            OutboundConfig::Http(p) => proxy_parts(p),
            OutboundConfig::Freedom(s) => Ok((Some(serde_json::to_value(s)?), None)),
            OutboundConfig::Dns(s) => Ok((Some(serde_json::to_value(s)?), None)),
            OutboundConfig::Blackhole(s) => Ok((Some(serde_json::to_value(s)?), None)),
            OutboundConfig::Other {
                settings,
                stream_settings,
                ..
            } => Ok((settings.clone(), stream_settings.clone())),
        }
    }
}

/// `outbounds` 数组中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub tag: String,
    pub send_through: Option<String>,
    pub config: OutboundConfig,
    pub proxy_settings: Option<Value>,
    pub mux: Option<Value>,
    /// 未建模的键 (targetStrategy 等)
    pub extra: Map<String, Value>,
}

impl Outbound {
    pub fn new(tag: impl Into<String>, config: OutboundConfig) -> Self {
        Self {
            tag: tag.into(),
            send_through: None,
            config,
            proxy_settings: None,
            mux: None,
            extra: Map::new(),
        }
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(XuiError::validation(format!(
                    "出站条目必须是对象: {}",
                    other
                )))
            }
        };

        let protocol = match map.remove("protocol") {
            Some(Value::String(p)) => Protocol::from(p),
            _ => return Err(XuiError::validation("出站条目缺少 protocol")),
        };
        let tag = match map.remove("tag") {
            Some(Value::String(t)) => t,
            _ => String::new(),
        };
        let send_through = match map.remove("sendThrough") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let settings = map.remove("settings").filter(|v| !v.is_null());
        let stream_settings = map.remove("streamSettings").filter(|v| !v.is_null());
        let proxy_settings = map.remove("proxySettings").filter(|v| !v.is_null());
        let mux = map.remove("mux").filter(|v| !v.is_null());

        Ok(Self {
            tag,
            send_through,
            config: OutboundConfig::from_parts(&protocol, settings, stream_settings)?,
            proxy_settings,
            mux,
            extra: map,
        })
    }

    pub fn to_value(&self) -> Result<Value> {
        let (settings, stream_settings) = self.config.to_parts()?;
        let mut map = Map::new();
        map.insert("tag".into(), Value::String(self.tag.clone()));
        map.insert(
            "protocol".into(),
            Value::String(self.config.protocol().as_str().to_string()),
        );
        if let Some(s) = settings {
            map.insert("settings".into(), s);
        }
        if let Some(s) = stream_settings {
            map.insert("streamSettings".into(), s);
        }
        if let Some(s) = &self.send_through {
            map.insert("sendThrough".into(), Value::String(s.clone()));
        }
        if let Some(p) = &self.proxy_settings {
            map.insert("proxySettings".into(), p.clone());
        }
        if let Some(m) = &self.mux {
            map.insert("mux".into(), m.clone());
        }
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Ok(Value::Object(map))
    }
}

impl Serialize for Outbound {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{RealitySettings, TcpSettings};
    use serde_json::json;

    #[test]
    fn test_parse_default_outbounds() {
        let direct = Outbound::from_value(json!({
            "tag": "direct",
            "protocol": "freedom",
            "settings": {"domainStrategy": "UseIP"}
        }))
        .unwrap();
        assert_eq!(direct.config.protocol(), Protocol::Freedom);
        match &direct.config {
            OutboundConfig::Freedom(s) => assert_eq!(s.domain_strategy.as_deref(), Some("UseIP")),
            other => panic!("unexpected {:?}", other),
        }

        let blocked = Outbound::from_value(json!({
            "tag": "blocked",
            "protocol": "blackhole",
            "settings": {}
        }))
        .unwrap();
        assert_eq!(
            blocked.to_value().unwrap(),
            json!({"tag": "blocked", "protocol": "blackhole", "settings": {}})
        );
    }

    #[test]
    fn test_vless_reality_outbound_round_trip() {
        let stream = crate::transport::StreamSettings::new(
            TcpSettings::default(),
            RealitySettings::client("www.microsoft.com", "pub", "ab12"),
        );
        let mut outbound = Outbound::new(
            "proxy",
            OutboundConfig::Vless(
                ProxyOutbound::new(VnextSettings::new(
                    "example.com",
                    443,
                    vec![VlessUser::generate().with_flow("xtls-rprx-vision")],
                ))
                .with_stream(stream),
            ),
        );
        outbound.mux = Some(json!({"enabled": false}));

        let value = outbound.to_value().unwrap();
        assert_eq!(value["streamSettings"]["realitySettings"]["publicKey"], "pub");
        assert_eq!(Outbound::from_value(value).unwrap(), outbound);
    }

    #[test]
    fn test_unknown_protocol_and_keys_survive() {
        let raw = json!({
            "tag": "wg",
            "protocol": "wireguard",
            "settings": {"secretKey": "k", "peers": []},
            "targetStrategy": "ForceIPv4"
        });
        let outbound = Outbound::from_value(raw.clone()).unwrap();
        assert_eq!(outbound.extra["targetStrategy"], "ForceIPv4");
        assert_eq!(outbound.to_value().unwrap(), raw);
    }

    #[test]
    fn test_missing_protocol_is_validation_error() {
        let err = Outbound::from_value(json!({"tag": "x"})).unwrap_err();
        assert_eq!(err.code(), 400);
    }
}
