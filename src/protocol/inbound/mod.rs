//! 入站协议配置
//!
//! VMess / VLESS / Trojan / Shadowsocks 携带 `streamSettings` 与 `sniffing`,
//! SOCKS / HTTP / dokodemo-door 只有 `settings`。面板上存在但未建模的协议
//! 以 [`OtherInbound`] 原样保留。

mod dokodemo;
mod http;
mod shadowsocks;
mod socks;
mod trojan;
mod vless;
mod vmess;

pub use dokodemo::DokodemoSettings;
pub use http::HttpInboundSettings;
pub use shadowsocks::{generate_password as shadowsocks_password, ShadowsocksSettings};
pub use socks::SocksSettings;
pub use trojan::TrojanSettings;
pub use vless::VlessSettings;
pub use vmess::VmessSettings;

pub mod method {
    pub use super::shadowsocks::{
        AES_128_GCM, AES_256_GCM, BLAKE3_AES_128_GCM, BLAKE3_AES_256_GCM,
        BLAKE3_CHACHA20_POLY1305, CHACHA20_POLY1305, XCHACHA20_POLY1305,
    };
}

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::client::{AccountRoster, Client, ClientOptions, ClientRoster, Roster};
use crate::protocol::{Protocol, Sniffing};
use crate::transport::StreamSettings;
use crate::utils::crypto::random_port;
use crate::utils::error::{Result, XuiError};

/// 带流设置的入站 (VMess / VLESS / Trojan / Shadowsocks)
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInbound<S> {
    pub listen: String,
    pub port: u16,
    pub settings: S,
    pub stream_settings: StreamSettings,
    pub sniffing: Sniffing,
}

impl<S> StreamInbound<S> {
    /// 监听所有地址, tcp / 无安全层, 默认嗅探
    pub fn new(port: u16, settings: S) -> Self {
        Self {
            listen: String::new(),
            port,
            settings,
            stream_settings: StreamSettings::default(),
            sniffing: Sniffing::default(),
        }
    }

    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    pub fn with_stream(mut self, stream_settings: StreamSettings) -> Self {
        self.stream_settings = stream_settings;
        self
    }

    pub fn with_sniffing(mut self, sniffing: Sniffing) -> Self {
        self.sniffing = sniffing;
        self
    }
}

impl<S: DeserializeOwned> StreamInbound<S> {
    fn from_wire(wire: InboundWire) -> Result<Self> {
        Ok(Self {
            listen: wire.listen,
            port: wire.port,
            settings: serde_json::from_value(wire.settings)?,
            stream_settings: match wire.stream_settings {
                Some(v) => serde_json::from_value(v)?,
                None => StreamSettings::default(),
            },
            sniffing: match wire.sniffing {
                Some(v) => serde_json::from_value(v)?,
                None => Sniffing::default(),
            },
        })
    }
}

impl<S: Serialize> StreamInbound<S> {
    fn to_wire(&self, protocol: Protocol) -> Result<InboundWire> {
        Ok(InboundWire {
            protocol,
            listen: self.listen.clone(),
            port: self.port,
            settings: serde_json::to_value(&self.settings)?,
            stream_settings: Some(serde_json::to_value(&self.stream_settings)?),
            sniffing: Some(serde_json::to_value(&self.sniffing)?),
        })
    }
}

/// 无流设置的入站 (SOCKS / HTTP / dokodemo-door)
#[derive(Debug, Clone, PartialEq)]
pub struct PlainInbound<S> {
    pub listen: String,
    pub port: u16,
    pub settings: S,
}

impl<S> PlainInbound<S> {
    pub fn new(port: u16, settings: S) -> Self {
        Self {
            listen: String::new(),
            port,
            settings,
        }
    }

    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }
}

impl<S: DeserializeOwned> PlainInbound<S> {
    fn from_wire(wire: InboundWire) -> Result<Self> {
        Ok(Self {
            listen: wire.listen,
            port: wire.port,
            settings: serde_json::from_value(wire.settings)?,
        })
    }
}

impl<S: Serialize> PlainInbound<S> {
    fn to_wire(&self, protocol: Protocol) -> Result<InboundWire> {
        Ok(InboundWire {
            protocol,
            listen: self.listen.clone(),
            port: self.port,
            settings: serde_json::to_value(&self.settings)?,
            stream_settings: None,
            sniffing: None,
        })
    }
}

/// 未建模协议的入站, 各 JSON 块原样保留
#[derive(Debug, Clone, PartialEq)]
pub struct OtherInbound {
    pub protocol: String,
    pub listen: String,
    pub port: u16,
    pub settings: Value,
    pub stream_settings: Option<Value>,
    pub sniffing: Option<Value>,
}

/// 入站在线上的组成部分 (已从 JSON 字符串解码)
#[derive(Debug, Clone, PartialEq)]
pub struct InboundWire {
    pub protocol: Protocol,
    pub listen: String,
    pub port: u16,
    pub settings: Value,
    pub stream_settings: Option<Value>,
    pub sniffing: Option<Value>,
}

/// 入站协议配置; 协议由变体决定, 设置类型与协议不会错配
#[derive(Debug, Clone, PartialEq)]
pub enum InboundConfig {
    Vmess(StreamInbound<VmessSettings>),
    Vless(StreamInbound<VlessSettings>),
    Trojan(StreamInbound<TrojanSettings>),
    Shadowsocks(StreamInbound<ShadowsocksSettings>),
    Socks(PlainInbound<SocksSettings>),
    Http(PlainInbound<HttpInboundSettings>),
    DokodemoDoor(PlainInbound<DokodemoSettings>),
    Other(OtherInbound),
}

impl InboundConfig {
    pub fn protocol(&self) -> Protocol {
        match self {
            InboundConfig::Vmess(_) => Protocol::Vmess,
            InboundConfig::Vless(_) => Protocol::Vless,
            InboundConfig::Trojan(_) => Protocol::Trojan,
            InboundConfig::Shadowsocks(_) => Protocol::Shadowsocks,
            InboundConfig::Socks(_) => Protocol::Socks,
            InboundConfig::Http(_) => Protocol::Http,
            InboundConfig::DokodemoDoor(_) => Protocol::DokodemoDoor,
            InboundConfig::Other(o) => Protocol::from(o.protocol.clone()),
        }
    }

    pub fn listen(&self) -> &str {
        match self {
            InboundConfig::Vmess(i) => &i.listen,
            InboundConfig::Vless(i) => &i.listen,
            InboundConfig::Trojan(i) => &i.listen,
            InboundConfig::Shadowsocks(i) => &i.listen,
            InboundConfig::Socks(i) => &i.listen,
            InboundConfig::Http(i) => &i.listen,
            InboundConfig::DokodemoDoor(i) => &i.listen,
            InboundConfig::Other(i) => &i.listen,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            InboundConfig::Vmess(i) => i.port,
            InboundConfig::Vless(i) => i.port,
            InboundConfig::Trojan(i) => i.port,
            InboundConfig::Shadowsocks(i) => i.port,
            InboundConfig::Socks(i) => i.port,
            InboundConfig::Http(i) => i.port,
            InboundConfig::DokodemoDoor(i) => i.port,
            InboundConfig::Other(i) => i.port,
        }
    }

    pub fn stream_settings(&self) -> Option<&StreamSettings> {
        match self {
            InboundConfig::Vmess(i) => Some(&i.stream_settings),
            InboundConfig::Vless(i) => Some(&i.stream_settings),
            InboundConfig::Trojan(i) => Some(&i.stream_settings),
            InboundConfig::Shadowsocks(i) => Some(&i.stream_settings),
            _ => None,
        }
    }

    /// 多用户协议的客户端列表
    pub fn clients(&self) -> Option<&[Client]> {
        match self {
            InboundConfig::Vmess(i) => Some(i.settings.clients()),
            InboundConfig::Vless(i) => Some(i.settings.clients()),
            InboundConfig::Trojan(i) => Some(i.settings.clients()),
            InboundConfig::Shadowsocks(i) => Some(i.settings.clients()),
            _ => None,
        }
    }

    /// 按协议的定位字段查找客户端
    pub fn find_client(&self, key: &str) -> Option<&Client> {
        match self {
            InboundConfig::Vmess(i) => i.settings.get_client(key),
            InboundConfig::Vless(i) => i.settings.get_client(key),
            InboundConfig::Trojan(i) => i.settings.get_client(key),
            InboundConfig::Shadowsocks(i) => i.settings.get_client(key),
            _ => None,
        }
    }

    /// 客户端在本协议下的定位值
    pub fn client_key<'a>(&self, client: &'a Client) -> Option<&'a str> {
        match self {
            InboundConfig::Vmess(_) => VmessSettings::key_of(client),
            InboundConfig::Vless(_) => VlessSettings::key_of(client),
            InboundConfig::Trojan(_) => TrojanSettings::key_of(client),
            InboundConfig::Shadowsocks(_) => ShadowsocksSettings::key_of(client),
            _ => None,
        }
    }

    /// 按本协议的默认值补全新客户端
    pub fn build_client(&self, options: ClientOptions) -> Result<Client> {
        match self {
            InboundConfig::Vmess(i) => Ok(i.settings.build_client(options)),
            InboundConfig::Vless(i) => Ok(i.settings.build_client(options)),
            InboundConfig::Trojan(i) => Ok(i.settings.build_client(options)),
            InboundConfig::Shadowsocks(i) => Ok(i.settings.build_client(options)),
            other => Err(XuiError::validation(format!(
                "{} 入站没有客户端列表",
                other.protocol()
            ))),
        }
    }

    pub fn to_wire(&self) -> Result<InboundWire> {
        let protocol = self.protocol();
        match self {
            InboundConfig::Vmess(i) => i.to_wire(protocol),
            InboundConfig::Vless(i) => i.to_wire(protocol),
            InboundConfig::Trojan(i) => i.to_wire(protocol),
            InboundConfig::Shadowsocks(i) => i.to_wire(protocol),
            InboundConfig::Socks(i) => i.to_wire(protocol),
            InboundConfig::Http(i) => i.to_wire(protocol),
            InboundConfig::DokodemoDoor(i) => i.to_wire(protocol),
            InboundConfig::Other(i) => Ok(InboundWire {
                protocol,
                listen: i.listen.clone(),
                port: i.port,
                settings: i.settings.clone(),
                stream_settings: i.stream_settings.clone(),
                sniffing: i.sniffing.clone(),
            }),
        }
    }

    pub fn from_wire(wire: InboundWire) -> Result<Self> {
        let protocol = wire.protocol.clone();
        Ok(match protocol {
            Protocol::Vmess => InboundConfig::Vmess(StreamInbound::from_wire(wire)?),
            Protocol::Vless => InboundConfig::Vless(StreamInbound::from_wire(wire)?),
            Protocol::Trojan => InboundConfig::Trojan(StreamInbound::from_wire(wire)?),
            Protocol::Shadowsocks => InboundConfig::Shadowsocks(StreamInbound::from_wire(wire)?),
            Protocol::Socks => InboundConfig::Socks(PlainInbound::from_wire(wire)?),
            Protocol::Http => InboundConfig::Http(PlainInbound::from_wire(wire)?),
            Protocol::DokodemoDoor => InboundConfig::DokodemoDoor(PlainInbound::from_wire(wire)?),
            other => InboundConfig::Other(OtherInbound {
                protocol: other.as_str().to_string(),
                listen: wire.listen,
                port: wire.port,
                settings: wire.settings,
                stream_settings: wire.stream_settings,
                sniffing: wire.sniffing,
            }),
        })
    }

    /// 生成可直接添加的默认配置: 随机端口, 一个随机客户端 / 账户
    ///
    /// dokodemo-door 需要明确的转发目标, 不能生成。
    pub fn generate(protocol: &Protocol) -> Result<Self> {
        let port = random_port();
        Ok(match protocol {
            Protocol::Vmess => {
                let mut settings = VmessSettings::default();
                settings.add_client(ClientOptions::new());
                InboundConfig::Vmess(StreamInbound::new(port, settings))
            }
            Protocol::Vless => {
                let mut settings = VlessSettings::default();
                settings.add_client(ClientOptions::new());
                InboundConfig::Vless(StreamInbound::new(port, settings))
            }
            Protocol::Trojan => {
                let mut settings = TrojanSettings::default();
                settings.add_client(ClientOptions::new());
                InboundConfig::Trojan(StreamInbound::new(port, settings))
            }
            Protocol::Shadowsocks => {
                let mut settings = ShadowsocksSettings::default();
                settings.add_client(ClientOptions::new());
                InboundConfig::Shadowsocks(StreamInbound::new(port, settings))
            }
            Protocol::Socks => {
                let mut settings = SocksSettings::default();
                settings.add_account(None, None);
                InboundConfig::Socks(PlainInbound::new(port, settings))
            }
            Protocol::Http => {
                let mut settings = HttpInboundSettings::default();
                settings.add_account(None, None);
                InboundConfig::Http(PlainInbound::new(port, settings))
            }
            Protocol::DokodemoDoor => {
                return Err(XuiError::validation(
                    "dokodemo-door 需要指定目标地址与端口",
                ))
            }
            other => {
                return Err(XuiError::validation(format!(
                    "不支持生成 {} 入站",
                    other
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        DomainSocketSettings, GrpcSettings, HttpSettings, KcpSettings, QuicSettings,
        RealitySettings, SecuritySettings, TcpSettings, TlsSettings, TransportSettings,
        WsSettings,
    };
    use serde_json::json;

    fn round_trip(config: &InboundConfig) -> InboundConfig {
        let wire = config.to_wire().unwrap();
        // 线上为 JSON 字符串
        let settings = serde_json::to_string(&wire.settings).unwrap();
        let stream = wire
            .stream_settings
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap());
        let sniffing = wire.sniffing.as_ref().map(|v| serde_json::to_string(v).unwrap());

        InboundConfig::from_wire(InboundWire {
            protocol: wire.protocol.clone(),
            listen: wire.listen.clone(),
            port: wire.port,
            settings: serde_json::from_str(&settings).unwrap(),
            stream_settings: stream.map(|s| serde_json::from_str(&s).unwrap()),
            sniffing: sniffing.map(|s| serde_json::from_str(&s).unwrap()),
        })
        .unwrap()
    }

    fn transports() -> Vec<TransportSettings> {
        vec![
            TcpSettings::default().into(),
            KcpSettings::default().into(),
            WsSettings::new("/ws").into(),
            HttpSettings::default().into(),
            QuicSettings::default().into(),
            DomainSocketSettings::new("/run/xray.sock").into(),
            GrpcSettings::default().into(),
        ]
    }

    fn securities() -> Vec<SecuritySettings> {
        vec![
            SecuritySettings::None,
            TlsSettings::new("example.com").into(),
            RealitySettings::generate().into(),
        ]
    }

    #[test]
    fn test_generated_configs_round_trip() {
        let protocols = [
            Protocol::Vmess,
            Protocol::Vless,
            Protocol::Trojan,
            Protocol::Shadowsocks,
            Protocol::Socks,
            Protocol::Http,
        ];
        for protocol in &protocols {
            let config = InboundConfig::generate(protocol).unwrap();
            assert_eq!(&config.protocol(), protocol);
            assert_eq!(round_trip(&config), config, "{}", protocol);
        }
    }

    #[test]
    fn test_every_stream_combination_round_trips() {
        for transport in transports() {
            for security in securities() {
                let mut config = InboundConfig::generate(&Protocol::Vless).unwrap();
                if let InboundConfig::Vless(inbound) = &mut config {
                    inbound.stream_settings =
                        StreamSettings::new(transport.clone(), security.clone());
                }
                assert_eq!(round_trip(&config), config);
            }
        }
    }

    #[test]
    fn test_dokodemo_round_trip() {
        let config = InboundConfig::DokodemoDoor(
            PlainInbound::new(5353, DokodemoSettings::new("1.1.1.1", 53)).with_listen("127.0.0.1"),
        );
        assert_eq!(round_trip(&config), config);
        assert!(InboundConfig::generate(&Protocol::DokodemoDoor).is_err());
    }

    #[test]
    fn test_plain_inbound_has_no_stream() {
        let config = InboundConfig::generate(&Protocol::Socks).unwrap();
        let wire = config.to_wire().unwrap();
        assert!(wire.stream_settings.is_none());
        assert!(wire.sniffing.is_none());
        assert_eq!(wire.settings["auth"], "password");
        assert_eq!(wire.settings["accounts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_protocol_kept_verbatim() {
        let settings = json!({"secretKey": "abc", "peers": [{"publicKey": "x"}]});
        let config = InboundConfig::from_wire(InboundWire {
            protocol: Protocol::from("wireguard"),
            listen: String::new(),
            port: 51820,
            settings: settings.clone(),
            stream_settings: None,
            sniffing: None,
        })
        .unwrap();
        assert_eq!(config.protocol().as_str(), "wireguard");
        assert_eq!(config.to_wire().unwrap().settings, settings);
    }

    #[test]
    fn test_client_defaults_after_add() {
        let mut settings = VlessSettings::default();
        let id = settings.add_client(
            ClientOptions::new()
                .email("alice")
                .total_traffic(5u64 * 1024 * 1024 * 1024),
        );
        let client = settings.get_client(&id).unwrap();
        assert_eq!(client.email, "alice");
        assert_eq!(client.total_traffic, 5 * 1024 * 1024 * 1024);
        assert_eq!(client.expiry_time, 0);
        assert_eq!(client.limit_ip, 0);
        assert!(client.enable);
        assert_eq!(client.flow.as_deref(), Some(""));
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_update_client_touches_only_given_field() {
        let mut settings = TrojanSettings::default();
        let key = settings.add_client(ClientOptions::new().email("t1"));
        settings.add_client(ClientOptions::new().email("t2"));
        let before = serde_json::to_value(settings.get_client(&key).unwrap()).unwrap();

        assert!(settings.update_client(&key, &ClientOptions::new().limit_ip(3u32)));
        let after = serde_json::to_value(settings.get_client(&key).unwrap()).unwrap();

        let mut expected = before.clone();
        expected["limitIp"] = json!(3);
        assert_eq!(after, expected);
        assert!(!settings.update_client("missing", &ClientOptions::new().limit_ip(1u32)));
    }

    #[test]
    fn test_update_stock_client_keeps_other_fields() {
        let stock = json!({
            "id": "b831381d-6324-4d53-ad4f-8cda48b30811",
            "email": "alice",
            "limitIp": 0,
            "totalGB": 0,
            "expiryTime": 0,
            "enable": true,
            "tgId": "",
            "subId": "s1",
            "reset": 0
        });
        let mut settings: VmessSettings =
            serde_json::from_value(json!({"clients": [stock.clone()]})).unwrap();

        assert!(settings.update_client("alice", &ClientOptions::new().limit_ip(3u32)));
        let after = serde_json::to_value(&settings.clients()[0]).unwrap();

        let mut expected = stock;
        expected["limitIp"] = json!(3);
        assert_eq!(after, expected);
    }

    #[test]
    fn test_remove_client_compacts() {
        let mut settings = VmessSettings::default();
        let a = settings.add_client(ClientOptions::new());
        let b = settings.add_client(ClientOptions::new());
        let c = settings.add_client(ClientOptions::new());

        assert!(settings.remove_client(&b));
        assert!(!settings.has_client(&b));
        assert_eq!(settings.clients().len(), 2);
        assert_eq!(settings.clients()[0].id.as_deref(), Some(a.as_str()));
        assert_eq!(settings.clients()[1].id.as_deref(), Some(c.as_str()));
        assert!(!settings.remove_client(&b));
    }

    #[test]
    fn test_first_match_wins_on_duplicate_email() {
        let mut settings = VmessSettings::default();
        let first = settings.add_client(ClientOptions::new().email("dup"));
        settings.add_client(ClientOptions::new().email("dup"));
        let found = settings.client_by_email("dup").unwrap();
        assert_eq!(found.id.as_deref(), Some(first.as_str()));
    }
}
