use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::network::{
    DomainSocketSettings, GrpcSettings, HttpSettings, KcpSettings, QuicSettings, TcpSettings,
    WsSettings,
};
use super::sockopt::SockOpt;
use super::tls::{RealitySettings, TlsSettings};
use super::{Network, Security};

/// 未建模传输方式的设置键, 切换传输时一并清除
const UNMODELED_TRANSPORT_KEYS: &[&str] = &[
    "rawSettings",
    "httpupgradeSettings",
    "splithttpSettings",
    "xhttpSettings",
];

const UNMODELED_SECURITY_KEYS: &[&str] = &["xtlsSettings"];

/// 一种传输方式及其设置
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSettings {
    Tcp(TcpSettings),
    Kcp(KcpSettings),
    Ws(WsSettings),
    Http(HttpSettings),
    Quic(QuicSettings),
    DomainSocket(DomainSocketSettings),
    Grpc(GrpcSettings),
}

impl TransportSettings {
    pub fn network(&self) -> Network {
        match self {
            TransportSettings::Tcp(_) => Network::Tcp,
            TransportSettings::Kcp(_) => Network::Kcp,
            TransportSettings::Ws(_) => Network::Ws,
            TransportSettings::Http(_) => Network::Http,
            TransportSettings::Quic(_) => Network::Quic,
            TransportSettings::DomainSocket(_) => Network::DomainSocket,
            TransportSettings::Grpc(_) => Network::Grpc,
        }
    }
}

macro_rules! impl_from_transport {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TransportSettings {
                fn from(s: $ty) -> Self {
                    TransportSettings::$variant(s)
                }
            }
        )*
    };
}

impl_from_transport! {
    Tcp => TcpSettings,
    Kcp => KcpSettings,
    Ws => WsSettings,
    Http => HttpSettings,
    Quic => QuicSettings,
    DomainSocket => DomainSocketSettings,
    Grpc => GrpcSettings,
}

/// 一种安全层及其设置
#[derive(Debug, Clone, PartialEq)]
pub enum SecuritySettings {
    None,
    Tls(TlsSettings),
    Reality(RealitySettings),
}

impl SecuritySettings {
    pub fn security(&self) -> Security {
        match self {
            SecuritySettings::None => Security::None,
            SecuritySettings::Tls(_) => Security::Tls,
            SecuritySettings::Reality(_) => Security::Reality,
        }
    }
}

impl From<TlsSettings> for SecuritySettings {
    fn from(s: TlsSettings) -> Self {
        SecuritySettings::Tls(s)
    }
}

impl From<RealitySettings> for SecuritySettings {
    fn from(s: RealitySettings) -> Self {
        SecuritySettings::Reality(s)
    }
}

/// 流设置 (`streamSettings`)
///
/// 同一时刻只有一种传输设置块和一种安全设置块: `set_transport` / `set_security`
/// 会清除同一维度上的其他设置块。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_network")]
    network: Network,
    #[serde(default = "default_security")]
    security: Security,
    #[serde(rename = "externalProxy", default, skip_serializing_if = "Vec::is_empty")]
    pub external_proxy: Vec<Value>,

    #[serde(rename = "tcpSettings", skip_serializing_if = "Option::is_none", default)]
    tcp: Option<TcpSettings>,
    #[serde(rename = "kcpSettings", skip_serializing_if = "Option::is_none", default)]
    kcp: Option<KcpSettings>,
    #[serde(rename = "wsSettings", skip_serializing_if = "Option::is_none", default)]
    ws: Option<WsSettings>,
    #[serde(rename = "httpSettings", skip_serializing_if = "Option::is_none", default)]
    http: Option<HttpSettings>,
    #[serde(rename = "quicSettings", skip_serializing_if = "Option::is_none", default)]
    quic: Option<QuicSettings>,
    #[serde(rename = "dsSettings", skip_serializing_if = "Option::is_none", default)]
    ds: Option<DomainSocketSettings>,
    #[serde(rename = "grpcSettings", skip_serializing_if = "Option::is_none", default)]
    grpc: Option<GrpcSettings>,

    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none", default)]
    tls: Option<TlsSettings>,
    #[serde(rename = "realitySettings", skip_serializing_if = "Option::is_none", default)]
    reality: Option<RealitySettings>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sockopt: Option<SockOpt>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn default_network() -> Network {
    Network::Tcp
}

fn default_security() -> Security {
    Security::None
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::new(TcpSettings::default(), SecuritySettings::None)
    }
}

impl StreamSettings {
    pub fn new(transport: impl Into<TransportSettings>, security: impl Into<SecuritySettings>) -> Self {
        let mut stream = Self {
            network: Network::Tcp,
            security: Security::None,
            external_proxy: Vec::new(),
            tcp: None,
            kcp: None,
            ws: None,
            http: None,
            quic: None,
            ds: None,
            grpc: None,
            tls: None,
            reality: None,
            sockopt: None,
            extra: Map::new(),
        };
        stream.set_transport(transport);
        stream.set_security(security);
        stream
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn security(&self) -> &Security {
        &self.security
    }

    /// 切换传输方式, 清除其他传输设置块
    pub fn set_transport(&mut self, transport: impl Into<TransportSettings>) {
        let transport = transport.into();
        self.network = transport.network();
        self.tcp = None;
        self.kcp = None;
        self.ws = None;
        self.http = None;
        self.quic = None;
        self.ds = None;
        self.grpc = None;
        for key in UNMODELED_TRANSPORT_KEYS {
            self.extra.remove(*key);
        }

        match transport {
            TransportSettings::Tcp(s) => self.tcp = Some(s),
            TransportSettings::Kcp(s) => self.kcp = Some(s),
            TransportSettings::Ws(s) => self.ws = Some(s),
            TransportSettings::Http(s) => self.http = Some(s),
            TransportSettings::Quic(s) => self.quic = Some(s),
            TransportSettings::DomainSocket(s) => self.ds = Some(s),
            TransportSettings::Grpc(s) => self.grpc = Some(s),
        }
    }

    /// 切换安全层, 清除其他安全设置块
    pub fn set_security(&mut self, security: impl Into<SecuritySettings>) {
        let security = security.into();
        self.security = security.security();
        self.tls = None;
        self.reality = None;
        for key in UNMODELED_SECURITY_KEYS {
            self.extra.remove(*key);
        }

        match security {
            SecuritySettings::None => {}
            SecuritySettings::Tls(s) => self.tls = Some(s),
            SecuritySettings::Reality(s) => self.reality = Some(s),
        }
    }

    /// 当前传输设置 (对应块缺失或为未建模的传输时为 None)
    pub fn transport(&self) -> Option<TransportSettings> {
        match self.network {
            Network::Tcp => self.tcp.clone().map(TransportSettings::Tcp),
            Network::Kcp => self.kcp.clone().map(TransportSettings::Kcp),
            Network::Ws => self.ws.clone().map(TransportSettings::Ws),
            Network::Http => self.http.clone().map(TransportSettings::Http),
            Network::Quic => self.quic.clone().map(TransportSettings::Quic),
            Network::DomainSocket => self.ds.clone().map(TransportSettings::DomainSocket),
            Network::Grpc => self.grpc.clone().map(TransportSettings::Grpc),
            Network::Other(_) => None,
        }
    }

    pub fn tcp(&self) -> Option<&TcpSettings> {
        self.tcp.as_ref()
    }

    pub fn kcp(&self) -> Option<&KcpSettings> {
        self.kcp.as_ref()
    }

    pub fn ws(&self) -> Option<&WsSettings> {
        self.ws.as_ref()
    }

    pub fn http(&self) -> Option<&HttpSettings> {
        self.http.as_ref()
    }

    pub fn quic(&self) -> Option<&QuicSettings> {
        self.quic.as_ref()
    }

    pub fn domain_socket(&self) -> Option<&DomainSocketSettings> {
        self.ds.as_ref()
    }

    pub fn grpc(&self) -> Option<&GrpcSettings> {
        self.grpc.as_ref()
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        self.tls.as_ref()
    }

    pub fn reality(&self) -> Option<&RealitySettings> {
        self.reality.as_ref()
    }

    /// 未建模的键 (原样保留)
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}
