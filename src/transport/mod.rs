mod network;
mod sockopt;
mod stream;
mod tls;

pub use network::{
    DomainSocketSettings, GrpcSettings, HeaderObject, HttpSettings, KcpSettings, QuicSettings,
    TcpSettings, WsSettings,
};
pub use sockopt::SockOpt;
pub use stream::{SecuritySettings, StreamSettings, TransportSettings};
pub use tls::{Certificate, RealityClientSettings, RealitySettings, TlsSettings};

use serde::{Deserialize, Serialize};
use std::fmt;

/// 传输方式 (`streamSettings.network`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Network {
    Tcp,
    Kcp,
    Ws,
    Http,
    Quic,
    DomainSocket,
    Grpc,
    /// 未建模的传输及别名 (httpupgrade / xhttp / raw ...), 原样写回
    Other(String),
}

impl Network {
    pub fn as_str(&self) -> &str {
        match self {
            Network::Tcp => "tcp",
            Network::Kcp => "kcp",
            Network::Ws => "ws",
            Network::Http => "http",
            Network::Quic => "quic",
            Network::DomainSocket => "domainsocket",
            Network::Grpc => "grpc",
            Network::Other(s) => s,
        }
    }
}

impl From<String> for Network {
    fn from(s: String) -> Self {
        match s.as_str() {
            "tcp" => Network::Tcp,
            "kcp" => Network::Kcp,
            "ws" => Network::Ws,
            "http" => Network::Http,
            "quic" => Network::Quic,
            "domainsocket" => Network::DomainSocket,
            "grpc" => Network::Grpc,
            _ => Network::Other(s),
        }
    }
}

impl From<Network> for String {
    fn from(n: Network) -> Self {
        n.as_str().to_string()
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 安全层 (`streamSettings.security`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Security {
    None,
    Tls,
    Reality,
    Other(String),
}

impl Security {
    pub fn as_str(&self) -> &str {
        match self {
            Security::None => "none",
            Security::Tls => "tls",
            Security::Reality => "reality",
            Security::Other(s) => s,
        }
    }
}

impl From<String> for Security {
    fn from(s: String) -> Self {
        match s.as_str() {
            "none" | "" => Security::None,
            "tls" => Security::Tls,
            "reality" => Security::Reality,
            _ => Security::Other(s),
        }
    }
}

impl From<Security> for String {
    fn from(s: Security) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        let n: Network = serde_json::from_str("\"domainsocket\"").unwrap();
        assert_eq!(n, Network::DomainSocket);
        let n: Network = serde_json::from_str("\"httpupgrade\"").unwrap();
        assert_eq!(n, Network::Other("httpupgrade".into()));
        for alias in ["raw", "websocket", "h2", "mkcp", "ds"] {
            let n: Network = serde_json::from_value(serde_json::json!(alias)).unwrap();
            assert_eq!(n.as_str(), alias);
            assert_eq!(serde_json::to_value(&n).unwrap(), alias);
        }
        assert_eq!(serde_json::to_string(&Network::Grpc).unwrap(), "\"grpc\"");
    }

    #[test]
    fn test_security_names() {
        let s: Security = serde_json::from_str("\"reality\"").unwrap();
        assert_eq!(s, Security::Reality);
        assert_eq!(Security::None.to_string(), "none");
    }
}
