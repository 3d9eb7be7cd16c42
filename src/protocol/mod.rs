/// 以 `clients` 字段实现 Roster, 定位键由表达式给出
macro_rules! client_roster {
    ($ty:ty, $entry:ident => $key:expr) => {
        impl $crate::protocol::client::Roster for $ty {
            type Entry = $crate::protocol::client::Client;

            fn entries(&self) -> &[Self::Entry] {
                &self.clients
            }

            fn entries_mut(&mut self) -> &mut Vec<Self::Entry> {
                &mut self.clients
            }

            fn key_of($entry: &Self::Entry) -> Option<&str> {
                $key
            }
        }
    };
    ($ty:ty, $entry:ident => $key:expr, or $alt:ident) => {
        impl $crate::protocol::client::Roster for $ty {
            type Entry = $crate::protocol::client::Client;

            fn entries(&self) -> &[Self::Entry] {
                &self.clients
            }

            fn entries_mut(&mut self) -> &mut Vec<Self::Entry> {
                &mut self.clients
            }

            fn key_of($entry: &Self::Entry) -> Option<&str> {
                $key
            }

            fn matches(entry: &Self::Entry, key: &str) -> bool {
                Self::key_of(entry) == Some(key) || entry.$alt == key
            }
        }
    };
}

/// 以 `user` 为键的账户列表
macro_rules! account_roster {
    ($ty:ty, $field:ident) => {
        impl $crate::protocol::client::Roster for $ty {
            type Entry = $crate::protocol::client::Account;

            fn entries(&self) -> &[Self::Entry] {
                &self.$field
            }

            fn entries_mut(&mut self) -> &mut Vec<Self::Entry> {
                &mut self.$field
            }

            fn key_of(entry: &Self::Entry) -> Option<&str> {
                Some(&entry.user)
            }
        }
    };
}

pub mod client;
pub mod inbound;
pub mod outbound;
pub mod sniffing;

pub use client::{Account, AccountRoster, Client, ClientOptions, ClientRoster, Roster, TgId};
pub use inbound::{InboundConfig, OtherInbound, PlainInbound, StreamInbound};
pub use outbound::{Outbound, OutboundConfig};
pub use sniffing::Sniffing;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 协议名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Socks,
    Http,
    DokodemoDoor,
    Freedom,
    Dns,
    Blackhole,
    /// 未建模的协议 (wireguard / loopback ...), 原样保留
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Socks => "socks",
            Protocol::Http => "http",
            Protocol::DokodemoDoor => "dokodemo-door",
            Protocol::Freedom => "freedom",
            Protocol::Dns => "dns",
            Protocol::Blackhole => "blackhole",
            Protocol::Other(s) => s,
        }
    }

    /// 入站是否携带 streamSettings / sniffing
    pub fn has_stream(&self) -> bool {
        matches!(
            self,
            Protocol::Vmess | Protocol::Vless | Protocol::Trojan | Protocol::Shadowsocks
        )
    }
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        match s.as_str() {
            "vmess" => Protocol::Vmess,
            "vless" => Protocol::Vless,
            "trojan" => Protocol::Trojan,
            "shadowsocks" => Protocol::Shadowsocks,
            "socks" => Protocol::Socks,
            "http" => Protocol::Http,
            "dokodemo-door" => Protocol::DokodemoDoor,
            "freedom" => Protocol::Freedom,
            "dns" => Protocol::Dns,
            "blackhole" => Protocol::Blackhole,
            _ => Protocol::Other(s),
        }
    }
}

impl From<&str> for Protocol {
    fn from(s: &str) -> Self {
        Protocol::from(s.to_string())
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        p.as_str().to_string()
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Protocol::from(s))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!("dokodemo-door".parse::<Protocol>().unwrap(), Protocol::DokodemoDoor);
        assert_eq!(
            "wireguard".parse::<Protocol>().unwrap(),
            Protocol::Other("wireguard".into())
        );
        assert_eq!(serde_json::to_string(&Protocol::Vless).unwrap(), "\"vless\"");
        assert!(Protocol::Trojan.has_stream());
        assert!(!Protocol::Socks.has_stream());
    }
}
