use serde::{Deserialize, Serialize};

/// Socket 选项配置 (`streamSettings.sockopt`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SockOpt {
    /// SO_MARK (仅 Linux)
    #[serde(default)]
    pub mark: u32,
    /// TCP Fast Open - 减少握手延迟
    #[serde(rename = "tcpFastOpen", default)]
    pub tcp_fast_open: bool,
    /// 透明代理模式: off / redirect / tproxy
    #[serde(default = "default_tproxy")]
    pub tproxy: String,
    #[serde(rename = "domainStrategy", default = "default_domain_strategy")]
    pub domain_strategy: String,
    #[serde(rename = "dialerProxy", default)]
    pub dialer_proxy: String,
    /// 接受 Proxy Protocol (用于获取真实客户端 IP)
    #[serde(rename = "acceptProxyProtocol", default)]
    pub accept_proxy_protocol: bool,
    #[serde(rename = "tcpKeepAliveInterval", default)]
    pub tcp_keep_alive_interval: u32,
    #[serde(default)]
    pub tcpcongestion: String,
    #[serde(default)]
    pub interface: String,
    #[serde(rename = "tcpMptcp", default)]
    pub tcp_mptcp: bool,
    /// TCP No Delay (禁用 Nagle 算法)
    #[serde(rename = "tcpNoDelay", default)]
    pub tcp_no_delay: bool,
}

impl Default for SockOpt {
    fn default() -> Self {
        Self {
            mark: 0,
            tcp_fast_open: false,
            tproxy: default_tproxy(),
            domain_strategy: default_domain_strategy(),
            dialer_proxy: String::new(),
            accept_proxy_protocol: false,
            tcp_keep_alive_interval: 0,
            tcpcongestion: String::new(),
            interface: String::new(),
            tcp_mptcp: false,
            tcp_no_delay: false,
        }
    }
}

fn default_tproxy() -> String {
    "off".to_string()
}

fn default_domain_strategy() -> String {
    "AsIs".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sockopt_partial_block() {
        let opt: SockOpt = serde_json::from_str(r#"{"tcpFastOpen": true}"#).unwrap();
        assert!(opt.tcp_fast_open);
        assert_eq!(opt.tproxy, "off");
        assert_eq!(opt.domain_strategy, "AsIs");
    }
}
