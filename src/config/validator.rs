use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use super::ClientConfig;
use crate::protocol::inbound::InboundConfig;
use crate::protocol::outbound::{OutboundConfig, VnextServer, VnextUser};
use crate::protocol::{Client, Outbound};
use crate::transport::{RealitySettings, Security, StreamSettings};
use crate::utils::error::{Result, XuiError};
use crate::xray::Rule;

pub struct Validator;

impl Validator {
    /// 验证连接配置
    pub fn validate(config: &ClientConfig) -> Result<()> {
        if config.host.trim().is_empty() {
            return Err(XuiError::validation("面板地址不能为空"));
        }
        if config.port == 0 {
            return Err(XuiError::validation("面板端口不能为 0"));
        }
        if config.timeout_secs == 0 {
            return Err(XuiError::validation("超时时间不能为 0"));
        }
        Ok(())
    }

    /// 上传前验证入站配置
    pub fn validate_inbound(config: &InboundConfig) -> Result<()> {
        let port = config.port();
        if port == 0 {
            return Err(XuiError::validation("入站端口不能为 0"));
        }

        if let Some(clients) = config.clients() {
            Self::validate_clients(config, clients, port)?;
        }

        if let InboundConfig::DokodemoDoor(inbound) = config {
            if inbound.settings.address.is_empty() || inbound.settings.port == 0 {
                return Err(XuiError::validation(format!(
                    "入站 {} 的 dokodemo-door 目标地址无效",
                    port
                )));
            }
        }

        if let Some(stream) = config.stream_settings() {
            Self::validate_stream(stream, &format!("入站 {}", port), true)?;
        }

        Ok(())
    }

    fn validate_clients(config: &InboundConfig, clients: &[Client], port: u16) -> Result<()> {
        let mut emails = HashSet::new();
        for (idx, client) in clients.iter().enumerate() {
            match config {
                // 验证客户端 UUID
                InboundConfig::Vmess(_) | InboundConfig::Vless(_) => {
                    let id = client.id.as_deref().unwrap_or_default();
                    if Uuid::parse_str(id).is_err() {
                        return Err(XuiError::validation(format!(
                            "入站 {} 的客户端 {} UUID 格式无效: {}",
                            port, idx, id
                        )));
                    }
                }
                InboundConfig::Trojan(_) => {
                    if client.password.as_deref().unwrap_or_default().is_empty() {
                        return Err(XuiError::validation(format!(
                            "入站 {} 的客户端 {} 缺少密码",
                            port, idx
                        )));
                    }
                }
                InboundConfig::Shadowsocks(_) => {
                    if client.email.is_empty() {
                        return Err(XuiError::validation(format!(
                            "入站 {} 的客户端 {} 缺少 email",
                            port, idx
                        )));
                    }
                }
                _ => {}
            }

            // 重复 email 只告警, 面板自己会拒绝真正冲突的情况
            if !client.email.is_empty() && !emails.insert(client.email.to_lowercase()) {
                warn!("入站 {} 中 email {} 重复", port, client.email);
            }
        }
        Ok(())
    }

    /// 验证流设置; `inbound` 区分 REALITY 的服务端与客户端字段
    pub fn validate_stream(stream: &StreamSettings, context: &str, inbound: bool) -> Result<()> {
        if let Some(ws) = stream.ws() {
            if !ws.path.starts_with('/') {
                return Err(XuiError::validation(format!(
                    "{} 的 WebSocket path 必须以 / 开头: {}",
                    context, ws.path
                )));
            }
        }

        if let Some(grpc) = stream.grpc() {
            if grpc.service_name.is_empty() {
                return Err(XuiError::validation(format!(
                    "{} 的 gRPC serviceName 不能为空",
                    context
                )));
            }
        }

        if let Some(ds) = stream.domain_socket() {
            if ds.path.is_empty() {
                return Err(XuiError::validation(format!(
                    "{} 的 domainsocket path 不能为空",
                    context
                )));
            }
        }

        if *stream.security() == Security::Reality {
            match stream.reality() {
                Some(reality) => Self::validate_reality_settings(reality, context, inbound)?,
                None => {
                    return Err(XuiError::validation(format!(
                        "{} 缺少 realitySettings",
                        context
                    )))
                }
            }
        }

        Ok(())
    }

    fn validate_reality_settings(reality: &RealitySettings, context: &str, inbound: bool) -> Result<()> {
        if inbound {
            // 验证私钥
            if reality.private_key.is_empty() {
                return Err(XuiError::validation(format!(
                    "{} 的 Reality privateKey 不能为空",
                    context
                )));
            }

            // 验证服务器名称
            if reality.server_names.is_empty() {
                return Err(XuiError::validation(format!(
                    "{} 的 Reality serverNames 不能为空",
                    context
                )));
            }

            for short_id in &reality.short_ids {
                if short_id.len() > 16 || hex::decode(short_id).is_err() {
                    return Err(XuiError::validation(format!(
                        "{} 的 Reality shortId 无效: {}",
                        context, short_id
                    )));
                }
            }
        } else if reality.public_key.is_empty() {
            return Err(XuiError::validation(format!(
                "{} 的 Reality publicKey 不能为空",
                context
            )));
        }

        Ok(())
    }

    fn validate_vnext<U: VnextUser>(servers: &[VnextServer<U>], context: &str) -> Result<()> {
        if servers.is_empty() {
            return Err(XuiError::validation(format!("{} 至少需要一个服务器", context)));
        }
        for server in servers {
            Self::validate_endpoint(&server.address, server.port, context)?;
            for user in &server.users {
                if Uuid::parse_str(user.id()).is_err() {
                    return Err(XuiError::validation(format!(
                        "{} 的用户 UUID 格式无效: {}",
                        context,
                        user.id()
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_endpoint(address: &str, port: u16, context: &str) -> Result<()> {
        if address.is_empty() || port == 0 {
            return Err(XuiError::validation(format!(
                "{} 的服务器地址无效: {}:{}",
                context, address, port
            )));
        }
        Ok(())
    }

    /// 上传前验证出站配置
    pub fn validate_outbound(outbound: &Outbound) -> Result<()> {
        if outbound.tag.is_empty() {
            return Err(XuiError::validation("出站 tag 不能为空"));
        }
        let context = format!("出站 {}", outbound.tag);

        match &outbound.config {
            OutboundConfig::Vmess(p) => Self::validate_vnext(&p.settings.vnext, &context)?,
            OutboundConfig::Vless(p) => Self::validate_vnext(&p.settings.vnext, &context)?,
            OutboundConfig::Trojan(p) => {
                for server in &p.settings.servers {
                    Self::validate_endpoint(&server.address, server.port, &context)?;
                    if server.password.is_empty() {
                        return Err(XuiError::validation(format!("{} 缺少密码", context)));
                    }
                }
            }
            OutboundConfig::Shadowsocks(p) => {
                for server in &p.settings.servers {
                    Self::validate_endpoint(&server.address, server.port, &context)?;
                }
            }
            OutboundConfig::Socks(p) | OutboundConfig::Http(p) => {
                for server in &p.settings.servers {
                    Self::validate_endpoint(&server.address, server.port, &context)?;
                }
            }
            _ => {}
        }

        if let Some(stream) = outbound.config.stream_settings() {
            Self::validate_stream(stream, &context, false)?;
        }

        Ok(())
    }

    /// 规则必须指向出站或负载均衡器, 且至少有一个匹配条件
    pub fn validate_rule(rule: &Rule) -> Result<()> {
        if rule.outbound_tag.is_none() && rule.balancer_tag.is_none() {
            return Err(XuiError::validation(
                "路由规则需要 outboundTag 或 balancerTag",
            ));
        }

        let has_matcher = !rule.inbound_tag.is_empty()
            || !rule.user.is_empty()
            || !rule.protocol.is_empty()
            || !rule.domain.is_empty()
            || !rule.ip.is_empty()
            || !rule.source.is_empty()
            || rule.network.is_some()
            || rule.port.is_some()
            || rule.source_port.is_some()
            || rule.attrs.is_some()
            || !rule.extra.is_empty();
        if !has_matcher {
            return Err(XuiError::validation("路由规则至少需要一个匹配条件"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::inbound::{StreamInbound, VlessSettings};
    use crate::protocol::outbound::{ProxyOutbound, VlessUser, VnextSettings};
    use crate::protocol::{ClientOptions, ClientRoster, Protocol};
    use crate::transport::{GrpcSettings, SecuritySettings, TcpSettings};

    #[test]
    fn test_valid_config() {
        let config = ClientConfig::new("127.0.0.1", 2053);
        assert!(Validator::validate(&config).is_ok());

        let mut config = ClientConfig::new("", 2053);
        assert!(Validator::validate(&config).is_err());
        config.host = "h".into();
        config.port = 0;
        assert_eq!(Validator::validate(&config).unwrap_err().code(), 400);
    }

    #[test]
    fn test_invalid_uuid() {
        let mut settings = VlessSettings::default();
        settings.add_client(ClientOptions::new().id("invalid-uuid"));
        let config = InboundConfig::Vless(StreamInbound::new(443, settings));
        assert!(Validator::validate_inbound(&config).is_err());

        let config = InboundConfig::generate(&Protocol::Vless).unwrap();
        assert!(Validator::validate_inbound(&config).is_ok());
    }

    #[test]
    fn test_reality_requires_keys() {
        let mut reality = RealitySettings::generate();
        reality.private_key.clear();
        let mut settings = VlessSettings::default();
        settings.add_client(ClientOptions::new());
        let config = InboundConfig::Vless(
            StreamInbound::new(443, settings)
                .with_stream(StreamSettings::new(TcpSettings::default(), reality)),
        );
        let err = Validator::validate_inbound(&config).unwrap_err();
        assert!(err.to_string().contains("privateKey"));
    }

    #[test]
    fn test_empty_grpc_service_name() {
        let grpc = GrpcSettings {
            service_name: String::new(),
            ..GrpcSettings::default()
        };
        let stream = StreamSettings::new(grpc, SecuritySettings::None);
        assert!(Validator::validate_stream(&stream, "入站 443", true).is_err());
    }

    #[test]
    fn test_outbound_and_rule() {
        let user = VlessUser::generate();
        let outbound = Outbound::new(
            "proxy",
            OutboundConfig::Vless(ProxyOutbound::new(VnextSettings::new(
                "example.com",
                443,
                vec![user],
            ))),
        );
        assert!(Validator::validate_outbound(&outbound).is_ok());

        let untagged = Outbound::new("", outbound.config.clone());
        assert!(Validator::validate_outbound(&untagged).is_err());

        assert!(Validator::validate_rule(&Rule::new().outbound_tag("direct")).is_err());
        assert!(Validator::validate_rule(&Rule::new().ip(["geoip:cn"])).is_err());
        assert!(Validator::validate_rule(&Rule::new().ip(["geoip:cn"]).outbound_tag("direct")).is_ok());
    }
}
