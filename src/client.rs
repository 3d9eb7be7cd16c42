use std::sync::Arc;
use tracing::debug;

use crate::config::ClientConfig;
use crate::network::{ReqwestTransport, Reply, Session, Transport};
use crate::panel::PanelApi;
use crate::server::ServerApi;
use crate::utils::error::Result;
use crate::xray::{InboundManager, OutboundManager, ReverseManager, RoutingManager, XrayApi};

/// 面板客户端; 各 API 共享同一个会话
#[derive(Clone)]
pub struct XuiClient {
    config: ClientConfig,
    session: Session,
}

impl XuiClient {
    /// 以 reqwest 连接面板
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        debug!("面板地址: {}", transport.base_url());
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// 使用自定义传输 (测试替身等)
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            session: Session::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// 以配置中的账户登录; 会话仍有效时返回 false
    pub async fn login(&self) -> Result<Reply<bool>> {
        self.session
            .login(&self.config.username, &self.config.password)
            .await
    }

    pub async fn is_logged_in(&self) -> bool {
        self.session.is_logged_in().await
    }

    pub fn server(&self) -> ServerApi {
        ServerApi::new(self.session.clone())
    }

    pub fn panel(&self) -> PanelApi {
        PanelApi::new(self.session.clone())
    }

    pub fn xray(&self) -> XrayApi {
        XrayApi::new(self.session.clone())
    }

    pub fn inbounds(&self) -> InboundManager {
        InboundManager::new(self.session.clone())
    }

    pub fn outbounds(&self) -> OutboundManager {
        OutboundManager::new(self.xray())
    }

    pub fn routing(&self) -> RoutingManager {
        RoutingManager::new(self.xray())
    }

    pub fn reverse(&self) -> ReverseManager {
        ReverseManager::new(self.xray())
    }
}
