use futures::future::BoxFuture;
use reqwest::multipart;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Body, Method, RawResponse, Request, Transport};
use crate::config::ClientConfig;
use crate::utils::error::{Result, XuiError};

/// 基于 reqwest 的面板连接 (cookie 会话保存在 client 内)
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    /// 已发送请求数
    requests_sent: Arc<AtomicUsize>,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| XuiError::Config(format!("代理地址无效: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            requests_sent: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests_sent(&self) -> usize {
        self.requests_sent.load(Ordering::Relaxed)
    }

    async fn execute(&self, request: Request) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        builder = match request.body {
            Body::Empty => builder,
            Body::Form(fields) => builder.form(&fields),
            Body::Multipart {
                field,
                file_name,
                data,
            } => {
                let part = multipart::Part::bytes(data.to_vec())
                    .file_name(file_name)
                    .mime_str("application/octet-stream")?;
                builder.multipart(multipart::Form::new().part(field, part))
            }
        };

        let count = self.requests_sent.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("→ #{} {:?} {}", count, request.method, request.path);

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!("← #{} {} ({} 字节)", count, status, body.len());

        if !(200..300).contains(&status) {
            return Err(XuiError::Network {
                code: status,
                message: format!("{} 返回 HTTP {}", request.path, status),
            });
        }

        Ok(RawResponse { status, body })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<RawResponse>> {
        Box::pin(self.execute(request))
    }
}
