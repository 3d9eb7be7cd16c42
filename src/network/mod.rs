//! 与面板通信的 HTTP 层
//!
//! [`Transport`] 是唯一的外部协作者: 发送一个表单 / 多部分请求, 返回状态码与原始
//! 响应体。[`Session`] 在其上计时、解码 `{success, msg, obj}` 信封并处理登录。

mod connection;
#[cfg(any(test, feature = "testing"))]
mod memory;
mod session;

pub use connection::ReqwestTransport;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryPanel;
pub use session::{form, form_value, ApiResponse, Reply, Session};

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// application/x-www-form-urlencoded
    Form(Vec<(String, String)>),
    /// multipart/form-data, 单个文件字段
    Multipart {
        field: String,
        file_name: String,
        data: Bytes,
    },
}

/// 面板请求; `path` 相对于面板根路径, 不以斜杠开头
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Body,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Body::Form(fields);
        self
    }

    pub fn multipart(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.body = Body::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            data: data.into(),
        };
        self
    }

    /// 表单字段值
    pub fn field(&self, name: &str) -> Option<&str> {
        match &self.body {
            Body::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// 原始响应
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 面板 HTTP 传输 (cookie 会话由实现维护)
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<RawResponse>>;
}
