use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{Request, Transport};
use crate::utils::error::{Result, XuiError};

/// 构造表单字段
pub fn form<K, V, I>(fields: I) -> Vec<(String, String)>
where
    K: Into<String>,
    V: ToString,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

/// 表单字段值: 字符串原样, null 为空串, 其余按 JSON 文本
pub fn form_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 面板响应信封 `{success, msg, obj}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub obj: Value,
}

impl ApiResponse {
    /// `success: false` 转为 `RemoteRejected`
    pub fn expect_success(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(XuiError::RemoteRejected { msg: self.msg })
        }
    }

    /// 按类型解码 `obj`
    pub fn obj_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.obj.clone())?)
    }

    /// `obj` 本身是 JSON 字符串时先解一层
    pub fn obj_decoded(&self) -> Result<Value> {
        match &self.obj {
            Value::String(s) => Ok(serde_json::from_str(s)?),
            other => Ok(other.clone()),
        }
    }
}

/// 一次操作的结果及其计量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply<T> {
    pub response: T,
    /// 响应体字节数 (组合操作取最后一次请求)
    pub size: Option<usize>,
    /// 耗时 (秒)
    pub time_taken: f64,
}

impl<T> Reply<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reply<U> {
        Reply {
            response: f(self.response),
            size: self.size,
            time_taken: self.time_taken,
        }
    }

    pub fn try_map<U, F: FnOnce(T) -> Result<U>>(self, f: F) -> Result<Reply<U>> {
        Ok(Reply {
            response: f(self.response)?,
            size: self.size,
            time_taken: self.time_taken,
        })
    }

    /// 以 `start` 为起点重新计时 (组合操作)
    pub fn since(mut self, start: Instant) -> Self {
        self.time_taken = start.elapsed().as_secs_f64();
        self
    }

    pub fn into_inner(self) -> T {
        self.response
    }
}

/// 共享的面板会话
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 发送请求, 返回原始响应体
    pub async fn raw(&self, request: Request) -> Result<Reply<Bytes>> {
        let start = Instant::now();
        let response = self.transport.send(request).await?;
        Ok(Reply {
            size: Some(response.body.len()),
            response: response.body,
            time_taken: start.elapsed().as_secs_f64(),
        })
    }

    /// 发送请求并解码信封 (不检查 success)
    pub async fn call(&self, request: Request) -> Result<Reply<ApiResponse>> {
        self.raw(request)
            .await?
            .try_map(|body| Ok(serde_json::from_slice::<ApiResponse>(&body)?))
    }

    /// POST 表单, 要求 `success: true`
    pub async fn post(&self, path: &str, fields: Vec<(String, String)>) -> Result<Reply<ApiResponse>> {
        self.call(Request::post(path).form(fields))
            .await?
            .try_map(ApiResponse::expect_success)
    }

    /// 已登录返回 true (`server/status` 探测成功)
    pub async fn is_logged_in(&self) -> bool {
        match self.call(Request::post("server/status")).await {
            Ok(reply) => reply.response.success,
            Err(e) => {
                debug!("登录状态探测失败: {}", e);
                false
            }
        }
    }

    /// 登录; 已登录时不重复登录, 返回 false
    pub async fn login(&self, username: &str, password: &str) -> Result<Reply<bool>> {
        let start = Instant::now();
        if self.is_logged_in().await {
            debug!("会话仍然有效, 跳过登录");
            return Ok(Reply {
                response: false,
                size: None,
                time_taken: start.elapsed().as_secs_f64(),
            });
        }

        let fields = form([("username", username), ("password", password)]);
        match self.post("login", fields).await {
            Ok(reply) => {
                info!("✅ 已登录面板 (用户 {})", username);
                Ok(reply.map(|_| true).since(start))
            }
            Err(e) => {
                warn!("登录失败: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_decoding() {
        let resp: ApiResponse =
            serde_json::from_str(r#"{"success":false,"msg":"端口已存在","obj":null}"#).unwrap();
        match resp.expect_success() {
            Err(XuiError::RemoteRejected { msg }) => assert_eq!(msg, "端口已存在"),
            other => panic!("unexpected {:?}", other),
        }

        let resp: ApiResponse = serde_json::from_value(json!({
            "success": true,
            "obj": "{\"xraySetting\":{\"log\":{}}}"
        }))
        .unwrap();
        assert_eq!(resp.msg, "");
        assert_eq!(resp.obj_decoded().unwrap()["xraySetting"], json!({"log": {}}));
    }

    #[test]
    fn test_form_helper() {
        let fields = form([("id", 5.to_string()), ("enable", true.to_string())]);
        assert_eq!(fields[0], ("id".to_string(), "5".to_string()));
        assert_eq!(fields[1].1, "true");
    }

    #[test]
    fn test_reply_map_keeps_metrics() {
        let reply = Reply {
            response: 2,
            size: Some(10),
            time_taken: 0.5,
        };
        let mapped = reply.map(|n| n * 2);
        assert_eq!(mapped.response, 4);
        assert_eq!(mapped.size, Some(10));
    }
}
