use thiserror::Error;

/// 客户端错误类型
#[derive(Error, Debug)]
pub enum XuiError {
    /// 传输层失败 (超时 / 连接失败 / 非 2xx 状态码)
    #[error("网络错误 ({code}): {message}")]
    Network { code: u16, message: String },

    /// 面板返回 `success: false`
    #[error("面板拒绝请求: {msg}")]
    RemoteRejected { msg: String },

    /// 本地按 id / tag / email 查找失败
    #[error("{0} not found")]
    NotFound(String),

    /// 更新时协议与现有入站不一致
    #[error("协议不一致: 现有 {expected}, 提交 {found}")]
    ProtocolMismatch { expected: String, found: String },

    #[error("配置校验失败: {0}")]
    Validation(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl XuiError {
    /// 面板客户端沿用的错误码约定
    pub fn code(&self) -> u16 {
        match self {
            XuiError::Network { code, .. } => *code,
            XuiError::NotFound(_) => 404,
            XuiError::Validation(_) => 400,
            XuiError::RemoteRejected { .. }
            | XuiError::ProtocolMismatch { .. }
            | XuiError::Config(_)
            | XuiError::Io(_)
            | XuiError::Json(_) => 500,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        XuiError::NotFound(what.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        XuiError::Validation(msg.into())
    }
}

impl From<reqwest::Error> for XuiError {
    fn from(err: reqwest::Error) -> Self {
        XuiError::Network {
            code: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = XuiError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(XuiError::not_found("inbound 3").code(), 404);
        assert_eq!(XuiError::validation("port").code(), 400);
        assert_eq!(
            XuiError::Network {
                code: 502,
                message: "bad gateway".into()
            }
            .code(),
            502
        );
        assert_eq!(
            XuiError::ProtocolMismatch {
                expected: "vmess".into(),
                found: "trojan".into()
            }
            .code(),
            500
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = XuiError::not_found("outbound tag out1");
        assert_eq!(err.to_string(), "outbound tag out1 not found");
    }
}
