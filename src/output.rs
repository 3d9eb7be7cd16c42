//! 公共 API 边界上的结果信封与输出格式
//!
//! 库内部始终返回 `Result<Reply<T>, XuiError>`; 只有调用方需要统一信封
//! `{ok, response, error_code, error, size, time_taken}` 时才转换为 [`Outcome`]。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::network::Reply;
use crate::utils::error::{Result, XuiError};

pub const UNIT_BYTE: u64 = 1;
pub const UNIT_KILOBYTE: u64 = 1024 * UNIT_BYTE;
pub const UNIT_MEGABYTE: u64 = 1024 * UNIT_KILOBYTE;
pub const UNIT_GIGABYTE: u64 = 1024 * UNIT_MEGABYTE;
pub const UNIT_TERABYTE: u64 = 1024 * UNIT_GIGABYTE;

/// 调用方选择的输出形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON 字符串
    Json,
    /// 解码后的结构
    #[default]
    Object,
    /// 解码后的键值映射
    Array,
}

impl FromStr for OutputFormat {
    type Err = XuiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "object" => Ok(OutputFormat::Object),
            "array" => Ok(OutputFormat::Array),
            other => Err(XuiError::Config(format!("未知输出格式: {}", other))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Json => "json",
            OutputFormat::Object => "object",
            OutputFormat::Array => "array",
        })
    }
}

/// 按 [`OutputFormat`] 渲染后的信封
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Json(String),
    Object(Value),
    Array(Map<String, Value>),
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Json(s) => f.write_str(s),
            Rendered::Object(v) => write!(f, "{:#}", v),
            Rendered::Array(m) => {
                for (k, v) in m {
                    writeln!(f, "{}: {}", k, v)?;
                }
                Ok(())
            }
        }
    }
}

/// 统一结果信封
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<f64>,
}

impl Outcome {
    pub fn from_result<T: Serialize>(result: Result<Reply<T>>) -> Self {
        match result {
            Ok(reply) => match serde_json::to_value(&reply.response) {
                Ok(response) => Outcome {
                    ok: true,
                    response: Some(response),
                    error_code: None,
                    error: None,
                    size: reply.size,
                    time_taken: Some(reply.time_taken),
                },
                Err(e) => Self::from_error(&XuiError::from(e)),
            },
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn from_error(err: &XuiError) -> Self {
        Outcome {
            ok: false,
            response: None,
            error_code: Some(err.code()),
            error: Some(err.to_string()),
            size: None,
            time_taken: None,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<Rendered> {
        Ok(match format {
            OutputFormat::Json => Rendered::Json(serde_json::to_string(self)?),
            OutputFormat::Object => Rendered::Object(serde_json::to_value(self)?),
            OutputFormat::Array => match serde_json::to_value(self)? {
                Value::Object(map) => Rendered::Array(map),
                _ => Rendered::Array(Map::new()),
            },
        })
    }
}
