//! 面板线格式的 serde 辅助函数
//!
//! 面板对部分字段并不严格: `port` 可能是数字也可能是 `"53,443"`,
//! 过期时间在线上是毫秒而内部统一为秒。

use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// 内部秒 ⇄ 线上毫秒
pub mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(secs: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(secs.saturating_mul(1000))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0)
                / 1000,
            Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(0) / 1000,
            _ => 0,
        })
    }
}

/// 端口列表: 数字 / 字符串 / 数组都归一为 `"53,443,1000-2000"`
pub mod port_list {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(p) => s.serialize_str(p),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        })
    }
}

/// 单个字符串或字符串数组
pub mod one_or_many {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(match value {
            Some(Value::String(s)) => vec![s],
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        })
    }
}

pub(crate) fn is_false(v: &bool) -> bool {
    !*v
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(with = "super::millis", default)]
        expiry: i64,
        #[serde(with = "super::port_list", default)]
        port: Option<String>,
        #[serde(deserialize_with = "super::one_or_many::deserialize", default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_millis_round_trip() {
        let p: Sample = serde_json::from_str(r#"{"expiry": 1700000000000}"#).unwrap();
        assert_eq!(p.expiry, 1_700_000_000);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["expiry"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_lenient_values() {
        let p: Sample =
            serde_json::from_str(r#"{"port": 443, "tags": "in-1"}"#).unwrap();
        assert_eq!(p.port.as_deref(), Some("443"));
        assert_eq!(p.tags, vec!["in-1".to_string()]);

        let p: Sample = serde_json::from_str(r#"{"port": [53, "443"]}"#).unwrap();
        assert_eq!(p.port.as_deref(), Some("53,443"));
    }
}
