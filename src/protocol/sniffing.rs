use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::serde_helpers::default_true;

/// 流量嗅探配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sniffing {
    /// 是否启用嗅探
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 嗅探目标类型
    #[serde(rename = "destOverride", default = "default_dest_override")]
    pub dest_override: Vec<String>,
    #[serde(rename = "metadataOnly", default)]
    pub metadata_only: bool,
    #[serde(rename = "domainsExcluded", default)]
    pub domains_excluded: Vec<String>,
    #[serde(rename = "routeOnly", default)]
    pub route_only: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Sniffing {
    fn default() -> Self {
        Self {
            enabled: true,
            dest_override: default_dest_override(),
            metadata_only: false,
            domains_excluded: Vec::new(),
            route_only: false,
            extra: Map::new(),
        }
    }
}

impl Sniffing {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_dest_override() -> Vec<String> {
    ["http", "tls", "quic", "fakedns"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniffing_defaults() {
        let sniffing: Sniffing = serde_json::from_str("{}").unwrap();
        assert_eq!(sniffing, Sniffing::default());
        assert!(sniffing.enabled);
        assert_eq!(sniffing.dest_override.len(), 4);
    }

    #[test]
    fn test_sniffing_wire_keys() {
        let v = serde_json::to_value(Sniffing::disabled()).unwrap();
        assert_eq!(v["enabled"], false);
        assert_eq!(v["destOverride"][3], "fakedns");
        assert_eq!(v["routeOnly"], false);
    }
}
