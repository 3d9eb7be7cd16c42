//! 面板自身的设置 (`panel/setting/*`)

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::network::{form_value, Reply, Session};
use crate::utils::error::{Result, XuiError};

#[derive(Clone)]
pub struct PanelApi {
    session: Session,
}

impl PanelApi {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// 全部面板设置
    pub async fn all(&self) -> Result<Reply<Map<String, Value>>> {
        self.session
            .post("panel/setting/all", Vec::new())
            .await?
            .try_map(|r| match r.obj_decoded()? {
                Value::Object(map) => Ok(map),
                other => Err(XuiError::validation(format!("面板设置不是对象: {}", other))),
            })
    }

    /// 指定键的子集; 任一键不存在时返回 NotFound
    pub async fn get(&self, keys: &[&str]) -> Result<Reply<Map<String, Value>>> {
        self.all().await?.try_map(|mut all| {
            keys.iter()
                .map(|key| match all.remove(*key) {
                    Some(v) => Ok((key.to_string(), v)),
                    None => Err(XuiError::not_found(format!("panel setting {}", key))),
                })
                .collect()
        })
    }

    /// 取回全部设置, 合并 `partial` 后整体提交
    pub async fn update(&self, partial: Map<String, Value>) -> Result<Reply<Map<String, Value>>> {
        let mut settings = self.all().await?.into_inner();
        for (k, v) in partial {
            settings.insert(k, v);
        }
        debug!("提交面板设置 ({} 项)", settings.len());

        let fields = settings
            .iter()
            .map(|(k, v)| (k.clone(), form_value(v)))
            .collect();
        let reply = self.session.post("panel/setting/update", fields).await?;
        info!("⚙️ 面板设置已更新");
        Ok(reply.map(|_| settings))
    }

    /// 重启面板进程
    pub async fn restart(&self) -> Result<Reply<String>> {
        let reply = self.session.post("panel/setting/restartPanel", Vec::new()).await?;
        info!("🔄 面板即将重启");
        Ok(reply.map(|r| r.msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_value() {
        assert_eq!(form_value(&json!("/panel/")), "/panel/");
        assert_eq!(form_value(&json!(2053)), "2053");
        assert_eq!(form_value(&json!(false)), "false");
        assert_eq!(form_value(&Value::Null), "");
    }
}
