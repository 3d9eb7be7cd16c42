//! 服务器与 Xray 进程控制 (`server/*`)

use bytes::Bytes;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::network::{form, Reply, Request, Session};
use crate::utils::crypto::X25519KeyPair;
use crate::utils::error::Result;

/// 导入数据库时上传的文件名
pub const DB_FILE_NAME: &str = "x-ui.db";

#[derive(Clone)]
pub struct ServerApi {
    session: Session,
}

impl ServerApi {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// CPU / 内存 / Xray 状态等
    pub async fn status(&self) -> Result<Reply<Value>> {
        Ok(self
            .session
            .post("server/status", Vec::new())
            .await?
            .map(|r| r.obj))
    }

    pub async fn restart_xray(&self) -> Result<Reply<String>> {
        let reply = self.session.post("server/restartXrayService", Vec::new()).await?;
        info!("🔄 Xray 服务已重启");
        Ok(reply.map(|r| r.msg))
    }

    pub async fn stop_xray(&self) -> Result<Reply<String>> {
        let reply = self.session.post("server/stopXrayService", Vec::new()).await?;
        info!("⏹ Xray 服务已停止");
        Ok(reply.map(|r| r.msg))
    }

    /// 正在运行的 Xray 配置
    pub async fn xray_config(&self) -> Result<Reply<Value>> {
        self.session
            .post("server/getConfigJson", Vec::new())
            .await?
            .try_map(|r| r.obj_decoded())
    }

    /// 最近 `count` 行日志; `syslog` 为 true 时读取系统日志
    pub async fn logs(&self, count: u32, level: &str, syslog: bool) -> Result<Reply<Vec<String>>> {
        let fields = form([("level", level.to_string()), ("syslog", syslog.to_string())]);
        self.session
            .post(&format!("server/logs/{}", count), fields)
            .await?
            .try_map(|r| r.obj_as::<Option<Vec<String>>>().map(Option::unwrap_or_default))
    }

    /// 由面板生成新的 x25519 密钥对
    pub async fn new_x25519_cert(&self) -> Result<Reply<X25519KeyPair>> {
        self.session
            .post("server/getNewX25519Cert", Vec::new())
            .await?
            .try_map(|r| r.obj_as::<X25519KeyPair>())
    }

    /// 下载面板数据库
    pub async fn get_db(&self) -> Result<Reply<Bytes>> {
        let reply = self.session.raw(Request::get("server/getDb")).await?;
        debug!("数据库已下载 ({} 字节)", reply.response.len());
        Ok(reply)
    }

    /// 下载面板数据库并写入文件, 返回写入的字节数
    pub async fn save_db<P: AsRef<Path>>(&self, path: P) -> Result<Reply<usize>> {
        let reply = self.get_db().await?;
        fs::write(path.as_ref(), &reply.response).await?;
        info!("💾 数据库已保存到 {}", path.as_ref().display());
        Ok(reply.map(|bytes| bytes.len()))
    }

    /// 上传数据库文件并替换面板数据
    pub async fn import_db(&self, data: impl Into<Bytes>) -> Result<Reply<String>> {
        let request = Request::post("server/importDB").multipart("db", DB_FILE_NAME, data);
        self.session
            .call(request)
            .await?
            .try_map(|r| Ok(r.expect_success()?.msg))
    }

    /// 从文件导入数据库
    pub async fn import_db_file<P: AsRef<Path>>(&self, path: P) -> Result<Reply<String>> {
        let data = fs::read(path).await?;
        self.import_db(data).await
    }
}
