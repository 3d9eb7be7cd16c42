//! 进程内的面板替身
//!
//! 实现 [`Transport`], 按面板的接口路径与信封格式应答, 保存入站列表、Xray 配置
//! 文档与面板设置, 并记录每个请求。仅在测试或开启 `testing` feature 时编译。

use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{Body, Method, RawResponse, Request, Transport};
use crate::utils::crypto::generate_x25519_keypair;
use crate::utils::error::{Result, XuiError};

const DB_MAGIC: &[u8] = b"SQLite format 3\0";

struct PanelState {
    username: String,
    password: String,
    logged_in: bool,
    inbounds: Vec<Map<String, Value>>,
    next_id: u64,
    xray: Value,
    settings: Map<String, Value>,
    xray_running: bool,
    db: Bytes,
    writes: usize,
    requests: Vec<String>,
    fail_next: Option<u16>,
    reject_next: Option<String>,
}

/// 内存中的面板
pub struct MemoryPanel {
    state: Mutex<PanelState>,
}

impl Default for MemoryPanel {
    fn default() -> Self {
        Self::new()
    }
}

/// 面板新装时的 Xray 配置模板
pub fn default_xray_document() -> Value {
    json!({
        "log": {"access": "none", "dnsLog": false, "error": "", "loglevel": "warning", "maskAddress": ""},
        "api": {"tag": "api", "services": ["HandlerService", "LoggerService", "StatsService"]},
        "inbounds": [{
            "tag": "api",
            "listen": "127.0.0.1",
            "port": 62789,
            "protocol": "dokodemo-door",
            "settings": {"address": "127.0.0.1"}
        }],
        "outbounds": [
            {"tag": "direct", "protocol": "freedom", "settings": {"domainStrategy": "AsIs", "redirect": "", "noises": []}},
            {"tag": "blocked", "protocol": "blackhole", "settings": {}}
        ],
        "policy": {
            "levels": {"0": {"statsUserDownlink": true, "statsUserUplink": true}},
            "system": {"statsInboundDownlink": true, "statsInboundUplink": true, "statsOutboundDownlink": false, "statsOutboundUplink": false}
        },
        "routing": {
            "domainStrategy": "AsIs",
            "rules": [
                {"type": "field", "inboundTag": ["api"], "outboundTag": "api"},
                {"type": "field", "outboundTag": "blocked", "ip": ["geoip:private"]},
                {"type": "field", "outboundTag": "blocked", "protocol": ["bittorrent"]}
            ]
        },
        "stats": {},
        "metrics": {"tag": "metrics_out", "listen": "127.0.0.1:11111"}
    })
}

fn default_panel_settings() -> Map<String, Value> {
    let settings = json!({
        "webListen": "",
        "webDomain": "",
        "webPort": 2053,
        "webCertFile": "",
        "webKeyFile": "",
        "webBasePath": "/",
        "sessionMaxAge": 60,
        "pageSize": 50,
        "expireDiff": 0,
        "trafficDiff": 0,
        "remarkModel": "-ieo",
        "tgBotEnable": false,
        "timeLocation": "Asia/Tehran",
        "subEnable": false
    });
    match settings {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn ok(obj: Value) -> Result<RawResponse> {
    envelope(true, "", obj)
}

fn fail(msg: &str) -> Result<RawResponse> {
    envelope(false, msg, Value::Null)
}

fn envelope(success: bool, msg: &str, obj: Value) -> Result<RawResponse> {
    let body = serde_json::to_vec(&json!({"success": success, "msg": msg, "obj": obj}))?;
    Ok(RawResponse {
        status: 200,
        body: Bytes::from(body),
    })
}

fn not_found(path: &str) -> Result<RawResponse> {
    Err(XuiError::Network {
        code: 404,
        message: format!("{} 返回 HTTP 404", path),
    })
}

fn parse_i64(v: Option<&str>) -> i64 {
    v.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// 客户端在 `delClient` / `updateClient` 路径中的定位字段
fn client_key_field(protocol: &str) -> &'static str {
    match protocol {
        "trojan" => "password",
        "shadowsocks" => "email",
        _ => "id",
    }
}

fn inbound_tag(listen: &str, port: i64) -> String {
    if listen.is_empty() || listen == "0.0.0.0" || listen == "::" || listen == "::0" {
        format!("inbound-{}", port)
    } else {
        format!("inbound-{}:{}", listen, port)
    }
}

impl MemoryPanel {
    /// 默认账户 admin / admin
    pub fn new() -> Self {
        Self::with_credentials("admin", "admin")
    }

    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut db = DB_MAGIC.to_vec();
        db.extend_from_slice(&[0u8; 16]);
        Self {
            state: Mutex::new(PanelState {
                username: username.into(),
                password: password.into(),
                logged_in: false,
                inbounds: Vec::new(),
                next_id: 1,
                xray: default_xray_document(),
                settings: default_panel_settings(),
                xray_running: true,
                db: Bytes::from(db),
                writes: 0,
                requests: Vec::new(),
                fail_next: None,
                reject_next: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        // 处理过程中不会 panic, 中毒时沿用内部状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 预置一条入站记录, 返回其 id
    pub fn seed_inbound(&self, record: Value) -> u64 {
        let mut state = self.lock();
        let mut map = match record {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let id = match map.get("id").and_then(Value::as_u64) {
            Some(id) => id,
            None => state.next_id,
        };
        map.insert("id".into(), json!(id));
        state.next_id = state.next_id.max(id + 1);
        state.inbounds.push(map);
        id
    }

    pub fn inbound_records(&self) -> Vec<Value> {
        self.lock()
            .inbounds
            .iter()
            .cloned()
            .map(Value::Object)
            .collect()
    }

    pub fn document(&self) -> Value {
        self.lock().xray.clone()
    }

    pub fn set_document(&self, document: Value) {
        self.lock().xray = document;
    }

    pub fn panel_settings(&self) -> Map<String, Value> {
        self.lock().settings.clone()
    }

    pub fn xray_running(&self) -> bool {
        self.lock().xray_running
    }

    pub fn db(&self) -> Bytes {
        self.lock().db.clone()
    }

    /// 修改面板状态的请求数
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// 已收到的请求, 形如 "POST panel/inbound/list"
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// 下一个请求以该 HTTP 状态失败
    pub fn fail_next(&self, status: u16) {
        self.lock().fail_next = Some(status);
    }

    /// 下一个请求返回 `success: false`
    pub fn reject_next(&self, msg: impl Into<String>) {
        self.lock().reject_next = Some(msg.into());
    }

    fn handle(&self, request: Request) -> Result<RawResponse> {
        let mut state = self.lock();
        let path = request.path.trim_matches('/').to_string();
        let verb = match request.method {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        state.requests.push(format!("{} {}", verb, path));
        debug!("memory panel: {} {}", verb, path);

        if let Some(status) = state.fail_next.take() {
            return Err(XuiError::Network {
                code: status,
                message: format!("{} 返回 HTTP {}", path, status),
            });
        }
        if let Some(msg) = state.reject_next.take() {
            return fail(&msg);
        }

        if path == "login" {
            let matched = request.field("username") == Some(state.username.as_str())
                && request.field("password") == Some(state.password.as_str());
            state.logged_in = matched;
            return if matched {
                envelope(true, "登录成功", Value::Null)
            } else {
                fail("用户名或密码错误")
            };
        }
        if !state.logged_in {
            return not_found(&path);
        }

        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            ["server", "status"] => ok(json!({
                "cpu": 3.2,
                "cpuCores": 2,
                "mem": {"current": 268_435_456u64, "total": 1_073_741_824u64},
                "xray": {
                    "state": if state.xray_running { "running" } else { "stop" },
                    "errorMsg": "",
                    "version": "1.8.24"
                },
                "uptime": 86400
            })),
            ["server", "restartXrayService"] => {
                state.xray_running = true;
                envelope(true, "Xray 已重启", Value::Null)
            }
            ["server", "stopXrayService"] => {
                state.xray_running = false;
                envelope(true, "Xray 已停止", Value::Null)
            }
            ["server", "getConfigJson"] => ok(state.xray.clone()),
            ["server", "logs", count] => {
                let count: usize = count.parse().unwrap_or(0);
                let level = request.field("level").unwrap_or("info").to_string();
                let lines: Vec<Value> = (0..count)
                    .map(|i| Value::String(format!("{} memory panel line {}", level, i + 1)))
                    .collect();
                ok(Value::Array(lines))
            }
            ["server", "getNewX25519Cert"] => {
                let keypair = generate_x25519_keypair();
                ok(json!({"privateKey": keypair.private_key, "publicKey": keypair.public_key}))
            }
            ["server", "getDb"] => Ok(RawResponse {
                status: 200,
                body: state.db.clone(),
            }),
            ["server", "importDB"] => match &request.body {
                Body::Multipart { field, data, .. } if field == "db" => {
                    if !data.starts_with(DB_MAGIC) {
                        return fail("无效的数据库文件");
                    }
                    state.db = data.clone();
                    state.writes += 1;
                    envelope(true, "数据库已导入", Value::Null)
                }
                _ => fail("缺少 db 文件"),
            },

            ["panel", "setting", "all"] => ok(Value::Object(state.settings.clone())),
            ["panel", "setting", "update"] => {
                if let Body::Form(fields) = &request.body {
                    for (k, v) in fields {
                        let value = match state.settings.get(k) {
                            Some(Value::Number(_)) => v
                                .parse::<i64>()
                                .map(Value::from)
                                .unwrap_or_else(|_| Value::String(v.clone())),
                            Some(Value::Bool(_)) => Value::Bool(v == "true"),
                            _ => Value::String(v.clone()),
                        };
                        state.settings.insert(k.clone(), value);
                    }
                }
                state.writes += 1;
                envelope(true, "设置已保存", Value::Null)
            }
            ["panel", "setting", "restartPanel"] => envelope(true, "面板将重启", Value::Null),

            ["panel", "xray"] => {
                let tags: Vec<Value> = state
                    .inbounds
                    .iter()
                    .filter_map(|i| i.get("tag").cloned())
                    .collect();
                let obj = json!({
                    "xraySetting": state.xray.clone(),
                    "inboundTags": tags,
                    "outboundTestUrl": "https://www.google.com/generate_204"
                });
                ok(Value::String(serde_json::to_string(&obj)?))
            }
            ["panel", "xray", "update"] => {
                let raw = request.field("xraySetting").unwrap_or_default();
                match serde_json::from_str::<Value>(raw) {
                    Ok(doc @ Value::Object(_)) => {
                        state.xray = doc;
                        state.writes += 1;
                        envelope(true, "Xray 配置已保存", Value::Null)
                    }
                    _ => fail("xraySetting 不是有效的 JSON 对象"),
                }
            }

            ["panel", "inbound", "list"] => ok(Value::Array(
                state.inbounds.iter().cloned().map(Value::Object).collect(),
            )),
            ["panel", "inbound", "onlines"] => ok(json!([])),
            ["panel", "inbound", "add"] => {
                let port = parse_i64(request.field("port"));
                if state
                    .inbounds
                    .iter()
                    .any(|i| i.get("port").and_then(Value::as_i64) == Some(port))
                {
                    return fail(&format!("端口已存在: {}", port));
                }
                let id = state.next_id;
                state.next_id += 1;
                let mut record = Map::new();
                record.insert("id".into(), json!(id));
                apply_inbound_form(&mut record, &request);
                record.insert("clientStats".into(), json!([]));
                state.inbounds.push(record.clone());
                state.writes += 1;
                envelope(true, "入站已添加", Value::Object(record))
            }
            ["panel", "inbound", "update", id] => {
                let id: u64 = id.parse().unwrap_or(0);
                let Some(record) = state.inbounds.iter_mut().find(|i| record_id(i) == id) else {
                    return fail("入站不存在");
                };
                apply_inbound_form(record, &request);
                let record = record.clone();
                state.writes += 1;
                envelope(true, "入站已更新", Value::Object(record))
            }
            ["panel", "inbound", "del", id] => {
                let id: u64 = id.parse().unwrap_or(0);
                let before = state.inbounds.len();
                state.inbounds.retain(|i| record_id(i) != id);
                if state.inbounds.len() == before {
                    return fail("入站不存在");
                }
                state.writes += 1;
                envelope(true, "入站已删除", json!(id))
            }
            ["panel", "inbound", "import"] => {
                let raw = request.field("data").unwrap_or_default();
                let Ok(Value::Object(mut record)) = serde_json::from_str::<Value>(raw) else {
                    return fail("导入数据无效");
                };
                let id = state.next_id;
                state.next_id += 1;
                record.insert("id".into(), json!(id));
                state.inbounds.push(record.clone());
                state.writes += 1;
                envelope(true, "入站已导入", Value::Object(record))
            }
            ["panel", "inbound", "addClient"] => {
                let id = parse_i64(request.field("id")) as u64;
                let new_clients = parse_clients(request.field("settings"));
                let result = state.with_clients(id, |_, clients| {
                    clients.extend(new_clients);
                    true
                });
                state.finish_client_op(result, "客户端已添加")
            }
            ["panel", "inbound", "updateClient", key] => {
                let id = parse_i64(request.field("id")) as u64;
                let replacement = parse_clients(request.field("settings")).into_iter().next();
                let key = key.to_string();
                let result = state.with_clients(id, |field, clients| {
                    match (clients.iter_mut().find(|c| c[field] == key.as_str()), replacement) {
                        (Some(slot), Some(client)) => {
                            *slot = client;
                            true
                        }
                        _ => false,
                    }
                });
                state.finish_client_op(result, "客户端已更新")
            }
            ["panel", "inbound", id, "delClient", key] => {
                let id: u64 = id.parse().unwrap_or(0);
                let key = key.to_string();
                let result = state.with_clients(id, |field, clients| {
                    match clients.iter().position(|c| c[field] == key.as_str()) {
                        Some(i) => {
                            clients.remove(i);
                            true
                        }
                        None => false,
                    }
                });
                state.finish_client_op(result, "客户端已删除")
            }
            ["panel", "inbound", _, "resetClientTraffic", _] => {
                state.writes += 1;
                envelope(true, "流量已重置", Value::Null)
            }
            ["panel", "inbound", "clientIps", _] => ok(Value::String("No IP Record".into())),
            ["panel", "inbound", "clearClientIps", _] => {
                state.writes += 1;
                envelope(true, "IP 记录已清除", Value::Null)
            }
            _ => not_found(&path),
        }
    }
}

fn record_id(record: &Map<String, Value>) -> u64 {
    record.get("id").and_then(Value::as_u64).unwrap_or(0)
}

fn parse_clients(settings: Option<&str>) -> Vec<Value> {
    settings
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .and_then(|v| v.get("clients").and_then(Value::as_array).cloned())
        .unwrap_or_default()
}

fn apply_inbound_form(record: &mut Map<String, Value>, request: &Request) {
    for key in ["up", "down", "total", "expiryTime"] {
        record.insert(key.into(), json!(parse_i64(request.field(key))));
    }
    record.insert(
        "remark".into(),
        json!(request.field("remark").unwrap_or_default()),
    );
    record.insert(
        "enable".into(),
        json!(request.field("enable").map(|v| v == "true").unwrap_or(true)),
    );
    let listen = request.field("listen").unwrap_or_default().to_string();
    let port = parse_i64(request.field("port"));
    record.insert("listen".into(), json!(listen));
    record.insert("port".into(), json!(port));
    record.insert(
        "protocol".into(),
        json!(request.field("protocol").unwrap_or_default()),
    );
    for key in ["settings", "streamSettings", "sniffing"] {
        let value = request.field(key).unwrap_or_default();
        record.insert(key.into(), json!(value));
    }
    record.insert("tag".into(), json!(inbound_tag(&listen, port)));
}

impl PanelState {
    /// 在入站的 settings.clients 上执行操作并写回; None 表示入站不存在
    fn with_clients<F>(&mut self, id: u64, f: F) -> Option<bool>
    where
        F: FnOnce(&str, &mut Vec<Value>) -> bool,
    {
        let record = self.inbounds.iter_mut().find(|i| record_id(i) == id)?;
        let protocol = record
            .get("protocol")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut settings: Value = record
            .get("settings")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(|| json!({}));
        if let Some(map) = settings.as_object_mut() {
            if !map.get("clients").map(Value::is_array).unwrap_or(false) {
                map.insert("clients".into(), json!([]));
            }
        }
        let changed = match settings.get_mut("clients").and_then(Value::as_array_mut) {
            Some(clients) => f(client_key_field(&protocol), clients),
            None => false,
        };
        if changed {
            record.insert(
                "settings".into(),
                Value::String(serde_json::to_string(&settings).unwrap_or_default()),
            );
        }
        Some(changed)
    }

    fn finish_client_op(&mut self, result: Option<bool>, msg: &str) -> Result<RawResponse> {
        match result {
            None => fail("入站不存在"),
            Some(false) => fail("客户端不存在"),
            Some(true) => {
                self.writes += 1;
                envelope(true, msg, Value::Null)
            }
        }
    }
}

impl Transport for MemoryPanel {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<RawResponse>> {
        Box::pin(async move { self.handle(request) })
    }
}
