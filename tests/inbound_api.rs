use serde_json::{json, Value};
use std::sync::Arc;

use xui_client::protocol::inbound::{StreamInbound, VlessSettings};
use xui_client::protocol::{ClientOptions, ClientRoster};
use xui_client::transport::{RealitySettings, StreamSettings, WsSettings};
use xui_client::xray::{InboundUpdate, NewInbound};
use xui_client::{ClientConfig, InboundConfig, MemoryPanel, Protocol, XuiClient, XuiError};

const ALICE: &str = "b831381d-6324-4d53-ad4f-8cda48b30811";

fn connect() -> (XuiClient, Arc<MemoryPanel>) {
    let panel = Arc::new(MemoryPanel::new());
    let config = ClientConfig::new("127.0.0.1", 2053).with_credentials("admin", "admin");
    let client = XuiClient::with_transport(config, panel.clone());
    (client, panel)
}

async fn logged_in() -> (XuiClient, Arc<MemoryPanel>) {
    let (client, panel) = connect();
    client.login().await.unwrap();
    (client, panel)
}

fn seed_vmess(panel: &MemoryPanel) -> u64 {
    panel.seed_inbound(json!({
        "id": 5,
        "up": 0,
        "down": 0,
        "total": 0,
        "remark": "old",
        "enable": true,
        "expiryTime": 0,
        "clientStats": [],
        "listen": "",
        "port": 10086,
        "protocol": "vmess",
        "settings": format!(
            "{{\n  \"clients\": [\n    {{\n      \"id\": \"{}\",\n      \"email\": \"alice\",\n      \"limitIp\": 0,\n      \"totalGB\": 0,\n      \"expiryTime\": 0,\n      \"enable\": true,\n      \"tgId\": \"\",\n      \"subId\": \"s1\",\n      \"reset\": 0\n    }}\n  ]\n}}",
            ALICE
        ),
        "streamSettings": "{\"network\":\"tcp\",\"security\":\"none\",\"tcpSettings\":{\"header\":{\"type\":\"none\"}}}",
        "tag": "inbound-10086",
        "sniffing": "{\"enabled\":true,\"destOverride\":[\"http\",\"tls\"]}"
    }))
}

#[tokio::test]
async fn test_login_probe_and_rejection() {
    let (client, panel) = connect();
    assert!(!client.is_logged_in().await);

    let first = client.login().await.unwrap();
    assert!(first.response);
    let second = client.login().await.unwrap();
    assert!(!second.response);
    assert!(panel.requests().iter().filter(|r| r.ends_with(" login")).count() == 1);

    let config = ClientConfig::new("127.0.0.1", 2053).with_credentials("admin", "wrong");
    let stranger = XuiClient::with_transport(config, Arc::new(MemoryPanel::new()));
    let err = stranger.login().await.unwrap_err();
    assert!(matches!(err, XuiError::RemoteRejected { .. }));
    assert_eq!(err.code(), 500);
}

#[tokio::test]
async fn test_add_vless_then_list() {
    let (client, _panel) = logged_in().await;

    let mut settings = VlessSettings::default();
    settings.add_client(ClientOptions::new().id(ALICE).email("alice"));
    let config = InboundConfig::Vless(
        StreamInbound::new(443, settings).with_stream(StreamSettings::new(
            WsSettings::new("/ws"),
            RealitySettings::generate(),
        )),
    );

    let added = client
        .inbounds()
        .add(NewInbound::new(config.clone()).remark("edge").expiry_time(1_800_000_000))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(added.tag, "inbound-443");
    assert_eq!(added.record()["expiryTime"], 1_800_000_000_000i64);

    let list = client.inbounds().list().await.unwrap().into_inner();
    assert_eq!(list.len(), 1);
    let settings: Value = serde_json::from_str(list[0].settings_text()).unwrap();
    assert_eq!(settings["clients"][0]["id"], ALICE);
    assert_eq!(list[0].config, config);
    assert_eq!(list[0].expiry_time, 1_800_000_000);
}

#[tokio::test]
async fn test_duplicate_port_is_rejected() {
    let (client, _panel) = logged_in().await;
    let config = InboundConfig::generate(&Protocol::Trojan).unwrap();

    client.inbounds().add(NewInbound::new(config.clone())).await.unwrap();
    let err = client.inbounds().add(NewInbound::new(config)).await.unwrap_err();
    assert!(matches!(err, XuiError::RemoteRejected { .. }));
}

#[tokio::test]
async fn test_remark_only_update_keeps_settings_text() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);
    let before = client.inbounds().get(id).await.unwrap().into_inner();

    let updated = client
        .inbounds()
        .update(id, InboundUpdate::new().remark("new"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(updated.remark, "new");

    let after = client.inbounds().get(id).await.unwrap().into_inner();
    assert_eq!(after.settings_text(), before.settings_text());
    assert_eq!(after.record()["streamSettings"], before.record()["streamSettings"]);
    assert_eq!(after.record()["sniffing"], before.record()["sniffing"]);
    assert_eq!(after.port(), 10086);
    assert_eq!(panel.writes(), 1);
}

#[tokio::test]
async fn test_protocol_mismatch_uploads_nothing() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);

    let trojan = InboundConfig::generate(&Protocol::Trojan).unwrap();
    let err = client
        .inbounds()
        .update(id, InboundUpdate::new().config(trojan))
        .await
        .unwrap_err();
    match &err {
        XuiError::ProtocolMismatch { expected, found } => {
            assert_eq!(expected, "vmess");
            assert_eq!(found, "trojan");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(err.code(), 500);
    assert_eq!(panel.writes(), 0);
    assert!(!panel.requests().iter().any(|r| r.contains("inbound/update")));
}

#[tokio::test]
async fn test_get_missing_and_delete() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);

    let err = client.inbounds().get(99).await.unwrap_err();
    assert_eq!(err.code(), 404);
    assert!(client.inbounds().exist(id).await.unwrap().response);

    client.inbounds().delete(id).await.unwrap();
    assert!(!client.inbounds().exist(id).await.unwrap().response);
}

#[tokio::test]
async fn test_export_then_import() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);

    let exported = client.inbounds().export(id).await.unwrap().into_inner();
    client.inbounds().delete(id).await.unwrap();

    let imported = client.inbounds().import(&exported).await.unwrap().into_inner();
    assert_ne!(imported.id, 0);
    assert_eq!(imported.protocol(), Protocol::Vmess);
    assert_eq!(imported.settings_text(), panel.inbound_records()[0]["settings"]);

    assert!(client.inbounds().import("[1, 2]").await.is_err());
}

#[tokio::test]
async fn test_client_endpoints() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);
    let inbounds = client.inbounds();

    let key = inbounds
        .add_client(id, ClientOptions::new().email("bob").limit_ip(2u32))
        .await
        .unwrap()
        .into_inner();
    assert!(uuid::Uuid::parse_str(&key).is_ok());

    let inbound = inbounds.get(id).await.unwrap().into_inner();
    let bob = inbound.config.find_client(&key).unwrap();
    assert_eq!(bob.email, "bob");
    assert_eq!(bob.limit_ip, 2);
    assert!(bob.enable);

    let updated = inbounds
        .update_client(id, &key, &ClientOptions::new().enable(false))
        .await
        .unwrap()
        .into_inner();
    assert!(!updated.enable);
    assert_eq!(updated.email, "bob");
    assert_eq!(updated.sub_id, bob.sub_id);

    inbounds.reset_client_traffic(id, "bob").await.unwrap();
    inbounds.clear_client_ips("bob").await.unwrap();
    assert_eq!(
        inbounds.client_ips("bob").await.unwrap().response,
        json!("No IP Record")
    );
    assert!(inbounds.onlines().await.unwrap().response.is_empty());

    inbounds.delete_client(id, &key).await.unwrap();
    let inbound = inbounds.get(id).await.unwrap().into_inner();
    assert!(inbound.config.find_client(&key).is_none());
    assert_eq!(inbound.config.clients().unwrap().len(), 1);

    let err = inbounds
        .update_client(id, &key, &ClientOptions::new().enable(true))
        .await
        .unwrap_err();
    assert_eq!(err.code(), 404);
}

#[tokio::test]
async fn test_transport_failures_surface_as_errors() {
    let (client, panel) = logged_in().await;

    panel.reject_next("数据库繁忙");
    match client.inbounds().list().await {
        Err(XuiError::RemoteRejected { msg }) => assert_eq!(msg, "数据库繁忙"),
        other => panic!("unexpected {:?}", other.map(|r| r.response.len())),
    }

    panel.fail_next(502);
    let err = client.inbounds().list().await.unwrap_err();
    assert_eq!(err.code(), 502);

    let outcome = xui_client::Outcome::from_result(client.inbounds().get(42).await);
    assert!(!outcome.ok);
    assert_eq!(outcome.error_code, Some(404));
}

#[tokio::test]
async fn test_vmess_client_by_email_keeps_stock_fields() {
    let (client, panel) = logged_in().await;
    let id = seed_vmess(&panel);
    let stored_settings = |panel: &MemoryPanel| -> Value {
        serde_json::from_str(panel.inbound_records()[0]["settings"].as_str().unwrap()).unwrap()
    };
    let stock = stored_settings(&panel);

    client
        .inbounds()
        .update_client(id, "alice", &ClientOptions::new().limit_ip(3u32))
        .await
        .unwrap();
    assert!(panel
        .requests()
        .iter()
        .any(|r| r.ends_with(&format!("updateClient/{}", ALICE))));

    let stored = stored_settings(&panel);
    let mut expected = stock["clients"][0].clone();
    expected["limitIp"] = json!(3);
    assert_eq!(stored["clients"][0], expected);
    assert_eq!(stored["clients"][0]["tgId"], "");

    client.inbounds().delete_client(id, "alice").await.unwrap();
    assert!(panel
        .requests()
        .iter()
        .any(|r| r.ends_with(&format!("delClient/{}", ALICE))));
    let inbound = client.inbounds().get(id).await.unwrap().into_inner();
    assert!(inbound.config.clients().unwrap().is_empty());
    assert_eq!(
        client.inbounds().delete_client(id, "alice").await.unwrap_err().code(),
        404
    );
}
