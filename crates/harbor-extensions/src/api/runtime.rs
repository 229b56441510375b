//! `runtime` namespace: messaging, ports, and extension metadata.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse, unknown_method, ApiHost, HostContext};

const API: &str = "runtime";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessageParams {
    message: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConnectParams {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortMessageParams {
    port_id: String,
    #[serde(default)]
    message: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortParams {
    port_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespondParams {
    response_id: String,
    #[serde(default)]
    response: Value,
    #[serde(default)]
    declined: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlParams {
    path: String,
}

pub struct RuntimeApi;

impl RuntimeApi {
    async fn send_message(message: Value, cx: &HostContext) -> Value {
        let Some(response) = cx.shell.messaging.send_message(
            &cx.extension.id,
            cx.origin.as_ref(),
            message,
            cx.sender(),
        ) else {
            return Value::Null;
        };
        // A dropped sender means every listener finished without answering.
        response.await.unwrap_or(Value::Null)
    }

    fn connect(name: &str, cx: &HostContext) -> Value {
        let Some(origin) = &cx.origin else {
            warn!(extension = %cx.extension.id, "runtime.connect without a calling context");
            return Value::Null;
        };
        json!(cx
            .shell
            .messaging
            .connect(&cx.extension.id, origin, name, cx.sender()))
    }

    fn platform_info() -> Value {
        let os = match std::env::consts::OS {
            "macos" => "mac",
            "windows" => "win",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "x86-64",
            "aarch64" => "arm64",
            other => other,
        };
        json!({ "os": os, "arch": arch, "nacl_arch": arch })
    }
}

#[async_trait]
impl ApiHost for RuntimeApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "sendMessage" => {
                let params = parse::<MessageParams>(API, method, params).unwrap_or_default();
                Self::send_message(params.message, cx).await
            }
            "connect" => {
                let params = parse::<ConnectParams>(API, method, params).unwrap_or_default();
                Self::connect(&params.name, cx)
            }
            "postPortMessage" => {
                let (Some(p), Some(origin)) =
                    (parse::<PortMessageParams>(API, method, params), &cx.origin)
                else {
                    return json!(0);
                };
                json!(cx
                    .shell
                    .messaging
                    .post_port_message(&p.port_id, origin.id(), p.message))
            }
            "disconnectPort" => {
                let Some(p) = parse::<PortParams>(API, method, params) else {
                    return json!(false);
                };
                debug!(port = %p.port_id, "port disconnected");
                json!(cx.shell.messaging.disconnect_port(&p.port_id))
            }
            "respond" => match parse::<RespondParams>(API, method, params) {
                Some(p) if p.declined => json!(cx.shell.messaging.decline(&p.response_id)),
                Some(p) => json!(cx.shell.messaging.respond(&p.response_id, p.response)),
                None => json!(false),
            },
            "getManifest" => cx.extension.manifest.raw.clone(),
            "getURL" => {
                let params = parse::<UrlParams>(API, method, params).unwrap_or_default();
                json!(cx.extension.resource_url(&params.path))
            }
            "getPlatformInfo" => Self::platform_info(),
            "getId" => json!(cx.extension.id.as_str()),
            _ => unknown_method(API, method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Fixture, MV3};
    use crate::bridge::{RecordingContext, ScriptContext};
    use crate::messaging::{ON_CONNECT, ON_MESSAGE, ON_PORT_MESSAGE};
    use std::sync::Arc;

    fn register(fx: &Fixture) -> (Arc<RecordingContext>, Arc<RecordingContext>) {
        let background = Arc::new(RecordingContext::background());
        let page = Arc::new(RecordingContext::page(None));
        let background_dyn: Arc<dyn ScriptContext> = background.clone();
        let page_dyn: Arc<dyn ScriptContext> = page.clone();
        fx.cx.shell.messaging.register_background(&fx.cx.extension.id, &background_dyn);
        fx.cx.shell.messaging.register_page(&fx.cx.extension.id, &page_dyn);
        (background, page)
    }

    #[tokio::test]
    async fn page_message_reaches_background_and_gets_answer() {
        let fx = Fixture::new(MV3);
        let (background, page) = register(&fx);
        let cx = fx.from(page.clone());

        let pending = tokio::spawn(async move {
            RuntimeApi
                .handle("sendMessage", json!({"message": "hello"}), &cx)
                .await
        });
        let delivered = loop {
            if let Some(event) = background.events(ON_MESSAGE).pop() {
                break event;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(delivered["message"], "hello");
        assert_eq!(delivered["sender"]["id"], "test-ext");
        assert!(page.events(ON_MESSAGE).is_empty());

        let response_id = delivered["responseId"].clone();
        let first = RuntimeApi
            .handle("respond", json!({"responseId": response_id, "response": 1}), &fx.cx)
            .await;
        let second = RuntimeApi
            .handle("respond", json!({"responseId": response_id, "response": 2}), &fx.cx)
            .await;
        assert_eq!(first, json!(true));
        assert_eq!(second, json!(false));
        assert_eq!(pending.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn declining_background_resolves_to_null() {
        let fx = Fixture::new(MV3);
        let (background, page) = register(&fx);
        let cx = fx.from(page);

        let pending = tokio::spawn(async move {
            RuntimeApi
                .handle("sendMessage", json!({"message": "anyone?"}), &cx)
                .await
        });
        let delivered = loop {
            if let Some(event) = background.events(ON_MESSAGE).pop() {
                break event;
            }
            tokio::task::yield_now().await;
        };
        let declined = RuntimeApi
            .handle(
                "respond",
                json!({"responseId": delivered["responseId"], "declined": true}),
                &fx.cx,
            )
            .await;
        assert_eq!(declined, json!(true));
        assert_eq!(pending.await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn message_without_recipient_is_null() {
        let fx = Fixture::new(MV3);
        let page: Arc<dyn ScriptContext> = Arc::new(RecordingContext::page(None));
        let reply = RuntimeApi
            .handle("sendMessage", json!({"message": 1}), &fx.from(page))
            .await;
        assert_eq!(reply, Value::Null);
    }

    #[tokio::test]
    async fn ports_carry_messages_both_ways() {
        let fx = Fixture::new(MV3);
        let (background, page) = register(&fx);
        let page_cx = fx.from(page.clone());
        let background_cx = fx.from(background.clone());

        let port = RuntimeApi.handle("connect", json!({"name": "feed"}), &page_cx).await;
        let connected = background.events(ON_CONNECT);
        assert_eq!(connected[0]["portId"], port);
        assert_eq!(connected[0]["name"], "feed");

        let delivered = RuntimeApi
            .handle("postPortMessage", json!({"portId": port, "message": "up"}), &page_cx)
            .await;
        assert_eq!(delivered, json!(1));
        assert_eq!(background.events(ON_PORT_MESSAGE)[0]["message"], "up");

        RuntimeApi
            .handle("postPortMessage", json!({"portId": port, "message": "down"}), &background_cx)
            .await;
        assert_eq!(page.events(ON_PORT_MESSAGE)[0]["message"], "down");

        let closed = RuntimeApi.handle("disconnectPort", json!({"portId": port}), &page_cx).await;
        assert_eq!(closed, json!(true));
        let after = RuntimeApi
            .handle("postPortMessage", json!({"portId": port, "message": "late"}), &page_cx)
            .await;
        assert_eq!(after, json!(0));
    }

    #[tokio::test]
    async fn metadata_methods() {
        let fx = Fixture::new(MV3);
        let manifest = RuntimeApi.handle("getManifest", json!({}), &fx.cx).await;
        assert_eq!(manifest["manifest_version"], 3);
        let url = RuntimeApi.handle("getURL", json!({"path": "/popup.html"}), &fx.cx).await;
        assert_eq!(url, json!("chrome-extension://test-ext/popup.html"));
        let info = RuntimeApi.handle("getPlatformInfo", json!({}), &fx.cx).await;
        assert!(info["os"].is_string());
    }
}
