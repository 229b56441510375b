use async_trait::async_trait;
use harbor_common::new_id;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse, unknown_method, ApiHost, HostContext};
use crate::shell::NotificationOptions;

const API: &str = "notifications";
pub const ON_CLICKED: &str = "notifications.onClicked";
pub const ON_CLOSED: &str = "notifications.onClosed";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateParams {
    notification_id: Option<String>,
    options: NotificationOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearParams {
    notification_id: String,
}

pub struct NotificationsApi;

#[async_trait]
impl ApiHost for NotificationsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        let center = &cx.shell.notifications;
        match method {
            "create" => {
                let Some(p) = parse::<CreateParams>(API, method, params) else {
                    return Value::Null;
                };
                let id = p
                    .notification_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(new_id);
                if center.show(&cx.extension.id, &id, &p.options).await {
                    json!(id)
                } else {
                    Value::Null
                }
            }
            "clear" => match parse::<ClearParams>(API, method, params) {
                Some(p) => json!(center.clear(&cx.extension.id, &p.notification_id)),
                None => json!(false),
            },
            "getAll" => {
                let shown: Map<String, Value> = center
                    .active(&cx.extension.id)
                    .into_iter()
                    .map(|id| (id, Value::Bool(true)))
                    .collect();
                Value::Object(shown)
            }
            _ => unknown_method(API, method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::Fixture;

    const MV2: &str = r#"{"manifest_version": 2, "name": "t", "version": "1",
        "permissions": ["notifications"]}"#;

    #[tokio::test]
    async fn create_returns_the_logical_id() {
        let fx = Fixture::new(MV2);
        let named = NotificationsApi
            .handle(
                "create",
                json!({"notificationId": "build", "options": {"title": "CI", "message": "green"}}),
                &fx.cx,
            )
            .await;
        assert_eq!(named, json!("build"));

        let generated = NotificationsApi
            .handle("create", json!({"options": {"title": "t", "message": "m"}}), &fx.cx)
            .await;
        assert!(!generated.as_str().unwrap().is_empty());

        let all = NotificationsApi.handle("getAll", json!({}), &fx.cx).await;
        assert_eq!(all.as_object().unwrap().len(), 2);
        assert_eq!(all["build"], true);
    }

    #[tokio::test]
    async fn clear_forgets_the_notification() {
        let fx = Fixture::new(MV2);
        NotificationsApi
            .handle("create", json!({"notificationId": "n", "options": {}}), &fx.cx)
            .await;
        let cleared = NotificationsApi
            .handle("clear", json!({"notificationId": "n"}), &fx.cx)
            .await;
        assert_eq!(cleared, json!(true));
        assert_eq!(NotificationsApi.handle("getAll", json!({}), &fx.cx).await, json!({}));
    }
}
