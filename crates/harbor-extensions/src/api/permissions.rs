use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{parse, to_value, unknown_method, ApiHost, HostContext};

const API: &str = "permissions";

/// The `Permissions` object scripts pass around.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PermissionSet {
    permissions: Vec<String>,
    origins: Vec<String>,
}

pub struct PermissionsApi;

impl PermissionsApi {
    async fn request(set: PermissionSet, cx: &HostContext) -> bool {
        let already = cx
            .extension
            .permissions()
            .contains(&set.permissions, &set.origins);
        if already {
            return true;
        }

        let manifest = &cx.extension.manifest;
        let undeclared: Vec<&String> = set
            .permissions
            .iter()
            .filter(|p| {
                !manifest.permissions.contains(p) && !manifest.optional_permissions.contains(p)
            })
            .collect();
        if !undeclared.is_empty() {
            warn!(extension = %cx.extension.id, ?undeclared, "request for undeclared permissions");
            return false;
        }

        let approved = cx
            .shell
            .consent
            .request(&manifest.name, &set.permissions, &set.origins)
            .await;
        if approved {
            cx.extension
                .permissions()
                .grant(&set.permissions, &set.origins);
        }
        info!(extension = %cx.extension.id, approved, "permission request resolved");
        approved
    }
}

#[async_trait]
impl ApiHost for PermissionsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "contains" => {
                let set = parse::<PermissionSet>(API, method, params).unwrap_or_default();
                let held = cx
                    .extension
                    .permissions()
                    .contains(&set.permissions, &set.origins);
                json!(held)
            }
            "request" => match parse::<PermissionSet>(API, method, params) {
                Some(set) => json!(Self::request(set, cx).await),
                None => json!(false),
            },
            "getAll" => {
                let snapshot = cx.extension.permissions().snapshot();
                to_value(snapshot)
            }
            "remove" => {
                let Some(set) = parse::<PermissionSet>(API, method, params) else {
                    return json!(false);
                };
                let removed = cx
                    .extension
                    .permissions()
                    .revoke(&set.permissions, &set.origins);
                json!(removed)
            }
            _ => unknown_method(API, method),
        }
    }
}
