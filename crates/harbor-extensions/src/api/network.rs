//! Request interception: observer filters under MV2 (`webRequest`) and
//! declarative rules under MV3 (`declarativeNetRequest`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{parse, to_value, unknown_method, ApiHost, HostContext};
use crate::state::{NetRule, RequestFilter};

pub const ON_BEFORE_REQUEST: &str = "webRequest.onBeforeRequest";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListenerParams {
    filter: RequestFilter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpdateRulesParams {
    add_rules: Vec<NetRule>,
    remove_rule_ids: Vec<i64>,
}

pub struct WebRequestApi;

#[async_trait]
impl ApiHost for WebRequestApi {
    fn namespace(&self) -> &'static str {
        "webRequest"
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "addListener" => {
                if let Some(p) = parse::<ListenerParams>(self.namespace(), method, params) {
                    cx.extension.net().add_observer(p.filter);
                }
                Value::Null
            }
            "removeListeners" => {
                cx.extension.net().clear_observers();
                Value::Null
            }
            _ => unknown_method(self.namespace(), method),
        }
    }
}

pub struct DeclarativeNetRequestApi;

#[async_trait]
impl ApiHost for DeclarativeNetRequestApi {
    fn namespace(&self) -> &'static str {
        "declarativeNetRequest"
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "updateDynamicRules" => {
                if let Some(p) = parse::<UpdateRulesParams>(self.namespace(), method, params) {
                    cx.extension
                        .net()
                        .update_rules(p.add_rules, &p.remove_rule_ids);
                }
                Value::Null
            }
            "getDynamicRules" => {
                let rules = cx.extension.net().rules();
                to_value(rules)
            }
            _ => unknown_method(self.namespace(), method),
        }
    }
}
