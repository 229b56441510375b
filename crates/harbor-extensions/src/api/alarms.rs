use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse, to_value, unknown_method, ApiHost, HostContext};
use crate::state::AlarmSpec;

const API: &str = "alarms";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateParams {
    name: String,
    alarm_info: AlarmSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameParams {
    name: Option<String>,
}

pub struct AlarmsApi;

#[async_trait]
impl ApiHost for AlarmsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        let ext = &cx.extension.id;
        let alarms = &cx.shell.alarms;
        match method {
            "create" => {
                if let Some(p) = parse::<CreateParams>(API, method, params) {
                    alarms.create(ext, &p.name, &p.alarm_info);
                }
                Value::Null
            }
            "get" => parse::<NameParams>(API, method, params)
                .and_then(|p| alarms.get(ext, p.name.as_deref().unwrap_or_default()))
                .map(to_value)
                .unwrap_or_default(),
            "getAll" => to_value(alarms.all(ext)),
            "clear" => match parse::<NameParams>(API, method, params) {
                Some(NameParams { name: Some(name) }) => json!(alarms.clear(ext, &name)),
                // No name clears every alarm of the extension.
                Some(NameParams { name: None }) => {
                    alarms.clear_all(ext);
                    json!(true)
                }
                None => Value::Null,
            },
            "clearAll" => json!(alarms.clear_all(ext) > 0),
            _ => unknown_method(API, method),
        }
    }
}
