use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse, unknown_method, ApiHost, HostContext};
use crate::state::menus::menu_id;
use crate::state::MenuProps;

const API: &str = "contextMenus";
pub const ON_CLICKED: &str = "contextMenus.onClicked";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    id: Value,
    #[serde(default)]
    update_properties: MenuProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveParams {
    #[serde(alias = "menuItemId")]
    id: Value,
}

pub struct ContextMenusApi;

#[async_trait]
impl ApiHost for ContextMenusApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "create" => {
                // `{props: {...}}` and bare create-properties are both accepted.
                let props = match params {
                    Value::Object(mut map) if map.contains_key("props") => {
                        map.remove("props").unwrap_or_default()
                    }
                    other => other,
                };
                match parse::<MenuProps>(API, method, props) {
                    Some(props) => {
                        let id = cx.extension.menus().create(props);
                        json!(id)
                    }
                    None => Value::Null,
                }
            }
            "update" => {
                let Some(p) = parse::<UpdateParams>(API, method, params) else {
                    return json!(false);
                };
                let Some(id) = menu_id(&p.id) else {
                    return json!(false);
                };
                let updated = cx.extension.menus().update(&id, p.update_properties);
                json!(updated)
            }
            "remove" => {
                let Some(id) = parse::<RemoveParams>(API, method, params).and_then(|p| menu_id(&p.id))
                else {
                    return json!(false);
                };
                let removed = cx.extension.menus().remove(&id);
                json!(removed)
            }
            "removeAll" => {
                cx.extension.menus().remove_all();
                Value::Null
            }
            _ => unknown_method(API, method),
        }
    }
}
