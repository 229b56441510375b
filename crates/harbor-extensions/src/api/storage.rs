//! `storage.local` and `storage.session`. Methods arrive as
//! `<area>.<method>`, e.g. `local.get`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::{parse, unknown_method, ApiHost, HostContext, OneOrMany};
use crate::state::{AreaName, ExtensionStorage, KeySelector, StorageChanges};

const API: &str = "storage";
pub const ON_CHANGED: &str = "storage.onChanged";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeysParams {
    keys: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SetParams {
    items: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RemoveParams {
    keys: OneOrMany<String>,
}

pub struct StorageApi;

impl StorageApi {
    /// Tell every live context of the extension what changed.
    fn notify(cx: &HostContext, area: AreaName, changes: StorageChanges) {
        if changes.is_empty() {
            return;
        }
        cx.shell.messaging.broadcast(
            &cx.extension.id,
            ON_CHANGED,
            ExtensionStorage::changed_event(changes, area),
        );
    }
}

#[async_trait]
impl ApiHost for StorageApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        let Some((area_name, op)) = method
            .split_once('.')
            .and_then(|(area, op)| AreaName::parse(area).map(|a| (a, op)))
        else {
            return unknown_method(API, method);
        };
        let area = cx.extension.storage.area(area_name);

        match op {
            "get" => {
                let keys = parse::<KeysParams>(API, method, params)
                    .and_then(|p| KeySelector::from_value(p.keys.as_ref()));
                match keys {
                    Some(keys) => Value::Object(area.get(&keys)),
                    None => Value::Null,
                }
            }
            "set" => {
                let Some(p) = parse::<SetParams>(API, method, params) else {
                    return Value::Null;
                };
                match area.set(p.items) {
                    Ok(changes) => Self::notify(cx, area_name, changes),
                    Err(e) => warn!(extension = %cx.extension.id, error = %e, "storage set rejected"),
                }
                Value::Null
            }
            "remove" => {
                if let Some(p) = parse::<RemoveParams>(API, method, params) {
                    let changes = area.remove(&p.keys.into_vec());
                    Self::notify(cx, area_name, changes);
                }
                Value::Null
            }
            "clear" => {
                let changes = area.clear();
                Self::notify(cx, area_name, changes);
                Value::Null
            }
            "getBytesInUse" => Value::from(area.bytes_in_use()),
            _ => unknown_method(API, method),
        }
    }
}
