//! `windows` namespace. The shell has a single real window, so script
//! windows are synthetic: each wraps exactly one tab.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse, to_value, unknown_method, ApiHost, HostContext};
use crate::shell::WINDOW_TYPE;

const API: &str = "windows";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateParams {
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateInfo {
    focused: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    window_id: i64,
    #[serde(default)]
    update_info: UpdateInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetParams {
    window_id: i64,
    #[serde(default)]
    populate: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GetAllParams {
    populate: bool,
    window_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveParams {
    window_id: i64,
}

pub struct WindowsApi;

impl WindowsApi {
    fn create(params: CreateParams, cx: &HostContext) -> Value {
        if let Some(kind) = params.kind.as_deref().filter(|k| *k != WINDOW_TYPE) {
            debug!(requested = kind, "window type coerced to popup");
        }
        let url = params
            .url
            .unwrap_or_else(|| cx.shell.settings.new_tab_url.clone());
        let tab = cx.shell.tabs.new_tab(&url);
        let handle = cx.shell.windows.open(tab, Some(cx.extension.id.clone()));
        info!(extension = %cx.extension.id, url = %url, "window opened");
        cx.shell
            .windows
            .get(handle)
            .map(|w| to_value(cx.shell.window_descriptor(&w, true)))
            .unwrap_or_default()
    }

    fn update(params: UpdateParams, cx: &HostContext) -> Value {
        let Some(window) = cx.shell.resolve_window(params.window_id) else {
            return Value::Null;
        };
        if params.update_info.focused == Some(true) {
            cx.shell.tabs.select(window.tab);
        }
        to_value(cx.shell.window_descriptor(&window, false))
    }

    fn get_all(params: GetAllParams, cx: &HostContext) -> Value {
        cx.shell.prune_windows();
        if let Some(types) = &params.window_types {
            if !types.iter().any(|t| t == WINDOW_TYPE) {
                return json!([]);
            }
        }
        let windows: Vec<Value> = cx
            .shell
            .windows
            .all()
            .iter()
            .map(|w| to_value(cx.shell.window_descriptor(w, params.populate)))
            .collect();
        Value::Array(windows)
    }

    /// Window wrapping the calling tab, else the one wrapping the active tab.
    fn current(cx: &HostContext) -> Value {
        cx.shell.prune_windows();
        let tab = cx
            .origin_tab()
            .map(|t| t.handle)
            .or_else(|| cx.shell.tabs.active_tab());
        tab.and_then(|t| cx.shell.windows.for_tab(t))
            .map(|w| to_value(cx.shell.window_descriptor(&w, false)))
            .unwrap_or_default()
    }

    fn remove(params: RemoveParams, cx: &HostContext) -> Value {
        let Some(window) = cx.shell.resolve_window(params.window_id) else {
            return Value::Null;
        };
        cx.shell.windows.remove(window.handle);
        cx.shell.ids.windows.forget(window.handle);
        cx.shell.tabs.close(window.tab);
        cx.shell.ids.tabs.forget(window.tab);
        Value::Null
    }
}

#[async_trait]
impl ApiHost for WindowsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "create" => parse(API, method, params)
                .map(|p| Self::create(p, cx))
                .unwrap_or_default(),
            "update" => parse(API, method, params)
                .map(|p| Self::update(p, cx))
                .unwrap_or_default(),
            "get" => parse::<GetParams>(API, method, params)
                .and_then(|p| {
                    cx.shell
                        .resolve_window(p.window_id)
                        .map(|w| to_value(cx.shell.window_descriptor(&w, p.populate)))
                })
                .unwrap_or_default(),
            "getAll" => parse(API, method, params)
                .map(|p| Self::get_all(p, cx))
                .unwrap_or_else(|| json!([])),
            "getCurrent" | "getLastFocused" => Self::current(cx),
            "remove" => parse(API, method, params)
                .map(|p| Self::remove(p, cx))
                .unwrap_or_default(),
            _ => unknown_method(API, method),
        }
    }
}
