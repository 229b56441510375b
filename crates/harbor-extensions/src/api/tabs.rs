//! `tabs` namespace over the shell's tab host.

use async_trait::async_trait;
use harbor_tabs::TabSnapshot;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::groups::{group_tabs, ungroup_tabs};
use super::{parse, to_value, unknown_method, ApiHost, HostContext, OneOrMany, TabTargets};
use crate::match_pattern::MatchPatternSet;

const API: &str = "tabs";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CreateParams {
    url: Option<String>,
    active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct QueryParams {
    active: Option<bool>,
    pinned: Option<bool>,
    url: Option<OneOrMany<String>>,
    group_id: Option<i64>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateProperties {
    url: Option<String>,
    active: Option<bool>,
    pinned: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct UpdateParams {
    tab_id: Option<i64>,
    update_properties: UpdateProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TabIdParams {
    tab_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupParams {
    tab_ids: OneOrMany<i64>,
    #[serde(default)]
    group_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UngroupParams {
    tab_ids: OneOrMany<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageParams {
    tab_id: i64,
    #[serde(default)]
    message: Value,
}

pub struct TabsApi;

impl TabsApi {
    fn describe(cx: &HostContext, tab: Option<TabSnapshot>) -> Value {
        tab.map(|t| to_value(cx.shell.tab_descriptor(&t)))
            .unwrap_or(Value::Null)
    }

    fn create(params: CreateParams, cx: &HostContext) -> Value {
        let url = params
            .url
            .unwrap_or_else(|| cx.shell.settings.new_tab_url.clone());
        let handle = if params.active.unwrap_or(true) {
            cx.shell.tabs.new_tab(&url)
        } else {
            cx.shell.tabs.new_background_tab(&url)
        };
        debug!(extension = %cx.extension.id, url = %url, "tab created");
        Self::describe(cx, cx.shell.tabs.tab(handle))
    }

    fn query(params: QueryParams, cx: &HostContext) -> Value {
        let patterns = params
            .url
            .map(|u| MatchPatternSet::new(&u.into_vec()));
        let title = params.title.map(|t| t.to_lowercase());
        let matches: Vec<Value> = cx
            .shell
            .all_tabs()
            .into_iter()
            .filter(|t| params.active.is_none_or(|a| t.active == a))
            .filter(|t| params.pinned.is_none_or(|p| t.pinned == p))
            .filter(|t| params.group_id.is_none_or(|g| t.group_id == g))
            .filter(|t| patterns.as_ref().is_none_or(|p| p.test(&t.url)))
            .filter(|t| {
                title
                    .as_deref()
                    .is_none_or(|needle| t.title.to_lowercase().contains(needle))
            })
            .map(to_value)
            .collect();
        Value::Array(matches)
    }

    fn update(params: UpdateParams, cx: &HostContext) -> Value {
        let Some(tab) = cx.tab_or_active(params.tab_id) else {
            return Value::Null;
        };
        let props = params.update_properties;
        if let Some(url) = &props.url {
            cx.shell.tabs.navigate(tab.handle, url);
        }
        if let Some(pinned) = props.pinned {
            cx.shell.tabs.set_pinned(tab.handle, pinned);
        }
        if props.active == Some(true) {
            cx.shell.tabs.select(tab.handle);
        }
        Self::describe(cx, cx.shell.tabs.tab(tab.handle))
    }

    fn remove(targets: TabTargets, cx: &HostContext) -> Value {
        for id in targets.ids() {
            let Some(tab) = cx.shell.resolve_tab(id) else {
                debug!(tab = id, "remove of unknown tab ignored");
                continue;
            };
            cx.shell.tabs.close(tab.handle);
            cx.shell.ids.tabs.forget(tab.handle);
        }
        cx.shell.prune_windows();
        Value::Null
    }

    fn duplicate(tab_id: Option<i64>, cx: &HostContext) -> Value {
        let Some(tab) = tab_id.and_then(|id| cx.shell.resolve_tab(id)) else {
            return Value::Null;
        };
        let handle = cx.shell.tabs.new_tab(&tab.url);
        Self::describe(cx, cx.shell.tabs.tab(handle))
    }

    /// The calling context's tab. Contexts not hosted in a tab get the
    /// active tab.
    fn current(cx: &HostContext) -> Value {
        let tab = cx.origin_tab().or_else(|| cx.tab_or_active(None));
        Self::describe(cx, tab)
    }

    async fn send_message(params: SendMessageParams, cx: &HostContext) -> Value {
        let Some(tab) = cx.shell.resolve_tab(params.tab_id) else {
            return Value::Null;
        };
        let Some(response) = cx.shell.messaging.send_to_tab(
            &cx.extension.id,
            tab.handle,
            params.message,
            cx.sender(),
        ) else {
            return Value::Null;
        };
        response.await.unwrap_or(Value::Null)
    }
}

#[async_trait]
impl ApiHost for TabsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "create" => parse(API, method, params)
                .map(|p| Self::create(p, cx))
                .unwrap_or_default(),
            "query" => parse(API, method, params)
                .map(|p| Self::query(p, cx))
                .unwrap_or_else(|| json!([])),
            "update" => parse(API, method, params)
                .map(|p| Self::update(p, cx))
                .unwrap_or_default(),
            "remove" => parse(API, method, params)
                .map(|p| Self::remove(p, cx))
                .unwrap_or_default(),
            "duplicate" => parse::<TabIdParams>(API, method, params)
                .map(|p| Self::duplicate(p.tab_id, cx))
                .unwrap_or_default(),
            "get" => parse::<TabIdParams>(API, method, params)
                .and_then(|p| p.tab_id)
                .map(|id| Self::describe(cx, cx.shell.resolve_tab(id)))
                .unwrap_or_default(),
            "getCurrent" => Self::current(cx),
            "reload" => {
                let params = parse::<TabIdParams>(API, method, params).unwrap_or_default();
                if let Some(tab) = cx.tab_or_active(params.tab_id) {
                    cx.shell.tabs.reload(tab.handle);
                }
                Value::Null
            }
            "group" => match parse::<GroupParams>(API, method, params) {
                Some(p) => group_tabs(cx, &p.tab_ids.into_vec(), p.group_id),
                None => Value::Null,
            },
            "ungroup" => {
                if let Some(p) = parse::<UngroupParams>(API, method, params) {
                    ungroup_tabs(cx, &p.tab_ids.into_vec());
                }
                Value::Null
            }
            "sendMessage" => match parse(API, method, params) {
                Some(p) => Self::send_message(p, cx).await,
                None => {
                    warn!("tabs.sendMessage without a tab id");
                    Value::Null
                }
            },
            _ => unknown_method(API, method),
        }
    }
}
