//! `tabGroups` namespace plus the grouping half of `tabs`. Groups are the
//! tab host's folders.

use async_trait::async_trait;
use harbor_common::FolderHandle;
use harbor_tabs::{FolderSnapshot, FolderUpdate};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse, to_value, unknown_method, ApiHost, HostContext};
use crate::shell::GROUP_COLORS;

const API: &str = "tabGroups";

/// Add tabs to `group_id`, or to a fresh group when absent. Returns the
/// group id, or `null` when nothing could be grouped.
pub(crate) fn group_tabs(cx: &HostContext, tab_ids: &[i64], group_id: Option<i64>) -> Value {
    let tabs: Vec<_> = tab_ids
        .iter()
        .filter_map(|id| cx.shell.resolve_tab(*id))
        .collect();
    if tabs.is_empty() {
        debug!(?tab_ids, "no live tabs to group");
        return Value::Null;
    }
    let folder = match group_id {
        Some(id) => match cx.shell.resolve_group(id) {
            Some(folder) => folder.handle,
            None => {
                warn!(group = id, "tabs.group into unknown group");
                return Value::Null;
            }
        },
        None => new_group(cx),
    };
    for tab in &tabs {
        cx.shell.tabs.assign_folder(tab.handle, Some(folder));
    }
    json!(cx.shell.ids.groups.id_for(folder))
}

fn new_group(cx: &HostContext) -> FolderHandle {
    let title = cx.shell.next_group_title();
    let color = GROUP_COLORS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(GROUP_COLORS[0]);
    cx.shell.tabs.create_folder(&title, color)
}

pub(crate) fn ungroup_tabs(cx: &HostContext, tab_ids: &[i64]) {
    for tab in tab_ids.iter().filter_map(|id| cx.shell.resolve_tab(*id)) {
        cx.shell.tabs.assign_folder(tab.handle, None);
    }
    // Emptied folders are gone from the host; drop their ids too.
    let live = cx.shell.tabs.folders();
    cx.shell.ids.groups.retain(|handle| live.contains(handle));
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryParams {
    pinned: Option<bool>,
    collapsed: Option<bool>,
    title: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateProperties {
    title: Option<String>,
    color: Option<String>,
    collapsed: Option<bool>,
    pinned: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    group_id: i64,
    #[serde(default)]
    update_properties: UpdateProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetParams {
    group_id: i64,
}

pub struct TabGroupsApi;

impl TabGroupsApi {
    fn query(params: QueryParams, cx: &HostContext) -> Value {
        let needle = params.title.map(|t| t.to_lowercase());
        let groups: Vec<Value> = cx
            .shell
            .tabs
            .folders()
            .into_iter()
            .filter_map(|f| cx.shell.tabs.folder(f))
            .filter(|f: &FolderSnapshot| params.pinned.is_none_or(|p| f.pinned == p))
            .filter(|f| params.collapsed.is_none_or(|c| f.collapsed == c))
            .filter(|f| params.color.as_deref().is_none_or(|c| f.color == c))
            .filter(|f| {
                needle
                    .as_deref()
                    .is_none_or(|n| f.title.to_lowercase().contains(n))
            })
            .map(|f| to_value(cx.shell.group_descriptor(&f)))
            .collect();
        Value::Array(groups)
    }

    fn update(params: UpdateParams, cx: &HostContext) -> Value {
        let Some(folder) = cx.shell.resolve_group(params.group_id) else {
            return Value::Null;
        };
        let props = params.update_properties;
        if let Some(color) = &props.color {
            if !GROUP_COLORS.contains(&color.as_str()) {
                warn!(color = %color, "unsupported group color");
                return Value::Null;
            }
        }
        cx.shell.tabs.update_folder(
            folder.handle,
            FolderUpdate {
                title: props.title,
                color: props.color,
                collapsed: props.collapsed,
                pinned: props.pinned,
            },
        );
        cx.shell
            .tabs
            .folder(folder.handle)
            .map(|f| to_value(cx.shell.group_descriptor(&f)))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ApiHost for TabGroupsApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "query" => parse(API, method, params)
                .map(|p| Self::query(p, cx))
                .unwrap_or_else(|| json!([])),
            "update" => parse(API, method, params)
                .map(|p| Self::update(p, cx))
                .unwrap_or_default(),
            "get" => parse::<GetParams>(API, method, params)
                .and_then(|p| cx.shell.resolve_group(p.group_id))
                .map(|f| to_value(cx.shell.group_descriptor(&f)))
                .unwrap_or_default(),
            _ => unknown_method(API, method),
        }
    }
}
