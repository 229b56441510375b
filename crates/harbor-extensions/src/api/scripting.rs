//! `scripting` namespace: programmatic injection into tabs the extension
//! holds host permission for.

use async_trait::async_trait;
use harbor_tabs::TabSnapshot;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse, unknown_method, ApiHost, HostContext};
use crate::bridge::content_script_prelude;

const API: &str = "scripting";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Target {
    tab_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExecuteParams {
    target: Target,
    files: Vec<String>,
    /// Function source text; scripts cannot ship closures over JSON.
    func: Option<String>,
    args: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CssParams {
    target: Target,
    css: Option<String>,
    files: Vec<String>,
}

/// Script that appends `css` to the document as a `<style>` element.
pub fn css_injection(css: &str) -> String {
    let css_json = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(function() {{ var s = document.createElement('style'); s.textContent = {css_json}; \
         (document.head || document.documentElement).appendChild(s); }})();"
    )
}

pub struct ScriptingApi;

impl ScriptingApi {
    /// The target tab, if it exists and the extension may script it.
    fn target(target: &Target, cx: &HostContext) -> Option<TabSnapshot> {
        let tab = cx.shell.resolve_tab(target.tab_id?)?;
        if !cx.can_script(&tab) {
            warn!(extension = %cx.extension.id, url = %tab.url, "no host permission for tab");
            return None;
        }
        Some(tab)
    }

    fn read_all(files: &[String], cx: &HostContext) -> Option<String> {
        let mut source = String::new();
        for file in files {
            let Some(text) = cx.extension.read_resource(file) else {
                warn!(extension = %cx.extension.id, file = %file, "injected file not readable");
                return None;
            };
            source.push_str(&text);
            source.push('\n');
        }
        Some(source)
    }

    fn execute(params: ExecuteParams, cx: &HostContext) -> Value {
        let Some(tab) = Self::target(&params.target, cx) else {
            return json!([]);
        };
        let body = match (&params.func, params.files.is_empty()) {
            (Some(func), _) => {
                let args = serde_json::to_string(&params.args).unwrap_or_else(|_| "[]".to_string());
                format!("({func}).apply(null, {args});")
            }
            (None, false) => match Self::read_all(&params.files, cx) {
                Some(source) => source,
                None => return json!([]),
            },
            (None, true) => {
                warn!("executeScript without func or files");
                return json!([]);
            }
        };
        let script = format!("{}\n{body}", content_script_prelude(&cx.extension.id));
        let result = cx.shell.tabs.evaluate(tab.handle, &script).unwrap_or_default();
        debug!(extension = %cx.extension.id, tab = ?tab.handle, "script executed");
        json!([{ "frameId": 0, "result": result }])
    }

    fn insert_css(params: CssParams, cx: &HostContext) -> Value {
        let Some(tab) = Self::target(&params.target, cx) else {
            return Value::Null;
        };
        let mut css = params.css.unwrap_or_default();
        if !params.files.is_empty() {
            let Some(source) = Self::read_all(&params.files, cx) else {
                return Value::Null;
            };
            css.push_str(&source);
        }
        cx.shell.tabs.evaluate(tab.handle, &css_injection(&css));
        Value::Null
    }
}

#[async_trait]
impl ApiHost for ScriptingApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        match method {
            "executeScript" => parse(API, method, params)
                .map(|p| Self::execute(p, cx))
                .unwrap_or_else(|| json!([])),
            "insertCSS" => parse(API, method, params)
                .map(|p| Self::insert_css(p, cx))
                .unwrap_or_default(),
            _ => unknown_method(API, method),
        }
    }
}
