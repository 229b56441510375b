use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse, unknown_method, ApiHost, HostContext, OneOrMany};
use crate::state::i18n::ui_language;

const API: &str = "i18n";

#[derive(Debug, Deserialize)]
struct MessageParams {
    key: String,
    #[serde(default)]
    substitutions: Option<OneOrMany<Value>>,
}

/// Substitutions arrive as strings or numbers; both print as text.
fn substitution_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

pub struct I18nApi;

#[async_trait]
impl ApiHost for I18nApi {
    fn namespace(&self) -> &'static str {
        API
    }

    async fn handle(&self, method: &str, params: Value, cx: &HostContext) -> Value {
        let locale = &cx.shell.settings.user_locale;
        match method {
            "getMessage" => {
                let Some(p) = parse::<MessageParams>(API, method, params) else {
                    return Value::Null;
                };
                let substitutions: Vec<String> = p
                    .substitutions
                    .map(OneOrMany::into_vec)
                    .unwrap_or_default()
                    .into_iter()
                    .map(substitution_text)
                    .collect();
                // Null when no catalog in the locale chain has the key.
                cx.extension
                    .catalogs
                    .message(locale, &p.key, &substitutions, cx.extension.id.as_str())
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }
            "getUILanguage" => json!(ui_language(locale)),
            "getAcceptLanguages" => {
                let ui = ui_language(locale);
                let mut languages = vec![ui.clone()];
                if let Some((language, _)) = ui.split_once('-') {
                    languages.push(language.to_string());
                }
                json!(languages)
            }
            _ => unknown_method(API, method),
        }
    }
}
