use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One script-to-host call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub api: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<i64>,
}

impl Call {
    pub fn new(api: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            api: api.into(),
            method: method.into(),
            params,
            callback_id: None,
        }
    }

    pub fn with_callback(mut self, callback_id: i64) -> Self {
        self.callback_id = Some(callback_id);
        self
    }

    /// Decode a raw envelope as posted by the page shim.
    ///
    /// The shim posts the script's arguments as `args`; those are mapped
    /// onto named params. Host tooling may post `params` directly.
    pub fn from_json(raw: &str) -> Option<Self> {
        let raw: RawCall = serde_json::from_str(raw).ok()?;
        let params = match raw.args {
            Some(args) => params_from_args(&raw.api, &raw.method, args),
            None if raw.params.is_null() => Value::Object(Map::new()),
            None => raw.params,
        };
        Some(Self {
            api: raw.api,
            method: raw.method,
            params,
            callback_id: raw.callback_id,
        })
    }

    /// The id to reply to. Zero and negative ids mean "no reply expected".
    pub fn reply_id(&self) -> Option<u64> {
        self.callback_id
            .filter(|id| *id > 0)
            .and_then(|id| u64::try_from(id).ok())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCall {
    api: String,
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    args: Option<Vec<Value>>,
    #[serde(default)]
    callback_id: Option<i64>,
}

/// Methods whose script-side signature is positional: `(api family,
/// method, param names, leading name optional)`. When the leading name
/// is optional and the first argument is an object, the name was omitted.
const POSITIONAL: &[(&str, &str, &[&str], bool)] = &[
    ("runtime", "sendMessage", &["message"], false),
    ("tabs", "sendMessage", &["tabId", "message"], false),
    ("tabs", "get", &["tabId"], false),
    ("tabs", "duplicate", &["tabId"], false),
    ("tabs", "reload", &["tabId"], false),
    ("tabs", "update", &["tabId", "updateProperties"], true),
    ("storage", "get", &["keys"], false),
    ("storage", "remove", &["keys"], false),
    ("storage", "set", &["items"], false),
    ("alarms", "create", &["name", "alarmInfo"], true),
    ("alarms", "get", &["name"], false),
    ("alarms", "clear", &["name"], false),
    ("i18n", "getMessage", &["key", "substitutions"], false),
];

/// Map positional script arguments onto the named params a dispatcher
/// expects. Other methods take a single options object.
fn params_from_args(api: &str, method: &str, args: Vec<Value>) -> Value {
    let family = api.split('.').next().unwrap_or(api);
    let Some((_, _, names, leading_optional)) = POSITIONAL
        .iter()
        .find(|(a, m, _, _)| *a == family && *m == method)
    else {
        return match args.into_iter().next() {
            Some(options @ Value::Object(_)) => options,
            _ => Value::Object(Map::new()),
        };
    };
    let skip = usize::from(*leading_optional && args.first().is_some_and(Value::is_object));
    let params: Map<String, Value> = names[skip..]
        .iter()
        .zip(args)
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    Value::Object(params)
}

/// One host-to-script push.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    #[serde(rename_all = "camelCase")]
    Reply { callback_id: u64, value: Value },
    Event { name: String, payload: Value },
}

impl HostMessage {
    pub fn reply(callback_id: u64, value: Value) -> Self {
        HostMessage::Reply { callback_id, value }
    }

    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        HostMessage::Event {
            name: name.into(),
            payload,
        }
    }

    /// Script that delivers this message when evaluated in the context.
    pub fn to_script(&self) -> String {
        match self {
            HostMessage::Reply { callback_id, value } => super::js_resolve(*callback_id, value),
            HostMessage::Event { name, payload } => super::js_emit(name, payload),
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        match self {
            HostMessage::Event { name, .. } => Some(name),
            HostMessage::Reply { .. } => None,
        }
    }
}
