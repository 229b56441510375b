use harbor_common::ExtensionId;
use serde_json::Value;

/// Page-side shim, evaluated before any extension script in a context.
///
/// `chrome.<api>.<method>(...args)` posts an envelope carrying the
/// arguments and returns a promise settled by `_resolve`; a trailing
/// function argument is called with the result too.
/// `chrome.<api>.<event>.addListener(fn)` subscribes to `_emit` pushes
/// named `<api>.<event>`. A context whose `runtime.onMessage` listeners
/// neither answer nor keep the channel open declines the message.
pub const BRIDGE_INIT_SCRIPT: &str = r#"
(function() {
    if (window.harbor && window.harbor.bridge) { return; }
    window.harbor = window.harbor || {};
    var bridge = {
        _nextId: 1,
        _callbacks: {},
        _listeners: {},
        call: function(api, method, args) {
            var id = this._nextId++;
            var self = this;
            return new Promise(function(resolve) {
                self._callbacks[id] = resolve;
                window.ipc.postMessage(JSON.stringify({
                    api: api,
                    method: method,
                    args: args,
                    callbackId: id
                }));
            });
        },
        send: function(api, method, params) {
            window.ipc.postMessage(JSON.stringify({
                api: api,
                method: method,
                params: params || {}
            }));
        },
        on: function(name, fn) {
            (this._listeners[name] = this._listeners[name] || []).push(fn);
        },
        off: function(name, fn) {
            var list = this._listeners[name] || [];
            var i = list.indexOf(fn);
            if (i >= 0) { list.splice(i, 1); }
        },
        _resolve: function(id, value) {
            var cb = this._callbacks[id];
            if (cb) {
                delete this._callbacks[id];
                cb(value);
            }
        },
        _emit: function(name, payload) {
            var list = (this._listeners[name] || []).slice();
            var self = this;
            if (name === 'runtime.onMessage') {
                var answered = false;
                var respond = function(response) {
                    if (answered || !payload.responseId) { return; }
                    answered = true;
                    self.send('runtime', 'respond', {
                        responseId: payload.responseId,
                        response: response === undefined ? null : response
                    });
                };
                var keepOpen = false;
                list.forEach(function(fn) {
                    if (fn(payload.message, payload.sender, respond) === true) { keepOpen = true; }
                });
                if (!keepOpen && !answered && payload.responseId) {
                    answered = true;
                    self.send('runtime', 'respond', {
                        responseId: payload.responseId,
                        declined: true
                    });
                }
                return;
            }
            list.forEach(function(fn) { fn(payload); });
        }
    };
    window.harbor.bridge = bridge;

    var eventProxy = function(name) {
        return {
            addListener: function(fn) { bridge.on(name, fn); },
            removeListener: function(fn) { bridge.off(name, fn); },
            hasListener: function(fn) {
                return (bridge._listeners[name] || []).indexOf(fn) >= 0;
            }
        };
    };
    var namespace = function(api) {
        return new Proxy({}, {
            get: function(_, key) {
                if (typeof key !== 'string') { return undefined; }
                if (/^on[A-Z]/.test(key)) { return eventProxy(api + '.' + key); }
                if (api === 'storage' && (key === 'local' || key === 'session')) {
                    return namespace('storage.' + key);
                }
                return function() {
                    var args = Array.prototype.slice.call(arguments);
                    var callback = typeof args[args.length - 1] === 'function' ? args.pop() : null;
                    var pending = bridge.call(api, key, args.filter(function(a) {
                        return typeof a !== 'function';
                    }));
                    if (callback) { pending.then(callback); }
                    return pending;
                };
            }
        });
    };
    window.chrome = new Proxy({}, {
        get: function(_, api) { return typeof api === 'string' ? namespace(api) : undefined; }
    });
    window.browser = window.chrome;
})();
"#;

/// Script resolving one pending call in the context's callback table.
pub fn js_resolve(callback_id: u64, value: &Value) -> String {
    let value_json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    format!("window.harbor.bridge._resolve({callback_id}, {value_json});")
}

/// Script firing an event on the context's listeners.
pub fn js_emit(name: &str, payload: &Value) -> String {
    let payload_json = serde_json::to_string(payload).unwrap_or_else(|_| "null".to_string());
    format!(
        "window.harbor.bridge._emit({}, {});",
        serde_json::to_string(name).unwrap_or_else(|_| "\"unknown\"".to_string()),
        payload_json,
    )
}

/// Shim plus the extension id, prepended to injected content scripts.
pub fn content_script_prelude(extension: &ExtensionId) -> String {
    let id_json = serde_json::to_string(extension.as_str()).unwrap_or_else(|_| "\"\"".to_string());
    format!("{BRIDGE_INIT_SCRIPT}\nwindow.harbor.extensionId = {id_json};\n")
}
