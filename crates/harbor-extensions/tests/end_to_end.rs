use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harbor_common::{Event, EventBus, ExtensionId, TabHandle};
use harbor_extensions::background::{ON_ALARM, ON_INSTALLED, ON_STARTUP};
use harbor_extensions::services::JsonFileStore;
use harbor_extensions::state::{ExtensionState, NetDecision};
use harbor_extensions::{
    BackgroundHost, BackgroundLauncher, Call, ExtensionRegistry, ExtensionRuntime, HostEvent,
    LoadOutcome, ManifestProfile, NotificationActivation, RecordingContext, RunAt, ScriptContext,
    Shell,
};
use harbor_tabs::{Browser, HeadlessEngine, TabHost};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Hands out recording contexts and keeps them for inspection.
#[derive(Default)]
struct Backgrounds(Mutex<Vec<(ExtensionId, Arc<RecordingContext>)>>);

impl Backgrounds {
    fn of(&self, id: &ExtensionId) -> Arc<RecordingContext> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(ext, _)| ext == id)
            .map(|(_, ctx)| ctx.clone())
            .unwrap()
    }
}

impl BackgroundLauncher for Backgrounds {
    fn launch(&self, extension: &ExtensionState) -> Option<Arc<dyn ScriptContext>> {
        let context = Arc::new(RecordingContext::background());
        self.0
            .lock()
            .unwrap()
            .push((extension.id.clone(), context.clone()));
        Some(context)
    }
}

struct Harness {
    engine: Arc<HeadlessEngine>,
    shell: Arc<Shell>,
    host: Arc<BackgroundHost>,
    backgrounds: Arc<Backgrounds>,
    bus: Arc<EventBus>,
    registry: ExtensionRegistry,
    events: Option<mpsc::UnboundedReceiver<HostEvent>>,
}

impl Harness {
    fn new() -> Self {
        Self::with(|builder| builder)
    }

    fn with(configure: impl FnOnce(harbor_extensions::ShellBuilder) -> harbor_extensions::ShellBuilder) -> Self {
        let engine = Arc::new(HeadlessEngine::new());
        let browser = Arc::new(Browser::new(engine.clone(), true));
        let (shell, events) = configure(Shell::builder(browser)).build();
        let backgrounds = Arc::new(Backgrounds::default());
        let host = Arc::new(BackgroundHost::new(shell.clone(), backgrounds.clone()));
        let bus = Arc::new(EventBus::new(64));
        let registry = ExtensionRegistry::new(shell.clone(), host.clone(), bus.clone());
        Self {
            engine,
            shell,
            host,
            backgrounds,
            bus,
            registry,
            events: Some(events),
        }
    }

    fn pump(&mut self) {
        if let Some(events) = self.events.take() {
            tokio::spawn(self.host.clone().pump(events));
        }
    }

    fn handle_for(&self, tab: &Value) -> TabHandle {
        self.shell.ids.tabs.handle_for(tab["id"].as_i64().unwrap()).unwrap()
    }
}

async fn call(rt: &ExtensionRuntime, api: &str, method: &str, params: Value) -> Value {
    rt.handle(Call::new(api, method, params), None).await
}

fn write_extension(root: &Path, manifest: Value, files: &[(&str, &str)]) {
    std::fs::create_dir_all(root).unwrap();
    std::fs::write(root.join("manifest.json"), manifest.to_string()).unwrap();
    for (name, body) in files {
        std::fs::write(root.join(name), body).unwrap();
    }
}

#[tokio::test]
async fn broken_manifests_do_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        &dir.path().join("a-good"),
        json!({"manifest_version": 3, "name": "Good", "version": "1.0"}),
        &[],
    );
    std::fs::create_dir_all(dir.path().join("b-broken")).unwrap();
    std::fs::write(dir.path().join("b-broken/manifest.json"), "{ not json").unwrap();
    write_extension(
        &dir.path().join("c-ancient"),
        json!({"manifest_version": 1, "name": "Old", "version": "0.1"}),
        &[],
    );
    write_extension(
        &dir.path().join("d-classic"),
        json!({"manifest_version": 2, "name": "Classic", "version": "2.0"}),
        &[],
    );

    let h = Harness::new();
    let mut bus = h.bus.subscribe();
    let outcomes = h.registry.load_dir(dir.path());

    assert_eq!(outcomes.len(), 4);
    assert!(matches!(&outcomes[0], LoadOutcome::Loaded { name, profile: ManifestProfile::V3, .. } if name == "Good"));
    assert!(matches!(&outcomes[1], LoadOutcome::Failed { .. }));
    assert!(matches!(&outcomes[2], LoadOutcome::Failed { .. }));
    assert!(matches!(&outcomes[3], LoadOutcome::Loaded { profile: ManifestProfile::V2, .. }));
    assert_eq!(h.registry.runtimes().len(), 2);

    let mut failed = 0;
    while let Ok(event) = bus.try_recv() {
        if matches!(event, Event::ExtensionFailed { .. }) {
            failed += 1;
        }
    }
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn mv3_content_script_is_injected_into_matching_pages() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({
            "manifest_version": 3,
            "name": "Highlighter",
            "version": "1.0",
            "content_scripts": [{
                "matches": ["https://*.example.com/*"],
                "exclude_matches": ["https://private.example.com/*"],
                "js": ["highlight.js"],
                "css": ["highlight.css"],
                "run_at": "document_end"
            }]
        }),
        &[("highlight.js", "window.__highlighted = true;"), ("highlight.css", "mark { color: gold }")],
    );

    let h = Harness::new();
    let rt = h.registry.load(dir.path()).unwrap();
    let tab = h.shell.tabs.new_tab("https://docs.example.com/page");

    let injected = h.registry.inject_content_scripts(tab, "https://docs.example.com/page", None, RunAt::DocumentEnd);
    assert_eq!(injected, 1);
    let scripts = h.engine.scripts_for(tab);
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].contains("window.harbor.bridge"));
    assert!(scripts[0].contains(rt.id().as_str()));
    assert!(scripts[0].contains("mark { color: gold }"));
    assert!(scripts[0].ends_with("window.__highlighted = true;\n"));

    assert_eq!(
        h.registry.inject_content_scripts(tab, "https://docs.example.com/page", None, RunAt::DocumentIdle),
        0
    );
    assert_eq!(
        h.registry.inject_content_scripts(tab, "https://private.example.com/", None, RunAt::DocumentEnd),
        0
    );
    assert_eq!(
        h.registry.inject_content_scripts(tab, "https://example.org/", None, RunAt::DocumentEnd),
        0
    );
    assert_eq!(h.engine.scripts_for(tab).len(), 1);
}

#[tokio::test]
async fn tab_group_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({"manifest_version": 3, "name": "Grouper", "version": "1", "permissions": ["tabGroups"]}),
        &[],
    );
    let h = Harness::new();
    let rt = h.registry.load(dir.path()).unwrap();

    let a = call(&rt, "tabs", "create", json!({"url": "https://a.example/"})).await;
    let b = call(&rt, "tabs", "create", json!({"url": "https://b.example/", "active": false})).await;
    let group = call(&rt, "tabs", "group", json!({"tabIds": [a["id"], b["id"]]})).await;
    assert!(group.is_i64());

    let groups = call(&rt, "tabGroups", "query", json!({})).await;
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["title"], "Group 1");

    call(&rt, "tabGroups", "update", json!({"groupId": group, "updateProperties": {"title": "Work"}})).await;
    let fetched = call(&rt, "tabGroups", "get", json!({"groupId": group})).await;
    assert_eq!(fetched["title"], "Work");
    assert_eq!(fetched["tabIds"], json!([a["id"], b["id"]]));

    let member = call(&rt, "tabs", "get", json!({"tabId": b["id"]})).await;
    assert_eq!(member["groupId"], group);
    let in_group = call(&rt, "tabs", "query", json!({"groupId": group})).await;
    assert_eq!(in_group.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn tab_lifecycle_through_the_runtime() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(dir.path(), json!({"manifest_version": 3, "name": "T", "version": "1"}), &[]);
    let h = Harness::new();
    let rt = h.registry.load(dir.path()).unwrap();

    let front = call(&rt, "tabs", "create", json!({"url": "https://front.example/"})).await;
    let back = call(&rt, "tabs", "create", json!({"url": "https://back.example/", "active": false})).await;
    assert_eq!(h.engine.loads_for(h.handle_for(&front)), vec!["https://front.example/"]);
    assert!(h.engine.loads_for(h.handle_for(&back)).is_empty());

    call(&rt, "tabs", "remove", json!({"tabId": front["id"]})).await;
    assert_eq!(call(&rt, "tabs", "get", json!({"tabId": front["id"]})).await, Value::Null);
    let remaining = call(&rt, "tabs", "query", json!({})).await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);
    assert_eq!(remaining[0]["id"], back["id"]);
}

#[tokio::test(start_paused = true)]
async fn alarms_reach_the_background_once() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({"manifest_version": 3, "name": "Ticker", "version": "1",
               "permissions": ["alarms"], "background": {"service_worker": "sw.js"}}),
        &[("sw.js", "")],
    );
    let mut h = Harness::new();
    h.pump();
    let rt = h.registry.load(dir.path()).unwrap();
    let background = h.backgrounds.of(rt.id());
    assert_eq!(background.events(ON_INSTALLED), vec![json!({"reason": "install"})]);

    let create = json!({"name": "tick", "alarmInfo": {"delayInMinutes": 1}});
    call(&rt, "alarms", "create", create.clone()).await;
    tokio::time::sleep(Duration::from_secs(40)).await;
    call(&rt, "alarms", "create", create).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(background.events(ON_ALARM).is_empty());

    tokio::time::sleep(Duration::from_secs(60)).await;
    let fired = background.events(ON_ALARM);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0]["name"], "tick");
}

#[tokio::test(start_paused = true)]
async fn removing_an_extension_releases_its_resources() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({"manifest_version": 3, "name": "Leaver", "version": "1",
               "background": {"service_worker": "sw.js"}}),
        &[],
    );
    let h = Harness::new();
    let mut bus = h.bus.subscribe();
    let rt = h.registry.load(dir.path()).unwrap();
    let id = rt.id().clone();
    call(&rt, "alarms", "create", json!({"name": "x", "alarmInfo": {"delayInMinutes": 5}})).await;
    let window = call(&rt, "windows", "create", json!({"url": "https://w.example/"})).await;

    assert!(h.registry.remove(&id));
    assert!(!h.registry.remove(&id));
    assert!(h.registry.get(&id).is_none());
    assert!(h.shell.alarms.all(&id).is_empty());
    assert!(h.host.context(&id).is_none());
    assert!(h.shell.windows.all().is_empty());
    assert!(h.shell.ids.windows.handle_for(window["id"].as_i64().unwrap()).is_none());

    let mut removed = false;
    while let Ok(event) = bus.try_recv() {
        removed |= matches!(event, Event::ExtensionRemoved(ref r) if *r == id);
    }
    assert!(removed);
}

#[tokio::test]
async fn reloading_from_disk_keeps_local_storage() {
    let storage = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_extension(dir.path(), json!({"manifest_version": 3, "name": "Keeper", "version": "1"}), &[]);

    let h = Harness::with(|b| b.store(Arc::new(JsonFileStore::new(storage.path()))));
    let rt = h.registry.load(dir.path()).unwrap();
    call(&rt, "storage.local", "set", json!({"items": {"count": 3}})).await;
    call(&rt, "storage.session", "set", json!({"items": {"volatile": true}})).await;
    let id = rt.id().clone();
    drop(rt);
    h.registry.remove(&id);

    let again = h.registry.load(dir.path()).unwrap();
    assert_eq!(again.id(), &id);
    assert_eq!(call(&again, "storage.local", "get", json!({})).await, json!({"count": 3}));
    assert_eq!(call(&again, "storage.session", "get", json!({})).await, json!({}));
}

#[tokio::test]
async fn notification_clicks_route_back_to_the_extension() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({"manifest_version": 2, "name": "Notifier", "version": "1",
               "permissions": ["notifications"], "background": {"scripts": ["bg.js"]}}),
        &[],
    );
    let h = Harness::new();
    let rt = h.registry.load(dir.path()).unwrap();
    let background = h.backgrounds.of(rt.id());
    assert_eq!(background.events(ON_INSTALLED).len(), 1);
    assert!(background.events(ON_STARTUP).is_empty());

    let id = call(&rt, "notifications", "create", json!({"notificationId": "build-7", "options": {"title": "CI", "message": "done"}})).await;
    assert_eq!(id, json!("build-7"));
    let delivery = h.shell.notifications.deliveries_for(rt.id()).pop().unwrap();

    assert!(h.registry.notification_activated(&delivery, NotificationActivation::Clicked));
    assert_eq!(background.events("notifications.onClicked"), vec![json!("build-7")]);

    assert!(h.registry.notification_activated(&delivery, NotificationActivation::Closed { by_user: true }));
    assert_eq!(
        background.events("notifications.onClosed"),
        vec![json!({"notificationId": "build-7", "byUser": true})]
    );
    assert!(!h.registry.notification_activated(&delivery, NotificationActivation::Clicked));
}

#[tokio::test]
async fn menu_clicks_reach_the_background() {
    let dir = tempfile::tempdir().unwrap();
    write_extension(
        dir.path(),
        json!({"manifest_version": 3, "name": "Menus", "version": "1",
               "permissions": ["contextMenus"], "background": {"service_worker": "sw.js"}}),
        &[],
    );
    let h = Harness::new();
    let rt = h.registry.load(dir.path()).unwrap();
    call(&rt, "contextMenus", "create", json!({"id": "parent", "title": "Tools"})).await;
    call(&rt, "contextMenus", "create", json!({"id": "lookup", "parentId": "parent", "title": "Look up"})).await;

    let tree = rt.menu_tree();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].children.len(), 1);

    let tab = h.shell.tabs.new_tab("https://read.example/");
    assert!(h.registry.menu_clicked(rt.id(), "lookup", "https://read.example/", Some(tab)));
    assert!(!h.registry.menu_clicked(rt.id(), "missing", "https://read.example/", None));

    let clicks = h.backgrounds.of(rt.id()).events("contextMenus.onClicked");
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0]["info"]["menuItemId"], "lookup");
    assert_eq!(clicks[0]["info"]["parentMenuItemId"], "parent");
    assert_eq!(clicks[0]["tab"]["url"], "https://read.example/");
}

#[tokio::test]
async fn network_hooks_respect_filters_and_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let mv2 = dir.path().join("observer");
    let mv3 = dir.path().join("blocker");
    write_extension(
        &mv2,
        json!({"manifest_version": 2, "name": "Observer", "version": "1",
               "permissions": ["webRequest", "https://*.example.com/*"],
               "background": {"scripts": ["bg.js"]}}),
        &[],
    );
    write_extension(
        &mv3,
        json!({"manifest_version": 3, "name": "Blocker", "version": "1",
               "permissions": ["declarativeNetRequest"]}),
        &[],
    );
    let h = Harness::new();
    let observer = h.registry.load(&mv2).unwrap();
    let blocker = h.registry.load(&mv3).unwrap();

    call(&observer, "webRequest", "addListener", json!({"filter": {"urls": ["<all_urls>"]}})).await;
    assert_eq!(h.registry.observe_request("https://cdn.example.com/app.js", "script"), 1);
    assert_eq!(h.registry.observe_request("https://tracker.net/pixel", "image"), 0);
    let seen = h.backgrounds.of(observer.id()).events("webRequest.onBeforeRequest");
    assert_eq!(seen, vec![json!({"url": "https://cdn.example.com/app.js", "type": "script"})]);

    call(
        &blocker,
        "declarativeNetRequest",
        "updateDynamicRules",
        json!({"addRules": [{"id": 1, "action": {"type": "block"}, "condition": {"urlFilter": "||tracker.net"}}]}),
    )
    .await;
    assert_eq!(h.registry.evaluate_request("https://tracker.net/pixel", "image"), Some(NetDecision::Block));
    assert_eq!(h.registry.evaluate_request("https://cdn.example.com/app.js", "script"), None);
}
