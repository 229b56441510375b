//! `manifest.json` model.
//!
//! Unknown keys are ignored. Only `manifest_version` (2 or 3), `name` and
//! `version` are required; everything else defaults to empty.

use std::collections::BTreeMap;
use std::path::Path;

use harbor_common::ExtensionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    DocumentEnd,
    #[default]
    DocumentIdle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSpec {
    pub service_worker: Option<String>,
    pub scripts: Vec<String>,
    pub page: Option<String>,
    pub persistent: Option<bool>,
}

impl BackgroundSpec {
    /// Script files the background context evaluates, in order.
    pub fn script_files(&self) -> Vec<&str> {
        match &self.service_worker {
            Some(worker) => vec![worker.as_str()],
            None => self.scripts.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentScriptSpec {
    pub matches: Vec<String>,
    pub exclude_matches: Vec<String>,
    pub js: Vec<String>,
    pub css: Vec<String>,
    pub run_at: RunAt,
    pub all_frames: bool,
    pub match_about_blank: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSpec {
    pub suggested_key: BTreeMap<String, String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpec {
    pub default_popup: Option<String>,
    pub default_title: Option<String>,
    pub default_icon: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    manifest_version: Option<u32>,
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    optional_permissions: Vec<String>,
    #[serde(default)]
    host_permissions: Vec<String>,
    #[serde(default)]
    background: Option<BackgroundSpec>,
    #[serde(default)]
    content_scripts: Vec<ContentScriptSpec>,
    #[serde(default)]
    commands: BTreeMap<String, CommandSpec>,
    #[serde(default)]
    action: Option<ActionSpec>,
    #[serde(default)]
    browser_action: Option<ActionSpec>,
    #[serde(default)]
    icons: BTreeMap<String, String>,
    #[serde(default)]
    default_locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub manifest_version: u32,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub optional_permissions: Vec<String>,
    pub host_permissions: Vec<String>,
    pub background: Option<BackgroundSpec>,
    pub content_scripts: Vec<ContentScriptSpec>,
    pub commands: BTreeMap<String, CommandSpec>,
    pub action: Option<ActionSpec>,
    pub icons: BTreeMap<String, String>,
    pub default_locale: Option<String>,
    /// The document as written, returned by `runtime.getManifest`.
    pub raw: Value,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self, ExtensionError> {
        let raw: Value =
            serde_json::from_str(json).map_err(|e| ExtensionError::ManifestParse(e.to_string()))?;
        let parsed: RawManifest = serde_json::from_value(raw.clone())
            .map_err(|e| ExtensionError::ManifestParse(e.to_string()))?;

        let manifest_version = parsed
            .manifest_version
            .ok_or(ExtensionError::MissingField("manifest_version"))?;
        if !matches!(manifest_version, 2 | 3) {
            return Err(ExtensionError::UnsupportedManifestVersion(manifest_version));
        }
        let name = parsed.name.ok_or(ExtensionError::MissingField("name"))?;
        let version = parsed
            .version
            .ok_or(ExtensionError::MissingField("version"))?;

        Ok(Self {
            manifest_version,
            name,
            version,
            description: parsed.description,
            permissions: parsed.permissions,
            optional_permissions: parsed.optional_permissions,
            host_permissions: parsed.host_permissions,
            background: parsed.background,
            content_scripts: parsed.content_scripts,
            commands: parsed.commands,
            action: parsed.action.or(parsed.browser_action),
            icons: parsed.icons,
            default_locale: parsed.default_locale,
            raw,
        })
    }

    /// Read `<root>/manifest.json`.
    pub fn from_dir(root: &Path) -> Result<Self, ExtensionError> {
        let path = root.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path)
            .map_err(|source| ExtensionError::ManifestRead { path, source })?;
        Self::parse(&json)
    }

    /// Declared API permissions (`storage`, `tabs`, ...).
    pub fn api_permissions(&self) -> Vec<String> {
        self.permissions
            .iter()
            .filter(|p| !is_host_pattern(p))
            .cloned()
            .collect()
    }

    /// Declared host patterns. MV2 lists them among `permissions`.
    pub fn host_patterns(&self) -> Vec<String> {
        let mut patterns = self.host_permissions.clone();
        patterns.extend(
            self.permissions
                .iter()
                .filter(|p| is_host_pattern(p))
                .cloned(),
        );
        patterns
    }
}

pub fn is_host_pattern(permission: &str) -> bool {
    permission == "<all_urls>" || permission.contains("://")
}
