//! `_locales/<locale>/messages.json` catalogs and message formatting.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, warn};

pub const LOCALES_DIR: &str = "_locales";

static NAMED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$([A-Za-z0-9_@]+)\$").unwrap());
static POSITIONAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$(\$|[1-9])").unwrap());

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub message: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub placeholders: HashMap<String, Placeholder>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Placeholder {
    pub content: String,
    #[serde(default)]
    pub example: Option<String>,
}

type Catalog = HashMap<String, CatalogEntry>;

/// All catalogs of one extension, keyed by normalized locale (`en_US`).
#[derive(Debug, Clone, Default)]
pub struct Catalogs {
    locales: HashMap<String, Catalog>,
    default_locale: Option<String>,
}

impl Catalogs {
    pub fn new(locales: HashMap<String, Catalog>, default_locale: Option<&str>) -> Self {
        Self {
            locales: locales
                .into_iter()
                .map(|(locale, catalog)| {
                    let catalog = catalog
                        .into_iter()
                        .map(|(k, v)| (k.to_lowercase(), v))
                        .collect();
                    (normalize(&locale), catalog)
                })
                .collect(),
            default_locale: default_locale.map(normalize),
        }
    }

    /// Load every catalog under `<root>/_locales`. Unreadable catalogs are
    /// skipped with a warning.
    pub fn load(root: &Path, default_locale: Option<&str>) -> Self {
        let dir = root.join(LOCALES_DIR);
        let mut locales = HashMap::new();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Self::new(locales, default_locale);
        };
        for entry in entries.flatten() {
            let locale = entry.file_name().to_string_lossy().to_string();
            let path = entry.path().join("messages.json");
            if !path.is_file() {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<Catalog>(&s).map_err(|e| e.to_string()));
            match parsed {
                Ok(catalog) => {
                    debug!(locale = %locale, messages = catalog.len(), "catalog loaded");
                    locales.insert(locale, catalog);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable catalog"),
            }
        }
        Self::new(locales, default_locale)
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    /// Catalog lookup order for a user locale: full locale, language only,
    /// then the manifest default.
    fn chain(&self, user_locale: &str) -> Vec<&Catalog> {
        let full = normalize(user_locale);
        let language = full.split('_').next().unwrap_or_default().to_string();
        let mut order = vec![full, language];
        if let Some(default) = &self.default_locale {
            order.push(default.clone());
        }
        order.dedup();
        order
            .iter()
            .filter_map(|locale| self.locales.get(locale))
            .collect()
    }

    /// Look up and format `key`. `None` when no catalog in the chain has it.
    pub fn message(
        &self,
        user_locale: &str,
        key: &str,
        substitutions: &[String],
        extension_id: &str,
    ) -> Option<String> {
        match key {
            "@@extension_id" => return Some(extension_id.to_string()),
            "@@ui_locale" => return Some(normalize(user_locale)),
            "@@bidi_dir" => return Some("ltr".to_string()),
            _ => {}
        }
        let key = key.to_lowercase();
        let entry = self
            .chain(user_locale)
            .into_iter()
            .find_map(|catalog| catalog.get(&key))?;
        Some(format_message(entry, substitutions))
    }
}

/// Named placeholders first (their content usually names a positional
/// index), then `$1`..`$9` and the `$$` escape.
pub fn format_message(entry: &CatalogEntry, substitutions: &[String]) -> String {
    let placeholders: HashMap<String, &str> = entry
        .placeholders
        .iter()
        .map(|(name, p)| (name.to_lowercase(), p.content.as_str()))
        .collect();

    let named = NAMED_RE.replace_all(&entry.message, |caps: &Captures| {
        match placeholders.get(&caps[1].to_lowercase()) {
            Some(content) => (*content).to_string(),
            None => caps[0].to_string(),
        }
    });

    POSITIONAL_RE
        .replace_all(&named, |caps: &Captures| match &caps[1] {
            "$" => "$".to_string(),
            digit => digit
                .parse::<usize>()
                .ok()
                .and_then(|n| substitutions.get(n - 1))
                .cloned()
                .unwrap_or_default(),
        })
        .into_owned()
}

/// `en-us` / `en_US` -> `en_US`.
pub fn normalize(locale: &str) -> String {
    let mut parts = locale.split(['-', '_']);
    let language = parts.next().unwrap_or_default().to_lowercase();
    match parts.next() {
        Some(region) if !region.is_empty() => format!("{language}_{}", region.to_uppercase()),
        _ => language,
    }
}

/// `en_US` -> `en-US`, the form `getUILanguage` reports.
pub fn ui_language(locale: &str) -> String {
    normalize(locale).replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str, placeholders: &[(&str, &str)]) -> CatalogEntry {
        CatalogEntry {
            message: message.to_string(),
            description: None,
            placeholders: placeholders
                .iter()
                .map(|(name, content)| {
                    (
                        name.to_string(),
                        Placeholder {
                            content: content.to_string(),
                            example: None,
                        },
                    )
                })
                .collect(),
        }
    }

    fn catalogs() -> Catalogs {
        let mut locales = HashMap::new();
        locales.insert(
            "en".to_string(),
            HashMap::from([
                ("greeting".to_string(), entry("Hello", &[])),
                ("only_en".to_string(), entry("English", &[])),
            ]),
        );
        locales.insert(
            "en_GB".to_string(),
            HashMap::from([("greeting".to_string(), entry("Hiya", &[]))]),
        );
        locales.insert(
            "de".to_string(),
            HashMap::from([
                ("greeting".to_string(), entry("Hallo", &[])),
                ("fallback".to_string(), entry("Rückfall", &[])),
            ]),
        );
        Catalogs::new(locales, Some("de"))
    }

    #[test]
    fn locale_preference_order() {
        let c = catalogs();
        assert_eq!(c.message("en_GB", "greeting", &[], "x").as_deref(), Some("Hiya"));
        assert_eq!(c.message("en-US", "greeting", &[], "x").as_deref(), Some("Hello"));
        assert_eq!(c.message("fr_FR", "greeting", &[], "x").as_deref(), Some("Hallo"));
        assert_eq!(c.message("en_GB", "only_en", &[], "x").as_deref(), Some("English"));
        assert_eq!(c.message("en_GB", "fallback", &[], "x").as_deref(), Some("Rückfall"));
        assert_eq!(c.message("en", "missing", &[], "x"), None);
    }

    #[test]
    fn no_default_and_no_match_is_none() {
        let c = Catalogs::new(
            HashMap::from([(
                "ja".to_string(),
                HashMap::from([("k".to_string(), entry("v", &[]))]),
            )]),
            None,
        );
        assert_eq!(c.message("en_US", "k", &[], "x"), None);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let c = catalogs();
        assert_eq!(c.message("en", "GREETING", &[], "x").as_deref(), Some("Hello"));
    }

    #[test]
    fn positional_substitution() {
        let e = entry("$1 has $2 items", &[]);
        assert_eq!(
            format_message(&e, &["Cart".into(), "3".into()]),
            "Cart has 3 items"
        );
        assert_eq!(format_message(&e, &["Cart".into()]), "Cart has  items");
    }

    #[test]
    fn named_placeholders_resolve_to_positions() {
        let e = entry("Hello $USER$, you owe $$$amount$", &[("user", "$1"), ("amount", "$2")]);
        assert_eq!(
            format_message(&e, &["Ada".into(), "5".into()]),
            "Hello Ada, you owe $5"
        );
    }

    #[test]
    fn unknown_named_placeholder_is_left_alone() {
        let e = entry("cost: $price$", &[]);
        assert_eq!(format_message(&e, &[]), "cost: $price$");
    }

    #[test]
    fn predefined_messages() {
        let c = catalogs();
        assert_eq!(c.message("en_US", "@@extension_id", &[], "abc").as_deref(), Some("abc"));
        assert_eq!(c.message("en-us", "@@ui_locale", &[], "abc").as_deref(), Some("en_US"));
    }

    #[test]
    fn locale_normalization() {
        assert_eq!(normalize("en-us"), "en_US");
        assert_eq!(normalize("pt_br"), "pt_BR");
        assert_eq!(normalize("DE"), "de");
        assert_eq!(ui_language("en_US"), "en-US");
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let fr = dir.path().join("_locales/fr");
        std::fs::create_dir_all(&fr).unwrap();
        std::fs::write(
            fr.join("messages.json"),
            r#"{"appName": {"message": "Bonjour $who$", "placeholders": {"who": {"content": "$1"}}}}"#,
        )
        .unwrap();
        let broken = dir.path().join("_locales/xx");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("messages.json"), "{ broken").unwrap();

        let c = Catalogs::load(dir.path(), Some("fr"));
        assert!(!c.is_empty());
        assert_eq!(
            c.message("en_US", "appName", &["Marie".into()], "x").as_deref(),
            Some("Bonjour Marie")
        );
    }
}
