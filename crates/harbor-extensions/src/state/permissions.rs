use std::collections::BTreeSet;

use serde::Serialize;

use crate::manifest::{is_host_pattern, Manifest};
use crate::match_pattern::MatchPatternSet;

const ACTIVE_TAB: &str = "activeTab";

/// Granted API permissions and host origins for one extension.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    granted: BTreeSet<String>,
    origins: BTreeSet<String>,
    matcher: MatchPatternSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSnapshot {
    pub permissions: Vec<String>,
    pub origins: Vec<String>,
}

impl Permissions {
    /// Everything the manifest declares is granted at install.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut permissions = Self::default();
        permissions.grant(&manifest.api_permissions(), &manifest.host_patterns());
        permissions
    }

    pub fn has(&self, permission: &str) -> bool {
        self.granted.contains(permission)
    }

    /// True only when every listed permission and origin is granted.
    pub fn contains(&self, permissions: &[String], origins: &[String]) -> bool {
        permissions.iter().all(|p| self.granted.contains(p))
            && origins
                .iter()
                .all(|o| self.origins.contains(o) || self.origins.contains("<all_urls>"))
    }

    pub fn grant(&mut self, permissions: &[String], origins: &[String]) {
        for p in permissions {
            if is_host_pattern(p) {
                self.origins.insert(p.clone());
            } else {
                self.granted.insert(p.clone());
            }
        }
        self.origins.extend(origins.iter().cloned());
        self.rebuild_matcher();
    }

    /// Returns whether anything was actually removed.
    pub fn revoke(&mut self, permissions: &[String], origins: &[String]) -> bool {
        let mut removed = false;
        for p in permissions {
            removed |= self.granted.remove(p);
        }
        for o in origins {
            removed |= self.origins.remove(o);
        }
        if removed {
            self.rebuild_matcher();
        }
        removed
    }

    pub fn snapshot(&self) -> PermissionSnapshot {
        PermissionSnapshot {
            permissions: self.granted.iter().cloned().collect(),
            origins: self.origins.iter().cloned().collect(),
        }
    }

    /// Host-permission check for a page URL. `activeTab` covers whichever
    /// tab is active at the time of the call.
    pub fn allows_url(&self, url: &str, tab_is_active: bool) -> bool {
        self.matcher.test(url) || (tab_is_active && self.has(ACTIVE_TAB))
    }

    fn rebuild_matcher(&mut self) {
        let origins: Vec<&String> = self.origins.iter().collect();
        self.matcher = MatchPatternSet::new(&origins);
    }
}
