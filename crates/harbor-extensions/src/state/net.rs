//! Network interception state: MV2 request-observer filters and MV3
//! declarative rules.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::match_pattern::MatchPatternSet;

/// One `webRequest` listener filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestFilter {
    pub urls: Vec<String>,
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
struct CompiledFilter {
    urls: MatchPatternSet,
    types: Option<Vec<String>>,
}

impl CompiledFilter {
    fn matches(&self, url: &str, resource_type: &str) -> bool {
        self.urls.test(url)
            && self
                .types
                .as_ref()
                .is_none_or(|types| types.iter().any(|t| t == resource_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleActionType {
    Block,
    Allow,
    Redirect,
    UpgradeScheme,
}

impl RuleActionType {
    /// Tie-break among equal priorities: allow, block, upgrade, redirect.
    fn rank(self) -> u8 {
        match self {
            RuleActionType::Allow => 3,
            RuleActionType::Block => 2,
            RuleActionType::UpgradeScheme => 1,
            RuleActionType::Redirect => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: RuleActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetRule {
    pub id: i64,
    #[serde(default = "default_priority")]
    pub priority: i64,
    pub action: RuleAction,
    #[serde(default)]
    pub condition: RuleCondition,
}

fn default_priority() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetDecision {
    Allow,
    Block,
    Redirect(String),
}

#[derive(Debug)]
struct CompiledRule {
    rule: NetRule,
    filter: Option<Regex>,
}

impl CompiledRule {
    fn compile(rule: NetRule) -> Self {
        let filter = rule.condition.url_filter.as_deref().and_then(url_filter_regex);
        Self { rule, filter }
    }

    fn matches(&self, url: &str, resource_type: &str) -> bool {
        let url_ok = match (&self.rule.condition.url_filter, &self.filter) {
            (None, _) => true,
            (Some(_), Some(re)) => re.is_match(url),
            (Some(_), None) => false,
        };
        url_ok
            && self
                .rule
                .condition
                .resource_types
                .as_ref()
                .is_none_or(|types| types.iter().any(|t| t == resource_type))
    }
}

/// Translate a `urlFilter` into a regex: `||` anchors to a domain, `|`
/// anchors the start or end, `*` is any run, `^` is a separator.
fn url_filter_regex(filter: &str) -> Option<Regex> {
    let mut source = String::new();
    let mut rest = filter;
    if let Some(stripped) = rest.strip_prefix("||") {
        source.push_str(r"^[a-z][a-z0-9+.\-]*://(?:[^/?#]*\.)?");
        rest = stripped;
    } else if let Some(stripped) = rest.strip_prefix('|') {
        source.push('^');
        rest = stripped;
    }
    let (body, anchored_end) = match rest.strip_suffix('|') {
        Some(body) => (body, true),
        None => (rest, false),
    };
    for c in body.chars() {
        match c {
            '*' => source.push_str(".*"),
            '^' => source.push_str(r"(?:[^A-Za-z0-9_\-.%]|$)"),
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    if anchored_end {
        source.push('$');
    }
    match RegexBuilder::new(&source).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(filter, error = %e, "url filter did not compile");
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct NetState {
    observers: Vec<CompiledFilter>,
    rules: Vec<CompiledRule>,
}

impl NetState {
    pub fn add_observer(&mut self, filter: RequestFilter) {
        self.observers.push(CompiledFilter {
            urls: MatchPatternSet::new(&filter.urls),
            types: filter.types,
        });
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub fn observes(&self, url: &str, resource_type: &str) -> bool {
        self.observers.iter().any(|f| f.matches(url, resource_type))
    }

    /// Remove `remove_ids`, then add `add` (replacing rules with the same id).
    pub fn update_rules(&mut self, add: Vec<NetRule>, remove_ids: &[i64]) {
        self.rules
            .retain(|r| !remove_ids.contains(&r.rule.id) && !add.iter().any(|a| a.id == r.rule.id));
        self.rules.extend(add.into_iter().map(CompiledRule::compile));
    }

    pub fn rules(&self) -> Vec<NetRule> {
        self.rules.iter().map(|r| r.rule.clone()).collect()
    }

    /// Highest-priority matching rule decides.
    pub fn evaluate(&self, url: &str, resource_type: &str) -> Option<NetDecision> {
        let winner = self
            .rules
            .iter()
            .filter(|r| r.matches(url, resource_type))
            .max_by_key(|r| (r.rule.priority, r.rule.action.kind.rank()))?;
        match winner.rule.action.kind {
            RuleActionType::Allow => Some(NetDecision::Allow),
            RuleActionType::Block => Some(NetDecision::Block),
            RuleActionType::UpgradeScheme => url
                .strip_prefix("http://")
                .map(|rest| NetDecision::Redirect(format!("https://{rest}")))
                .or(Some(NetDecision::Allow)),
            RuleActionType::Redirect => match winner.rule.action.redirect.as_ref().and_then(|r| r.url.clone()) {
                Some(target) => Some(NetDecision::Redirect(target)),
                None => {
                    warn!(rule = winner.rule.id, "redirect rule has no target url");
                    None
                }
            },
        }
    }
}
