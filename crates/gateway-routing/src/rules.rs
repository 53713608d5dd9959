//! Rule-based routing: pattern-matched overrides evaluated before scoring.
//!
//! Rules let an operator pin traffic matching a glob/tenant pattern to a
//! specific model or strategy without waiting on a config redeploy of the
//! scoring weights themselves. They run first in [`crate::router::Router`]
//! and can short-circuit straight to a `RuleAction::PinModel`.

use crate::strategy::RoutingStrategy;
use serde::{Deserialize, Serialize};

/// What a matching rule does to the routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    /// Force this specific model id to the front of the fallback chain,
    /// exactly like an explicit `modelHint` (§4.H: "placed first regardless
    /// of score").
    PinModel(String),
    /// Override the strategy used for scoring, but still run scoring.
    UseStrategy(RoutingStrategy),
    /// Exclude a model id from candidacy entirely for matching requests.
    ExcludeModel(String),
}

/// What a rule is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMatcher {
    /// Glob pattern (`*`/`?`) against the request's model hint/name, if
    /// any. `None` matches any model.
    pub model_glob: Option<String>,
    /// Exact tenant id match, if any. `None` matches any tenant.
    pub tenant_id: Option<String>,
}

impl RuleMatcher {
    /// A matcher with no restrictions -- matches every request.
    #[must_use]
    pub fn any() -> Self {
        Self {
            model_glob: None,
            tenant_id: None,
        }
    }

    fn matches(&self, model_hint: Option<&str>, tenant_id: &str) -> bool {
        if let Some(expected_tenant) = &self.tenant_id {
            if expected_tenant != tenant_id {
                return false;
            }
        }
        if let Some(glob) = &self.model_glob {
            return model_hint.is_some_and(|model| glob_match(glob, model));
        }
        true
    }
}

/// One routing rule: a matcher plus the action to take when it fires.
/// Rules are evaluated in list order; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Operator-facing name, for logs and the admin surface.
    pub name: String,
    /// What the rule is matched against.
    pub matcher: RuleMatcher,
    /// What happens when it matches.
    pub action: RuleAction,
}

impl RoutingRule {
    /// Construct a rule.
    #[must_use]
    pub fn new(name: impl Into<String>, matcher: RuleMatcher, action: RuleAction) -> Self {
        Self {
            name: name.into(),
            matcher,
            action,
        }
    }
}

/// Evaluate `rules` in order against `(model_hint, tenant_id)`, returning
/// the first matching action.
#[must_use]
pub fn evaluate<'a>(
    rules: &'a [RoutingRule],
    model_hint: Option<&str>,
    tenant_id: &str,
) -> Option<&'a RuleAction> {
    rules
        .iter()
        .find(|rule| rule.matcher.matches(model_hint, tenant_id))
        .map(|rule| &rule.action)
}

/// Minimal glob matcher supporting `*` (any run of characters) and `?` (any
/// single character). Sufficient for model-name patterns like
/// `"gpt-4*"`/`"*-preview"` without pulling in a dedicated glob crate for
/// one use.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                inner(&pattern[1..], text) || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            Some(b'?') => !text.is_empty() && inner(&pattern[1..], &text[1..]),
            Some(&c) => text.first() == Some(&c) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_star_suffix() {
        assert!(glob_match("gpt-4*", "gpt-4-turbo"));
        assert!(glob_match("gpt-4*", "gpt-4"));
        assert!(!glob_match("gpt-4*", "gpt-3.5"));
    }

    #[test]
    fn test_glob_star_prefix() {
        assert!(glob_match("*-preview", "gpt-4-preview"));
        assert!(!glob_match("*-preview", "gpt-4-stable"));
    }

    #[test]
    fn test_glob_question_mark() {
        assert!(glob_match("gpt-?", "gpt-4"));
        assert!(!glob_match("gpt-?", "gpt-44"));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            RoutingRule::new(
                "pin-canary",
                RuleMatcher {
                    model_glob: Some("canary-*".to_string()),
                    tenant_id: None,
                },
                RuleAction::PinModel("canary-v2".to_string()),
            ),
            RoutingRule::new(
                "catch-all",
                RuleMatcher::any(),
                RuleAction::UseStrategy(RoutingStrategy::Balanced),
            ),
        ];
        let action = evaluate(&rules, Some("canary-beta"), "any-tenant").expect("should match");
        assert_eq!(action, &RuleAction::PinModel("canary-v2".to_string()));
        let action = evaluate(&rules, Some("gpt-4"), "any-tenant").expect("falls to catch-all");
        assert_eq!(action, &RuleAction::UseStrategy(RoutingStrategy::Balanced));
    }

    #[test]
    fn test_tenant_scoped_rule() {
        let rules = vec![RoutingRule::new(
            "enterprise-only-model",
            RuleMatcher {
                model_glob: None,
                tenant_id: Some("enterprise-co".to_string()),
            },
            RuleAction::UseStrategy(RoutingStrategy::QualityFirst),
        )];
        assert!(evaluate(&rules, None, "enterprise-co").is_some());
        assert!(evaluate(&rules, None, "other-tenant").is_none());
    }
}
