//! Permission policy engine — a pure decision function over a layered,
//! glob-aware rule set.
//!
//! A policy maps *keys* to rules. Reserved keys: `*` (global baseline), the
//! four operation names (`read`, `write`, `exec`, `network`), and subject
//! keys of the form `tool.<name>`. A rule is either a scalar decision or a
//! map from pattern to decision. Evaluation layers the baseline, the
//! operation rule, and the subject rule, in that order; within a map layer
//! the `*` entry applies first, then every pattern matching the target in
//! lexicographic order, last match winning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A policy leaf decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Ask,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Ask => "ask",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule attached to a policy key: a scalar decision, or a map from
/// pattern (literal or glob) to decision.
///
/// `BTreeMap` keeps pattern iteration lexicographic, which makes the
/// last-match-wins override deterministic across platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rule {
    Decision(Decision),
    Patterns(BTreeMap<String, Decision>),
}

/// A layered permission policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy(pub BTreeMap<String, Rule>);

impl Policy {
    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.0.get(key)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Evaluation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resolve a decision for `(op, subject, target)` against a policy.
///
/// Resolution order, each layer overriding the previous:
/// 1. `policy["*"]` when it is a scalar decision, else `ask`.
/// 2. The rule at `policy[op]`.
/// 3. The rule at `policy[subject]`, when a subject is given.
pub fn evaluate(
    policy: &Policy,
    op: &str,
    subject: Option<&str>,
    target: Option<&str>,
) -> Decision {
    let mut decision = match policy.get("*") {
        Some(Rule::Decision(d)) => *d,
        _ => Decision::Ask,
    };

    decision = apply_layer(policy.get(op), target, decision);
    if let Some(subject) = subject {
        decision = apply_layer(policy.get(subject), target, decision);
    }
    decision
}

/// Apply one layer: a scalar replaces the current decision; a map applies
/// its `*` entry first, then every matching pattern in key order.
fn apply_layer(rule: Option<&Rule>, target: Option<&str>, current: Decision) -> Decision {
    match rule {
        None => current,
        Some(Rule::Decision(d)) => *d,
        Some(Rule::Patterns(map)) => {
            let mut decision = current;
            if let Some(d) = map.get("*") {
                decision = *d;
            }
            if let Some(target) = target {
                for (pattern, d) in map.iter().filter(|(p, _)| p.as_str() != "*") {
                    if pattern_matches(pattern, target) {
                        decision = *d;
                    }
                }
            }
            decision
        }
    }
}

/// A pattern matches its target literally or as a glob. Patterns that fail
/// to compile as globs fall back to literal comparison only.
fn pattern_matches(pattern: &str, target: &str) -> bool {
    if pattern == target {
        return true;
    }
    glob::Pattern::new(pattern)
        .map(|p| p.matches(target))
        .unwrap_or(false)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Updates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pure rule append: returns a policy with `pattern -> decision` recorded
/// under `key`.
///
/// An absent key becomes `{pattern: decision}`; a scalar key converts to
/// `{"*": scalar, pattern: decision}`; a map key gains (or overwrites) the
/// pattern entry.
pub fn append_rule(policy: &Policy, key: &str, pattern: &str, decision: Decision) -> Policy {
    let mut next = policy.clone();
    let entry = match next.0.remove(key) {
        None => {
            let mut map = BTreeMap::new();
            map.insert(pattern.to_owned(), decision);
            Rule::Patterns(map)
        }
        Some(Rule::Decision(scalar)) => {
            let mut map = BTreeMap::new();
            map.insert("*".to_owned(), scalar);
            map.insert(pattern.to_owned(), decision);
            Rule::Patterns(map)
        }
        Some(Rule::Patterns(mut map)) => {
            map.insert(pattern.to_owned(), decision);
            Rule::Patterns(map)
        }
    };
    next.0.insert(key.to_owned(), entry);
    next
}

/// The baseline merged under every user-supplied policy.
pub fn default_policy() -> Policy {
    let mut map = BTreeMap::new();
    map.insert("*".to_owned(), Rule::Decision(Decision::Ask));
    map.insert("read".to_owned(), Rule::Decision(Decision::Allow));
    map.insert("write".to_owned(), Rule::Decision(Decision::Ask));
    map.insert("exec".to_owned(), Rule::Decision(Decision::Ask));
    map.insert("network".to_owned(), Rule::Decision(Decision::Ask));
    Policy(map)
}

/// Merge the defaults under a user policy: user keys win, missing keys come
/// from [`default_policy`].
pub fn normalize(user: Policy) -> Policy {
    let mut merged = default_policy();
    for (key, rule) in user.0 {
        merged.0.insert(key, rule);
    }
    merged
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
