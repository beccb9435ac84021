//! In-memory shadow of the rule set used while the remote API is unreachable.
//!
//! This is a degraded-mode substitute, not a cache: nothing copies remote
//! state into it and nothing replays its writes to the remote.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::core::rule::{Rule, RuleDraft};

/// Session-lifetime shadow store keyed by country code.
#[derive(Debug)]
pub struct ShadowStore {
    rules: DashMap<String, Rule>,
    next_id: AtomicU64,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// A store pre-populated with `(country, delay %, drop)` seed rules.
    pub fn seeded(seed: &[(&str, u32, bool)]) -> Self {
        let store = Self::new();
        for (code, delay, drop) in seed {
            store.insert(Rule {
                country_code: code.to_string(),
                delay_percentage: *delay,
                drop: *drop,
                id: None,
            });
        }
        store
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn insert(&self, rule: Rule) -> Rule {
        let rule = Rule {
            id: Some(self.allocate_id()),
            ..rule.normalized()
        };
        self.rules.insert(rule.country_code.clone(), rule.clone());
        rule
    }

    /// Write a draft, keeping the local id of an existing rule for that country.
    pub fn upsert(&self, draft: &RuleDraft) -> Rule {
        let mut entry = self
            .rules
            .entry(draft.country_code.clone())
            .or_insert_with(|| Rule {
                id: Some(self.allocate_id()),
                ..draft.to_rule()
            });
        entry.delay_percentage = draft.delay_percentage;
        entry.drop = draft.drop;
        entry.value().clone()
    }

    /// Remove a country's rule. Returns whether one existed.
    pub fn remove(&self, country_code: &str) -> bool {
        self.rules.remove(country_code).is_some()
    }

    pub fn get(&self, country_code: &str) -> Option<Rule> {
        self.rules.get(country_code).map(|r| r.value().clone())
    }

    /// All rules in the order they were first written.
    pub fn list(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self.rules.iter().map(|r| r.value().clone()).collect();
        rules.sort_by_key(|r| r.id);
        rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ShadowStore {
    fn default() -> Self {
        Self::new()
    }
}
