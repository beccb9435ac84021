//! Status headlines emitted after every rule mutation.
//!
//! The rule store only decides *what* to say; a [`Notifier`] decides where it
//! goes (a ticker widget, a log line, a test recorder).

use crate::core::rule::Rule;

/// Kind of rule mutation an operator performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

impl Mutation {
    pub fn verb(&self) -> &'static str {
        match self {
            Mutation::Create => "create",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// Outcome of a mutation, rendered into a deterministic headline and body.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice<'a> {
    /// The remote accepted a create or update.
    RuleSaved {
        mutation: Mutation,
        country: &'a str,
        rule: &'a Rule,
    },
    /// The remote accepted a delete.
    RuleDeleted { country: &'a str },
    /// The remote was unreachable; the change only exists in the shadow store.
    StoredLocally { mutation: Mutation, country: &'a str },
}

impl Notice<'_> {
    pub fn headline(&self) -> String {
        match self {
            Notice::RuleSaved { country, rule, .. } if rule.drop => {
                format!("{country}'S PACKETS BLOCKED FOREVER")
            }
            Notice::RuleSaved {
                mutation: Mutation::Update,
                country,
                rule,
            } => format!("TARIFF ON {country} REVISED TO {}%", rule.delay_percentage),
            Notice::RuleSaved { country, rule, .. } => {
                format!("NEW {}% TARIFF ON {country}", rule.delay_percentage)
            }
            Notice::RuleDeleted { country } => format!("NO MORE BLOCKS FOR {country}"),
            Notice::StoredLocally { .. } => "BACKEND UNREACHABLE, ACTION KEPT LOCALLY".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notice::RuleSaved {
                mutation: Mutation::Create,
                rule,
                ..
            } if rule.drop => "They're out. Totally blocked. End of story.".to_string(),
            Notice::RuleSaved { rule, .. } if rule.drop => {
                "Every packet from there is dropped from now on.".to_string()
            }
            Notice::RuleSaved {
                mutation: Mutation::Update,
                ..
            } => "The old rate is gone. The new one applies immediately.".to_string(),
            Notice::RuleSaved { country, .. } => {
                format!("Traffic from {country} now waits its turn.")
            }
            Notice::RuleDeleted { .. } => {
                "The rule is removed and the doors are open again.".to_string()
            }
            Notice::StoredLocally { mutation, country } => format!(
                "The {} for {country} was saved on this dashboard only and will not reach the server.",
                mutation.verb()
            ),
        }
    }
}

/// Sink for mutation notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, headline: &str, body: &str);
}

/// Emit a notice through a notifier.
pub fn announce(notifier: &dyn Notifier, notice: &Notice<'_>) {
    notifier.notify(&notice.headline(), &notice.body());
}

/// Default notifier: writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, headline: &str, body: &str) {
        tracing::info!("{headline} | {body}");
    }
}
