//! Per-country traffic policy: a delay percentage or an unconditional drop.
//!
//! The two-letter country code is the canonical key. A numeric `id` may travel
//! with a rule (the server's, or a locally generated one) but is only a display
//! convenience.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::MAX_DELAY_PERCENTAGE;
use crate::error::AppError;

/// A traffic policy for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(alias = "countryCode")]
    pub country_code: String,
    /// 0–100. Always 0 when `drop` is set.
    #[serde(
        default,
        alias = "delayPercentage",
        alias = "rate",
        deserialize_with = "delay_from_number"
    )]
    pub delay_percentage: u32,
    #[serde(default, alias = "dropped")]
    pub drop: bool,
    #[serde(
        default,
        alias = "ruleId",
        alias = "rule_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
}

impl Rule {
    /// Enforce the rule invariants on data that did not come through [`RuleDraft`]:
    /// upper-case country code, zero delay on drop.
    pub fn normalized(mut self) -> Self {
        self.country_code = self.country_code.trim().to_ascii_uppercase();
        if self.drop {
            self.delay_percentage = 0;
        }
        self
    }

    /// Short policy label for tables: "Drop" or "Delay N%".
    pub fn display_text(&self) -> String {
        if self.drop {
            "Drop".to_string()
        } else {
            format!("Delay {}%", self.delay_percentage)
        }
    }
}

/// Validated operator input for a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDraft {
    pub country_code: String,
    pub delay_percentage: u32,
    pub drop: bool,
}

impl RuleDraft {
    /// Validate and normalize a mutation.
    ///
    /// With `drop` set, `delay` is ignored and stored as 0. Without it, a delay
    /// in `0..=100` is required.
    pub fn new(country_code: &str, delay: Option<i64>, drop: bool) -> Result<Self, AppError> {
        let country_code = normalize_country_code(country_code)?;

        let delay_percentage = if drop {
            0
        } else {
            match delay {
                None => {
                    return Err(AppError::Validation(
                        "Enter a valid delay percentage".into(),
                    ))
                }
                Some(d) if d < 0 => {
                    return Err(AppError::Validation(format!(
                        "Delay percentage must not be negative (got {d})"
                    )))
                }
                Some(d) if d > i64::from(MAX_DELAY_PERCENTAGE) => {
                    return Err(AppError::Validation(format!(
                        "Delay percentage must be at most {MAX_DELAY_PERCENTAGE} (got {d})"
                    )))
                }
                Some(d) => d as u32,
            }
        };

        Ok(Self {
            country_code,
            delay_percentage,
            drop,
        })
    }

    /// The rule this draft describes, without an id.
    pub fn to_rule(&self) -> Rule {
        Rule {
            country_code: self.country_code.clone(),
            delay_percentage: self.delay_percentage,
            drop: self.drop,
            id: None,
        }
    }
}

/// Trim and upper-case a country code, rejecting anything that is not two ASCII letters.
pub fn normalize_country_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(AppError::Validation("Select a country".into()));
    }
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "Country code must be two letters (got {code:?})"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Body of `GET /api/rules`.
///
/// The API returns a list; the proxy's own control surface keeps a map of
/// country to `{rate, dropped}`. Both decode to the same ordered rule list.
#[derive(Debug, Deserialize)]
pub struct RulesPayload {
    #[serde(default)]
    pub rules: RuleCollection,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RuleCollection {
    List(Vec<Rule>),
    ByCountry(BTreeMap<String, CountryPolicy>),
}

impl Default for RuleCollection {
    fn default() -> Self {
        RuleCollection::List(Vec::new())
    }
}

/// Map-shaped entry: the country code is the map key.
#[derive(Debug, Deserialize)]
pub struct CountryPolicy {
    #[serde(
        default,
        alias = "rate",
        alias = "delayPercentage",
        deserialize_with = "delay_from_number"
    )]
    pub delay_percentage: u32,
    #[serde(default, alias = "dropped")]
    pub drop: bool,
}

impl RulesPayload {
    pub fn into_rules(self) -> Vec<Rule> {
        match self.rules {
            RuleCollection::List(rules) => rules.into_iter().map(Rule::normalized).collect(),
            RuleCollection::ByCountry(map) => map
                .into_iter()
                .map(|(country_code, policy)| {
                    Rule {
                        country_code,
                        delay_percentage: policy.delay_percentage,
                        drop: policy.drop,
                        id: None,
                    }
                    .normalized()
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDelay {
    Int(i64),
    Float(f64),
}

/// Accept any JSON number as a delay. The proxy stores rates as floats;
/// the value is rounded and clamped into `0..=MAX_DELAY_PERCENTAGE`.
fn delay_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let max = i64::from(MAX_DELAY_PERCENTAGE);
    let delay = match RawDelay::deserialize(deserializer)? {
        RawDelay::Int(n) => n.clamp(0, max),
        RawDelay::Float(f) if f.is_finite() => (f.round() as i64).clamp(0, max),
        RawDelay::Float(_) => 0,
    };
    Ok(delay as u32)
}
