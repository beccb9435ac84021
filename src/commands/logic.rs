//! Pure form-handling and table-building functions behind the operator commands.
//!
//! These take plain parameters (no `AppState`) and can be unit-tested without
//! a runtime.

use serde::{Deserialize, Serialize};

use crate::core::directory::CountryDirectory;
use crate::core::rule::Rule;
use crate::error::AppError;

/// Raw contents of the add/edit rule form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleForm {
    /// Selected country code; `None` or blank when nothing is selected.
    pub country: Option<String>,
    pub drop: bool,
    /// Text of the delay field; ignored when `drop` is set.
    #[serde(default)]
    pub delay_input: String,
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRow {
    pub country_code: String,
    pub country_name: String,
    pub flag: String,
    pub policy: String,
    pub delay_percentage: u32,
    pub drop: bool,
    pub id: Option<u64>,
}

/// The rule table plus whether it reflects the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTable {
    /// True when rows come from the local shadow store.
    pub degraded: bool,
    pub rows: Vec<RuleRow>,
}

/// Return the selected country code or reject an empty selection.
pub fn selected_country(form: &RuleForm) -> Result<&str, AppError> {
    match form.country.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(AppError::Validation("Select a country".into())),
    }
}

/// Parse the delay field. With `drop` set the field is not read at all.
///
/// Range checks happen in [`RuleDraft::new`](crate::core::rule::RuleDraft::new);
/// this only rejects text that is not an integer.
pub fn parse_delay_input(drop: bool, input: &str) -> Result<Option<i64>, AppError> {
    if drop {
        return Ok(None);
    }
    input
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| AppError::Validation("Enter a valid delay percentage".into()))
}

pub fn build_rule_row(rule: &Rule, directory: &CountryDirectory) -> RuleRow {
    let info = directory.lookup(&rule.country_code);
    RuleRow {
        country_code: rule.country_code.clone(),
        country_name: info.name,
        flag: info.flag,
        policy: rule.display_text(),
        delay_percentage: rule.delay_percentage,
        drop: rule.drop,
        id: rule.id,
    }
}

pub fn build_rule_table(rules: &[Rule], degraded: bool, directory: &CountryDirectory) -> RuleTable {
    RuleTable {
        degraded,
        rows: rules
            .iter()
            .map(|rule| build_rule_row(rule, directory))
            .collect(),
    }
}
