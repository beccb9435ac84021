//! Rule table commands: list, add, edit, delete.

use crate::error::AppError;
use crate::store::{Confirm, DeleteOutcome};

use super::logic::{
    build_rule_row, build_rule_table, parse_delay_input, selected_country, RuleForm, RuleRow,
    RuleTable,
};
use super::state::AppState;

/// Re-fetch the rule set (remote, or shadow store when the remote is down).
pub async fn refresh_rules(state: &AppState) -> RuleTable {
    let view = state.rules.list().await;
    build_rule_table(view.rules(), view.is_degraded(), &state.directory)
}

/// The table from the most recent refresh, without a request.
pub fn get_rules(state: &AppState) -> RuleTable {
    let view = state.rules.current();
    build_rule_table(view.rules(), view.is_degraded(), &state.directory)
}

pub async fn add_rule(state: &AppState, form: &RuleForm) -> Result<RuleRow, AppError> {
    let country = selected_country(form)?;
    let delay = parse_delay_input(form.drop, &form.delay_input)?;
    let rule = state.rules.create(country, delay, form.drop).await?;
    tracing::info!("Added rule for {}: {}", rule.country_code, rule.display_text());
    Ok(build_rule_row(&rule, &state.directory))
}

pub async fn edit_rule(
    state: &AppState,
    country_code: &str,
    drop: bool,
    delay_input: &str,
) -> Result<RuleRow, AppError> {
    let delay = parse_delay_input(drop, delay_input)?;
    let rule = state.rules.update(country_code, delay, drop).await?;
    tracing::info!("Edited rule for {}: {}", rule.country_code, rule.display_text());
    Ok(build_rule_row(&rule, &state.directory))
}

pub async fn delete_rule(
    state: &AppState,
    country_code: &str,
    confirm: &dyn Confirm,
) -> Result<DeleteOutcome, AppError> {
    let outcome = state.rules.delete(country_code, confirm).await?;
    if outcome == DeleteOutcome::Deleted {
        tracing::info!("Deleted rule for {country_code}");
    }
    Ok(outcome)
}
