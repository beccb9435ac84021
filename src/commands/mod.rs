//! Operator command handlers, organized by functional domain.
//!
//! - `rules`: rule table listing, add, edit, delete
//! - `traffic`: packet table, feed status, country selection
//! - `logic`: pure form-handling and table-building functions (unit-testable)
//! - `state`: shared `AppState` definition

mod logic;
pub mod rules;
mod state;
pub mod traffic;

pub use logic::{RuleForm, RuleRow, RuleTable};
pub use state::AppState;
pub use traffic::FeedStatus;
