//! Shared application state handed to every command.

use std::sync::Arc;

use crate::core::directory::CountryDirectory;
use crate::core::feed::PacketFeed;
use crate::store::RuleStore;

/// Explicitly constructed services, in initialization order.
#[derive(Clone)]
pub struct AppState {
    /// Loaded before anything else; read-only afterwards.
    pub directory: Arc<CountryDirectory>,
    pub rules: Arc<RuleStore>,
    pub feed: Arc<PacketFeed>,
}
