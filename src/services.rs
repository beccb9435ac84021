//! Service lifecycle management.
//!
//! `BackgroundServices` builds every service during startup, in dependency
//! order, and owns the packet poller so it can be shut down cleanly.

use std::sync::Arc;
use std::time::Duration;

use crate::commands::{self, AppState, RuleTable};
use crate::config::{DashboardConfig, SEED_FALLBACK_RULES};
use crate::core::directory::CountryDirectory;
use crate::core::feed::{PacketFeed, PollerHandle};
use crate::core::packet::PacketRow;
use crate::error::AppError;
use crate::notify::Notifier;
use crate::remote::{CountryCatalog, HttpApi, PacketSource, RestCountries, RuleApi};
use crate::store::{RuleStore, ShadowStore};

/// Remote endpoints the services are built on.
pub struct Remotes {
    pub rules: Arc<dyn RuleApi>,
    pub packets: Arc<dyn PacketSource>,
    pub catalog: Arc<dyn CountryCatalog>,
}

impl Remotes {
    /// HTTP endpoints described by `config`.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, AppError> {
        let api = match config.request_timeout {
            Some(timeout) => HttpApi::with_timeout(&config.api_base, timeout)?,
            None => HttpApi::new(&config.api_base),
        };
        let api = Arc::new(api);
        Ok(Self {
            rules: api.clone(),
            packets: api,
            catalog: Arc::new(RestCountries::new(&config.countries_url)),
        })
    }
}

/// Running services.
///
/// Started in dependency order:
/// 1. Country directory (one-shot catalog load; everything else resolves names through it)
/// 2. Rule store (initial fetch-or-fallback list)
/// 3. Packet poller (recurring fetch, first cycle immediately)
pub struct BackgroundServices {
    pub state: AppState,
    poller: PollerHandle,
}

impl BackgroundServices {
    pub async fn start(
        remotes: Remotes,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        // 1. Directory: must finish before any row is rendered.
        let directory = Arc::new(CountryDirectory::load(remotes.catalog.as_ref()).await);
        if let Some(message) = directory.status_message() {
            tracing::warn!("{message}");
        }

        // 2. Rule store: initial list decides Synced vs Degraded.
        let rules = Arc::new(RuleStore::new(
            remotes.rules,
            ShadowStore::seeded(SEED_FALLBACK_RULES),
            Arc::clone(&directory),
            notifier,
        ));
        let view = rules.list().await;
        if view.is_degraded() {
            tracing::warn!(
                "Rule API unreachable, running on {} local rules",
                view.rules().len()
            );
        } else {
            tracing::info!("Loaded {} rules from the API", view.rules().len());
        }

        // 3. Packet poller: depends on nothing but its source; rows resolve via the directory.
        let feed = Arc::new(PacketFeed::new(remotes.packets));
        let poller = feed.start_polling(poll_interval);

        Self {
            state: AppState {
                directory,
                rules,
                feed,
            },
            poller,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Stop the packet poller and wait for it to exit.
    pub async fn shutdown(self) {
        self.poller.stop().await;
    }
}

/// Log the rule table, one line per rule.
pub fn log_rule_table(table: &RuleTable) {
    let source = if table.degraded { "local" } else { "remote" };
    tracing::info!("Rules ({source}, {}):", table.rows.len());
    for row in &table.rows {
        tracing::info!("  {} {:<24} {}", row.country_code, row.country_name, row.policy);
    }
}

/// Format one packet row as a log line.
pub fn format_packet_line(row: &PacketRow) -> String {
    format!(
        "[{}] {} {} ({}) {} {} rtt={} retain={} {}",
        row.time,
        row.id,
        row.source_ip,
        row.source_country_name,
        row.url,
        row.size,
        row.rtt,
        row.retain,
        row.status_text
    )
}

/// Log rows that arrived since `offset` and return the new offset.
///
/// An operator clear shrinks the log below `offset`; rendering restarts from zero.
pub fn log_new_packets(state: &AppState, offset: usize) -> usize {
    let offset = if state.feed.len() < offset { 0 } else { offset };
    let rows = commands::traffic::get_packet_rows_since(state, offset);
    for row in &rows {
        tracing::info!("{}", format_packet_line(row));
    }
    offset + rows.len()
}
