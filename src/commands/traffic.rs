//! Packet table, feed status, and country selection commands.

use serde::Serialize;

use crate::core::directory::CountryOption;
use crate::core::feed::FeedStats;
use crate::core::packet::PacketRow;

use super::state::AppState;

/// Visible state of the packet feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub last_error: Option<String>,
    pub cycles: u64,
    pub skipped: u64,
    pub failures: u64,
    pub records: usize,
}

impl From<(FeedStats, Option<String>)> for FeedStatus {
    fn from((stats, last_error): (FeedStats, Option<String>)) -> Self {
        Self {
            last_error,
            cycles: stats.cycles,
            skipped: stats.skipped,
            failures: stats.failures,
            records: stats.records,
        }
    }
}

/// Every packet received this session, countries resolved.
pub fn get_packet_rows(state: &AppState) -> Vec<PacketRow> {
    state.feed.rows(&state.directory)
}

/// Rows received after the first `offset`.
pub fn get_packet_rows_since(state: &AppState, offset: usize) -> Vec<PacketRow> {
    state.feed.rows_since(offset, &state.directory)
}

pub fn clear_packets(state: &AppState) {
    state.feed.clear();
}

pub fn get_feed_status(state: &AppState) -> FeedStatus {
    (state.feed.stats(), state.feed.last_error()).into()
}

/// Options for the country selection input, sorted by name.
pub fn get_country_options(state: &AppState) -> Vec<CountryOption> {
    state.directory.options()
}

/// Failure message when the country catalog could not be loaded.
pub fn get_directory_status(state: &AppState) -> Option<String> {
    state.directory.status_message()
}
