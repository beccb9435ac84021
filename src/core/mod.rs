//! Core domain: rules, packets, the country directory, and the packet feed.
//!
//! - [`Rule`] / [`RuleDraft`]: per-country policy and validated operator input
//! - [`PacketRecord`] / [`PacketRow`]: feed records and their display form
//! - [`CountryDirectory`]: code → name/flag lookup, loaded once
//! - [`PacketFeed`]: append-only packet log with a cancellable poller

pub mod directory;
pub mod feed;
pub mod packet;
pub mod rule;

pub use directory::{CountryDirectory, CountryInfo, CountryOption};
pub use feed::{FeedStats, PacketFeed, PollOutcome, PollerHandle};
pub use packet::{PacketRecord, PacketRow, PacketStatus};
pub use rule::{Rule, RuleDraft};
