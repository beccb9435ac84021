//! Remote endpoints consumed by the dashboard.
//!
//! - [`RuleApi`]: `/api/rules` CRUD
//! - [`PacketSource`]: `GET /api/packets`
//! - [`CountryCatalog`]: third-party country metadata
//!
//! [`HttpApi`] implements the first two over `reqwest`; [`RestCountries`] the
//! third. Every failure surfaces as [`AppError::RemoteUnavailable`].

pub mod countries;
pub mod http;

use async_trait::async_trait;

use crate::core::directory::CountryInfo;
use crate::core::packet::PacketRecord;
use crate::core::rule::{Rule, RuleDraft};
use crate::error::AppError;

pub use countries::RestCountries;
pub use http::HttpApi;

#[async_trait]
pub trait RuleApi: Send + Sync {
    async fn fetch_rules(&self) -> Result<Vec<Rule>, AppError>;
    async fn create_rule(&self, draft: &RuleDraft) -> Result<Rule, AppError>;
    async fn update_rule(&self, draft: &RuleDraft) -> Result<Rule, AppError>;
    async fn delete_rule(&self, country_code: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait PacketSource: Send + Sync {
    async fn fetch_packets(&self) -> Result<Vec<PacketRecord>, AppError>;
}

#[async_trait]
pub trait CountryCatalog: Send + Sync {
    async fn fetch_countries(&self) -> Result<Vec<(String, CountryInfo)>, AppError>;
}
