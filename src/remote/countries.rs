//! Country catalog client (restcountries v3.1 `/all` shape).

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::directory::CountryInfo;
use crate::error::AppError;

use super::CountryCatalog;

#[derive(Debug, Deserialize)]
struct CatalogCountry {
    cca2: String,
    name: CatalogName,
    #[serde(default)]
    flags: CatalogFlags,
}

#[derive(Debug, Deserialize)]
struct CatalogName {
    common: String,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFlags {
    #[serde(default)]
    svg: String,
    #[serde(default)]
    png: String,
}

impl CatalogCountry {
    fn into_entry(self) -> (String, CountryInfo) {
        let flag = if self.flags.svg.is_empty() {
            self.flags.png
        } else {
            self.flags.svg
        };
        (
            self.cca2.to_ascii_uppercase(),
            CountryInfo {
                name: self.name.common,
                flag,
            },
        )
    }
}

/// Decode a full catalog response body.
fn parse_catalog(body: &[u8]) -> Result<Vec<(String, CountryInfo)>, AppError> {
    let countries: Vec<CatalogCountry> = serde_json::from_slice(body)?;
    Ok(countries.into_iter().map(CatalogCountry::into_entry).collect())
}

/// Fetches the catalog from a restcountries-compatible endpoint.
#[derive(Debug, Clone)]
pub struct RestCountries {
    url: String,
    client: reqwest::Client,
}

impl RestCountries {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CountryCatalog for RestCountries {
    async fn fetch_countries(&self) -> Result<Vec<(String, CountryInfo)>, AppError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::RemoteUnavailable(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body = response.bytes().await?;
        parse_catalog(&body)
    }
}
