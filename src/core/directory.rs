//! Session-cached lookup from country code to display name and flag.
//!
//! Loaded exactly once at startup from the country catalog and immutable
//! afterwards. A failed load leaves an empty directory carrying a failure
//! message; every lookup still succeeds by falling back to the raw code.

use std::collections::HashMap;

use serde::Serialize;

use crate::remote::CountryCatalog;

/// Display metadata for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryInfo {
    pub name: String,
    /// Flag image URL; empty when unknown.
    pub flag: String,
}

/// One entry of the selection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryOption {
    pub code: String,
    pub name: String,
    pub flag: String,
}

#[derive(Debug, Default)]
pub struct CountryDirectory {
    entries: HashMap<String, CountryInfo>,
    load_error: Option<String>,
}

impl CountryDirectory {
    /// Fetch the catalog once. Never fails; see [`CountryDirectory::load_error`].
    pub async fn load(catalog: &dyn CountryCatalog) -> Self {
        match catalog.fetch_countries().await {
            Ok(entries) => {
                let directory = Self::from_entries(entries);
                tracing::info!("Country directory loaded with {} entries", directory.len());
                directory
            }
            Err(e) => {
                tracing::warn!("Failed to load country catalog: {e}");
                Self {
                    entries: HashMap::new(),
                    load_error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, CountryInfo)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(code, info)| (code.trim().to_ascii_uppercase(), info))
                .collect(),
            load_error: None,
        }
    }

    /// Resolve a code. Unknown codes yield `{name: code, flag: ""}`.
    pub fn lookup(&self, code: &str) -> CountryInfo {
        self.entries
            .get(&code.trim().to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(|| CountryInfo {
                name: code.to_string(),
                flag: String::new(),
            })
    }

    /// Upper-cased display name used in headlines.
    pub fn headline_name(&self, code: &str) -> String {
        match self.entries.get(&code.trim().to_ascii_uppercase()) {
            Some(info) => info.name.to_uppercase(),
            None => code.to_string(),
        }
    }

    /// All entries sorted by display name, for the country selection input.
    pub fn options(&self) -> Vec<CountryOption> {
        let mut options: Vec<CountryOption> = self
            .entries
            .iter()
            .map(|(code, info)| CountryOption {
                code: code.clone(),
                name: info.name.clone(),
                flag: info.flag.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code)));
        options
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Why the catalog could not be loaded, if it could not.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Operator-facing status line: `None` when the catalog loaded.
    pub fn status_message(&self) -> Option<String> {
        self.load_error
            .as_ref()
            .map(|e| format!("Failed to load country data, please try again later ({e})"))
    }
}
