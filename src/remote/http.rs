//! `reqwest` client for the rule and packet API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::core::packet::{PacketRecord, PacketsPayload};
use crate::core::rule::{Rule, RuleDraft, RulesPayload};
use crate::error::AppError;

use super::{PacketSource, RuleApi};

/// HTTP client for `/api/rules` and `/api/packets`.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApi {
    /// Create a client without a request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rules_url(&self) -> String {
        format!("{}/api/rules", self.base_url)
    }

    fn rule_url(&self, country_code: &str) -> String {
        format!("{}/api/rules/{}", self.base_url, country_code)
    }

    fn packets_url(&self) -> String {
        format!("{}/api/packets", self.base_url)
    }

    /// Send a request and reject non-success statuses.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RemoteUnavailable(format!("HTTP {status}")));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AppError> {
        let response = self.send(self.client.get(url)).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Decode a mutation response. The server echoes the rule; if it does not,
    /// the submitted values stand in for it.
    async fn mutation_result(response: reqwest::Response, draft: &RuleDraft) -> Rule {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Rule response body unreadable, using submitted values: {e}");
                return draft.to_rule();
            }
        };
        decode_rule_echo(&body, draft)
    }
}

/// Interpret a mutation echo: a bare rule, `{"rule": {...}}`, or anything else.
fn decode_rule_echo(body: &[u8], draft: &RuleDraft) -> Rule {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return draft.to_rule(),
    };
    let candidate = value.get("rule").cloned().unwrap_or(value);
    match serde_json::from_value::<Rule>(candidate) {
        Ok(rule) if rule.country_code.eq_ignore_ascii_case(&draft.country_code) => rule.normalized(),
        Ok(_) | Err(_) => draft.to_rule(),
    }
}

#[async_trait]
impl RuleApi for HttpApi {
    async fn fetch_rules(&self) -> Result<Vec<Rule>, AppError> {
        let payload: RulesPayload = self.get_json(&self.rules_url()).await?;
        Ok(payload.into_rules())
    }

    async fn create_rule(&self, draft: &RuleDraft) -> Result<Rule, AppError> {
        let response = self
            .send(self.client.post(self.rule_url(&draft.country_code)).json(draft))
            .await?;
        Ok(Self::mutation_result(response, draft).await)
    }

    async fn update_rule(&self, draft: &RuleDraft) -> Result<Rule, AppError> {
        let body = serde_json::json!({
            "delay_percentage": draft.delay_percentage,
            "drop": draft.drop,
        });
        let response = self
            .send(self.client.put(self.rule_url(&draft.country_code)).json(&body))
            .await?;
        Ok(Self::mutation_result(response, draft).await)
    }

    /// A 404 means the server has no such rule: deleting it is a no-op.
    async fn delete_rule(&self, country_code: &str) -> Result<(), AppError> {
        let response = self
            .client
            .delete(self.rule_url(country_code))
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("Rule {country_code} not on the server, nothing to delete");
            return Ok(());
        }
        if !status.is_success() {
            return Err(AppError::RemoteUnavailable(format!("HTTP {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl PacketSource for HttpApi {
    async fn fetch_packets(&self) -> Result<Vec<PacketRecord>, AppError> {
        let payload: PacketsPayload = self.get_json(&self.packets_url()).await?;
        Ok(payload.into_records())
    }
}
