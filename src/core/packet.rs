//! Packet records reported by the decision engine, and their display rows.
//!
//! Record ids are not unique upstream. Nothing here keys records by `id`;
//! [`PacketRecord::identity`] gives the (id, timestamp, source_ip) tuple for
//! consumers that need a stronger key.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::directory::CountryDirectory;

/// What the engine did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketStatus {
    Delayed,
    Dropped,
    #[serde(alias = "retained")]
    Detained,
}

impl PacketStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PacketStatus::Delayed => "Delayed",
            PacketStatus::Dropped => "Dropped",
            PacketStatus::Detained => "Detained",
        }
    }
}

/// One intercepted traffic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(alias = "sourceIp")]
    pub source_ip: String,
    #[serde(alias = "sourceCountry")]
    pub source_country: String,
    #[serde(default, alias = "destinationIp")]
    pub destination_ip: Option<String>,
    #[serde(default, alias = "destinationCountry")]
    pub destination_country: Option<String>,
    /// Bytes.
    #[serde(default)]
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    #[serde(deserialize_with = "epoch_millis")]
    pub timestamp: i64,
    /// Round-trip time in milliseconds.
    #[serde(default, alias = "rttTime")]
    pub rtt_time: f64,
    /// Retention in seconds; absent for dropped packets.
    #[serde(default, alias = "retainTime")]
    pub retain_time: Option<f64>,
    pub status: PacketStatus,
    #[serde(
        default,
        alias = "appliedRuleId",
        deserialize_with = "optional_string_or_number"
    )]
    pub applied_rule_id: Option<String>,
}

/// Identity tuple for packets, since `id` alone repeats.
pub type PacketKey = (String, i64, String);

impl PacketRecord {
    pub fn identity(&self) -> PacketKey {
        (self.id.clone(), self.timestamp, self.source_ip.clone())
    }
}

/// Body of `GET /api/packets`.
///
/// Records are decoded one at a time so a malformed entry costs only itself.
#[derive(Debug, Deserialize)]
pub struct PacketsPayload {
    #[serde(default)]
    pub packets: Vec<serde_json::Value>,
}

impl PacketsPayload {
    /// Decode every well-formed record, skipping (and logging) the rest.
    pub fn into_records(self) -> Vec<PacketRecord> {
        let total = self.packets.len();
        let records: Vec<PacketRecord> = self
            .packets
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value(raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping malformed packet record #{index}: {e}");
                    None
                }
            })
            .collect();
        if records.len() < total {
            tracing::debug!("Decoded {} of {total} packet records", records.len());
        }
        records
    }
}

/// A packet ready for a table, countries resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRow {
    pub id: String,
    pub url: String,
    pub source_ip: String,
    pub source_country_name: String,
    pub source_flag: String,
    pub destination_ip: String,
    pub destination_country_name: String,
    pub size: String,
    pub time: String,
    pub rtt: String,
    pub retain: String,
    pub status: PacketStatus,
    pub status_text: &'static str,
    pub applied_rule_id: Option<String>,
}

impl PacketRow {
    pub fn from_record(record: &PacketRecord, directory: &CountryDirectory) -> Self {
        let source = directory.lookup(&record.source_country);
        let destination_country_name = record
            .destination_country
            .as_deref()
            .map(|code| directory.lookup(code).name)
            .unwrap_or_default();

        Self {
            id: record.id.clone(),
            url: record.url.clone().unwrap_or_default(),
            source_ip: record.source_ip.clone(),
            source_country_name: source.name,
            source_flag: source.flag,
            destination_ip: record.destination_ip.clone().unwrap_or_default(),
            destination_country_name,
            size: format_size(record.size),
            time: format_timestamp(record.timestamp),
            rtt: format!("{:.0}ms", record.rtt_time),
            retain: record
                .retain_time
                .map(|secs| format!("{secs:.0}s"))
                .unwrap_or_else(|| "-".to_string()),
            status: record.status,
            status_text: record.status.label(),
            applied_rule_id: record.applied_rule_id.clone(),
        }
    }
}

/// Format a byte count in a compact human-readable form.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b < 1024.0 {
        format!("{bytes} B")
    } else if b < 1024.0 * 1024.0 {
        format!("{:.1} KB", b / 1024.0)
    } else {
        format!("{:.2} MB", b / (1024.0 * 1024.0))
    }
}

/// Render epoch milliseconds in local time; out-of-range values fall back to the raw number.
pub fn format_timestamp(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => millis.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Int(i64),
    Float(f64),
    Text(String),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawScalar::deserialize(deserializer)? {
        RawScalar::Int(n) => n.to_string(),
        RawScalar::Float(f) => f.to_string(),
        RawScalar::Text(s) => s,
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawScalar>::deserialize(deserializer)?.map(|raw| match raw {
        RawScalar::Int(n) => n.to_string(),
        RawScalar::Float(f) => f.to_string(),
        RawScalar::Text(s) => s,
    }))
}

/// Accept epoch milliseconds (integer or float) or an RFC 3339 string.
fn epoch_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawScalar::deserialize(deserializer)? {
        RawScalar::Int(n) => Ok(n),
        RawScalar::Float(f) => Ok(f as i64),
        RawScalar::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.timestamp_millis())
            .map_err(serde::de::Error::custom),
    }
}
