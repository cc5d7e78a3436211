//! Usage data types decoded from the traffic statistics endpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error type for a single refresh attempt.
///
/// None of these are fatal: the caller keeps its last good data and tries
/// again on the next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or HTTP-level failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local payload file could not be read
    #[error("failed to read payload: {0}")]
    Io(#[from] std::io::Error),

    /// Body was not valid JSON for the expected shape
    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Body decoded but did not report success
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Mapping of cycle id to cycle record
pub type UsagePayload = BTreeMap<String, UsageCycle>;

/// Top-level response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageResponse {
    /// Explicit success indicator; absent counts as failure
    #[serde(default)]
    pub success: bool,
    /// Statistics payload, present on success
    #[serde(default)]
    pub data: Option<UsageData>,
}

/// Nested statistics payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageData {
    /// Accounting cycles keyed by cycle id
    #[serde(default)]
    pub cycles: UsagePayload,
}

impl UsageResponse {
    /// Extract the cycle mapping, rejecting responses that did not succeed
    pub fn into_payload(self) -> Result<UsagePayload, FetchError> {
        if !self.success {
            return Err(FetchError::Malformed(
                "success flag false or missing".to_string(),
            ));
        }
        self.data
            .map(|d| d.cycles)
            .ok_or_else(|| FetchError::Malformed("missing statistics payload".to_string()))
    }
}

/// One accounting period for one or more servers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCycle {
    /// Cycle display name (e.g., "Monthly")
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Server id → server display name
    #[serde(default)]
    pub server_name: BTreeMap<String, String>,
    /// Server id → bytes used in this cycle
    #[serde(default, deserialize_with = "numeric_map")]
    pub transfer: BTreeMap<String, f64>,
    /// Byte quota shared by every server in the cycle
    #[serde(default, deserialize_with = "lenient_number")]
    pub max: Option<f64>,
    /// Period start
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: Option<String>,
    /// Period end
    #[serde(default, deserialize_with = "lenient_string")]
    pub to: Option<String>,
    /// Server id → next scheduled update timestamp
    #[serde(default, deserialize_with = "string_map")]
    pub next_update: BTreeMap<String, String>,
}

/// Numbers may arrive as JSON numbers or numeric strings
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_string(&value))
}

fn numeric_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| coerce_number(&v).map(|n| (k, n)))
        .collect())
}

fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| coerce_string(&v).map(|s| (k, s)))
        .collect())
}
