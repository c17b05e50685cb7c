use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const NO_GIVEN_REASON: &str = "No given reason";
/// Reason recorded for items the store returned no outcome for.
pub const MISSING_OUTCOME: &str = "No outcome returned";

/// One item the store refused inside an otherwise delivered chunk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Bad push batch between {start}:{end} - Reason: {reason}")]
pub struct PartialPushFailure {
    pub chunk: usize,
    pub start: usize,
    pub end: usize,
    /// Absolute index of the item in the submitted sequence.
    pub item: usize,
    pub reason: String,
}

/// Per-item outcome as returned by the entity endpoint. Anything other than
/// `successful: true` counts as a failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemOutcome {
    #[serde(default)]
    pub successful: Option<bool>,
    #[serde(default)]
    pub errors: Option<Value>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.successful == Some(true)
    }

    pub fn reason(&self) -> String {
        self.errors
            .as_ref()
            .and_then(|errors| errors.get("errorMessage"))
            .and_then(|message| match message {
                Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| NO_GIVEN_REASON.to_string())
    }
}

/// Ledger entries of every refused item, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    entries: Vec<PartialPushFailure>,
}

impl FailureLedger {
    pub fn record(&mut self, failure: PartialPushFailure) {
        tracing::warn!(
            target: "submission",
            chunk = failure.chunk,
            item = failure.item,
            reason = %failure.reason,
            "item rejected by remote store"
        );
        self.entries.push(failure);
    }

    pub fn entries(&self) -> &[PartialPushFailure] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per entry.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{entry}\n"))
            .collect()
    }
}
