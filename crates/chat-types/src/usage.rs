use serde::{Deserialize, Serialize};
use crate::message::MessageUsage;

/// Token usage as reported by a model. Any field may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl Usage {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// Input/output/total counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageTotals {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl UsageTotals {
    pub fn add(&mut self, other: &UsageTotals) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

impl From<MessageUsage> for UsageTotals {
    fn from(u: MessageUsage) -> Self {
        Self {
            input: u.input,
            output: u.output,
            total: u.total(),
        }
    }
}

/// Running usage counters against a ceiling for a rolling period.
///
/// Only grows; `reset` is reserved for the administration surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLedger {
    pub totals: UsageTotals,
    pub limit: u64,
    pub period: String,
}

impl UsageLedger {
    pub fn new(limit: u64, period: impl Into<String>) -> Self {
        Self {
            totals: UsageTotals::default(),
            limit,
            period: period.into(),
        }
    }

    pub fn record(&mut self, exchange: &UsageTotals) {
        self.totals.add(exchange);
    }

    /// Replace the counters with an authoritative figure from the store.
    pub fn sync(&mut self, totals: UsageTotals) {
        self.totals = totals;
    }

    pub fn reset(&mut self) {
        self.totals = UsageTotals::default();
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.totals.total)
    }

    pub fn fraction_used(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        self.totals.total as f64 / self.limit as f64
    }
}

/// Rough token estimate: about four characters per token, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
