use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transaction as delivered by the node, reduced to the fields the
/// listener reads. Decoded from the RPC JSON by `ingest::frames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// First entry is the primary signature
    pub signatures: Vec<String>,
    pub account_keys: Vec<String>,
    pub log_messages: Option<Vec<String>>,
}

impl TransactionRecord {
    pub fn primary_signature(&self) -> Option<&str> {
        self.signatures.first().map(String::as_str)
    }

    pub fn mentions_log(&self, phrase: &str) -> bool {
        self.log_messages
            .as_ref()
            .map(|logs| logs.iter().any(|line| line.contains(phrase)))
            .unwrap_or(false)
    }
}

/// A newly initialized liquidity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInitializationRecord {
    pub signature: String,
    pub token_address: String,
    pub liquidity_address: String,
    /// Wall-clock time of extraction, not block time
    pub observed_at: DateTime<Utc>,
}

/// Why a transaction did not yield a pool record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InsufficientAccountKeys { found: usize, required: usize },
    MissingSignature,
    MissingAccount { index: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientAccountKeys { found, required } => write!(
                f,
                "insufficient account keys (found {}, need more than {})",
                found, required
            ),
            RejectReason::MissingSignature => write!(f, "missing signature"),
            RejectReason::MissingAccount { index } => {
                write!(f, "missing account at index {}", index)
            }
        }
    }
}

/// Result of running the extractor over one transaction.
///
/// `Rejected` is ordinary control flow: unrelated transactions share the
/// trigger log line and simply do not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Matched(PoolInitializationRecord),
    Rejected(RejectReason),
}
