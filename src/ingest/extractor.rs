use chrono::Utc;

use crate::config::AccountLayout;
use crate::core::types::{
    ExtractionOutcome, PoolInitializationRecord, RejectReason, TransactionRecord,
};

/// Pulls the new pool out of an initialize transaction by fixed
/// account-key position.
#[derive(Debug, Clone, Copy)]
pub struct PoolExtractor {
    layout: AccountLayout,
}

impl PoolExtractor {
    pub fn new(layout: AccountLayout) -> Self {
        Self { layout }
    }

    pub fn extract(&self, tx: &TransactionRecord) -> ExtractionOutcome {
        extract(
            tx,
            self.layout.required_account_count,
            self.layout.token_index,
            self.layout.liquidity_index,
        )
    }
}

impl Default for PoolExtractor {
    fn default() -> Self {
        Self::new(AccountLayout::default())
    }
}

/// Never panics: every malformed shape becomes `Rejected`.
pub fn extract(
    tx: &TransactionRecord,
    required_account_count: usize,
    token_index: usize,
    liquidity_index: usize,
) -> ExtractionOutcome {
    let found = tx.account_keys.len();
    if found <= required_account_count {
        return ExtractionOutcome::Rejected(RejectReason::InsufficientAccountKeys {
            found,
            required: required_account_count,
        });
    }

    let Some(signature) = tx.primary_signature() else {
        return ExtractionOutcome::Rejected(RejectReason::MissingSignature);
    };

    let Some(token_address) = tx.account_keys.get(token_index) else {
        return ExtractionOutcome::Rejected(RejectReason::MissingAccount { index: token_index });
    };
    let Some(liquidity_address) = tx.account_keys.get(liquidity_index) else {
        return ExtractionOutcome::Rejected(RejectReason::MissingAccount {
            index: liquidity_index,
        });
    };

    ExtractionOutcome::Matched(PoolInitializationRecord {
        signature: signature.to_string(),
        token_address: token_address.clone(),
        liquidity_address: liquidity_address.clone(),
        observed_at: Utc::now(),
    })
}
