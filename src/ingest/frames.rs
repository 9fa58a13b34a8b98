/// Decoding of inbound JSON-RPC frames from the node's pubsub endpoint

use serde::Deserialize;
use serde_json::Value;

use crate::core::constants::{
    BLOCK_NOTIFICATION_METHOD, INITIALIZE_TRIGGER_PHRASE, LOGS_NOTIFICATION_METHOD,
    TRANSACTION_NOTIFICATION_METHOD,
};
use crate::core::types::TransactionRecord;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON-RPC: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{method} payload has unexpected shape: {source}")]
    Shape {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationFrame {
    SubscriptionConfirmed { request_id: u64, subscription_id: u64 },
    RpcError { request_id: Option<u64>, code: i64, message: String },
    Logs(LogsNotification),
    /// Full transactions from `blockNotification` / `transactionNotification`
    Transactions { slot: Option<u64>, transactions: Vec<TransactionRecord> },
    Other { method: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogsNotification {
    pub subscription: Option<u64>,
    pub slot: Option<u64>,
    pub signature: Option<String>,
    /// Transaction error reported by the node, `None` on success
    pub err: Option<Value>,
    pub log_lines: Vec<String>,
}

impl LogsNotification {
    /// Lines carrying the pool initialization instruction, in order
    pub fn trigger_lines(&self) -> impl Iterator<Item = &str> {
        self.log_lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.contains(INITIALIZE_TRIGGER_PHRASE))
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationParams<T> {
    result: T,
    #[serde(default)]
    subscription: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default)]
    context: Option<RpcContext>,
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcContext {
    slot: u64,
}

#[derive(Debug, Deserialize)]
struct RpcLogsValue {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    logs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RpcBlockValue {
    #[serde(default)]
    slot: Option<u64>,
    #[serde(default)]
    block: Option<RpcBlock>,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    #[serde(default)]
    transactions: Vec<RpcTransactionEnvelope>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionNotification {
    transaction: RpcTransactionEnvelope,
    #[serde(default)]
    slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionEnvelope {
    transaction: RpcTransaction,
    #[serde(default)]
    meta: Option<RpcMeta>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    signatures: Vec<String>,
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(rename = "accountKeys")]
    account_keys: Vec<AccountKey>,
}

/// `json` encoding sends bare strings, `jsonParsed` sends objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountKey {
    Plain(String),
    Parsed { pubkey: String },
}

#[derive(Debug, Deserialize)]
struct RpcMeta {
    #[serde(rename = "logMessages", default)]
    log_messages: Option<Vec<String>>,
}

impl From<RpcTransactionEnvelope> for TransactionRecord {
    fn from(envelope: RpcTransactionEnvelope) -> Self {
        TransactionRecord {
            signatures: envelope.transaction.signatures,
            account_keys: envelope
                .transaction
                .message
                .account_keys
                .into_iter()
                .map(|key| match key {
                    AccountKey::Plain(pubkey) | AccountKey::Parsed { pubkey } => pubkey,
                })
                .collect(),
            log_messages: envelope.meta.and_then(|meta| meta.log_messages),
        }
    }
}

pub fn decode_frame(bytes: &[u8]) -> Result<NotificationFrame, FrameError> {
    let raw: RawFrame = serde_json::from_slice(bytes)?;
    let request_id = raw.id.as_ref().and_then(Value::as_u64);

    if let Some(error) = raw.error {
        return Ok(NotificationFrame::RpcError {
            request_id,
            code: error.code,
            message: error.message,
        });
    }

    let Some(method) = raw.method else {
        return Ok(match (request_id, raw.result.as_ref().and_then(Value::as_u64)) {
            (Some(request_id), Some(subscription_id)) => NotificationFrame::SubscriptionConfirmed {
                request_id,
                subscription_id,
            },
            _ => NotificationFrame::Other { method: None },
        });
    };

    let params = raw.params.unwrap_or(Value::Null);
    match method.as_str() {
        LOGS_NOTIFICATION_METHOD => {
            let params: NotificationParams<RpcResponse<RpcLogsValue>> =
                parse_params(&method, params)?;
            let value = params.result.value;
            Ok(NotificationFrame::Logs(LogsNotification {
                subscription: params.subscription,
                slot: params.result.context.map(|c| c.slot),
                signature: value.signature,
                err: value.err.filter(|err| !err.is_null()),
                log_lines: value.logs.unwrap_or_default(),
            }))
        }
        BLOCK_NOTIFICATION_METHOD => {
            let params: NotificationParams<RpcResponse<RpcBlockValue>> =
                parse_params(&method, params)?;
            let value = params.result.value;
            let slot = value.slot.or(params.result.context.map(|c| c.slot));
            let transactions = value
                .block
                .map(|block| block.transactions.into_iter().map(Into::into).collect())
                .unwrap_or_default();
            Ok(NotificationFrame::Transactions { slot, transactions })
        }
        TRANSACTION_NOTIFICATION_METHOD => {
            let params: NotificationParams<RpcTransactionNotification> =
                parse_params(&method, params)?;
            Ok(NotificationFrame::Transactions {
                slot: params.result.slot,
                transactions: vec![params.result.transaction.into()],
            })
        }
        _ => Ok(NotificationFrame::Other {
            method: Some(method),
        }),
    }
}

fn parse_params<T>(method: &str, params: Value) -> Result<T, FrameError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(params).map_err(|source| FrameError::Shape {
        method: method.to_string(),
        source,
    })
}
