use serde::Serialize;

use crate::core::constants::{JSONRPC_VERSION, LOGS_SUBSCRIBE_METHOD, SUBSCRIPTION_REQUEST_ID};

/// JSON-RPC `logsSubscribe` request sent once per opened connection.
///
/// Serializes as
/// `{"jsonrpc":"2.0","id":1,"method":"logsSubscribe","params":["all",{"mentions":[..]}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: (LogsFilter, MentionsFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogsFilter {
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionsFilter {
    pub mentions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
}

impl SubscriptionRequest {
    pub fn mentioned_program(&self) -> Option<&str> {
        self.params.1.mentions.first().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn build_request(program_address: &str) -> SubscriptionRequest {
    build_request_with_commitment(program_address, None)
}

pub fn build_request_with_commitment(
    program_address: &str,
    commitment: Option<&str>,
) -> SubscriptionRequest {
    SubscriptionRequest {
        jsonrpc: JSONRPC_VERSION,
        id: SUBSCRIPTION_REQUEST_ID,
        method: LOGS_SUBSCRIBE_METHOD,
        params: (
            LogsFilter::All,
            MentionsFilter {
                mentions: vec![program_address.to_string()],
                commitment: commitment.map(str::to_string),
            },
        ),
    }
}
