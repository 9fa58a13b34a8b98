//! Well-known addresses and protocol strings used by the listener

/// Public mainnet RPC WebSocket endpoint
pub const DEFAULT_WSS_ENDPOINT: &str = "wss://api.mainnet-beta.solana.com";

/// Pump.fun liquidity migrator; emits the pool initialization being watched
pub const PUMP_LIQUIDITY_MIGRATOR: &str = "39azUYFWPz3VHgKCf3VChUwbpURdCHRxjWVowf5jUJjg";

/// Log line prefix emitted by the pool initialization instruction
pub const INITIALIZE_TRIGGER_PHRASE: &str = "Program log: Instruction: InitializeAccou";

pub const JSONRPC_VERSION: &str = "2.0";
pub const LOGS_SUBSCRIBE_METHOD: &str = "logsSubscribe";
pub const LOGS_NOTIFICATION_METHOD: &str = "logsNotification";
pub const BLOCK_NOTIFICATION_METHOD: &str = "blockNotification";
pub const TRANSACTION_NOTIFICATION_METHOD: &str = "transactionNotification";

/// Only one subscription is ever active per connection
pub const SUBSCRIPTION_REQUEST_ID: u64 = 1;

/// Backoff growth factor between reconnect attempts
pub const BACKOFF_MULTIPLIER: u32 = 2;

// Account-key offsets of the migrator's initialize instruction
pub const DEFAULT_REQUIRED_ACCOUNT_COUNT: usize = 18;
pub const DEFAULT_TOKEN_INDEX: usize = 18;
pub const DEFAULT_LIQUIDITY_INDEX: usize = 2;
