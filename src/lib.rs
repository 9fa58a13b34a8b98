// Configuration loading
pub mod config;

// Shared types and protocol constants
pub mod core;

// Connection management, frame decoding and extraction
pub mod ingest;

// Watchlist filtering
pub mod scout;

// Delivery of accepted pool records
pub mod transport;

// Logging and terminal output
pub mod util;

// Re-export commonly used types for convenience
pub use crate::config::{AccountLayout, ConfigError, ListenerConfig, LoggingConfig};
pub use crate::core::*;
pub use crate::ingest::{ListenerExit, PoolListener, Transport, TransportEvent, WsTransport};
pub use crate::scout::Watchlist;
pub use crate::transport::{PoolBus, PoolEventSink};
