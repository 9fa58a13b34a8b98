pub mod backoff;
pub mod extractor;
pub mod frames;
pub mod listener;
pub mod session;
pub mod transport;
pub mod websocket;

pub use backoff::ReconnectPolicy;
pub use extractor::PoolExtractor;
pub use frames::{decode_frame, FrameError, LogsNotification, NotificationFrame};
pub use listener::{ConnectionState, ListenerExit, ListenerStats, PendingReconnect, PoolListener};
pub use session::{build_request, SubscriptionRequest};
pub use transport::{Transport, TransportError, TransportEvent};
pub use websocket::WsTransport;
