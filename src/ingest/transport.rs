use url::Url;

/// Discrete events the streaming transport reports for the current
/// connection, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(Vec<u8>),
    Closed(Option<String>),
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no connection has been opened")]
    NotConnected,

    #[error("connection task has stopped")]
    ChannelClosed,
}

/// Streaming connection owned by the listener.
///
/// `connect` starts an attempt whose outcome is reported through
/// `next_event` as `Opened` or `Failed`. Starting a new attempt supersedes
/// the previous connection; its late events are never reported.
#[allow(async_fn_in_trait)]
pub trait Transport {
    fn connect(&mut self, url: &Url);

    fn send(&mut self, text: String) -> Result<(), TransportError>;

    fn close(&mut self);

    /// `None` once the transport can produce no further events
    async fn next_event(&mut self) -> Option<TransportEvent>;
}
