use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::transport::{Transport, TransportError, TransportEvent};

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// WebSocket transport for the node's pubsub endpoint.
///
/// Every `connect` spawns one connection task that owns the socket; events
/// are tagged with the task's generation so that a superseded connection
/// can never leak events into the current one.
pub struct WsTransport {
    connect_timeout: Duration,
    heartbeat_interval: Duration,
    generation: u64,
    event_sender: mpsc::UnboundedSender<(u64, TransportEvent)>,
    event_receiver: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
    /// Outgoing queue of the current connection
    message_sender: Option<mpsc::UnboundedSender<Message>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("connect_timeout", &self.connect_timeout)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    pub fn new(connect_timeout: Duration, heartbeat_interval: Duration) -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        Self {
            connect_timeout,
            heartbeat_interval: heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL),
            generation: 0,
            event_sender,
            event_receiver,
            message_sender: None,
            task: None,
        }
    }

    fn abort_current(&mut self) {
        self.message_sender = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, url: &Url) {
        self.abort_current();
        self.generation += 1;

        let (tx, rx) = mpsc::unbounded_channel::<Message>();
        self.message_sender = Some(tx);
        self.task = Some(tokio::spawn(run_connection(
            self.generation,
            url.clone(),
            self.connect_timeout,
            self.heartbeat_interval,
            rx,
            self.event_sender.clone(),
        )));
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        let sender = self
            .message_sender
            .as_ref()
            .ok_or(TransportError::NotConnected)?;
        sender
            .send(Message::Text(text))
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn close(&mut self) {
        // Dropping the queue makes the task send a close frame and exit
        self.message_sender = None;
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            let (generation, event) = self.event_receiver.recv().await?;
            if generation == self.generation {
                return Some(event);
            }
            debug!(
                generation,
                current = self.generation,
                "Dropping event from superseded connection"
            );
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.abort_current();
    }
}

#[instrument(skip(outgoing, events))]
async fn run_connection(
    generation: u64,
    url: Url,
    connect_timeout: Duration,
    heartbeat_interval: Duration,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<(u64, TransportEvent)>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send((generation, event));
    };

    info!("Connecting to {}", url);
    let ws_stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws_stream, response))) => {
            info!("Connected to {} (HTTP {})", url, response.status());
            ws_stream
        }
        Ok(Err(e)) => {
            emit(TransportEvent::Failed(format!("failed to connect: {}", e)));
            return;
        }
        Err(_) => {
            emit(TransportEvent::Failed(format!(
                "connection timed out after {:?}",
                connect_timeout
            )));
            return;
        }
    };

    emit(TransportEvent::Opened);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    // First tick completes immediately
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = ws_receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => emit(TransportEvent::Message(text.into_bytes())),
                Some(Ok(Message::Binary(data))) => emit(TransportEvent::Message(data)),
                Some(Ok(Message::Close(close_frame))) => {
                    debug!("Close frame received: {:?}", close_frame);
                    emit(TransportEvent::Closed(
                        close_frame.map(|frame| frame.reason.into_owned()),
                    ));
                    return;
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive error");
                    emit(TransportEvent::Failed(format!("receive error: {}", e)));
                    return;
                }
                None => {
                    emit(TransportEvent::Closed(None));
                    return;
                }
            },
            message = outgoing.recv() => match message {
                Some(message) => {
                    if let Err(e) = ws_sender.send(message).await {
                        warn!(error = %e, "Failed to send WebSocket message");
                        emit(TransportEvent::Failed(format!("send error: {}", e)));
                        return;
                    }
                }
                None => {
                    if let Err(e) = ws_sender.close().await {
                        warn!(error = %e, "Failed to close WebSocket cleanly");
                    }
                    emit(TransportEvent::Closed(Some("closed by listener".to_string())));
                    return;
                }
            },
            _ = heartbeat.tick() => {
                if let Err(e) = ws_sender.send(Message::Ping(Vec::new())).await {
                    emit(TransportEvent::Failed(format!("heartbeat failed: {}", e)));
                    return;
                }
            }
        }
    }
}
