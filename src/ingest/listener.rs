use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::backoff::ReconnectPolicy;
use super::extractor::PoolExtractor;
use super::frames::{decode_frame, LogsNotification, NotificationFrame};
use super::session::build_request_with_commitment;
use super::transport::{Transport, TransportEvent};
use crate::config::{ConfigError, ListenerConfig};
use crate::core::constants::INITIALIZE_TRIGGER_PHRASE;
use crate::core::types::{ExtractionOutcome, PoolInitializationRecord, TransactionRecord};
use crate::scout::Watchlist;
use crate::transport::PoolEventSink;

/// Far-future fallback when a backoff delay cannot be represented
const UNREACHABLE_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Closing,
}

/// Why `PoolListener::run` returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// Reconnect budget spent; needs an external restart
    Exhausted { attempts: u32 },
    /// Closed on request through `shutdown`
    Stopped,
    /// The transport can produce no further events
    TransportEnded,
}

/// The single outstanding reconnect, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconnect {
    pub attempt: u32,
    pub delay: Duration,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub connections_opened: u64,
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub relevant_logs: u64,
    pub pools_emitted: u64,
    pub pools_skipped: u64,
    pub extraction_rejects: u64,
    pub rpc_errors: u64,
}

/// Owns the streaming connection and drives subscribe, dispatch and
/// reconnect-with-backoff.
///
/// All transitions happen on the task that polls `run`, so the state and
/// reconnect counter need no locking. At most one reconnect is pending at a
/// time; close or failure events that arrive while one is pending are
/// ignored.
pub struct PoolListener<T, S> {
    endpoint: Url,
    program_address: String,
    commitment: Option<String>,
    extractor: PoolExtractor,
    watchlist: Watchlist,
    transport: T,
    sink: S,
    state: ConnectionState,
    reconnect: ReconnectPolicy,
    pending_reconnect: Option<PendingReconnect>,
    halted: bool,
    transport_drained: bool,
    subscription_id: Option<u64>,
    stats: ListenerStats,
}

impl<T, S> std::fmt::Debug for PoolListener<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolListener")
            .field("endpoint", &self.endpoint.as_str())
            .field("program_address", &self.program_address)
            .field("state", &self.state)
            .field("reconnect_attempts", &self.reconnect.attempts())
            .finish_non_exhaustive()
    }
}

impl<T: Transport, S: PoolEventSink> PoolListener<T, S> {
    pub fn new(config: &ListenerConfig, transport: T, sink: S) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: config.endpoint_url()?,
            program_address: config.program_address.clone(),
            commitment: config.commitment.clone(),
            extractor: PoolExtractor::new(config.layout),
            watchlist: Watchlist::new(config.token_watchlist.iter().cloned()),
            transport,
            sink,
            state: ConnectionState::Disconnected,
            reconnect: ReconnectPolicy::new(
                config.max_reconnect_attempts,
                config.reconnect_delay(),
            ),
            pending_reconnect: None,
            halted: false,
            transport_drained: false,
            subscription_id: None,
            stats: ListenerStats::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    pub fn pending_reconnect(&self) -> Option<PendingReconnect> {
        self.pending_reconnect
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn subscription_id(&self) -> Option<u64> {
        self.subscription_id
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Opens the connection. Also serves as the external restart after the
    /// reconnect budget was exhausted.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub fn start(&mut self) {
        if self.state != ConnectionState::Disconnected {
            warn!(state = ?self.state, "Listener already started");
            return;
        }
        info!("Starting pool initialization listener...");
        if self.halted {
            self.reconnect.reset();
            self.halted = false;
        }
        self.pending_reconnect = None;
        self.state = ConnectionState::Connecting;
        self.open_transport();
    }

    /// Cancels any pending reconnect and closes the connection without
    /// scheduling another attempt
    pub fn shutdown(&mut self) {
        let cancelled = self.cancel_reconnect();
        match self.state {
            ConnectionState::Connecting | ConnectionState::Subscribed if !cancelled => {
                info!("Closing WebSocket connection");
                self.state = ConnectionState::Closing;
                self.transport.close();
            }
            _ => self.state = ConnectionState::Disconnected,
        }
    }

    /// Drops the pending reconnect timer. Returns whether one existed.
    pub fn cancel_reconnect(&mut self) -> bool {
        self.pending_reconnect.take().is_some()
    }

    /// Drives the listener until it halts, is stopped, or the transport ends.
    pub async fn run(&mut self) -> ListenerExit {
        if self.state == ConnectionState::Disconnected && !self.halted {
            self.start();
        }

        loop {
            if self.halted {
                return ListenerExit::Exhausted {
                    attempts: self.reconnect.attempts(),
                };
            }
            if self.state == ConnectionState::Disconnected && self.pending_reconnect.is_none() {
                return ListenerExit::Stopped;
            }
            if self.transport_drained && self.pending_reconnect.is_none() {
                return ListenerExit::TransportEnded;
            }

            let deadline = self.pending_reconnect.map(|pending| pending.deadline);
            let poll_transport = !self.transport_drained;

            tokio::select! {
                event = self.transport.next_event(), if poll_transport => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Transport has no further events");
                        self.transport_drained = true;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_reconnect();
                }
            }
        }
    }

    /// Applies one transport event to the state machine
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Message(bytes) => self.on_message(&bytes),
            TransportEvent::Closed(reason) => {
                if self.accepts_disconnect() {
                    info!(reason = ?reason, "WebSocket connection closed");
                }
                self.on_disconnect();
            }
            TransportEvent::Failed(reason) => {
                if self.accepts_disconnect() {
                    warn!("WebSocket error: {}", reason);
                }
                self.on_disconnect();
            }
        }
    }

    fn open_transport(&mut self) {
        self.transport_drained = false;
        self.subscription_id = None;
        self.transport.connect(&self.endpoint);
    }

    fn fire_reconnect(&mut self) {
        let Some(pending) = self.pending_reconnect.take() else {
            return;
        };
        info!(
            attempt = pending.attempt,
            max_attempts = self.reconnect.max_attempts(),
            "Reconnecting to {}",
            self.endpoint
        );
        self.state = ConnectionState::Connecting;
        self.open_transport();
    }

    fn on_opened(&mut self) {
        if self.state != ConnectionState::Connecting || self.pending_reconnect.is_some() {
            warn!(state = ?self.state, "Ignoring unexpected open event");
            return;
        }

        info!("WebSocket connection established");
        self.reconnect.reset();
        self.stats.connections_opened += 1;

        let request =
            build_request_with_commitment(&self.program_address, self.commitment.as_deref());
        let sent = request
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|payload| self.transport.send(payload).map_err(|e| e.to_string()));

        match sent {
            Ok(()) => {
                self.state = ConnectionState::Subscribed;
                info!(program = %self.program_address, "Sent logsSubscribe request");
            }
            Err(e) => {
                warn!(error = %e, "Failed to send subscription request");
                self.transport.close();
                self.on_disconnect();
            }
        }
    }

    fn on_message(&mut self, bytes: &[u8]) {
        if self.state != ConnectionState::Subscribed {
            debug!(state = ?self.state, "Dropping frame received outside an active subscription");
            return;
        }
        self.stats.frames_received += 1;

        match decode_frame(bytes) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => {
                self.stats.frames_dropped += 1;
                error!(error = %e, "Error processing message");
            }
        }
    }

    fn dispatch(&mut self, frame: NotificationFrame) {
        match frame {
            NotificationFrame::SubscriptionConfirmed {
                request_id,
                subscription_id,
            } => {
                info!(request_id, subscription_id, "Subscription confirmed");
                self.subscription_id = Some(subscription_id);
            }
            NotificationFrame::RpcError {
                request_id,
                code,
                message,
            } => {
                self.stats.rpc_errors += 1;
                error!(request_id = ?request_id, code, "JSON-RPC error: {}", message);
            }
            NotificationFrame::Logs(notification) => {
                self.scan_logs(&notification);
            }
            NotificationFrame::Transactions { slot, transactions } => {
                debug!(slot = ?slot, count = transactions.len(), "Transactions received");
                for tx in &transactions {
                    self.process_transaction(tx);
                }
            }
            NotificationFrame::Other { method } => {
                debug!(method = ?method, "Ignoring notification");
            }
        }
    }

    /// Logs each line carrying the initialize instruction once. Returns the
    /// number of such lines.
    pub fn scan_logs(&mut self, notification: &LogsNotification) -> usize {
        for line in &notification.log_lines {
            debug!(signature = ?notification.signature, "log: {}", line);
        }
        if let Some(err) = &notification.err {
            debug!(signature = ?notification.signature, err = %err, "Logged transaction failed on chain");
        }

        let mut found = 0;
        for line in notification.trigger_lines() {
            info!(signature = ?notification.signature, "Relevant log found: {}", line);
            found += 1;
        }
        self.stats.relevant_logs += found as u64;
        found
    }

    /// Extracts, filters and publishes one transaction. Returns the record
    /// handed to the sink, if any.
    pub fn process_transaction(&mut self, tx: &TransactionRecord) -> Option<PoolInitializationRecord> {
        debug!(
            signature = ?tx.primary_signature(),
            account_keys = tx.account_keys.len(),
            carries_trigger = tx.mentions_log(INITIALIZE_TRIGGER_PHRASE),
            "Processing transaction"
        );
        let record = match self.extractor.extract(tx) {
            ExtractionOutcome::Matched(record) => record,
            ExtractionOutcome::Rejected(reason) => {
                self.stats.extraction_rejects += 1;
                debug!(
                    signature = ?tx.primary_signature(),
                    "Not a pool initialization: {}",
                    reason
                );
                return None;
            }
        };

        if !self.watchlist.is_watched(&record.token_address) {
            self.stats.pools_skipped += 1;
            info!("Skipping non-watched token: {}", record.token_address);
            return None;
        }

        info!(
            signature = %record.signature,
            token_address = %record.token_address,
            liquidity_address = %record.liquidity_address,
            "New pool initialization detected"
        );
        self.stats.pools_emitted += 1;
        self.sink.publish(&record);
        Some(record)
    }

    fn accepts_disconnect(&self) -> bool {
        match self.state {
            ConnectionState::Connecting => self.pending_reconnect.is_none(),
            ConnectionState::Subscribed => true,
            ConnectionState::Closing | ConnectionState::Disconnected => false,
        }
    }

    fn on_disconnect(&mut self) {
        match self.state {
            ConnectionState::Closing => {
                debug!("Requested close completed");
                self.state = ConnectionState::Disconnected;
                return;
            }
            ConnectionState::Disconnected => {
                debug!("Ignoring disconnect while disconnected");
                return;
            }
            ConnectionState::Connecting if self.pending_reconnect.is_some() => {
                debug!("Reconnect already scheduled; ignoring disconnect");
                return;
            }
            ConnectionState::Connecting | ConnectionState::Subscribed => {}
        }

        self.subscription_id = None;
        self.state = ConnectionState::Disconnected;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        match self.reconnect.next_delay() {
            Some((attempt, delay)) => {
                let now = Instant::now();
                let deadline = now
                    .checked_add(delay)
                    .unwrap_or_else(|| now + UNREACHABLE_DELAY);
                // Replaces, never stacks
                self.pending_reconnect = Some(PendingReconnect {
                    attempt,
                    delay,
                    deadline,
                });
                self.state = ConnectionState::Connecting;
                info!(
                    attempt,
                    max_attempts = self.reconnect.max_attempts(),
                    "Attempting to reconnect in {} seconds...",
                    delay.as_secs_f64()
                );
            }
            None => {
                self.halted = true;
                self.pending_reconnect = None;
                self.state = ConnectionState::Disconnected;
                error!(
                    attempts = self.reconnect.attempts(),
                    "Max reconnection attempts reached. Stopping reconnection."
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::transport::TransportError;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    const MIGRATOR: &str = "39azUYFWPz3VHgKCf3VChUwbpURdCHRxjWVowf5jUJjg";
    const WATCHED: &str = "2qEHjDLDLbuBgRYvsxhc5D6uDWAivNFZGan56P1tpump";

    #[derive(Default)]
    struct RecordingTransport {
        connects: usize,
        closes: usize,
        sent: Vec<String>,
        fail_sends: bool,
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self, _url: &Url) {
            self.connects += 1;
        }

        fn send(&mut self, text: String) -> Result<(), TransportError> {
            if self.fail_sends {
                return Err(TransportError::ChannelClosed);
            }
            self.sent.push(text);
            Ok(())
        }

        fn close(&mut self) {
            self.closes += 1;
        }

        async fn next_event(&mut self) -> Option<TransportEvent> {
            None
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink(Rc<RefCell<Vec<PoolInitializationRecord>>>);

    impl PoolEventSink for RecordingSink {
        fn publish(&self, record: &PoolInitializationRecord) {
            self.0.borrow_mut().push(record.clone());
        }
    }

    /// Formatted log output of everything run under `capture_logs`
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_containing(&self, needle: &str) -> usize {
            let output = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
            output.lines().filter(|line| line.contains(needle)).count()
        }
    }

    fn capture_logs(run: impl FnOnce()) -> CapturedLogs {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, run);
        logs
    }

    fn config(watchlist: &[&str]) -> ListenerConfig {
        ListenerConfig {
            program_address: MIGRATOR.to_string(),
            token_watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
            ..ListenerConfig::default()
        }
    }

    fn listener(
        watchlist: &[&str],
    ) -> (PoolListener<RecordingTransport, RecordingSink>, RecordingSink) {
        let sink = RecordingSink::default();
        let listener =
            PoolListener::new(&config(watchlist), RecordingTransport::default(), sink.clone())
                .unwrap();
        (listener, sink)
    }

    fn subscribed(watchlist: &[&str]) -> (PoolListener<RecordingTransport, RecordingSink>, RecordingSink) {
        let (mut listener, sink) = listener(watchlist);
        listener.start();
        listener.handle_event(TransportEvent::Opened);
        (listener, sink)
    }

    fn pool_transaction_frame() -> Vec<u8> {
        let mut keys: Vec<String> = (0..20).map(|i| format!("Key{}", i)).collect();
        keys[18] = WATCHED.to_string();
        keys[2] = "LiqAddrXYZ".to_string();
        serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": "transactionNotification",
            "params": {
                "subscription": 7,
                "result": {
                    "transaction": {
                        "transaction": {"signatures": ["sigInit"], "message": {"accountKeys": keys}},
                        "meta": {"logMessages": ["Program log: Instruction: InitializeAccount3"]}
                    },
                    "slot": 42
                }
            }
        }))
        .unwrap()
    }

    fn logs_frame(lines: &[&str]) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": "logsNotification",
            "params": {
                "result": {"context": {"slot": 1}, "value": {"signature": "sigLogs", "err": null, "logs": lines}},
                "subscription": 7
            }
        }))
        .unwrap()
    }

    #[test]
    fn open_sends_subscription_once_and_resets_counter() {
        let (mut listener, _) = listener(&[]);
        listener.start();
        assert_eq!(listener.state(), ConnectionState::Connecting);
        assert_eq!(listener.transport().connects, 1);

        listener.handle_event(TransportEvent::Failed("refused".into()));
        assert_eq!(listener.reconnect_attempts(), 1);
        listener.fire_reconnect();
        listener.handle_event(TransportEvent::Opened);

        assert_eq!(listener.state(), ConnectionState::Subscribed);
        assert_eq!(listener.reconnect_attempts(), 0);
        assert_eq!(listener.transport().sent.len(), 1);

        let sent: Value = serde_json::from_str(&listener.transport().sent[0]).unwrap();
        assert_eq!(sent["method"], "logsSubscribe");
        assert_eq!(sent["params"], json!(["all", {"mentions": [MIGRATOR]}]));
    }

    #[test]
    fn watched_pool_is_published() {
        let (mut listener, sink) = subscribed(&[WATCHED]);
        listener.handle_event(TransportEvent::Message(pool_transaction_frame()));

        let published = sink.0.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].signature, "sigInit");
        assert_eq!(published[0].token_address, WATCHED);
        assert_eq!(published[0].liquidity_address, "LiqAddrXYZ");
        assert_eq!(listener.stats().pools_emitted, 1);
    }

    #[test]
    fn unwatched_pool_is_skipped() {
        let (mut listener, sink) = subscribed(&["someOtherToken"]);
        listener.handle_event(TransportEvent::Message(pool_transaction_frame()));

        assert!(sink.0.borrow().is_empty());
        assert_eq!(listener.stats().pools_skipped, 1);
        assert_eq!(listener.stats().pools_emitted, 0);
    }

    #[test]
    fn relevant_lines_counted_exactly() {
        let (mut listener, _) = subscribed(&[]);
        let lines = [
            "Program 39azUYFWPz3VHgKCf3VChUwbpURdCHRxjWVowf5jUJjg invoke [1]",
            "Program log: Instruction: InitializeAccount3",
            "Program log: Instruction: Transfer",
            "Program log: Instruction: InitializeAccount",
            "Program log: Instruction: InitializeAccou",
        ];
        listener.handle_event(TransportEvent::Message(logs_frame(&lines)));
        assert_eq!(listener.stats().relevant_logs, 3);

        listener.handle_event(TransportEvent::Message(logs_frame(&["Program log: nothing"])));
        assert_eq!(listener.stats().relevant_logs, 3);
    }

    #[test]
    fn malformed_frame_is_dropped_and_connection_stays_up() {
        let (mut listener, _) = subscribed(&[]);
        listener.handle_event(TransportEvent::Message(b"{not json".to_vec()));
        listener.handle_event(TransportEvent::Message(br#"{"method":"logsNotification"}"#.to_vec()));

        assert_eq!(listener.state(), ConnectionState::Subscribed);
        assert_eq!(listener.stats().frames_dropped, 2);
        assert_eq!(listener.transport().closes, 0);
        assert!(listener.pending_reconnect().is_none());
    }

    #[test]
    fn confirmation_records_subscription_id() {
        let (mut listener, _) = subscribed(&[]);
        listener.handle_event(TransportEvent::Message(br#"{"jsonrpc":"2.0","result":23784,"id":1}"#.to_vec()));
        assert_eq!(listener.subscription_id(), Some(23784));

        listener.handle_event(TransportEvent::Closed(None));
        assert_eq!(listener.subscription_id(), None);
    }

    #[test]
    fn backoff_schedule_then_halt() {
        let (mut listener, _) = listener(&[]);
        listener.start();

        let mut delays = Vec::new();
        loop {
            listener.handle_event(TransportEvent::Failed("connection refused".into()));
            match listener.pending_reconnect() {
                Some(pending) => {
                    delays.push(pending.delay.as_millis() as u64);
                    listener.fire_reconnect();
                }
                None => break,
            }
        }

        assert_eq!(delays, vec![5000, 10000, 20000, 40000, 80000]);
        assert!(listener.is_halted());
        assert_eq!(listener.state(), ConnectionState::Disconnected);
        assert_eq!(listener.reconnect_attempts(), 5);
        // Initial connect plus five reconnects
        assert_eq!(listener.transport().connects, 6);

        // Late events change nothing once halted
        listener.handle_event(TransportEvent::Closed(None));
        assert!(listener.pending_reconnect().is_none());
        assert_eq!(listener.transport().connects, 6);
    }

    #[test]
    fn duplicate_disconnects_schedule_one_reconnect() {
        let (mut listener, _) = subscribed(&[]);
        listener.handle_event(TransportEvent::Failed("reset by peer".into()));
        let first = listener.pending_reconnect().unwrap();

        listener.handle_event(TransportEvent::Closed(Some("reset".into())));
        listener.handle_event(TransportEvent::Failed("again".into()));

        assert_eq!(listener.pending_reconnect(), Some(first));
        assert_eq!(listener.reconnect_attempts(), 1);
        assert_eq!(listener.state(), ConnectionState::Connecting);
    }

    #[test]
    fn shutdown_cancels_pending_reconnect() {
        let (mut listener, _) = subscribed(&[]);
        listener.handle_event(TransportEvent::Closed(None));
        assert!(listener.pending_reconnect().is_some());

        listener.shutdown();
        assert!(listener.pending_reconnect().is_none());
        assert_eq!(listener.state(), ConnectionState::Disconnected);
        assert_eq!(listener.transport().connects, 1);
    }

    #[test]
    fn shutdown_of_live_connection_does_not_reconnect() {
        let (mut listener, _) = subscribed(&[]);
        listener.shutdown();
        assert_eq!(listener.state(), ConnectionState::Closing);
        assert_eq!(listener.transport().closes, 1);

        listener.handle_event(TransportEvent::Closed(Some("closed by listener".into())));
        assert_eq!(listener.state(), ConnectionState::Disconnected);
        assert!(listener.pending_reconnect().is_none());
        assert_eq!(listener.reconnect_attempts(), 0);
    }

    #[test]
    fn failed_subscription_send_schedules_reconnect() {
        let sink = RecordingSink::default();
        let transport = RecordingTransport {
            fail_sends: true,
            ..RecordingTransport::default()
        };
        let mut listener = PoolListener::new(&config(&[]), transport, sink).unwrap();
        listener.start();
        listener.handle_event(TransportEvent::Opened);

        assert_eq!(listener.transport().closes, 1);
        assert_eq!(listener.state(), ConnectionState::Connecting);
        assert_eq!(listener.pending_reconnect().map(|p| p.attempt), Some(1));
    }

    #[test]
    fn skipped_token_is_logged_once() {
        let logs = capture_logs(|| {
            let (mut listener, _) = subscribed(&["someOtherToken"]);
            listener.handle_event(TransportEvent::Message(pool_transaction_frame()));
        });

        let skip_line = format!("Skipping non-watched token: {}", WATCHED);
        assert_eq!(logs.lines_containing(&skip_line), 1);
        assert_eq!(logs.lines_containing("New pool initialization detected"), 0);
    }

    #[test]
    fn relevant_log_found_once_per_matching_line() {
        let logs = capture_logs(|| {
            let (mut listener, _) = subscribed(&[]);
            let lines = [
                "Program log: Instruction: InitializeAccount3",
                "Program log: Instruction: Transfer",
                "Program log: Instruction: InitializeAccount",
                "Program log: Instruction: InitializeAccou",
                "Program 39azUYFWPz3VHgKCf3VChUwbpURdCHRxjWVowf5jUJjg success",
            ];
            listener.handle_event(TransportEvent::Message(logs_frame(&lines)));
        });

        assert_eq!(logs.lines_containing("Relevant log found"), 3);
        assert_eq!(
            logs.lines_containing("Relevant log found: Program log: Instruction: InitializeAccount3"),
            1
        );
    }

    #[test]
    fn failed_subscription_send_logs_a_warning_only() {
        let logs = capture_logs(|| {
            let transport = RecordingTransport {
                fail_sends: true,
                ..RecordingTransport::default()
            };
            let mut listener =
                PoolListener::new(&config(&[]), transport, RecordingSink::default()).unwrap();
            listener.start();
            listener.handle_event(TransportEvent::Opened);
            assert!(!listener.is_halted());
        });

        assert_eq!(logs.lines_containing("Failed to send subscription request"), 1);
        assert_eq!(logs.lines_containing("ERROR"), 0);
    }

    #[test]
    fn only_exhaustion_is_logged_as_error() {
        let logs = capture_logs(|| {
            let (mut listener, _) = listener(&[]);
            listener.start();
            while !listener.is_halted() {
                listener.handle_event(TransportEvent::Failed("connection reset".into()));
                listener.fire_reconnect();
            }
        });

        assert_eq!(logs.lines_containing("ERROR"), 1);
        assert_eq!(logs.lines_containing("Max reconnection attempts reached"), 1);
        assert_eq!(logs.lines_containing("WebSocket error: connection reset"), 6);
    }

    #[test]
    fn start_twice_opens_one_connection() {
        let (mut listener, _) = listener(&[]);
        listener.start();
        listener.start();
        assert_eq!(listener.transport().connects, 1);
    }

    #[test]
    fn frames_before_open_are_ignored() {
        let (mut listener, sink) = listener(&[]);
        listener.start();
        listener.handle_event(TransportEvent::Message(pool_transaction_frame()));
        assert!(sink.0.borrow().is_empty());
        assert_eq!(listener.stats().frames_received, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_fires_pending_reconnect_before_ending() {
        let (mut listener, _) = listener(&[]);
        listener.start();
        listener.handle_event(TransportEvent::Failed("refused".into()));

        let exit = listener.run().await;
        assert_eq!(exit, ListenerExit::TransportEnded);
        assert_eq!(listener.transport().connects, 2);
        assert!(listener.pending_reconnect().is_none());
    }

    #[test]
    fn restart_after_exhaustion_grants_fresh_budget() {
        let (mut listener, _) = listener(&[]);
        listener.start();
        while !listener.is_halted() {
            listener.handle_event(TransportEvent::Failed("refused".into()));
            listener.fire_reconnect();
        }

        listener.start();
        assert!(!listener.is_halted());
        assert_eq!(listener.reconnect_attempts(), 0);
        assert_eq!(listener.state(), ConnectionState::Connecting);
        assert_eq!(listener.transport().connects, 7);
    }
}
