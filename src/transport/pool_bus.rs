use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::core::types::PoolInitializationRecord;
use crate::util::display::print_pool_initialization;

/// Receives accepted pool records. Fire-and-forget: the listener never
/// waits for or inspects delivery.
pub trait PoolEventSink {
    fn publish(&self, record: &PoolInitializationRecord);
}

impl<S: PoolEventSink + ?Sized> PoolEventSink for Arc<S> {
    fn publish(&self, record: &PoolInitializationRecord) {
        (**self).publish(record)
    }
}

impl<S: PoolEventSink + ?Sized> PoolEventSink for &S {
    fn publish(&self, record: &PoolInitializationRecord) {
        (**self).publish(record)
    }
}

/// Broadcast fan-out of pool records to any number of reporters
#[derive(Debug, Clone)]
pub struct PoolBus {
    tx: broadcast::Sender<PoolInitializationRecord>,
}

impl PoolBus {
    #[instrument]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        debug!("PoolBus initialized with capacity: {}", capacity);
        Self { tx }
    }

    #[instrument(skip(self))]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolInitializationRecord> {
        let receiver = self.tx.subscribe();
        debug!("New subscriber added to pool bus");
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PoolBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl PoolEventSink for PoolBus {
    fn publish(&self, record: &PoolInitializationRecord) {
        match self.tx.send(record.clone()) {
            Ok(subscriber_count) => debug!(
                signature = %record.signature,
                subscriber_count = subscriber_count,
                "Published pool initialization"
            ),
            Err(_) => debug!(
                signature = %record.signature,
                "No reporters subscribed; pool initialization dropped"
            ),
        }
    }
}

/// Prints every record as a terminal banner
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl PoolEventSink for ConsoleReporter {
    fn publish(&self, record: &PoolInitializationRecord) {
        print_pool_initialization(record);
    }
}

/// Drains a bus subscription into a sink until the bus closes
pub async fn forward_to(
    mut receiver: broadcast::Receiver<PoolInitializationRecord>,
    sink: impl PoolEventSink,
) {
    loop {
        match receiver.recv().await {
            Ok(record) => sink.publish(&record),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Pool reporter lagged behind the bus");
            }
            Err(broadcast::error::RecvError::Closed) => {
                info!("Pool bus closed; reporter stopping");
                return;
            }
        }
    }
}
