use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::types::ProbeResult;
use crate::database::Database;

/// Event name every live subscriber receives probe results under
pub const STATUS_UPDATE_EVENT: &str = "status_update";

/// A message fanned out to live subscribers
#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    pub event: &'static str,
    pub payload: ProbeResult,
}

/// Fan-out point for completed probes.
///
/// Every result is queued for the storage collaborator and broadcast to live
/// subscribers. Neither path can block or fail the caller: storage writes run on
/// a dedicated writer task and the broadcast is best effort.
pub struct ResultSink {
    persist_tx: mpsc::Sender<ProbeResult>,
    events: broadcast::Sender<LiveEvent>,
    shutdown: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
    _stop_writer_on_drop: DropGuard,
}

impl ResultSink {
    /// Create the sink and start its persistence writer on the current runtime.
    pub fn spawn(database: Arc<dyn Database>, persist_capacity: usize, event_capacity: usize) -> Self {
        let (persist_tx, persist_rx) = mpsc::channel(persist_capacity.max(1));
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let shutdown = CancellationToken::new();

        let writer = tokio::spawn(run_writer(database, persist_rx, shutdown.clone()));

        Self {
            persist_tx,
            events,
            _stop_writer_on_drop: shutdown.clone().drop_guard(),
            shutdown,
            writer: Mutex::new(Some(writer)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Queue `result` for storage and broadcast it.
    pub fn publish(&self, result: &ProbeResult) {
        match self.persist_tx.try_send(result.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(result)) => {
                error!(url = %result.url, check_id = result.check_id, "Persistence queue full, dropping result");
            }
            Err(mpsc::error::TrySendError::Closed(result)) => {
                error!(url = %result.url, check_id = result.check_id, "Persistence writer stopped, dropping result");
            }
        }

        let receivers = self.events.receiver_count();
        if receivers == 0 {
            debug!(url = %result.url, "No live subscribers, skipping broadcast");
            return;
        }

        let event = LiveEvent { event: STATUS_UPDATE_EVENT, payload: result.clone() };
        match self.events.send(event) {
            Ok(delivered) => debug!(
                url = %result.url,
                check_id = result.check_id,
                "Broadcast status update to {} subscribers",
                delivered
            ),
            Err(e) => warn!(url = %result.url, "Failed to broadcast status update: {}", e),
        }
    }

    /// Stop the writer once everything already queued has been stored.
    pub async fn close(&self) {
        self.shutdown.cancel();
        if let Some(writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.await {
                error!("Persistence writer terminated abnormally: {}", e);
            }
        }
    }
}

async fn run_writer(
    database: Arc<dyn Database>,
    mut rx: mpsc::Receiver<ProbeResult>,
    shutdown: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            received = rx.recv() => match received {
                Some(result) => result,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };
        persist(database.as_ref(), &result).await;
    }

    rx.close();
    let mut drained = 0usize;
    while let Ok(result) = rx.try_recv() {
        persist(database.as_ref(), &result).await;
        drained += 1;
    }
    info!(drained, "Persistence writer stopped");
}

async fn persist(database: &dyn Database, result: &ProbeResult) {
    if let Err(e) = database.persist_result(result).await {
        error!(url = %result.url, check_id = result.check_id, "Failed to save result to database: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::testing::MemoryDatabase;

    #[tokio::test]
    async fn test_publish_stores_and_broadcasts() {
        let database = Arc::new(MemoryDatabase::new());
        let sink = ResultSink::spawn(database.clone(), 16, 16);
        let mut events = sink.subscribe();

        let result = ProbeResult::from_response("https://a.test/", 200, 30, 1);
        sink.publish(&result);

        let event = events.recv().await.unwrap();
        assert_eq!(event.event, "status_update");
        assert_eq!(event.payload, result);

        sink.close().await;
        assert_eq!(database.results(), vec![result]);
    }

    #[tokio::test]
    async fn test_storage_failure_is_swallowed() {
        let database = Arc::new(MemoryDatabase::new());
        database.set_failing(true);
        let sink = ResultSink::spawn(database.clone(), 16, 16);
        let mut events = sink.subscribe();

        sink.publish(&ProbeResult::unreachable("https://a.test/", 1));
        sink.publish(&ProbeResult::unreachable("https://a.test/", 2));

        assert_eq!(events.recv().await.unwrap().payload.check_id, 1);
        assert_eq!(events.recv().await.unwrap().payload.check_id, 2);

        sink.close().await;
        assert!(database.results().is_empty());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_still_persists() {
        let database = Arc::new(MemoryDatabase::new());
        let sink = ResultSink::spawn(database.clone(), 16, 16);
        assert_eq!(sink.subscriber_count(), 0);

        sink.publish(&ProbeResult::from_response("https://a.test/", 503, 12, 5));
        sink.close().await;

        assert_eq!(database.results().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_after_close_does_not_panic() {
        let database = Arc::new(MemoryDatabase::new());
        let sink = ResultSink::spawn(database.clone(), 16, 16);
        sink.close().await;

        sink.publish(&ProbeResult::from_response("https://a.test/", 200, 12, 5));
        assert!(database.results().is_empty());
    }
}
