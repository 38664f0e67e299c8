use buildlens_protocol::{serialize_json, PushMessage, Report};
use buildlens_store::ReportStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Sent instead of a report when a client connects before one exists.
pub const REPORT_UNAVAILABLE: &str = "无法加载错误报告";

const CLIENT_QUEUE_CAPACITY: usize = 16;

pub type ClientId = u64;

/// Registry of connected dashboards.
///
/// Every client receives exactly one eager message on attach and then every
/// report whose timestamp is newer than the last one broadcast.
pub struct PushHub {
    store: ReportStore,
    next_id: AtomicU64,
    inner: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    clients: HashMap<ClientId, mpsc::Sender<Arc<str>>>,
    latest: Option<(DateTime<Utc>, Report)>,
}

impl PushHub {
    pub fn new(store: ReportStore) -> Self {
        Self {
            store,
            next_id: AtomicU64::new(0),
            inner: Mutex::new(HubState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a client. The returned queue already holds the current report
    /// (or an error message when none can be loaded).
    pub async fn attach(&self) -> (ClientId, mpsc::Receiver<Arc<str>>) {
        let on_disk = match self.store.current().await {
            Ok(report) => report,
            Err(err) => {
                log::warn!("Failed to load report for new client: {err}");
                None
            }
        };

        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state();
        let newest = match (on_disk, &state.latest) {
            (Some(disk), Some((ts, cached))) if *ts > disk.timestamp => Some(cached.clone()),
            (Some(disk), _) => Some(disk),
            (None, Some((_, cached))) => Some(cached.clone()),
            (None, None) => None,
        };
        let initial = match newest {
            Some(report) => PushMessage::report_update(report),
            None => PushMessage::Error {
                message: REPORT_UNAVAILABLE.to_string(),
            },
        };
        match serialize_json(&initial) {
            Ok(text) => {
                let _ = tx.try_send(Arc::from(text));
            }
            Err(err) => log::error!("Failed to encode initial push message: {err}"),
        }
        state.clients.insert(id, tx);
        log::info!("Dashboard client {id} connected ({} total)", state.clients.len());
        (id, rx)
    }

    pub fn detach(&self, id: ClientId) {
        let mut state = self.state();
        if state.clients.remove(&id).is_some() {
            log::info!(
                "Dashboard client {id} disconnected ({} remaining)",
                state.clients.len()
            );
        }
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state().clients.len()
    }

    /// Pushes `report` to every client unless an equal or newer report has
    /// already been broadcast. Returns the number of clients reached.
    pub fn broadcast(&self, report: &Report) -> usize {
        let text: Arc<str> = match serialize_json(&PushMessage::report_update(report.clone())) {
            Ok(text) => Arc::from(text),
            Err(err) => {
                log::error!("Failed to encode report update: {err}");
                return 0;
            }
        };

        let mut state = self.state();
        if let Some((last, _)) = &state.latest {
            if report.timestamp <= *last {
                log::debug!("Skipping broadcast of report from {}", report.timestamp);
                return 0;
            }
        }
        state.latest = Some((report.timestamp, report.clone()));

        let mut delivered = 0;
        state.clients.retain(|id, tx| match tx.try_send(Arc::clone(&text)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Dashboard client {id} is not keeping up; disconnecting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        log::debug!("Broadcast report to {delivered} client(s)");
        delivered
    }

    /// Re-reads the report from disk and broadcasts it if it is new.
    pub async fn broadcast_current(&self) -> buildlens_store::Result<usize> {
        match self.store.current().await? {
            Some(report) => Ok(self.broadcast(&report)),
            None => Ok(0),
        }
    }

    /// Disconnects every client; their sockets close once the queue drains.
    pub fn close_all(&self) {
        self.state().clients.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildlens_protocol::BuildStatus;
    use chrono::Duration;
    use tempfile::TempDir;

    fn report_at(timestamp: DateTime<Utc>) -> Report {
        Report {
            timestamp,
            build_status: BuildStatus::Success,
            errors: Default::default(),
            warnings: Default::default(),
        }
    }

    fn decode(text: &str) -> PushMessage {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn attach_without_report_sends_error_message() {
        let tmp = TempDir::new().unwrap();
        let hub = PushHub::new(ReportStore::new(tmp.path()));
        let (_, mut rx) = hub.attach().await;
        assert_eq!(
            decode(&rx.try_recv().unwrap()),
            PushMessage::Error {
                message: REPORT_UNAVAILABLE.to_string()
            }
        );
    }

    #[tokio::test]
    async fn broadcast_skips_reports_that_are_not_newer() {
        let tmp = TempDir::new().unwrap();
        let hub = PushHub::new(ReportStore::new(tmp.path()));
        let (_, mut rx) = hub.attach().await;
        let _ = rx.try_recv();

        let now = Utc::now();
        assert_eq!(hub.broadcast(&report_at(now)), 1);
        assert_eq!(hub.broadcast(&report_at(now)), 0);
        assert_eq!(hub.broadcast(&report_at(now - Duration::seconds(1))), 0);
        assert_eq!(hub.broadcast(&report_at(now + Duration::seconds(1))), 1);

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn closed_clients_are_dropped_on_broadcast() {
        let tmp = TempDir::new().unwrap();
        let hub = PushHub::new(ReportStore::new(tmp.path()));
        let (_, rx) = hub.attach().await;
        drop(rx);
        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.broadcast(&report_at(Utc::now())), 0);
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test]
    async fn late_client_gets_latest_broadcast_when_disk_is_older() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(tmp.path());
        let old = report_at(Utc::now() - Duration::seconds(10));
        store.publish(&old).await.unwrap();

        let hub = PushHub::new(store);
        let fresh = report_at(Utc::now());
        hub.broadcast(&fresh);

        let (_, mut rx) = hub.attach().await;
        match decode(&rx.try_recv().unwrap()) {
            PushMessage::ReportUpdate { data, .. } => assert_eq!(data, fresh),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
