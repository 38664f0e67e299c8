use crate::error::Result;
use crate::hub::PushHub;
use buildlens_protocol::{is_dashboard_asset, REPORT_FILE_NAME};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

/// Watches the output directory and broadcasts the report after it changes.
pub(crate) struct ReportWatcher {
    _watcher: std::sync::Mutex<RecommendedWatcher>,
}

impl ReportWatcher {
    pub(crate) fn spawn(
        output_dir: &Path,
        hub: Arc<PushHub>,
        debounce: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(256);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(output_dir, RecursiveMode::NonRecursive)?;
        log::debug!("Watching {} for report changes", output_dir.display());

        tokio::spawn(watch_loop(event_rx, hub, debounce, shutdown));
        Ok(Self {
            _watcher: std::sync::Mutex::new(watcher),
        })
    }
}

async fn watch_loop(
    mut events: mpsc::Receiver<notify::Result<Event>>,
    hub: Arc<PushHub>,
    debounce: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut pending = false;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                None => break,
                Some(Ok(event)) => {
                    if touches_report(&event) {
                        pending = true;
                        deadline = Instant::now() + debounce;
                    }
                }
                Some(Err(err)) => log::warn!("Watcher error: {err}"),
            },
            _ = time::sleep_until(deadline), if pending => {
                pending = false;
                match hub.broadcast_current().await {
                    Ok(delivered) => log::debug!("Report change pushed to {delivered} client(s)"),
                    Err(err) => log::warn!("Failed to broadcast changed report: {err}"),
                }
            }
        }
    }
    log::debug!("Report watcher stopped");
}

/// True when `event` writes the report file. Dashboard assets never count.
fn touches_report(event: &Event) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        !is_dashboard_asset(name) && name == REPORT_FILE_NAME
    })
}
