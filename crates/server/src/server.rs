use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::hub::PushHub;
use crate::port::find_available_port;
use crate::routes::{router, AppState};
use crate::watcher::ReportWatcher;
use async_trait::async_trait;
use buildlens_protocol::Report;
use buildlens_store::{write_port_info, ReportPublisher, ReportStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;

pub struct LiveSyncServer;

impl LiveSyncServer {
    /// Binds the first free port in the configured range, records it in the
    /// port sidecar and starts serving in the background.
    pub async fn start(config: ServerConfig) -> Result<LiveSyncHandle> {
        tokio::fs::create_dir_all(&config.output_dir).await?;

        let candidate =
            find_available_port(&config.host, config.base_port, config.port_attempts).await?;
        let listener = TcpListener::bind((config.host.as_str(), candidate)).await?;
        let port = listener.local_addr()?.port();

        let store = ReportStore::new(&config.output_dir);
        write_port_info(store.output_dir(), Some(port)).await?;

        let hub = Arc::new(PushHub::new(store.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watcher = ReportWatcher::spawn(
            store.output_dir(),
            Arc::clone(&hub),
            config.debounce,
            shutdown_rx.clone(),
        )?;

        let app = router(AppState {
            hub: Arc::clone(&hub),
            store,
            port,
        });
        let mut stop = shutdown_rx;
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                })
                .await
        });

        log::info!("Error report server running at http://localhost:{port}");
        log::info!("Push channel: ws://localhost:{port}/ws");
        log::info!("Serving {}", config.output_dir.display());

        Ok(LiveSyncHandle {
            port,
            hub,
            shutdown_tx,
            task: TokioMutex::new(Some(task)),
            _watcher: watcher,
        })
    }
}

pub struct LiveSyncHandle {
    port: u16,
    hub: Arc<PushHub>,
    shutdown_tx: watch::Sender<bool>,
    task: TokioMutex<Option<JoinHandle<std::io::Result<()>>>>,
    _watcher: ReportWatcher,
}

impl LiveSyncHandle {
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<PushHub> {
        &self.hub
    }

    /// Disconnects every dashboard and stops accepting connections.
    pub fn shutdown(&self) {
        self.hub.close_all();
        let _ = self.shutdown_tx.send(true);
    }

    /// Resolves once the server task has exited.
    pub async fn wait(&self) -> Result<()> {
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };
        task.await
            .map_err(|err| ServerError::Task(err.to_string()))??;
        Ok(())
    }
}

#[async_trait]
impl ReportPublisher for LiveSyncHandle {
    async fn publish(&self, report: &Report) {
        self.hub.broadcast(report);
    }
}
