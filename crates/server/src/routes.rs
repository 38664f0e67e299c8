use crate::hub::PushHub;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use buildlens_protocol::{ServerInfo, DASHBOARD_ENTRY};
use buildlens_store::ReportStore;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

const ENTRY_MISSING: &str = "报告页面未生成";
const REPORT_MISSING: &str = "错误报告尚未生成";

#[derive(Clone)]
pub(crate) struct AppState {
    pub hub: Arc<PushHub>,
    pub store: ReportStore,
    pub port: u16,
}

pub(crate) fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let assets = ServeDir::new(state.store.output_dir());

    Router::new()
        .route("/", get(dashboard_entry))
        .route("/error-report.json", get(raw_report))
        .route("/server-info", get(server_info))
        .route("/ws", get(push_upgrade))
        .fallback_service(assets)
        .layer(cors)
        .with_state(state)
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Result<Response, StatusCode> {
    HttpResponse::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn dashboard_entry(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let path = state.store.output_dir().join(DASHBOARD_ENTRY);
    match tokio::fs::read(&path).await {
        Ok(bytes) => respond(StatusCode::OK, "text/html; charset=utf-8", bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            respond(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", ENTRY_MISSING)
        }
        Err(err) => {
            log::error!("Failed to read {}: {err}", path.display());
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn raw_report(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match state.store.current_bytes().await {
        Ok(Some(bytes)) => respond(StatusCode::OK, "application/json", bytes),
        Ok(None) => respond(StatusCode::NOT_FOUND, "text/plain; charset=utf-8", REPORT_MISSING),
        Err(err) => {
            log::error!("Failed to read report: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn server_info(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let bytes = serde_json::to_vec(&ServerInfo { port: state.port })
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    respond(StatusCode::OK, "application/json", bytes)
}

async fn push_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_session(socket, state.hub))
}

async fn push_session(socket: WebSocket, hub: Arc<PushHub>) {
    let (id, mut queue) = hub.attach().await;
    let (mut sender, mut receiver) = socket.split();

    let mut outbound = tokio::spawn(async move {
        while let Some(text) = queue.recv().await {
            if let Err(err) = sender.send(Message::Text(text.to_string())).await {
                log::warn!("Dashboard client {id} send failed: {err}");
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Dashboards never send anything meaningful; read only to notice the close.
    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut outbound => inbound.abort(),
        _ = &mut inbound => outbound.abort(),
    }
    hub.detach(id);
}
