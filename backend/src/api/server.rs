//! HTTP server for the VOC dry-run API.
//!
//! Code tables and the directory are loaded once at startup and shared by
//! every request. Nothing is ever submitted from here.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/validate`   | Upload a VOC CSV, get records + exclusions |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Multipart, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::ValidateResponse;
use crate::error::{PipelineError, ServerError};
use crate::parser::parse_bytes_auto;
use crate::transform::pipeline::{batch_from_parsed, PipelineContext};

type AppState = Arc<PipelineContext>;

/// Routes, without binding a socket.
pub fn router(context: PipelineContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/validate", post(validate_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(Arc::new(context))
}

/// Start the HTTP server
pub async fn start_server(port: u16, context: PipelineContext) -> Result<(), ServerError> {
    let app = router(context);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 vocload server running on http://localhost:{}", port);
    println!("   POST /api/validate - Validate a VOC CSV (dry run)");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Pipeline(PipelineError::Io(e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(())
}

async fn health(State(context): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "vocload",
        "version": env!("CARGO_PKG_VERSION"),
        "directorySize": context.directory.len(),
        "codeTables": {
            "vocType": context.tables.voc_type.len(),
            "receiptType": context.tables.receipt_type.len(),
            "service": context.tables.service.len()
        },
        "endpoints": {
            "validate": "POST /api/validate",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn validate_csv(
    State(context): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ValidateResponse>, ServerError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW UPLOAD: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    );
    println!("{}\n", "=".repeat(70));

    let parsed = parse_bytes_auto(&bytes).map_err(PipelineError::from)?;
    let batch = batch_from_parsed(&parsed);
    let prepared = context.prepare(batch);
    prepared.log_excluded();

    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Input rows:     {}", prepared.input_count);
    println!("   Mapped records: {}", prepared.records.len());
    println!("   Excluded rows:  {}", prepared.excluded.len());
    println!("{}\n", "=".repeat(70));

    Ok(Json(ValidateResponse::new(&parsed, prepared)))
}
