//! HTTP server for the DropVault API.
//!
//! # API Endpoints
//!
//! | Method | Path                         | Description                     |
//! |--------|------------------------------|---------------------------------|
//! | GET    | `/health`                    | Health check                    |
//! | GET    | `/api/queue`                 | Queue snapshot                  |
//! | POST   | `/api/queue`                 | Enqueue multipart `file` fields |
//! | DELETE | `/api/queue/{id}`            | Remove an entry                 |
//! | POST   | `/api/queue/upload`          | Start uploading in background   |
//! | POST   | `/api/queue/cancel`          | Cancel the running batch        |
//! | POST   | `/api/queue/clear-completed` | Drop completed entries          |
//! | GET    | `/api/queue/events`          | SSE stream of queue snapshots   |
//! | GET    | `/api/notifications`         | SSE stream of notices           |
//! | GET    | `/api/files?page=&limit=`    | File listing page               |
//! | GET    | `/api/files/{id}`            | One file record                 |
//! | DELETE | `/api/files/{id}`            | Delete a file record            |
//! | GET    | `/api/storage`               | Storage usage                   |

use std::{convert::Infallible, net::SocketAddr, path::PathBuf, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        Json, Sse,
    },
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use futures::stream::Stream;
use serde_json::{json, Value};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt as _;
use tower_http::{cors::CorsLayer, services::ServeDir};

use super::types::{ClearedResponse, EnqueueResponse, FilesQuery, FilesResponse, UploadStarted};
use crate::backend::{PagingInfo, RecordClient};
use crate::config::{DEFAULT_PAGE_SIZE, MAX_UPLOAD_BODY};
use crate::error::{BackendError, ServerError, ServerResult};
use crate::files::{FileService, StorageUsage};
use crate::models::{EntryId, FileRecord, SourceFile, UploadEntry};
use crate::queue::{CancelOutcome, QueueSnapshot, UploadQueue};

/// Shared handler state.
pub struct AppState<C> {
    pub queue: UploadQueue<C>,
    pub page_size: u32,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            page_size: self.page_size,
        }
    }
}

impl<C: RecordClient> AppState<C> {
    pub fn new(queue: UploadQueue<C>) -> Self {
        Self {
            queue,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn files(&self) -> &FileService<C> {
        self.queue.files()
    }
}

/// Build the router. `static_dir`, when given, is served for unmatched paths.
pub fn router<C: RecordClient>(state: AppState<C>, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/queue", get(get_queue::<C>).post(enqueue_files::<C>))
        .route("/api/queue/{id}", delete(remove_entry::<C>))
        .route("/api/queue/upload", post(start_upload::<C>))
        .route("/api/queue/cancel", post(cancel_upload::<C>))
        .route("/api/queue/clear-completed", post(clear_completed::<C>))
        .route("/api/queue/events", get(queue_events::<C>))
        .route("/api/notifications", get(notifications::<C>))
        .route("/api/files", get(list_files::<C>))
        .route("/api/files/{id}", get(get_file::<C>).delete(delete_file::<C>))
        .route("/api/storage", get(storage::<C>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(health)),
    };

    app.layer(cors)
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server<C: RecordClient>(
    state: AppState<C>,
    port: u16,
    static_dir: Option<PathBuf>,
) -> ServerResult<()> {
    let serving_static = static_dir.clone();
    let app = router(state, static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 DropVault server running on http://localhost:{}", port);
    println!("   GET  /api/queue         - Queue snapshot");
    println!("   POST /api/queue         - Add files (multipart)");
    println!("   POST /api/queue/upload  - Upload all");
    println!("   GET  /api/queue/events  - SSE queue stream");
    println!("   GET  /api/files         - File listing");
    println!("   GET  /health            - Health check");
    if let Some(dir) = serving_static {
        println!("📁 Serving {}", dir.display());
    }
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\n👋 Shutting down");
        })
        .await?;

    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dropvault",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_queue<C: RecordClient>(State(state): State<AppState<C>>) -> Json<QueueSnapshot> {
    Json(state.queue.snapshot())
}

/// Every multipart field named `file` becomes one entry.
async fn enqueue_files<C: RecordClient>(
    State(state): State<AppState<C>>,
    mut multipart: Multipart,
) -> ServerResult<Json<EnqueueResponse>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("unnamed").to_string();
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(&name).first_raw().map(str::to_string))
            .unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

        files.push(SourceFile::new(name, bytes.len() as u64, mime_type, Utc::now()));
    }

    if files.is_empty() {
        return Err(ServerError::BadRequest("No file provided".to_string()));
    }

    let added = state.queue.enqueue(files);
    Ok(Json(EnqueueResponse {
        added,
        queue: state.queue.snapshot(),
    }))
}

async fn remove_entry<C: RecordClient>(
    State(state): State<AppState<C>>,
    Path(id): Path<String>,
) -> ServerResult<Json<UploadEntry>> {
    let id: EntryId = id
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("Invalid entry id '{}'", id)))?;
    Ok(Json(state.queue.remove_entry(id)?))
}

/// Claim a batch and run it on a background task.
async fn start_upload<C: RecordClient>(
    State(state): State<AppState<C>>,
) -> (StatusCode, Json<UploadStarted>) {
    let Some(batch) = state.queue.begin_upload() else {
        return (StatusCode::OK, Json(UploadStarted { started: false }));
    };

    tokio::spawn(async move {
        let summary = batch.run().await;
        log::info!(
            "Batch finished: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
    });

    (StatusCode::ACCEPTED, Json(UploadStarted { started: true }))
}

async fn cancel_upload<C: RecordClient>(State(state): State<AppState<C>>) -> Json<CancelOutcome> {
    Json(state.queue.cancel_upload())
}

async fn clear_completed<C: RecordClient>(
    State(state): State<AppState<C>>,
) -> Json<ClearedResponse> {
    Json(ClearedResponse {
        cleared: state.queue.clear_completed(),
    })
}

/// Current snapshot first, then one event per change.
async fn queue_events<C: RecordClient>(
    State(state): State<AppState<C>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.queue.subscribe()).filter_map(|snapshot| {
        Event::default()
            .event("queue")
            .json_data(&snapshot)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn notifications<C: RecordClient>(
    State(state): State<AppState<C>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.queue.notifier().subscribe();

    // Lagged receivers skip the notices they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let notice = result.ok()?;
        let json = serde_json::to_string(&notice).ok()?;
        Some(Ok(Event::default().event("notice").data(json)))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn list_files<C: RecordClient>(
    State(state): State<AppState<C>>,
    Query(query): Query<FilesQuery>,
) -> ServerResult<Json<FilesResponse>> {
    let page = query.page();
    let limit = query.limit(state.page_size);
    let paging = PagingInfo {
        limit,
        offset: (page - 1).saturating_mul(limit),
    };
    let files = state.files().fetch_files(Vec::new(), paging).await?;
    Ok(Json(FilesResponse::new(files, page, limit)))
}

async fn get_file<C: RecordClient>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> ServerResult<Json<FileRecord>> {
    state
        .files()
        .get_file(id)
        .await?
        .map(Json)
        .ok_or(ServerError::Backend(BackendError::NotFound(id)))
}

async fn delete_file<C: RecordClient>(
    State(state): State<AppState<C>>,
    Path(id): Path<u64>,
) -> ServerResult<StatusCode> {
    state.files().delete_file(id).await?;
    state.queue.notifier().success("File deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn storage<C: RecordClient>(
    State(state): State<AppState<C>>,
) -> ServerResult<Json<StorageUsage>> {
    Ok(Json(state.files().storage_usage().await?))
}
