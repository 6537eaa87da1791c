//! REST API request and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BackendError, QueueError, ServerError};
use crate::files::FilePage;
use crate::models::{EntryId, FileRecord};
use crate::queue::QueueSnapshot;

/// Response to `POST /api/queue`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    /// Ids of the new entries, in upload order.
    pub added: Vec<EntryId>,
    pub queue: QueueSnapshot,
}

/// Response to `POST /api/queue/upload`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UploadStarted {
    /// False when there was nothing to upload or a batch was already running.
    pub started: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClearedResponse {
    pub cleared: usize,
}

/// `?page=&limit=` of `GET /api/files`. Pages are 1-based.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FilesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl FilesQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default).max(1)
    }
}

/// One listing page with its position.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesResponse {
    pub data: Vec<FileRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_next: bool,
}

impl FilesResponse {
    pub fn new(page: FilePage, number: u32, limit: u32) -> Self {
        let end = u64::from(number) * u64::from(limit);
        Self {
            has_next: end < page.total,
            data: page.data,
            total: page.total,
            page: number,
            limit,
        }
    }
}

/// Create an error response body.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Queue(QueueError::UnknownEntry(_)) => StatusCode::NOT_FOUND,
            ServerError::Queue(_) => StatusCode::BAD_REQUEST,
            ServerError::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Backend(_) => StatusCode::BAD_GATEWAY,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}
