//! Domain models for DropVault.
//!
//! - [`EntryId`] - Client-side correlation key of a queued file
//! - [`UploadStatus`] - Finite state of a queue entry
//! - [`SourceFile`] - File handle metadata captured at enqueue time
//! - [`UploadEntry`] - One file tracked in the upload queue
//! - [`MimeCategory`] - Coarse file type stored on backend records
//! - [`FileRecord`] / [`NewFileRecord`] - Backend `file` table rows

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};

// =============================================================================
// Entry Identification
// =============================================================================

/// Locally generated identifier of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// =============================================================================
// Upload Status
// =============================================================================

/// Status of a queue entry.
///
/// `Ready -> Uploading -> Complete | Error`; `Uploading -> Ready` only
/// through a batch cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Ready,
    Uploading,
    Complete,
    Error,
}

// =============================================================================
// Source File
// =============================================================================

/// Metadata of a file offered to the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// File name without directories.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// MIME type, empty when unknown.
    pub mime_type: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl SourceFile {
    /// Describe a file from explicit values.
    pub fn new(
        name: impl Into<String>,
        size_bytes: u64,
        mime_type: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
            last_modified,
        }
    }

    /// Inspect a file on disk. The MIME type is guessed from the extension.
    pub async fn from_path(path: &Path) -> QueueResult<Self> {
        let display = path.display().to_string();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| QueueError::Unreadable {
                path: display.clone(),
                source,
            })?;

        if !metadata.is_file() {
            return Err(QueueError::NotAFile(display));
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(display);

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("")
            .to_string();

        Ok(Self::new(name, metadata.len(), mime_type, last_modified))
    }
}

// =============================================================================
// Upload Entry
// =============================================================================

/// One file tracked in the local upload queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
    pub id: EntryId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
    pub status: UploadStatus,
    /// Backend record id; only set together with `Complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<u64>,
    /// Generation stamped each time the entry starts uploading.
    #[serde(skip)]
    pub(crate) attempt: u64,
}

impl UploadEntry {
    /// A `Ready` entry copied from a source file.
    pub fn from_source(file: SourceFile) -> Self {
        Self {
            id: EntryId::new(),
            name: file.name,
            size_bytes: file.size_bytes,
            mime_type: file.mime_type,
            last_modified: file.last_modified,
            status: UploadStatus::Ready,
            backend_id: None,
            attempt: 0,
        }
    }
}

// =============================================================================
// MIME Category
// =============================================================================

/// Coarse file type stored in the record's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeCategory {
    Image,
    Video,
    Audio,
    Text,
    Pdf,
    Spreadsheet,
    Presentation,
    Doc,
    Compressed,
    Unknown,
}

impl MimeCategory {
    /// Classify a MIME type. Rules are checked in declaration order.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.is_empty() {
            return Self::Unknown;
        }

        if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("video/") {
            Self::Video
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else if mime.starts_with("text/") {
            Self::Text
        } else if mime.contains("pdf") {
            Self::Pdf
        } else if mime.contains("spreadsheet") || mime.contains("excel") {
            Self::Spreadsheet
        } else if mime.contains("presentation") || mime.contains("powerpoint") {
            Self::Presentation
        } else if mime.contains("word") || mime.contains("document") {
            Self::Doc
        } else if mime.contains("zip") || mime.contains("compressed") {
            Self::Compressed
        } else {
            Self::Unknown
        }
    }
}

// =============================================================================
// Backend File Records
// =============================================================================

/// A row of the backend `file` table.
///
/// Every field except `Id` may be absent or null depending on the fields
/// requested and on what the creator stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "Id")]
    pub id: u64,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub size: Option<u64>,
    #[serde(rename = "type", default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<u32>,
    #[serde(rename = "CreatedOn", default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(rename = "CreatedBy", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Value>,
    #[serde(rename = "ModifiedOn", default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Rows written by other clients may hold `1024.0` or `"1024"`; values that
/// are not a non-negative number read as absent instead of failing the row.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(whole_number)
        .and_then(|n| T::try_from(n).ok()))
}

fn whole_number(value: &Value) -> Option<u64> {
    let from_float = |f: f64| (f.is_finite() && f >= 0.0).then(|| f.round() as u64);
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(from_float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(from_float))
        }
        _ => None,
    }
}

impl FileRecord {
    /// Date shown in listings: the upload date, falling back to creation.
    pub fn display_date(&self) -> Option<&str> {
        self.date.as_deref().or(self.created_on.as_deref())
    }
}

/// Payload of a `file` record creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFileRecord {
    #[serde(rename = "Name")]
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub file_type: MimeCategory,
    pub date: String,
    pub status: UploadStatus,
    pub progress: u8,
}

impl NewFileRecord {
    /// Record written once an entry is uploaded.
    pub fn completed(entry: &UploadEntry, now: DateTime<Utc>) -> Self {
        Self {
            name: entry.name.clone(),
            size: entry.size_bytes,
            file_type: MimeCategory::from_mime(&entry.mime_type),
            date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: UploadStatus::Complete,
            progress: 100,
        }
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Human-readable size, e.g. `1.5 KB`. Trailing zeros are dropped.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", text, UNITS[unit])
}

// =============================================================================
// Tests
// =============================================================================
