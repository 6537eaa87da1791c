//! Record-store collaborator.
//!
//! The hosted backend exposes generic CRUD over tables of JSON records.
//! [`RecordClient`] is the seam: [`HttpRecordClient`] talks to the real
//! service, [`MemoryRecordStore`] keeps tables in process.
//!
//! # Wire shapes
//!
//! ```text
//! create  {records:[data]}                         -> {success, results:[{success, data}]}
//! fetch   {fields, pagingInfo, orderBy, where?}    -> {data:[...], totalRecordCount}
//! get     {fields}                                 -> {data}
//! update  {records:[{Id, ...}]}                    -> {success, results:[...]}
//! delete  {RecordIds:[...]}                        -> {success, results:[...]}
//! ```

pub mod http;
pub mod memory;
pub mod session;

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendResult;

pub use http::HttpRecordClient;
pub use memory::MemoryRecordStore;
pub use session::{CurrentUser, Session};

// =============================================================================
// Requests
// =============================================================================

/// Body of create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsRequest {
    pub records: Vec<Value>,
}

impl RecordsRequest {
    pub fn single(record: Value) -> Self {
        Self {
            records: vec![record],
        }
    }
}

/// Body of delete calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(rename = "RecordIds")]
    pub record_ids: Vec<u64>,
}

/// Offset paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    ExactMatch,
    Contains,
}

/// A `where` clause entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub field_name: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    /// Whether a record satisfies this condition (any of `values` matches).
    pub fn matches(&self, record: &Value) -> bool {
        let Some(field) = record.get(&self.field_name) else {
            return false;
        };
        self.values.iter().any(|wanted| match self.operator {
            Operator::ExactMatch => field == wanted,
            Operator::Contains => match (field.as_str(), wanted.as_str()) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => field == wanted,
            },
        })
    }
}

/// Body of fetch calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    pub fields: Vec<String>,
    pub paging_info: PagingInfo,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

// =============================================================================
// Responses
// =============================================================================

/// One per-record outcome of a create/update/delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Response of create/update/delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<RecordResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordResponse {
    /// Data of the first result, if the call and that result succeeded.
    pub fn first_data(&self) -> Option<&Value> {
        if !self.success {
            return None;
        }
        self.results
            .as_ref()?
            .first()
            .filter(|r| r.success)
            .and_then(|r| r.data.as_ref())
    }
}

/// Response of fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub total_record_count: Option<u64>,
}

/// Response of get-by-id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordByIdResponse {
    #[serde(default)]
    pub data: Option<Value>,
}

// =============================================================================
// Client trait
// =============================================================================

/// Generic CRUD access to the record store.
pub trait RecordClient: Send + Sync + 'static {
    fn create_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> impl Future<Output = BackendResult<RecordResponse>> + Send;

    fn fetch_records(
        &self,
        table: &str,
        params: FetchParams,
    ) -> impl Future<Output = BackendResult<FetchResponse>> + Send;

    fn get_record_by_id(
        &self,
        table: &str,
        id: u64,
        fields: Vec<String>,
    ) -> impl Future<Output = BackendResult<RecordByIdResponse>> + Send;

    fn update_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> impl Future<Output = BackendResult<RecordResponse>> + Send;

    fn delete_record(
        &self,
        table: &str,
        request: DeleteRequest,
    ) -> impl Future<Output = BackendResult<RecordResponse>> + Send;
}
