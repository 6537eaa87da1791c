//! In-process record store.
//!
//! Behaves like the hosted backend closely enough for local runs
//! (`--in-memory`) and tests: sequential ids, `CreatedOn` stamps,
//! ordering, `where` filtering, paging and field projection. Latency and
//! per-record failures can be injected.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{
    DeleteRequest, FetchParams, FetchResponse, RecordByIdResponse, RecordClient, RecordResponse,
    RecordResult, RecordsRequest, SortDirection,
};
use crate::error::{BackendError, BackendResult};

type FailurePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Default)]
struct StoreState {
    next_id: u64,
    tables: HashMap<String, Vec<Value>>,
    /// Every create payload received, including rejected ones.
    create_log: Vec<(String, Value)>,
}

/// Record store held in memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<StoreState>>,
    latency: Duration,
    fail_when: Option<FailurePredicate>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject created records for which `predicate` returns true.
    pub fn fail_when(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Arc::new(predicate));
        self
    }

    /// Insert records directly, assigning ids. Returns the stored rows.
    pub fn seed(&self, table: &str, records: Vec<Value>) -> Vec<Value> {
        let mut state = self.lock();
        records
            .into_iter()
            .map(|record| insert(&mut state, table, record))
            .collect()
    }

    /// Rows currently stored in `table`, in insertion order.
    pub fn records(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Payloads received by `create_record` for `table`, including rejected ones.
    pub fn created_payloads(&self, table: &str) -> Vec<Value> {
        self.lock()
            .create_log
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, record)| record.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn insert(state: &mut StoreState, table: &str, record: Value) -> Value {
    state.next_id += 1;
    let mut fields = match record {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    fields.insert("Id".to_string(), Value::from(state.next_id));
    fields
        .entry("CreatedOn".to_string())
        .or_insert_with(|| Value::String(now_stamp()));

    let stored = Value::Object(fields);
    state
        .tables
        .entry(table.to_string())
        .or_default()
        .push(stored.clone());
    stored
}

fn record_id(record: &Value) -> Option<u64> {
    record.get("Id").and_then(Value::as_u64)
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Less,
        (_, Some(Value::Null) | None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn project(record: &Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return record.clone();
    }
    let Some(map) = record.as_object() else {
        return record.clone();
    };
    let projected: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| key.as_str() == "Id" || fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(projected)
}

impl RecordClient for MemoryRecordStore {
    async fn create_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> BackendResult<RecordResponse> {
        self.simulate_latency().await;

        let results = {
            let mut state = self.lock();
            let mut results = Vec::with_capacity(request.records.len());
            for record in request.records {
                state.create_log.push((table.to_string(), record.clone()));
                if self.fail_when.as_ref().is_some_and(|reject| reject(&record)) {
                    return Err(BackendError::Api {
                        status: 500,
                        message: "Record rejected".to_string(),
                    });
                }
                let stored = insert(&mut state, table, record);
                results.push(RecordResult {
                    success: true,
                    data: Some(stored),
                    message: None,
                });
            }
            results
        };

        Ok(RecordResponse {
            success: true,
            results: Some(results),
            message: None,
        })
    }

    async fn fetch_records(&self, table: &str, params: FetchParams) -> BackendResult<FetchResponse> {
        self.simulate_latency().await;

        let mut rows: Vec<Value> = self
            .lock()
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| params.conditions.iter().all(|c| c.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let tie_direction = params
            .order_by
            .first()
            .map(|o| o.direction)
            .unwrap_or(SortDirection::Asc);
        rows.sort_by(|a, b| {
            let by_fields = params.order_by.iter().fold(Ordering::Equal, |acc, order| {
                acc.then_with(|| {
                    let ord = compare_values(a.get(&order.field), b.get(&order.field));
                    match order.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
            });
            by_fields.then_with(|| {
                let ord = record_id(a).cmp(&record_id(b));
                match tie_direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
        });

        let total = rows.len() as u64;
        let page = rows
            .iter()
            .skip(params.paging_info.offset as usize)
            .take(params.paging_info.limit as usize)
            .map(|row| project(row, &params.fields))
            .collect();

        Ok(FetchResponse {
            data: Some(page),
            total_record_count: Some(total),
        })
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: u64,
        fields: Vec<String>,
    ) -> BackendResult<RecordByIdResponse> {
        self.simulate_latency().await;

        let data = self.lock().tables.get(table).and_then(|rows| {
            rows.iter()
                .find(|row| record_id(row) == Some(id))
                .map(|row| project(row, &fields))
        });
        Ok(RecordByIdResponse { data })
    }

    async fn update_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> BackendResult<RecordResponse> {
        self.simulate_latency().await;

        let results: Vec<RecordResult> = {
            let mut state = self.lock();
            let rows = state.tables.entry(table.to_string()).or_default();
            request
                .records
                .into_iter()
                .map(|changes| {
                    let target = record_id(&changes)
                        .and_then(|id| rows.iter_mut().find(|row| record_id(row) == Some(id)));
                    match (target, changes) {
                        (Some(Value::Object(row)), Value::Object(changes)) => {
                            for (key, value) in changes {
                                row.insert(key, value);
                            }
                            row.insert("ModifiedOn".to_string(), Value::String(now_stamp()));
                            RecordResult {
                                success: true,
                                data: Some(Value::Object(row.clone())),
                                message: None,
                            }
                        }
                        _ => RecordResult {
                            success: false,
                            data: None,
                            message: Some("Record not found".to_string()),
                        },
                    }
                })
                .collect()
        };

        Ok(RecordResponse {
            success: results.iter().all(|r| r.success),
            results: Some(results),
            message: None,
        })
    }

    async fn delete_record(
        &self,
        table: &str,
        request: DeleteRequest,
    ) -> BackendResult<RecordResponse> {
        self.simulate_latency().await;

        let results: Vec<RecordResult> = {
            let mut state = self.lock();
            let rows = state.tables.entry(table.to_string()).or_default();
            request
                .record_ids
                .iter()
                .map(|id| {
                    let before = rows.len();
                    rows.retain(|row| record_id(row) != Some(*id));
                    let removed = rows.len() < before;
                    RecordResult {
                        success: removed,
                        data: None,
                        message: (!removed).then(|| format!("Record {} not found", id)),
                    }
                })
                .collect()
        };

        Ok(RecordResponse {
            success: results.iter().all(|r| r.success),
            results: Some(results),
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Condition, Operator, OrderBy, PagingInfo};
    use serde_json::json;

    fn params(limit: u32, offset: u32) -> FetchParams {
        FetchParams {
            fields: Vec::new(),
            paging_info: PagingInfo { limit, offset },
            order_by: vec![OrderBy {
                field: "CreatedOn".into(),
                direction: SortDirection::Desc,
            }],
            conditions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = MemoryRecordStore::new();
        let response = store
            .create_record("file", RecordsRequest::single(json!({"Name": "a.txt"})))
            .await
            .unwrap();
        assert_eq!(response.first_data().unwrap()["Id"], 1);

        let response = store
            .create_record("file", RecordsRequest::single(json!({"Name": "b.txt"})))
            .await
            .unwrap();
        assert_eq!(response.first_data().unwrap()["Id"], 2);
        assert!(response.first_data().unwrap()["CreatedOn"].is_string());
    }

    #[tokio::test]
    async fn test_fetch_newest_first_with_paging() {
        let store = MemoryRecordStore::new();
        store.seed(
            "file",
            (1..=5).map(|i| json!({"Name": format!("f{}", i), "CreatedOn": "2024-01-01T00:00:00Z"})).collect(),
        );

        let page = store.fetch_records("file", params(2, 0)).await.unwrap();
        let names: Vec<_> = page.data.unwrap().iter().map(|r| r["Name"].clone()).collect();
        assert_eq!(names, vec![json!("f5"), json!("f4")]);
        assert_eq!(page.total_record_count, Some(5));

        let last = store.fetch_records("file", params(2, 4)).await.unwrap();
        assert_eq!(last.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_projects_and_filters() {
        let store = MemoryRecordStore::new();
        store.seed(
            "file",
            vec![
                json!({"Name": "a", "size": 1, "status": "complete"}),
                json!({"Name": "b", "size": 2, "status": "error"}),
            ],
        );

        let mut p = params(10, 0);
        p.fields = vec!["Name".into()];
        p.conditions = vec![Condition {
            field_name: "status".into(),
            operator: Operator::ExactMatch,
            values: vec![json!("complete")],
        }];

        let page = store.fetch_records("file", p).await.unwrap();
        let rows = page.data.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Name"], "a");
        assert!(rows[0].get("size").is_none());
        assert!(rows[0].get("Id").is_some());
    }

    #[tokio::test]
    async fn test_injected_failure_is_logged() {
        let store = MemoryRecordStore::new().fail_when(|r| r["Name"] == "bad.bin");
        let err = store
            .create_record("file", RecordsRequest::single(json!({"Name": "bad.bin"})))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 500, .. }));
        assert_eq!(store.created_payloads("file").len(), 1);
        assert!(store.records("file").is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryRecordStore::new();
        store.seed("file", vec![json!({"Name": "a", "status": "uploading"})]);

        let updated = store
            .update_record("file", RecordsRequest::single(json!({"Id": 1, "status": "complete"})))
            .await
            .unwrap();
        assert_eq!(updated.first_data().unwrap()["status"], "complete");

        let missing = store
            .update_record("file", RecordsRequest::single(json!({"Id": 99, "status": "x"})))
            .await
            .unwrap();
        assert!(!missing.success);

        let deleted = store
            .delete_record("file", DeleteRequest { record_ids: vec![1] })
            .await
            .unwrap();
        assert!(deleted.success);
        let gone = store.get_record_by_id("file", 1, Vec::new()).await.unwrap();
        assert!(gone.data.is_none());
    }
}
