//! HTTP implementation of [`RecordClient`].
//!
//! | Operation | Method | Path                                 |
//! |-----------|--------|--------------------------------------|
//! | create    | POST   | `/tables/{table}/records`            |
//! | fetch     | POST   | `/tables/{table}/records/query`      |
//! | get       | POST   | `/tables/{table}/records/{id}`       |
//! | update    | PUT    | `/tables/{table}/records`            |
//! | delete    | DELETE | `/tables/{table}/records`            |

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    DeleteRequest, FetchParams, FetchResponse, RecordByIdResponse, RecordClient, RecordResponse,
    RecordsRequest, Session,
};
use crate::error::{BackendError, BackendResult};

/// Error body returned by the record store.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
struct FieldsRequest {
    fields: Vec<String>,
}

/// Record-store client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpRecordClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl HttpRecordClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: Arc::new(session),
        }
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/tables/{}/records", self.base_url, table)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Project-Id", &self.session.project_id)
            .header("X-Public-Key", &self.session.public_key)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            log::debug!("Record store returned {}: {}", status, message);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl RecordClient for HttpRecordClient {
    async fn create_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> BackendResult<RecordResponse> {
        let builder = self
            .request(Method::POST, self.records_url(table))
            .json(&request);
        self.send(builder).await
    }

    async fn fetch_records(&self, table: &str, params: FetchParams) -> BackendResult<FetchResponse> {
        let url = format!("{}/query", self.records_url(table));
        let builder = self.request(Method::POST, url).json(&params);
        self.send(builder).await
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: u64,
        fields: Vec<String>,
    ) -> BackendResult<RecordByIdResponse> {
        let url = format!("{}/{}", self.records_url(table), id);
        let builder = self
            .request(Method::POST, url)
            .json(&FieldsRequest { fields });
        self.send(builder).await
    }

    async fn update_record(
        &self,
        table: &str,
        request: RecordsRequest,
    ) -> BackendResult<RecordResponse> {
        let builder = self
            .request(Method::PUT, self.records_url(table))
            .json(&request);
        self.send(builder).await
    }

    async fn delete_record(
        &self,
        table: &str,
        request: DeleteRequest,
    ) -> BackendResult<RecordResponse> {
        let builder = self
            .request(Method::DELETE, self.records_url(table))
            .json(&request);
        self.send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PagingInfo;

    #[test]
    fn test_records_url_strips_trailing_slash() {
        let client = HttpRecordClient::new("https://records.example.com/v1/", Session::default());
        assert_eq!(
            client.records_url("file"),
            "https://records.example.com/v1/tables/file/records"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = HttpRecordClient::new("http://127.0.0.1:9", Session::new("p", "k"));
        let err = client
            .fetch_records(
                "file",
                FetchParams {
                    fields: vec!["Id".into()],
                    paging_info: PagingInfo { limit: 1, offset: 0 },
                    order_by: Vec::new(),
                    conditions: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
    }
}
