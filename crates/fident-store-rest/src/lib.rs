//! REST [`DocumentStore`] client.
//!
//! Talks to a Directus-style items API: documents live at
//! `/items/{collection}/{id}`, responses wrap the document in a `data`
//! envelope, filters go in the query string as
//! `filter[field][_op]=value`, and authentication is a static bearer
//! token.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use fident_auth::store::{DocumentStore, FieldFilter, FilterOp, StoreError, StoreResult};

/// HTTP client for the backing document store.
pub struct RestDocumentStore {
    http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl RestDocumentStore {
    /// Creates a client for the store at `base_url`, authenticating every
    /// request with the bearer `token`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the base URL is unusable.
    pub fn new(base_url: &str, token: impl Into<String>) -> StoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::backend(format!("invalid store URL: {e}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token: token.into(),
        })
    }

    fn item_url(&self, collection: &str, id: Option<&str>) -> StoreResult<Url> {
        let mut path = format!("items/{collection}");
        if let Some(id) = id {
            path.push('/');
            path.push_str(id);
        }
        self.base_url
            .join(&path)
            .map_err(|e| StoreError::backend(format!("invalid item path: {e}")))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| StoreError::backend(format!("store unreachable: {e}")))
    }
}

/// Pulls the document out of the `{"data": ...}` envelope.
async fn unwrap_data(response: reqwest::Response) -> StoreResult<Value> {
    let body: Value = response
        .json()
        .await
        .map_err(|e| StoreError::backend(format!("malformed store response: {e}")))?;
    match body {
        Value::Object(mut envelope) => envelope
            .remove("data")
            .ok_or_else(|| StoreError::backend("store response missing data envelope")),
        _ => Err(StoreError::backend("store response is not an object")),
    }
}

fn filter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn append_filters(url: &mut Url, filters: &[FieldFilter]) {
    let mut pairs = url.query_pairs_mut();
    for filter in filters {
        let (op, value) = match filter.op {
            FilterOp::Eq => ("_eq", filter_value(&filter.value)),
            FilterOp::Lt => ("_lt", filter_value(&filter.value)),
            FilterOp::In => {
                let joined = filter
                    .value
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .map(filter_value)
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default();
                ("_in", joined)
            }
        };
        // Dotted paths address nested fields: payload.grantId becomes
        // filter[payload][grantId][_eq].
        let mut key = String::from("filter");
        for segment in filter.path.split('.') {
            key.push('[');
            key.push_str(segment);
            key.push(']');
        }
        key.push('[');
        key.push_str(op);
        key.push(']');
        pairs.append_pair(&key, &value);
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let url = self.item_url(collection, Some(id))?;
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        match response.status() {
            status if status.is_success() => Ok(Some(unwrap_data(response).await?)),
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::FORBIDDEN => {
                // The store reports unreadable items as forbidden rather
                // than leaking their existence; both are a miss here.
                Ok(None)
            }
            status => {
                tracing::warn!(collection, id, %status, "get failed");
                Err(StoreError::backend(format!(
                    "get {collection}/{id} returned {status}"
                )))
            }
        }
    }

    async fn create(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()> {
        let url = self.item_url(collection, None)?;
        let mut body = body.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("id".to_string(), Value::String(id.to_string()));
        }
        let response = self
            .send(self.request(reqwest::Method::POST, url).json(&body))
            .await?;
        match response.status() {
            status if status.is_success() => {
                tracing::debug!(collection, id, "document created");
                Ok(())
            }
            reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::CONFLICT => {
                Err(StoreError::conflict(collection, id))
            }
            status => {
                tracing::warn!(collection, id, %status, "create failed");
                Err(StoreError::backend(format!(
                    "create {collection}/{id} returned {status}"
                )))
            }
        }
    }

    async fn update(&self, collection: &str, id: &str, body: &Value) -> StoreResult<()> {
        let url = self.item_url(collection, Some(id))?;
        let response = self
            .send(self.request(reqwest::Method::PATCH, url).json(body))
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(StoreError::missing(collection, id)),
            status => {
                tracing::warn!(collection, id, %status, "update failed");
                Err(StoreError::backend(format!(
                    "update {collection}/{id} returned {status}"
                )))
            }
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let url = self.item_url(collection, Some(id))?;
        let response = self.send(self.request(reqwest::Method::DELETE, url)).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            // Deleting what is already gone is the outcome we wanted.
            reqwest::StatusCode::NOT_FOUND => Ok(()),
            status => {
                tracing::warn!(collection, id, %status, "delete failed");
                Err(StoreError::backend(format!(
                    "delete {collection}/{id} returned {status}"
                )))
            }
        }
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        let mut url = self.item_url(collection, None)?;
        append_filters(&mut url, filters);
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(collection, %status, "query failed");
            return Err(StoreError::backend(format!(
                "query {collection} returned {status}"
            )));
        }
        match unwrap_data(response).await? {
            Value::Array(items) => Ok(items),
            _ => Err(StoreError::backend("query response data is not an array")),
        }
    }
}
