use crate::error::{Result, VectorStoreError};
use crate::store::VectorStore;
use crate::types::{AnnRequest, DocumentAttributes, QueryVector, StoreHit, DOCUMENT_OUTPUT_FIELDS};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

const LOAD_PATH: &str = "/v2/vectordb/collections/load";
const SEARCH_PATH: &str = "/v2/vectordb/entities/search";

#[derive(Debug, Clone)]
pub struct MilvusConfig {
    pub uri: String,
    pub token: Option<String>,
    pub db_name: Option<String>,
    pub collection: String,
    pub request_timeout: Duration,
}

/// Milvus RESTful (v2) client bound to one collection.
///
/// `reqwest::Client` pools connections internally, so one `MilvusClient` is
/// shared across every concurrent search.
pub struct MilvusClient {
    client: reqwest::Client,
    config: MilvusConfig,
}

impl MilvusClient {
    /// Build the pooled client and make sure the collection is loaded.
    pub async fn connect(config: MilvusConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let this = Self { client, config };
        this.load_collection().await?;
        log::info!(
            "Connected to Milvus @ {} (collection '{}')",
            this.config.uri,
            this.config.collection
        );
        Ok(this)
    }

    /// Re-issue the collection load, e.g. after the server restarted.
    pub async fn reconnect(&self) -> Result<()> {
        log::debug!("Re-loading collection '{}'", self.config.collection);
        self.load_collection().await
    }

    async fn load_collection(&self) -> Result<()> {
        let mut body = Map::new();
        body.insert(
            "collectionName".to_string(),
            Value::String(self.config.collection.clone()),
        );
        self.insert_db_name(&mut body);
        self.post(LOAD_PATH, &Value::Object(body))
            .await
            .map(|_| ())
    }

    fn insert_db_name(&self, body: &mut Map<String, Value>) {
        if let Some(db) = &self.config.db_name {
            body.insert("dbName".to_string(), Value::String(db.clone()));
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{path}", self.config.uri.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(body);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder.send().await?.error_for_status()?;
        let payload: Value = response.json().await?;
        check_status(payload)
    }

    fn search_body(&self, request: &AnnRequest) -> Result<Value> {
        let mut body = build_search_body(&self.config.collection, request)?;
        if let Value::Object(map) = &mut body {
            self.insert_db_name(map);
        }
        Ok(body)
    }
}

fn check_status(payload: Value) -> Result<Value> {
    let code = payload.get("code").and_then(Value::as_i64).unwrap_or(0);
    if code != 0 {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(VectorStoreError::BackendError { code, message });
    }
    Ok(payload)
}

pub(crate) fn build_search_body(collection: &str, request: &AnnRequest) -> Result<Value> {
    let data = match &request.vector {
        QueryVector::Sparse(sparse) => serde_json::to_value(sparse)?,
        QueryVector::Dense(dense) => serde_json::to_value(dense)?,
    };

    let mut params = json!({
        "radius": request.params.radius,
        "range_filter": request.params.range,
    });
    if let Some(nprobe) = request.params.nprobe {
        params["nprobe"] = json!(nprobe);
    }

    let mut search_params = json!({
        "metricType": request.metric.as_str(),
        "params": params,
    });
    if request.iterative_filter {
        search_params["hints"] = json!("iterative_filter");
    }

    let mut body = json!({
        "collectionName": collection,
        "data": [data],
        "annsField": request.field,
        "limit": request.limit,
        "outputFields": DOCUMENT_OUTPUT_FIELDS,
        "searchParams": search_params,
    });
    if !request.predicate.trim().is_empty() {
        body["filter"] = json!(request.predicate);
    }
    Ok(body)
}

pub(crate) fn parse_hits(payload: &Value) -> Result<Vec<StoreHit>> {
    let Some(rows) = payload.get("data").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    rows.iter()
        .map(|row| {
            let Value::Object(fields) = row else {
                return Err(VectorStoreError::Other(format!(
                    "Unexpected search row: {row}"
                )));
            };
            let id = match fields.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    return Err(VectorStoreError::Other(
                        "Search row without primary key".to_string(),
                    ))
                }
            };
            let distance = fields
                .get("distance")
                .and_then(Value::as_f64)
                .ok_or_else(|| VectorStoreError::Other(format!("Row {id} has no distance")))?
                as f32;

            let mut entity = fields.clone();
            entity.remove("id");
            entity.remove("distance");
            entity.retain(|_, value| !value.is_null());
            let entity: DocumentAttributes = serde_json::from_value(Value::Object(entity))?;

            Ok(StoreHit {
                id,
                distance,
                entity,
            })
        })
        .collect()
}

fn is_not_loaded(err: &VectorStoreError) -> bool {
    matches!(err, VectorStoreError::BackendError { message, .. }
        if message.to_ascii_lowercase().contains("not loaded"))
}

#[async_trait]
impl VectorStore for MilvusClient {
    fn name(&self) -> &str {
        "milvus"
    }

    async fn search(&self, request: &AnnRequest) -> Result<Vec<StoreHit>> {
        let body = self.search_body(request)?;
        let payload = match self.post(SEARCH_PATH, &body).await {
            Ok(payload) => payload,
            Err(err) if is_not_loaded(&err) => {
                log::warn!(
                    "Collection '{}' not loaded, reloading: {err}",
                    self.config.collection
                );
                self.reconnect().await?;
                self.post(SEARCH_PATH, &body).await?
            }
            Err(err) => return Err(err),
        };
        parse_hits(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metric, SearchParams, SparseVector};
    use pretty_assertions::assert_eq;

    fn request(vector: QueryVector, metric: Metric, nprobe: Option<u32>) -> AnnRequest {
        AnnRequest {
            field: "dense_text_content".to_string(),
            vector,
            metric,
            params: SearchParams {
                radius: 0.5,
                range: 1.0,
                nprobe,
            },
            limit: 5,
            predicate: r#"version == "v15.0.0""#.to_string(),
            iterative_filter: true,
        }
    }

    #[test]
    fn dense_search_body_carries_gate_probe_and_hint() {
        let body = build_search_body(
            "nextjs_docs",
            &request(QueryVector::Dense(vec![0.5, 0.25]), Metric::Cosine, Some(10)),
        )
        .unwrap();

        assert_eq!(
            body,
            json!({
                "collectionName": "nextjs_docs",
                "data": [[0.5, 0.25]],
                "annsField": "dense_text_content",
                "limit": 5,
                "outputFields": ["title", "metadata", "text_content", "code_content", "version", "tag"],
                "filter": "version == \"v15.0.0\"",
                "searchParams": {
                    "metricType": "COSINE",
                    "params": {"radius": 0.5, "range_filter": 1.0, "nprobe": 10},
                    "hints": "iterative_filter"
                }
            })
        );
    }

    #[test]
    fn sparse_search_body_sends_term_map() {
        let sparse: SparseVector = [(7, 0.5)].into_iter().collect();
        let mut req = request(QueryVector::Sparse(sparse), Metric::InnerProduct, None);
        req.iterative_filter = false;
        let body = build_search_body("docs", &req).unwrap();

        assert_eq!(body["data"], json!([{"7": 0.5}]));
        assert_eq!(body["searchParams"]["metricType"], json!("IP"));
        assert!(body["searchParams"].get("hints").is_none());
        assert!(body["searchParams"]["params"].get("nprobe").is_none());
    }

    #[test]
    fn parses_rows_with_numeric_and_string_ids() {
        let payload = json!({
            "code": 0,
            "data": [
                {"id": 42, "distance": 0.9, "title": "Routing", "metadata": {"path": "/docs"}, "version": "v15.0.0"},
                {"id": "abc", "distance": 0.7, "title": "Caching", "tag": "api", "code_content": null}
            ]
        });
        let hits = parse_hits(&payload).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "42");
        assert_eq!(hits[0].entity.metadata, json!({"path": "/docs"}));
        assert_eq!(hits[1].id, "abc");
        assert_eq!(hits[1].entity.tag, "api");
        assert!((hits[1].distance - 0.7).abs() < 1e-6);
    }

    #[test]
    fn non_zero_code_is_a_backend_error() {
        let err = check_status(json!({"code": 1100, "message": "invalid filter"})).unwrap_err();
        assert!(matches!(err, VectorStoreError::BackendError { code: 1100, .. }));
        assert!(!is_not_loaded(&err));

        let err = check_status(json!({"code": 101, "message": "collection not loaded"})).unwrap_err();
        assert!(is_not_loaded(&err));
    }
}
