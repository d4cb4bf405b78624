use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_PROMPT_TOP_K: usize = 3;
pub const DEFAULT_RADIUS: f32 = 0.5;
pub const DEFAULT_RANGE: f32 = 1.0;

const fn default_weight() -> f32 {
    1.0
}

const fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

const fn default_radius() -> f32 {
    DEFAULT_RADIUS
}

const fn default_range() -> f32 {
    DEFAULT_RANGE
}

/// Hybrid search over one documentation version.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct SearchRequest {
    pub version_name: String,
    #[serde(default)]
    pub text_query: String,
    #[serde(default)]
    pub code_query: String,

    #[serde(default = "default_weight")]
    pub sparse_weight: f32,
    #[serde(default = "default_weight")]
    pub dense_text_weight: f32,
    #[serde(default = "default_weight")]
    pub dense_code_weight: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub filter_expr: Option<String>,
    #[serde(default)]
    pub iterative_filter: bool,

    #[serde(default = "default_radius")]
    pub radius_sparse: f32,
    #[serde(default = "default_range")]
    pub range_sparse: f32,
    #[serde(default = "default_radius")]
    pub radius_dense_text: f32,
    #[serde(default = "default_range")]
    pub range_dense_text: f32,
    #[serde(default = "default_radius")]
    pub radius_dense_code: f32,
    #[serde(default = "default_range")]
    pub range_dense_code: f32,
}

impl SearchRequest {
    #[must_use]
    pub fn new(version_name: impl Into<String>) -> Self {
        Self {
            version_name: version_name.into(),
            text_query: String::new(),
            code_query: String::new(),
            sparse_weight: default_weight(),
            dense_text_weight: default_weight(),
            dense_code_weight: default_weight(),
            top_k: DEFAULT_TOP_K,
            filter_expr: None,
            iterative_filter: false,
            radius_sparse: DEFAULT_RADIUS,
            range_sparse: DEFAULT_RANGE,
            radius_dense_text: DEFAULT_RADIUS,
            range_dense_text: DEFAULT_RANGE,
            radius_dense_code: DEFAULT_RADIUS,
            range_dense_code: DEFAULT_RANGE,
        }
    }
}

/// Retrieval knobs carried inside a prompt request; unset fields fall back to
/// the search defaults.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct RetrieverOptions {
    pub sparse_weight: Option<f32>,
    pub dense_text_weight: Option<f32>,
    pub dense_code_weight: Option<f32>,
    pub top_k: Option<usize>,
    pub filter_expr: Option<String>,
    #[serde(default)]
    pub iterative_filter: bool,
    pub radius_sparse: Option<f32>,
    pub range_sparse: Option<f32>,
    pub radius_dense_text: Option<f32>,
    pub range_dense_text: Option<f32>,
    pub radius_dense_code: Option<f32>,
    pub range_dense_code: Option<f32>,
}

impl RetrieverOptions {
    /// Build the search request for a prompt, defaulting `top_k` to
    /// [`DEFAULT_PROMPT_TOP_K`].
    #[must_use]
    pub fn to_search_request(
        &self,
        version_name: &str,
        text_query: String,
        code_query: String,
    ) -> SearchRequest {
        let mut request = SearchRequest::new(version_name);
        request.text_query = text_query;
        request.code_query = code_query;
        request.sparse_weight = self.sparse_weight.unwrap_or(request.sparse_weight);
        request.dense_text_weight = self.dense_text_weight.unwrap_or(request.dense_text_weight);
        request.dense_code_weight = self.dense_code_weight.unwrap_or(request.dense_code_weight);
        request.top_k = self.top_k.unwrap_or(DEFAULT_PROMPT_TOP_K);
        request.filter_expr = self.filter_expr.clone();
        request.iterative_filter = self.iterative_filter;
        request.radius_sparse = self.radius_sparse.unwrap_or(request.radius_sparse);
        request.range_sparse = self.range_sparse.unwrap_or(request.range_sparse);
        request.radius_dense_text = self.radius_dense_text.unwrap_or(request.radius_dense_text);
        request.range_dense_text = self.range_dense_text.unwrap_or(request.range_dense_text);
        request.radius_dense_code = self.radius_dense_code.unwrap_or(request.radius_dense_code);
        request.range_dense_code = self.range_dense_code.unwrap_or(request.range_dense_code);
        request
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct FileAttachment {
    pub file_name: String,
    pub file_extension: String,
    pub file_content: String,
}

/// Question plus optional attached files, answered against one version.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct PromptRequest {
    pub version_name: String,
    pub query: String,
    #[serde(default)]
    pub file_list: Vec<FileAttachment>,
    #[serde(default)]
    pub retriever_options: Option<RetrieverOptions>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub metadata: serde_json::Value,
    pub text_content: String,
    pub code_content: String,
    pub version: String,
    pub tag: String,
    pub sparse_distance: Option<f32>,
    pub dense_text_distance: Option<f32>,
    pub dense_code_distance: Option<f32>,
    pub combined_score: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct PromptResponse {
    pub prompt: String,
    pub context: Vec<SearchHit>,
    pub rendered_context: String,
    pub search_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct VersionsResponse {
    pub versions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn serialize_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let raw = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(raw)
}

/// JSON schemas of the request shapes accepted by the CLI.
pub fn request_schemas() -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "search_request": serde_json::to_value(schemars::schema_for!(SearchRequest))?,
        "prompt_request": serde_json::to_value(schemars::schema_for!(PromptRequest))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn search_request_defaults_follow_service_defaults() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"version_name":"v15.0.0","text_query":"routing"}"#).unwrap();
        let mut expected = SearchRequest::new("v15.0.0");
        expected.text_query = "routing".to_string();
        assert_eq!(request, expected);
        assert_eq!(request.top_k, 10);
        assert_eq!(request.range_dense_code, 1.0);
    }

    #[test]
    fn retriever_options_override_only_what_is_set() {
        let options = RetrieverOptions {
            dense_code_weight: Some(0.0),
            radius_sparse: Some(0.2),
            ..RetrieverOptions::default()
        };
        let request = options.to_search_request("v14.2.0", "text".into(), "code".into());
        assert_eq!(request.top_k, DEFAULT_PROMPT_TOP_K);
        assert_eq!(request.dense_code_weight, 0.0);
        assert_eq!(request.sparse_weight, 1.0);
        assert_eq!(request.radius_sparse, 0.2);
        assert_eq!(request.radius_dense_text, DEFAULT_RADIUS);
        assert_eq!(request.code_query, "code");
    }

    #[test]
    fn schemas_cover_both_requests() {
        let schemas = request_schemas().unwrap();
        assert!(schemas["search_request"].is_object());
        assert!(schemas["prompt_request"].is_object());
    }
}
