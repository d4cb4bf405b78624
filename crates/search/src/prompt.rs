//! Retrieval-context assembly for the answer-generation layer.

use crate::error::{Result, SearchError};
use crate::fusion::RankedResult;
use crate::hybrid::HybridSearch;
use crate::query::HybridQuery;
use docqa_protocol::{FileAttachment, PromptRequest, PromptResponse, SearchHit};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;
use std::time::Instant;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[\s\S]*?```").expect("fenced code pattern is valid"));

const SNIPPET_PLACEHOLDER: &str = "code_snippet_";

/// A free-form question split into its prose and its fenced code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    pub text: String,
    pub code: String,
}

#[must_use]
pub fn split_text_and_code(query: &str) -> SplitQuery {
    let text = CODE_BLOCK
        .split(query)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let code = CODE_BLOCK
        .find_iter(query)
        .map(|m| m.as_str().trim())
        .collect::<Vec<_>>()
        .join(" ");
    SplitQuery { text, code }
}

/// Append attachments to the user's prompt as fenced blocks.
#[must_use]
pub fn inline_files(prompt: &str, files: &[FileAttachment]) -> String {
    let mut out = prompt.to_string();
    for file in files {
        out.push_str(&format!(
            "\n```{} {}\n{}```",
            file.file_extension, file.file_name, file.file_content
        ));
    }
    out
}

fn code_query_with_files(code_query: &str, files: &[FileAttachment]) -> String {
    let mut out = code_query.to_string();
    for file in files {
        out.push_str(&format!(
            "\n```{}\n{}```",
            file.file_extension, file.file_content
        ));
    }
    out
}

#[derive(Debug, Deserialize)]
struct CodeSnippet {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    switcher: serde_json::Value,
    #[serde(default)]
    code: Option<String>,
}

fn truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

fn render_snippet(snippet: &CodeSnippet) -> String {
    let mut header = Vec::new();
    if let Some(language) = snippet.language.as_deref().filter(|l| !l.is_empty()) {
        header.push(language.to_string());
    }
    if let Some(filename) = snippet.filename.as_deref().filter(|f| !f.is_empty()) {
        header.push(format!("filename=\"{filename}\""));
    }
    if truthy(&snippet.switcher) {
        header.push("switcher".to_string());
    }
    format!(
        "{}\n{}",
        header.join(" "),
        snippet.code.as_deref().unwrap_or_default()
    )
}

/// Rewrite a Python literal (the `repr` of a list of dicts) as JSON.
///
/// Handles both quote styles with their escapes, `True`/`False`/`None` and
/// trailing commas. Anything else that is not already JSON yields `None`.
fn python_literal_to_json(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let value = read_python_string(&mut chars, c)?;
                out.push_str(&serde_json::to_string(&value).ok()?);
            }
            ']' | '}' => {
                let kept = out.trim_end().len();
                out.truncate(kept);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            c if c.is_ascii_digit() || c == '-' => {
                out.push(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || matches!(next, '.' | '+' | '-')) {
                        break;
                    }
                    out.push(next);
                    chars.next();
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    ident.push(next);
                    chars.next();
                }
                out.push_str(match ident.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => return None,
                });
            }
            c => out.push(c),
        }
    }
    Some(out)
}

fn read_python_string(chars: &mut Peekable<Chars<'_>>, quote: char) -> Option<String> {
    let mut value = String::new();
    loop {
        match chars.next()? {
            c if c == quote => return Some(value),
            '\\' => match chars.next()? {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                'x' => value.push(read_hex_char(chars, 2)?),
                'u' => value.push(read_hex_char(chars, 4)?),
                'U' => value.push(read_hex_char(chars, 8)?),
                '\n' => {}
                escaped @ ('\\' | '\'' | '"') => value.push(escaped),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            },
            c => value.push(c),
        }
    }
}

fn read_hex_char(chars: &mut Peekable<Chars<'_>>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}

/// Stored snippet lists are JSON, or the Python `repr` older ingests wrote.
fn parse_snippets(code_content: &str) -> serde_json::Result<Vec<CodeSnippet>> {
    serde_json::from_str(code_content).or_else(|err| match python_literal_to_json(code_content) {
        Some(json) => serde_json::from_str(&json),
        None => Err(err),
    })
}

/// Put each stored snippet back at its `code_snippet_<n>` placeholder.
///
/// Placeholders are 1-based and replaced from the highest index down so that
/// `code_snippet_1` never clobbers the prefix of `code_snippet_10`.
#[must_use]
pub fn render_chunk(text_content: &str, code_content: &str) -> String {
    if code_content.trim().is_empty() {
        return text_content.to_string();
    }
    let snippets = match parse_snippets(code_content) {
        Ok(snippets) => snippets,
        Err(err) => {
            log::debug!("code_content is not a snippet list, leaving text as-is: {err}");
            return text_content.to_string();
        }
    };

    let mut rendered = text_content.to_string();
    for (idx, snippet) in snippets.iter().enumerate().rev() {
        let placeholder = format!("{SNIPPET_PLACEHOLDER}{}", idx + 1);
        rendered = rendered.replace(&placeholder, &render_snippet(snippet));
    }
    rendered
}

#[must_use]
pub fn render_context(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        out.push_str(&render_chunk(&hit.text_content, &hit.code_content));
        out.push_str("\n\n");
    }
    out
}

/// Documentation versions that have been ingested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportedVersions {
    versions: Vec<String>,
}

impl SupportedVersions {
    /// One version per line; blank lines and `#` comments are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let versions = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ToString::to_string)
            .collect();
        Self { versions }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Ok(Self::parse(&raw))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.versions
    }

    #[must_use]
    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    pub fn ensure_supported(&self, version: &str) -> Result<()> {
        if self.contains(version) {
            Ok(())
        } else {
            Err(SearchError::InvalidArgument(format!(
                "unsupported version '{version}'"
            )))
        }
    }
}

/// Retrieve context for a question: split prose from code, fold attachments
/// into the code query, run the hybrid search and render the hits.
pub async fn build_prompt_context(
    search: &HybridSearch,
    versions: &SupportedVersions,
    request: &PromptRequest,
) -> Result<PromptResponse> {
    versions.ensure_supported(&request.version_name)?;

    let split = split_text_and_code(&request.query);
    let code_query = code_query_with_files(&split.code, &request.file_list);
    let options = request.retriever_options.clone().unwrap_or_default();
    let search_request = options.to_search_request(&request.version_name, split.text, code_query);

    let started = Instant::now();
    let results: Vec<RankedResult> = search.search(&HybridQuery::from(&search_request)).await?;
    let search_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    log::debug!("Prompt retrieval took {search_time_ms} ms");

    let context: Vec<SearchHit> = results.into_iter().map(SearchHit::from).collect();
    Ok(PromptResponse {
        prompt: inline_files(&request.query, &request.file_list),
        rendered_context: render_context(&context),
        context,
        search_time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use docqa_protocol::RetrieverOptions;
    use docqa_vector_store::{
        CorpusDocument, DocumentAttributes, DocumentCorpus, InMemoryVectorStore, StubEmbedder,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn splits_prose_from_fenced_code() {
        let split = split_text_and_code(
            "Why does this fail?\n```tsx\nexport default function Page() {}\n```\nIt is in app/page.tsx",
        );
        assert_eq!(split.text, "Why does this fail? It is in app/page.tsx");
        assert_eq!(split.code, "```tsx\nexport default function Page() {}\n```");

        let plain = split_text_and_code("  how do layouts work ");
        assert_eq!(plain.text, "how do layouts work");
        assert_eq!(plain.code, "");
    }

    #[test]
    fn attachments_are_fenced() {
        let files = vec![FileAttachment {
            file_name: "page.tsx".to_string(),
            file_extension: "tsx".to_string(),
            file_content: "export {}".to_string(),
        }];
        assert_eq!(inline_files("q", &files), "q\n```tsx page.tsx\nexport {}```");
        assert_eq!(code_query_with_files("", &files), "\n```tsx\nexport {}```");
    }

    #[test]
    fn snippets_replace_placeholders_without_prefix_collisions() {
        let mut snippets = Vec::new();
        for i in 1..=10 {
            snippets.push(serde_json::json!({
                "language": "js",
                "filename": if i == 1 { "next.config.js" } else { "" },
                "switcher": i == 10,
                "code": format!("c{i}"),
            }));
        }
        let code_content = serde_json::to_string(&snippets).unwrap();
        let rendered = render_chunk("A code_snippet_1 B code_snippet_10", &code_content);
        assert_eq!(
            rendered,
            "A js filename=\"next.config.js\"\nc1 B js switcher\nc10"
        );
    }

    #[test]
    fn python_repr_snippets_are_rendered() {
        let rendered = render_chunk(
            "Routes code_snippet_1",
            "[{'language': 'tsx', 'filename': 'app/page.tsx', 'switcher': False, 'code': 'export default function Page() {}'}]",
        );
        assert_eq!(
            rendered,
            "Routes tsx filename=\"app/page.tsx\"\nexport default function Page() {}"
        );

        let rendered = render_chunk(
            "A code_snippet_1 B code_snippet_2",
            r#"[{'language': None, 'switcher': True, 'code': "it's\n\tok",}, {'language': 'js', 'code': 'x = \'1\'', 'lines': [1, -2.5e3]},]"#,
        );
        assert_eq!(rendered, "A switcher\nit's\n\tok B js\nx = '1'");
    }

    #[test]
    fn snippet_header_has_no_stray_separator() {
        let rendered = render_chunk(
            "code_snippet_1",
            r#"[{"language": "", "filename": "next.config.js", "code": "module.exports = {}"}]"#,
        );
        assert_eq!(rendered, "filename=\"next.config.js\"\nmodule.exports = {}");

        let bare = render_chunk("code_snippet_1", r#"[{"code": null}]"#);
        assert_eq!(bare, "\n");
    }

    #[test]
    fn unparseable_code_content_leaves_text() {
        assert_eq!(render_chunk("see code_snippet_1", "not json"), "see code_snippet_1");
        assert_eq!(render_chunk("plain", ""), "plain");
        assert_eq!(
            render_chunk("see code_snippet_1", "[{'code': os.getcwd()}]"),
            "see code_snippet_1"
        );
    }

    #[test]
    fn supported_versions_parsing() {
        let versions = SupportedVersions::parse("# ingested\nv15.0.0\n\n  v14.2.0 \n");
        assert_eq!(versions.as_slice(), ["v15.0.0".to_string(), "v14.2.0".to_string()]);
        assert!(versions.ensure_supported("v14.2.0").is_ok());
        assert!(matches!(
            versions.ensure_supported("v9"),
            Err(SearchError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn supported_versions_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supported_versions.txt");
        std::fs::write(&path, "v15.0.0\nv14.2.0\n").unwrap();

        let versions = SupportedVersions::load(&path).await.unwrap();
        assert!(versions.contains("v15.0.0"));
        assert!(!versions.contains("v13.0.0"));

        let missing = SupportedVersions::load(dir.path().join("absent.txt")).await;
        assert!(matches!(missing, Err(SearchError::Io(_))));
    }

    async fn memory_search() -> HybridSearch {
        let embedder = Arc::new(StubEmbedder::new(32));
        let config = SearchConfig {
            dense_dim: 32,
            ..SearchConfig::default()
        };
        let corpus = DocumentCorpus::new(vec![CorpusDocument {
            id: Some("layouts".to_string()),
            attributes: DocumentAttributes {
                title: "layouts and templates".to_string(),
                text_content: "layouts and templates code_snippet_1".to_string(),
                code_content: r#"[{"language":"tsx","filename":"app/layout.tsx","switcher":false,"code":"export default function Layout() {}"}]"#.to_string(),
                version: "v15.0.0".to_string(),
                ..DocumentAttributes::default()
            },
        }]);
        let indexed = corpus.index(embedder.as_ref(), &config.fields).await.unwrap();
        HybridSearch::new(Arc::new(InMemoryVectorStore::new(indexed)), embedder, &config)
    }

    #[tokio::test]
    async fn prompt_context_rejects_unknown_versions() {
        let search = memory_search().await;
        let versions = SupportedVersions::parse("v15.0.0");
        let request = PromptRequest {
            version_name: "v13.0.0".to_string(),
            query: "layouts".to_string(),
            file_list: Vec::new(),
            retriever_options: None,
        };
        let err = build_prompt_context(&search, &versions, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn prompt_context_renders_retrieved_chunks() {
        let search = memory_search().await;
        let versions = SupportedVersions::parse("v15.0.0");
        let request = PromptRequest {
            version_name: "v15.0.0".to_string(),
            query: "layouts and templates".to_string(),
            file_list: Vec::new(),
            retriever_options: Some(RetrieverOptions {
                dense_text_weight: Some(0.0),
                dense_code_weight: Some(0.0),
                range_sparse: Some(1.5),
                ..RetrieverOptions::default()
            }),
        };
        let response = build_prompt_context(&search, &versions, &request)
            .await
            .unwrap();

        assert_eq!(response.prompt, "layouts and templates");
        assert_eq!(response.context.len(), 1);
        assert_eq!(response.context[0].id, "layouts");
        assert!(response
            .rendered_context
            .contains("tsx filename=\"app/layout.tsx\"\nexport default function Layout() {}"));
    }
}
