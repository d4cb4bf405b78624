//! `docqa`: hybrid retrieval over versioned documentation from the command line.
//!
//! Every command writes a single JSON document to stdout. Failures are written
//! as an [`ErrorEnvelope`] and exit with status 1; logs go to stderr.

mod backend;
mod config;

pub use config::{AppConfig, EmbedderSection, MilvusSection, DEFAULT_CONFIG_FILE};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docqa_protocol::{
    request_schemas, serialize_json, ErrorEnvelope, FileAttachment, PromptRequest,
    RetrieverOptions, SearchHit, SearchRequest, SearchResponse, VersionsResponse,
};
use docqa_search::{build_prompt_context, HybridQuery, SearchError, SupportedVersions};
use docqa_vector_store::VectorStoreError;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Hybrid sparse + dense retrieval over versioned documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./docqa.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a hybrid search and print the ranked hits
    Search(SearchArgs),

    /// Retrieve and render documentation context for a question
    Prompt(PromptArgs),

    /// List the documentation versions that can be queried
    Versions(OutputArgs),

    /// Print JSON schemas of the accepted request shapes
    Schema(OutputArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Full search request as JSON (replaces the individual flags)
    #[arg(long, conflicts_with_all = ["version_name", "text", "code"])]
    json: Option<String>,

    /// Documentation version to search
    #[arg(long = "version", required_unless_present = "json")]
    version_name: Option<String>,

    /// Natural-language query
    #[arg(long, default_value = "")]
    text: String,

    /// Code query
    #[arg(long, default_value = "")]
    code: String,

    /// Number of fused results to return
    #[arg(long)]
    top_k: Option<usize>,

    #[arg(long, allow_hyphen_values = true)]
    sparse_weight: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    dense_text_weight: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    dense_code_weight: Option<f32>,

    /// Extra predicate AND-ed with the version scope
    #[arg(long)]
    filter: Option<String>,

    /// Ask the backend to apply the predicate during graph traversal
    #[arg(long)]
    iterative_filter: bool,

    /// Lower similarity bound (exclusive) for every modality
    #[arg(long, allow_hyphen_values = true)]
    radius: Option<f32>,

    /// Upper similarity bound (inclusive) for every modality
    #[arg(long, allow_hyphen_values = true)]
    range: Option<f32>,

    /// Search an in-memory index built from a JSON/JSONL corpus instead of Milvus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct PromptArgs {
    /// Documentation version the question is about
    #[arg(long = "version")]
    version_name: String,

    /// The question; fenced code blocks are searched as code
    #[arg(long)]
    query: String,

    /// Attach a file (repeatable)
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Number of context chunks to retrieve
    #[arg(long)]
    top_k: Option<usize>,

    /// Search an in-memory index built from a JSON/JSONL corpus instead of Milvus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

impl Commands {
    const fn pretty(&self) -> bool {
        match self {
            Self::Search(args) => args.pretty,
            Self::Prompt(args) => args.pretty,
            Self::Versions(args) | Self::Schema(args) => args.pretty,
        }
    }
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let pretty = cli.command.pretty();
    if let Err(err) = run(cli).await {
        log::debug!("Command failed: {err:?}");
        println!("{}", serialize_json(&error_envelope(&err), pretty)?);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Search(args) => run_search(args, &config).await,
        Commands::Prompt(args) => run_prompt(args, &config).await,
        Commands::Versions(args) => {
            let versions = load_versions(&config).await?;
            let response = VersionsResponse {
                versions: versions.as_slice().to_vec(),
            };
            print_json(&response, args.pretty)
        }
        Commands::Schema(args) => print_json(&request_schemas()?, args.pretty),
    }
}

async fn run_search(args: SearchArgs, config: &AppConfig) -> Result<()> {
    let request = search_request(&args)?;
    let query = HybridQuery::from(&request);
    // Reject before touching any backend.
    query.validate()?;

    let search = backend::connect(config, args.corpus.as_deref()).await?;
    let results = search.search(&query).await?;

    let response = SearchResponse {
        results: results.into_iter().map(SearchHit::from).collect(),
    };
    print_json(&response, args.pretty)
}

fn search_request(args: &SearchArgs) -> Result<SearchRequest> {
    if let Some(raw) = &args.json {
        return serde_json::from_str(raw).context("Invalid JSON passed to --json");
    }

    let version = args
        .version_name
        .as_deref()
        .context("--version is required unless --json is given")?;
    let mut request = SearchRequest::new(version);
    request.text_query = args.text.clone();
    request.code_query = args.code.clone();
    if let Some(top_k) = args.top_k {
        request.top_k = top_k;
    }
    if let Some(weight) = args.sparse_weight {
        request.sparse_weight = weight;
    }
    if let Some(weight) = args.dense_text_weight {
        request.dense_text_weight = weight;
    }
    if let Some(weight) = args.dense_code_weight {
        request.dense_code_weight = weight;
    }
    request.filter_expr = args.filter.clone();
    request.iterative_filter = args.iterative_filter;
    if let Some(radius) = args.radius {
        request.radius_sparse = radius;
        request.radius_dense_text = radius;
        request.radius_dense_code = radius;
    }
    if let Some(range) = args.range {
        request.range_sparse = range;
        request.range_dense_text = range;
        request.range_dense_code = range;
    }
    Ok(request)
}

async fn run_prompt(args: PromptArgs, config: &AppConfig) -> Result<()> {
    let versions = load_versions(config).await?;
    versions.ensure_supported(&args.version_name)?;

    let mut file_list = Vec::with_capacity(args.files.len());
    for path in &args.files {
        file_list.push(read_attachment(path).await?);
    }
    let request = PromptRequest {
        version_name: args.version_name,
        query: args.query,
        file_list,
        retriever_options: Some(RetrieverOptions {
            top_k: args.top_k,
            ..RetrieverOptions::default()
        }),
    };

    let search = backend::connect(config, args.corpus.as_deref()).await?;
    let response = build_prompt_context(&search, &versions, &request).await?;
    print_json(&response, args.pretty)
}

async fn read_attachment(path: &Path) -> Result<FileAttachment> {
    let file_content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FileAttachment {
        file_name,
        file_extension,
        file_content,
    })
}

async fn load_versions(config: &AppConfig) -> Result<SupportedVersions> {
    let path = &config.supported_versions_file;
    SupportedVersions::load(path)
        .await
        .with_context(|| format!("Failed to read supported versions from {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    println!("{}", serialize_json(value, pretty)?);
    Ok(())
}

fn error_envelope(err: &anyhow::Error) -> ErrorEnvelope {
    let message = format!("{err:#}");

    if let Some(search_err) = err.chain().find_map(|e| e.downcast_ref::<SearchError>()) {
        let envelope = ErrorEnvelope::new(search_err.code(), message);
        return match search_err {
            SearchError::InvalidArgument(_) => envelope.with_hint(
                "Check the version, top_k and weights; at least one modality weight must be positive",
            ),
            SearchError::Embedding(_) => envelope.with_hint(
                "Check EMBEDDER_URL, or set DOCQA_EMBEDDING_MODE=stub for offline runs",
            ),
            SearchError::Config(_) | SearchError::Io(_) => envelope,
        };
    }

    if err
        .chain()
        .any(|e| e.downcast_ref::<VectorStoreError>().is_some())
    {
        return ErrorEnvelope::new("backend", message)
            .with_hint("Check MILVUS_URI and the collection, or pass --corpus for an offline index");
    }

    ErrorEnvelope::new("internal", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn search_flags_fill_every_modality_threshold() {
        let cli = parse(&[
            "docqa",
            "search",
            "--version",
            "v15.0.0",
            "--text",
            "routing",
            "--dense-code-weight",
            "0",
            "--radius",
            "-1",
            "--range",
            "2",
            "--filter",
            "tag == \"app\"",
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        let request = search_request(&args).unwrap();
        assert_eq!(request.version_name, "v15.0.0");
        assert_eq!(request.text_query, "routing");
        assert_eq!(request.dense_code_weight, 0.0);
        assert_eq!(request.sparse_weight, 1.0);
        assert_eq!(request.radius_dense_text, -1.0);
        assert_eq!(request.range_sparse, 2.0);
        assert_eq!(request.filter_expr.as_deref(), Some("tag == \"app\""));
        assert_eq!(request.top_k, 10);
    }

    #[test]
    fn search_json_replaces_flags() {
        let cli = parse(&[
            "docqa",
            "search",
            "--json",
            r#"{"version_name":"v14.2.0","text_query":"cache","top_k":2}"#,
        ]);
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        let request = search_request(&args).unwrap();
        assert_eq!(request.version_name, "v14.2.0");
        assert_eq!(request.top_k, 2);
    }

    #[test]
    fn search_requires_version_without_json() {
        assert!(Cli::try_parse_from(["docqa", "search", "--text", "q"]).is_err());
    }

    #[test]
    fn envelope_carries_search_error_code() {
        let err = anyhow::Error::new(SearchError::InvalidArgument(
            "all modality weights are zero".to_string(),
        ))
        .context("search failed");
        let envelope = error_envelope(&err);
        assert_eq!(envelope.code, "invalid_argument");
        assert!(envelope.message.contains("all modality weights are zero"));
        assert!(envelope.hint.is_some());

        let other = error_envelope(&anyhow::anyhow!("boom"));
        assert_eq!(other.code, "internal");
    }
}
