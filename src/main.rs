use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use civicqa::cache::{EmbeddingCache, QueryCache};
use civicqa::cli::{Cli, Commands, ConfigAction};
use civicqa::config::Config;
use civicqa::corpus::{CorpusStore, IngestBatch};
use civicqa::embedding::{Embedder, HashEmbedder, HttpEmbedder};
use civicqa::error::{CivicQaError, Result};
use civicqa::feedback::FeedbackStore;
use civicqa::generation::{Generator, HttpGenerator};
use civicqa::retry::RetryPolicy;
use civicqa::synthesis::{AnswerSynthesizer, QueryRequest, QueryResponse};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Query {
            question,
            limit,
            no_hybrid,
            no_rerank,
            basic_prompts,
            session,
            json,
        } => {
            let mut request = QueryRequest::new(question, limit);
            request.use_hybrid_search = !no_hybrid;
            request.use_reranking = !no_rerank;
            request.use_enhanced_prompts = !basic_prompts;
            request.session_id = session;
            cmd_query(cli.config, &request, json)
        }
        Commands::Shell => cmd_shell(cli.config),
        Commands::Ingest { file, merge } => cmd_ingest(cli.config, &file, merge),
        Commands::Facts { category } => cmd_facts(cli.config, category),
        Commands::Status => cmd_status(cli.config),
        Commands::Feedback => cmd_feedback(cli.config),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "civicqa=debug" } else { "civicqa=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

/// Everything a query session needs, built once at startup
struct Pipeline {
    synthesizer: AnswerSynthesizer,
    embedding_cache: Arc<EmbeddingCache>,
    query_cache: Arc<QueryCache>,
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let data_dir = expand_path(&config.corpus.data_dir)?;
    let corpus = Arc::new(CorpusStore::new(config.corpus.max_chunk_chars));
    let stats = corpus.load(&data_dir)?;
    tracing::info!(
        chunks = stats.chunks,
        facts = stats.facts,
        "Corpus loaded from {:?}",
        data_dir
    );

    let embedding_cache = Arc::new(EmbeddingCache::new(config.cache.embedding_capacity));
    let query_cache = Arc::new(QueryCache::new(config.cache.query_capacity));

    let synthesizer = AnswerSynthesizer::new(
        corpus,
        build_embedder(config)?,
        build_generator(config)?,
        embedding_cache.clone(),
        query_cache.clone(),
        config.retrieval.clone(),
        config.program.clone(),
    );

    Ok(Pipeline {
        synthesizer,
        embedding_cache,
        query_cache,
    })
}

/// Select the embedder implementation at composition time
fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    if config.embedding.mode == "online" {
        let api_key = std::env::var(&config.embedding.api_key_env).map_err(|_| {
            CivicQaError::Config(format!(
                "Environment variable {} is not set",
                config.embedding.api_key_env
            ))
        })?;

        let embedder = HttpEmbedder::new(
            &config.embedding.endpoint,
            &config.embedding.model,
            config.embedding.dimension,
            api_key,
            Duration::from_secs(config.embedding.timeout_secs),
            RetryPolicy::from_config(&config.retry),
        )
        .map_err(|e| CivicQaError::Config(e.to_string()))?;

        Ok(Arc::new(embedder))
    } else {
        Ok(Arc::new(HashEmbedder::new(config.embedding.dimension)))
    }
}

fn build_generator(config: &Config) -> Result<Option<Arc<dyn Generator>>> {
    if !config.generation.enabled {
        return Ok(None);
    }

    let api_key = std::env::var(&config.generation.api_key_env).map_err(|_| {
        CivicQaError::Config(format!(
            "Environment variable {} is not set",
            config.generation.api_key_env
        ))
    })?;

    let generator = HttpGenerator::new(
        &config.generation,
        api_key,
        RetryPolicy::from_config(&config.retry),
    )
    .map_err(|e| CivicQaError::Config(e.to_string()))?;

    Ok(Some(Arc::new(generator)))
}

fn cmd_query(config_path: Option<PathBuf>, request: &QueryRequest, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;

    let runtime = build_runtime()?;
    let response = runtime.block_on(pipeline.synthesizer.answer(request))?;

    if json {
        let rendered = serde_json::to_string_pretty(&response).map_err(|e| CivicQaError::Json {
            source: e,
            context: "Failed to serialize response".to_string(),
        })?;
        println!("{}", rendered);
    } else {
        print_response(&response);
    }

    Ok(())
}

fn cmd_shell(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let pipeline = build_pipeline(&config)?;
    let runtime = build_runtime()?;

    println!("civicqa interactive shell");
    println!("  /stats  - cache statistics");
    println!("  /clear  - clear both caches");
    println!("  /quit   - exit");
    println!();

    loop {
        print!("civicqa> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/stats" => {
                let embedding = pipeline.embedding_cache.stats();
                let query = pipeline.query_cache.stats();
                println!(
                    "Embedding cache: {}/{} entries, {} hits, {} misses",
                    embedding.entries, embedding.capacity, embedding.hits, embedding.misses
                );
                println!(
                    "Query cache:     {}/{} entries, {} hits, {} misses",
                    query.entries, query.capacity, query.hits, query.misses
                );
            }
            "/clear" => {
                pipeline.embedding_cache.clear();
                pipeline.query_cache.clear();
                println!("Caches cleared");
            }
            question => {
                let request = QueryRequest::new(question, 0);
                match runtime.block_on(pipeline.synthesizer.answer(&request)) {
                    Ok(response) => print_response(&response),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
    }

    Ok(())
}

fn cmd_ingest(config_path: Option<PathBuf>, file: &Path, merge: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.corpus.data_dir)?;

    let content = std::fs::read_to_string(file).map_err(|e| CivicQaError::Io {
        source: e,
        context: format!("Failed to read batch file: {:?}", file),
    })?;
    let batch: IngestBatch = serde_json::from_str(&content).map_err(|e| CivicQaError::Json {
        source: e,
        context: format!("Failed to parse batch file: {:?}", file),
    })?;

    let store = CorpusStore::new(config.corpus.max_chunk_chars);
    let stats = if merge {
        store.load(&data_dir)?;
        store.merge(batch)
    } else {
        store.replace(batch)
    };
    store.save(&data_dir)?;

    println!(
        "Corpus {}: {} chunks ({} embedded), {} facts",
        if merge { "merged" } else { "replaced" },
        stats.chunks,
        stats.chunks_with_embedding,
        stats.facts
    );

    Ok(())
}

fn cmd_facts(config_path: Option<PathBuf>, category: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.corpus.data_dir)?;

    let store = CorpusStore::new(config.corpus.max_chunk_chars);
    store.load(&data_dir)?;
    let snapshot = store.snapshot();

    let facts: Vec<_> = match &category {
        Some(category) => snapshot.facts_by_category(category).collect(),
        None => snapshot.facts().iter().collect(),
    };

    if facts.is_empty() {
        println!("No structured facts found");
        return Ok(());
    }

    for fact in facts {
        println!(
            "[{}] {} = {} (source: {}, updated: {})",
            fact.category,
            fact.key,
            fact.value,
            fact.source,
            fact.last_updated.format("%Y-%m-%d")
        );
    }

    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.corpus.data_dir)?;

    let store = CorpusStore::new(config.corpus.max_chunk_chars);
    let stats = store.load(&data_dir)?;

    println!("Civicqa Status");
    println!("==============");
    println!("\nProgram: {} ({})", config.program.full_name, config.program.name);
    println!("Data directory: {}", data_dir.display());
    println!("\nCorpus:");
    println!("  Chunks: {} ({} embedded)", stats.chunks, stats.chunks_with_embedding);
    println!("  Facts: {}", stats.facts);
    match stats.embedding_dimension {
        Some(dim) => println!("  Embedding dimension: {}", dim),
        None => println!("  Embedding dimension: none (keyword search only)"),
    }
    println!("\nEmbedding mode: {}", config.embedding.mode);
    println!(
        "Generation: {}",
        if config.generation.enabled {
            config.generation.model.as_str()
        } else {
            "disabled (templated fallback answers)"
        }
    );

    Ok(())
}

fn cmd_feedback(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.corpus.data_dir)?;

    let stats = FeedbackStore::new(&data_dir).stats()?;

    println!("Feedback: {} total", stats.total);
    println!("  Thumbs up:   {}", stats.thumbs_up);
    println!("  Thumbs down: {}", stats.thumbs_down);
    match stats.average_rating {
        Some(avg) => println!("  Average rating: {:.1}", avg),
        None => println!("  Average rating: n/a"),
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| CivicQaError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = file.unwrap_or(Config::default_path()?);
            let config = Config::load(&path)?;
            println!("Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path()?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CivicQaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'civicqa config init' to create one."
        );
        return Ok(Config::default());
    }

    Config::load(&path)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| CivicQaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

fn print_response(response: &QueryResponse) {
    println!("\n{}\n", response.answer);

    if !response.sources_used.is_empty() {
        println!("Sources: {}", response.sources_used.join(", "));
    }
    println!(
        "Method: {} | Type: {} | Format: {} | Cached: {}",
        response.search_method, response.query_type, response.response_format, response.cached
    );
    if !response.retrieved_chunk_ids.is_empty() {
        println!("Chunks: {}", response.retrieved_chunk_ids.join(", "));
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CivicQaError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CivicQaError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
