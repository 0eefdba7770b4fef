mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use docdex_core::{EmbeddingProvider, Engine, EngineConfig, SearchMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docdex")]
#[command(about = "Index documentation and search it", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, global = true, env = "DOCDEX_PROVIDER", value_enum)]
    provider: Option<ProviderArg>,

    /// Embedding service URL
    #[arg(long, global = true, env = "DOCDEX_ENDPOINT")]
    endpoint: Option<String>,

    /// Embedding model name
    #[arg(long, global = true, env = "DOCDEX_MODEL")]
    model: Option<String>,

    /// Log debug output (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a document
    Add {
        #[arg(long)]
        title: String,

        #[arg(long)]
        library: String,

        /// Document text
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the document text from a file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Explicit document ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        summary: Option<String>,
    },

    /// Show a document
    Get {
        doc_id: String,

        /// Also print its chunks
        #[arg(long)]
        chunks: bool,

        #[arg(long)]
        json: bool,
    },

    /// Change fields of a document; new content is re-embedded
    Update {
        doc_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        library: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        summary: Option<String>,

        /// Remove the category
        #[arg(long, conflicts_with = "category")]
        clear_category: bool,

        /// Remove the summary
        #[arg(long, conflicts_with = "summary")]
        clear_summary: bool,
    },

    /// Delete a document and its chunks
    Delete { doc_id: String },

    /// List documents
    List {
        /// Filter by library
        #[arg(long)]
        library: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Search documents
    Query {
        /// Search query
        query: String,

        #[arg(long, value_enum, default_value = "hybrid")]
        mode: ModeArg,

        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Recompute chunks and embeddings
    Rebuild {
        /// Documents to rebuild (all when omitted)
        doc_ids: Vec<String>,

        /// Concurrent documents
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show statistics
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Http,
    Hashing,
}

impl From<ProviderArg> for EmbeddingProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Http => EmbeddingProvider::Http,
            ProviderArg::Hashing => EmbeddingProvider::Hashing,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Vector,
    Keyword,
    Hybrid,
}

impl From<ModeArg> for SearchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Vector => SearchMode::Vector,
            ModeArg::Keyword => SearchMode::Keyword,
            ModeArg::Hybrid => SearchMode::Hybrid,
        }
    }
}

fn get_data_dir(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(|| {
        dirs::data_dir()
            .map(|p| p.join("docdex"))
            .unwrap_or_else(|| PathBuf::from(".docdex"))
    })
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(if verbose { "debug" } else { "warn" })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let data_dir = get_data_dir(cli.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    let mut config = EngineConfig::load(&data_dir)?;
    if let Some(provider) = cli.provider {
        config.embedding.provider = provider.into();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.embedding.endpoint = endpoint.clone();
    }
    if let Some(model) = &cli.model {
        config.embedding.model = model.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(&cli)?;
    if let Commands::Rebuild {
        workers: Some(workers),
        ..
    } = &cli.command
    {
        config.rebuild.workers = *workers;
    }

    tracing::debug!(
        data_dir = %config.data_dir.display(),
        provider = ?config.embedding.provider,
        model = %config.embedding.model,
        "Loaded configuration"
    );

    let engine = Engine::open(config)?;

    match cli.command {
        Commands::Add {
            title,
            library,
            content,
            file,
            id,
            category,
            summary,
        } => {
            let content = commands::read_content(content, file.as_deref())?.unwrap_or_default();
            commands::add::run(&engine, title, library, content, id, category, summary).await?;
        }
        Commands::Get {
            doc_id,
            chunks,
            json,
        } => {
            commands::get::run(&engine, &doc_id, chunks, json)?;
        }
        Commands::Update {
            doc_id,
            title,
            content,
            file,
            library,
            category,
            summary,
            clear_category,
            clear_summary,
        } => {
            let update = docdex_core::DocumentUpdate {
                title,
                content: commands::read_content(content, file.as_deref())?,
                library,
                category: commands::patch_field(category, clear_category),
                summary: commands::patch_field(summary, clear_summary),
            };
            commands::update::run(&engine, &doc_id, update).await?;
        }
        Commands::Delete { doc_id } => {
            commands::delete::run(&engine, &doc_id).await?;
        }
        Commands::List { library, json } => {
            commands::list::run(&engine, library.as_deref(), json)?;
        }
        Commands::Query {
            query,
            mode,
            top_k,
            json,
        } => {
            commands::query::run(&engine, &query, mode.into(), top_k, json).await?;
        }
        Commands::Rebuild { doc_ids, .. } => {
            let doc_ids = if doc_ids.is_empty() { None } else { Some(doc_ids) };
            commands::rebuild::run(&engine, doc_ids).await?;
        }
        Commands::Stats => {
            commands::stats::run(&engine)?;
        }
    }

    Ok(())
}
