use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge_search::embedding::{EmbeddingProvider, RemoteEmbeddingClient};
use knowledge_search::knowledge::{aliases, load_records};
use knowledge_search::search::vector::{embedding_text, write_vector_index};
use knowledge_search::{
    Config, KnowledgeClient, KnowledgeIndex, ProviderKind, Resolution, SearchError,
};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT_HASH"),
    "\nbuilt: ",
    env!("BUILD_TIMESTAMP"),
    "\nbm25 backend: ",
    env!("BM25_BACKEND"),
);

#[derive(Parser)]
#[command(name = "knowledge-search")]
#[command(about = "Search and resolve symbols in a ranked knowledge index")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Path to config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge index file, overriding the configured one
    #[arg(short, long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the index
    Search {
        /// Search query
        query: String,
        /// Provider: keyword, bm25, vector or hybrid
        #[arg(short, long)]
        provider: Option<ProviderKind>,
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Results per page
        #[arg(long)]
        page_size: Option<usize>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a dotted name to the indexed symbol that defines it
    Resolve {
        /// Fully-qualified name, possibly naming a nested member
        fqn: String,
    },

    /// Validate alias declarations in the index source
    CheckAliases,

    /// Embed every indexed item and write the vector index files
    EmbedIndex {
        /// Output directory (default: configured vector index dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(index) = &cli.index {
        config.index.path = index.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Report bad input or configuration as a plain message with exit code 2
fn exit_on_user_error<T>(result: Result<T, SearchError>) -> Result<T> {
    match result {
        Err(e) if e.is_user_error() => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
        other => Ok(other?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Results go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("knowledge_search=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Search {
            query,
            provider,
            page,
            page_size,
            json,
        } => {
            if let Some(kind) = provider {
                config.search.provider = kind;
            }
            let client = exit_on_user_error(KnowledgeClient::with_config(config).await)?;
            let hits = exit_on_user_error(client.search(&query, page, page_size).await)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No items found");
            } else {
                let offset = (page - 1) * page_size.unwrap_or(client.config().search.page_size);
                for (i, hit) in hits.iter().enumerate() {
                    println!("{}. {} ({:.3})", offset + i + 1, hit.item.id, hit.score);
                    if let Some(summary) = hit.item.summary() {
                        println!("   {}", summary);
                    }
                }
            }
        }

        Command::Resolve { fqn } => {
            // Resolution never needs a search provider
            config.search.provider = ProviderKind::Keyword;
            let client = KnowledgeClient::with_config(config).await?;
            match client.resolve(&fqn).await {
                Resolution::Found { item, member_path } => {
                    println!("{}", serde_yaml::to_string(item.as_ref())?);
                    if let Some(member) = member_path {
                        println!("member: {}", member);
                    }
                }
                Resolution::NotFound => println!("Symbol not found"),
            }
        }

        Command::CheckAliases => {
            let records = load_records(&config.index.path)?;
            let issues = aliases::validate_aliases(&records);
            if issues.is_empty() {
                println!("All aliases valid ({} records checked)", records.len());
            } else {
                for issue in &issues {
                    println!("{}", issue);
                }
                anyhow::bail!("{} alias issue(s) found", issues.len());
            }
        }

        Command::EmbedIndex { output } => {
            let index = KnowledgeIndex::load(&config.index.path)?;
            let output = output.unwrap_or_else(|| config.embedding.vector_index_dir.clone());
            let client = RemoteEmbeddingClient::from_config(&config.embedding)?;

            let mut vectors = Vec::with_capacity(index.len());
            for batch in index.items().chunks(config.embedding.batch_size) {
                let texts = batch.iter().map(|item| embedding_text(item)).collect();
                vectors.extend(client.embed_batch(texts).await?);
                tracing::info!("Embedded {}/{} items", vectors.len(), index.len());
            }

            write_vector_index(&output, index.items(), &vectors)?;
            println!(
                "Wrote {} vectors ({}) to {}",
                vectors.len(),
                client.model_name(),
                output.display()
            );
        }
    }

    Ok(())
}
