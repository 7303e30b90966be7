//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "civicqa",
    version,
    about = "Retrieval-augmented question answering over government program documentation",
    long_about = "Civicqa answers questions about a documented government program by combining \
                  embedding-based similarity search with keyword search over a curated corpus, \
                  reranking the candidates, and building query-type-aware prompts for an external \
                  generation model."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/civicqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question against the corpus
    Query {
        /// Question text
        question: String,

        /// Number of context results to retrieve (0 uses the configured default)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,

        /// Disable the keyword pass (vector-only retrieval)
        #[arg(long)]
        no_hybrid: bool,

        /// Disable second-pass reranking
        #[arg(long)]
        no_rerank: bool,

        /// Use the generic prompt template instead of query-type templates
        #[arg(long)]
        basic_prompts: bool,

        /// Caller session identifier (does not affect caching)
        #[arg(long)]
        session: Option<String>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop sharing one cache session
    Shell,

    /// Ingest a batch file of chunks and facts into the corpus
    Ingest {
        /// Path to a JSON batch file ({"chunks": [...], "facts": [...]})
        file: PathBuf,

        /// Merge into the existing corpus instead of replacing it
        #[arg(long)]
        merge: bool,
    },

    /// List the current structured facts
    Facts {
        /// Show only facts in this category
        #[arg(short = 'C', long)]
        category: Option<String>,
    },

    /// Show corpus statistics
    Status,

    /// Show aggregate feedback statistics
    Feedback,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
