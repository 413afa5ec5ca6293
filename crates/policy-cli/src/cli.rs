use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments for the policy assistant
#[derive(Debug, Parser)]
#[command(name = "policy", version, about = "Answer questions about policy documents")]
pub struct Cli {
    /// TOML configuration file, overridden by environment variables
    #[arg(short, long, global = true, env = "POLICY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to bind, overriding the configured one
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ingest every document in the documents directory
    Ingest {
        /// Use the local embedding model and the local collection
        #[arg(long)]
        local: bool,
        /// Directory to scan instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Ask a single question and stream the answer to stdout
    Ask {
        /// The question
        query: String,
        /// Use the local embedding model and the local collection
        #[arg(long)]
        local: bool,
        /// Only print the retrieved context, skip generation
        #[arg(long)]
        dry_run: bool,
    },
}

/// Which embedding variant a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Gemini embeddings, base collection
    Cloud,
    /// In-process model, `_local` collection
    Local,
}

impl Variant {
    /// Maps the `--local` flag to a variant.
    pub const fn from_flag(local: bool) -> Self {
        if local { Self::Local } else { Self::Cloud }
    }
}
