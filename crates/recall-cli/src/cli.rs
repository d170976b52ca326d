use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleArg {
    User,
    Assistant,
}

#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(version, about = "Inspect and maintain conversational memory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "RECALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the conversation records (defaults to the platform data dir)
    #[arg(long, global = true, env = "RECALL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a turn to memory
    Add {
        text: String,

        #[arg(short, long, value_enum, default_value = "user")]
        role: RoleArg,
    },

    /// Show the most recent turns
    Recent {
        #[arg(default_value_t = 10, allow_negative_numbers = true)]
        count: i64,
    },

    /// Rank stored turns by relevance to a query
    Search {
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Show the context that would be sent for a query
    Context { query: String },

    /// Empty short-term memory, keeping summaries
    Clear,

    /// Fold turns older than the recent window into summaries
    Summarize,

    /// List long-term summaries
    Summaries,

    /// Show memory statistics
    Stats,

    /// Print the effective configuration as YAML
    Config,
}

impl Commands {
    /// Whether the command changes memory and must be saved afterwards.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Add { .. } | Commands::Clear | Commands::Summarize
        )
    }
}
