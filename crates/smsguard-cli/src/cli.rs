use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smsguard")]
#[command(author, version, about = "Score SMS messages for fraud and spam risk")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a batch of messages
    Score {
        /// Provider configuration file
        #[arg(short, long, env = "SMSGUARD_CONFIG", default_value = "smsguard.yaml")]
        config: PathBuf,

        /// JSON array of `{"message": ...}` records
        #[arg(short, long)]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the live subprocess limit
        #[arg(long)]
        max_processes: Option<usize>,

        /// Override the concurrent message limit
        #[arg(long)]
        max_messages: Option<usize>,

        /// Append per-provider scores to explanations
        #[arg(long)]
        breakdown: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a provider configuration and list its providers
    CheckConfig {
        /// Provider configuration file
        #[arg(short, long, env = "SMSGUARD_CONFIG", default_value = "smsguard.yaml")]
        config: PathBuf,
    },
}
