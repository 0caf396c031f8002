mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "seek-execd")]
#[command(about = "Sandboxed multi-language code execution service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP gateway (default if no subcommand provided)
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Execute a local source file once and print the result as JSON
    Run {
        /// Path to the source file
        file: PathBuf,

        /// Language id or alias (python, js, cpp, ...)
        #[arg(short, long)]
        language: String,

        /// Payload piped to the program's stdin
        #[arg(long)]
        stdin: Option<String>,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// List supported language ids
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        host: "127.0.0.1".to_string(),
        port: 8080,
        verbose: false,
    }) {
        Commands::Serve {
            host,
            port,
            verbose,
        } => commands::serve(&host, port, verbose).await,
        Commands::Run {
            file,
            language,
            stdin,
            verbose,
        } => commands::run_once(&file, &language, stdin, verbose).await,
        Commands::Languages => commands::languages(),
    }
}
