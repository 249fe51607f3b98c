//! Command-line interface definitions and parsing

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive chat client for the gigchat real-time server", long_about = None)]
pub struct Cli {
    /// Chat server WebSocket URL (overrides the config file)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Auth token sent in the connection handshake
    #[arg(short, long)]
    pub token: Option<String>,

    /// Thread to join on startup
    #[arg(long)]
    pub thread: Option<i64>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use the legacy envelope-protocol client instead of the primary one
    #[arg(long)]
    pub legacy: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    pub example_config: bool,
}
