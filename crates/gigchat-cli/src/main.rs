//! gigchat CLI - interactive chat client entry point

use clap::Parser;
use tracing::{error, info};

use gigchat_cli::{app::ChatApp, cli::Cli, config::AppConfig, error::Result};
use gigchat_core::ThreadId;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.example_config {
        print!("{}", AppConfig::example());
        return Ok(());
    }

    // Load configuration and apply command-line overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(server) = &cli.server {
        config.server.url = server.clone();
    }
    if cli.verbose {
        config.cli.verbose = true;
    }

    setup_logging(config.cli.verbose);

    let token = match cli.token.or_else(|| config.chat.token.clone()) {
        Some(token) => token,
        None => {
            error!("No auth token: pass --token or set chat.token in the config file");
            std::process::exit(1);
        }
    };
    let thread = cli
        .thread
        .or(config.chat.default_thread)
        .map(ThreadId::from);

    info!(server = %config.server.url, legacy = cli.legacy, "starting gigchat");
    let app = ChatApp::new(&config, cli.legacy);
    app.run(&token, thread).await?;

    info!("gigchat exited");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
