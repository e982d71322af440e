//! research-agent entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use research_agent::config::Settings;
use research_agent::{web, GroqProvider};

#[derive(Parser)]
#[command(name = "research-agent", version, about = "Chat with a research agent backed by Groq")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the chat page (default)
    Serve,

    /// Ask a single question in the terminal
    Ask {
        question: String,

        #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
        api_key: String,
    },
}

/// Filter level for the `-v` count.
fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = log_level(cli.verbose);

    tracing_subscriber::registry()
        .with(EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            format!("research_agent={level},tower_http={level}")
        })))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => web::serve(cli.settings).await?,

        Commands::Ask { question, api_key } => {
            let settings = cli.settings;
            let provider =
                GroqProvider::with_base_url(&settings.base_url, &api_key, &settings.model)?;
            let output = settings
                .answer(Box::new(provider), &question)
                .await
                .context("agent run failed")?;

            println!("{}", output.answer);
            if output.used_tools {
                eprintln!("(local documentation consulted)");
            }
        }
    }

    Ok(())
}
