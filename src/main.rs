use clap::{Parser, Subcommand};
use comfy_table::Table;
use engine::{parse_amount, OrderStore, SwapManager};
use std::path::PathBuf;
use std::sync::Arc;

/// The main entry point for the Swapdesk swap service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Gateway credentials usually live in .env; it is fine for it to be absent.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();
    let config = configuration::load_config(&cli.config)?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Serve => web_server::serve(config).await,
        Commands::Quote(args) => handle_quote(args, config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An account-less crypto swap service.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and the background reconciliation loop.
    Serve,
    /// Print a one-off quote for a swap.
    Quote(QuoteArgs),
}

#[derive(Parser)]
struct QuoteArgs {
    /// The asset to send (e.g., "BTC").
    #[arg(long)]
    from: String,

    /// The asset to receive (e.g., "USDT").
    #[arg(long)]
    to: String,

    /// The amount of `from` to send.
    #[arg(long)]
    amount: String,
}

// ==============================================================================
// Quote Command Logic
// ==============================================================================

async fn handle_quote(args: QuoteArgs, config: configuration::Config) -> anyhow::Result<()> {
    let amount = parse_amount(&args.amount)?;
    let (gateway, _) = web_server::build_gateway(&config)?;
    let manager = SwapManager::new(Arc::new(OrderStore::new()), gateway, &config.swap);

    let quote = manager.quote(&args.from, &args.to, amount).await?;

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Send".to_string(), format!("{} {}", quote.source_amount, quote.source_asset)]);
    table.add_row(vec!["Receive".to_string(), format!("{} {}", quote.dest_amount, quote.dest_asset)]);
    table.add_row(vec!["Fee".to_string(), format!("{} {}", quote.fee, quote.dest_asset)]);
    table.add_row(vec![
        "Market".to_string(),
        format!(
            "{} @ {}{}",
            quote.pair,
            quote.rate,
            if quote.inverted { " (reverse)" } else { "" }
        ),
    ]);
    println!("{table}");

    Ok(())
}
