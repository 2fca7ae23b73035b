use clap::{Parser, Subcommand};
use tracing::info;

use request_recovery::{bootstrap, config::Settings, logging::init_tracing};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Recovers stuck oracle requests: scan for unfulfilled requests, then fulfill the profitable ones"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan START_BLOCK..END_BLOCK and journal unfulfilled requests
    Scan,
    /// Fulfill journaled requests that are worth the gas
    Submit,
    /// Print the aggregated price of a pair
    Price {
        /// Base symbol, e.g. link
        from: String,
        /// Quote symbol
        #[arg(default_value = "usd")]
        to: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    dotenv::dotenv().ok();
    let settings = Settings::from_env()?;

    init_tracing(&settings.log_file())?;

    match cli.command {
        Command::Scan => {
            info!("🚀 Starting request scan");
            let report = bootstrap::run_scan(&settings).await?;
            info!(
                "🏁 Scanned blocks {}..{}: {} pending requests journaled",
                report.from_block, report.to_block, report.pending
            );
        }
        Command::Submit => {
            info!("🚀 Starting request submission");
            let report = bootstrap::run_submit(&settings).await?;
            info!(
                "🏁 {} of {} journaled requests fulfilled ({} awaiting confirmation), {} left for a later pass",
                report.fulfilled + report.reverted + report.unconfirmed,
                report.total,
                report.unconfirmed,
                report.failed
            );
        }
        Command::Price { from, to } => {
            let price = bootstrap::run_price(&settings, &from, &to).await?;
            println!(
                "{}/{} = {} at {} ({})",
                price.from.to_uppercase(),
                price.to.to_uppercase(),
                price.value,
                price.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                price.contributing_sources.join(", ")
            );
        }
    }

    Ok(())
}
