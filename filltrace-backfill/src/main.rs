use anyhow::{Context, Result};
use clap::Parser;
use filltrace_core::{
    validation::{parse_commitment, BackfillConfig},
    DiscriminatorTable, EventDecoder, FetchPipeline, RpcLedgerClient,
};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Filltrace Backfill - Recover an account's historical fills and fees
#[derive(Parser)]
#[command(name = "filltrace-backfill")]
#[command(about = "Backfill decoded trade and fee events for a Solana account", long_about = None)]
struct Cli {
    /// Solana RPC URL
    #[arg(short, long, env = "RPC_URL", default_value = "https://api.mainnet-beta.solana.com")]
    rpc_url: String,

    /// Account whose history is walked
    #[arg(short, long, env = "ACCOUNT")]
    account: String,

    /// Only decode data emitted by this program
    #[arg(short, long, env = "PROGRAM_ID")]
    program_id: Option<String>,

    /// Instrument label stamped on every event
    #[arg(short, long, env = "INSTRUMENT", default_value = "SOL-PERP")]
    instrument: String,

    /// Exclusive lower bound for a plausible fill price
    #[arg(long, default_value = "1")]
    price_lower: Decimal,

    /// Exclusive upper bound for a plausible fill price
    #[arg(long, default_value = "5000")]
    price_upper: Decimal,

    /// Signatures requested per page
    #[arg(long, default_value = "100")]
    page_size: usize,

    /// Delay between transaction requests (milliseconds)
    #[arg(long, default_value = "200")]
    request_delay: u64,

    /// Delay between signature pages (milliseconds)
    #[arg(long, default_value = "1000")]
    page_delay: u64,

    /// Maximum retries for a rate-limited call
    #[arg(long, default_value = "5")]
    max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[arg(long, default_value = "500")]
    base_delay: u64,

    /// Upper bound for a single retry delay (milliseconds)
    #[arg(long, default_value = "30000")]
    max_delay: u64,

    /// Commitment level (processed, confirmed, finalized)
    #[arg(short, long, default_value = "confirmed")]
    commitment: String,

    /// Stop after this many signatures
    #[arg(long)]
    max_signatures: Option<u64>,

    /// JSON file with discriminator layout overrides
    #[arg(long, env = "LAYOUT_FILE")]
    layout_file: Option<String>,

    /// Output file for decoded events
    #[arg(short, long, default_value = "events.json")]
    output: String,

    /// Optional output file for the run report
    #[arg(long)]
    report: Option<String>,

    /// Write events oldest first instead of in discovery order
    #[arg(long)]
    chronological: bool,
}

impl Cli {
    fn backfill_config(&self) -> BackfillConfig {
        BackfillConfig {
            rpc_url: self.rpc_url.clone(),
            account: self.account.clone(),
            program_id: self.program_id.clone(),
            instrument: self.instrument.clone(),
            price_lower: self.price_lower,
            price_upper: self.price_upper,
            page_size: self.page_size,
            request_delay_ms: self.request_delay,
            page_delay_ms: self.page_delay,
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay,
            max_delay_ms: self.max_delay,
            commitment: self.commitment.clone(),
            max_signatures: self.max_signatures,
            layout_file: self.layout_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    run_backfill(cli).await?;

    Ok(())
}

async fn run_backfill(cli: Cli) -> Result<()> {
    let config = cli.backfill_config();
    config.validate()?;

    info!("Starting Filltrace Backfill");
    info!("RPC URL: {}", config.rpc_url);
    info!("Account: {}", config.account);
    if let Some(program_id) = &config.program_id {
        info!("Program filter: {}", program_id);
    }
    info!(
        "Instrument: {} (price band {} - {})",
        config.instrument, config.price_lower, config.price_upper
    );

    let mut table = DiscriminatorTable::builtin();
    if let Some(layout_file) = &config.layout_file {
        let applied = table
            .load_from_file(layout_file)
            .with_context(|| format!("Failed to load layout overrides from {}", layout_file))?;
        info!("Applied {} layout overrides from {}", applied, layout_file);
    }

    let commitment = parse_commitment(&config.commitment)?;
    let client = RpcLedgerClient::new(&config.rpc_url, commitment);
    let decoder = EventDecoder::new(table, config.decoder_config());
    let pipeline = FetchPipeline::new(client, decoder, config.pipeline_config()?);

    let mut output = pipeline.run().await.context("Backfill failed")?;

    if cli.chronological {
        output.sink.reorder_chronological();
    }

    output
        .sink
        .write_json_file(&cli.output)
        .with_context(|| format!("Failed to write output file {}", cli.output))?;
    info!("Wrote {} events to {}", output.sink.len(), cli.output);

    if let Some(report_path) = &cli.report {
        let file = File::create(report_path)
            .with_context(|| format!("Failed to create report file {}", report_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &output.report)?;
        writer.flush()?;
        info!("Wrote run report to {}", report_path);
    }

    if !output.report.complete {
        warn!("Backfill stopped before the end of the account's history");
    }

    info!("Backfill complete!");

    Ok(())
}
