use anyhow::Result;
use clap::Parser;
use delivery_eta::{config::AppConfig, generator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Generates the synthetic Berlin delivery corpus")]
struct Args {
    /// Number of trips to generate
    #[arg(short, long, default_value_t = 50_000)]
    rows: usize,
    /// Output CSV (defaults to data_path from the config)
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Seed for a reproducible corpus
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let out = match args.out {
        Some(p) => p,
        None => AppConfig::from_env()?.data_path,
    };

    tracing::info!("generating {} rows of Berlin delivery data", args.rows);
    let mut trips_gen = generator::TripGenerator::berlin(args.seed)?;
    let trips = trips_gen.generate(args.rows);
    generator::write_corpus(&out, &trips)?;
    tracing::info!("wrote {} rows to {}", trips.len(), out.display());
    Ok(())
}
