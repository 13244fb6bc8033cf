use anyhow::Result;
use clap::Parser;
use delivery_eta::{config::AppConfig, train};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Fits the delivery-duration forest and writes model + baseline stats")]
struct Args {
    /// JSON config file (otherwise DELIVERY_CONFIG or defaults)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of trees, overriding the config
    #[arg(long)]
    trees: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(p) => AppConfig::load(p)?,
        None => AppConfig::from_env()?,
    };
    if let Some(n) = args.trees {
        cfg.forest.n_trees = n;
    }

    let outcome = train::train_from_config(&cfg)?;
    tracing::info!(
        "done: {} train / {} test rows, MAE ±{:.2} mins",
        outcome.n_train,
        outcome.n_test,
        outcome.mae
    );
    Ok(())
}
