//! imgveil CLI
//!
//! Downloads a protected image from an imgveil server, decrypting and
//! reassembling it locally.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sha2::{Digest, Sha256};
use tracing::info;

use imgveil_cli::DeliveryClient;
use imgveil_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "imgveil")]
#[command(version, about = "Fetch and decrypt an image from an imgveil server", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "IMGVEIL_SERVER", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Write the decrypted image here
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("imgveil_cli=warn", cli.log_json);

    let client = DeliveryClient::new(&cli.server, Duration::from_secs(cli.timeout_secs))?;
    let image = client.download().await?;

    if let Some(path) = &cli.out {
        tokio::fs::write(path, &image).await?;
        info!(path = %path.display(), bytes = image.len(), "Image written");
    }

    let mut out = io::stdout();
    writeln!(out, "bytes:  {}", image.len())?;
    writeln!(out, "sha256: {}", hex::encode(Sha256::digest(&image)))?;
    if let Some(path) = &cli.out {
        writeln!(out, "saved:  {}", path.display())?;
    }
    Ok(())
}
