use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use scandrop::common::{load_config, AppConfig};
use scandrop::reports::ReportsClient;
use scandrop::upload::{StatusSnapshot, UploadClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scandrop")]
#[command(about = "Stream scan images to the analysis service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an image and wait for the server's verdict
    Upload {
        #[arg(help = "Path to the image to upload")]
        file: PathBuf,
    },
    /// List generated reports
    Reports,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config()?;

    match cli.command {
        Commands::Upload { file } => {
            // Check for the file before spinning up a connection
            if !file.exists() {
                eprintln!("Error: File not found: {}", file.display());
                std::process::exit(1);
            }
            run_upload(config, &file).await
        }
        Commands::Reports => run_reports(config).await,
    }
}

async fn run_upload(config: AppConfig, file: &Path) -> Result<()> {
    let client = UploadClient::new(config);

    // Mirror tracker updates to the terminal while the upload runs.
    let mut updates = client.tracker().subscribe();
    let display = tokio::spawn(async move {
        let mut last = StatusSnapshot::default();
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow().clone();
            if snapshot == last {
                continue;
            }
            match &snapshot.message {
                Some(message) => {
                    println!("[{:?}] {}% {}", snapshot.phase, snapshot.progress, message)
                }
                None => println!("[{:?}] {}%", snapshot.phase, snapshot.progress),
            }
            last = snapshot;
        }
    });

    let outcome = client.upload(file).await;
    display.abort();

    let view = client.history().view();
    if !view.entries.is_empty() {
        println!("Message history:");
        for entry in &view.entries {
            let ago = entry
                .received_at
                .elapsed()
                .map(|d| d.as_secs())
                .unwrap_or(0);
            println!("  {} ({}s ago)", entry.text, ago);
        }
        if view.earlier > 0 {
            println!("  + {} earlier messages", view.earlier);
        }
    }

    let receipt = outcome?;
    println!(
        "Uploaded {} ({} bytes) as {}",
        receipt.filename, receipt.size, receipt.id
    );
    if let Some(url) = &receipt.url {
        println!("Stored at: {}", url);
    }
    Ok(())
}

async fn run_reports(config: AppConfig) -> Result<()> {
    let client = ReportsClient::new(&config)?;
    let reports = client.list().await?;

    if reports.is_empty() {
        println!("No reports yet");
        return Ok(());
    }

    for report in &reports {
        println!("{}  created {}", report.report_id, report.created_at);
        if let Some(filename) = report.report_image_filename() {
            println!(
                "  image: {}",
                client.report_image_url(&report.report_id, filename)
            );
        }
        if report.mask_image_path.is_some() {
            println!("  mask:  {}", client.mask_image_url(&report.report_id));
        }
    }
    Ok(())
}
