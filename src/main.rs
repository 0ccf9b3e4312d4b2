// src/main.rs

use std::time::Duration;

use color_eyre::eyre::{bail, Result};
use tracing::debug;

use vigil::config::{ReconConfig, ScannerConfig};
use vigil::core::models::JobState;
use vigil::core::service::SubmitRequest;
use vigil::logging::initialize_logging;
use vigil::{ReconService, ScanService};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

const USAGE: &str = "Usage:
  vigil scan <url> [passive|active] [--confirm]
  vigil recon <domain>

The --confirm flag attests that you have permission to test the target.
Recon requires no flag here; only run it against domains you are authorized
to assess.";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    initialize_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("scan") => run_scan(&args[1..]).await,
        Some("recon") => run_recon(&args[1..]).await,
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn run_scan(args: &[String]) -> Result<()> {
    let Some(url) = args.first() else {
        bail!("scan requires a target URL\n\n{USAGE}");
    };
    let confirmed = args.iter().any(|a| a == "--confirm");
    let mode = args
        .iter()
        .skip(1)
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "passive".to_string());

    let service = ScanService::new(ScannerConfig::from_env());
    let receipt = service
        .submit(SubmitRequest {
            target_url: url.clone(),
            mode,
            permission_confirmed: confirmed,
        })
        .await?;
    eprintln!("{} (job {})", receipt.message, receipt.id);

    loop {
        let status = service.status(receipt.id).await?;
        eprintln!("[{:>3}%] {}", status.progress, status.current_step);
        match status.status {
            JobState::Completed => break,
            JobState::Failed => {
                bail!(
                    "scan failed: {}",
                    status.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            _ => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }

    let report = service.report(receipt.id).await?;
    debug!(total = report.summary.total, "Printing final report.");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_recon(args: &[String]) -> Result<()> {
    let Some(domain) = args.first() else {
        bail!("recon requires a domain\n\n{USAGE}");
    };

    let service = ReconService::new(ReconConfig::from_env());
    let receipt = service.submit(domain).await?;
    eprintln!("{} (job {})", receipt.message, receipt.id);

    loop {
        let status = service.status(receipt.id).await?;
        eprintln!("[{:>3}%] {}", status.progress, status.current_step);
        if status.status == JobState::Completed {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let markdown = service.render(receipt.id).await?;
    println!("{markdown}");
    Ok(())
}
