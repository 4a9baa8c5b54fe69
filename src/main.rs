// Scan a marketplace listing and print the model's risk assessment.
//
// Diagnostics go to stderr through tracing; stdout only carries the
// model response and the risk banner.

use anyhow::{Context, Result};
use clap::Parser;
use shopchain_scan::{Assessor, AssessorConfig, RiskBand, load_yaml_config, scan};

/// Render a listing page, extract it and assess its scam risk.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Listing URL to scan
    #[arg(short, long)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_yaml_config().context("Failed to load config.yaml")?;

    // A missing key must fail before any browser starts
    let api_key = std::env::var("API_KEY").ok();
    let assessor = Assessor::gemini(&AssessorConfig::new(api_key, config.assessor.clone()))?;

    let report = match scan(&cli.url, &config, &assessor).await {
        Ok(report) => report,
        Err(e) => {
            if e.is_navigation_timeout() {
                tracing::error!(
                    "Page never settled; raise render.navigation_timeout_ms in config.yaml (max 300000)"
                );
            }
            return Err(e.into());
        }
    };
    tracing::info!(
        "Expansion: {:?}, scroll: {:?}",
        report.extraction.expansion,
        report.extraction.scroll
    );

    let assessment = report.assessment;
    println!("{}", assessment.raw);
    if let Some(score) = assessment.risk_score() {
        println!();
        println!("Risk score: {}/100 ({})", score, RiskBand::from_score(score));
    }

    Ok(())
}
