mod analysis;
mod history;
mod indicators;
mod report;
mod resolver;
mod storage;
mod summary;
mod tui;

use anyhow::Result;

const DEFAULT_MONTHS: u32 = 6;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        // One-shot mode: `flowboard <query> [months]` prints the report and exits.
        Some(query) => {
            let months = args
                .next()
                .and_then(|m| m.parse().ok())
                .unwrap_or(DEFAULT_MONTHS)
                .clamp(1, 12);
            run_once(&query, months).await
        }
        None => tui::run_tui().await,
    }
}

async fn run_once(query: &str, months: u32) -> Result<()> {
    let client = reqwest::Client::new();

    println!("\n--- Analyzing '{}' over {} months ---", query, months);
    match analysis::analyze(&client, query, months).await? {
        Some(report) => summary::print_report(&report),
        None => eprintln!("No ticker found for '{}'.", query),
    }

    Ok(())
}
