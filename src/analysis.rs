//! This module contains the core analysis pipeline logic.

use crate::report::{self, Report};
use crate::{history, indicators, resolver};
use anyhow::Result;
use reqwest::Client;

/// Runs the full analysis pipeline for one query:
/// 1. Resolves the search term to a ticker code and display name.
/// 2. Fetches the paginated daily supply/demand history.
/// 3. Derives the indicator series over the full history.
/// 4. Windows it for display and reads off the commentary signals.
///
/// `Ok(None)` means the term did not resolve to a listed ticker, which the
/// caller surfaces as a normal message, not an error. Fetch and parse
/// failures propagate and abort the run; the user simply re-triggers.
pub async fn analyze(client: &Client, query: &str, months: u32) -> Result<Option<Report>> {
    let identity = match resolver::resolve(client, query).await {
        Some(identity) => identity,
        None => return Ok(None),
    };

    let records = history::fetch_history(client, &identity.code, months).await?;
    let derived = indicators::derive(&records);

    Ok(Some(report::build(identity, derived, months)))
}
