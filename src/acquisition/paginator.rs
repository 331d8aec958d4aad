use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{jsontype, PAGE_SIZE, RESULTS_ROTATE_EVERY};
use crate::error::{AppError, Result};
use crate::transport::TransportClient;
use crate::types::{scalar_text, DateRange};

/// One entry of the `search_result.aspx` response array.
#[derive(Debug, Deserialize)]
struct SearchPage {
    matchescount: Option<Value>,
    /// Missing or null on some pages; such pages contribute nothing.
    #[serde(default)]
    matches: Option<Vec<Value>>,
}

/// Pages needed for `matches_count` records.
pub fn page_count(matches_count: usize) -> usize {
    matches_count.div_ceil(PAGE_SIZE)
}

fn search_params(range: &DateRange, page_no: usize) -> Vec<(&'static str, String)> {
    vec![
        ("jsontype", jsontype::SEARCH_RESULT.to_string()),
        ("startdate", range.start_param()),
        ("enddate", range.end_param()),
        ("pageno", page_no.to_string()),
    ]
}

/// First element of the response array, if any.
fn parse_page(v: &Value) -> Result<Option<SearchPage>> {
    let entries = v.as_array().ok_or_else(|| {
        AppError::Schema("search_result response was not an array".to_string())
    })?;
    match entries.first() {
        Some(first) => serde_json::from_value(first.clone())
            .map(Some)
            .map_err(|e| AppError::Schema(format!("search_result page: {e}"))),
        None => Ok(None),
    }
}

fn matches_count(page: Option<&SearchPage>) -> Result<usize> {
    let raw = page
        .and_then(|p| p.matchescount.as_ref())
        .ok_or_else(|| AppError::Schema("missing field `matchescount`".to_string()))?;
    scalar_text(raw)
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or_else(|| AppError::EndpointLogic(format!("matchescount {raw} is not a record count")))
}

/// Fetch every finished match in `range`, page by page, in page order.
///
/// Page 1 is requested once to learn the record count and again as the first
/// page of the sweep. The session is rotated after every
/// `RESULTS_ROTATE_EVERY` pages.
pub async fn fetch_all_results(
    client: &mut TransportClient,
    range: &DateRange,
) -> Result<Vec<Value>> {
    let first = client.call(&search_params(range, 1)).await?;
    let total = matches_count(parse_page(&first)?.as_ref())?;
    let pages = page_count(total);
    if pages.checked_mul(PAGE_SIZE).is_none() {
        return Err(AppError::EndpointLogic(format!(
            "matchescount {total} does not fit in {PAGE_SIZE}-record pages"
        )));
    }
    info!(matches = total, pages, "total matches: {total}, total pages: {pages} ({range})");

    // Sized by what arrives, not by the endpoint's claim.
    let mut results = Vec::new();
    for page_no in 1..=pages {
        let value = client.call(&search_params(range, page_no)).await?;
        let matches = parse_page(&value)?
            .and_then(|p| p.matches)
            .unwrap_or_default();
        info!(page = page_no, count = matches.len(), "page {page_no} done.");
        results.extend(matches);

        if page_no % RESULTS_ROTATE_EVERY == 0 {
            client.rotate();
        }
    }

    if results.len() != total {
        warn!(
            expected = total,
            fetched = results.len(),
            "Result count drifted during pagination"
        );
    }
    Ok(results)
}
