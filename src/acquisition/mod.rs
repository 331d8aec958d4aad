pub mod correlator;
pub mod paginator;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::{jsontype, TransportConfig};
use crate::error::{AppError, Result};
use crate::transport::{LatencyStats, TransportClient};
use crate::types::{text_at, DateRange, MatchRecord, OddsSnapshot};

use correlator::{fetch_odds, OddsQuery};
use paginator::fetch_all_results;

/// Where the match ids of a scrape come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// Finished matches in a date window, via paginated `search_result.aspx`.
    PaginatedFinished(DateRange),
    /// Upcoming matches, via one unpaginated `fullmatchlist` call.
    BulkUpcoming,
}

impl MatchSource {
    pub fn label(&self) -> &'static str {
        match self {
            MatchSource::PaginatedFinished(_) => "past",
            MatchSource::BulkUpcoming => "upcoming",
        }
    }

    /// Collect every match of this source together with its odds snapshot,
    /// one pair per distinct match id, in source order.
    pub async fn acquire(
        &self,
        cfg: &TransportConfig,
        latency: &Arc<LatencyStats>,
        odds_workers: usize,
    ) -> Result<Vec<(MatchRecord, OddsSnapshot)>> {
        let mut client = TransportClient::new(cfg.clone(), Arc::clone(latency));

        match self {
            MatchSource::PaginatedFinished(range) => {
                let raw = fetch_all_results(&mut client, range).await?;
                drop(client);

                let records = raw
                    .iter()
                    .map(MatchRecord::from_json)
                    .collect::<Result<Vec<_>>>()?;
                let records = unique_by_id(records, |r| &r.match_id);
                let ids: Vec<String> = records.iter().map(|r| r.match_id.clone()).collect();
                info!(matches = ids.len(), "Fetching last odds for {} finished matches", ids.len());

                let odds = fetch_odds(cfg, latency, &ids, OddsQuery::LastOdds, odds_workers).await?;
                records
                    .into_iter()
                    .zip(odds)
                    .map(|(record, raw_odds)| {
                        let snapshot = OddsSnapshot::from_json(&record.match_id, &raw_odds)?;
                        Ok((record, snapshot))
                    })
                    .collect()
            }
            MatchSource::BulkUpcoming => {
                let list = client
                    .call(&[("jsontype", jsontype::FULL_MATCH_LIST.to_string())])
                    .await?;
                drop(client);

                let ids = unique_by_id(upcoming_ids(&list)?, |id| id);
                info!(matches = ids.len(), "Fetching all odds for {} upcoming matches", ids.len());

                let entries =
                    fetch_odds(cfg, latency, &ids, OddsQuery::AllOdds, odds_workers).await?;
                ids.iter()
                    .zip(entries)
                    .map(|(id, entry)| {
                        let record = MatchRecord::from_json(&entry)?;
                        let snapshot = OddsSnapshot::from_json(id, &entry)?;
                        Ok((record, snapshot))
                    })
                    .collect()
            }
        }
    }
}

/// `mID` of every entry in the `fullmatchlist` response.
fn upcoming_ids(list: &Value) -> Result<Vec<String>> {
    let entries = list
        .as_array()
        .ok_or_else(|| AppError::Schema("fullmatchlist response was not an array".to_string()))?;
    entries.iter().map(|e| text_at(e, &["mID"])).collect()
}

/// Drop later items whose key was already seen, keeping source order.
fn unique_by_id<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &String,
{
    let mut seen = HashSet::new();
    let before = items.len();
    let unique: Vec<T> = items
        .into_iter()
        .filter(|item| seen.insert(key(item).clone()))
        .collect();
    if unique.len() != before {
        warn!(dropped = before - unique.len(), "Duplicate match ids in listing");
    }
    unique
}
