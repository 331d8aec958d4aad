use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use crate::config::{jsontype, TransportConfig, ODDS_ROTATE_EVERY};
use crate::error::{AppError, Result};
use crate::transport::{LatencyStats, TransportClient};
use crate::types::scalar_text;

/// Which per-match odds call to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddsQuery {
    /// `last_odds.aspx`: one object, consumed as-is.
    LastOdds,
    /// `odds_allodds.aspx`: a `matches` list that may hold sibling matches.
    AllOdds,
}

impl OddsQuery {
    fn jsontype(self) -> &'static str {
        match self {
            OddsQuery::LastOdds => jsontype::LAST_ODDS,
            OddsQuery::AllOdds => jsontype::ALL_ODDS,
        }
    }
}

/// Fetch odds for every id, returning one JSON object per id in input order.
///
/// With `workers > 1` the ids are split into contiguous chunks, each served by
/// its own `TransportClient` (own session, own rotation count), and the chunk
/// results are concatenated back in order. The first failing worker fails the
/// whole call and the workers still running are aborted.
pub async fn fetch_odds(
    cfg: &TransportConfig,
    latency: &Arc<LatencyStats>,
    ids: &[String],
    query: OddsQuery,
    workers: usize,
) -> Result<Vec<Value>> {
    let total = ids.len();
    if workers <= 1 || total <= 1 {
        let client = TransportClient::new(cfg.clone(), Arc::clone(latency));
        return run_worker(client, ids.to_vec(), query, 0, total).await;
    }

    let chunk_size = total.div_ceil(workers);
    let handles: Vec<JoinHandle<Result<Vec<Value>>>> = ids
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let client = TransportClient::new(cfg.clone(), Arc::clone(latency));
            let chunk = chunk.to_vec();
            tokio::spawn(run_worker(client, chunk, query, i * chunk_size, total))
        })
        .collect();
    let aborts: Vec<AbortHandle> = handles.iter().map(JoinHandle::abort_handle).collect();

    let joined = try_join_all(
        handles
            .into_iter()
            .map(|h| async move { h.await.map_err(AppError::from).and_then(|r| r) }),
    )
    .await;

    match joined {
        Ok(chunks) => Ok(chunks.into_iter().flatten().collect()),
        Err(e) => {
            warn!(workers = aborts.len(), "Odds worker failed, aborting the others: {e}");
            for handle in &aborts {
                handle.abort();
            }
            Err(e)
        }
    }
}

async fn run_worker(
    mut client: TransportClient,
    ids: Vec<String>,
    query: OddsQuery,
    offset: usize,
    total: usize,
) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let params = [
            ("jsontype", query.jsontype().to_string()),
            ("matchid", id.clone()),
        ];
        let value = client.call(&params).await?;
        let odds = match query {
            OddsQuery::LastOdds => value,
            OddsQuery::AllOdds => select_match(value, id)?,
        };
        let n = offset + i + 1;
        info!(match_id = %id, "match {n}/{total} - match id: {id} done.");
        out.push(odds);

        if (i + 1) % ODDS_ROTATE_EVERY == 0 {
            client.rotate();
        }
    }
    Ok(out)
}

/// Keep only the entry whose `matchID` is `id`.
///
/// The endpoint answers with `{matches: [...]}` or a list of such groups, and
/// the lists can include other matches than the one asked for.
pub fn select_match(value: Value, id: &str) -> Result<Value> {
    let groups = match value {
        Value::Array(groups) => groups,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(AppError::Schema(format!(
                "odds_allodds response for {id} was neither object nor array: {other}"
            )))
        }
    };

    let mut saw_matches = false;
    for group in groups {
        let Value::Object(mut group) = group else { continue };
        let Some(Value::Array(matches)) = group.remove("matches") else { continue };
        saw_matches = true;
        if let Some(found) = matches
            .into_iter()
            .find(|m| m.get("matchID").and_then(scalar_text).as_deref() == Some(id))
        {
            return Ok(found);
        }
    }

    if saw_matches {
        Err(AppError::EndpointLogic(format!("odds_allodds has no entry for match {id}")))
    } else {
        Err(AppError::Schema(format!("odds_allodds response for {id} has no `matches` array")))
    }
}
