use chrono::{Months, NaiveDate};
use serde_json::Value;

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive search window for `search_result.aspx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// The `months` months ending on `end`.
    pub fn lookback(end: NaiveDate, months: u32) -> Self {
        let start = end.checked_sub_months(Months::new(months)).unwrap_or(end);
        Self { start, end }
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// Match record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub match_id: String,
    /// Kept as the endpoint's literal so stored rows stay comparable across runs.
    pub match_date: String,
    pub tournament: String,
    pub home_team: String,
    pub away_team: String,
}

impl MatchRecord {
    pub fn from_json(v: &Value) -> Result<Self> {
        let match_id = text_at(v, &["matchID"])?;
        Ok(Self {
            match_date: text_at(v, &["matchDate"])?,
            tournament: text_at(v, &["tournament", "tournamentNameEN"])?,
            home_team: text_at(v, &["homeTeam", "teamNameEN"])?,
            away_team: text_at(v, &["awayTeam", "teamNameEN"])?,
            match_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Odds snapshot
// ---------------------------------------------------------------------------

/// Home/draw/away prices. Raw endpoint strings, depth prefix included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeWay {
    pub home: String,
    pub draw: String,
    pub away: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handicap {
    pub home_line: String,
    pub away_line: String,
    pub home: String,
    pub away: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandicapThreeWay {
    pub home_line: String,
    pub away_line: String,
    pub odds: ThreeWay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddEven {
    pub odd: String,
    pub even: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstToScore {
    pub home: String,
    pub none: String,
    pub away: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub home: String,
    pub away: String,
}

/// Latest odds for one match at fetch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddsSnapshot {
    pub match_id: String,
    /// (half-time, full-time). Only set when both are reported.
    pub scores: Option<(Score, Score)>,
    pub first_half: ThreeWay,
    pub full_time: ThreeWay,
    /// Absent before kickoff or when the market is not offered.
    pub handicap: Option<Handicap>,
    pub handicap_had: HandicapThreeWay,
    pub odd_even: OddEven,
    pub first_to_score: FirstToScore,
}

impl OddsSnapshot {
    /// `match_id` is the id the snapshot was requested for; `last_odds.aspx`
    /// does not always echo it back.
    pub fn from_json(match_id: &str, v: &Value) -> Result<Self> {
        let scores = match v.get("accumulatedscore").and_then(Value::as_array) {
            Some(entries) if entries.len() >= 2 => {
                Some((score_from_json(&entries[0])?, score_from_json(&entries[1])?))
            }
            _ => None,
        };

        let handicap = match v.get("hdcodds") {
            Some(h) => Some(Handicap {
                home_line: text_at(h, &["HG"])?,
                away_line: text_at(h, &["AG"])?,
                home: text_at(h, &["H"])?,
                away: text_at(h, &["A"])?,
            }),
            None => None,
        };

        let hha = field(v, "hhaodds")?;
        let ooe = field(v, "ooeodds")?;
        let fts = field(v, "ftsodds")?;

        Ok(Self {
            match_id: match_id.to_string(),
            scores,
            first_half: three_way(field(v, "fhaodds")?)?,
            full_time: three_way(field(v, "hadodds")?)?,
            handicap,
            handicap_had: HandicapThreeWay {
                home_line: text_at(hha, &["HG"])?,
                away_line: text_at(hha, &["AG"])?,
                odds: three_way(hha)?,
            },
            odd_even: OddEven {
                odd: text_at(ooe, &["O"])?,
                even: text_at(ooe, &["E"])?,
            },
            first_to_score: FirstToScore {
                home: text_at(fts, &["H"])?,
                none: text_at(fts, &["N"])?,
                away: text_at(fts, &["A"])?,
            },
        })
    }
}

fn three_way(v: &Value) -> Result<ThreeWay> {
    Ok(ThreeWay {
        home: text_at(v, &["H"])?,
        draw: text_at(v, &["D"])?,
        away: text_at(v, &["A"])?,
    })
}

fn score_from_json(v: &Value) -> Result<Score> {
    Ok(Score {
        home: text_at(v, &["home"])?,
        away: text_at(v, &["away"])?,
    })
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Required object member.
pub fn field<'a>(v: &'a Value, key: &str) -> Result<&'a Value> {
    v.get(key)
        .ok_or_else(|| AppError::Schema(format!("missing field `{key}`")))
}

/// Strings pass through; numbers and booleans use their JSON text.
pub fn scalar_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Follow `path` through nested objects and render the scalar at the end.
pub fn text_at(v: &Value, path: &[&str]) -> Result<String> {
    let mut cur = v;
    for key in path {
        cur = cur
            .get(key)
            .ok_or_else(|| AppError::Schema(format!("missing field `{}`", path.join("."))))?;
    }
    scalar_text(cur)
        .ok_or_else(|| AppError::Schema(format!("field `{}` is not a scalar", path.join("."))))
}
