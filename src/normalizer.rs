//! Flattens a match and its odds into one output row.
//!
//! Optional values stay `Option` here; the `None` literal is produced only when
//! the row is rendered for the CSV sink.

use crate::types::{MatchRecord, OddsSnapshot, Score};

/// Rendered in place of a missing optional value.
pub const NONE_SENTINEL: &str = "None";

/// Market-depth markers the endpoint prepends to odds.
const DEPTH_PREFIXES: &[&str] = &["100@", "000@"];

/// Output columns, in file order. The first column is the dedup key.
pub const COLUMNS: [&str; 27] = [
    "Match ID",
    "Match Date",
    "Tournament",
    "Home Team",
    "Away Team",
    "Half-time Scores",
    "Half-time Home Odds",
    "Half-time Draw Odds",
    "Half-time Away Odds",
    "Full-time Scores",
    "Full-time Home Odds",
    "Full-time Draw Odds",
    "Full-time Away Odds",
    "Handicap Home",
    "Handicap Away",
    "Handicap Home Odds",
    "Handicap Away Odds",
    "Handicap HAD Home",
    "Handicap HAD Away",
    "Handicap HAD Home Odds",
    "Handicap HAD Draw Odds",
    "Handicap HAD Away Odds",
    "Odd Number Scores Odds",
    "Even Number Scores Odds",
    "First Team to Score Home Odds",
    "First Team to Score None Odds",
    "First Team to Score Away Odds",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub match_id: String,
    pub match_date: String,
    pub tournament: String,
    pub home_team: String,
    pub away_team: String,
    pub half_time_score: Option<String>,
    pub half_time_home: String,
    pub half_time_draw: String,
    pub half_time_away: String,
    pub full_time_score: Option<String>,
    pub full_time_home: String,
    pub full_time_draw: String,
    pub full_time_away: String,
    pub handicap_home_line: Option<String>,
    pub handicap_away_line: Option<String>,
    pub handicap_home: Option<String>,
    pub handicap_away: Option<String>,
    pub handicap_had_home_line: String,
    pub handicap_had_away_line: String,
    pub handicap_had_home: String,
    pub handicap_had_draw: String,
    pub handicap_had_away: String,
    pub odd_scores: String,
    pub even_scores: String,
    pub first_to_score_home: String,
    pub first_to_score_none: String,
    pub first_to_score_away: String,
}

impl NormalizedRow {
    /// Cells in `COLUMNS` order, with missing values as `None`.
    pub fn to_record(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| NONE_SENTINEL.to_string());
        vec![
            self.match_id.clone(),
            self.match_date.clone(),
            self.tournament.clone(),
            self.home_team.clone(),
            self.away_team.clone(),
            opt(&self.half_time_score),
            self.half_time_home.clone(),
            self.half_time_draw.clone(),
            self.half_time_away.clone(),
            opt(&self.full_time_score),
            self.full_time_home.clone(),
            self.full_time_draw.clone(),
            self.full_time_away.clone(),
            opt(&self.handicap_home_line),
            opt(&self.handicap_away_line),
            opt(&self.handicap_home),
            opt(&self.handicap_away),
            self.handicap_had_home_line.clone(),
            self.handicap_had_away_line.clone(),
            self.handicap_had_home.clone(),
            self.handicap_had_draw.clone(),
            self.handicap_had_away.clone(),
            self.odd_scores.clone(),
            self.even_scores.clone(),
            self.first_to_score_home.clone(),
            self.first_to_score_none.clone(),
            self.first_to_score_away.clone(),
        ]
    }
}

/// Strip one leading market-depth marker. Clean values pass through unchanged.
pub fn clean_odds(raw: &str) -> String {
    DEPTH_PREFIXES
        .iter()
        .find_map(|p| raw.strip_prefix(p))
        .unwrap_or(raw)
        .to_string()
}

fn render_score(s: &Score) -> String {
    format!("{}-{}", s.home, s.away)
}

pub fn normalize(record: &MatchRecord, odds: &OddsSnapshot) -> NormalizedRow {
    let (half_time_score, full_time_score) = match &odds.scores {
        Some((half, full)) => (Some(render_score(half)), Some(render_score(full))),
        None => (None, None),
    };
    let hdc = odds.handicap.as_ref();
    let hha = &odds.handicap_had;

    NormalizedRow {
        match_id: record.match_id.clone(),
        match_date: record.match_date.clone(),
        tournament: record.tournament.clone(),
        home_team: record.home_team.clone(),
        away_team: record.away_team.clone(),
        half_time_score,
        half_time_home: clean_odds(&odds.first_half.home),
        half_time_draw: clean_odds(&odds.first_half.draw),
        half_time_away: clean_odds(&odds.first_half.away),
        full_time_score,
        full_time_home: clean_odds(&odds.full_time.home),
        full_time_draw: clean_odds(&odds.full_time.draw),
        full_time_away: clean_odds(&odds.full_time.away),
        handicap_home_line: hdc.map(|h| h.home_line.clone()),
        handicap_away_line: hdc.map(|h| h.away_line.clone()),
        handicap_home: hdc.map(|h| clean_odds(&h.home)),
        handicap_away: hdc.map(|h| clean_odds(&h.away)),
        handicap_had_home_line: hha.home_line.clone(),
        handicap_had_away_line: hha.away_line.clone(),
        handicap_had_home: clean_odds(&hha.odds.home),
        handicap_had_draw: clean_odds(&hha.odds.draw),
        handicap_had_away: clean_odds(&hha.odds.away),
        odd_scores: clean_odds(&odds.odd_even.odd),
        even_scores: clean_odds(&odds.odd_even.even),
        first_to_score_home: clean_odds(&odds.first_to_score.home),
        first_to_score_none: clean_odds(&odds.first_to_score.none),
        first_to_score_away: clean_odds(&odds.first_to_score.away),
    }
}
