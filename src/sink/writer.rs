use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::normalizer::COLUMNS;
use crate::sink::csv::{parse_rows, write_rows};

/// Persists rendered rows to one CSV file, merging with what is already there.
///
/// The stored rows and the new ones are deduplicated on the first column and
/// written to a sibling temp file, which then replaces the target.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Merge `rows` into the file. Returns the number of rows stored afterwards.
    ///
    /// An existing file that fails validation is left untouched.
    pub fn persist(&self, rows: &[Vec<String>]) -> Result<usize> {
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let mut stored = if is_new {
            debug!(path = %self.path.display(), "creating CSV with header");
            Vec::new()
        } else {
            self.load()?
        };
        let before = stored.len();
        stored.extend(rows.iter().cloned());
        let total = stored.len();
        let merged = dedup_rows(stored);

        self.replace_with(&merged)?;
        info!(
            path = %self.path.display(),
            previous = before,
            appended = rows.len(),
            dropped = total - merged.len(),
            stored = merged.len(),
            "CSV updated: {} rows stored",
            merged.len()
        );
        Ok(merged.len())
    }

    /// Data rows of the file, after checking header and row widths.
    fn load(&self) -> Result<Vec<Vec<String>>> {
        let text = fs::read_to_string(&self.path)?;
        let mut parsed = parse_rows(&text);
        if parsed.is_empty() {
            return Err(AppError::Sink(format!("{} has no header", self.path.display())));
        }
        let header = parsed.remove(0);
        if header.iter().map(String::as_str).ne(COLUMNS.iter().copied()) {
            return Err(AppError::Sink(format!(
                "{} has a different header than the match schema",
                self.path.display()
            )));
        }
        let bad_row = parsed
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != COLUMNS.len());
        if let Some((i, bad)) = bad_row {
            return Err(AppError::Sink(format!(
                "{} row {} has {} cells, expected {}",
                self.path.display(),
                i + 2,
                bad.len(),
                COLUMNS.len()
            )));
        }
        Ok(parsed)
    }

    /// Write header and `rows` to `<path>.tmp`, then rename it over the target.
    fn replace_with(&self, rows: &[Vec<String>]) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written = File::create(&tmp).and_then(|file| {
            let mut w = BufWriter::new(file);
            write_rows(&mut w, &COLUMNS, rows)?;
            w.flush()?;
            w.get_ref().sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::Sink(format!("writing {}: {e}", tmp.display())));
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// One row per match id. A repeated id keeps the position of its first row
/// and the content of its last, so re-scraped odds replace stale ones.
fn dedup_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Vec<String>> = Vec::with_capacity(rows.len());
    for row in rows {
        let key = row.first().cloned().unwrap_or_default();
        match index.get(&key) {
            Some(&i) => out[i] = row,
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }
    out
}
