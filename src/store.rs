//! # Corpus Persistence
//!
//! The only place the corpus touches the filesystem.
//!
//! ## CSV
//!
//! The artist-database builder writes a flat table, one row per
//! (artist, genre) pair:
//!
//! ```text
//! artist_name,listeners,tag
//! Traumer,41000,minimal
//! Traumer,41000,tech house
//! "Lee Burridge, All Day I Dream",120000,deep house
//! ```
//!
//! Columns may come in any order and extra columns are ignored. Reading and
//! writing go through the `csv` crate, so fields follow the usual quoting
//! rules (commas, doubled quotes, newlines inside quotes).
//! An empty `listeners` field marks an artist whose count could not be
//! fetched; such rows are skipped by [`Corpus::load`]. A negative or
//! non-numeric count rejects the whole file.
//!
//! ## SQLite
//!
//! `deepcut import` stores a validated corpus in the data directory so later
//! runs do not need the CSV. Same one-row-per-pair layout.

use crate::corpus::{Corpus, CorpusRow};
use crate::error::{DiscoveryError, DiscoveryResult};
use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

pub const ARTIST_COLUMN: &str = "artist_name";
pub const TAG_COLUMN: &str = "tag";
pub const LISTENERS_COLUMN: &str = "listeners";

/// Read and validate a corpus CSV file.
///
/// # Errors
///
/// Returns [`DiscoveryError::Data`] if the file cannot be read, a required
/// column is missing, or any row is invalid. Nothing is returned partially.
pub fn load_csv(path: &Path) -> DiscoveryResult<Corpus> {
    let content = fs::read_to_string(path)
        .map_err(|e| DiscoveryError::Data(format!("cannot read corpus file {}: {e}", path.display())))?;
    let corpus = parse_csv(&content)?;
    info!("Loaded {} artists from {}", corpus.len(), path.display());
    Ok(corpus)
}

/// Parse corpus CSV text.
///
/// # Errors
///
/// See [`load_csv`].
pub fn parse_csv(content: &str) -> DiscoveryResult<Corpus> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let header = reader
        .headers()
        .map_err(|e| DiscoveryError::Data(format!("invalid corpus header: {e}")))?
        .clone();
    if header.is_empty() {
        return Err(DiscoveryError::Data("corpus file is empty".to_string()));
    }
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DiscoveryError::Data(format!("missing required column '{name}'")))
    };
    let artist_idx = column(ARTIST_COLUMN)?;
    let tag_idx = column(TAG_COLUMN)?;
    let listeners_idx = column(LISTENERS_COLUMN)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DiscoveryError::Data(format!("malformed corpus CSV: {e}")))?;
        let line = record.position().map_or(0, csv::Position::line);
        if record.iter().all(str::is_empty) {
            continue;
        }

        let field = |idx: usize| {
            record.get(idx).ok_or_else(|| {
                DiscoveryError::Data(format!(
                    "line {line}: expected {} columns, found {}",
                    header.len(),
                    record.len()
                ))
            })
        };

        rows.push(CorpusRow {
            artist_name: field(artist_idx)?.to_string(),
            tag: field(tag_idx)?.to_string(),
            listeners: parse_listeners(field(listeners_idx)?, line)?,
        });
    }

    debug!("Parsed {} corpus rows", rows.len());
    Corpus::load(rows)
}

fn parse_listeners(raw: &str, line: u64) -> DiscoveryResult<Option<u64>> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u64>() {
        Ok(count) => Ok(Some(count)),
        Err(_) if raw.parse::<i64>().is_ok() => Err(DiscoveryError::Data(format!(
            "line {line}: negative listener count '{raw}'"
        ))),
        Err(_) => Err(DiscoveryError::Data(format!(
            "line {line}: listener count '{raw}' is not a non-negative integer"
        ))),
    }
}

/// Render a corpus as CSV, one row per (artist, genre) pair.
///
/// # Errors
///
/// Fails only if the CSV writer cannot encode a row.
pub fn to_csv(corpus: &Corpus) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([ARTIST_COLUMN, TAG_COLUMN, LISTENERS_COLUMN])?;
    for row in corpus.to_rows() {
        let listeners = row.listeners.map(|l| l.to_string()).unwrap_or_default();
        writer
            .write_record([row.artist_name.as_str(), row.tag.as_str(), listeners.as_str()])
            .with_context(|| format!("Failed to encode '{}' ({})", row.artist_name, row.tag))?;
    }
    let bytes = writer.into_inner().context("Failed to flush corpus CSV")?;
    Ok(String::from_utf8(bytes)?)
}

/// Write a corpus CSV file.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn save_csv(corpus: &Corpus, path: &Path) -> Result<()> {
    fs::write(path, to_csv(corpus)?).with_context(|| format!("Failed to write corpus CSV to {}", path.display()))?;
    info!("Wrote {} artists to {}", corpus.len(), path.display());
    Ok(())
}

/// Store `corpus` in a fresh SQLite database at `db_path`.
///
/// Returns the number of (artist, genre) rows written.
///
/// # Errors
///
/// Fails if the database exists and `force` is false, or on any SQLite error.
pub fn import_corpus(db_path: &Path, corpus: &Corpus, force: bool) -> Result<usize> {
    if db_path.exists() {
        if !force {
            anyhow::bail!(
                "Corpus database already exists at {}. Use --force to replace it.",
                db_path.display()
            );
        }
        fs::remove_file(db_path)
            .with_context(|| format!("Failed to remove existing database {}", db_path.display()))?;
    }

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open corpus database at {}", db_path.display()))?;

    conn.execute_batch(
        "CREATE TABLE artists (
            id        INTEGER PRIMARY KEY,
            name      TEXT    NOT NULL,
            tag       TEXT    NOT NULL,
            listeners INTEGER NOT NULL,
            UNIQUE(name, tag)
        );
        CREATE INDEX idx_artists_tag ON artists(tag);",
    )
    .context("Failed to create artists table")?;

    let rows = corpus.to_rows();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("INSERT INTO artists (name, tag, listeners) VALUES (?1, ?2, ?3)")?;
        for row in &rows {
            let listeners = i64::try_from(row.listeners.unwrap_or_default())
                .with_context(|| format!("Listener count too large for '{}'", row.artist_name))?;
            stmt.execute((&row.artist_name, &row.tag, listeners))
                .with_context(|| format!("Failed to insert '{}' ({})", row.artist_name, row.tag))?;
        }
    }
    tx.commit().context("Committing corpus import failed")?;

    info!("Imported {} artist-genre rows into {}", rows.len(), db_path.display());
    Ok(rows.len())
}

/// Load the corpus stored by [`import_corpus`].
///
/// # Errors
///
/// Fails if the database is missing or unreadable, or if its rows do not form
/// a valid corpus.
pub fn load_database(db_path: &Path) -> Result<Corpus> {
    if !db_path.exists() {
        anyhow::bail!(
            "No corpus database at {}. Run `deepcut import <csv>` first or pass --corpus.",
            db_path.display()
        );
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open corpus database at {}", db_path.display()))?;
    let mut stmt = conn
        .prepare("SELECT name, tag, listeners FROM artists ORDER BY id")
        .context("Invalid corpus database schema")?;

    let row_iter = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut rows = Vec::new();
    for row in row_iter {
        let (artist_name, tag, listeners) = row.context("Failed to read corpus row")?;
        let listeners = u64::try_from(listeners)
            .map_err(|_| DiscoveryError::Data(format!("negative listener count for '{artist_name}'")))?;
        rows.push(CorpusRow {
            artist_name,
            tag,
            listeners: Some(listeners),
        });
    }

    let corpus = Corpus::load(rows)?;
    debug!("Loaded {} artists from {}", corpus.len(), db_path.display());
    Ok(corpus)
}
