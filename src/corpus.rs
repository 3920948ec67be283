//! # Artist Corpus
//!
//! In-memory table of artists, their genre tags and Last.fm listener counts.
//! Built once from persisted rows (see [`crate::store`]) and read-only
//! afterwards, so a single [`Corpus`] can be shared by every request.
//!
//! Artist identity is the normalized name: lowercase with runs of whitespace
//! collapsed. Display spelling is kept from the first row seen.

use crate::error::{DiscoveryError, DiscoveryResult};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw (artist, genre) row as it comes out of the persisted table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRow {
    pub artist_name: String,
    pub tag: String,
    /// `None` when the builder could not fetch a count for this artist.
    pub listeners: Option<u64>,
}

impl CorpusRow {
    pub fn new(artist_name: impl Into<String>, tag: impl Into<String>, listeners: u64) -> Self {
        Self {
            artist_name: artist_name.into(),
            tag: tag.into(),
            listeners: Some(listeners),
        }
    }
}

/// A unique artist after merging all of its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    /// Normalized genre tags in first-seen order. The first one is the primary genre.
    pub tags: Vec<String>,
    pub listener_count: u64,
}

impl ArtistRecord {
    #[must_use]
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    #[must_use]
    pub fn primary_genre(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    #[must_use]
    pub fn has_tag(&self, genre: &str) -> bool {
        let genre = normalize_name(genre);
        self.tags.iter().any(|t| *t == genre)
    }
}

/// Identity normalization shared by the corpus, the selector and the mixer.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct Corpus {
    records: Vec<ArtistRecord>,
    by_name: HashMap<String, usize>,
    by_genre: HashMap<String, Vec<usize>>,
    /// Ascending listener counts per genre, precomputed for percentile queries.
    sorted_listeners: HashMap<String, Vec<u64>>,
}

impl Corpus {
    /// Build a corpus from raw rows.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Data`] if `rows` is empty, if a row has a
    /// blank artist name or tag, or if no row carries a listener count.
    pub fn load(rows: Vec<CorpusRow>) -> DiscoveryResult<Self> {
        if rows.is_empty() {
            return Err(DiscoveryError::Data("corpus input contains no rows".to_string()));
        }

        let mut records: Vec<ArtistRecord> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut skipped = 0usize;

        for (index, row) in rows.into_iter().enumerate() {
            let display = row.artist_name.split_whitespace().collect::<Vec<_>>().join(" ");
            let tag = normalize_name(&row.tag);

            if display.is_empty() {
                return Err(DiscoveryError::Data(format!("row {} has an empty artist name", index + 1)));
            }
            if tag.is_empty() {
                return Err(DiscoveryError::Data(format!(
                    "row {} ('{display}') has an empty tag",
                    index + 1
                )));
            }

            let Some(listeners) = row.listeners else {
                trace!("Skipping '{display}' ({tag}): no listener count");
                skipped += 1;
                continue;
            };

            let key = normalize_name(&display);
            match by_name.get(&key) {
                Some(&existing) => {
                    let record = &mut records[existing];
                    if !record.tags.contains(&tag) {
                        record.tags.push(tag);
                    }
                    // Rows for the same artist normally agree; keep the largest count if not.
                    record.listener_count = record.listener_count.max(listeners);
                }
                None => {
                    by_name.insert(key, records.len());
                    records.push(ArtistRecord {
                        name: display,
                        tags: vec![tag],
                        listener_count: listeners,
                    });
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {skipped} corpus rows without a listener count");
        }
        if records.is_empty() {
            return Err(DiscoveryError::Data(
                "no corpus row has a usable listener count".to_string(),
            ));
        }

        let mut by_genre: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, record) in records.iter().enumerate() {
            for tag in &record.tags {
                by_genre.entry(tag.clone()).or_default().push(index);
            }
        }

        let sorted_listeners = by_genre
            .iter()
            .map(|(genre, members)| {
                let mut counts: Vec<u64> = members.iter().map(|&i| records[i].listener_count).collect();
                counts.sort_unstable();
                (genre.clone(), counts)
            })
            .collect();

        debug!("Loaded corpus: {} artists across {} genres", records.len(), by_genre.len());

        Ok(Self {
            records,
            by_name,
            by_genre,
            sorted_listeners,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All artists in load order.
    #[must_use]
    pub fn records(&self) -> &[ArtistRecord] {
        &self.records
    }

    /// Case- and whitespace-insensitive lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArtistRecord> {
        self.by_name.get(&normalize_name(name)).map(|&i| &self.records[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(&normalize_name(name))
    }

    /// Known genres, sorted.
    #[must_use]
    pub fn genres(&self) -> Vec<&str> {
        let mut genres: Vec<&str> = self.by_genre.keys().map(String::as_str).collect();
        genres.sort_unstable();
        genres
    }

    #[must_use]
    pub fn has_genre(&self, genre: &str) -> bool {
        self.by_genre.contains_key(&normalize_name(genre))
    }

    /// Artists tagged with `genre`, in load order. Empty for unknown genres.
    #[must_use]
    pub fn artists_in_genre(&self, genre: &str) -> Vec<&ArtistRecord> {
        self.by_genre
            .get(&normalize_name(genre))
            .map(|members| members.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn genre_population(&self, genre: &str) -> usize {
        self.by_genre.get(&normalize_name(genre)).map_or(0, Vec::len)
    }

    /// `(min, max)` listener counts for a genre.
    #[must_use]
    pub fn listener_range(&self, genre: &str) -> Option<(u64, u64)> {
        let counts = self.sorted_listeners.get(&normalize_name(genre))?;
        Some((*counts.first()?, *counts.last()?))
    }

    #[must_use]
    pub fn mean_listeners(&self, genre: &str) -> Option<f64> {
        let counts = self.sorted_listeners.get(&normalize_name(genre))?;
        if counts.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / counts.len() as f64;
        Some(mean)
    }

    /// Listener count at percentile `p` within `genre`.
    ///
    /// Linear interpolation between the closest ranks of the sorted counts
    /// (position `p / 100 * (n - 1)`), rounded to the nearest integer.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidParameter`] if `p` is outside `[0, 100]`
    /// - [`DiscoveryError::InsufficientData`] if the genre has no members
    pub fn percentile(&self, genre: &str, p: f64) -> DiscoveryResult<u64> {
        if !(0.0..=100.0).contains(&p) {
            return Err(DiscoveryError::InvalidParameter(format!(
                "percentile must be within [0, 100], got {p}"
            )));
        }

        let key = normalize_name(genre);
        let counts = match self.sorted_listeners.get(&key) {
            Some(counts) if !counts.is_empty() => counts,
            _ => return Err(DiscoveryError::InsufficientData(key)),
        };

        Ok(interpolate(counts, p))
    }

    /// Flatten back to one row per (artist, genre) pair.
    #[must_use]
    pub fn to_rows(&self) -> Vec<CorpusRow> {
        self.records
            .iter()
            .flat_map(|record| {
                record
                    .tags
                    .iter()
                    .map(|tag| CorpusRow::new(record.name.clone(), tag.clone(), record.listener_count))
            })
            .collect()
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn interpolate(sorted: &[u64], p: f64) -> u64 {
    let position = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    let low = sorted[lower] as f64;
    let high = sorted[upper] as f64;
    (low + (high - low) * fraction).round() as u64
}
