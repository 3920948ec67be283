//! # External Metadata Source
//!
//! The recommendation pipeline needs three things from the outside world:
//! similar artists, top tracks and basic artist info (listeners and tags).
//! [`MetadataSource`] is that capability. Implementations may be slow, may
//! return nothing and may fail; [`crate::resolver::SimilarityResolver`] is the
//! only caller and turns every failure into an empty result.
//!
//! [`CatalogSource`] answers from a JSON catalog file, which keeps the tool
//! usable offline and gives tests a deterministic source:
//!
//! ```json
//! {
//!   "artists": {
//!     "Traumer": {
//!       "listeners": 41000,
//!       "tags": ["minimal", "tech house"],
//!       "similar": [{ "name": "Cristi Cons", "match": 0.92 }],
//!       "top_tracks": ["Hoodwink", "Sistema"]
//!     }
//!   }
//! }
//! ```

use crate::corpus::normalize_name;
use crate::error::LookupFailure;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A similar artist and its similarity score (higher is more similar).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarArtist {
    pub name: String,
    #[serde(rename = "match", default)]
    pub score: f64,
}

impl SimilarArtist {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub name: String,
    pub listeners: Option<u64>,
    pub tags: Vec<String>,
}

/// Capability that answers artist metadata questions.
///
/// Implementations must be shareable across the resolver's worker threads.
pub trait MetadataSource: Send + Sync {
    /// Artists similar to `name`, in any order.
    ///
    /// # Errors
    ///
    /// Any [`LookupFailure`]; callers treat all of them as "no data".
    fn similar_artists(&self, name: &str) -> Result<Vec<SimilarArtist>, LookupFailure>;

    /// Most popular tracks of `name`, most popular first.
    ///
    /// # Errors
    ///
    /// Any [`LookupFailure`].
    fn top_tracks(&self, name: &str) -> Result<Vec<String>, LookupFailure>;

    /// # Errors
    ///
    /// Any [`LookupFailure`].
    fn artist_info(&self, name: &str) -> Result<ArtistInfo, LookupFailure>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub listeners: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub similar: Vec<SimilarArtist>,
    #[serde(default)]
    pub top_tracks: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    artists: HashMap<String, CatalogEntry>,
}

/// Offline [`MetadataSource`] backed by a JSON catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSource {
    /// normalized name -> (display name, entry)
    entries: HashMap<String, (String, CatalogEntry)>,
}

impl CatalogSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid catalog.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let catalog = Self::from_json_str(&content)
            .with_context(|| format!("Invalid catalog file: {}", path.display()))?;
        debug!("Loaded catalog with {} artists from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// # Errors
    ///
    /// Fails if `json` is not a valid catalog document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json).context("Catalog JSON could not be parsed")?;
        let mut catalog = Self::new();
        for (name, entry) in file.artists {
            catalog.insert(name, entry);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: CatalogEntry) {
        let name = name.into();
        self.entries.insert(normalize_name(&name), (name, entry));
    }

    /// Builder-style [`CatalogSource::insert`].
    #[must_use]
    pub fn with_artist(mut self, name: impl Into<String>, entry: CatalogEntry) -> Self {
        self.insert(name, entry);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, name: &str) -> Result<&(String, CatalogEntry), LookupFailure> {
        self.entries
            .get(&normalize_name(name))
            .ok_or_else(|| LookupFailure::NotFound(name.to_string()))
    }
}

impl MetadataSource for CatalogSource {
    fn similar_artists(&self, name: &str) -> Result<Vec<SimilarArtist>, LookupFailure> {
        let (_, entry) = self.entry(name)?;
        if let Some(bad) = entry.similar.iter().find(|s| !s.score.is_finite()) {
            return Err(LookupFailure::Malformed(format!(
                "similarity score for '{}' is not a number",
                bad.name
            )));
        }
        Ok(entry.similar.clone())
    }

    fn top_tracks(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        self.entry(name).map(|(_, entry)| entry.top_tracks.clone())
    }

    fn artist_info(&self, name: &str) -> Result<ArtistInfo, LookupFailure> {
        let (display, entry) = self.entry(name)?;
        Ok(ArtistInfo {
            name: display.clone(),
            listeners: entry.listeners,
            tags: entry.tags.clone(),
        })
    }
}
