//! Dynamic "underground" listener bands per genre.
//!
//! A band spans the 25th to 75th percentile of listener counts inside one
//! genre, so "underground" is relative: a minimal artist with 20k listeners
//! can sit in the band while a techno artist with the same count does not.
//! Small genres fall back to their full `[min, max]` range so that an
//! underground pool always exists.

use crate::corpus::{normalize_name, Corpus};
use crate::error::{DiscoveryError, DiscoveryResult};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

pub const LOW_PERCENTILE: f64 = 25.0;
pub const HIGH_PERCENTILE: f64 = 75.0;
/// Genres with fewer members than this use the widened `[min, max]` band.
pub const DEFAULT_MIN_POPULATION: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenreBand {
    pub genre: String,
    pub low: u64,
    pub high: u64,
    pub population: usize,
    /// True when the band is the small-population `[min, max]` fallback.
    pub widened: bool,
}

impl GenreBand {
    /// Inclusive on both ends. A widened band with equal bounds accepts any
    /// artist of the genre, which the caller has already filtered by genre.
    /// An interquartile band keeps its bounds even when they collapse onto
    /// one tied count.
    #[must_use]
    pub fn contains(&self, listeners: u64) -> bool {
        if self.widened && self.low == self.high {
            return true;
        }
        (self.low..=self.high).contains(&listeners)
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.low == self.high
    }
}

/// Computes and caches [`GenreBand`]s for one corpus.
#[derive(Debug)]
pub struct ThresholdCalculator<'a> {
    corpus: &'a Corpus,
    min_population: usize,
    cache: Mutex<HashMap<String, GenreBand>>,
}

impl<'a> ThresholdCalculator<'a> {
    #[must_use]
    pub fn new(corpus: &'a Corpus) -> Self {
        Self::with_min_population(corpus, DEFAULT_MIN_POPULATION)
    }

    #[must_use]
    pub fn with_min_population(corpus: &'a Corpus, min_population: usize) -> Self {
        Self {
            corpus,
            min_population: min_population.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn corpus(&self) -> &'a Corpus {
        self.corpus
    }

    /// Underground band for `genre`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::UnknownGenre`] if no corpus artist carries the genre.
    pub fn band_for(&self, genre: &str) -> DiscoveryResult<GenreBand> {
        let key = normalize_name(genre);

        if let Ok(cache) = self.cache.lock() {
            if let Some(band) = cache.get(&key) {
                return Ok(band.clone());
            }
        }

        let band = self.compute(&key)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, band.clone());
        }
        Ok(band)
    }

    fn compute(&self, genre: &str) -> DiscoveryResult<GenreBand> {
        let population = self.corpus.genre_population(genre);
        let (min, max) = self
            .corpus
            .listener_range(genre)
            .ok_or_else(|| DiscoveryError::UnknownGenre(genre.to_string()))?;

        if population < self.min_population {
            debug!("Genre '{genre}' has {population} artists, widening band to [{min}, {max}]");
            return Ok(widened(genre, min, max, population));
        }

        let bounds = self
            .corpus
            .percentile(genre, LOW_PERCENTILE)
            .and_then(|low| Ok((low, self.corpus.percentile(genre, HIGH_PERCENTILE)?)));

        match bounds {
            Ok((low, high)) => {
                debug!("Genre '{genre}' band: [{low}, {high}] over {population} artists");
                Ok(GenreBand {
                    genre: genre.to_string(),
                    low,
                    high,
                    population,
                    widened: false,
                })
            }
            Err(DiscoveryError::InsufficientData(_)) => {
                warn!("Percentiles unavailable for '{genre}', using [{min}, {max}]");
                Ok(widened(genre, min, max, population))
            }
            Err(err) => Err(err),
        }
    }

    /// Bands for every genre in the corpus, sorted by genre.
    #[must_use]
    pub fn all_bands(&self) -> Vec<GenreBand> {
        self.corpus
            .genres()
            .into_iter()
            .filter_map(|genre| self.band_for(genre).ok())
            .collect()
    }
}

fn widened(genre: &str, min: u64, max: u64, population: usize) -> GenreBand {
    GenreBand {
        genre: genre.to_string(),
        low: min,
        high: max,
        population,
        widened: true,
    }
}
