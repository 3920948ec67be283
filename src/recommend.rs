//! # Discovery Engine
//!
//! Runs the whole recommendation pipeline for one seed artist:
//!
//! 1. Work out the seed's genres (corpus first, then the metadata source).
//! 2. Relevance path: similar artists and their top tracks.
//! 3. Discovery path: underground artists of the seed's genres, excluding the
//!    seed and everything on the relevance path, and their top tracks.
//! 4. Mix both paths into a playlist.
//!
//! ```no_run
//! use deepcut::config::Settings;
//! use deepcut::corpus::{Corpus, CorpusRow};
//! use deepcut::recommend::{DiscoveryEngine, RecommendationRequest};
//! use deepcut::resolver::SimilarityResolver;
//! use deepcut::source::CatalogSource;
//! use std::sync::Arc;
//!
//! let corpus = Corpus::load(vec![CorpusRow::new("Traumer", "minimal", 41_000)])?;
//! let resolver = SimilarityResolver::with_defaults(Arc::new(CatalogSource::new()))?;
//! let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());
//!
//! let request = RecommendationRequest::new("Traumer", 0.7, 20);
//! let recommendation = engine.recommend(&request)?;
//! println!("{} tracks", recommendation.playlist.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::Settings;
use crate::corpus::{normalize_name, Corpus};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::mixer::{self, Playlist, TrackSource};
use crate::resolver::{ArtistTracks, SimilarityResolver};
use crate::selector::UndergroundSelector;
use crate::threshold::{GenreBand, ThresholdCalculator};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    pub seed_artist: String,
    pub adventurousness: f64,
    pub playlist_length: usize,
}

impl RecommendationRequest {
    pub fn new(seed_artist: impl Into<String>, adventurousness: f64, playlist_length: usize) -> Self {
        Self {
            seed_artist: seed_artist.into(),
            adventurousness,
            playlist_length,
        }
    }

    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidParameter`] for a blank seed, a zero
    /// playlist length or an adventurousness outside `[0, 1]`.
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.seed_artist.trim().is_empty() {
            return Err(DiscoveryError::InvalidParameter("seed artist cannot be empty".to_string()));
        }
        if self.playlist_length == 0 {
            return Err(DiscoveryError::InvalidParameter(
                "playlist length must be at least 1".to_string(),
            ));
        }
        mixer::validate_adventurousness(self.adventurousness)
    }
}

/// Everything the pipeline found for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub seed: String,
    pub genres: Vec<String>,
    pub bands: Vec<GenreBand>,
    pub similar: Vec<ArtistTracks>,
    pub underground: Vec<ArtistTracks>,
    pub playlist: Playlist,
}

#[derive(Debug)]
pub struct DiscoveryEngine<'a> {
    corpus: &'a Corpus,
    thresholds: ThresholdCalculator<'a>,
    resolver: SimilarityResolver,
    settings: Settings,
}

impl<'a> DiscoveryEngine<'a> {
    #[must_use]
    pub fn new(corpus: &'a Corpus, resolver: SimilarityResolver, settings: &Settings) -> Self {
        Self {
            corpus,
            thresholds: ThresholdCalculator::with_min_population(corpus, settings.min_genre_population),
            resolver,
            settings: settings.clone(),
        }
    }

    #[must_use]
    pub fn corpus(&self) -> &'a Corpus {
        self.corpus
    }

    /// Build a playlist for `request`.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidParameter`] if the request does not validate
    /// - [`DiscoveryError::UnknownArtist`] if neither the corpus nor the
    ///   metadata source knows the seed
    ///
    /// Lookup failures never surface here; they shrink the playlist instead.
    pub fn recommend(&self, request: &RecommendationRequest) -> DiscoveryResult<Recommendation> {
        request.validate()?;
        let length = request.playlist_length;
        info!(
            "Generating a {length}-track playlist for '{}' (adventurousness {:.2})",
            request.seed_artist, request.adventurousness
        );

        let (seed, genres) = self.seed_genres(&request.seed_artist)?;
        debug!("Seed '{seed}' genres: {genres:?}");

        info!("Finding relevant tracks from similar artists");
        let similar_names = self
            .resolver
            .similar_artists(&seed, self.settings.similar_limit(length));
        let similar = self
            .resolver
            .top_tracks_for(&similar_names, self.settings.tracks_per_artist);

        info!("Finding underground artists");
        let mut exclude: HashSet<String> = similar_names.iter().map(|name| normalize_name(name)).collect();
        exclude.insert(normalize_name(&seed));

        let selector = UndergroundSelector::new(&self.thresholds);
        let picked = selector.select(&genres, &exclude, self.settings.underground_limit(length), &seed)?;
        let underground_names: Vec<String> = picked.into_iter().map(|artist| artist.name).collect();
        let underground = self
            .resolver
            .top_tracks_for(&underground_names, self.settings.tracks_per_artist);

        let bands = genres
            .iter()
            .filter_map(|genre| self.thresholds.band_for(genre).ok())
            .collect();

        info!("Mixing the playlist");
        let playlist = mixer::mix(
            &mixer::candidates_from(&similar, TrackSource::Relevant),
            &mixer::candidates_from(&underground, TrackSource::Underground),
            request.adventurousness,
            length,
        )?;

        if playlist.is_short() {
            warn!(
                "Only {} of {} requested tracks could be found for '{seed}'",
                playlist.len(),
                length
            );
        }

        Ok(Recommendation {
            seed,
            genres,
            bands,
            similar,
            underground,
            playlist,
        })
    }

    /// Display name and genres of the seed.
    ///
    /// The corpus is authoritative. An artist outside the corpus gets the
    /// source's tags that the corpus knows about, possibly none.
    fn seed_genres(&self, seed: &str) -> DiscoveryResult<(String, Vec<String>)> {
        if let Some(record) = self.corpus.get(seed) {
            return Ok((record.name.clone(), record.tags.clone()));
        }

        debug!("'{seed}' is not in the corpus, asking the metadata source");
        let info = self
            .resolver
            .artist_info(seed)
            .ok_or_else(|| DiscoveryError::UnknownArtist(seed.trim().to_string()))?;

        let mut seen = HashSet::new();
        let genres: Vec<String> = info
            .tags
            .iter()
            .map(|tag| normalize_name(tag))
            .filter(|tag| self.corpus.has_genre(tag) && seen.insert(tag.clone()))
            .collect();

        if genres.is_empty() {
            warn!("None of the tags of '{}' are in the corpus; no underground picks", info.name);
        }

        let name = if info.name.trim().is_empty() {
            seed.trim().to_string()
        } else {
            info.name
        };
        Ok((name, genres))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusRow;
    use crate::source::{CatalogEntry, CatalogSource, SimilarArtist};
    use std::sync::Arc;
    use std::time::Duration;

    fn entry(listeners: u64, tags: &[&str], similar: &[(&str, f64)], tracks: &[&str]) -> CatalogEntry {
        CatalogEntry {
            listeners: Some(listeners),
            tags: tags.iter().map(ToString::to_string).collect(),
            similar: similar.iter().map(|(name, score)| SimilarArtist::new(*name, *score)).collect(),
            top_tracks: tracks.iter().map(ToString::to_string).collect(),
        }
    }

    fn corpus() -> Corpus {
        Corpus::load(vec![
            CorpusRow::new("Seed", "techno", 5_000),
            CorpusRow::new("Friend", "techno", 80_000),
            CorpusRow::new("Deep One", "techno", 300),
            CorpusRow::new("Deep Two", "techno", 900),
            CorpusRow::new("Giant", "techno", 2_000_000),
        ])
        .unwrap()
    }

    fn catalog() -> CatalogSource {
        CatalogSource::new()
            .with_artist("Seed", entry(5_000, &["techno"], &[("Friend", 0.9)], &["S1"]))
            .with_artist("Friend", entry(80_000, &["techno"], &[], &["F1", "F2", "F3"]))
            .with_artist("Deep One", entry(300, &["techno"], &[], &["D1", "D2"]))
            .with_artist("Deep Two", entry(900, &["techno"], &[], &["E1", "E2", "E3"]))
            .with_artist(
                "Outsider",
                entry(1_000, &["Techno", "vaporwave"], &[("Friend", 0.5)], &["O1"]),
            )
    }

    fn engine(corpus: &Corpus) -> DiscoveryEngine<'_> {
        let resolver = SimilarityResolver::new(Arc::new(catalog()), Duration::from_secs(2), 2).unwrap();
        DiscoveryEngine::new(corpus, resolver, &Settings::default())
    }

    #[test]
    fn test_request_validation() {
        assert!(RecommendationRequest::new("Seed", 0.5, 10).validate().is_ok());
        assert!(RecommendationRequest::new("  ", 0.5, 10).validate().is_err());
        assert!(RecommendationRequest::new("Seed", 0.5, 0).validate().is_err());
        assert!(RecommendationRequest::new("Seed", -0.1, 10).validate().is_err());
        assert!(RecommendationRequest::new("Seed", f64::NAN, 10).validate().is_err());
    }

    #[test]
    fn test_recommend_mixes_both_paths() {
        let corpus = corpus();
        let engine = engine(&corpus);

        let rec = engine.recommend(&RecommendationRequest::new("seed", 0.5, 6)).unwrap();
        assert_eq!(rec.seed, "Seed");
        assert_eq!(rec.genres, vec!["techno"]);
        assert_eq!(rec.similar.len(), 1);
        assert_eq!(rec.similar[0].artist, "Friend");
        assert_eq!(rec.bands.len(), 1);

        // the seed and similar artists never show up as underground picks
        assert!(rec.underground.iter().all(|a| a.artist != "Seed" && a.artist != "Friend"));
        assert!(rec.underground.iter().all(|a| a.artist != "Giant"));

        assert_eq!(rec.playlist.len(), 6);
        assert_eq!(rec.playlist.count(TrackSource::Relevant), 3);
        assert_eq!(rec.playlist.count(TrackSource::Underground), 3);
    }

    #[test]
    fn test_zero_adventurousness_is_relevant_only() {
        let corpus = corpus();
        let engine = engine(&corpus);

        let rec = engine.recommend(&RecommendationRequest::new("Seed", 0.0, 5)).unwrap();
        assert_eq!(rec.playlist.count(TrackSource::Underground), 0);
        // only three relevant tracks exist
        assert_eq!(rec.playlist.len(), 3);
        assert!(rec.playlist.is_short());
    }

    #[test]
    fn test_seed_outside_corpus_uses_source_tags() {
        let corpus = corpus();
        let engine = engine(&corpus);

        let rec = engine.recommend(&RecommendationRequest::new("Outsider", 1.0, 4)).unwrap();
        assert_eq!(rec.seed, "Outsider");
        assert_eq!(rec.genres, vec!["techno"]);
        assert_eq!(rec.playlist.count(TrackSource::Relevant), 0);
        assert!(!rec.playlist.is_empty());
    }

    #[test]
    fn test_unknown_seed_is_an_error() {
        let corpus = corpus();
        let engine = engine(&corpus);

        let err = engine
            .recommend(&RecommendationRequest::new("Nobody At All", 0.5, 10))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownArtist(name) if name == "Nobody At All"));
    }

    #[test]
    fn test_invalid_request_fails_before_lookups() {
        let corpus = corpus();
        let engine = engine(&corpus);

        let err = engine.recommend(&RecommendationRequest::new("Seed", 2.0, 10)).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidParameter(_)));
    }
}
