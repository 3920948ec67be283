//! Underground artist selection.
//!
//! For every genre of the seed, keep the corpus artists whose listener count
//! falls inside the genre's band, drop the seed and its similar artists, then
//! shuffle and take a handful. The shuffle is seeded from the seed-artist name
//! so the same request always picks the same artists, while different seeds
//! do not all surface the same "most popular underground" names.

use crate::corpus::{normalize_name, ArtistRecord};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::threshold::ThresholdCalculator;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug)]
pub struct UndergroundSelector<'c, 'a> {
    thresholds: &'c ThresholdCalculator<'a>,
}

impl<'c, 'a> UndergroundSelector<'c, 'a> {
    #[must_use]
    pub fn new(thresholds: &'c ThresholdCalculator<'a>) -> Self {
        Self { thresholds }
    }

    /// Pick underground candidates for `genres`.
    ///
    /// `exclude` holds artist names (any spelling) that must not be picked;
    /// usually the seed and its similar artists. Each genre contributes at
    /// most `per_genre_limit` artists and an artist is never picked twice.
    ///
    /// # Errors
    ///
    /// Only propagates unexpected threshold failures. Genres missing from the
    /// corpus are skipped.
    pub fn select(
        &self,
        genres: &[String],
        exclude: &HashSet<String>,
        per_genre_limit: usize,
        shuffle_seed: &str,
    ) -> DiscoveryResult<Vec<ArtistRecord>> {
        let corpus = self.thresholds.corpus();
        let mut excluded: HashSet<String> = exclude.iter().map(|name| normalize_name(name)).collect();
        let mut rng = StdRng::seed_from_u64(stable_seed(shuffle_seed));
        let mut selected = Vec::new();

        for genre in genres {
            let band = match self.thresholds.band_for(genre) {
                Ok(band) => band,
                Err(DiscoveryError::UnknownGenre(g)) => {
                    warn!("Skipping genre '{g}': not in corpus");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let mut pool: Vec<&ArtistRecord> = corpus
                .artists_in_genre(genre)
                .into_iter()
                .filter(|artist| band.contains(artist.listener_count))
                .filter(|artist| !excluded.contains(&artist.key()))
                .collect();

            pool.shuffle(&mut rng);

            let picked: Vec<ArtistRecord> = pool.into_iter().take(per_genre_limit).cloned().collect();
            debug!(
                "Genre '{}' band [{}, {}]: picked {} underground artists",
                band.genre,
                band.low,
                band.high,
                picked.len()
            );

            for artist in picked {
                excluded.insert(artist.key());
                selected.push(artist);
            }
        }

        Ok(selected)
    }
}

/// XXH3 of the normalized name. Stable across runs and platforms.
#[must_use]
pub fn stable_seed(name: &str) -> u64 {
    xxh3_64(normalize_name(name).as_bytes())
}
