//! # Similarity Resolver
//!
//! The network boundary of the pipeline. Every lookup against the
//! [`MetadataSource`] goes through here, runs on its own worker thread and is
//! abandoned once the configured timeout passes. Failures of any kind (timeout,
//! unknown artist, malformed data, empty answer) are logged and turned into an
//! empty result so discovery degrades instead of aborting.
//!
//! At most `max_concurrent_lookups` workers exist at any time. A worker holds
//! its permit until the source call returns, even after the caller gave up on
//! it, so hung lookups count against the limit. A caller that cannot get a
//! permit before its timeout fails with a timeout like any slow lookup.
//!
//! Top tracks for many artists are fetched on a rayon pool of the same size.
//! Results come back in the order the artists were given, which the mixer
//! relies on.

use crate::corpus::normalize_name;
use crate::error::{DiscoveryError, DiscoveryResult, LookupFailure};
use crate::source::{ArtistInfo, MetadataSource};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 4;

/// One resolved artist and its top tracks, most popular first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistTracks {
    pub artist: String,
    pub tracks: Vec<String>,
}

/// Counting permit shared by the resolver and its workers.
#[derive(Debug)]
struct LookupPermits {
    in_flight: Mutex<usize>,
    released: Condvar,
    limit: usize,
}

impl LookupPermits {
    fn new(limit: usize) -> Self {
        Self {
            in_flight: Mutex::new(0),
            released: Condvar::new(),
            limit,
        }
    }

    /// Wait until a worker slot is free or `deadline` passes.
    fn acquire(self: &Arc<Self>, deadline: Instant) -> Option<LookupPermit> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while *in_flight >= self.limit {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .released
                .wait_timeout(in_flight, remaining)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            in_flight = guard;
        }
        *in_flight += 1;
        Some(LookupPermit {
            permits: Arc::clone(self),
        })
    }

    fn in_flight(&self) -> usize {
        *self.in_flight.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Released when the worker holding it finishes.
struct LookupPermit {
    permits: Arc<LookupPermits>,
}

impl Drop for LookupPermit {
    fn drop(&mut self) {
        let mut in_flight = self
            .permits
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *in_flight = in_flight.saturating_sub(1);
        self.permits.released.notify_one();
    }
}

pub struct SimilarityResolver {
    source: Arc<dyn MetadataSource>,
    timeout: Duration,
    pool: rayon::ThreadPool,
    permits: Arc<LookupPermits>,
}

impl std::fmt::Debug for SimilarityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityResolver")
            .field("timeout", &self.timeout)
            .field("max_concurrent_lookups", &self.permits.limit)
            .field("in_flight", &self.permits.in_flight())
            .finish_non_exhaustive()
    }
}

impl SimilarityResolver {
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidParameter`] if `timeout` is zero,
    /// `max_concurrent_lookups` is zero, or the lookup pool cannot be built.
    pub fn new(
        source: Arc<dyn MetadataSource>,
        timeout: Duration,
        max_concurrent_lookups: usize,
    ) -> DiscoveryResult<Self> {
        if timeout.is_zero() {
            return Err(DiscoveryError::InvalidParameter("lookup timeout must be positive".to_string()));
        }
        if max_concurrent_lookups == 0 {
            return Err(DiscoveryError::InvalidParameter(
                "max_concurrent_lookups must be at least 1".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_concurrent_lookups)
            .thread_name(|i| format!("deepcut-lookup-{i}"))
            .build()
            .map_err(|e| DiscoveryError::InvalidParameter(format!("cannot build lookup pool: {e}")))?;

        Ok(Self {
            source,
            timeout,
            pool,
            permits: Arc::new(LookupPermits::new(max_concurrent_lookups)),
        })
    }

    /// Resolver with the default timeout and concurrency.
    ///
    /// # Errors
    ///
    /// See [`SimilarityResolver::new`].
    pub fn with_defaults(source: Arc<dyn MetadataSource>) -> DiscoveryResult<Self> {
        Self::new(source, DEFAULT_TIMEOUT, DEFAULT_MAX_CONCURRENT_LOOKUPS)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Artists similar to `seed`, best match first, at most `limit`.
    ///
    /// The seed itself and repeated names are dropped. Ties keep the order the
    /// source returned them in.
    #[must_use]
    pub fn similar_artists(&self, seed: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let name = seed.to_string();
        let mut similar = match self.call(move |source| source.similar_artists(&name)) {
            Ok(similar) => similar,
            Err(err) => {
                warn!("Similar-artist lookup for '{seed}' failed: {err}");
                return Vec::new();
            }
        };

        similar.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = HashSet::from([normalize_name(seed)]);
        let names: Vec<String> = similar
            .into_iter()
            .map(|s| s.name.trim().to_string())
            .filter(|name| !name.is_empty() && seen.insert(normalize_name(name)))
            .take(limit)
            .collect();

        if names.is_empty() {
            info!("Found no similar artists for '{seed}'");
        } else {
            debug!("Similar to '{seed}': {}", names.join(", "));
        }
        names
    }

    /// Top track titles for `artist`, at most `limit`.
    #[must_use]
    pub fn top_tracks(&self, artist: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let name = artist.to_string();
        let tracks = match self.call(move |source| source.top_tracks(&name)) {
            Ok(tracks) => tracks,
            Err(err) => {
                warn!("Top-track lookup for '{artist}' failed: {err}");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let tracks: Vec<String> = tracks
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(normalize_name(t)))
            .take(limit)
            .collect();

        trace!("{} top tracks for '{artist}'", tracks.len());
        tracks
    }

    /// Listener count and tags for `name`, if the source knows the artist.
    #[must_use]
    pub fn artist_info(&self, name: &str) -> Option<ArtistInfo> {
        let owned = name.to_string();
        match self.call(move |source| source.artist_info(&owned)) {
            Ok(info) => Some(info),
            Err(LookupFailure::NotFound(_)) => {
                debug!("Metadata source does not know '{name}'");
                None
            }
            Err(err) => {
                warn!("Artist-info lookup for '{name}' failed: {err}");
                None
            }
        }
    }

    /// Top tracks for each artist, fetched concurrently.
    ///
    /// The result follows the order of `artists`; artists without any track
    /// are left out.
    #[must_use]
    pub fn top_tracks_for(&self, artists: &[String], limit: usize) -> Vec<ArtistTracks> {
        debug!("Fetching top {limit} tracks for {} artists", artists.len());

        let resolved: Vec<ArtistTracks> = self.pool.install(|| {
            artists
                .par_iter()
                .map(|artist| ArtistTracks {
                    artist: artist.clone(),
                    tracks: self.top_tracks(artist, limit),
                })
                .collect()
        });

        let resolved: Vec<ArtistTracks> = resolved.into_iter().filter(|a| !a.tracks.is_empty()).collect();
        debug!("Found tracks for {} of {} artists", resolved.len(), artists.len());
        resolved
    }

    fn timed_out(&self) -> LookupFailure {
        #[allow(clippy::cast_possible_truncation)]
        let millis = self.timeout.as_millis() as u64;
        LookupFailure::Timeout(millis)
    }

    /// Run one lookup on a worker thread, giving up after the timeout.
    ///
    /// The timeout covers waiting for a free worker slot as well as the call.
    /// A timed-out worker is left to finish on its own and keeps its slot
    /// until then; its answer is dropped.
    fn call<T, F>(&self, lookup: F) -> Result<T, LookupFailure>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MetadataSource) -> Result<T, LookupFailure> + Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        let Some(permit) = self.permits.acquire(deadline) else {
            debug!("No free lookup slot within {:?}", self.timeout);
            return Err(self.timed_out());
        };

        let source = Arc::clone(&self.source);
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("deepcut-call".to_string())
            .spawn(move || {
                let _permit = permit;
                // Receiver may be gone after a timeout.
                let _ = tx.send(lookup(source.as_ref()));
            })
            .map_err(|e| LookupFailure::Unavailable(format!("cannot spawn lookup worker: {e}")))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => {
                Err(LookupFailure::Unavailable("lookup worker stopped without an answer".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CatalogEntry, CatalogSource, SimilarArtist};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn catalog() -> Arc<dyn MetadataSource> {
        let catalog = CatalogSource::new()
            .with_artist(
                "Traumer",
                CatalogEntry {
                    similar: vec![
                        SimilarArtist::new("Rhadoo", 0.4),
                        SimilarArtist::new("Cristi Cons", 0.9),
                        SimilarArtist::new("traumer", 1.0),
                        SimilarArtist::new("Petre Inspirescu", 0.4),
                        SimilarArtist::new("cristi  cons", 0.3),
                    ],
                    top_tracks: vec!["Hoodwink".into(), " ".into(), "Sistema".into(), "hoodwink".into()],
                    ..CatalogEntry::default()
                },
            )
            .with_artist(
                "Rhadoo",
                CatalogEntry {
                    top_tracks: vec!["Sunrise".into()],
                    ..CatalogEntry::default()
                },
            );
        Arc::new(catalog)
    }

    struct SlowSource {
        delay: Duration,
    }

    impl MetadataSource for SlowSource {
        fn similar_artists(&self, _name: &str) -> Result<Vec<SimilarArtist>, LookupFailure> {
            thread::sleep(self.delay);
            Ok(vec![SimilarArtist::new("Late", 1.0)])
        }

        fn top_tracks(&self, _name: &str) -> Result<Vec<String>, LookupFailure> {
            thread::sleep(self.delay);
            Ok(vec!["Late Track".into()])
        }

        fn artist_info(&self, name: &str) -> Result<ArtistInfo, LookupFailure> {
            Err(LookupFailure::Unavailable(format!("no info for {name}")))
        }
    }

    /// Records how many top-track lookups run at the same time.
    struct CountingSource {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MetadataSource for CountingSource {
        fn similar_artists(&self, _name: &str) -> Result<Vec<SimilarArtist>, LookupFailure> {
            Ok(Vec::new())
        }

        fn top_tracks(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![format!("{name} track")])
        }

        fn artist_info(&self, name: &str) -> Result<ArtistInfo, LookupFailure> {
            Err(LookupFailure::NotFound(name.to_string()))
        }
    }

    #[test]
    fn test_similar_artists_ranked_and_deduplicated() {
        let resolver = SimilarityResolver::with_defaults(catalog()).unwrap();
        let similar = resolver.similar_artists("Traumer", 10);
        assert_eq!(similar, vec!["Cristi Cons", "Rhadoo", "Petre Inspirescu"]);

        let limited = resolver.similar_artists("Traumer", 1);
        assert_eq!(limited, vec!["Cristi Cons"]);
    }

    #[test]
    fn test_unknown_artist_degrades_to_empty() {
        let resolver = SimilarityResolver::with_defaults(catalog()).unwrap();
        assert!(resolver.similar_artists("Nobody", 10).is_empty());
        assert!(resolver.top_tracks("Nobody", 5).is_empty());
        assert!(resolver.artist_info("Nobody").is_none());
    }

    #[test]
    fn test_top_tracks_cleaned_and_limited() {
        let resolver = SimilarityResolver::with_defaults(catalog()).unwrap();
        assert_eq!(resolver.top_tracks("traumer", 5), vec!["Hoodwink", "Sistema"]);
        assert_eq!(resolver.top_tracks("traumer", 1), vec!["Hoodwink"]);
        assert!(resolver.top_tracks("traumer", 0).is_empty());
    }

    #[test]
    fn test_timeout_returns_empty_quickly() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(800),
        });
        let resolver = SimilarityResolver::new(source, Duration::from_millis(50), 2).unwrap();

        let start = Instant::now();
        assert!(resolver.similar_artists("Anyone", 5).is_empty());
        assert!(resolver.top_tracks("Anyone", 5).is_empty());
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[test]
    fn test_top_tracks_for_preserves_order_and_skips_empty() {
        let resolver = SimilarityResolver::with_defaults(catalog()).unwrap();
        let artists = vec!["Rhadoo".to_string(), "Nobody".to_string(), "Traumer".to_string()];
        let resolved = resolver.top_tracks_for(&artists, 5);

        let names: Vec<&str> = resolved.iter().map(|a| a.artist.as_str()).collect();
        assert_eq!(names, vec!["Rhadoo", "Traumer"]);
        assert_eq!(resolved[0].tracks, vec!["Sunrise"]);
    }

    #[test]
    fn test_concurrency_is_bounded_and_order_stable() {
        let source = Arc::new(CountingSource {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let resolver =
            SimilarityResolver::new(Arc::clone(&source) as Arc<dyn MetadataSource>, Duration::from_secs(5), 2)
                .unwrap();

        let artists: Vec<String> = (0..12).map(|i| format!("Artist {i}")).collect();
        let resolved = resolver.top_tracks_for(&artists, 3);

        assert_eq!(resolved.len(), 12);
        for (i, entry) in resolved.iter().enumerate() {
            assert_eq!(entry.artist, format!("Artist {i}"));
            assert_eq!(entry.tracks, vec![format!("Artist {i} track")]);
        }
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
    }

    /// Never answers in time and records how many calls overlap.
    struct HangingSource {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MetadataSource for HangingSource {
        fn similar_artists(&self, _name: &str) -> Result<Vec<SimilarArtist>, LookupFailure> {
            Ok(Vec::new())
        }

        fn top_tracks(&self, _name: &str) -> Result<Vec<String>, LookupFailure> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec!["Too Late".into()])
        }

        fn artist_info(&self, name: &str) -> Result<ArtistInfo, LookupFailure> {
            Err(LookupFailure::NotFound(name.to_string()))
        }
    }

    #[test]
    fn test_abandoned_lookups_still_count_against_the_limit() {
        let source = Arc::new(HangingSource {
            delay: Duration::from_millis(400),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let resolver =
            SimilarityResolver::new(Arc::clone(&source) as Arc<dyn MetadataSource>, Duration::from_millis(20), 2)
                .unwrap();

        let artists: Vec<String> = (0..12).map(|i| format!("Artist {i}")).collect();
        let start = Instant::now();
        let resolved = resolver.top_tracks_for(&artists, 3);

        assert!(resolved.is_empty());
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(resolver.permits.in_flight() <= 2);
        // Let the abandoned workers finish before reading the peak.
        thread::sleep(Duration::from_millis(600));
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(resolver.permits.in_flight(), 0);
    }

    #[test]
    fn test_slot_frees_up_after_hung_worker_returns() {
        let source = Arc::new(HangingSource {
            delay: Duration::from_millis(100),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let resolver = SimilarityResolver::new(source, Duration::from_millis(20), 1).unwrap();

        assert!(resolver.top_tracks("First", 3).is_empty());
        // Slot still held by the abandoned worker.
        assert!(resolver.top_tracks("Second", 3).is_empty());
        thread::sleep(Duration::from_millis(200));
        assert_eq!(resolver.permits.in_flight(), 0);
    }

    #[test]
    fn test_invalid_resolver_options() {
        assert!(SimilarityResolver::new(catalog(), Duration::ZERO, 2).is_err());
        assert!(SimilarityResolver::new(catalog(), Duration::from_secs(1), 0).is_err());
    }
}
