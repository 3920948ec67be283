//! # Playlist Mixer
//!
//! Merges the relevant stream (top tracks of similar artists) with the
//! underground stream (top tracks of in-band genre artists) into a single
//! playlist.
//!
//! ## Split
//!
//! ```text
//! n_underground = round(target_length * adventurousness)
//! n_relevant    = target_length - n_underground
//! ```
//!
//! ## Interleave
//!
//! Each step takes from whichever stream is furthest behind its quota, so the
//! two sources are spread evenly through the playlist instead of appended one
//! after the other. Candidates whose (artist, title) identity is already in
//! the playlist are skipped. When one stream is exhausted or has met its
//! quota the other may fill the remaining slots, unless its own quota is zero:
//! adventurousness `0.0` never yields an underground track and `1.0` never
//! yields a relevant one.
//!
//! The result is fully deterministic for a given input.

use crate::corpus::normalize_name;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::resolver::ArtistTracks;
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Relevant,
    Underground,
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relevant => write!(f, "relevant"),
            Self::Underground => write!(f, "underground"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackCandidate {
    pub artist: String,
    pub title: String,
    pub source: TrackSource,
    /// Position within its source list.
    pub rank: usize,
}

impl TrackCandidate {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, source: TrackSource, rank: usize) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            source,
            rank,
        }
    }

    /// Deduplication key: normalized `(artist, title)`.
    #[must_use]
    pub fn identity(&self) -> (String, String) {
        (normalize_name(&self.artist), normalize_name(&self.title))
    }
}

impl fmt::Display for TrackCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Playlist {
    pub tracks: Vec<TrackCandidate>,
    pub requested_length: usize,
}

impl Playlist {
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Fewer tracks than requested. Not an error, just less data available.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.tracks.len() < self.requested_length
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackCandidate> {
        self.tracks.iter()
    }

    #[must_use]
    pub fn count(&self, source: TrackSource) -> usize {
        self.tracks.iter().filter(|t| t.source == source).count()
    }
}

/// Flatten resolved artists into candidates, artist by artist.
#[must_use]
pub fn candidates_from(artists: &[ArtistTracks], source: TrackSource) -> Vec<TrackCandidate> {
    artists
        .iter()
        .flat_map(|entry| entry.tracks.iter().map(move |title| (entry.artist.as_str(), title.as_str())))
        .enumerate()
        .map(|(rank, (artist, title))| TrackCandidate::new(artist, title, source, rank))
        .collect()
}

/// `(n_relevant, n_underground)` for a target length.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidParameter`] unless `adventurousness` is a
/// finite value in `[0, 1]`.
pub fn split(target_length: usize, adventurousness: f64) -> DiscoveryResult<(usize, usize)> {
    validate_adventurousness(adventurousness)?;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n_underground = ((target_length as f64) * adventurousness).round() as usize;
    let n_underground = n_underground.min(target_length);
    Ok((target_length - n_underground, n_underground))
}

/// # Errors
///
/// Returns [`DiscoveryError::InvalidParameter`] for NaN, infinite or out-of-range values.
pub fn validate_adventurousness(adventurousness: f64) -> DiscoveryResult<()> {
    if adventurousness.is_finite() && (0.0..=1.0).contains(&adventurousness) {
        Ok(())
    } else {
        Err(DiscoveryError::InvalidParameter(format!(
            "adventurousness must be within [0, 1], got {adventurousness}"
        )))
    }
}

/// Walks one input stream in order.
struct Stream<'a> {
    items: &'a [TrackCandidate],
    cursor: usize,
    quota: usize,
    taken: usize,
}

impl<'a> Stream<'a> {
    fn new(items: &'a [TrackCandidate], quota: usize) -> Self {
        Self {
            items,
            cursor: 0,
            quota,
            taken: 0,
        }
    }

    fn enabled(&self) -> bool {
        self.quota > 0 && self.cursor < self.items.len()
    }

    fn under_quota(&self) -> bool {
        self.enabled() && self.taken < self.quota
    }

    /// Next candidate not yet in the playlist, consuming duplicates on the way.
    fn next_unique(&mut self, seen: &HashSet<(String, String)>) -> Option<&'a TrackCandidate> {
        while let Some(candidate) = self.items.get(self.cursor) {
            self.cursor += 1;
            if !seen.contains(&candidate.identity()) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Relevant goes first when both streams are equally far along their quotas.
fn prefer_relevant(relevant: &Stream<'_>, underground: &Stream<'_>) -> bool {
    relevant.taken * underground.quota <= underground.taken * relevant.quota
}

/// Mix the two candidate streams into a playlist of at most `target_length`.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidParameter`] for an out-of-range
/// `adventurousness`. Empty inputs give an empty playlist.
pub fn mix(
    relevant: &[TrackCandidate],
    underground: &[TrackCandidate],
    adventurousness: f64,
    target_length: usize,
) -> DiscoveryResult<Playlist> {
    let (n_relevant, n_underground) = split(target_length, adventurousness)?;
    debug!(
        "Mixing {n_relevant} relevant and {n_underground} underground tracks from {} + {} candidates",
        relevant.len(),
        underground.len()
    );

    let mut rel = Stream::new(relevant, n_relevant);
    let mut und = Stream::new(underground, n_underground);
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut tracks: Vec<TrackCandidate> = Vec::with_capacity(target_length);

    while tracks.len() < target_length {
        let take_relevant = match (rel.under_quota(), und.under_quota()) {
            (true, true) => prefer_relevant(&rel, &und),
            (true, false) => true,
            (false, true) => false,
            // Quotas met or a stream ran dry: backfill from whatever is left.
            (false, false) => match (rel.enabled(), und.enabled()) {
                (true, true) => prefer_relevant(&rel, &und),
                (true, false) => true,
                (false, true) => false,
                (false, false) => break,
            },
        };

        let stream = if take_relevant { &mut rel } else { &mut und };
        if let Some(candidate) = stream.next_unique(&seen) {
            stream.taken += 1;
            seen.insert(candidate.identity());
            tracks.push(candidate.clone());
        }
    }

    let playlist = Playlist {
        tracks,
        requested_length: target_length,
    };
    debug!(
        "Mixed playlist: {} tracks ({} relevant, {} underground)",
        playlist.len(),
        playlist.count(TrackSource::Relevant),
        playlist.count(TrackSource::Underground)
    );
    Ok(playlist)
}
