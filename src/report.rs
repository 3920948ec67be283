//! # Report Rendering
//!
//! Plain-text and JSON output for the CLI. Every function returns a `String`
//! so the binary decides where it goes.

use crate::cluster::ClusterReport;
use crate::corpus::{normalize_name, Corpus};
use crate::mixer::{Playlist, TrackSource};
use crate::recommend::Recommendation;
use crate::threshold::GenreBand;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write;

const BAR_WIDTH: usize = 40;

/// `1234567` -> `1,234,567`.
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Numbered playlist with a marker for underground picks.
#[must_use]
pub fn playlist_text(recommendation: &Recommendation) -> String {
    let playlist = &recommendation.playlist;
    let mut out = String::new();

    let _ = writeln!(out, "Playlist for {} ({})", recommendation.seed, recommendation.genres.join(", "));
    if playlist.is_empty() {
        out.push_str("No tracks found.\n");
        return out;
    }

    for (i, track) in playlist.iter().enumerate() {
        let marker = match track.source {
            TrackSource::Underground => "  [underground]",
            TrackSource::Relevant => "",
        };
        let _ = writeln!(out, "{:>3}. {track}{marker}", i + 1);
    }

    let _ = writeln!(
        out,
        "\n{} relevant, {} underground",
        playlist.count(TrackSource::Relevant),
        playlist.count(TrackSource::Underground)
    );
    if playlist.is_short() {
        let _ = writeln!(
            out,
            "Note: only {} of {} requested tracks were available.",
            playlist.len(),
            playlist.requested_length
        );
    }
    out
}

/// Listener counts of the playlist's artists, quietest first, as text bars.
///
/// Artists the corpus does not know are left out.
#[must_use]
pub fn popularity_spectrum(playlist: &Playlist, corpus: &Corpus) -> String {
    let mut seen = HashSet::new();
    let mut rows: Vec<(&str, u64)> = playlist
        .iter()
        .filter(|track| seen.insert(normalize_name(&track.artist)))
        .filter_map(|track| corpus.get(&track.artist))
        .map(|record| (record.name.as_str(), record.listener_count))
        .collect();

    if rows.is_empty() {
        return "No listener data for these artists.\n".to_string();
    }
    rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let max = rows.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1);
    let name_width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);

    let mut out = String::from("Popularity spectrum (all-time listeners)\n");
    for (name, listeners) in rows {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let width = ((listeners as f64 / max as f64) * BAR_WIDTH as f64).round() as usize;
        let bar = "█".repeat(width.max(1));
        let _ = writeln!(out, "{name:<name_width$} {bar} {}", format_count(listeners));
    }
    out
}

/// One line per genre band.
#[must_use]
pub fn band_table(bands: &[GenreBand]) -> String {
    if bands.is_empty() {
        return "No genres.\n".to_string();
    }

    let genre_width = bands.iter().map(|b| b.genre.chars().count()).max().unwrap_or(5).max(5);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<genre_width$} {:>8} {:>12} {:>12}",
        "genre", "artists", "low", "high"
    );
    for band in bands {
        let note = if band.widened { "  (widened)" } else { "" };
        let _ = writeln!(
            out,
            "{:<genre_width$} {:>8} {:>12} {:>12}{note}",
            band.genre,
            band.population,
            format_count(band.low),
            format_count(band.high)
        );
    }
    out
}

#[must_use]
pub fn cluster_text(report: &ClusterReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} clusters over {} artists (seed {}, {} iterations{})",
        report.k,
        report.assignments.len(),
        report.seed,
        report.iterations,
        if report.converged { "" } else { ", not converged" }
    );

    for summary in &report.summaries {
        let genres: Vec<String> = summary
            .dominant_genres
            .iter()
            .take(3)
            .map(|(genre, count)| format!("{genre} ({count})"))
            .collect();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mean = summary.mean_popularity.round() as u64;
        let _ = writeln!(out, "\n[{}] {}", summary.cluster_id, summary.auto_label);
        let _ = writeln!(out, "    {} artists, mean {} listeners", summary.size, format_count(mean));
        let _ = writeln!(out, "    genres: {}", genres.join(", "));
        let _ = writeln!(out, "    e.g. {}", summary.example_artists.join(", "));
    }
    out
}

/// Pretty JSON for any report value.
///
/// # Errors
///
/// Fails only if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize report as JSON")
}
