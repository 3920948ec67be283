//! # Artist Clustering
//!
//! Groups corpus artists by how popular they are and how mainstream their
//! genre is, then names the groups.
//!
//! ## Features
//!
//! ```text
//! log_listeners          = ln(1 + listeners)
//! genre_mainstream_score = ln(1 + mean listeners of the primary genre)
//! ```
//!
//! Both are standardized (z-scores) so neither dominates the distance.
//!
//! ## Algorithm
//!
//! k-means with k-means++ initialization. The random generator is seeded
//! explicitly; passing the same seed and `k` reproduces the exact same
//! assignments. Iterates until no artist changes cluster or the iteration cap
//! is reached.
//!
//! ## Labels
//!
//! Clusters are ranked by mean listener count and mapped onto
//! [`LABEL_TIERS`], lowest to highest, then suffixed with the cluster's most
//! frequent genre.

use crate::corpus::{ArtistRecord, Corpus};
use crate::error::{DiscoveryError, DiscoveryResult};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;

/// Qualitative popularity tiers, least to most popular.
pub const LABEL_TIERS: [&str; 5] = [
    "Underground Favorites",
    "Rising Talent",
    "Established Names",
    "Crowd Pleasers",
    "Mainstream Giants",
];

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const EXAMPLE_ARTISTS: usize = 5;

type Point = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterOptions {
    /// `None` draws a fresh seed, so repeated runs may differ.
    pub seed: Option<u64>,
    pub max_iterations: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ClusterOptions {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

/// Standardized features an artist was clustered on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterFeatures {
    pub log_listeners: f64,
    pub genre_mainstream_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub artist: String,
    pub cluster_id: usize,
    pub features: ClusterFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub size: usize,
    pub mean_popularity: f64,
    /// Genre frequencies over all member tags, most frequent first.
    pub dominant_genres: Vec<(String, usize)>,
    /// Most listened members first.
    pub example_artists: Vec<String>,
    pub auto_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub k: usize,
    pub seed: u64,
    pub iterations: usize,
    pub converged: bool,
    pub assignments: Vec<ClusterAssignment>,
    /// One entry per non-empty cluster, ordered by cluster id.
    pub summaries: Vec<ClusterSummary>,
}

impl ClusterReport {
    #[must_use]
    pub fn summary_for(&self, cluster_id: usize) -> Option<&ClusterSummary> {
        self.summaries.iter().find(|s| s.cluster_id == cluster_id)
    }

    #[must_use]
    pub fn cluster_of(&self, artist: &str) -> Option<usize> {
        let key = crate::corpus::normalize_name(artist);
        self.assignments
            .iter()
            .find(|a| crate::corpus::normalize_name(&a.artist) == key)
            .map(|a| a.cluster_id)
    }
}

/// Cluster every corpus artist into `k` groups.
///
/// # Errors
///
/// Returns [`DiscoveryError::InvalidParameter`] if `k` is outside
/// `[2, corpus.len()]` or `options.max_iterations` is zero.
pub fn cluster(corpus: &Corpus, k: usize, options: ClusterOptions) -> DiscoveryResult<ClusterReport> {
    let population = corpus.len();
    if k < 2 || k > population {
        return Err(DiscoveryError::InvalidParameter(format!(
            "cluster count must be within [2, {population}], got {k}"
        )));
    }
    if options.max_iterations == 0 {
        return Err(DiscoveryError::InvalidParameter(
            "max_iterations must be at least 1".to_string(),
        ));
    }

    let records = corpus.records();
    let points = standardize(&raw_features(corpus));

    let seed = options.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);
    debug!("Clustering {population} artists into {k} clusters (seed {seed})");

    let fit = kmeans(&points, k, &mut rng, options.max_iterations);
    info!(
        "k-means finished after {} iterations (converged: {})",
        fit.iterations, fit.converged
    );

    let assignments = records
        .iter()
        .zip(points.iter())
        .zip(fit.assignments.iter())
        .map(|((record, point), &cluster_id)| ClusterAssignment {
            artist: record.name.clone(),
            cluster_id,
            features: ClusterFeatures {
                log_listeners: point[0],
                genre_mainstream_score: point[1],
            },
        })
        .collect();

    Ok(ClusterReport {
        k,
        seed,
        iterations: fit.iterations,
        converged: fit.converged,
        assignments,
        summaries: summarize(records, &fit.assignments, k),
    })
}

#[allow(clippy::cast_precision_loss)]
fn raw_features(corpus: &Corpus) -> Vec<Point> {
    let mut genre_means: HashMap<&str, f64> = HashMap::new();

    corpus
        .records()
        .iter()
        .map(|record| {
            let log_listeners = (record.listener_count as f64).ln_1p();
            let genre_mean = record.primary_genre().map_or(0.0, |genre| {
                *genre_means
                    .entry(genre)
                    .or_insert_with(|| corpus.mean_listeners(genre).unwrap_or(0.0))
            });
            [log_listeners, genre_mean.ln_1p()]
        })
        .collect()
}

/// Z-score each column. A column without variance becomes all zeros.
#[allow(clippy::cast_precision_loss)]
fn standardize(points: &[Point]) -> Vec<Point> {
    let n = points.len() as f64;
    let mut scaled = points.to_vec();

    for dim in 0..2 {
        let mean = points.iter().map(|p| p[dim]).sum::<f64>() / n;
        let variance = points.iter().map(|p| (p[dim] - mean).powi(2)).sum::<f64>() / n;
        let std_deviation = variance.sqrt();

        for point in &mut scaled {
            point[dim] = if std_deviation > f64::EPSILON && std_deviation.is_finite() {
                (point[dim] - mean) / std_deviation
            } else {
                0.0
            };
        }
    }
    scaled
}

fn distance2(a: &Point, b: &Point) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest(point: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, centroid) in centroids.iter().enumerate() {
        let d = distance2(point, centroid);
        if d < best_distance {
            best_distance = d;
            best = index;
        }
    }
    best
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the closest chosen one.
fn initial_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())]];

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| centroids.iter().map(|c| distance2(p, c)).fold(f64::INFINITY, f64::min))
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
            for (index, &weight) in weights.iter().enumerate() {
                if weight <= 0.0 {
                    continue;
                }
                target -= weight;
                if target <= 0.0 {
                    chosen = index;
                    break;
                }
            }
            chosen
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..points.len())
        };

        trace!("k-means++ picked point {next} as centroid {}", centroids.len());
        centroids.push(points[next]);
    }
    centroids
}

struct KMeansFit {
    assignments: Vec<usize>,
    iterations: usize,
    converged: bool,
}

#[allow(clippy::cast_precision_loss)]
fn kmeans(points: &[Point], k: usize, rng: &mut StdRng, max_iterations: usize) -> KMeansFit {
    let mut centroids = initial_centroids(points, k, rng);
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;

        let mut changed = false;
        for (point, assignment) in points.iter().zip(assignments.iter_mut()) {
            let best = nearest(point, &centroids);
            if *assignment != best {
                *assignment = best;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }

        let mut sums = vec![[0.0f64; 2]; k];
        let mut counts = vec![0usize; k];
        for (point, &cluster) in points.iter().zip(assignments.iter()) {
            sums[cluster][0] += point[0];
            sums[cluster][1] += point[1];
            counts[cluster] += 1;
        }
        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums.iter()).zip(counts.iter()) {
            // Empty clusters keep their previous centroid.
            if count > 0 {
                *centroid = [sum[0] / count as f64, sum[1] / count as f64];
            }
        }
    }

    KMeansFit {
        assignments,
        iterations,
        converged,
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize(records: &[ArtistRecord], assignments: &[usize], k: usize) -> Vec<ClusterSummary> {
    let mut members: Vec<Vec<&ArtistRecord>> = vec![Vec::new(); k];
    for (record, &cluster) in records.iter().zip(assignments.iter()) {
        members[cluster].push(record);
    }

    let mut summaries: Vec<ClusterSummary> = members
        .into_iter()
        .enumerate()
        .filter(|(_, group)| !group.is_empty())
        .map(|(cluster_id, mut group)| {
            let mean_popularity =
                group.iter().map(|r| r.listener_count as f64).sum::<f64>() / group.len() as f64;

            let mut genre_counts: HashMap<&str, usize> = HashMap::new();
            for record in &group {
                for tag in &record.tags {
                    *genre_counts.entry(tag.as_str()).or_insert(0) += 1;
                }
            }
            let mut dominant_genres: Vec<(String, usize)> =
                genre_counts.into_iter().map(|(g, c)| (g.to_string(), c)).collect();
            dominant_genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            group.sort_by(|a, b| b.listener_count.cmp(&a.listener_count).then_with(|| a.name.cmp(&b.name)));
            let example_artists = group.iter().take(EXAMPLE_ARTISTS).map(|r| r.name.clone()).collect();

            ClusterSummary {
                cluster_id,
                size: group.len(),
                mean_popularity,
                dominant_genres,
                example_artists,
                auto_label: String::new(),
            }
        })
        .collect();

    let mut by_popularity: Vec<usize> = (0..summaries.len()).collect();
    by_popularity.sort_by(|&a, &b| {
        summaries[a]
            .mean_popularity
            .partial_cmp(&summaries[b].mean_popularity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| summaries[a].cluster_id.cmp(&summaries[b].cluster_id))
    });

    let clusters = summaries.len();
    for (rank, index) in by_popularity.into_iter().enumerate() {
        let summary = &mut summaries[index];
        let tier = LABEL_TIERS[tier_for_rank(rank, clusters)];
        summary.auto_label = match summary.dominant_genres.first() {
            Some((genre, _)) => format!("{tier} · {genre}"),
            None => tier.to_string(),
        };
    }

    summaries
}

/// Spread `clusters` popularity ranks evenly over the label tiers.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tier_for_rank(rank: usize, clusters: usize) -> usize {
    let last_tier = LABEL_TIERS.len() - 1;
    if clusters <= 1 {
        return last_tier / 2;
    }
    ((rank as f64) * (last_tier as f64) / ((clusters - 1) as f64)).round() as usize
}
