//! Underground electronic music discovery.
//!
//! Given a seed artist, deepcut mixes top tracks of similar artists with
//! tracks from lesser-known artists of the same genres. "Lesser-known" is
//! relative to each genre: an artist is underground when its listener count
//! sits between the 25th and 75th percentile of its genre in a local corpus.
//!
//! Core modules:
//! - [`corpus`] - Artist corpus and genre statistics
//! - [`threshold`] - Per-genre underground listener bands
//! - [`resolver`] - Similar artists and top tracks, with timeouts
//! - [`selector`] - Underground artist selection
//! - [`mixer`] - Playlist mixing by adventurousness
//! - [`cluster`] - Popularity clustering of the corpus
//! - [`recommend`] - The full pipeline
//!
//! ### Supporting Modules
//!
//! - [`source`] - Metadata source trait and the offline JSON catalog
//! - [`store`] - CSV and SQLite persistence of the corpus
//! - [`report`] - Text and JSON rendering
//! - [`config`] - Data directory and settings
//! - [`error`] - Error types
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use deepcut::config::Settings;
//! use deepcut::recommend::{DiscoveryEngine, RecommendationRequest};
//! use deepcut::resolver::SimilarityResolver;
//! use deepcut::source::CatalogSource;
//! use deepcut::{cluster, report, store};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let corpus = store::load_csv(Path::new("lastfm_artists_with_listeners.csv"))?;
//! let source = CatalogSource::from_path(Path::new("catalog.json"))?;
//! let resolver = SimilarityResolver::with_defaults(Arc::new(source))?;
//!
//! let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());
//! let recommendation = engine.recommend(&RecommendationRequest::new("Traumer", 0.7, 20))?;
//! print!("{}", report::playlist_text(&recommendation));
//!
//! let clusters = cluster::cluster(&corpus, 5, cluster::ClusterOptions::seeded(42))?;
//! print!("{}", report::cluster_text(&clusters));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`error::DiscoveryResult`]. Lookup failures
//! never abort a recommendation; they shrink it. File handling and the
//! binary use `anyhow::Result` with context.
//!
//! ## Testing
//!
//! Unit tests live next to each module, CLI workflows in
//! `tests/integration_tests.rs`, and benchmarks in `benches/`.

pub mod cli;
pub mod cluster;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod error;
pub mod mixer;
pub mod recommend;
pub mod report;
pub mod resolver;
pub mod selector;
pub mod source;
pub mod store;
pub mod threshold;

pub use error::{DiscoveryError, DiscoveryResult, LookupFailure};
