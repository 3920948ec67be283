//! # deepcut
//!
//! Command-line front end: loads settings and the corpus, then routes each
//! subcommand to the library.
//!
//! Logging goes through `env_logger` and is controlled via `RUST_LOG`:
//! - `RUST_LOG=info deepcut recommend Traumer` - pipeline steps
//! - `RUST_LOG=deepcut::resolver=debug deepcut recommend Traumer` - lookup details

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use deepcut::cli::{self, Args};
use deepcut::cluster::{self, ClusterOptions};
use deepcut::config::{self, Settings};
use deepcut::corpus::Corpus;
use deepcut::recommend::{DiscoveryEngine, RecommendationRequest};
use deepcut::resolver::SimilarityResolver;
use deepcut::source::CatalogSource;
use deepcut::threshold::ThresholdCalculator;
use deepcut::{completion, report, store};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from(&config::absolute_path(path)?),
        None => Settings::load(),
    }
}

/// Corpus from an explicit CSV (flag, env or settings), else the imported database.
fn load_corpus(csv: Option<PathBuf>, settings: &Settings) -> Result<Corpus> {
    if let Some(path) = csv.or_else(|| settings.corpus_path.clone()) {
        let path = config::absolute_path(&path)?;
        debug!("Loading corpus CSV {}", path.display());
        return store::load_csv(&path).with_context(|| format!("Failed to load corpus from {}", path.display()));
    }

    let db_path = config::get_db_path()?;
    debug!("Loading corpus database {}", db_path.display());
    store::load_database(&db_path)
}

#[allow(clippy::too_many_arguments)]
fn recommend(
    settings: &Settings,
    seed: &str,
    adventurousness: Option<f64>,
    length: Option<usize>,
    corpus: Option<PathBuf>,
    catalog: Option<PathBuf>,
    json: bool,
    spectrum: bool,
) -> Result<()> {
    let corpus = load_corpus(corpus, settings)?;

    let catalog_path = catalog
        .or_else(|| settings.catalog_path.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("No metadata catalog configured. Pass --catalog, set DEEPCUT_CATALOG, or add catalog_path to the settings file.")
        })?;
    let catalog_path = config::absolute_path(&catalog_path)?;
    let source = CatalogSource::from_path(&catalog_path)?;
    info!("Loaded catalog with {} artists from {}", source.len(), catalog_path.display());

    let resolver = SimilarityResolver::new(
        Arc::new(source),
        settings.lookup_timeout(),
        settings.max_concurrent_lookups,
    )?;
    let engine = DiscoveryEngine::new(&corpus, resolver, settings);

    let request = RecommendationRequest::new(
        seed,
        adventurousness.unwrap_or(settings.adventurousness),
        length.unwrap_or(settings.playlist_length),
    );
    let recommendation = engine
        .recommend(&request)
        .with_context(|| format!("Could not build a playlist for '{seed}'"))?;

    if json {
        println!("{}", report::to_json(&recommendation)?);
        return Ok(());
    }

    print!("{}", report::playlist_text(&recommendation));
    if spectrum {
        println!();
        print!("{}", report::popularity_spectrum(&recommendation.playlist, &corpus));
    }
    Ok(())
}

fn bands(settings: &Settings, genres: &[String], corpus: Option<PathBuf>) -> Result<()> {
    let corpus = load_corpus(corpus, settings)?;
    let thresholds = ThresholdCalculator::with_min_population(&corpus, settings.min_genre_population);

    let bands = if genres.is_empty() {
        thresholds.all_bands()
    } else {
        genres
            .iter()
            .map(|genre| thresholds.band_for(genre))
            .collect::<Result<Vec<_>, _>>()?
    };

    print!("{}", report::band_table(&bands));
    Ok(())
}

/// Main entry point for deepcut.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to the library. Errors are reported by `anyhow` with their context chain.
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        cli::Command::Recommend {
            seed,
            adventurousness,
            length,
            corpus,
            catalog,
            json,
            spectrum,
        } => {
            let settings = load_settings(args.config.as_deref())?;
            recommend(&settings, &seed, adventurousness, length, corpus, catalog, json, spectrum)?;
        }
        cli::Command::Cluster { k, seed, corpus, json } => {
            let settings = load_settings(args.config.as_deref())?;
            let corpus = load_corpus(corpus, &settings)?;
            let options = ClusterOptions {
                seed,
                max_iterations: settings.cluster_max_iterations,
            };
            let report = cluster::cluster(&corpus, k, options)?;

            if json {
                println!("{}", report::to_json(&report)?);
            } else {
                print!("{}", report::cluster_text(&report));
            }
        }
        cli::Command::Bands { genres, corpus } => {
            let settings = load_settings(args.config.as_deref())?;
            bands(&settings, &genres, corpus)?;
        }
        cli::Command::Import { path, force } => {
            let path = config::absolute_path(&path)?;
            info!("Importing corpus from: {}", path.display());
            let corpus = store::load_csv(&path)?;
            let db_path = config::get_db_path()?;
            let rows = store::import_corpus(&db_path, &corpus, force)?;
            println!(
                "Imported {} artists ({rows} artist-genre rows) into {}",
                corpus.len(),
                db_path.display()
            );
        }
        cli::Command::Export { path } => {
            let path = config::absolute_path(&path)?;
            let corpus = store::load_database(&config::get_db_path()?)?;
            store::save_csv(&corpus, &path)?;
            println!("Exported {} artists to {}", corpus.len(), path.display());
        }
        cli::Command::Completion { shell } => {
            let mut cmd = Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        cli::Command::CompletionEnhanced { shell } => match shell {
            cli::Shell::Bash => print!("{}", completion::enhanced_bash_completion()),
            cli::Shell::Fish => print!("{}", completion::enhanced_fish_completion()),
            other => {
                anyhow::bail!(
                    "Enhanced completions are available for bash and fish only; use `deepcut completion` for {other:?}"
                );
            }
        },
        cli::Command::CompleteArtists { corpus, plain } => {
            // Completion must stay quiet when there is no corpus yet.
            let Ok(settings) = load_settings(args.config.as_deref()) else {
                return Ok(());
            };
            if let Ok(corpus) = load_corpus(corpus, &settings) {
                completion::write_artist_completions(&corpus, plain, &mut std::io::stdout().lock())?;
            }
        }
    }

    Ok(())
}
