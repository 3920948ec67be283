//! # Integration Tests for deepcut
//!
//! End-to-end checks from a user's point of view: the CLI binary against a
//! temporary corpus and catalog, and the library pipeline as a whole.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CORPUS_CSV: &str = "\
artist_name,listeners,tag
Seed Artist,5000,techno
Big Friend,80000,techno
Tiny,100,techno
Mid A,1200,techno
Mid B,3000,techno
Giant,2000000,techno
Ghost,,techno
Seed Artist,5000,minimal
Min A,800,minimal
Min B,2000,minimal
Min C,9000,minimal
Min D,400000,minimal
";

const CATALOG_JSON: &str = r#"{
  "artists": {
    "Seed Artist": {
      "listeners": 5000,
      "tags": ["techno", "minimal"],
      "similar": [
        { "name": "Big Friend", "match": 0.9 },
        { "name": "Giant", "match": 0.5 }
      ],
      "top_tracks": ["Seed Song"]
    },
    "Big Friend": { "top_tracks": ["BF One", "BF Two", "BF Three"] },
    "Giant": { "top_tracks": ["G One", "G Two", "G Three"] },
    "Mid B": { "top_tracks": ["MB One", "MB Two", "MB Three"] },
    "Min B": { "top_tracks": ["NB One", "NB Two"] },
    "Min C": { "top_tracks": ["NC One", "NC Two"] },
    "Visitor": {
      "listeners": 700,
      "tags": ["Minimal", "ambient"],
      "similar": [{ "name": "Big Friend", "match": 0.4 }]
    }
  }
}"#;

/// Temporary corpus CSV and catalog JSON.
struct Fixture {
    dir: TempDir,
    corpus: PathBuf,
    catalog: PathBuf,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let corpus = dir.path().join("corpus.csv");
        let catalog = dir.path().join("catalog.json");
        std::fs::write(&corpus, CORPUS_CSV)?;
        std::fs::write(&catalog, CATALOG_JSON)?;
        Ok(Self { dir, corpus, catalog })
    }

    /// Settings file that does not exist, so runs never read the user's config.
    fn config(&self) -> PathBuf {
        self.dir.path().join("no-config.json")
    }
}

fn deepcut(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_deepcut"))
        .args(args)
        .env_remove("DEEPCUT_CORPUS")
        .env_remove("DEEPCUT_CATALOG")
        .output()
        .expect("Failed to run deepcut")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = deepcut(&["--help"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success());
        assert!(stdout.contains("deepcut"));
        assert!(stdout.contains("recommend"));
        assert!(stdout.contains("cluster"));
        assert!(stdout.contains("bands"));
        assert!(!stdout.contains("complete-artists"));
    }

    #[test]
    fn test_cli_version_flag() {
        let output = deepcut(&["--version"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("deepcut"));
        assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_completion_generation() {
        let output = deepcut(&["completion", "bash"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("_deepcut"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_enhanced_completion_completes_artists() -> Result<()> {
        let output = deepcut(&["completion-enhanced", "fish"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("deepcut complete-artists --plain"));

        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "complete-artists",
            "--corpus",
            path_str(&fx.corpus),
        ]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let names: Vec<&str> = stdout.lines().collect();
        assert!(names.contains(&"\"Seed Artist\""));
        assert!(names.contains(&"Tiny"));
        assert!(!names.contains(&"Ghost"));

        assert!(!deepcut(&["completion-enhanced", "zsh"]).status.success());
        Ok(())
    }

    #[test]
    fn test_recommend_text_output() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "recommend",
            "seed artist",
            "--corpus",
            path_str(&fx.corpus),
            "--catalog",
            path_str(&fx.catalog),
            "-n",
            "8",
            "-a",
            "0.5",
            "--spectrum",
        ]);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
        assert!(stdout.contains("Playlist for Seed Artist"));
        assert!(stdout.contains("4 relevant, 4 underground"));
        assert!(stdout.contains("[underground]"));
        assert!(stdout.contains("Popularity spectrum"));
        Ok(())
    }

    #[test]
    fn test_recommend_json_output() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "recommend",
            "Seed Artist",
            "--corpus",
            path_str(&fx.corpus),
            "--catalog",
            path_str(&fx.catalog),
            "-n",
            "8",
            "-a",
            "1",
            "--json",
        ]);
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let tracks = value["playlist"]["tracks"].as_array().expect("tracks array");
        assert_eq!(tracks.len(), 7);
        assert!(tracks.iter().all(|t| t["source"] == "underground"));
        assert_eq!(value["genres"], serde_json::json!(["techno", "minimal"]));
        Ok(())
    }

    #[test]
    fn test_recommend_unknown_seed_fails() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "recommend",
            "Nobody Knows Me",
            "--corpus",
            path_str(&fx.corpus),
            "--catalog",
            path_str(&fx.catalog),
        ]);
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Nobody Knows Me"));
        Ok(())
    }

    #[test]
    fn test_recommend_without_catalog_fails() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "recommend",
            "Seed Artist",
            "--corpus",
            path_str(&fx.corpus),
        ]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("catalog"));
        Ok(())
    }

    #[test]
    fn test_bands_command() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "bands",
            "minimal",
            "--corpus",
            path_str(&fx.corpus),
        ]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("minimal"));
        assert!(stdout.contains("2,000"));
        assert!(stdout.contains("9,000"));
        assert!(!stdout.contains("techno"));

        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "bands",
            "gabber",
            "--corpus",
            path_str(&fx.corpus),
        ]);
        assert!(!output.status.success());
        Ok(())
    }

    #[test]
    fn test_cluster_command_is_reproducible() -> Result<()> {
        let fx = Fixture::new()?;
        let config = fx.config();
        let args = [
            "--config",
            path_str(&config),
            "cluster",
            "-k",
            "3",
            "--seed",
            "11",
            "--corpus",
            path_str(&fx.corpus),
            "--json",
        ];
        let first = deepcut(&args);
        let second = deepcut(&args);
        assert!(first.status.success(), "stderr: {}", String::from_utf8_lossy(&first.stderr));
        assert_eq!(first.stdout, second.stdout);

        let value: serde_json::Value = serde_json::from_slice(&first.stdout)?;
        assert_eq!(value["assignments"].as_array().map(Vec::len), Some(10));
        Ok(())
    }

    #[test]
    fn test_cluster_rejects_bad_k() -> Result<()> {
        let fx = Fixture::new()?;
        let output = deepcut(&[
            "--config",
            path_str(&fx.config()),
            "cluster",
            "-k",
            "1",
            "--corpus",
            path_str(&fx.corpus),
        ]);
        assert!(!output.status.success());
        Ok(())
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use deepcut::config::Settings;
    use deepcut::mixer::TrackSource;
    use deepcut::recommend::{DiscoveryEngine, RecommendationRequest};
    use deepcut::resolver::SimilarityResolver;
    use deepcut::source::CatalogSource;
    use deepcut::store;
    use deepcut::DiscoveryError;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn engine_parts(fx: &Fixture) -> Result<(deepcut::corpus::Corpus, SimilarityResolver)> {
        let corpus = store::load_csv(&fx.corpus)?;
        let source = CatalogSource::from_path(&fx.catalog)?;
        let resolver = SimilarityResolver::with_defaults(Arc::new(source))?;
        Ok((corpus, resolver))
    }

    #[test]
    fn test_full_pipeline() -> Result<()> {
        let fx = Fixture::new()?;
        let (corpus, resolver) = engine_parts(&fx)?;
        // Ghost has no listener count and is skipped
        assert_eq!(corpus.len(), 10);

        let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());
        let rec = engine.recommend(&RecommendationRequest::new("Seed Artist", 0.5, 8))?;

        let similar: Vec<&str> = rec.similar.iter().map(|a| a.artist.as_str()).collect();
        assert_eq!(similar, vec!["Big Friend", "Giant"]);

        let mut underground: Vec<&str> = rec.underground.iter().map(|a| a.artist.as_str()).collect();
        underground.sort_unstable();
        assert_eq!(underground, vec!["Mid B", "Min B", "Min C"]);

        assert_eq!(rec.playlist.len(), 8);
        assert_eq!(rec.playlist.count(TrackSource::Relevant), 4);
        assert_eq!(rec.playlist.count(TrackSource::Underground), 4);

        let identities: HashSet<_> = rec.playlist.iter().map(|t| t.identity()).collect();
        assert_eq!(identities.len(), rec.playlist.len());
        Ok(())
    }

    #[test]
    fn test_pipeline_is_deterministic() -> Result<()> {
        let fx = Fixture::new()?;
        let (corpus, resolver) = engine_parts(&fx)?;
        let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());

        let request = RecommendationRequest::new("Seed Artist", 0.7, 10);
        let first = engine.recommend(&request)?;
        let second = engine.recommend(&request)?;
        assert_eq!(first.playlist, second.playlist);
        Ok(())
    }

    #[test]
    fn test_seed_known_only_to_catalog() -> Result<()> {
        let fx = Fixture::new()?;
        let (corpus, resolver) = engine_parts(&fx)?;
        let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());

        let rec = engine.recommend(&RecommendationRequest::new("Visitor", 0.5, 6))?;
        assert_eq!(rec.genres, vec!["minimal"]);
        assert!(rec.underground.iter().all(|a| a.artist != "Visitor"));
        assert!(rec.playlist.count(TrackSource::Relevant) > 0);
        Ok(())
    }

    #[test]
    fn test_unknown_seed() -> Result<()> {
        let fx = Fixture::new()?;
        let (corpus, resolver) = engine_parts(&fx)?;
        let engine = DiscoveryEngine::new(&corpus, resolver, &Settings::default());

        let err = engine
            .recommend(&RecommendationRequest::new("Nobody", 0.5, 6))
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownArtist(_)));
        Ok(())
    }

    #[test]
    fn test_negative_listener_count_loads_nothing() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "artist_name,listeners,tag\nA,100,techno\nB,-5,techno\n")?;

        let err = store::load_csv(&path).unwrap_err();
        assert!(matches!(err, DiscoveryError::Data(_)));
        Ok(())
    }

    #[test]
    fn test_csv_database_csv_round_trip() -> Result<()> {
        let fx = Fixture::new()?;
        let corpus = store::load_csv(&fx.corpus)?;

        let db_path = fx.dir.path().join("corpus.db");
        let rows = store::import_corpus(&db_path, &corpus, false)?;
        assert_eq!(rows, 11);
        assert!(store::import_corpus(&db_path, &corpus, false).is_err());

        let from_db = store::load_database(&db_path)?;
        let exported = fx.dir.path().join("export.csv");
        store::save_csv(&from_db, &exported)?;
        let reloaded = store::load_csv(&exported)?;

        assert_eq!(reloaded.records(), corpus.records());

        // the table is plain SQLite, readable without deepcut
        let conn = rusqlite::Connection::open(&db_path)?;
        let techno: i64 = conn.query_row("SELECT COUNT(*) FROM artists WHERE tag = 'techno'", [], |row| row.get(0))?;
        assert_eq!(techno, 6);
        Ok(())
    }
}
