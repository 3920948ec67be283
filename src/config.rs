//! # Configuration Module
//!
//! Data directory setup and user settings for deepcut.
//!
//! ## Data Storage
//!
//! The imported corpus lives in the platform-standard data directory:
//! - Linux: `~/.local/share/deepcut/corpus.db`
//! - macOS: `~/Library/Application Support/deepcut/corpus.db`
//! - Windows: `%APPDATA%\deepcut\corpus.db`
//!
//! ## Settings
//!
//! [`Settings`] is read from `config.json` in the platform config directory
//! (`~/.config/deepcut/config.json` on Linux). Every field is optional; a
//! missing file means defaults. Command-line flags override the file.
//!
//! ```json
//! {
//!   "playlist_length": 30,
//!   "adventurousness": 0.7,
//!   "catalog_path": "~/music/catalog.json"
//! }
//! ```

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::mixer::validate_adventurousness;
use anyhow::{Context, Result};
use log::debug;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "deepcut";
const DB_FILE: &str = "corpus.db";
const CONFIG_FILE: &str = "config.json";

/// Returns the deepcut data directory, creating it if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The deepcut subdirectory cannot be created due to permissions
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create deepcut data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the platform-appropriate corpus database path.
///
/// ```no_run
/// use deepcut::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Corpus database: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Location of the settings file. The directory is not created.
///
/// # Errors
///
/// Fails if the platform has no config directory.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory"))?;
    Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Resolve a user-supplied path against the current directory.
///
/// A leading `~/` is expanded to the home directory first.
///
/// # Errors
///
/// Fails if the current directory cannot be read.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    };

    let absolute = expanded
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?;
    Ok(absolute.into_owned())
}

/// User-tunable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playlist_length: usize,
    /// Share of underground tracks, 0.0 to 1.0.
    pub adventurousness: f64,
    pub tracks_per_artist: usize,
    /// Similar artists to resolve. Defaults to the playlist length.
    pub similar_artist_limit: Option<usize>,
    /// Underground artists to pick per seed genre. Defaults to the playlist length.
    pub underground_artist_limit: Option<usize>,
    /// Genres smaller than this get the widened [min, max] band.
    pub min_genre_population: usize,
    pub lookup_timeout_ms: u64,
    pub max_concurrent_lookups: usize,
    pub cluster_max_iterations: usize,
    pub catalog_path: Option<PathBuf>,
    pub corpus_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            playlist_length: 20,
            adventurousness: 0.5,
            tracks_per_artist: 5,
            similar_artist_limit: None,
            underground_artist_limit: None,
            min_genre_population: crate::threshold::DEFAULT_MIN_POPULATION,
            lookup_timeout_ms: 10_000,
            max_concurrent_lookups: crate::resolver::DEFAULT_MAX_CONCURRENT_LOOKUPS,
            cluster_max_iterations: crate::cluster::DEFAULT_MAX_ITERATIONS,
            catalog_path: None,
            corpus_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default config file, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be parsed or holds invalid values.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid JSON, or does not validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let mut settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;

        settings.catalog_path = settings.catalog_path.as_deref().map(absolute_path).transpose()?;
        settings.corpus_path = settings.corpus_path.as_deref().map(absolute_path).transpose()?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject zero sizes and out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidParameter`] naming the first bad field.
    pub fn validate(&self) -> DiscoveryResult<()> {
        let positive = [
            ("playlist_length", self.playlist_length),
            ("tracks_per_artist", self.tracks_per_artist),
            ("min_genre_population", self.min_genre_population),
            ("max_concurrent_lookups", self.max_concurrent_lookups),
            ("cluster_max_iterations", self.cluster_max_iterations),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(DiscoveryError::InvalidParameter(format!("{field} must be at least 1")));
        }
        if self.similar_artist_limit == Some(0) {
            return Err(DiscoveryError::InvalidParameter(
                "similar_artist_limit must be at least 1".to_string(),
            ));
        }
        if self.underground_artist_limit == Some(0) {
            return Err(DiscoveryError::InvalidParameter(
                "underground_artist_limit must be at least 1".to_string(),
            ));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(DiscoveryError::InvalidParameter(
                "lookup_timeout_ms must be positive".to_string(),
            ));
        }
        validate_adventurousness(self.adventurousness)
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Similar artists to resolve for a playlist of `playlist_length`.
    #[must_use]
    pub fn similar_limit(&self, playlist_length: usize) -> usize {
        self.similar_artist_limit.unwrap_or(playlist_length)
    }

    /// Underground artists per genre for a playlist of `playlist_length`.
    #[must_use]
    pub fn underground_limit(&self, playlist_length: usize) -> usize {
        self.underground_artist_limit.unwrap_or(playlist_length)
    }
}
