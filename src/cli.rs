//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `deepcut` binary.
//!
//! ## Commands
//!
//! - `recommend`: Build a playlist from a seed artist
//! - `cluster`: Group the corpus by popularity profile
//! - `bands`: Show the underground listener band per genre
//! - `import` / `export`: Move the corpus between CSV and the database
//! - `completion`: Generate shell completion scripts
//! - `completion-enhanced`: Bash and fish scripts that complete artist names
//!
//! ## Examples
//!
//! ```bash
//! deepcut import lastfm_artists_with_listeners.csv
//! deepcut recommend "Traumer" -a 0.7 --catalog catalog.json
//! deepcut cluster -k 5 --seed 42
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "deepcut")]
#[command(about = "deepcut: underground electronic music discovery")]
#[command(version)]
pub struct Args {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recommend a playlist based on a seed artist
    ///
    /// Mixes top tracks of similar artists with tracks from underground
    /// artists of the seed's genres. Adventurousness sets the underground
    /// share: 0 is similar artists only, 1 is underground only.
    Recommend {
        /// Seed artist name (case-insensitive)
        #[arg(value_hint = clap::ValueHint::Other)]
        seed: String,

        /// Share of underground tracks, 0.0 to 1.0
        #[arg(short, long)]
        adventurousness: Option<f64>,

        /// Number of tracks in the playlist
        #[arg(short = 'n', long)]
        length: Option<usize>,

        /// Read the corpus from a CSV file instead of the database
        #[arg(long, env = "DEEPCUT_CORPUS", value_hint = clap::ValueHint::FilePath)]
        corpus: Option<PathBuf>,

        /// JSON catalog answering similar-artist and top-track lookups
        #[arg(long, env = "DEEPCUT_CATALOG", value_hint = clap::ValueHint::FilePath)]
        catalog: Option<PathBuf>,

        /// Print the full recommendation as JSON
        #[arg(long)]
        json: bool,

        /// Also print the popularity spectrum of the playlist's artists
        #[arg(long)]
        spectrum: bool,
    },

    /// Cluster corpus artists by listener count and genre popularity
    Cluster {
        /// Number of clusters
        #[arg(short, default_value = "5")]
        k: usize,

        /// Random seed; the same seed reproduces the same clusters
        #[arg(long)]
        seed: Option<u64>,

        /// Read the corpus from a CSV file instead of the database
        #[arg(long, env = "DEEPCUT_CORPUS", value_hint = clap::ValueHint::FilePath)]
        corpus: Option<PathBuf>,

        /// Print the cluster report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the underground listener band of each genre
    Bands {
        /// Genres to show (all genres if omitted)
        genres: Vec<String>,

        /// Read the corpus from a CSV file instead of the database
        #[arg(long, env = "DEEPCUT_CORPUS", value_hint = clap::ValueHint::FilePath)]
        corpus: Option<PathBuf>,
    },

    /// Import a corpus CSV into the database
    ///
    /// The CSV needs `artist_name`, `tag` and `listeners` columns. Rows with
    /// an empty listener count are skipped.
    Import {
        /// CSV file to import
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,

        /// Replace an existing corpus
        #[arg(long)]
        force: bool,
    },

    /// Export the database corpus to CSV
    Export {
        /// Destination CSV file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: PathBuf,
    },

    /// Generate shell completions
    ///
    /// Usage: deepcut completion bash > ~/.local/share/bash-completion/completions/deepcut
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate completions that also complete seed artist names
    ///
    /// Usage: deepcut completion-enhanced bash > ~/.local/share/bash-completion/completions/deepcut
    /// Usage: deepcut completion-enhanced fish > ~/.config/fish/completions/deepcut.fish
    CompletionEnhanced {
        /// Shell to generate enhanced completions for (bash and fish)
        shell: Shell,
    },

    /// List corpus artist names for completion (hidden command)
    #[command(hide = true)]
    CompleteArtists {
        /// Read the corpus from a CSV file instead of the database
        #[arg(long, env = "DEEPCUT_CORPUS", value_hint = clap::ValueHint::FilePath)]
        corpus: Option<PathBuf>,

        /// One bare name per line, without shell quoting
        #[arg(long)]
        plain: bool,
    },
}
