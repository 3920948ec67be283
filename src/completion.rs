//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus hand-written bash and fish
//! scripts that complete the seed artist of `recommend` by calling the hidden
//! `complete-artists` command.
//!
//! ```bash
//! deepcut completion bash > ~/.local/share/bash-completion/completions/deepcut
//! deepcut completion zsh > ~/.config/zsh/completions/_deepcut
//! deepcut completion-enhanced fish > ~/.config/fish/completions/deepcut.fish
//! ```

use crate::corpus::Corpus;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, &mut io::stdout());
}

/// Fish script with artist-name completion for `recommend`.
#[must_use]
pub fn enhanced_fish_completion() -> &'static str {
    r#"# deepcut completion script for fish with artist name completion
# Install with: deepcut completion-enhanced fish > ~/.config/fish/completions/deepcut.fish

function __deepcut_complete_artists
    if command -sq deepcut
        deepcut complete-artists --plain 2>/dev/null
    end
end

complete -c deepcut -e

# Global options
complete -c deepcut -s h -l help -d 'Print help information'
complete -c deepcut -s V -l version -d 'Print version information'
complete -c deepcut -l config -r -F -d 'Settings file'

# Main commands
complete -c deepcut -f -n '__fish_is_first_token' -a 'recommend' -d 'Recommend a playlist based on a seed artist'
complete -c deepcut -f -n '__fish_is_first_token' -a 'cluster' -d 'Cluster corpus artists by popularity'
complete -c deepcut -f -n '__fish_is_first_token' -a 'bands' -d 'Show the underground listener band of each genre'
complete -c deepcut -f -n '__fish_is_first_token' -a 'import' -d 'Import a corpus CSV into the database'
complete -c deepcut -f -n '__fish_is_first_token' -a 'export' -d 'Export the database corpus to CSV'
complete -c deepcut -f -n '__fish_is_first_token' -a 'completion' -d 'Generate shell completions'
complete -c deepcut -f -n '__fish_is_first_token' -a 'completion-enhanced' -d 'Generate completions with artist names'
complete -c deepcut -f -n '__fish_is_first_token' -a 'help' -d 'Print help for commands'

# recommend: seed artist from the corpus
complete -c deepcut -f -n '__fish_seen_subcommand_from recommend' -a '(__deepcut_complete_artists)' -d 'Seed artist'
complete -c deepcut -f -n '__fish_seen_subcommand_from recommend' -s a -l adventurousness -r -d 'Share of underground tracks, 0.0 to 1.0'
complete -c deepcut -f -n '__fish_seen_subcommand_from recommend' -s n -l length -r -d 'Number of tracks'
complete -c deepcut -n '__fish_seen_subcommand_from recommend' -l catalog -r -F -d 'JSON metadata catalog'
complete -c deepcut -f -n '__fish_seen_subcommand_from recommend' -l json -d 'Print JSON'
complete -c deepcut -f -n '__fish_seen_subcommand_from recommend' -l spectrum -d 'Print the popularity spectrum'

complete -c deepcut -n '__fish_seen_subcommand_from recommend cluster bands' -l corpus -r -F -d 'Corpus CSV file'
complete -c deepcut -f -n '__fish_seen_subcommand_from cluster' -s k -r -d 'Number of clusters'
complete -c deepcut -f -n '__fish_seen_subcommand_from cluster' -l seed -r -d 'Random seed'
complete -c deepcut -f -n '__fish_seen_subcommand_from cluster' -l json -d 'Print JSON'
complete -c deepcut -f -n '__fish_seen_subcommand_from import' -l force -d 'Replace an existing corpus'

complete -c deepcut -f -n '__fish_seen_subcommand_from completion' -a 'bash zsh fish power-shell elvish'
complete -c deepcut -f -n '__fish_seen_subcommand_from completion-enhanced' -a 'bash fish'
"#
}

/// Bash script with artist-name completion for `recommend`.
#[must_use]
pub fn enhanced_bash_completion() -> &'static str {
    r#"#!/bin/bash
# deepcut completion script with artist name completion
# Install with: deepcut completion-enhanced bash > ~/.local/share/bash-completion/completions/deepcut

_deepcut_complete_artists() {
    local prefix="${1#\"}"
    if command -v deepcut >/dev/null 2>&1; then
        # Names with spaces come back quoted; match on the bare name.
        deepcut complete-artists 2>/dev/null | awk -v p="$prefix" '
            BEGIN { p = tolower(p) }
            { n = $0; sub(/^"/, "", n); if (index(tolower(n), p) == 1) print }'
    fi
}

_deepcut() {
    local cur prev words cword
    _init_completion || return

    case "${prev}" in
        --config|--corpus|--catalog|import|export)
            _filedir
            return 0
            ;;
        completion)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "${cur}"))
            return 0
            ;;
        completion-enhanced)
            COMPREPLY=($(compgen -W "bash fish" -- "${cur}"))
            return 0
            ;;
        -a|--adventurousness|-n|--length|-k|--seed)
            return 0
            ;;
    esac

    local subcommands="recommend cluster bands import export completion completion-enhanced help"

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "$subcommands --config --help --version" -- "${cur}"))
        return 0
    fi

    case "${words[1]}" in
        recommend)
            if [[ "${cur}" == -* ]]; then
                COMPREPLY=($(compgen -W "--adventurousness -a --length -n --corpus --catalog --json --spectrum --help" -- "${cur}"))
            else
                mapfile -t COMPREPLY < <(_deepcut_complete_artists "${cur}")
            fi
            ;;
        cluster)
            COMPREPLY=($(compgen -W "-k --seed --corpus --json --help" -- "${cur}"))
            ;;
        bands)
            COMPREPLY=($(compgen -W "--corpus --help" -- "${cur}"))
            ;;
        import)
            COMPREPLY=($(compgen -W "--force --help" -- "${cur}"))
            ;;
        *)
            COMPREPLY=($(compgen -W "$subcommands" -- "${cur}"))
            ;;
    esac
} &&
complete -F _deepcut deepcut

# ex: filetype=sh
"#
}

#[must_use]
pub fn shell_to_completion_shell(shell: crate::cli::Shell) -> CompletionShell {
    match shell {
        crate::cli::Shell::Bash => CompletionShell::Bash,
        crate::cli::Shell::Zsh => CompletionShell::Zsh,
        crate::cli::Shell::Fish => CompletionShell::Fish,
        crate::cli::Shell::PowerShell => CompletionShell::PowerShell,
        crate::cli::Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Artist names for completion, sorted and quoted where the shell needs it.
///
/// `plain` skips the quoting for shells such as fish that escape candidates
/// themselves.
#[must_use]
pub fn artist_completions(corpus: &Corpus, plain: bool) -> Vec<String> {
    let mut names: Vec<&str> = corpus.records().iter().map(|record| record.name.as_str()).collect();
    names.sort_by_key(|name| name.to_lowercase());
    names
        .into_iter()
        .map(|name| {
            if !plain && name.contains([' ', '\t']) {
                format!("\"{}\"", name.replace('"', "\\\""))
            } else {
                name.to_string()
            }
        })
        .collect()
}

/// Write one artist name per line.
///
/// # Errors
///
/// Fails if writing to `out` fails.
pub fn write_artist_completions(corpus: &Corpus, plain: bool, out: &mut impl Write) -> io::Result<()> {
    for name in artist_completions(corpus, plain) {
        writeln!(out, "{name}")?;
    }
    Ok(())
}
