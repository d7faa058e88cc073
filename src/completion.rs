//! # Shell Completion Module
//!
//! Completion scripts for the `soundscope` binary plus dynamic genre names
//! read from the corpus database.
//!
//! The bash and fish scripts complete the genre argument of `genre-tracks`
//! and `genre-stats` by calling the hidden `complete-genres` command. Other
//! shells get the static clap script only.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! soundscope completion bash > ~/.local/share/bash-completion/completions/soundscope
//!
//! # Genre names, one per line
//! soundscope complete-genres --shell fish
//! ```

use crate::cli::Shell;
use crate::store::FeatureStore;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::Write;
use std::path::Path;

/// Subcommands whose positional argument is a genre name.
const GENRE_SUBCOMMANDS: [&str; 2] = ["genre-tracks", "genre-stats"];

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

/// Full completion script for `shell`: the clap script plus, for bash and
/// fish, dynamic genre completion.
pub fn completion_script(shell: Shell, cmd: &mut Command) -> String {
    let mut script = Vec::new();
    generate_completions(shell_to_completion_shell(shell), cmd, &mut script);
    let mut script = String::from_utf8_lossy(&script).into_owned();

    let name = cmd.get_name();
    match shell {
        Shell::Bash => script.push_str(&bash_genre_completion(name)),
        Shell::Fish => script.push_str(&fish_genre_completion(name)),
        Shell::Zsh | Shell::PowerShell | Shell::Elvish => {}
    }
    script
}

fn fish_genre_completion(bin: &str) -> String {
    format!(
        "\n# Genre names from the corpus\n\
         complete -c {bin} -f -n '__fish_seen_subcommand_from {subcommands}' \
         -a '({bin} complete-genres --shell fish 2>/dev/null)' -d 'Genre'\n",
        subcommands = GENRE_SUBCOMMANDS.join(" "),
    )
}

fn bash_genre_completion(bin: &str) -> String {
    format!(
        r#"
# Genre names from the corpus
_{bin}_with_genres() {{
    local cur="${{COMP_WORDS[COMP_CWORD]}}"
    local prev="${{COMP_WORDS[COMP_CWORD-1]}}"
    case "$prev" in
        {patterns})
            if [[ "$cur" != -* ]]; then
                local IFS=$'\n'
                COMPREPLY=( $(compgen -W "$({bin} complete-genres --shell bash 2>/dev/null)" -- "$cur") )
                return 0
            fi
            ;;
    esac
    _{bin} "$@"
}}
complete -F _{bin}_with_genres -o bashdefault -o default {bin}
"#,
        patterns = GENRE_SUBCOMMANDS.join("|"),
    )
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Genre names available for completion.
///
/// A missing or unreadable database simply yields no completions.
#[must_use]
pub fn get_genre_completions(db_path: &Path) -> Vec<String> {
    match FeatureStore::try_load(db_path) {
        Ok(store) => store.list_genres(),
        Err(e) => {
            log::debug!("No genre completions: {e}");
            Vec::new()
        }
    }
}

/// Format one completion candidate for `shell`.
#[must_use]
pub fn format_completion(candidate: &str, shell: Option<Shell>) -> String {
    match shell {
        // Fish handles escaping itself
        Some(Shell::Fish) => candidate.to_string(),
        _ if candidate.contains([' ', '\t', '\n']) => {
            format!("\"{}\"", candidate.replace('"', "\\\""))
        }
        _ => candidate.to_string(),
    }
}

/// Print genre completions, one per line.
pub fn print_genre_completions_for_shell(db_path: &Path, shell: Option<Shell>) {
    for genre in get_genre_completions(db_path) {
        println!("{}", format_completion(&genre, shell));
    }
}
