use clap::{Parser, Subcommand};
use edge_core::Position;
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    about = "edge - live snippet expansion",
    long_about = "edge loads editor snippet files and expands a snippet prefix \
                  as soon as a space is typed after it."
)]
pub struct Edge {
    #[clap(long, short, global = true, help = "Show debug logging")]
    pub verbose: bool,

    #[clap(long, short = 'd', global = true, help = "Global snippets directory")]
    pub snippets_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub commands: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the indexed snippets
    List {
        #[clap(long, short, help = "Only snippets usable in this language")]
        language: Option<String>,

        #[clap(long, short, help = "Project folder to load as a workspace")]
        workspace: Vec<PathBuf>,

        #[clap(long, help = "Print JSON instead of a table")]
        json: bool,
    },
    /// Parse one snippet file and report what it defines
    Check {
        file: PathBuf,

        #[clap(long, short, help = "Languages to accept besides the defaults")]
        language: Vec<String>,
    },
    /// Type a space after each cursor in TEXT and print the result
    Expand {
        #[clap(long, short, help = "Language of the document")]
        language: String,

        #[clap(long, short, help = "Project folder owning the document")]
        workspace: Option<PathBuf>,

        #[clap(
            long,
            value_parser = parse_position,
            help = "Cursor as LINE:COLUMN, zero-based (default: end of text)"
        )]
        at: Vec<Position>,

        text: String,
    },
    /// Keep the index up to date with the snippet files until interrupted
    Watch {
        #[clap(long, short, help = "Project folder to load as a workspace")]
        workspace: Vec<PathBuf>,
    },
}

/// Parse `LINE:COLUMN`.
pub fn parse_position(value: &str) -> Result<Position, String> {
    let (line, character) = value
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got '{}'", value))?;

    let line = line
        .trim()
        .parse()
        .map_err(|_| format!("invalid line '{}'", line))?;
    let character = character
        .trim()
        .parse()
        .map_err(|_| format!("invalid column '{}'", character))?;
    Ok(Position::new(line, character))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn positions_parse() {
        assert_eq!(parse_position("2:7"), Ok(Position::new(2, 7)));
        assert!(parse_position("2").is_err());
        assert!(parse_position("a:1").is_err());
    }

    #[test]
    fn command_line_is_consistent() {
        Edge::command().debug_assert();
    }

    #[test]
    fn expand_collects_cursors() {
        let args = Edge::parse_from([
            "edge", "expand", "-l", "python", "--at", "0:2", "--at", "1:2", "pr\npr",
        ]);
        match args.commands {
            Some(Commands::Expand { language, at, text, .. }) => {
                assert_eq!(language, "python");
                assert_eq!(at, vec![Position::new(0, 2), Position::new(1, 2)]);
                assert_eq!(text, "pr\npr");
            }
            _ => panic!("expected expand"),
        }
    }
}
