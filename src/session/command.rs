use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Session controls typed at the prompt. Never recorded as blocks.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum SessionCommand {
    /// Save the transcript to a snapshot file
    Snapshot {
        path: PathBuf,
        /// Mark every block for re-execution on replay
        #[arg(long)]
        exec: bool,
        /// Redact secrets before writing
        #[arg(long)]
        shareable: bool,
    },
    /// Replay a snapshot file into a fresh transcript
    Replay { path: PathBuf },
}

#[derive(Debug, Parser)]
#[command(name = "rewind", no_binary_name = true, disable_help_subcommand = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

/// One line typed into the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Empty,
    Control(SessionCommand),
    /// Anything else goes to the dispatcher exactly as typed
    Command(String),
}

impl ParsedLine {
    /// Classify a line. Lines starting with `snapshot` or `replay` must parse
    /// as session controls; a malformed control is an error, not a command.
    pub fn parse(line: &str) -> Result<Self, String> {
        let trimmed = line.trim();
        let Some(first) = trimmed.split_whitespace().next() else {
            return Ok(ParsedLine::Empty);
        };

        if !matches!(first, "snapshot" | "replay") {
            return Ok(ParsedLine::Command(line.to_string()));
        }

        SessionLine::try_parse_from(trimmed.split_whitespace())
            .map(|parsed| ParsedLine::Control(parsed.command))
            .map_err(|e| e.render().to_string())
    }
}
