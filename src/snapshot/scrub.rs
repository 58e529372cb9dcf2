use regex::Regex;

use crate::block::BlockResult;

use super::codec::{SnapshotDocument, SnapshotMode};

/// Redacts secrets from snapshots meant to be shared.
#[derive(Debug, Clone)]
pub struct ScrubConfig {
    patterns: Vec<Regex>,
}

impl ScrubConfig {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    pub fn default_patterns() -> Vec<Regex> {
        // Keep patterns simple: the Rust `regex` crate doesn't support look-behind.
        let raw = [
            r"sk-[A-Za-z0-9]{10,}",
            r"Bearer\s+[A-Za-z0-9._-]{10,}",
            r"(?i)api[_-]?key\s*[=:]\s*[A-Za-z0-9._-]{10,}",
            r"(?i)(password|passwd|token)\s*[=:]\s*\S+",
            r"(?i)--token[= ]\S+",
        ];
        raw.into_iter().filter_map(|p| Regex::new(p).ok()).collect()
    }

    pub fn default_shareable() -> Self {
        Self::new(Self::default_patterns())
    }

    /// Default patterns plus user-configured ones
    pub fn with_extra_patterns(extra: &[String]) -> Result<Self, regex::Error> {
        let mut patterns = Self::default_patterns();
        for raw in extra {
            patterns.push(Regex::new(raw)?);
        }
        Ok(Self::new(patterns))
    }

    pub fn scrub_string(&self, input: &str) -> String {
        let mut out = input.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }

    /// Scrub result payloads, and commands too when nothing will re-run them.
    ///
    /// Commands in a re-executable document are left verbatim so they still run.
    pub fn scrub_document(&self, document: &mut SnapshotDocument) {
        let scrub_commands = document.mode == SnapshotMode::Static;
        for block in &mut document.blocks {
            if scrub_commands {
                block.command = self.scrub_string(&block.command);
            }
            self.scrub_result(&mut block.result);
        }
    }

    fn scrub_result(&self, result: &mut BlockResult) {
        match result {
            BlockResult::Text { text } => {
                *text = self.scrub_string(text);
            }
            BlockResult::Table { rows, .. } => {
                for row in rows {
                    for cell in &mut row.cells {
                        *cell = self.scrub_string(cell);
                    }
                }
            }
            BlockResult::Failure { message, .. } => {
                *message = self.scrub_string(message);
            }
            BlockResult::Resource { .. } => {
                // Names and kinds are identifiers; leave as-is.
            }
        }
    }
}
