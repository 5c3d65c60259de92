//! File-level patching around annotation blocks.
//!
//! Inserting always replaces any existing block first, so re-annotating
//! is idempotent. Unchanged content is never written back, so file
//! mtimes survive no-op runs.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::codec::BlockCodec;
use super::{join_lines, split_lines};

/// File-level annotation failures. Recoverable per file.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("class definition '{class}' not found in '{path}'")]
    ClassNotFound { path: PathBuf, class: String },
}

/// Where to put the block.
#[derive(Debug, Clone, Copy)]
pub enum Placement<'a> {
    /// Natural top: below the shebang and any magic comments.
    Top,
    /// Above the definition unit containing this line index.
    Line(usize),
    /// Above the named class definition.
    ClassDefinition(&'a str),
}

/// Magic-comment keys that pin a line to the top of the file.
static MAGIC_COMMENT_KEYS: &[&str] = &[
    "frozen_string_literal:",
    "encoding:",
    "coding:",
    "warn_indent:",
    "shareable_constant_value:",
    "-*-",
];

/// Patches source files around a managed block.
#[derive(Debug, Clone)]
pub struct FilePatcher {
    codec: BlockCodec,
}

impl FilePatcher {
    pub fn new(codec: BlockCodec) -> Self {
        FilePatcher { codec }
    }

    pub fn codec(&self) -> &BlockCodec {
        &self.codec
    }

    /// Insert (or replace) the block. Returns whether the file changed.
    pub fn insert(
        &self,
        path: &Path,
        placement: Placement<'_>,
        body: &str,
    ) -> Result<bool, AnnotationError> {
        let original = self.read(path)?;
        let patched = self.patched_insert(path, &original, placement, body)?;
        if patched == original {
            return Ok(false);
        }
        self.write(path, &patched)?;
        Ok(true)
    }

    /// Compute the insert without writing; for dry runs.
    pub fn preview_insert(
        &self,
        path: &Path,
        placement: Placement<'_>,
        body: &str,
    ) -> Result<(String, bool), AnnotationError> {
        let original = self.read(path)?;
        let patched = self.patched_insert(path, &original, placement, body)?;
        let changed = patched != original;
        Ok((patched, changed))
    }

    /// Strip the block. Returns whether the file changed.
    pub fn remove(&self, path: &Path) -> Result<bool, AnnotationError> {
        let original = self.read(path)?;
        let (patched, changed) = self.codec.remove(&original);
        if !changed {
            return Ok(false);
        }
        self.write(path, &patched)?;
        Ok(true)
    }

    /// Compute the removal without writing; for dry runs.
    pub fn preview_remove(&self, path: &Path) -> Result<(String, bool), AnnotationError> {
        let original = self.read(path)?;
        Ok(self.codec.remove(&original))
    }

    pub fn insert_at_top(&self, path: &Path, body: &str) -> Result<bool, AnnotationError> {
        self.insert(path, Placement::Top, body)
    }

    pub fn insert_at_line(
        &self,
        path: &Path,
        line: usize,
        body: &str,
    ) -> Result<bool, AnnotationError> {
        self.insert(path, Placement::Line(line), body)
    }

    pub fn insert_at_class_definition(
        &self,
        path: &Path,
        class_name: &str,
        body: &str,
    ) -> Result<bool, AnnotationError> {
        self.insert(path, Placement::ClassDefinition(class_name), body)
    }

    fn patched_insert(
        &self,
        path: &Path,
        original: &str,
        placement: Placement<'_>,
        body: &str,
    ) -> Result<String, AnnotationError> {
        let (mut lines, had_trailing_newline) = split_lines(original);

        // Replace semantics: the old block goes first, wherever it was.
        let removal = self.codec.remove_span(&mut lines);

        let at = match placement {
            Placement::Top => self.skip_pragmas(&lines),
            Placement::Line(line) => self.walk_up(&lines, adjust_line(line, removal)),
            Placement::ClassDefinition(class_name) => {
                let pattern = class_pattern(class_name);
                let found = lines
                    .iter()
                    .position(|line| pattern.is_match(line))
                    .ok_or_else(|| AnnotationError::ClassNotFound {
                        path: path.to_path_buf(),
                        class: class_name.to_string(),
                    })?;
                self.walk_up(&lines, found)
            }
        };

        let mut insertion = self.codec.block_lines(body);
        insertion.push(String::new());
        lines.splice(at..at, insertion);

        Ok(join_lines(&lines, had_trailing_newline))
    }

    /// First line index past the shebang and contiguous magic comments.
    fn skip_pragmas(&self, lines: &[String]) -> usize {
        let mut idx = 0;
        while idx < lines.len() && self.is_pragma(&lines[idx], idx) {
            idx += 1;
        }
        idx
    }

    /// Walk upward over the contiguous comment lines directly above
    /// `target` so the block lands above the whole definition unit, doc
    /// comments included. Never crosses a pragma line.
    fn walk_up(&self, lines: &[String], target: usize) -> usize {
        let mut idx = target.min(lines.len());
        while idx > 0 {
            let above = &lines[idx - 1];
            if self.is_pragma(above, idx - 1) {
                break;
            }
            if above.trim_start().starts_with(self.codec.prefix()) {
                idx -= 1;
            } else {
                break;
            }
        }
        idx
    }

    fn is_pragma(&self, line: &str, index: usize) -> bool {
        let trimmed = line.trim_start();
        if index == 0 && trimmed.starts_with("#!") {
            return true;
        }
        if !trimmed.starts_with(self.codec.prefix()) {
            return false;
        }
        MAGIC_COMMENT_KEYS.iter().any(|key| trimmed.contains(key))
    }

    fn read(&self, path: &Path) -> Result<String, AnnotationError> {
        fs::read_to_string(path).map_err(|source| AnnotationError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<(), AnnotationError> {
        fs::write(path, content).map_err(|source| AnnotationError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Re-aim a line index at the same content after a span was removed.
fn adjust_line(line: usize, removal: Option<(usize, usize)>) -> usize {
    match removal {
        Some((start, count)) if line >= start + count => line - count,
        Some((start, _)) if line > start => start,
        _ => line,
    }
}

/// Match `class Name` / `module Name`, tolerating namespace qualifiers.
fn class_pattern(class_name: &str) -> Regex {
    let short = class_name.rsplit("::").next().unwrap_or(class_name);
    let pattern = format!(
        r"^\s*(?:class|module)\s+(?:\w+(?:::\w+)*::)?{}\b",
        regex::escape(short)
    );
    Regex::new(&pattern).expect("class definition pattern")
}
