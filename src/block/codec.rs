//! Rendering and recognition of delimited comment blocks.

use crate::config::AnnotationSettings;

use super::{join_lines, split_lines};

/// An extracted block: where it sits and what it says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Line index of the begin marker.
    pub start_line: usize,
    /// Line index of the end marker.
    pub end_line: usize,
    /// Body with comment prefixes stripped.
    pub body: String,
}

/// Renders annotation bodies as comment blocks and finds them again.
#[derive(Debug, Clone)]
pub struct BlockCodec {
    prefix: String,
    begin: String,
    end: String,
}

impl BlockCodec {
    pub fn new(
        prefix: impl Into<String>,
        begin: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        BlockCodec {
            prefix: prefix.into(),
            begin: begin.into(),
            end: end.into(),
        }
    }

    pub fn from_settings(settings: &AnnotationSettings) -> Self {
        Self::new(
            settings.comment_prefix.clone(),
            settings.begin_marker.clone(),
            settings.end_marker.clone(),
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn begin_line(&self) -> String {
        format!("{} {}", self.prefix, self.begin)
    }

    pub fn end_line(&self) -> String {
        format!("{} {}", self.prefix, self.end)
    }

    /// The block as lines: begin marker, prefixed body lines, end marker.
    /// Blank body lines become a bare prefix with no trailing space.
    pub fn block_lines(&self, body: &str) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(self.begin_line());
        for line in body.split('\n') {
            if line.is_empty() {
                lines.push(self.prefix.clone());
            } else {
                lines.push(format!("{} {}", self.prefix, line));
            }
        }
        lines.push(self.end_line());
        lines
    }

    /// The block as text, every line newline-terminated.
    pub fn render(&self, body: &str) -> String {
        let mut text = self.block_lines(body).join("\n");
        text.push('\n');
        text
    }

    fn is_begin(&self, line: &str) -> bool {
        line.trim() == self.begin_line()
    }

    fn is_end(&self, line: &str) -> bool {
        line.trim() == self.end_line()
    }

    /// Locate the block: the first begin marker and the first end marker
    /// after it, both required. A lone marker is not a block.
    pub(crate) fn find_span(&self, lines: &[String]) -> Option<(usize, usize)> {
        let start = lines.iter().position(|line| self.is_begin(line))?;
        let end = lines[start + 1..]
            .iter()
            .position(|line| self.is_end(line))?
            + start
            + 1;
        Some((start, end))
    }

    /// Extract the block and its unprefixed body.
    pub fn extract(&self, text: &str) -> Option<Block> {
        let (lines, _) = split_lines(text);
        let (start, end) = self.find_span(&lines)?;
        let body = lines[start + 1..end]
            .iter()
            .map(|line| self.strip_line(line))
            .collect::<Vec<_>>()
            .join("\n");
        Some(Block {
            start_line: start,
            end_line: end,
            body,
        })
    }

    fn strip_line(&self, line: &str) -> String {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line == self.prefix {
            return String::new();
        }
        match line.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).to_string(),
            None => line.to_string(),
        }
    }

    /// Drop the block span plus at most one immediately-following blank
    /// separator. Returns the span start and the total line count removed.
    pub(crate) fn remove_span(&self, lines: &mut Vec<String>) -> Option<(usize, usize)> {
        let (start, end) = self.find_span(lines)?;
        let mut removed = end - start + 1;
        lines.drain(start..=end);
        if lines
            .get(start)
            .map(|line| line.trim().is_empty())
            .unwrap_or(false)
        {
            lines.remove(start);
            removed += 1;
        }
        Some((start, removed))
    }

    /// Remove the block from text, reporting whether anything changed.
    pub fn remove(&self, text: &str) -> (String, bool) {
        let (mut lines, had_trailing_newline) = split_lines(text);
        match self.remove_span(&mut lines) {
            Some(_) => (join_lines(&lines, had_trailing_newline), true),
            None => (text.to_string(), false),
        }
    }
}
