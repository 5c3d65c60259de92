//! Managed annotation blocks in source files.
//!
//! A block is a run of comment lines delimited by a begin marker and an
//! end marker. The codec renders and recognizes blocks; the patcher
//! rewrites files around them. Everything here works line-wise over a
//! lossless split so that inserting and then removing a block restores
//! the original file byte-for-byte, whatever its trailing-newline
//! convention.

mod codec;
mod patcher;

pub use codec::{Block, BlockCodec};
pub use patcher::{AnnotationError, FilePatcher, Placement};

/// Split into lines without terminators, remembering whether the text
/// ended with a newline. Lines keep any `\r` so CRLF files survive
/// reconstruction untouched.
pub(crate) fn split_lines(text: &str) -> (Vec<String>, bool) {
    let had_trailing_newline = text.ends_with('\n');
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    if had_trailing_newline {
        lines.pop();
    }
    (lines, had_trailing_newline)
}

/// Inverse of [`split_lines`].
pub(crate) fn join_lines(lines: &[String], had_trailing_newline: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    if had_trailing_newline {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(text: &str) -> String {
        let (lines, had_nl) = split_lines(text);
        join_lines(&lines, had_nl)
    }

    #[test]
    fn test_split_join_is_lossless() {
        for text in [
            "",
            "one line",
            "one line\n",
            "a\nb\nc",
            "a\nb\nc\n",
            "\n",
            "\n\nbody\n",
            "crlf\r\nlines\r\n",
        ] {
            assert_eq!(round_trip(text), text, "round trip failed for {:?}", text);
        }
    }

    #[test]
    fn test_split_reports_trailing_newline() {
        assert!(split_lines("x\n").1);
        assert!(!split_lines("x").1);
        assert_eq!(split_lines("x\n").0, ["x"]);
        assert_eq!(split_lines("x").0, ["x"]);
    }
}
