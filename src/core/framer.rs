//! Line framing
//!
//! Splits the raw serial byte stream into `\n`-delimited lines.

use std::borrow::Cow;

/// A complete line, without its `\n` delimiter
///
/// A `\r` preceding the delimiter is kept as part of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line(Vec<u8>);

impl Line {
    /// Decode as UTF-8, replacing malformed sequences with U+FFFD
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

/// Reassembles lines across read boundaries
///
/// The pending fragment has no length bound: a device that never sends `\n`
/// grows it for as long as the connection lives.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every line it completes
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let mut line = std::mem::take(&mut self.pending);
            line.extend_from_slice(&rest[..pos]);
            lines.push(Line(line));
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Bytes received since the last delimiter
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[Line]) -> Vec<String> {
        lines.iter().map(|l| l.to_text().into_owned()).collect()
    }

    #[test]
    fn test_split_and_remainder() {
        let mut framer = LineFramer::new();

        let lines = framer.feed(b"one\ntwo\nthr");
        assert_eq!(texts(&lines), vec!["one", "two"]);
        assert_eq!(framer.pending(), b"thr");

        let lines = framer.feed(b"ee\n");
        assert_eq!(texts(&lines), vec!["three"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_carriage_return_is_kept() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"ok\r\n");
        assert_eq!(lines[0], Line(b"ok\r".to_vec()));
    }

    #[test]
    fn test_empty_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"\n\nx\n");
        assert_eq!(texts(&lines), vec!["", "", "x"]);
    }

    #[test]
    fn test_chunk_invariance() {
        let stream: &[u8] = b"boot\r\n\x1b[32mready\x1b[0m\n\xce\xbb-calc\npartial";

        let mut whole = LineFramer::new();
        let expected = whole.feed(stream);

        // Every two-way split, then byte-at-a-time
        for split in 0..=stream.len() {
            let mut framer = LineFramer::new();
            let mut lines = framer.feed(&stream[..split]);
            lines.extend(framer.feed(&stream[split..]));
            assert_eq!(lines, expected, "split at {}", split);
            assert_eq!(framer.pending(), b"partial");
        }

        let mut framer = LineFramer::new();
        let lines: Vec<Line> = stream.iter().flat_map(|b| framer.feed(&[*b])).collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_split_multibyte_decodes_cleanly() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"\xce").is_empty());
        let lines = framer.feed(b"\xbb\n");
        assert_eq!(lines[0].to_text(), "\u{3bb}");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"a\xffb\n");
        assert_eq!(lines[0].to_text(), "a\u{fffd}b");
    }
}
