//! SGR color interpretation
//!
//! Derives one foreground color per line from its first `ESC [ ... m`
//! sequence and strips every such sequence from the displayed text.
//! Per-span coloring inside a line is not attempted.

/// Foreground color of a received line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ColorTag {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl ColorTag {
    /// Map an SGR foreground parameter (30-37, 90-97) to a tag
    pub fn from_sgr(code: u16) -> Option<Self> {
        let tag = match code {
            30 => ColorTag::Black,
            31 => ColorTag::Red,
            32 => ColorTag::Green,
            33 => ColorTag::Yellow,
            34 => ColorTag::Blue,
            35 => ColorTag::Magenta,
            36 => ColorTag::Cyan,
            37 => ColorTag::White,
            90 => ColorTag::BrightBlack,
            91 => ColorTag::BrightRed,
            92 => ColorTag::BrightGreen,
            93 => ColorTag::BrightYellow,
            94 => ColorTag::BrightBlue,
            95 => ColorTag::BrightMagenta,
            96 => ColorTag::BrightCyan,
            97 => ColorTag::BrightWhite,
            _ => return None,
        };
        Some(tag)
    }

    /// Classify a parameter list; a reset anywhere wins
    pub fn from_params(params: &[u16]) -> Self {
        if params.contains(&0) {
            return ColorTag::Default;
        }
        params
            .iter()
            .find_map(|&p| Self::from_sgr(p))
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorTag::Default => "default",
            ColorTag::Black => "black",
            ColorTag::Red => "red",
            ColorTag::Green => "green",
            ColorTag::Yellow => "yellow",
            ColorTag::Blue => "blue",
            ColorTag::Magenta => "magenta",
            ColorTag::Cyan => "cyan",
            ColorTag::White => "white",
            ColorTag::BrightBlack => "bright_black",
            ColorTag::BrightRed => "bright_red",
            ColorTag::BrightGreen => "bright_green",
            ColorTag::BrightYellow => "bright_yellow",
            ColorTag::BrightBlue => "bright_blue",
            ColorTag::BrightMagenta => "bright_magenta",
            ColorTag::BrightCyan => "bright_cyan",
            ColorTag::BrightWhite => "bright_white",
        }
    }
}

/// A line ready for display and logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    /// Text with SGR sequences removed
    pub text: String,
    pub tag: ColorTag,
}

/// One `ESC [ [0-9;]* m` occurrence
#[derive(Debug, PartialEq)]
struct SgrSequence {
    start: usize,
    end: usize,
    params: Vec<u16>,
}

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    Ground,
    Escape,
    Params,
}

/// Find every SGR sequence in `line`, left to right
///
/// Empty parameter fields (`ESC[;31m`, `ESC[m`) contribute no parameter.
fn scan(line: &str) -> Vec<SgrSequence> {
    let bytes = line.as_bytes();
    let mut found = Vec::new();
    let mut state = ScanState::Ground;
    let mut start = 0;
    let mut params: Vec<u16> = Vec::new();
    let mut current: Option<u16> = None;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        match state {
            ScanState::Ground => {
                if byte == 0x1B {
                    start = i;
                    state = ScanState::Escape;
                }
            }
            ScanState::Escape => {
                if byte == b'[' {
                    params.clear();
                    current = None;
                    state = ScanState::Params;
                } else {
                    state = ScanState::Ground;
                    // Reconsider this byte; it may open a new sequence
                    continue;
                }
            }
            ScanState::Params => match byte {
                b'0'..=b'9' => {
                    let digit = (byte - b'0') as u16;
                    current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                }
                b';' => {
                    if let Some(p) = current.take() {
                        params.push(p);
                    }
                }
                b'm' => {
                    if let Some(p) = current.take() {
                        params.push(p);
                    }
                    found.push(SgrSequence {
                        start,
                        end: i + 1,
                        params: std::mem::take(&mut params),
                    });
                    state = ScanState::Ground;
                }
                _ => {
                    // Not SGR; left in the text as-is
                    state = ScanState::Ground;
                    continue;
                }
            },
        }
        i += 1;
    }

    found
}

/// Interpret one framed line
pub fn interpret(line: &str) -> DisplayRecord {
    let sequences = scan(line);

    let Some(first) = sequences.first() else {
        return DisplayRecord {
            text: line.to_string(),
            tag: ColorTag::Default,
        };
    };

    let tag = ColorTag::from_params(&first.params);

    let mut text = String::with_capacity(line.len());
    let mut cursor = 0;
    for seq in &sequences {
        text.push_str(&line[cursor..seq.start]);
        cursor = seq.end;
    }
    text.push_str(&line[cursor..]);

    DisplayRecord {
        text: text.trim().to_string(),
        tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_color() {
        let record = interpret("\x1b[33mhello\x1b[0m");
        assert_eq!(record.text, "hello");
        assert_eq!(record.tag, ColorTag::Yellow);
    }

    #[test]
    fn test_plain_text_unchanged() {
        let record = interpret("plain text");
        assert_eq!(record.text, "plain text");
        assert_eq!(record.tag, ColorTag::Default);

        // No sequence means no trimming either
        let record = interpret("  padded\r");
        assert_eq!(record.text, "  padded\r");
    }

    #[test]
    fn test_first_sequence_governs() {
        let record = interpret("\x1b[91mwarn\x1b[0m extra \x1b[32mignored\x1b[0m");
        assert_eq!(record.tag, ColorTag::BrightRed);
        assert_eq!(record.text, "warn extra ignored");
    }

    #[test]
    fn test_reset_forces_default() {
        assert_eq!(interpret("\x1b[0;31mx").tag, ColorTag::Default);
        assert_eq!(interpret("\x1b[31;0mx").tag, ColorTag::Default);
        assert_eq!(interpret("\x1b[0mx\x1b[31m").tag, ColorTag::Default);
    }

    #[test]
    fn test_attribute_before_color() {
        // Bold is ignored; the color parameter still classifies the line
        let record = interpret("\x1b[1;36mI (42) wifi: connected\x1b[0m\r");
        assert_eq!(record.tag, ColorTag::Cyan);
        assert_eq!(record.text, "I (42) wifi: connected");
    }

    #[test]
    fn test_unsupported_code_falls_back() {
        let record = interpret("\x1b[4munderlined\x1b[24m");
        assert_eq!(record.tag, ColorTag::Default);
        assert_eq!(record.text, "underlined");

        let record = interpret("\x1b[38;5;208morange");
        assert_eq!(record.tag, ColorTag::Default);
        assert_eq!(record.text, "orange");
    }

    #[test]
    fn test_empty_params() {
        let record = interpret("\x1b[mreset");
        assert_eq!(record.tag, ColorTag::Default);
        assert_eq!(record.text, "reset");

        assert_eq!(interpret("\x1b[;32mgo").tag, ColorTag::Green);
    }

    #[test]
    fn test_non_sgr_escapes_are_kept() {
        let record = interpret("\x1b[2Jclear");
        assert_eq!(record.tag, ColorTag::Default);
        assert_eq!(record.text, "\x1b[2Jclear");

        // A broken sequence does not hide the next real one
        let record = interpret("\x1b\x1b[35mmag");
        assert_eq!(record.tag, ColorTag::Magenta);
        assert_eq!(record.text, "\x1bmag");
    }

    #[test]
    fn test_unterminated_sequence() {
        let record = interpret("tail \x1b[31");
        assert_eq!(record.tag, ColorTag::Default);
        assert_eq!(record.text, "tail \x1b[31");
    }

    #[test]
    fn test_color_table() {
        for code in 30..=37 {
            assert!(ColorTag::from_sgr(code).is_some());
        }
        for code in 90..=97 {
            assert!(ColorTag::from_sgr(code).is_some());
        }
        assert_eq!(ColorTag::from_sgr(38), None);
        assert_eq!(ColorTag::from_sgr(97), Some(ColorTag::BrightWhite));
        assert_eq!(ColorTag::BrightBlue.name(), "bright_blue");
    }
}
