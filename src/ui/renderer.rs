//! Line renderer using crossterm
//!
//! Prints each received line in its color, plus the shell's status and
//! error messages.

use std::io::{self, Write};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use super::palette;
use crate::core::sgr::DisplayRecord;

/// Output renderer
pub struct Renderer<W: Write> {
    out: W,
}

impl Renderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Draw a received line
    pub fn line(&mut self, record: &DisplayRecord) -> io::Result<()> {
        // CRLF devices leave a '\r' on lines without escapes
        let text = record.text.trim_end_matches('\r');
        self.colored(palette::foreground(record.tag), text)
    }

    /// Echo of an outbound payload
    pub fn sent(&mut self, payload: &str) -> io::Result<()> {
        let payload = payload.trim_end_matches(['\r', '\n']);
        self.colored(Color::DarkGrey, &format!("Sent: {}", payload))
    }

    pub fn status(&mut self, message: &str) -> io::Result<()> {
        self.colored(Color::Grey, message)
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.colored(Color::Red, &format!("Error: {}", message))
    }

    /// Wipe the screen
    pub fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        self.out.flush()
    }

    fn colored(&mut self, color: Color, text: &str) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(color),
            Print(text),
            ResetColor,
            Print("\n")
        )?;
        self.out.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sgr::ColorTag;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Renderer<Vec<u8>>) -> io::Result<()>,
    {
        let mut renderer = Renderer::new(Vec::new());
        f(&mut renderer).expect("render");
        String::from_utf8(renderer.into_inner()).expect("utf8")
    }

    #[test]
    fn test_line_is_colored_and_reset() {
        let out = render(|r| {
            r.line(&DisplayRecord {
                text: "boot ok\r".to_string(),
                tag: ColorTag::Green,
            })
        });

        assert!(out.contains("boot ok"));
        assert!(!out.contains('\r'));
        assert!(out.starts_with("\x1b["));
        assert!(out.ends_with("\x1b[0m\n"));
    }

    #[test]
    fn test_sent_echo() {
        let out = render(|r| r.sent("AT+RST\r\n"));
        assert!(out.contains("Sent: AT+RST"));
        assert!(!out.contains('\r'));
    }

    #[test]
    fn test_error_prefix() {
        let out = render(|r| r.error("Not connected"));
        assert!(out.contains("Error: Not connected"));
    }
}
