//! Line color palette

use crossterm::style::Color;

use crate::core::sgr::ColorTag;

/// Terminal color used to draw a line of the given tag
///
/// Untagged lines are drawn white, the same as an explicit `37`.
pub fn foreground(tag: ColorTag) -> Color {
    match tag {
        ColorTag::Default => Color::White,
        ColorTag::Black => Color::Black,
        ColorTag::Red => Color::DarkRed,
        ColorTag::Green => Color::DarkGreen,
        ColorTag::Yellow => Color::DarkYellow,
        ColorTag::Blue => Color::DarkBlue,
        ColorTag::Magenta => Color::DarkMagenta,
        ColorTag::Cyan => Color::DarkCyan,
        ColorTag::White => Color::White,
        ColorTag::BrightBlack => Color::DarkGrey,
        ColorTag::BrightRed => Color::Red,
        ColorTag::BrightGreen => Color::Green,
        ColorTag::BrightYellow => Color::Yellow,
        ColorTag::BrightBlue => Color::Blue,
        ColorTag::BrightMagenta => Color::Magenta,
        ColorTag::BrightCyan => Color::Cyan,
        ColorTag::BrightWhite => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bright_and_normal_differ() {
        let pairs = [
            (ColorTag::Red, ColorTag::BrightRed),
            (ColorTag::Green, ColorTag::BrightGreen),
            (ColorTag::Yellow, ColorTag::BrightYellow),
            (ColorTag::Blue, ColorTag::BrightBlue),
            (ColorTag::Magenta, ColorTag::BrightMagenta),
            (ColorTag::Cyan, ColorTag::BrightCyan),
        ];
        for (normal, bright) in pairs {
            assert_ne!(foreground(normal), foreground(bright), "{:?}", normal);
        }
        assert_eq!(foreground(ColorTag::Default), foreground(ColorTag::White));
    }
}
