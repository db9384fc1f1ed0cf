//! ANSI rendering of decoded frames.
//!
//! Each pixel becomes a space cell with a 24-bit background color; the
//! attribute reset at the end of every row keeps the area right of the
//! frame untouched.

use std::fmt::Write;

use clim_core::frame::Frame;

/// Escape sequence moving the cursor to the top-left corner.
pub const CURSOR_HOME: &str = "\x1b[H";

/// Renders a frame into a string of escape-sequence colored cells.
pub fn render_frame(frame: &Frame) -> String {
    let mut out = String::with_capacity(frame.height() * (frame.width() * 20 + 8));
    for row in &frame.rows {
        for px in row {
            let _ = write!(out, "\x1b[48;2;{};{};{}m ", px.r, px.g, px.b);
        }
        out.push_str("\x1b[0m\n");
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use clim_core::frame::Color;

    #[test]
    fn cells_carry_background_colors() {
        let frame = Frame {
            rows: vec![vec![Color::new(1, 2, 3), Color::new(4, 5, 6)]],
        };
        assert_eq!(
            render_frame(&frame),
            "\x1b[48;2;1;2;3m \x1b[48;2;4;5;6m \x1b[0m\n"
        );
    }

    #[test]
    fn each_row_ends_with_a_reset() {
        let frame = Frame {
            rows: vec![vec![Color::default()]; 3],
        };
        let rendered = render_frame(&frame);
        assert_eq!(rendered.matches("\x1b[0m\n").count(), 3);
    }
}
