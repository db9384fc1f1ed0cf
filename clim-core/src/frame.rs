//! Decoded pixel data.

use std::fmt;

/// A list specifying pixel geometry errors.
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum FrameError {
    /// The flat pixel count does not match the requested grid dimensions.
    DimensionMismatch,
}

/// A specialised `Result` type for frame operations.
pub type FrameResult<T> = Result<T, FrameError>;

/// A 24-bit RGB color.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct Color {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
}

impl Color {
    /// Constructs a new `Color` from its components.
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Pixels of one frame in scan order, before geometry is applied.
#[derive(Debug,Clone,Default)]
pub struct FlatFrame {
    /// Decoded pixels, row-major.
    pub pixels: Vec<Color>,
}

impl FlatFrame {
    /// Constructs an empty flat frame with room for `capacity` pixels.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { pixels: Vec::with_capacity(capacity) }
    }

    /// Slices the flat pixels into a `height` x `width` grid, row-major.
    ///
    /// Degenerate zero-pixel geometry is rejected along with any count
    /// mismatch.
    pub fn into_frame(self, width: usize, height: usize) -> FrameResult<Frame> {
        if width == 0 || height == 0 || self.pixels.len() != width * height {
            return Err(FrameError::DimensionMismatch);
        }
        let rows = self.pixels
            .chunks_exact(width)
            .map(|row| row.to_vec())
            .collect();
        Ok(Frame { rows })
    }
}

/// A decoded frame as rows of colors.
#[derive(Debug,Clone,PartialEq)]
pub struct Frame {
    /// Pixel rows, top to bottom.
    pub rows: Vec<Vec<Color>>,
}

impl Frame {
    /// Returns the frame width in pixels.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Returns the frame height in pixels.
    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_to_grid_row_major() {
        let px: Vec<Color> = (0..6).map(|i| Color::new(i, 0, 0)).collect();
        let frame = FlatFrame { pixels: px.clone() }.into_frame(3, 2).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.rows[0], px[0..3].to_vec());
        assert_eq!(frame.rows[1], px[3..6].to_vec());
    }

    #[test]
    fn wrong_cardinality_is_rejected() {
        let flat = FlatFrame { pixels: vec![Color::default(); 5] };
        assert_eq!(flat.into_frame(3, 2).unwrap_err(), FrameError::DimensionMismatch);
    }
}
