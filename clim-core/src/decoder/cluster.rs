//! Cluster-level entropy decoding.
//!
//! A cluster is a palette followed by a run of encoded frames sharing it.
//! Every segment starts and ends on a byte boundary, so the decoder tracks
//! its progress as a byte offset and builds a fresh [`BitReader`] for each
//! bit-packed segment.

use super::codebook::{CodeWord, CountCodebook, PaletteCodebook};
use super::{DecoderError, DecoderResult};
use crate::frame::{Color, FlatFrame, Frame};
use crate::io::bitreader::BitReader;
use crate::io::byteio::ByteSource;

/// Decoder for the frame clusters of one video stream.
#[derive(Debug)]
pub struct ClusterDecoder {
    width:  usize,
    height: usize,
}

fn read_byte(src: &mut dyn ByteSource, offset: &mut u64) -> DecoderResult<u8> {
    let byte = src.byte_at(*offset)?;
    *offset += 1;
    Ok(byte)
}

impl ClusterDecoder {
    /// Constructs a new `ClusterDecoder` for the given frame geometry.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Decodes the cluster starting at `offset` into 2D frames.
    ///
    /// `offset` is advanced to the first byte after the cluster.
    pub fn decode_cluster(&self, src: &mut dyn ByteSource, offset: &mut u64,
                          frames_in_cluster: usize) -> DecoderResult<Vec<Frame>> {
        let palette = self.decode_palette(src, offset)?;
        let mut frames = Vec::with_capacity(frames_in_cluster);
        for _ in 0..frames_in_cluster {
            let flat = self.decode_frame(src, offset, &palette)?;
            frames.push(flat.into_frame(self.width, self.height)?);
        }
        Ok(frames)
    }

    /// Consumes the cluster starting at `offset` without emitting frames.
    ///
    /// Advances `offset` exactly as [`decode_cluster`] would.
    ///
    /// [`decode_cluster`]: #method.decode_cluster
    pub fn skip_cluster(&self, src: &mut dyn ByteSource, offset: &mut u64,
                        frames_in_cluster: usize) -> DecoderResult<()> {
        let palette = self.decode_palette(src, offset)?;
        for _ in 0..frames_in_cluster {
            self.decode_frame(src, offset, &palette)?;
        }
        Ok(())
    }

    fn decode_palette(&self, src: &mut dyn ByteSource, offset: &mut u64) -> DecoderResult<PaletteCodebook> {
        let num_colors = usize::from(read_byte(src, offset)?) + 1;

        let mut colors = Vec::with_capacity(num_colors);
        for _ in 0..num_colors {
            let r = read_byte(src, offset)?;
            let g = read_byte(src, offset)?;
            let b = read_byte(src, offset)?;
            colors.push(Color::new(r, g, b));
        }

        let mut br = BitReader::new_at(src, *offset * 8);
        let mut code_lens = Vec::with_capacity(num_colors);
        for _ in 0..num_colors {
            code_lens.push(br.read_bits(3)? as u8 + 1);
        }
        br.align_to_byte();

        let mut palette = PaletteCodebook::with_capacity(num_colors);
        for (&color, &len) in colors.iter().zip(code_lens.iter()) {
            let bits = br.read_bits(u32::from(len))? as u32;
            palette.insert(CodeWord::new(bits, len), color);
        }
        *offset = br.align_to_byte();

        Ok(palette)
    }

    fn decode_frame(&self, src: &mut dyn ByteSource, offset: &mut u64,
                    palette: &PaletteCodebook) -> DecoderResult<FlatFrame> {
        let dimension = self.width * self.height;
        let mut br = BitReader::new_at(src, *offset * 8);

        let is_rle = br.read_bool()?;
        let uses_coded_counts = if is_rle { br.read_bool()? } else { false };
        tracing::trace!(offset = *offset, is_rle, uses_coded_counts, "frame header");

        let mut counts = CountCodebook::default();
        let mut rle_bits = 0u32;
        if is_rle {
            if uses_coded_counts {
                let num_codes_bits = br.read_bits(4)? as u32;
                let num_codes = br.read_bits(num_codes_bits)? as usize;
                let value_bits = br.read_bits(4)? as u32;
                counts = CountCodebook::with_capacity(num_codes);
                for _ in 0..num_codes {
                    let count = br.read_bits(value_bits)? as usize + 1;
                    let code_len = br.read_bits(4)? as u8 + 1;
                    let code_bits = br.read_bits(u32::from(code_len))? as u32;
                    counts.insert(CodeWord::new(code_bits, code_len), count);
                }
            } else {
                rle_bits = br.read_bits(5)? as u32 + 1;
            }
        }

        let mut frame = FlatFrame::with_capacity(dimension);
        while frame.pixels.len() < dimension {
            let color = palette.read_color(&mut br)?;
            let run = if !is_rle {
                1
            } else if uses_coded_counts {
                counts.read_count(&mut br)? as u64
            } else {
                br.read_bits(rle_bits)? + 1
            };
            if run > (dimension - frame.pixels.len()) as u64 {
                return Err(DecoderError::CorruptStream);
            }
            for _ in 0..run {
                frame.pixels.push(color);
            }
        }

        *offset = br.align_to_byte();
        Ok(frame)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::bitwriter::BitWriter;
    use crate::io::byteio::MemoryReader;

    const RED:   Color = Color { r: 255, g: 0, b: 0 };
    const GREEN: Color = Color { r: 0, g: 255, b: 0 };
    const BLUE:  Color = Color { r: 0, g: 0, b: 255 };

    /// Appends a palette segment: colors with code lengths and code bits.
    fn write_palette(bw: &mut BitWriter, entries: &[(Color, u32, u64)]) {
        bw.write_byte((entries.len() - 1) as u8);
        for &(color, _, _) in entries {
            bw.write_byte(color.r);
            bw.write_byte(color.g);
            bw.write_byte(color.b);
        }
        for &(_, len, _) in entries {
            bw.write_bits(u64::from(len - 1), 3);
        }
        bw.align();
        for &(_, len, bits) in entries {
            bw.write_bits(bits, len);
        }
        bw.align();
    }

    #[test]
    fn palette_decode_advances_to_byte_boundary() {
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(RED, 1, 0b0), (GREEN, 1, 0b1)]);
        let data = bw.finish();
        assert_eq!(data.len(), 9);

        let dec = ClusterDecoder::new(2, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let palette = dec.decode_palette(&mut src, &mut offset).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(offset, 9);
    }

    #[test]
    fn huffman_only_frame() {
        // 2x1 frame: red then green, codes "0" / "1"
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(RED, 1, 0b0), (GREEN, 1, 0b1)]);
        bw.write_bit(false);     // not RLE
        bw.write_bits(0b01, 2);  // red, green
        let data = bw.finish();

        let dec = ClusterDecoder::new(2, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let frames = dec.decode_cluster(&mut src, &mut offset, 1).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].rows, vec![vec![RED, GREEN]]);
        assert_eq!(offset, data.len() as u64);
    }

    #[test]
    fn rle_fixed_width_frame() {
        // 4x1 frame of blue: one run of four with 2-bit counts
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(BLUE, 1, 0b0)]);
        bw.write_bit(true);      // RLE
        bw.write_bit(false);     // fixed-width counts
        bw.write_bits(1, 5);     // rle_bits = 2
        bw.write_bits(0b0, 1);   // palette code
        bw.write_bits(3, 2);     // run of 3 + 1
        let data = bw.finish();

        let dec = ClusterDecoder::new(4, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let frames = dec.decode_cluster(&mut src, &mut offset, 1).unwrap();
        assert_eq!(frames[0].rows, vec![vec![BLUE; 4]]);
        assert_eq!(offset, data.len() as u64);
    }

    #[test]
    fn rle_coded_counts_frame() {
        // 5x1 frame: three reds then two greens, count codes "0" -> 3, "1" -> 2
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(RED, 1, 0b0), (GREEN, 1, 0b1)]);
        bw.write_bit(true);      // RLE
        bw.write_bit(true);      // coded counts
        bw.write_bits(2, 4);     // num_codes takes 2 bits
        bw.write_bits(2, 2);     // two codes
        bw.write_bits(2, 4);     // count values take 2 bits
        bw.write_bits(2, 2);     // count 2 + 1 = 3
        bw.write_bits(0, 4);     // code length 1
        bw.write_bits(0b0, 1);   // code "0"
        bw.write_bits(1, 2);     // count 1 + 1 = 2
        bw.write_bits(0, 4);     // code length 1
        bw.write_bits(0b1, 1);   // code "1"
        bw.write_bits(0b0, 1);   // red...
        bw.write_bits(0b0, 1);   // ...times 3
        bw.write_bits(0b1, 1);   // green...
        bw.write_bits(0b1, 1);   // ...times 2
        let data = bw.finish();

        let dec = ClusterDecoder::new(5, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let frames = dec.decode_cluster(&mut src, &mut offset, 1).unwrap();
        assert_eq!(frames[0].rows, vec![vec![RED, RED, RED, GREEN, GREEN]]);
        assert_eq!(offset, data.len() as u64);
    }

    #[test]
    fn single_color_palette_fills_frame() {
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(BLUE, 1, 0b0)]);
        bw.write_bit(false);       // not RLE
        bw.write_bits(0, 3);       // three matches of the lone code
        let data = bw.finish();

        let dec = ClusterDecoder::new(3, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let frames = dec.decode_cluster(&mut src, &mut offset, 1).unwrap();
        assert_eq!(frames[0].rows, vec![vec![BLUE; 3]]);
    }

    #[test]
    fn widest_run_length_field() {
        // rle_bits = 32: a run of 6 written in a 32-bit count
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(GREEN, 1, 0b0)]);
        bw.write_bit(true);
        bw.write_bit(false);
        bw.write_bits(31, 5);    // rle_bits = 32
        bw.write_bits(0b0, 1);
        bw.write_bits(5, 32);    // run of 5 + 1
        let data = bw.finish();

        let dec = ClusterDecoder::new(6, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let frames = dec.decode_cluster(&mut src, &mut offset, 1).unwrap();
        assert_eq!(frames[0].rows, vec![vec![GREEN; 6]]);
    }

    #[test]
    fn overlong_run_is_corrupt() {
        // run of 3 into a 2-pixel frame
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(RED, 1, 0b0)]);
        bw.write_bit(true);
        bw.write_bit(false);
        bw.write_bits(1, 5);     // rle_bits = 2
        bw.write_bits(0b0, 1);
        bw.write_bits(2, 2);     // run of 2 + 1 = 3
        let data = bw.finish();

        let dec = ClusterDecoder::new(2, 1);
        let mut src = MemoryReader::new(&data);
        let mut offset = 0u64;
        let err = dec.decode_cluster(&mut src, &mut offset, 1).unwrap_err();
        assert_eq!(err, DecoderError::CorruptStream);
    }

    #[test]
    fn skip_consumes_exactly_as_decode() {
        let mut bw = BitWriter::new();
        write_palette(&mut bw, &[(RED, 1, 0b0), (GREEN, 1, 0b1)]);
        for _ in 0..3 {
            bw.write_bit(false);
            bw.write_bits(0b01_10, 4); // 4x1 frame
            bw.align();
        }
        let data = bw.finish();

        let dec = ClusterDecoder::new(4, 1);
        let mut src = MemoryReader::new(&data);
        let mut decode_offset = 0u64;
        dec.decode_cluster(&mut src, &mut decode_offset, 3).unwrap();
        let mut skip_offset = 0u64;
        dec.skip_cluster(&mut src, &mut skip_offset, 3).unwrap();
        assert_eq!(decode_offset, skip_offset);
        assert_eq!(decode_offset, data.len() as u64);
    }
}
