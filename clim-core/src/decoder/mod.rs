//! CLIM file decoding.
//!
//! [`ClimDecoder`] opens a CLIM file, parses its header, extracts the
//! appended audio blob into a sidecar file and then serves the video as a
//! sequence of frame clusters. Seeking is cluster-aligned: positioning on a
//! frame decodes from the start of the cluster containing it.

use std::fmt;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::frame::{Frame, FrameError};
use crate::io::bitreader::{BitReader, BitReaderError};
use crate::io::byteio::{ByteIOError, ByteSource, ChunkedReader};

/// A list specifying general decoding errors.
#[derive(Debug,Clone,Copy,PartialEq)]
pub enum DecoderError {
    /// File open, read or sidecar write failure.
    Io,
    /// The file is not a CLIM file or its header is structurally broken.
    InvalidFormat,
    /// The file uses a reserved encoding family.
    UnsupportedFormat,
    /// The bitstream ended in the middle of a cluster.
    EndOfStream,
    /// The bitstream contains a sequence no codebook can resolve, or a run
    /// longer than the remaining frame capacity.
    CorruptStream,
    /// A byte index past the end of the file was requested.
    OutOfRange,
    /// Decoded pixel count does not match the frame geometry.
    DimensionMismatch,
}

/// A specialised `Result` type for decoding operations.
pub type DecoderResult<T> = Result<T, DecoderError>;

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            DecoderError::Io                => "input/output error",
            DecoderError::InvalidFormat     => "invalid CLIM file",
            DecoderError::UnsupportedFormat => "unsupported CLIM format",
            DecoderError::EndOfStream       => "unexpected end of stream",
            DecoderError::CorruptStream     => "corrupt bitstream",
            DecoderError::OutOfRange        => "byte index out of range",
            DecoderError::DimensionMismatch => "pixel count does not match frame geometry",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DecoderError {}

impl From<ByteIOError> for DecoderError {
    fn from(err: ByteIOError) -> Self {
        match err {
            ByteIOError::OutOfRange => DecoderError::OutOfRange,
            ByteIOError::ReadError  => DecoderError::Io,
        }
    }
}

impl From<BitReaderError> for DecoderError {
    fn from(err: BitReaderError) -> Self {
        match err {
            BitReaderError::EndOfStream          => DecoderError::EndOfStream,
            BitReaderError::Io                   => DecoderError::Io,
            BitReaderError::TooManyBitsRequested => DecoderError::CorruptStream,
        }
    }
}

impl From<FrameError> for DecoderError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::DimensionMismatch => DecoderError::DimensionMismatch,
        }
    }
}

macro_rules! validate {
    ($a:expr) => { if !$a { return Err(DecoderError::InvalidFormat); } };
}

pub mod codebook;
pub mod cluster;

use cluster::ClusterDecoder;

const AUDIO_SUFFIX: &str = "--audio.mp3";

/// Metadata of a standard-format CLIM file.
#[derive(Debug,Clone,Copy,PartialEq)]
pub struct StandardFormatInfo {
    /// Video width in pixels.
    pub width: u16,
    /// Video height in pixels.
    pub height: u16,
    /// Frame duration in milliseconds.
    pub milliseconds_between_frames: u16,
    /// Byte offset where the appended audio payload starts.
    pub audio_start_offset: u64,
}

impl StandardFormatInfo {
    /// Returns the playback rate in frames per second.
    pub fn fps(&self) -> f64 {
        1000.0 / f64::from(self.milliseconds_between_frames)
    }
}

struct ClusteringManifest {
    cluster_sizes:        Vec<usize>,
    total_frames:         usize,
    first_cluster_offset: u64,
}

/// Reads the mode byte and the standard format header from offset 0.
///
/// Returns the parsed metadata and the byte offset right after the header.
fn parse_standard_header(src: &mut dyn ByteSource) -> DecoderResult<(StandardFormatInfo, u64)> {
    let mut br = BitReader::new(src);

    br.read_bits(6)?;               // m7..m2 reserved, ignored
    let m1 = br.read_bool()?;
    let m0 = br.read_bool()?;
    validate!(m0);                  // m0 = 1 in every CLIM file
    if m1 {
        return Err(DecoderError::UnsupportedFormat);
    }
    br.align_to_byte();

    let width                       = br.read_bits(16)? as u16;
    let height                      = br.read_bits(16)? as u16;
    let milliseconds_between_frames = br.read_bits(16)? as u16;
    let audio_start_offset          = br.read_bits(40)?;
    let next_offset = br.align_to_byte();
    validate!(width > 0 && height > 0);

    let info = StandardFormatInfo { width, height, milliseconds_between_frames, audio_start_offset };
    Ok((info, next_offset))
}

/// Reads the clustering manifest starting at `offset`.
fn parse_clustering_header(src: &mut dyn ByteSource, offset: u64) -> DecoderResult<ClusteringManifest> {
    let mut br = BitReader::new_at(src, offset * 8);

    let cn_bits        = br.read_bits(5)? as u32 + 1;
    let total_clusters = br.read_bits(cn_bits)? as usize + 1;
    let cd_bits        = br.read_bits(5)? as u32 + 1;

    let mut cluster_sizes = Vec::with_capacity(total_clusters);
    let mut total_frames = 0usize;
    for _ in 0..total_clusters {
        let size = br.read_bits(cd_bits)? as usize + 1;
        total_frames += size;
        cluster_sizes.push(size);
    }
    let first_cluster_offset = br.align_to_byte();

    Ok(ClusteringManifest { cluster_sizes, total_frames, first_cluster_offset })
}

/// Copies `[audio_start, file end)` into the first free numbered sidecar
/// file inside `folder`, creating the folder if needed.
fn extract_audio(src: &mut ChunkedReader, folder: &Path, audio_start: u64) -> DecoderResult<PathBuf> {
    fs::create_dir_all(folder).map_err(|_| DecoderError::Io)?;

    let mut num = 0usize;
    let sidecar = loop {
        let candidate = folder.join(format!("{}{}", num, AUDIO_SUFFIX));
        if !candidate.exists() {
            break candidate;
        }
        num += 1;
    };

    let file = File::create(&sidecar).map_err(|_| DecoderError::Io)?;
    let mut out = BufWriter::new(file);
    let mut index = audio_start;
    while index < src.size() {
        out.write_all(&[src.byte_at(index)?]).map_err(|_| DecoderError::Io)?;
        index += 1;
    }
    out.flush().map_err(|_| DecoderError::Io)?;

    Ok(sidecar)
}

/// The bitstream ending inside the header means the file is structurally
/// broken rather than merely short.
fn truncated_header_err(err: DecoderError) -> DecoderError {
    match err {
        DecoderError::EndOfStream | DecoderError::OutOfRange => DecoderError::InvalidFormat,
        other => other,
    }
}

/// Decoder for one CLIM file.
///
/// Construction parses the header, extracts the audio sidecar and leaves
/// the decoder positioned on the first cluster. Dropping the decoder
/// removes its sidecar file and, if that leaves the extraction folder
/// empty, the folder as well.
#[derive(Debug)]
pub struct ClimDecoder {
    src:                    ChunkedReader,
    info:                   StandardFormatInfo,
    cluster_decoder:        ClusterDecoder,
    cluster_sizes:          Vec<usize>,
    total_frames:           usize,
    first_cluster_offset:   u64,
    next_byte_offset:       u64,
    current_cluster:        usize,
    cluster_starting_frame: usize,
    audio_sidecar:          PathBuf,
    audio_folder:           PathBuf,
}

impl ClimDecoder {
    /// Opens `file_path` and prepares it for cluster iteration, extracting
    /// the audio payload into `audio_extraction_folder`.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(file_path: P, audio_extraction_folder: Q) -> DecoderResult<Self> {
        let mut src = ChunkedReader::open_default(file_path.as_ref())?;

        let (info, header_end) = parse_standard_header(&mut src)
            .map_err(truncated_header_err)?;

        let audio_folder = audio_extraction_folder.as_ref().to_path_buf();
        let audio_sidecar = extract_audio(&mut src, &audio_folder, info.audio_start_offset)?;

        let manifest = parse_clustering_header(&mut src, header_end)
            .map_err(truncated_header_err)?;

        tracing::debug!(
            width = info.width,
            height = info.height,
            msbf = info.milliseconds_between_frames,
            clusters = manifest.cluster_sizes.len(),
            frames = manifest.total_frames,
            "parsed CLIM header"
        );

        Ok(Self {
            src,
            cluster_decoder: ClusterDecoder::new(usize::from(info.width), usize::from(info.height)),
            info,
            next_byte_offset: manifest.first_cluster_offset,
            first_cluster_offset: manifest.first_cluster_offset,
            cluster_sizes: manifest.cluster_sizes,
            total_frames: manifest.total_frames,
            current_cluster: 0,
            cluster_starting_frame: 0,
            audio_sidecar,
            audio_folder,
        })
    }

    /// Returns the video metadata.
    pub fn info(&self) -> StandardFormatInfo {
        self.info
    }

    /// Returns the total number of frames in the file.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Returns the total number of clusters in the file.
    pub fn total_clusters(&self) -> usize {
        self.cluster_sizes.len()
    }

    /// Returns the frame-of-file index at which the next cluster starts.
    pub fn cluster_starting_frame(&self) -> usize {
        self.cluster_starting_frame
    }

    /// Returns the path of the extracted audio sidecar.
    pub fn audio_sidecar_path(&self) -> &Path {
        &self.audio_sidecar
    }

    /// Decodes the next cluster and returns its frames, or `None` once all
    /// clusters have been served.
    pub fn next_cluster_frames(&mut self) -> DecoderResult<Option<Vec<Frame>>> {
        if self.current_cluster >= self.cluster_sizes.len() {
            return Ok(None);
        }
        let size = self.cluster_sizes[self.current_cluster];
        let frames = self.cluster_decoder
            .decode_cluster(&mut self.src, &mut self.next_byte_offset, size)
            .map_err(|err| {
                tracing::warn!(cluster = self.current_cluster, %err, "cluster decode failed");
                err
            })?;
        self.cluster_starting_frame += size;
        self.current_cluster += 1;
        Ok(Some(frames))
    }

    /// Positions the decoder so that the next cluster served contains the
    /// frame with index `target`. Returns `false` if `target` lies past the
    /// last frame.
    pub fn seek_to_frame(&mut self, target: usize) -> DecoderResult<bool> {
        if target >= self.total_frames {
            return Ok(false);
        }
        let mut offset = self.first_cluster_offset;
        self.cluster_starting_frame = 0;
        self.current_cluster = 0;
        while self.cluster_starting_frame + self.cluster_sizes[self.current_cluster] <= target {
            let size = self.cluster_sizes[self.current_cluster];
            self.cluster_decoder.skip_cluster(&mut self.src, &mut offset, size)?;
            self.cluster_starting_frame += size;
            self.current_cluster += 1;
        }
        self.next_byte_offset = offset;
        Ok(true)
    }
}

impl Drop for ClimDecoder {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.audio_sidecar) {
            tracing::warn!(path = %self.audio_sidecar.display(), %err, "could not remove audio sidecar");
            return;
        }
        let folder_empty = fs::read_dir(&self.audio_folder)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if folder_empty {
            if let Err(err) = fs::remove_dir(&self.audio_folder) {
                tracing::warn!(path = %self.audio_folder.display(), %err, "could not remove extraction folder");
            }
        }
    }
}
