//! Core functionality for reading CLIM clustered video files.
//!
//! A CLIM file is a single artifact holding a small header, a sequence of
//! palette-and-prefix-coded pixel clusters and an appended audio blob.
//! This crate provides the byte and bit level readers, the entropy decoders
//! and the [`ClimDecoder`] type that binds them together for playback.
//!
//! [`ClimDecoder`]: ./decoder/struct.ClimDecoder.html

pub mod decoder;
pub mod frame;
pub mod io;
