//! Input operations.

pub mod bitreader;
pub mod bitwriter;
pub mod byteio;
