//! Error types for container parsing, scene reconstruction, and merging.

use crate::chunk::ChunkTag;
use crate::codec::DecodeError;

/// Errors that can occur while reading, merging, or writing a container.
#[derive(Debug, thiserror::Error)]
pub enum VoxError {
    /// The file does not start with the `VOX ` signature.
    #[error("invalid magic bytes: {found:?}")]
    InvalidMagic {
        /// The first bytes of the file (fewer than four if the file is shorter).
        found: Vec<u8>,
    },

    /// A chunk header or payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A chunk that must appear exactly once is absent.
    #[error("missing required {0} chunk")]
    MissingChunk(ChunkTag),

    /// The scene layout breaks an assumption the merge relies on.
    #[error("unsupported scene layout: {0}")]
    Structure(String),

    /// A color has no candidate slots to be placed in.
    #[error("no candidate palette slots for color slot {slot}")]
    EmptyBand {
        /// The source palette slot being placed.
        slot: u8,
    },

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
