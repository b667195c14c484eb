//! Container parsing errors and warnings

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort loading a container
///
/// A failed load never produces an asset, so none of these can reach the
/// real-time path.
#[derive(Error, Debug)]
pub enum AudioFileError {
    /// File missing or unreadable
    #[error("Failed to open audio file {path:?}: {source}")]
    ContainerOpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read failure while walking the chunk list
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad magic, or header values no decoder could honor
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Compressed or otherwise unrecognized sample encoding
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// `data` chunk appeared before any `fmt ` chunk
    #[error("data chunk precedes fmt chunk")]
    DataBeforeFormat,

    /// Required chunk never appeared
    #[error("Missing required chunk: {0}")]
    MissingChunk(&'static str),

    /// Declared data length is not a whole number of frames
    #[error("data chunk length {length} is not a multiple of the {stride}-byte frame")]
    InvalidDataLength { length: u32, stride: usize },

    /// Unrecognized chunk after the sample data (only under a rejecting policy)
    #[error("Unexpected chunk {0} after data chunk")]
    UnexpectedTrailingData(ChunkId),
}

/// Four-byte RIFF chunk tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", String::from_utf8_lossy(&self.0).escape_default())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self)
    }
}

/// Conditions that were tolerated while parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// Stream ended inside the data chunk; only whole frames were kept
    TruncatedData { declared: u32, kept_frames: usize },
    /// Outer magic did not read `RIFF`/`WAVE` and parsing continued anyway
    BadMagic { riff: ChunkId, form: ChunkId },
    /// Unrecognized chunk after the sample data
    TrailingChunk(ChunkId),
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::TruncatedData {
                declared,
                kept_frames,
            } => write!(
                f,
                "data chunk truncated: {} bytes declared, kept {} whole frames",
                declared, kept_frames
            ),
            ParseWarning::BadMagic { riff, form } => {
                write!(f, "unexpected container magic {} / {}", riff, form)
            }
            ParseWarning::TrailingChunk(id) => write!(f, "trailing chunk {} after data", id),
        }
    }
}
