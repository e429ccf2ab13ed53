//! Error handling structures

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

/// Helpful `Result` type alias
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that may occur while loading assets or writing images.
///
/// The pipeline itself never fails: unbound resources degrade to no-ops,
/// degenerate primitives are dropped, and out-of-bounds pixel operations
/// are ignored.
#[derive(Debug)]
pub enum RenderError {
    /// An underlying I/O operation failed
    Io(io::Error),
    /// An image file had an extension we do not know how to decode
    UnsupportedImageFormat(String),
    /// An image file was recognized but its contents could not be parsed
    MalformedImage(String),
    /// An OBJ file could not be loaded
    ObjLoad(String),
    /// A texture was created from a pixel buffer of the wrong length
    TextureSizeMismatch { expected: usize, actual: usize },
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match *self {
            RenderError::Io(ref e) => write!(f, "i/o error: {}", e),
            RenderError::UnsupportedImageFormat(ref ext) => {
                write!(f, "unsupported image format: {}", ext)
            }
            RenderError::MalformedImage(ref msg) => write!(f, "malformed image: {}", msg),
            RenderError::ObjLoad(ref msg) => write!(f, "failed to load OBJ: {}", msg),
            RenderError::TextureSizeMismatch { expected, actual } => {
                write!(f, "texture pixel buffer has {} entries, expected {}", actual, expected)
            }
        }
    }
}

impl Error for RenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            RenderError::Io(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(e: io::Error) -> RenderError {
        RenderError::Io(e)
    }
}
