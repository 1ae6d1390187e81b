//! Pipeline error type. Every failure is fatal: a stage that hits one of
//! these aborts the run with no partial output cleanup beyond what the
//! operating system gives us.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported pixel format in {}", path.display())]
    UnsupportedPixelFormat { path: PathBuf },

    #[error(
        "{}: raster is {got_width}x{got_height}, expected {want_width}x{want_height}",
        path.display()
    )]
    ShapeMismatch {
        path: PathBuf,
        got_width: usize,
        got_height: usize,
        want_width: usize,
        want_height: usize,
    },

    #[error("raster list {} is empty", path.display())]
    EmptyStack { path: PathBuf },

    #[error("{}: expected a geographic coordinate system, found EPSG:{epsg}", path.display())]
    NotGeographic { path: PathBuf, epsg: u32 },

    #[error("boundary {}: {reason}", path.display())]
    Boundary { path: PathBuf, reason: String },

    #[error("{}: block write does not match the declared pixel format", path.display())]
    BlockFormatMismatch { path: PathBuf },
}
