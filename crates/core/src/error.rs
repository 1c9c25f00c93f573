//! Error types for DecTree

use thiserror::Error;

/// Main error type for DecTree operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Rotated or sheared geotransform is not supported: {0:?}")]
    RotatedTransform([f64; 6]),

    #[error(
        "Window ({col_off}, {row_off}) {win_cols}x{win_rows} exceeds raster of size {cols}x{rows}"
    )]
    WindowOutOfBounds {
        col_off: isize,
        row_off: isize,
        win_cols: usize,
        win_rows: usize,
        cols: usize,
        rows: usize,
    },

    #[error("Band {band} not available (raster has {count} bands)")]
    MissingBand { band: usize, count: usize },

    #[error("No georeferencing in {0}")]
    MissingGeoreference(String),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(e: tempfile::PersistError) -> Self {
        Error::Io(e.error)
    }
}

/// Result type alias for DecTree operations
pub type Result<T> = std::result::Result<T, Error>;
