//! Options shared by the GeoTIFF backends

use crate::crs::{CRS, WEB_MERCATOR_EPSG};
use crate::error::{Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// Compression applied when writing GeoTIFF files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    None,
    #[default]
    Lzw,
    Deflate,
}

impl TiffCompression {
    /// Parse a GDAL-style compression name (case-insensitive)
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Ok(TiffCompression::None),
            "LZW" => Ok(TiffCompression::Lzw),
            "DEFLATE" | "ZIP" => Ok(TiffCompression::Deflate),
            _ => Err(Error::InvalidParameter {
                name: "compression",
                value: name.to_string(),
                reason: "expected NONE, LZW or DEFLATE".to_string(),
            }),
        }
    }

    /// Value of the GDAL `COMPRESS` creation option
    pub fn as_gdal_str(&self) -> &'static str {
        match self {
            TiffCompression::None => "NONE",
            TiffCompression::Lzw => "LZW",
            TiffCompression::Deflate => "DEFLATE",
        }
    }
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: TiffCompression,
}

/// Fixed grid change rasters are warped onto before alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingGrid {
    /// Target CRS
    pub epsg: u32,
    /// Square pixel size in CRS units
    pub resolution: f64,
}

impl WorkingGrid {
    pub fn crs(&self) -> CRS {
        CRS::from_epsg(self.epsg)
    }
}

impl Default for WorkingGrid {
    fn default() -> Self {
        Self {
            epsg: WEB_MERCATOR_EPSG,
            resolution: 10.0,
        }
    }
}

/// Scratch file next to `path`, renamed onto it once fully written.
///
/// Creating it in the destination directory keeps the final rename on one
/// filesystem, so readers see either no file or the complete one.
pub(crate) fn staging_file(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = tempfile::Builder::new()
        .prefix(".dectree-")
        .suffix(".tif.partial")
        .tempfile_in(dir)?;
    Ok(file)
}
