//! GeoTIFF reading and writing using GDAL

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::options::{staging_file, GeoTiffOptions, WorkingGrid};
use crate::io::IoElement;
use crate::raster::{GeoTransform, PixelWindow, Raster, RasterElement, RasterGeometry};
use gdal::raster::{reproject, Buffer, RasterCreationOptions};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Read-only handle on a GDAL dataset.
///
/// Reads go through `RasterBand::read_as`, so only the requested window is
/// decoded. Georeferencing is read once on open; band access is serialised
/// so the handle can be shared between threads. The underlying file handle
/// closes when this value is dropped.
pub struct RasterDataset {
    path: String,
    transform: GeoTransform,
    size: (usize, usize),
    band_count: usize,
    crs: Option<CRS>,
    dataset: Mutex<Dataset>,
}

impl fmt::Debug for RasterDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterDataset")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("band_count", &self.band_count)
            .finish()
    }
}

impl RasterDataset {
    /// Open a raster; a dataset without a geotransform is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().display().to_string();
        let dataset = Dataset::open(&path)?;
        let transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .map_err(|_| Error::MissingGeoreference(path.clone()))?;
        let crs = read_crs(&dataset);

        Ok(Self {
            transform,
            size: dataset.raster_size(),
            band_count: dataset.raster_count(),
            crs,
            dataset: Mutex::new(dataset),
            path,
        })
    }

    fn dataset(&self) -> Result<MutexGuard<'_, Dataset>> {
        self.dataset
            .lock()
            .map_err(|_| Error::Other(format!("dataset lock poisoned: {}", self.path)))
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.transform
    }

    /// Grid size as (cols, rows)
    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn crs(&self) -> Option<CRS> {
        self.crs.clone()
    }

    /// No-data value of a band (1-based)
    pub fn nodata(&self, band: usize) -> Option<f64> {
        self.dataset().ok()?.rasterband(band).ok()?.no_data_value()
    }

    pub fn geometry(&self) -> Result<RasterGeometry> {
        let (cols, rows) = self.size;
        RasterGeometry::new(self.transform, cols, rows)
    }

    /// Read a window of a band (1-based) into a raster georeferenced at the window origin
    pub fn read_window<T>(&self, band: usize, window: &PixelWindow) -> Result<Raster<T>>
    where
        T: RasterElement + IoElement,
    {
        if band == 0 || band > self.band_count {
            return Err(Error::MissingBand {
                band,
                count: self.band_count,
            });
        }
        let (cols, rows) = self.size;
        window.check_within(cols, rows)?;

        let (data, nodata) = {
            let dataset = self.dataset()?;
            let rasterband = dataset.rasterband(band)?;
            let size = (window.cols, window.rows);
            let buffer =
                rasterband.read_as::<T>((window.col_off, window.row_off), size, size, None)?;
            (buffer.data().to_vec(), rasterband.no_data_value())
        };

        let mut raster = Raster::from_vec(data, window.rows, window.cols)?;
        let (x, y) = self
            .transform
            .apply(window.col_off as f64, window.row_off as f64);
        raster.set_transform(self.transform.with_origin(x, y));
        raster.set_crs(self.crs.clone());
        raster.set_nodata(nodata.and_then(num_traits::cast));
        Ok(raster)
    }

    /// Read a full band (1-based)
    pub fn read_band<T>(&self, band: usize) -> Result<Raster<T>>
    where
        T: RasterElement + IoElement,
    {
        let (cols, rows) = self.size;
        self.read_window(band, &PixelWindow::full(cols, rows))
    }
}

fn read_crs(dataset: &Dataset) -> Option<CRS> {
    let srs = dataset.spatial_ref().ok()?;
    let wkt = srs.to_wkt().ok()?;
    Some(match srs.auth_code() {
        Ok(code) => CRS::from_wkt_and_epsg(wkt, code as u32),
        Err(_) => CRS::from_wkt(wkt),
    })
}

fn spatial_ref(crs: &CRS) -> Result<SpatialRef> {
    if let Some(epsg) = crs.epsg() {
        return Ok(SpatialRef::from_epsg(epsg)?);
    }
    match crs.wkt() {
        Some(wkt) => Ok(SpatialRef::from_wkt(wkt)?),
        None => Err(Error::Other(format!("cannot build spatial reference for {}", crs))),
    }
}

fn creation_options(opts: &GeoTiffOptions) -> Result<RasterCreationOptions> {
    let mut options = RasterCreationOptions::new();
    options.set_name_value("COMPRESS", opts.compression.as_gdal_str())?;
    Ok(options)
}

/// Write a single-band raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement + IoElement,
    P: AsRef<Path>,
{
    write_geotiff_bands(std::slice::from_ref(raster), path, options)
}

/// Write same-shaped bands to a multi-band GeoTIFF file.
///
/// The dataset is created in a staging file next to `path` and renamed into
/// place once GDAL has closed it.
pub fn write_geotiff_bands<T, P>(
    bands: &[Raster<T>],
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement + IoElement,
    P: AsRef<Path>,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Other("no bands to write".to_string()))?;
    let (rows, cols) = first.shape();
    if let Some(bad) = bands.iter().find(|b| b.shape() != (rows, cols)) {
        let (ar, ac) = bad.shape();
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar,
            ac,
        });
    }

    let opts = options.unwrap_or_default();
    let staged = staging_file(path.as_ref())?;
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    {
        let mut dataset = driver.create_with_band_type_with_options::<T, _>(
            staged.path(),
            cols,
            rows,
            bands.len(),
            &creation_options(&opts)?,
        )?;

        dataset.set_geo_transform(&first.transform().to_gdal())?;
        if let Some(crs) = first.crs() {
            dataset.set_spatial_ref(&spatial_ref(crs)?)?;
        }

        for (i, raster) in bands.iter().enumerate() {
            let mut band = dataset.rasterband(i + 1)?;
            if let Some(nd) = raster.nodata().and_then(RasterElement::to_f64) {
                band.set_no_data_value(Some(nd))?;
            }
            let mut buffer = Buffer::new((cols, rows), raster.data().iter().copied().collect());
            band.write((0, 0), (cols, rows), &mut buffer)?;
        }
        // dataset dropped here: GDAL flushes and closes the file
    }

    staged.persist(path.as_ref())?;
    Ok(())
}

/// Reproject a raster onto the working grid with nearest-neighbour resampling.
///
/// The output extent is the source footprint transformed to the grid CRS,
/// snapped outward to whole pixels.
pub fn warp_to_grid<P, Q>(src: P, dst: Q, grid: &WorkingGrid) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let source = Dataset::open(src.as_ref())?;
    let mut src_srs = source.spatial_ref()?;
    let mut dst_srs = SpatialRef::from_epsg(grid.epsg)?;
    src_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    dst_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    let (cols, rows) = source.raster_size();
    let (min_x, min_y, max_x, max_y) =
        GeoTransform::from_gdal(source.geo_transform()?).bounds(cols, rows);
    let bounds = CoordTransform::new(&src_srs, &dst_srs)?
        .transform_bounds(&[min_x, min_y, max_x, max_y], 21)?;

    let res = grid.resolution;
    let out_cols = ((bounds[2] - bounds[0]) / res).ceil() as usize;
    let out_rows = ((bounds[3] - bounds[1]) / res).ceil() as usize;
    debug!(
        "warping {}x{} to {}x{} in EPSG:{}",
        cols, rows, out_cols, out_rows, grid.epsg
    );

    let band_count = source.raster_count();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut target = driver.create_with_band_type_with_options::<f64, _>(
        dst.as_ref(),
        out_cols,
        out_rows,
        band_count,
        &RasterCreationOptions::new(),
    )?;

    target.set_geo_transform(&[bounds[0], res, 0.0, bounds[3], 0.0, -res])?;
    target.set_spatial_ref(&dst_srs)?;
    for band in 1..=band_count {
        if let Some(nd) = source.rasterband(band)?.no_data_value() {
            target.rasterband(band)?.set_no_data_value(Some(nd))?;
        }
    }

    reproject(&source, &target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TiffCompression;

    #[test]
    fn test_write_read_window_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHMAP_tile.tif");

        let bands: Vec<Raster<f32>> = (0..5)
            .map(|b| {
                let data = (0..100).map(|i| (b * 1000 + i) as f32).collect();
                let mut r = Raster::from_vec(data, 10, 10).unwrap();
                r.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
                r.set_crs(Some(CRS::web_mercator()));
                r.set_nodata(Some(-9999.0));
                r
            })
            .collect();
        let opts = GeoTiffOptions {
            compression: TiffCompression::Lzw,
        };
        write_geotiff_bands(&bands, &path, Some(opts)).unwrap();

        let dataset = RasterDataset::open(&path).unwrap();
        assert_eq!(dataset.band_count(), 5);
        assert_eq!(dataset.crs().and_then(|c| c.epsg()), Some(3857));

        let window = PixelWindow::new(3, 2, 4, 5);
        let red: Raster<f32> = dataset.read_window(3, &window).unwrap();
        assert_eq!(red.shape(), (5, 4));
        assert_eq!(red.get(0, 0).unwrap(), 2023.0);
        assert_eq!(red.nodata(), Some(-9999.0));
        assert_eq!(red.transform().origin_x, 30.0);
        assert_eq!(red.transform().origin_y, 80.0);
    }
}
