//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Georeferencing is carried in the standard GeoTIFF
//! tags (ModelPixelScale + ModelTiepoint, or ModelTransformation), the EPSG
//! code in the GeoKey directory and the no-data value in the `GDAL_NODATA`
//! ASCII tag, so files round-trip with GDAL.
//!
//! Opening a file only parses its directories. Window reads decode the
//! strips or tiles they intersect, so multi-band
//! input may be pixel-interleaved (what GDAL writes by default), planar, or
//! one page per band. The writer emits one page per band.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::chunks::PageLayout;
use crate::io::options::{staging_file, GeoTiffOptions, TiffCompression, WorkingGrid};
use crate::io::IoElement;
use crate::raster::{GeoTransform, PixelWindow, Raster, RasterElement, RasterGeometry, SampleKind};
use ndarray::Array2;
use num_traits::NumCast;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, Limits};
use tiff::encoder::colortype::{self, ColorType as EncoderColorType};
use tiff::encoder::compression::{Compression, Deflate, Lzw, Uncompressed};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

// GeoKey ids (GeoTIFF 1.0, section 6.2)
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

// NewSubfileType bits of pages that are not bands
const REDUCED_RESOLUTION: u32 = 0b001;
const TRANSPARENCY_MASK: u32 = 0b100;

/// Where the samples of one band live
#[derive(Debug, Clone, Copy)]
struct BandSource {
    page: usize,
    sample: usize,
}

/// Read-only handle on a GeoTIFF file.
///
/// Holds only the parsed directories; every read opens its own file
/// handle, so one dataset can be shared between threads.
#[derive(Debug)]
pub struct RasterDataset {
    path: PathBuf,
    transform: GeoTransform,
    cols: usize,
    rows: usize,
    crs: Option<CRS>,
    nodata: Option<f64>,
    little_endian: bool,
    pages: Vec<PageLayout>,
    bands: Vec<BandSource>,
}

impl RasterDataset {
    /// Open a GeoTIFF file and parse its band layout.
    ///
    /// A file without georeferencing tags is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let little_endian = read_byte_order(&mut file)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

        let transform = read_geotransform(&mut decoder)
            .ok_or_else(|| Error::MissingGeoreference(path.display().to_string()))?;
        let crs = read_crs(&mut decoder);
        let nodata = read_nodata(&mut decoder);

        let first = PageLayout::read(&mut decoder)?;
        let (cols, rows) = first.dimensions();
        let mut pages = vec![first];
        while decoder.more_images() {
            decoder.next_image()?;
            let subfile = decoder
                .find_tag_unsigned::<u32>(Tag::NewSubfileType)?
                .unwrap_or(0);
            if subfile & (REDUCED_RESOLUTION | TRANSPARENCY_MASK) != 0 {
                continue;
            }
            let page = PageLayout::read(&mut decoder)?;
            if page.dimensions() != (cols, rows) {
                debug!("skipping {:?} page in {}", page.dimensions(), path.display());
                continue;
            }
            pages.push(page);
        }

        let bands = pages
            .iter()
            .enumerate()
            .flat_map(|(page, layout)| (0..layout.samples()).map(move |sample| BandSource { page, sample }))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            transform,
            cols,
            rows,
            crs,
            nodata,
            little_endian,
            pages,
            bands,
        })
    }

    pub fn geo_transform(&self) -> GeoTransform {
        self.transform
    }

    /// Grid size as (cols, rows)
    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn crs(&self) -> Option<CRS> {
        self.crs.clone()
    }

    /// No-data value of a band (1-based).
    ///
    /// `GDAL_NODATA` is a per-file tag, so every band reports the same value.
    pub fn nodata(&self, band: usize) -> Option<f64> {
        (band >= 1 && band <= self.bands.len())
            .then_some(self.nodata)
            .flatten()
    }

    pub fn geometry(&self) -> Result<RasterGeometry> {
        RasterGeometry::new(self.transform, self.cols, self.rows)
    }

    /// Read a window of a band (1-based) into a raster georeferenced at the window origin
    pub fn read_window<T>(&self, band: usize, window: &PixelWindow) -> Result<Raster<T>>
    where
        T: RasterElement + IoElement,
    {
        let source = band
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or(Error::MissingBand {
                band,
                count: self.bands.len(),
            })?;
        window.check_within(self.cols, self.rows)?;

        let mut reader = BufReader::new(File::open(&self.path)?);
        let data = self.pages[source.page].read_window::<T, _>(
            &mut reader,
            source.sample,
            window,
            self.little_endian,
        )?;
        let mut raster = Raster::from_vec(data, window.rows, window.cols)?;

        let (x, y) = self
            .transform
            .apply(window.col_off as f64, window.row_off as f64);
        raster.set_transform(self.transform.with_origin(x, y));
        raster.set_crs(self.crs.clone());
        raster.set_nodata(self.nodata.and_then(num_traits::cast));
        Ok(raster)
    }

    /// Read a full band (1-based)
    pub fn read_band<T>(&self, band: usize) -> Result<Raster<T>>
    where
        T: RasterElement + IoElement,
    {
        self.read_window(band, &PixelWindow::full(self.cols, self.rows))
    }
}

/// `true` for little-endian ("II") files; leaves the file at its start
fn read_byte_order(file: &mut File) -> Result<bool> {
    let mut magic = [0u8; 2];
    file.read_exact(&mut magic)?;
    file.rewind()?;
    match &magic {
        b"II" => Ok(true),
        b"MM" => Ok(false),
        _ => Err(Error::Tiff("not a TIFF file".to_string())),
    }
}

/// Read the geotransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag);
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag);

    if let (Ok(scale), Ok(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    let matrix = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    (matrix.len() >= 8).then(|| {
        GeoTransform::from_gdal([matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5]])
    })
}

/// EPSG code from the GeoKey directory, if it names one
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    let mut code = None;

    for entry in keys.get(4..)?.chunks_exact(4) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => return Some(CRS::from_epsg(value as u32)),
            GEOGRAPHIC_TYPE => code = Some(value as u32),
            _ => {}
        }
    }
    code.map(CRS::from_epsg)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs
        .and_then(CRS::epsg)
        .and_then(|c| u16::try_from(c).ok());
    let geographic = crs.is_some_and(CRS::is_geographic);

    let mut keys = vec![
        GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 },
        GT_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = code {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }

    let count = (keys.len() / 4) as u16;
    let mut directory = vec![1, 1, 0, count];
    directory.extend(keys);
    directory
}

/// Write a single-band raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement + IoElement,
    P: AsRef<Path>,
{
    write_geotiff_bands(std::slice::from_ref(raster), path, options)
}

/// Write same-shaped bands to a GeoTIFF file, one page per band.
///
/// The file is staged next to `path` and renamed into place, so `path`
/// either holds the complete raster or is untouched.
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
    let (er, ec) = first.shape();
    if let Some(bad) = bands.iter().find(|b| b.shape() != (er, ec)) {
        let (ar, ac) = bad.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let opts = options.unwrap_or_default();
    let mut staged = staging_file(path.as_ref())?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        encode_pages(bands, &mut writer, opts.compression)?;
        writer.flush()?;
    }
    staged.persist(path.as_ref())?;
    Ok(())
}

fn encode_pages<T, W>(bands: &[Raster<T>], writer: W, compression: TiffCompression) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    for band in bands {
        match compression {
            TiffCompression::None => write_band(&mut encoder, band, Uncompressed)?,
            TiffCompression::Lzw => write_band(&mut encoder, band, Lzw)?,
            TiffCompression::Deflate => write_band(&mut encoder, band, Deflate::default())?,
        }
    }
    Ok(())
}

fn write_band<T, W, D>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, compression: D) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
    D: Compression,
{
    match T::KIND {
        SampleKind::U8 => write_page::<colortype::Gray8, _, _, _>(encoder, raster, compression),
        SampleKind::U16 => write_page::<colortype::Gray16, _, _, _>(encoder, raster, compression),
        SampleKind::U32 => write_page::<colortype::Gray32, _, _, _>(encoder, raster, compression),
        SampleKind::I8 => write_page::<colortype::GrayI8, _, _, _>(encoder, raster, compression),
        SampleKind::I16 => write_page::<colortype::GrayI16, _, _, _>(encoder, raster, compression),
        SampleKind::I32 => write_page::<colortype::GrayI32, _, _, _>(encoder, raster, compression),
        SampleKind::F32 => {
            write_page::<colortype::Gray32Float, _, _, _>(encoder, raster, compression)
        }
        SampleKind::F64 => {
            write_page::<colortype::Gray64Float, _, _, _>(encoder, raster, compression)
        }
    }
}

fn write_page<C, T, W, D>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, compression: D) -> Result<()>
where
    C: EncoderColorType,
    C::Inner: NumCast + Copy,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
    D: Compression,
{
    let (rows, cols) = raster.shape();
    let data = raster
        .data()
        .iter()
        .map(|&v| {
            num_traits::cast::<T, C::Inner>(v)
                .ok_or_else(|| Error::UnsupportedDataType(format!("cannot encode {:?}", v)))
        })
        .collect::<Result<Vec<C::Inner>>>()?;

    let mut image =
        encoder.new_image_with_compression::<C, D>(cols as u32, rows as u32, compression)?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    let geokeys = geokey_directory(raster.crs());

    image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;
    if let Some(nodata) = raster.nodata().and_then(RasterElement::to_f64) {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;
    }

    image.write_data(&data)?;
    Ok(())
}

/// Move a raster onto the working grid.
///
/// The native backend cannot change CRS: a raster already in the grid CRS
/// (or without CRS information) is resampled with nearest neighbour, or
/// copied as-is when its pixel size already matches.
pub fn warp_to_grid<P, Q>(src: P, dst: Q, grid: &WorkingGrid) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let dataset = RasterDataset::open(src.as_ref())?;
    let target = grid.crs();
    if let Some(crs) = dataset.crs() {
        if !crs.is_equivalent(&target) {
            return Err(Error::CrsMismatch(crs.identifier(), target.identifier()));
        }
    }

    let gt = dataset.geo_transform();
    let geometry = dataset.geometry()?;
    let res = grid.resolution;
    let on_grid = (gt.pixel_width - res).abs() < 1e-9 && (gt.pixel_height + res).abs() < 1e-9;
    if on_grid {
        debug!("{} already on the working grid", src.as_ref().display());
        std::fs::copy(src.as_ref(), dst.as_ref())?;
        return Ok(());
    }

    let (cols, rows) = dataset.size();
    let (min_x, min_y, max_x, max_y) = gt.bounds(cols, rows);
    let out_cols = ((max_x - min_x) / res).ceil() as usize;
    let out_rows = ((max_y - min_y) / res).ceil() as usize;
    let out_gt = GeoTransform::new(min_x, max_y, res, -res);
    debug!(
        "resampling {}x{} to {}x{} at {} units",
        cols, rows, out_cols, out_rows, res
    );

    let mut warped = Vec::with_capacity(dataset.band_count());
    for band in 1..=dataset.band_count() {
        let source: Raster<f64> = dataset.read_band(band)?;
        let fill = source.nodata().unwrap_or(f64::NAN);

        let data = Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
            let (x, y) = out_gt.apply(c as f64 + 0.5, r as f64 + 0.5);
            let (sc, sr) = geometry.to_pixel(x, y);
            if sc >= 0.0 && sr >= 0.0 && (sc as usize) < cols && (sr as usize) < rows {
                source.data()[(sr as usize, sc as usize)]
            } else {
                fill
            }
        });

        let mut out = Raster::from_array(data);
        out.set_transform(out_gt);
        out.set_crs(Some(target.clone()));
        out.set_nodata(source.nodata());
        warped.push(out);
    }

    write_geotiff_bands(&warped, dst, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::tags::{PhotometricInterpretation, SampleFormat};

    fn label_raster() -> Raster<u8> {
        let mut raster = Raster::from_vec((0..12).map(|v| v as u8).collect(), 3, 4).unwrap();
        raster.set(2, 3, 255).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 10.0, -10.0));
        raster.set_crs(Some(CRS::from_epsg(3857)));
        raster.set_nodata(Some(255));
        raster
    }

    fn change_bands(rows: usize, cols: usize, res: f64) -> Vec<Raster<f32>> {
        (0..5)
            .map(|b| {
                let data = (0..rows * cols).map(|i| b as f32 * 100.0 + i as f32 * 0.5).collect();
                let mut r = Raster::from_vec(data, rows, cols).unwrap();
                r.set_transform(GeoTransform::new(1000.0, 2000.0, res, -res));
                r.set_crs(Some(CRS::web_mercator()));
                r
            })
            .collect()
    }

    #[test]
    fn test_single_band_roundtrip_keeps_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.tif");
        let raster = label_raster();

        write_geotiff(&raster, &path, None).unwrap();
        let dataset = RasterDataset::open(&path).unwrap();

        assert_eq!(dataset.size(), (4, 3));
        assert_eq!(dataset.band_count(), 1);
        assert_eq!(dataset.geo_transform(), *raster.transform());
        assert_eq!(dataset.crs().and_then(|c| c.epsg()), Some(3857));
        assert_eq!(dataset.nodata(1), Some(255.0));
        assert_eq!(dataset.nodata(2), None);

        let loaded: Raster<u8> = dataset.read_band(1).unwrap();
        assert_eq!(loaded.data(), raster.data());
        assert_eq!(loaded.nodata(), Some(255));
    }

    #[test]
    fn test_multiband_window_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHMAP_tile.tif");
        let bands = change_bands(6, 8, 10.0);
        write_geotiff_bands(
            &bands,
            &path,
            Some(GeoTiffOptions {
                compression: TiffCompression::Deflate,
            }),
        )
        .unwrap();

        let dataset = RasterDataset::open(&path).unwrap();
        assert_eq!(dataset.band_count(), 5);

        let window = PixelWindow::new(2, 1, 3, 4);
        let red: Raster<f64> = dataset.read_window(3, &window).unwrap();
        assert_eq!(red.shape(), (4, 3));
        // band 3 -> offset 200, cell (1, 2) -> index 10 -> +5.0
        assert_eq!(red.get(0, 0).unwrap(), 205.0);
        assert_eq!(red.transform().origin_x, 1020.0);
        assert_eq!(red.transform().origin_y, 1990.0);

        assert!(matches!(
            dataset.read_window::<f64>(6, &window),
            Err(Error::MissingBand { band: 6, count: 5 })
        ));
        assert!(matches!(
            dataset.read_window::<f64>(1, &PixelWindow::new(6, 0, 3, 1)),
            Err(Error::WindowOutOfBounds { .. })
        ));
    }

    /// Five float samples per pixel, as GDAL writes a CHMAP by default
    struct Gray32Float5;

    impl EncoderColorType for Gray32Float5 {
        type Inner = f32;
        const TIFF_VALUE: PhotometricInterpretation = PhotometricInterpretation::BlackIsZero;
        const BITS_PER_SAMPLE: &'static [u16] = &[32; 5];
        const SAMPLE_FORMAT: &'static [SampleFormat] = &[SampleFormat::IEEEFP; 5];
    }

    /// Pixel-interleaved CHMAP with the same values as `change_bands`
    fn write_interleaved(path: &Path, rows: usize, cols: usize, rows_per_strip: u32) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        let mut image = encoder
            .new_image_with_compression::<Gray32Float5, _>(cols as u32, rows as u32, Lzw)
            .unwrap();
        image.rows_per_strip(rows_per_strip).unwrap();
        let geokeys = geokey_directory(Some(&CRS::web_mercator()));
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &[10.0, 10.0, 0.0][..]).unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, 1000.0, 2000.0, 0.0][..])
            .unwrap();
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..]).unwrap();

        let data: Vec<f32> = (0..rows * cols)
            .flat_map(|i| (0..5).map(move |b| b as f32 * 100.0 + i as f32 * 0.5))
            .collect();
        image.write_data(&data).unwrap();
    }

    #[test]
    fn test_pixel_interleaved_bands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHMAP_gdal.tif");
        write_interleaved(&path, 6, 8, 2);

        let dataset = RasterDataset::open(&path).unwrap();
        assert_eq!(dataset.band_count(), 5);
        assert_eq!(dataset.size(), (8, 6));
        assert_eq!(dataset.geo_transform(), GeoTransform::new(1000.0, 2000.0, 10.0, -10.0));
        assert_eq!(dataset.crs().and_then(|c| c.epsg()), Some(3857));

        // window crosses three strips
        let window = PixelWindow::new(2, 1, 3, 4);
        for band in 1..=5 {
            let raster: Raster<f64> = dataset.read_window(band, &window).unwrap();
            let offset = (band - 1) as f64 * 100.0;
            for r in 0..4 {
                for c in 0..3 {
                    let index = (r + 1) * 8 + c + 2;
                    assert_eq!(raster.get(r, c).unwrap(), offset + index as f64 * 0.5);
                }
            }
        }
    }

    #[test]
    fn test_interleaved_and_paged_files_read_alike() {
        let dir = tempfile::tempdir().unwrap();
        let interleaved = dir.path().join("interleaved.tif");
        let paged = dir.path().join("paged.tif");
        write_interleaved(&interleaved, 6, 8, 4);
        write_geotiff_bands(&change_bands(6, 8, 10.0), &paged, None).unwrap();

        let a = RasterDataset::open(&interleaved).unwrap();
        let b = RasterDataset::open(&paged).unwrap();
        for band in 1..=5 {
            let x: Raster<f32> = a.read_band(band).unwrap();
            let y: Raster<f32> = b.read_band(band).unwrap();
            assert_eq!(x.data(), y.data());
        }
    }

    #[test]
    fn test_missing_georeference_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
            encoder
                .write_image::<colortype::Gray8>(30, 30, &vec![0u8; 900])
                .unwrap();
        }

        assert!(matches!(
            RasterDataset::open(&path),
            Err(Error::MissingGeoreference(_))
        ));
    }

    #[test]
    fn test_write_leaves_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BIN_tile.tif");
        write_geotiff(&label_raster(), &path, None).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("BIN_tile.tif")]);
    }

    #[test]
    fn test_failed_write_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BIN_tile.tif");
        let mismatched = vec![Raster::<u8>::new(2, 2), Raster::<u8>::new(3, 2)];

        assert!(write_geotiff_bands(&mismatched, &path, None).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_warp_copies_raster_on_grid() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        let dst = dir.path().join("dst.tif");
        write_geotiff_bands(&change_bands(4, 4, 10.0), &src, None).unwrap();

        warp_to_grid(&src, &dst, &WorkingGrid::default()).unwrap();
        assert_eq!(std::fs::read(&src).unwrap(), std::fs::read(&dst).unwrap());
    }

    #[test]
    fn test_warp_resamples_to_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        let dst = dir.path().join("dst.tif");
        write_geotiff_bands(&change_bands(3, 4, 20.0), &src, None).unwrap();

        warp_to_grid(&src, &dst, &WorkingGrid::default()).unwrap();
        let warped = RasterDataset::open(&dst).unwrap();
        assert_eq!(warped.size(), (8, 6));
        assert_eq!(warped.band_count(), 5);
        assert_eq!(warped.geo_transform(), GeoTransform::new(1000.0, 2000.0, 10.0, -10.0));

        let blue: Raster<f64> = warped.read_band(1).unwrap();
        // each source cell covers a 2x2 block
        assert_eq!(blue.get(0, 0).unwrap(), 0.0);
        assert_eq!(blue.get(1, 1).unwrap(), 0.0);
        assert_eq!(blue.get(0, 2).unwrap(), 0.5);
        assert_eq!(blue.get(2, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_warp_refuses_crs_change() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.tif");
        let mut bands = change_bands(2, 2, 10.0);
        for band in &mut bands {
            band.set_crs(Some(CRS::from_epsg(32639)));
        }
        write_geotiff_bands(&bands, &src, None).unwrap();

        let result = warp_to_grid(&src, dir.path().join("dst.tif"), &WorkingGrid::default());
        assert!(matches!(result, Err(Error::CrsMismatch(_, _))));
    }
}
