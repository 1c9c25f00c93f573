//! Strip and tile decoding for the native GeoTIFF reader.
//!
//! Chunks are fetched, decompressed and un-predicted one at a time, so a
//! window read only touches the strips or tiles it intersects. Supports
//! DEFLATE (via `flate2`), LZW (via `weezl`) and uncompressed data, any
//! number of samples per pixel, chunky or planar.

use crate::error::{Error, Result};
use crate::raster::{PixelWindow, RasterElement};
use std::io::{Read, Seek, SeekFrom};
use tiff::decoder::Decoder;
use tiff::tags::Tag;

/// TIFF compression codes.
pub mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

/// TIFF predictor codes.
pub mod predictor {
    pub const NONE: u16 = 1;
    pub const HORIZONTAL: u16 = 2;
    pub const FLOATING_POINT: u16 = 3;
}

/// TIFF sample format codes.
pub mod sample_format {
    pub const UNSIGNED_INT: u16 = 1;
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

/// On-disk type of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

macro_rules! decode_as {
    ($target:ty, $sample:ty, $bytes:expr, $little:expr) => {{
        let mut raw = [0u8; std::mem::size_of::<$sample>()];
        raw.copy_from_slice(&$bytes[..std::mem::size_of::<$sample>()]);
        let value = if $little {
            <$sample>::from_le_bytes(raw)
        } else {
            <$sample>::from_be_bytes(raw)
        };
        <$target>::cast_from(value)
    }};
}

impl SampleType {
    pub(crate) fn from_tags(bits: u16, format: u16) -> Result<Self> {
        use sample_format::*;
        match (bits, format) {
            (8, UNSIGNED_INT) => Ok(SampleType::U8),
            (16, UNSIGNED_INT) => Ok(SampleType::U16),
            (32, UNSIGNED_INT) => Ok(SampleType::U32),
            (64, UNSIGNED_INT) => Ok(SampleType::U64),
            (8, SIGNED_INT) => Ok(SampleType::I8),
            (16, SIGNED_INT) => Ok(SampleType::I16),
            (32, SIGNED_INT) => Ok(SampleType::I32),
            (64, SIGNED_INT) => Ok(SampleType::I64),
            (32, FLOAT) => Ok(SampleType::F32),
            (64, FLOAT) => Ok(SampleType::F64),
            _ => Err(Error::UnsupportedDataType(format!(
                "{}-bit samples with sample format {}",
                bits, format
            ))),
        }
    }

    /// Bytes per sample
    pub(crate) fn size(self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::U64 | SampleType::I64 | SampleType::F64 => 8,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    /// Decode the sample at the start of `bytes`
    pub(crate) fn read<T: RasterElement>(self, bytes: &[u8], little_endian: bool) -> T {
        match self {
            SampleType::U8 => T::cast_from(bytes[0]),
            SampleType::I8 => T::cast_from(bytes[0] as i8),
            SampleType::U16 => decode_as!(T, u16, bytes, little_endian),
            SampleType::U32 => decode_as!(T, u32, bytes, little_endian),
            SampleType::U64 => decode_as!(T, u64, bytes, little_endian),
            SampleType::I16 => decode_as!(T, i16, bytes, little_endian),
            SampleType::I32 => decode_as!(T, i32, bytes, little_endian),
            SampleType::I64 => decode_as!(T, i64, bytes, little_endian),
            SampleType::F32 => decode_as!(T, f32, bytes, little_endian),
            SampleType::F64 => decode_as!(T, f64, bytes, little_endian),
        }
    }
}

/// Chunk layout of one TIFF page
#[derive(Debug, Clone)]
pub(crate) struct PageLayout {
    cols: usize,
    rows: usize,
    sample_type: SampleType,
    samples: usize,
    planar: bool,
    compression: u16,
    predictor: u16,
    tiled: bool,
    chunk_cols: usize,
    chunk_rows: usize,
    chunks_across: usize,
    chunks_down: usize,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl PageLayout {
    /// Read the layout of the decoder's current page
    pub(crate) fn read<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Self> {
        let (width, height) = decoder.dimensions()?;
        let (cols, rows) = (width as usize, height as usize);

        let samples = decoder
            .find_tag_unsigned::<u16>(Tag::SamplesPerPixel)?
            .unwrap_or(1) as usize;
        let bits = decoder
            .find_tag_unsigned_vec::<u16>(Tag::BitsPerSample)?
            .unwrap_or_else(|| vec![1]);
        if bits.iter().any(|&b| b != bits[0]) {
            return Err(Error::UnsupportedDataType(format!(
                "mixed bits per sample {:?}",
                bits
            )));
        }
        let format = decoder
            .find_tag_unsigned_vec::<u16>(Tag::SampleFormat)?
            .and_then(|f| f.first().copied())
            .unwrap_or(sample_format::UNSIGNED_INT);
        let sample_type = SampleType::from_tags(bits[0], format)?;

        let compression = decoder
            .find_tag_unsigned::<u16>(Tag::Compression)?
            .unwrap_or(compression::NONE);
        let predictor = decoder
            .find_tag_unsigned::<u16>(Tag::Predictor)?
            .unwrap_or(predictor::NONE);
        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)?
            .unwrap_or(1)
            == 2;

        let tiled = decoder.find_tag(Tag::TileWidth)?.is_some();
        let (chunk_cols, chunk_rows, offsets_tag, counts_tag) = if tiled {
            (
                decoder.get_tag_unsigned::<usize>(Tag::TileWidth)?,
                decoder.get_tag_unsigned::<usize>(Tag::TileLength)?,
                Tag::TileOffsets,
                Tag::TileByteCounts,
            )
        } else {
            let rows_per_strip = decoder
                .find_tag_unsigned::<usize>(Tag::RowsPerStrip)?
                .unwrap_or(rows)
                .clamp(1, rows.max(1));
            (cols, rows_per_strip, Tag::StripOffsets, Tag::StripByteCounts)
        };
        let offsets = decoder.get_tag_u64_vec(offsets_tag)?;
        let byte_counts = decoder.get_tag_u64_vec(counts_tag)?;

        if chunk_cols == 0 || chunk_rows == 0 {
            return Err(Error::Tiff(format!(
                "invalid chunk size {}x{}",
                chunk_cols, chunk_rows
            )));
        }
        let chunks_across = cols.div_ceil(chunk_cols);
        let chunks_down = rows.div_ceil(chunk_rows);
        let planes = if planar { samples } else { 1 };
        let expected = chunks_across * chunks_down * planes;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(Error::Tiff(format!(
                "page lists {} chunks, layout needs {}",
                offsets.len().min(byte_counts.len()),
                expected
            )));
        }

        Ok(Self {
            cols,
            rows,
            sample_type,
            samples,
            planar,
            compression,
            predictor,
            tiled,
            chunk_cols,
            chunk_rows,
            chunks_across,
            chunks_down,
            offsets,
            byte_counts,
        })
    }

    pub(crate) fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Samples per pixel; each one is a band
    pub(crate) fn samples(&self) -> usize {
        self.samples
    }

    /// Decode `sample` over `window`, touching only the chunks it intersects.
    ///
    /// The window must lie inside the page.
    pub(crate) fn read_window<T, R>(
        &self,
        reader: &mut R,
        sample: usize,
        window: &PixelWindow,
        little_endian: bool,
    ) -> Result<Vec<T>>
    where
        T: RasterElement,
        R: Read + Seek,
    {
        let mut out = vec![T::zero(); window.cols * window.rows];
        if out.is_empty() {
            return Ok(out);
        }

        let c0 = window.col_off as usize;
        let r0 = window.row_off as usize;
        let (plane, stride, lane) = if self.planar {
            (sample, 1, 0)
        } else {
            (0, self.samples, sample)
        };
        let size = self.sample_type.size();
        let row_bytes = self.chunk_cols * stride * size;
        let per_plane = self.chunks_across * self.chunks_down;

        for cy in r0 / self.chunk_rows..=(r0 + window.rows - 1) / self.chunk_rows {
            let chunk_top = cy * self.chunk_rows;
            let data_rows = self.chunk_data_rows(cy);
            let top = chunk_top.max(r0);
            let bottom = (chunk_top + data_rows).min(r0 + window.rows);

            for cx in c0 / self.chunk_cols..=(c0 + window.cols - 1) / self.chunk_cols {
                let chunk_left = cx * self.chunk_cols;
                let index = plane * per_plane + cy * self.chunks_across + cx;
                let bytes = self.read_chunk(reader, index, data_rows, stride, little_endian)?;

                let left = chunk_left.max(c0);
                let right = (chunk_left + self.chunk_cols).min(c0 + window.cols);
                for row in top..bottom {
                    let line = &bytes[(row - chunk_top) * row_bytes..];
                    let dst = (row - r0) * window.cols;
                    for col in left..right {
                        let at = ((col - chunk_left) * stride + lane) * size;
                        out[dst + col - c0] = self.sample_type.read(&line[at..], little_endian);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Rows stored in chunk row `cy`; the last strip may be short, tiles are padded
    fn chunk_data_rows(&self, cy: usize) -> usize {
        if self.tiled {
            self.chunk_rows
        } else {
            self.chunk_rows.min(self.rows - cy * self.chunk_rows)
        }
    }

    fn read_chunk<R: Read + Seek>(
        &self,
        reader: &mut R,
        index: usize,
        data_rows: usize,
        stride: usize,
        little_endian: bool,
    ) -> Result<Vec<u8>> {
        let expected = self.chunk_cols * data_rows * stride * self.sample_type.size();
        let (offset, count) = match (self.offsets.get(index), self.byte_counts.get(index)) {
            (Some(&offset), Some(&count)) => (offset, count),
            _ => return Err(Error::Tiff(format!("chunk {} is not listed", index))),
        };
        // Sparse chunk
        if count == 0 {
            return Ok(vec![0; expected]);
        }

        reader.seek(SeekFrom::Start(offset))?;
        let mut raw = vec![0u8; count as usize];
        reader.read_exact(&mut raw)?;

        let mut bytes = decompress_chunk(&raw, self.compression, expected)?;
        if bytes.len() < expected {
            return Err(Error::Tiff(format!(
                "chunk {} decoded to {} bytes, expected {}",
                index,
                bytes.len(),
                expected
            )));
        }
        bytes.truncate(expected);
        undo_predictor(
            &mut bytes,
            self.predictor,
            self.sample_type,
            self.chunk_cols * stride,
            stride,
            little_endian,
        )?;
        Ok(bytes)
    }
}

/// Decompress raw chunk bytes according to the compression method.
pub fn decompress_chunk(data: &[u8], compression_code: u16, expected_size: usize) -> Result<Vec<u8>> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),

        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            // TIFF DEFLATE chunks are zlib streams; some writers omit the header
            let mut out = Vec::with_capacity(expected_size);
            match flate2::read::ZlibDecoder::new(data).read_to_end(&mut out) {
                Ok(_) => Ok(out),
                Err(_) => {
                    out.clear();
                    flate2::read::DeflateDecoder::new(data)
                        .read_to_end(&mut out)
                        .map_err(|e| Error::Tiff(format!("DEFLATE: {}", e)))?;
                    Ok(out)
                }
            }
        }

        compression::LZW => weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .decode(data)
            .map_err(|e| Error::Tiff(format!("LZW: {}", e))),

        other => Err(Error::UnsupportedDataType(format!(
            "TIFF compression {}",
            other
        ))),
    }
}

/// Reverse the TIFF predictor in place.
///
/// `row_samples` is the number of samples in one chunk row and `stride` the
/// number of interleaved samples per pixel.
pub(crate) fn undo_predictor(
    bytes: &mut [u8],
    predictor_code: u16,
    sample_type: SampleType,
    row_samples: usize,
    stride: usize,
    little_endian: bool,
) -> Result<()> {
    let size = sample_type.size();
    let row_bytes = row_samples * size;
    if row_bytes == 0 {
        return Ok(());
    }

    match predictor_code {
        predictor::NONE => Ok(()),

        predictor::HORIZONTAL if !sample_type.is_float() => {
            for row in bytes.chunks_exact_mut(row_bytes) {
                for i in stride..row_samples {
                    let prev = load_uint(&row[(i - stride) * size..(i - stride + 1) * size], little_endian);
                    let cell = &mut row[i * size..(i + 1) * size];
                    let value = load_uint(cell, little_endian).wrapping_add(prev);
                    store_uint(value, cell, little_endian);
                }
            }
            Ok(())
        }

        predictor::FLOATING_POINT if sample_type.is_float() => {
            let mut value = vec![0u8; size];
            for row in bytes.chunks_exact_mut(row_bytes) {
                for i in stride..row_bytes {
                    row[i] = row[i].wrapping_add(row[i - stride]);
                }
                // Bytes are stored as planes, most significant first
                let planes = row.to_vec();
                for i in 0..row_samples {
                    for (b, byte) in value.iter_mut().enumerate() {
                        *byte = planes[b * row_samples + i];
                    }
                    if little_endian {
                        value.reverse();
                    }
                    row[i * size..(i + 1) * size].copy_from_slice(&value);
                }
            }
            Ok(())
        }

        other => Err(Error::UnsupportedDataType(format!(
            "TIFF predictor {} for {:?} samples",
            other, sample_type
        ))),
    }
}

fn load_uint(bytes: &[u8], little_endian: bool) -> u64 {
    let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
    if little_endian {
        bytes.iter().rev().fold(0, fold)
    } else {
        bytes.iter().fold(0, fold)
    }
}

fn store_uint(value: u64, bytes: &mut [u8], little_endian: bool) {
    let n = bytes.len();
    for (k, byte) in bytes.iter_mut().enumerate() {
        let shift = if little_endian { k } else { n - 1 - k };
        *byte = (value >> (8 * shift)) as u8;
    }
}
