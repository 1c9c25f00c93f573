//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Storage kind of a cell value in a GeoTIFF page.
///
/// The native writer picks the TIFF colour type from this; the GDAL writer
/// relies on `GdalType` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

/// Trait for types that can be stored in a raster cell.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// How this type is laid out on disk
    const KIND: SampleKind;

    /// Value used to fill cells that cannot be represented after a cast
    fn fill_value() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Cast from any numeric sample, falling back to [`RasterElement::fill_value`]
    fn cast_from<S: NumCast>(sample: S) -> Self {
        num_traits::cast(sample).unwrap_or_else(Self::fill_value)
    }

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $kind:ident) => {
        impl RasterElement for $t {
            const KIND: SampleKind = SampleKind::$kind;

            fn fill_value() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $kind:ident) => {
        impl RasterElement for $t {
            const KIND: SampleKind = SampleKind::$kind;

            fn fill_value() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                nodata.is_some_and(|nd| (self - nd).abs() < <$t>::EPSILON * 100.0)
            }
        }
    };
}

impl_raster_element_int!(u8, U8);
impl_raster_element_int!(u16, U16);
impl_raster_element_int!(u32, U32);
impl_raster_element_int!(i8, I8);
impl_raster_element_int!(i16, I16);
impl_raster_element_int!(i32, I32);
impl_raster_element_float!(f32, F32);
impl_raster_element_float!(f64, F64);
