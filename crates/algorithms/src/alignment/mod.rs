//! Spatial alignment of two rasters on different grids
//!
//! The rasters are matched through the geographic intersection of their
//! footprints, not through pixel indices, so the reference (land cover) and
//! the target (warped CHMAP) may have any extent and origin. Each raster gets
//! its own pixel window over the intersection envelope.

use dectree_core::raster::{GeoTransform, PixelWindow, RasterGeometry};
use dectree_core::Result;
use tracing::debug;

/// Geographic envelope of an intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// Shared region of a reference and a target raster
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    envelope: Envelope,
    reference_window: PixelWindow,
    target_window: PixelWindow,
    transform: GeoTransform,
}

impl Alignment {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Window of the reference raster over the envelope
    pub fn reference_window(&self) -> &PixelWindow {
        &self.reference_window
    }

    /// Window of the target raster over the envelope
    pub fn target_window(&self) -> &PixelWindow {
        &self.target_window
    }

    /// Target pixel size with the origin moved to the envelope's upper-left
    /// corner; outputs over the shared region use this transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Window of another raster over the same envelope
    pub fn window_for(&self, geometry: &RasterGeometry) -> Option<PixelWindow> {
        let e = &self.envelope;
        geometry.window_for(e.xmin, e.xmax, e.ymin, e.ymax)
    }
}

/// Align `target` on `reference`.
///
/// Returns `Ok(None)` when the footprints do not overlap with positive area,
/// or when the overlap is thinner than one pixel of either raster. A window
/// reaching outside its raster is an error.
pub fn align(reference: &RasterGeometry, target: &RasterGeometry) -> Result<Option<Alignment>> {
    let intersection = reference
        .bounding_polygon()
        .intersection(&target.bounding_polygon());

    if !intersection.is_overlap() {
        debug!("footprints do not overlap");
        return Ok(None);
    }
    let Some((xmin, xmax, ymin, ymax)) = intersection.envelope() else {
        return Ok(None);
    };

    let Some(reference_window) = reference.window_for(xmin, xmax, ymin, ymax) else {
        debug!("overlap is narrower than one reference pixel");
        return Ok(None);
    };
    let Some(target_window) = target.window_for(xmin, xmax, ymin, ymax) else {
        debug!("overlap is narrower than one target pixel");
        return Ok(None);
    };
    reference_window.check_within(reference.cols(), reference.rows())?;
    target_window.check_within(target.cols(), target.rows())?;

    Ok(Some(Alignment {
        envelope: Envelope {
            xmin,
            xmax,
            ymin,
            ymax,
        },
        reference_window,
        target_window,
        transform: target.transform().with_origin(xmin, ymax),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry(origin_x: f64, origin_y: f64, res: f64, cols: usize, rows: usize) -> RasterGeometry {
        RasterGeometry::new(GeoTransform::new(origin_x, origin_y, res, -res), cols, rows).unwrap()
    }

    #[test]
    fn test_partial_overlap_same_resolution() {
        // reference: x 0..1000, y 0..1000; target: x 500..1500, y -300..700
        let reference = geometry(0.0, 1000.0, 10.0, 100, 100);
        let target = geometry(500.0, 700.0, 10.0, 100, 100);

        let a = align(&reference, &target).unwrap().unwrap();
        assert_relative_eq!(a.envelope().xmin, 500.0);
        assert_relative_eq!(a.envelope().xmax, 1000.0);
        assert_relative_eq!(a.envelope().ymin, 0.0);
        assert_relative_eq!(a.envelope().ymax, 700.0);

        assert_eq!(*a.reference_window(), PixelWindow::new(50, 30, 50, 70));
        assert_eq!(*a.target_window(), PixelWindow::new(0, 0, 50, 70));
        assert_eq!(a.reference_window().shape(), a.target_window().shape());

        assert_relative_eq!(a.transform().origin_x, 500.0);
        assert_relative_eq!(a.transform().origin_y, 700.0);
        assert_relative_eq!(a.transform().pixel_width, 10.0);
    }

    #[test]
    fn test_target_inside_reference() {
        let reference = geometry(0.0, 1000.0, 10.0, 100, 100);
        let target = geometry(200.0, 800.0, 10.0, 30, 20);

        let a = align(&reference, &target).unwrap().unwrap();
        assert_eq!(*a.reference_window(), PixelWindow::new(20, 20, 30, 20));
        assert_eq!(*a.target_window(), PixelWindow::full(30, 20));
    }

    #[test]
    fn test_different_resolutions_get_own_windows() {
        let reference = geometry(0.0, 1000.0, 20.0, 50, 50);
        let target = geometry(0.0, 1000.0, 10.0, 100, 100);

        let a = align(&reference, &target).unwrap().unwrap();
        assert_eq!(*a.reference_window(), PixelWindow::full(50, 50));
        assert_eq!(*a.target_window(), PixelWindow::full(100, 100));
    }

    #[test]
    fn test_disjoint_footprints() {
        let reference = geometry(0.0, 1000.0, 10.0, 100, 100);
        let target = geometry(5000.0, 1000.0, 10.0, 100, 100);
        assert!(align(&reference, &target).unwrap().is_none());
    }

    #[test]
    fn test_edge_contact_is_no_overlap() {
        let reference = geometry(0.0, 1000.0, 10.0, 100, 100);
        let target = geometry(1000.0, 1000.0, 10.0, 100, 100);
        assert!(align(&reference, &target).unwrap().is_none());
    }

    #[test]
    fn test_window_for_additional_raster() {
        let reference = geometry(0.0, 1000.0, 10.0, 100, 100);
        let target = geometry(500.0, 700.0, 10.0, 100, 100);
        let mask = geometry(-1000.0, 2000.0, 10.0, 300, 300);

        let a = align(&reference, &target).unwrap().unwrap();
        assert_eq!(a.window_for(&mask), Some(PixelWindow::new(150, 130, 50, 70)));
    }
}
