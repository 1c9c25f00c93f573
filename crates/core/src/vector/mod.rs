//! Vector geometry used to reason about raster footprints

use geo::{Area, BooleanOps, BoundingRect, Coord, LineString, MultiPolygon, Polygon};

/// Closed planar polygon describing a raster footprint.
///
/// Built from axis-aligned bounds, so the exterior ring is always a
/// rectangle `(xmin,ymin) (xmax,ymin) (xmax,ymax) (xmin,ymax) (xmin,ymin)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingPolygon {
    polygon: Polygon<f64>,
}

impl BoundingPolygon {
    pub fn from_bounds(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        let ring = LineString::from(vec![
            Coord { x: xmin, y: ymin },
            Coord { x: xmax, y: ymin },
            Coord { x: xmax, y: ymax },
            Coord { x: xmin, y: ymax },
            Coord { x: xmin, y: ymin },
        ]);
        Self {
            polygon: Polygon::new(ring, vec![]),
        }
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// Envelope as `(xmin, xmax, ymin, ymax)`
    pub fn envelope(&self) -> Option<(f64, f64, f64, f64)> {
        self.polygon
            .bounding_rect()
            .map(|r| (r.min().x, r.max().x, r.min().y, r.max().y))
    }

    /// Geometric intersection with another footprint.
    ///
    /// The envelope is taken from the overlap of both rectangles rather than
    /// from the clipped polygon, so grid-aligned edges stay exact.
    pub fn intersection(&self, other: &BoundingPolygon) -> Intersection {
        let bounds = match (self.envelope(), other.envelope()) {
            (Some(a), Some(b)) => {
                let xmin = a.0.max(b.0);
                let xmax = a.1.min(b.1);
                let ymin = a.2.max(b.2);
                let ymax = a.3.min(b.3);
                (xmin < xmax && ymin < ymax).then_some((xmin, xmax, ymin, ymax))
            }
            _ => None,
        };
        Intersection {
            shape: self.polygon.intersection(&other.polygon),
            bounds,
        }
    }
}

/// Result of intersecting two footprints; may be empty.
#[derive(Debug, Clone)]
pub struct Intersection {
    shape: MultiPolygon<f64>,
    bounds: Option<(f64, f64, f64, f64)>,
}

impl Intersection {
    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    /// Whether the intersection has a positive area
    pub fn is_overlap(&self) -> bool {
        self.bounds.is_some() && self.area() > 0.0
    }

    /// Envelope as `(xmin, xmax, ymin, ymax)`, `None` for an empty intersection
    pub fn envelope(&self) -> Option<(f64, f64, f64, f64)> {
        self.bounds
    }
}
