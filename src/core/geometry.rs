//! Polygon builder: turns contours into validated planar shapes.

use crate::core::ordinates::dedupe_adjacent;
use crate::domain::model::{Contour, RingSet};
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon, Validation};
use thiserror::Error;

pub type Shape = MultiPolygon<f64>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryRejected {
    #[error("contour has {found} distinct points, at least 3 are required")]
    TooFewPoints { found: usize },

    #[error("polygon is invalid even after repair")]
    Invalid,

    #[error("polygon has zero area")]
    Empty,
}

fn ring_of(contour: &Contour) -> Result<LineString<f64>, GeometryRejected> {
    let cleaned = dedupe_adjacent(contour);
    let found = cleaned.distinct_points();
    if found < 3 {
        return Err(GeometryRejected::TooFewPoints { found });
    }

    let coords: Vec<Coord<f64>> = cleaned.points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Ok(LineString::new(coords))
}

fn is_usable(shape: &Shape) -> bool {
    !shape.0.is_empty() && shape.is_valid() && shape.unsigned_area() > 0.0
}

/// Single repair pass: the self-union of the shape, which splits self-intersecting
/// rings into valid parts.
fn repair(polygon: Polygon<f64>) -> Shape {
    let mut repaired = MultiPolygon::new(vec![polygon]).union(&MultiPolygon::<f64>::new(Vec::new()));
    repaired.0.retain(|p| p.unsigned_area() > 0.0);
    repaired
}

pub fn build(contour: &Contour) -> Result<Shape, GeometryRejected> {
    build_with_holes(contour, &[])
}

pub fn build_with_holes(exterior: &Contour, holes: &[Contour]) -> Result<Shape, GeometryRejected> {
    let ring = ring_of(exterior)?;

    let mut interiors = Vec::with_capacity(holes.len());
    for hole in holes {
        match ring_of(hole) {
            Ok(ring) => interiors.push(ring),
            Err(e) => tracing::warn!("Dropping degenerate hole: {}", e),
        }
    }

    let polygon = Polygon::new(ring, interiors);
    let shape = MultiPolygon::new(vec![polygon.clone()]);
    if is_usable(&shape) {
        return Ok(shape);
    }

    if polygon.unsigned_area() == 0.0 && polygon.interiors().is_empty() && polygon.is_valid() {
        return Err(GeometryRejected::Empty);
    }

    tracing::debug!("Polygon with {} vertices is invalid, repairing", polygon.exterior().0.len());
    let repaired = repair(polygon);
    if is_usable(&repaired) {
        Ok(repaired)
    } else if repaired.0.is_empty() {
        Err(GeometryRejected::Empty)
    } else {
        Err(GeometryRejected::Invalid)
    }
}

/// Combines several contours of one feature into a single shape. Contours that fail
/// to build are skipped; `None` when nothing usable is left.
pub fn union(contours: &[Contour]) -> Option<Shape> {
    let parts = contours.iter().enumerate().filter_map(|(idx, contour)| match build(contour) {
        Ok(shape) => Some(shape),
        Err(e) => {
            tracing::warn!("Contour #{} rejected: {}", idx + 1, e);
            None
        }
    });
    union_shapes(parts)
}

/// Same as [`union`] for layer geometries carrying holes.
pub fn union_ring_sets(ring_sets: &[RingSet]) -> Option<Shape> {
    let parts = ring_sets.iter().enumerate().filter_map(|(idx, rings)| {
        match build_with_holes(&rings.exterior, &rings.holes) {
            Ok(shape) => Some(shape),
            Err(e) => {
                tracing::warn!("Polygon #{} rejected: {}", idx + 1, e);
                None
            }
        }
    });
    union_shapes(parts)
}

fn union_shapes(parts: impl Iterator<Item = Shape>) -> Option<Shape> {
    parts.reduce(|acc, shape| acc.union(&shape))
}
