//! Picks the territorial zone of a parcel.
//!
//! The zone containing the parcel centroid wins; failing that, the zone with the largest
//! positive overlap. Candidates are scanned in input order and the first one wins ties.

use crate::core::geometry::{self, Shape};
use crate::domain::model::{ZoneRecord, ZoneResolution};
use geo::{Area, BooleanOps, Centroid, Contains};

/// A zone with a successfully built shape.
#[derive(Debug, Clone)]
pub struct ZoneCandidate {
    pub name: String,
    pub code: Option<String>,
    pub shape: Shape,
}

impl ZoneCandidate {
    /// `None` when none of the zone's polygons builds.
    pub fn from_record(record: &ZoneRecord) -> Option<Self> {
        match geometry::union_ring_sets(&record.ring_sets()) {
            Some(shape) => Some(Self {
                name: record.name.clone(),
                code: record.code.clone(),
                shape,
            }),
            None => {
                tracing::warn!("Zone '{}' has no valid geometry, skipping", record.name);
                None
            }
        }
    }
}

pub fn candidates_from_records(records: &[ZoneRecord]) -> Vec<ZoneCandidate> {
    records.iter().filter_map(ZoneCandidate::from_record).collect()
}

pub fn resolve_zone(parcel: &Shape, candidates: &[ZoneCandidate]) -> ZoneResolution {
    if let Some(centroid) = parcel.centroid() {
        // `contains` is false on the boundary, so such zones fall through to overlap
        if let Some(zone) = candidates.iter().find(|zone| zone.shape.contains(&centroid)) {
            tracing::debug!("Parcel centroid lies in zone '{}'", zone.name);
            return ZoneResolution::Centroid {
                name: zone.name.clone(),
                code: zone.code.clone(),
            };
        }
    }

    let mut best: Option<(&ZoneCandidate, f64)> = None;
    for zone in candidates {
        let area = parcel.intersection(&zone.shape).unsigned_area();
        if area <= 0.0 {
            continue;
        }
        if best.map_or(true, |(_, best_area)| area > best_area) {
            best = Some((zone, area));
        }
    }

    match best {
        Some((zone, area)) => {
            tracing::debug!("Zone '{}' chosen by overlap area {:.2}", zone.name, area);
            ZoneResolution::Overlap {
                name: zone.name.clone(),
                code: zone.code.clone(),
                area,
            }
        }
        None => ZoneResolution::Undetermined,
    }
}

/// Builds candidate shapes from zone records and resolves against them.
pub fn resolve_from_records(parcel: &Shape, records: &[ZoneRecord]) -> ZoneResolution {
    resolve_zone(parcel, &candidates_from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Contour;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Contour {
        Contour::from_xy(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    fn zone(name: &str, contour: Contour) -> ZoneRecord {
        ZoneRecord {
            name: name.to_string(),
            code: Some(format!("{}-1", name)),
            contours: vec![contour],
            holes: Vec::new(),
        }
    }

    fn parcel() -> Shape {
        geometry::build(&rect(0.0, 0.0, 10.0, 20.0)).unwrap()
    }

    #[test]
    fn test_centroid_zone_wins() {
        let zones = [zone("A", rect(0.0, 0.0, 8.0, 20.0)), zone("B", rect(8.0, 0.0, 20.0, 20.0))];
        let resolution = resolve_from_records(&parcel(), &zones);
        assert_eq!(
            resolution,
            ZoneResolution::Centroid {
                name: "A".to_string(),
                code: Some("A-1".to_string())
            }
        );
    }

    #[test]
    fn test_centroid_in_second_zone() {
        let zones = [zone("A", rect(0.0, 0.0, 4.0, 20.0)), zone("B", rect(4.0, 0.0, 20.0, 20.0))];
        assert_eq!(resolve_from_records(&parcel(), &zones).name(), Some("B"));
    }

    #[test]
    fn test_no_overlap_is_undetermined() {
        let zones = [zone("A", rect(100.0, 100.0, 110.0, 110.0))];
        assert_eq!(resolve_from_records(&parcel(), &zones), ZoneResolution::Undetermined);
        assert_eq!(resolve_from_records(&parcel(), &[]), ZoneResolution::Undetermined);
    }

    #[test]
    fn test_largest_overlap_when_centroid_outside() {
        // centroid (5, 10) lies in neither zone
        let zones = [zone("A", rect(-5.0, 0.0, 2.0, 20.0)), zone("B", rect(7.0, 0.0, 15.0, 20.0))];
        match resolve_from_records(&parcel(), &zones) {
            ZoneResolution::Overlap { name, area, .. } => {
                assert_eq!(name, "B");
                assert!((area - 60.0).abs() < 1e-9);
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_overlap_tie_goes_to_first() {
        let zones = [zone("A", rect(-5.0, 0.0, 2.0, 20.0)), zone("B", rect(8.0, 0.0, 15.0, 20.0))];
        assert_eq!(resolve_from_records(&parcel(), &zones).name(), Some("A"));
    }

    #[test]
    fn test_centroid_on_boundary_falls_through_to_overlap() {
        // both zones touch the centroid at x = 5; B covers more of the parcel
        let zones = [zone("A", rect(0.0, 0.0, 5.0, 5.0)), zone("B", rect(5.0, 0.0, 10.0, 20.0))];
        match resolve_from_records(&parcel(), &zones) {
            ZoneResolution::Overlap { name, .. } => assert_eq!(name, "B"),
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_zones_pick_larger_parcel_overlap() {
        // A and B overlap each other at x 2..3; centroid (5, 10) is in neither
        let zones = [zone("A", rect(-5.0, 0.0, 3.0, 20.0)), zone("B", rect(2.0, 0.0, 12.0, 8.0))];
        match resolve_from_records(&parcel(), &zones) {
            ZoneResolution::Overlap { name, area, .. } => {
                assert_eq!(name, "B");
                assert!((area - 64.0).abs() < 1e-9);
            }
            other => panic!("unexpected resolution: {:?}", other),
        }
    }

    #[test]
    fn test_zone_hole_excludes_parcel() {
        let ring = ZoneRecord {
            name: "Ring".to_string(),
            code: None,
            contours: vec![rect(-95.0, -90.0, 105.0, 110.0)],
            holes: vec![vec![rect(-5.0, -5.0, 15.0, 25.0)]],
        };
        let inner = zone("Inner", rect(-5.0, -5.0, 15.0, 25.0));
        assert_eq!(resolve_from_records(&parcel(), &[ring.clone(), inner]).name(), Some("Inner"));
        assert_eq!(resolve_from_records(&parcel(), &[ring]), ZoneResolution::Undetermined);
    }

    #[test]
    fn test_zone_hole_applies_to_its_own_polygon() {
        // second polygon is an island inside the first one's hole
        let zone = ZoneRecord {
            name: "Islands".to_string(),
            code: None,
            contours: vec![rect(-95.0, -90.0, 105.0, 110.0), rect(-2.0, -2.0, 12.0, 22.0)],
            holes: vec![vec![rect(-5.0, -5.0, 15.0, 25.0)]],
        };
        assert_eq!(resolve_from_records(&parcel(), &[zone]).name(), Some("Islands"));
    }

    #[test]
    fn test_unbuildable_zone_is_skipped() {
        let zones = [
            zone("broken", Contour::from_xy(&[(0.0, 0.0), (1.0, 1.0)])),
            zone("A", rect(0.0, 0.0, 10.0, 20.0)),
        ];
        assert_eq!(candidates_from_records(&zones).len(), 1);
        assert_eq!(resolve_from_records(&parcel(), &zones).name(), Some("A"));
    }
}
