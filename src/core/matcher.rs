//! Finds the restriction-like records whose geometry touches the parcel.

use crate::core::geometry::{self, Shape};
use crate::domain::model::RestrictionRecord;
use geo::Intersects;

fn record_intersects(parcel: &Shape, record: &RestrictionRecord) -> bool {
    match geometry::union_ring_sets(&record.geometry) {
        Some(shape) => parcel.intersects(&shape),
        None => {
            tracing::warn!("Record '{}' has no valid geometry, skipping", record.full_name());
            false
        }
    }
}

/// All intersecting records, cloned in input order. Duplicates in the input stay
/// duplicates in the output.
pub fn match_records(parcel: &Shape, records: &[RestrictionRecord]) -> Vec<RestrictionRecord> {
    records
        .iter()
        .filter(|record| record_intersects(parcel, record))
        .cloned()
        .collect()
}

/// First intersecting record; used where one hit settles the question.
pub fn first_match(parcel: &Shape, records: &[RestrictionRecord]) -> Option<RestrictionRecord> {
    records.iter().find(|record| record_intersects(parcel, record)).cloned()
}
