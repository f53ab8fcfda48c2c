//! KPT (cadastral block plan) zone map reader.

use crate::core::container::resolve_document;
use crate::core::fields::{Field, FieldPath, FieldTable};
use crate::core::ordinates::{close_ring, contours_under, dedupe_adjacent};
use crate::domain::model::{Contour, ZoneRecord};
use crate::utils::error::Result;
use roxmltree::{Document, Node};
use serde::Serialize;

const PRIMARY_RECORDS: &str = "//zones_and_territories_records/zones_and_territories_record";
const LEGACY_RECORDS: &str = "//territorial_zones/territorial_zone";

const CONTOUR_CONTAINERS: &[&str] = &[
    "./b_object_zones_and_territories/b_boundaries/b_contours_location",
    "./b_contours_location",
    "./contours_location",
    "./entity_spatial",
];

const TERRITORIAL_ZONE: &str = "территориальная зона";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordShape {
    Primary,
    Legacy,
}

/// Counters for records dropped while reading one zone map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZoneMapStats {
    pub records_seen: usize,
    pub not_territorial: usize,
    pub unnamed: usize,
    pub without_geometry: usize,
    pub contours_dropped: usize,
}

impl ZoneMapStats {
    /// Adds the counters of a pass whose records were not kept.
    pub fn absorb(&mut self, other: &ZoneMapStats) {
        self.records_seen += other.records_seen;
        self.not_territorial += other.not_territorial;
        self.unnamed += other.unnamed;
        self.without_geometry += other.without_geometry;
        self.contours_dropped += other.contours_dropped;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneMap {
    pub zones: Vec<ZoneRecord>,
    pub stats: ZoneMapStats,
}

#[derive(Debug, Clone)]
pub struct ZoneMapExtractor {
    fields: FieldTable,
}

impl ZoneMapExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fields: FieldTable::zone_record()?,
        })
    }

    pub fn with_fields(fields: FieldTable) -> Self {
        Self { fields }
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<ZoneMap> {
        let xml = resolve_document(bytes)?;
        let doc = Document::parse(&xml)?;
        self.parse_document(&doc)
    }

    pub fn parse_document(&self, doc: &Document) -> Result<ZoneMap> {
        let primary = self.read_records(doc.root(), PRIMARY_RECORDS, RecordShape::Primary)?;
        if !primary.zones.is_empty() {
            log_stats("zones_and_territories_records", &primary);
            return Ok(primary);
        }

        let mut legacy = self.read_records(doc.root(), LEGACY_RECORDS, RecordShape::Legacy)?;
        legacy.stats.absorb(&primary.stats);
        log_stats("territorial_zones", &legacy);
        Ok(legacy)
    }

    fn read_records(&self, root: Node, records: &str, shape: RecordShape) -> Result<ZoneMap> {
        let mut stats = ZoneMapStats::default();
        let mut zones = Vec::new();

        for record in FieldPath::parse(records)?.select(root) {
            stats.records_seen += 1;

            if !self.is_territorial(record, shape) {
                stats.not_territorial += 1;
                continue;
            }

            let Some(name) = self.resolve_name(record) else {
                stats.unnamed += 1;
                continue;
            };

            let (contours, dropped) = record_contours(record)?;
            stats.contours_dropped += dropped;
            if contours.is_empty() {
                tracing::warn!("Zone '{}' has no usable contours, skipping", name);
                stats.without_geometry += 1;
                continue;
            }

            zones.push(ZoneRecord {
                name,
                code: self.resolve_code(record),
                contours,
                holes: Vec::new(),
            });
        }

        Ok(ZoneMap { zones, stats })
    }

    fn is_territorial(&self, record: Node, shape: RecordShape) -> bool {
        match self.fields.lookup(record, Field::BoundaryType) {
            Some(kind) => kind.to_lowercase().contains(TERRITORIAL_ZONE),
            // the legacy container only ever holds territorial zones
            None => shape == RecordShape::Legacy,
        }
    }

    /// Document name, then description, then "type index", then either part alone.
    fn resolve_name(&self, record: Node) -> Option<String> {
        let lookup = |field| self.fields.lookup(record, field);

        lookup(Field::ZoneName)
            .or_else(|| lookup(Field::ZoneDescription))
            .or_else(|| match (lookup(Field::ZoneTypeValue), lookup(Field::ZoneIndex)) {
                (Some(kind), Some(index)) => Some(format!("{} {}", kind, index)),
                (Some(kind), None) => Some(kind),
                (None, Some(index)) => Some(index),
                (None, None) => None,
            })
    }

    fn resolve_code(&self, record: Node) -> Option<String> {
        self.fields
            .lookup(record, Field::ZoneIndex)
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty())
    }
}

/// Usable closed rings of one record and the number of rings thrown away.
fn record_contours(record: Node) -> Result<(Vec<Contour>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0;

    for expr in CONTOUR_CONTAINERS {
        for container in FieldPath::parse(expr)?.select(record) {
            for contour in contours_under(container) {
                let cleaned = dedupe_adjacent(&contour);
                if cleaned.distinct_points() >= 3 {
                    kept.push(close_ring(cleaned));
                } else {
                    dropped += 1;
                }
            }
        }
        if !kept.is_empty() {
            break;
        }
    }

    Ok((kept, dropped))
}

fn log_stats(shape: &str, map: &ZoneMap) {
    tracing::info!(
        "Zone map ({}): {} zones accepted of {} records; skipped non-territorial={}, unnamed={}, without geometry={}",
        shape,
        map.zones.len(),
        map.stats.records_seen,
        map.stats.not_territorial,
        map.stats.unnamed,
        map.stats.without_geometry
    );
}

pub fn parse_zone_map(bytes: &[u8]) -> Result<Vec<ZoneRecord>> {
    Ok(ZoneMapExtractor::new()?.parse(bytes)?.zones)
}
