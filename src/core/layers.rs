//! Vector layer loading: GeoJSON feature collections turned into attribute rows and
//! ring sets, then into zone candidates or restriction records.

use crate::config::layers::{LayerDefinition, LayerKind};
use crate::core::ordinates::dedupe_adjacent;
use crate::domain::model::{Contour, Coordinate, Decision, RestrictionRecord, RingSet, ZoneRecord};
use crate::domain::ports::LayerStorage;
use crate::utils::error::{Result, ZoningError};
use serde::Deserialize;
use std::collections::BTreeMap;

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Collection {
    FeatureCollection { features: Vec<Feature> },
}

/// Generic key/value row of one layer feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRow {
    values: BTreeMap<String, String>,
}

impl AttributeRow {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    fn from_json(properties: serde_json::Map<String, serde_json::Value>) -> Self {
        let values = properties
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((key, text))
            })
            .collect();
        Self { values }
    }

    /// Value of the first declared variant present in the row: exact key first, then a
    /// case-insensitive match. Blank values count as absent.
    pub fn first_of<S: AsRef<str>>(&self, variants: &[S]) -> Option<String> {
        variants.iter().find_map(|variant| {
            let variant = variant.as_ref();
            let value = self.values.get(variant).or_else(|| {
                self.values
                    .iter()
                    .find(|(key, _)| key.to_lowercase() == variant.to_lowercase())
                    .map(|(_, v)| v)
            })?;
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.values
    }
}

/// One feature of a vector layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFeature {
    pub attributes: AttributeRow,
    pub geometry: Vec<RingSet>,
}

fn ring(positions: &[Position]) -> Contour {
    let points = positions
        .iter()
        .filter(|p| p.len() >= 2)
        .enumerate()
        .map(|(idx, p)| Coordinate::new(Some((idx + 1).to_string()), p[0], p[1]))
        .collect();
    dedupe_adjacent(&Contour::new(points))
}

fn ring_set(rings: &[Vec<Position>]) -> Option<RingSet> {
    let (exterior, holes) = rings.split_first()?;
    Some(RingSet {
        exterior: ring(exterior),
        holes: holes.iter().map(|h| ring(h)).collect(),
    })
}

/// Parses a GeoJSON FeatureCollection. Features without polygonal geometry are skipped.
pub fn parse_feature_collection(layer: &str, bytes: &[u8]) -> Result<Vec<LayerFeature>> {
    let collection: Collection = serde_json::from_slice(bytes).map_err(|e| ZoningError::LayerError {
        layer: layer.to_string(),
        message: format!("not a GeoJSON FeatureCollection: {}", e),
    })?;
    let Collection::FeatureCollection { features } = collection;

    let total = features.len();
    let mut skipped = 0usize;
    let mut result = Vec::with_capacity(total);

    for feature in features {
        let geometry: Vec<RingSet> = match feature.geometry {
            Some(Geometry::Polygon { coordinates }) => ring_set(&coordinates).into_iter().collect(),
            Some(Geometry::MultiPolygon { coordinates }) => {
                coordinates.iter().filter_map(|polygon| ring_set(polygon)).collect()
            }
            Some(Geometry::Unsupported) | None => Vec::new(),
        };

        if geometry.is_empty() {
            skipped += 1;
            continue;
        }

        result.push(LayerFeature {
            attributes: AttributeRow::from_json(feature.properties.unwrap_or_default()),
            geometry,
        });
    }

    if skipped > 0 {
        tracing::warn!("Layer '{}': skipped {} features without polygon geometry", layer, skipped);
    }
    tracing::info!("Layer '{}': loaded {} of {} features", layer, result.len(), total);

    Ok(result)
}

/// Reads and parses the layer file named by `definition`.
pub fn load_layer<S: LayerStorage + ?Sized>(storage: &S, definition: &LayerDefinition) -> Result<Vec<LayerFeature>> {
    if !storage.exists(&definition.path) {
        return Err(ZoningError::LayerError {
            layer: definition.name.clone(),
            message: format!("file not found: {}", definition.path),
        });
    }
    let bytes = storage.read_file(&definition.path)?;
    parse_feature_collection(&definition.name, &bytes)
}

/// Zone records from a zones layer. Polygon exteriors become the record's contours
/// and interior rings its holes.
pub fn zones_from_features(definition: &LayerDefinition, features: Vec<LayerFeature>) -> Vec<ZoneRecord> {
    features
        .into_iter()
        .map(|feature| {
            let name = definition
                .first_of(&feature.attributes, "name")
                .unwrap_or_default();
            let code = definition.first_of(&feature.attributes, "code");

            let mut contours = Vec::with_capacity(feature.geometry.len());
            let mut holes = Vec::with_capacity(feature.geometry.len());
            for rings in feature.geometry {
                contours.push(rings.exterior);
                holes.push(rings.holes);
            }
            ZoneRecord {
                name,
                code,
                contours,
                holes,
            }
        })
        .collect()
}

/// Restriction-shaped records from any non-zone layer. Fields mapped by the layer's
/// variant table become the payload; the common fields are lifted into the record.
pub fn records_from_features(definition: &LayerDefinition, features: Vec<LayerFeature>) -> Vec<RestrictionRecord> {
    features
        .into_iter()
        .map(|feature| {
            let row = &feature.attributes;
            let attributes: BTreeMap<String, String> = definition
                .fields
                .keys()
                .filter(|logical| !LayerKind::COMMON_FIELDS.contains(&logical.as_str()))
                .filter_map(|logical| definition.first_of(row, logical).map(|v| (logical.clone(), v)))
                .collect();

            RestrictionRecord {
                zone_type: definition.name.clone(),
                name: definition.first_of(row, "name"),
                registry_number: definition.first_of(row, "registry_number"),
                decision: Decision {
                    number: definition.first_of(row, "decision_number"),
                    date: definition.first_of(row, "decision_date"),
                    authority: definition.first_of(row, "decision_authority"),
                },
                attributes,
                geometry: feature.geometry,
            }
        })
        .collect()
}
