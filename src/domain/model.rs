use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One boundary point. `num` is the label exactly as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub num: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(num: Option<String>, x: f64, y: f64) -> Self {
        Self { num, x, y }
    }

    pub fn same_position(&self, other: &Coordinate) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// Ordered boundary ring. Closure is implicit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Contour {
    pub points: Vec<Coordinate>,
}

impl Contour {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    pub fn from_xy(pairs: &[(f64, f64)]) -> Self {
        let points = pairs
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Coordinate::new(Some((i + 1).to_string()), *x, *y))
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => self.points.len() > 1 && first.same_position(last),
            _ => false,
        }
    }

    /// Count of distinct positions, ignoring the closing repeat.
    pub fn distinct_points(&self) -> usize {
        let mut seen: Vec<(f64, f64)> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            if !seen.iter().any(|(x, y)| *x == p.x && *y == p.y) {
                seen.push((p.x, p.y));
            }
        }
        seen.len()
    }
}

/// Land parcel as read from an EGRN extract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub cadastral_number: Option<String>,
    pub address: Option<String>,
    pub area: Option<String>,
    pub region: Option<String>,
    pub municipality: Option<String>,
    pub settlement: Option<String>,
    pub permitted_use: Option<String>,
    pub contours: Vec<Contour>,
    pub capital_objects: Vec<String>,
    pub is_land: bool,
    pub has_coordinates: bool,
}

impl Parcel {
    /// All contour points concatenated, for consumers that expect a single point list.
    pub fn flattened_coordinates(&self) -> Vec<&Coordinate> {
        self.contours.iter().flat_map(|c| c.points.iter()).collect()
    }
}

/// Territorial zone from a KPT zone map or a zones layer. `holes[i]` are the interior
/// rings of `contours[i]`; a missing entry means no holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub name: String,
    pub code: Option<String>,
    pub contours: Vec<Contour>,
    #[serde(default)]
    pub holes: Vec<Vec<Contour>>,
}

impl ZoneRecord {
    /// Each contour paired with its interior rings.
    pub fn ring_sets(&self) -> Vec<RingSet> {
        self.contours
            .iter()
            .enumerate()
            .map(|(idx, exterior)| RingSet {
                exterior: exterior.clone(),
                holes: self.holes.get(idx).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// Decision (act) that established a restriction or planning project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub number: Option<String>,
    pub date: Option<String>,
    pub authority: Option<String>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.date.is_none() && self.authority.is_none()
    }

    /// "authority № number от date", skipping the missing parts.
    pub fn formatted(&self) -> String {
        let mut parts = Vec::new();
        if let Some(authority) = &self.authority {
            parts.push(authority.clone());
        }
        if let Some(number) = &self.number {
            parts.push(format!("№ {}", number));
        }
        if let Some(date) = &self.date {
            parts.push(format!("от {}", date));
        }
        if parts.is_empty() {
            "Реквизиты не определены".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Polygon with optional holes, as stored in a vector layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RingSet {
    pub exterior: Contour,
    pub holes: Vec<Contour>,
}

/// A geometry-bearing record from any restriction-like layer (special-use zones,
/// capital objects, planning projects). Layers differ only in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestrictionRecord {
    pub zone_type: String,
    pub name: Option<String>,
    pub registry_number: Option<String>,
    pub decision: Decision,
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    pub geometry: Vec<RingSet>,
}

impl RestrictionRecord {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn full_name(&self) -> String {
        match (&self.name, &self.registry_number) {
            (Some(name), Some(reg)) => format!("{} ({})", name, reg),
            (Some(name), None) => name.clone(),
            (None, Some(reg)) => format!("{} {}", self.zone_type, reg),
            (None, None) => format!("{} (без наименования)", self.zone_type),
        }
    }
}

/// Zone picked for a parcel and how it was picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ZoneResolution {
    Centroid { name: String, code: Option<String> },
    Overlap { name: String, code: Option<String>, area: f64 },
    Undetermined,
}

impl ZoneResolution {
    pub fn name(&self) -> Option<&str> {
        match self {
            ZoneResolution::Centroid { name, .. } | ZoneResolution::Overlap { name, .. } => Some(name),
            ZoneResolution::Undetermined => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ZoneResolution::Centroid { code, .. } | ZoneResolution::Overlap { code, .. } => {
                code.as_deref()
            }
            ZoneResolution::Undetermined => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        !matches!(self, ZoneResolution::Undetermined)
    }
}

/// Everything an analysis call produces; fully owned and ready for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub parcel: Parcel,
    pub zone: ZoneResolution,
    pub capital_objects: Vec<RestrictionRecord>,
    pub planning_project: Option<RestrictionRecord>,
    pub restrictions: Vec<RestrictionRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl AnalysisReport {
    pub fn new(parcel: Parcel) -> Self {
        Self {
            parcel,
            zone: ZoneResolution::Undetermined,
            capital_objects: Vec::new(),
            planning_project: None,
            restrictions: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn has_restrictions(&self) -> bool {
        !self.restrictions.is_empty()
    }

    pub fn in_planning_project(&self) -> bool {
        self.planning_project.is_some()
    }

    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        let dash = "—";

        lines.push(format!(
            "Parcel: {}",
            self.parcel.cadastral_number.as_deref().unwrap_or(dash)
        ));
        lines.push(format!("Address: {}", self.parcel.address.as_deref().unwrap_or(dash)));
        lines.push(format!("Area: {}", self.parcel.area.as_deref().unwrap_or(dash)));

        match &self.zone {
            ZoneResolution::Undetermined => lines.push("Zone: undetermined".to_string()),
            zone => lines.push(format!(
                "Zone: {} {}",
                zone.code().unwrap_or(""),
                zone.name().unwrap_or("")
            )),
        }

        lines.push(format!("Capital objects: {}", self.capital_objects.len()));
        match &self.planning_project {
            Some(project) => lines.push(format!(
                "Planning project: {} ({})",
                project.name.as_deref().unwrap_or(dash),
                project.decision.formatted()
            )),
            None => lines.push("Planning project: none".to_string()),
        }

        if self.has_restrictions() {
            lines.push(format!("Restrictions: {}", self.restrictions.len()));
            for restriction in &self.restrictions {
                lines.push(format!("  - [{}] {}", restriction.zone_type, restriction.full_name()));
            }
        } else {
            lines.push("Restrictions: none".to_string());
        }

        for warning in &self.warnings {
            lines.push(format!("Warning: {}", warning));
        }
        for error in &self.errors {
            lines.push(format!("Error: {}", error));
        }

        lines.join("\n")
    }
}
