//! Namespace-agnostic field lookup driven by ordered candidate paths.
//!
//! Every logical field has a priority list of path expressions matched by local name.
//! A new document revision is supported by adding a candidate here, never by adding
//! a branch to an extractor.
//!
//! Path syntax:
//! - `//a/b`  any `a` below the context node, then its child `b`
//! - `./a`    child `a` of the context node (a bare `a` means the same)
//! - `a//b`   any `b` below `a`
//! - `*`      any element
//! - `@name`  attribute of the matched elements, last step only

use crate::utils::error::{Result, ZoningError};
use roxmltree::Node;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: String,
}

impl Step {
    fn matches(&self, node: &Node) -> bool {
        node.is_element() && (self.name == "*" || node.tag_name().name() == self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    source: String,
    steps: Vec<Step>,
    attribute: Option<String>,
}

impl FieldPath {
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = |reason: &str| ZoningError::InvalidConfigValueError {
            field: "field_path".to_string(),
            value: expr.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expr.trim();
        let (mut next_axis, body) = if let Some(rest) = trimmed.strip_prefix("//") {
            (Axis::Descendant, rest)
        } else if let Some(rest) = trimmed.strip_prefix("./") {
            (Axis::Child, rest)
        } else {
            (Axis::Child, trimmed)
        };

        if body.is_empty() {
            return Err(invalid("path has no steps"));
        }

        let segments: Vec<&str> = body.split('/').collect();
        let mut steps = Vec::new();
        let mut attribute = None;

        for (idx, segment) in segments.iter().enumerate() {
            let segment = segment.trim();
            if attribute.is_some() {
                return Err(invalid("attribute must be the last step"));
            }
            if segment.is_empty() {
                if next_axis == Axis::Descendant || idx + 1 == segments.len() {
                    return Err(invalid("dangling '/'"));
                }
                next_axis = Axis::Descendant;
                continue;
            }
            if let Some(attr) = segment.strip_prefix('@') {
                if attr.is_empty() {
                    return Err(invalid("empty attribute name"));
                }
                attribute = Some(attr.to_string());
                continue;
            }
            steps.push(Step {
                axis: next_axis,
                name: segment.to_string(),
            });
            next_axis = Axis::Child;
        }

        if steps.is_empty() && attribute.is_none() {
            return Err(invalid("path has no steps"));
        }

        Ok(Self {
            source: trimmed.to_string(),
            steps,
            attribute,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Elements matched by the element steps, in document order.
    pub fn select<'a, 'input>(&self, context: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let mut current = vec![context];

        for step in &self.steps {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for node in &current {
                let matched: Vec<Node<'a, 'input>> = match step.axis {
                    Axis::Child => node.children().filter(|c| step.matches(c)).collect(),
                    Axis::Descendant => node
                        .descendants()
                        .skip(1)
                        .filter(|c| step.matches(c))
                        .collect(),
                };
                for candidate in matched {
                    if seen.insert(candidate.id()) {
                        next.push(candidate);
                    }
                }
            }
            next.sort_by_key(|n| n.id().get_usize());
            current = next;
        }

        current
    }

    /// Trimmed, non-empty text values in document order.
    pub fn values(&self, context: Node) -> Vec<String> {
        self.select(context)
            .into_iter()
            .filter_map(|node| match &self.attribute {
                Some(attr) => node
                    .attributes()
                    .find(|a| a.name() == attr)
                    .map(|a| a.value().trim().to_string()),
                None => Some(direct_text(&node)),
            })
            .filter(|value| !value.is_empty())
            .collect()
    }

    pub fn first_value(&self, context: Node) -> Option<String> {
        self.values(context).into_iter().next()
    }
}

/// Text nodes directly under `node`, concatenated and trimmed.
pub fn direct_text(node: &Node) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// First non-empty value over `paths`, in priority order.
pub fn first_text(context: Node, paths: &[FieldPath]) -> Option<String> {
    paths.iter().find_map(|path| path.first_value(context))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CadastralNumber,
    Address,
    Area,
    Region,
    Municipality,
    Settlement,
    PermittedUse,
    BoundaryType,
    ZoneName,
    ZoneDescription,
    ZoneTypeValue,
    ZoneIndex,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: Field,
    pub paths: &'static [&'static str],
}

/// Land parcel fields, evaluated against the document root.
pub const EGRN_FIELDS: &[FieldRule] = &[
    FieldRule {
        field: Field::CadastralNumber,
        paths: &[
            "//object/common_data/cad_number",
            "//land_record/object/common_data/cad_number",
            "//cad_number",
            "//*/@CadastralNumber",
        ],
    },
    FieldRule {
        field: Field::Address,
        paths: &[
            "//address_location/address/readable_address",
            "//readable_address",
            "//Location/Address/Note",
        ],
    },
    FieldRule {
        field: Field::Area,
        paths: &["//params/area/value", "//area/value", "//Area/Area"],
    },
    FieldRule {
        field: Field::Region,
        paths: &["//region/value", "//region"],
    },
    FieldRule {
        field: Field::Municipality,
        paths: &["//municipality/value", "//municipality", "//district/name_district"],
    },
    FieldRule {
        field: Field::Settlement,
        paths: &[
            "//city/name_city",
            "//city",
            "//locality/name_locality",
            "//locality",
        ],
    },
    FieldRule {
        field: Field::PermittedUse,
        paths: &[
            "//permitted_use//by_document",
            "//permitted_use_established//by_document",
            "//permitted_use//land_use/value",
        ],
    },
];

/// Zone map record fields, evaluated against one record node.
pub const ZONE_RECORD_FIELDS: &[FieldRule] = &[
    FieldRule {
        field: Field::BoundaryType,
        paths: &[
            "./b_object_zones_and_territories/b_object/type_boundary/value",
            "./b_object_zones_and_territories/b_object/type_boundary",
            "./type_boundary/value",
            "./type_boundary",
        ],
    },
    FieldRule {
        field: Field::ZoneName,
        paths: &[
            "./b_object_zones_and_territories/b_object/name_by_doc",
            "./b_object_zones_and_territories/b_object/zone_name",
            "./b_object_zones_and_territories/b_object/name",
            "./name_by_doc",
            "./zone_name",
            "./name",
        ],
    },
    FieldRule {
        field: Field::ZoneDescription,
        paths: &[
            "./b_object_zones_and_territories/b_object/description",
            "./description",
        ],
    },
    FieldRule {
        field: Field::ZoneTypeValue,
        paths: &[
            "./b_object_zones_and_territories/b_object/type_zone/value",
            "./type_zone/value",
            "./type_zone",
        ],
    },
    FieldRule {
        field: Field::ZoneIndex,
        paths: &[
            "./b_object_zones_and_territories/b_object/index",
            "./b_object_zones_and_territories/b_object/zone_code",
            "./b_object_zones_and_territories/b_object/code",
            "./index",
            "./zone_code",
            "./code",
        ],
    },
];

/// Compiled candidate table.
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    candidates: BTreeMap<Field, Vec<FieldPath>>,
}

impl FieldTable {
    pub fn from_rules(rules: &[FieldRule]) -> Result<Self> {
        let mut candidates: BTreeMap<Field, Vec<FieldPath>> = BTreeMap::new();
        for rule in rules {
            let paths = candidates.entry(rule.field).or_default();
            for expr in rule.paths {
                paths.push(FieldPath::parse(expr)?);
            }
        }
        Ok(Self { candidates })
    }

    pub fn egrn() -> Result<Self> {
        Self::from_rules(EGRN_FIELDS)
    }

    pub fn zone_record() -> Result<Self> {
        Self::from_rules(ZONE_RECORD_FIELDS)
    }

    /// Puts operator-supplied paths ahead of the built-in candidates for `field`.
    pub fn with_priority_paths(mut self, field: Field, exprs: &[String]) -> Result<Self> {
        let mut paths = exprs
            .iter()
            .map(|e| FieldPath::parse(e))
            .collect::<Result<Vec<_>>>()?;
        let existing = self.candidates.remove(&field).unwrap_or_default();
        paths.extend(existing);
        self.candidates.insert(field, paths);
        Ok(self)
    }

    pub fn candidates(&self, field: Field) -> &[FieldPath] {
        self.candidates.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lookup(&self, context: Node, field: Field) -> Option<String> {
        first_text(context, self.candidates(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_parse_paths() {
        let path = FieldPath::parse("//params/area/value").unwrap();
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[0].axis, Axis::Descendant);
        assert_eq!(path.steps[1].axis, Axis::Child);

        let path = FieldPath::parse("./permitted_use//by_document").unwrap();
        assert_eq!(path.steps[1].axis, Axis::Descendant);

        let path = FieldPath::parse("//ordinate/@x").unwrap();
        assert_eq!(path.attribute.as_deref(), Some("x"));

        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("//").is_err());
        assert!(FieldPath::parse("a/@b/c").is_err());
        assert!(FieldPath::parse("a/").is_err());
    }

    #[test]
    fn test_builtin_tables_compile() {
        let egrn = FieldTable::egrn().unwrap();
        assert!(!egrn.candidates(Field::Area).is_empty());
        let zones = FieldTable::zone_record().unwrap();
        assert!(!zones.candidates(Field::ZoneName).is_empty());
    }

    #[test]
    fn test_matching_ignores_namespaces() {
        let xml = r#"<ns:root xmlns:ns="urn:a" xmlns:b="urn:b"><b:area><b:value>12,5</b:value></b:area></ns:root>"#;
        let doc = Document::parse(xml).unwrap();
        let path = FieldPath::parse("//area/value").unwrap();
        assert_eq!(path.first_value(doc.root()), Some("12,5".to_string()));
    }

    #[test]
    fn test_first_candidate_wins() {
        let xml = "<r><params><area><value>100</value></area></params><area><value>90</value></area></r>";
        let doc = Document::parse(xml).unwrap();
        let table = FieldTable::egrn().unwrap();
        assert_eq!(table.lookup(doc.root(), Field::Area), Some("100".to_string()));
    }

    #[test]
    fn test_empty_first_candidate_falls_through() {
        let xml = "<r><params><area><value>  </value></area></params><area><value>90</value></area></r>";
        let doc = Document::parse(xml).unwrap();
        let table = FieldTable::egrn().unwrap();
        assert_eq!(table.lookup(doc.root(), Field::Area), Some("90".to_string()));
    }

    #[test]
    fn test_all_candidates_empty_is_none() {
        let doc = Document::parse("<r><other/></r>").unwrap();
        let table = FieldTable::egrn().unwrap();
        assert_eq!(table.lookup(doc.root(), Field::Area), None);
        assert_eq!(table.lookup(doc.root(), Field::Region), None);
    }

    #[test]
    fn test_region_prefers_value_child() {
        let xml = "<r><region><code>77</code><value>Москва</value></region></r>";
        let doc = Document::parse(xml).unwrap();
        let table = FieldTable::egrn().unwrap();
        assert_eq!(table.lookup(doc.root(), Field::Region), Some("Москва".to_string()));
    }

    #[test]
    fn test_attribute_values() {
        let doc = Document::parse(r#"<r><p X="1,5" Y="2"/><p X="3"/></r>"#).unwrap();
        let path = FieldPath::parse("//p/@X").unwrap();
        assert_eq!(path.values(doc.root()), vec!["1,5".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_priority_paths_go_first() {
        let xml = "<r><params><area><value>100</value></area></params><custom_area>75</custom_area></r>";
        let doc = Document::parse(xml).unwrap();
        let table = FieldTable::egrn()
            .unwrap()
            .with_priority_paths(Field::Area, &["//custom_area".to_string()])
            .unwrap();
        assert_eq!(table.lookup(doc.root(), Field::Area), Some("75".to_string()));
    }

    #[test]
    fn test_descendant_selection_is_deduplicated() {
        let xml = "<r><a><a><b>1</b></a></a></r>";
        let doc = Document::parse(xml).unwrap();
        let path = FieldPath::parse("//a//b").unwrap();
        assert_eq!(path.values(doc.root()), vec!["1".to_string()]);
    }

    #[test]
    fn test_select_merges_contexts_in_document_order() {
        // nested `a` contexts reach the same `b` twice
        let xml = "<r><a><x><b>1</b></x><a><b>2</b></a></a><b>skip</b><a><b>3</b></a></r>";
        let doc = Document::parse(xml).unwrap();
        let path = FieldPath::parse("//a//b").unwrap();
        assert_eq!(
            path.values(doc.root()),
            vec!["1".to_string(), "2".to_string(), "3".to_string()]
        );
    }
}
