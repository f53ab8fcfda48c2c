//! EGRN land-parcel extract reader.

use crate::core::container::resolve_document;
use crate::core::fields::{Field, FieldPath, FieldTable};
use crate::core::ordinates::{contours_under, normalize_decimal};
use crate::domain::model::{Contour, Parcel};
use crate::utils::error::Result;
use regex::Regex;
use roxmltree::{Document, Node};
use std::sync::LazyLock;

/// Parcel boundary containers, most specific first. Point collections outside these
/// subtrees never contribute coordinates.
const CONTOUR_CONTAINERS: &[&str] = &["//contours_location", "//contours", "//entity_spatial"];

const INCLUDED_OBJECTS: &str = "//included_objects//cad_number";
const LAND_CONTAINER: &str = "land_record";

static CADASTRAL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{1,2}:\d{1,7}:\d{1,}$").expect("static pattern"));

pub fn is_cadastral_number(text: &str) -> bool {
    CADASTRAL_NUMBER.is_match(text.trim())
}

/// Reads EGRN extracts. Holds only the compiled field table, so one instance can be
/// shared between callers.
#[derive(Debug, Clone)]
pub struct EgrnExtractor {
    fields: FieldTable,
}

impl EgrnExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fields: FieldTable::egrn()?,
        })
    }

    pub fn with_fields(fields: FieldTable) -> Self {
        Self { fields }
    }

    /// Parses raw bytes (XML or ZIP) into a parcel.
    pub fn parse(&self, bytes: &[u8]) -> Result<Parcel> {
        let xml = resolve_document(bytes)?;
        let doc = Document::parse(&xml)?;
        Ok(self.parse_document(&doc))
    }

    pub fn parse_document(&self, doc: &Document) -> Parcel {
        let root = doc.root();
        let lookup = |field| self.fields.lookup(root, field);

        let cadastral_number = lookup(Field::CadastralNumber);
        let contours = parcel_contours(root);
        let capital_objects = included_objects(root, cadastral_number.as_deref());
        let has_coordinates = contours.iter().any(|c| !c.is_empty());

        let parcel = Parcel {
            address: lookup(Field::Address),
            area: lookup(Field::Area).map(|a| normalize_decimal(&a)),
            region: lookup(Field::Region),
            municipality: lookup(Field::Municipality),
            settlement: lookup(Field::Settlement),
            permitted_use: lookup(Field::PermittedUse),
            is_land: is_land(doc),
            cadastral_number,
            contours,
            capital_objects,
            has_coordinates,
        };

        tracing::info!(
            "Parsed EGRN extract: cadnum={}, land={}, contours={}, points={}",
            parcel.cadastral_number.as_deref().unwrap_or("-"),
            parcel.is_land,
            parcel.contours.len(),
            parcel.flattened_coordinates().len()
        );

        parcel
    }
}

fn is_land(doc: &Document) -> bool {
    let root_name = doc.root_element().tag_name().name().to_lowercase();
    root_name.contains("land")
        || doc
            .descendants()
            .any(|n| n.is_element() && n.tag_name().name() == LAND_CONTAINER)
}

fn parcel_contours(root: Node) -> Vec<Contour> {
    for expr in CONTOUR_CONTAINERS {
        let Ok(path) = FieldPath::parse(expr) else {
            continue;
        };
        let containers = path.select(root);
        // nested containers of the same kind would otherwise be read twice
        let outermost: Vec<Node> = containers
            .iter()
            .copied()
            .filter(|c| !c.ancestors().skip(1).any(|a| containers.contains(&a)))
            .collect();

        let contours: Vec<Contour> = outermost.into_iter().flat_map(contours_under).collect();
        if !contours.is_empty() {
            tracing::debug!("Read {} contours from '{}'", contours.len(), expr);
            return contours;
        }
    }
    Vec::new()
}

fn included_objects(root: Node, own_number: Option<&str>) -> Vec<String> {
    let Ok(path) = FieldPath::parse(INCLUDED_OBJECTS) else {
        return Vec::new();
    };

    let mut result: Vec<String> = Vec::new();
    for number in path.values(root) {
        if Some(number.as_str()) == own_number {
            continue;
        }
        if !is_cadastral_number(&number) {
            tracing::debug!("Ignoring malformed linked object number '{}'", number);
            continue;
        }
        if !result.contains(&number) {
            result.push(number);
        }
    }
    result
}

/// Convenience wrapper over [`EgrnExtractor`] with the built-in field table.
pub fn parse_egrn(bytes: &[u8]) -> Result<Parcel> {
    EgrnExtractor::new()?.parse(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ZoningError;

    const EXTRACT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<extract_about_property_land>
  <land_record>
    <object>
      <common_data><cad_number>77:01:0001001:10</cad_number></common_data>
    </object>
    <params>
      <area><value>1500,5</value></area>
      <permitted_use><permitted_use_established><by_document>Для ИЖС</by_document></permitted_use_established></permitted_use>
    </params>
    <address_location>
      <address>
        <readable_address>г. Москва, ул. Примерная, 1</readable_address>
        <address_fias><level_settlement>
          <region><code>77</code><value>Москва</value></region>
          <city><name_city>Москва</name_city></city>
        </level_settlement></address_fias>
      </address>
    </address_location>
    <cad_links>
      <included_objects>
        <included_object><cad_number>77:01:0001001:200</cad_number></included_object>
        <included_object><cad_number>77:01:0001001:10</cad_number></included_object>
        <included_object><cad_number>not-a-number</cad_number></included_object>
        <included_object><cad_number>77:01:0001001:200</cad_number></included_object>
      </included_objects>
    </cad_links>
    <contours_location>
      <contours><contour><entity_spatial><spatials_elements>
        <spatial_element><ordinates>
          <ordinate><x>0</x><y>0</y><ord_nmb>1</ord_nmb></ordinate>
          <ordinate><x>10</x><y>0</y><ord_nmb>2</ord_nmb></ordinate>
          <ordinate><x>10</x><y>20</y><ord_nmb>3</ord_nmb></ordinate>
          <ordinate><x>0</x><y>20</y><ord_nmb>4</ord_nmb></ordinate>
        </ordinates></spatial_element>
      </spatials_elements></entity_spatial></contour></contours>
    </contours_location>
  </land_record>
  <surveyors><ordinate><x>999</x><y>999</y></ordinate></surveyors>
</extract_about_property_land>"#;

    #[test]
    fn test_parse_full_extract() {
        let parcel = parse_egrn(EXTRACT.as_bytes()).unwrap();

        assert_eq!(parcel.cadastral_number.as_deref(), Some("77:01:0001001:10"));
        assert_eq!(parcel.area.as_deref(), Some("1500.5"));
        assert_eq!(parcel.address.as_deref(), Some("г. Москва, ул. Примерная, 1"));
        assert_eq!(parcel.region.as_deref(), Some("Москва"));
        assert_eq!(parcel.settlement.as_deref(), Some("Москва"));
        assert_eq!(parcel.permitted_use.as_deref(), Some("Для ИЖС"));
        assert!(parcel.is_land);
        assert!(parcel.has_coordinates);
        assert_eq!(parcel.capital_objects, vec!["77:01:0001001:200".to_string()]);
    }

    #[test]
    fn test_coordinates_only_from_boundary_subtree() {
        let parcel = parse_egrn(EXTRACT.as_bytes()).unwrap();
        assert_eq!(parcel.contours.len(), 1);
        assert_eq!(parcel.contours[0].len(), 4);
        assert!(parcel.flattened_coordinates().iter().all(|p| p.x != 999.0));
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let parcel = parse_egrn(b"<extract_about_property_building/>").unwrap();
        assert_eq!(parcel, Parcel::default());
    }

    #[test]
    fn test_land_container_marks_land() {
        let parcel = parse_egrn(b"<extract><land_record/></extract>").unwrap();
        assert!(parcel.is_land);
    }

    #[test]
    fn test_multi_contour_parcel() {
        let xml = r#"<extract_base_params_land><contours_location>
            <contour><spatial_element>
              <ordinate><x>0</x><y>0</y></ordinate><ordinate><x>1</x><y>0</y></ordinate><ordinate><x>1</x><y>1</y></ordinate>
            </spatial_element></contour>
            <contour><spatial_element>
              <ordinate><x>5</x><y>5</y></ordinate><ordinate><x>6</x><y>5</y></ordinate><ordinate><x>6</x><y>6</y></ordinate>
            </spatial_element></contour>
        </contours_location></extract_base_params_land>"#;
        let parcel = parse_egrn(xml.as_bytes()).unwrap();
        assert_eq!(parcel.contours.len(), 2);
        assert_eq!(parcel.flattened_coordinates().len(), 6);
        assert_eq!(parcel.contours[1].points[0].num.as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let err = parse_egrn(b"<extract><land_record></extract>").unwrap_err();
        assert!(matches!(err, ZoningError::ParseError(_)));
    }

    #[test]
    fn test_cadastral_number_shape() {
        assert!(is_cadastral_number("77:01:0001001:1234"));
        assert!(is_cadastral_number("1:2:3:4"));
        assert!(!is_cadastral_number("77:01:0001001"));
        assert!(!is_cadastral_number("77-01-0001001-1"));
    }
}
