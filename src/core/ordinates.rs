//! Reads boundary rings out of the contour -> spatial element -> ordinate subtree
//! shared by both extract formats.

use crate::core::fields::direct_text;
use crate::domain::model::{Contour, Coordinate};
use roxmltree::Node;

const SPATIAL_ELEMENT: &str = "spatial_element";
const ORDINATE: &str = "ordinate";
const POINT_NUMBER: [&str; 2] = ["ord_nmb", "num_geopoint"];
const POINT_NUMBER_ATTRS: [&str; 2] = ["OrdNmb", "NumGeopoint"];

/// Parses numeric text after stripping whitespace and turning a decimal comma into a dot.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned = normalize_decimal(text);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn normalize_decimal(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

fn is_named(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child_text_ci(node: &Node, name: &str) -> Option<String> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case(name))
        .map(|c| direct_text(&c))
        .find(|t| !t.is_empty())
}

fn attribute_ci(node: &Node, name: &str) -> Option<String> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn point_label(ordinate: &Node) -> Option<String> {
    POINT_NUMBER
        .iter()
        .find_map(|name| {
            ordinate
                .children()
                .find(|c| is_named(c, name))
                .map(|c| direct_text(&c))
                .filter(|t| !t.is_empty())
        })
        .or_else(|| POINT_NUMBER_ATTRS.iter().find_map(|name| attribute_ci(ordinate, name)))
}

/// Builds one ring from ordinate nodes. Ordinates without a parseable x/y pair are
/// skipped; unlabeled points get their 1-based position in the ring.
pub fn contour_from_ordinates<'a, 'input: 'a>(ordinates: impl Iterator<Item = Node<'a, 'input>>) -> Contour {
    let mut points = Vec::new();
    let mut skipped = 0usize;

    for (idx, ordinate) in ordinates.enumerate() {
        let x = child_text_ci(&ordinate, "x").or_else(|| attribute_ci(&ordinate, "x"));
        let y = child_text_ci(&ordinate, "y").or_else(|| attribute_ci(&ordinate, "y"));

        match (x.as_deref().and_then(parse_number), y.as_deref().and_then(parse_number)) {
            (Some(x), Some(y)) => {
                let num = point_label(&ordinate).or_else(|| Some((idx + 1).to_string()));
                points.push(Coordinate::new(num, x, y));
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} ordinates without numeric x/y", skipped);
    }

    Contour::new(points)
}

/// All rings below `container`, one per spatial element. A container holding bare
/// ordinates without spatial elements yields a single ring.
pub fn contours_under(container: Node) -> Vec<Contour> {
    let elements: Vec<Node> = container
        .descendants()
        .filter(|n| is_named(n, SPATIAL_ELEMENT))
        .collect();

    if elements.is_empty() {
        let contour = contour_from_ordinates(container.descendants().filter(|n| is_named(n, ORDINATE)));
        return if contour.is_empty() { Vec::new() } else { vec![contour] };
    }

    elements
        .into_iter()
        .map(|element| contour_from_ordinates(element.descendants().filter(|n| is_named(n, ORDINATE))))
        .filter(|contour| !contour.is_empty())
        .collect()
}

/// Drops consecutive repeated positions, including a repeated closing point.
pub fn dedupe_adjacent(contour: &Contour) -> Contour {
    let mut points: Vec<Coordinate> = Vec::with_capacity(contour.len());
    for point in &contour.points {
        if points.last().map_or(true, |last| !last.same_position(point)) {
            points.push(point.clone());
        }
    }
    while points.len() > 1 && points[0].same_position(&points[points.len() - 1]) {
        points.pop();
    }
    Contour::new(points)
}

/// Repeats the first point at the end unless the ring is already closed.
pub fn close_ring(mut contour: Contour) -> Contour {
    if !contour.is_closed() {
        if let Some(first) = contour.points.first().cloned() {
            contour.points.push(first);
        }
    }
    contour
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn test_parse_number_normalizes_text() {
        assert_eq!(parse_number(" 1 234,56 "), Some(1234.56));
        assert_eq!(parse_number("10.5"), Some(10.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_contours_per_spatial_element() {
        let xml = r#"<contours_location>
            <spatial_element><ordinates>
                <ordinate><x>0</x><y>0</y><ord_nmb>1</ord_nmb></ordinate>
                <ordinate><x>1</x><y>0</y><num_geopoint>н2</num_geopoint></ordinate>
                <ordinate><x>1</x><y>1</y></ordinate>
            </ordinates></spatial_element>
            <spatial_element><ordinates>
                <ordinate X="5,5" Y="5"/>
            </ordinates></spatial_element>
        </contours_location>"#;
        let doc = Document::parse(xml).unwrap();
        let contours = contours_under(doc.root_element());

        assert_eq!(contours.len(), 2);
        let labels: Vec<_> = contours[0].points.iter().map(|p| p.num.clone().unwrap()).collect();
        assert_eq!(labels, vec!["1", "н2", "3"]);
        assert_eq!(contours[1].points[0].x, 5.5);
    }

    #[test]
    fn test_unparseable_ordinates_are_skipped() {
        let xml = "<c><ordinate><x>a</x><y>1</y></ordinate><ordinate><x>2</x><y>3</y></ordinate></c>";
        let doc = Document::parse(xml).unwrap();
        let contours = contours_under(doc.root_element());
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 1);
        assert_eq!(contours[0].points[0].num.as_deref(), Some("2"));
    }

    #[test]
    fn test_dedupe_and_close() {
        let contour = Contour::from_xy(&[(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        let cleaned = dedupe_adjacent(&contour);
        assert_eq!(cleaned.len(), 3);

        let closed = close_ring(cleaned);
        assert_eq!(closed.len(), 4);
        assert!(closed.is_closed());
        assert_eq!(close_ring(closed.clone()), closed);
    }
}
