//! Construction des géométries à partir des coordonnées brutes

pub mod ring;
pub mod topology;

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point};

use crate::types::RawGeometry;

/// Résultat de l'assemblage d'un enregistrement
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    /// Géométrie au mieux, absente si rien n'a pu être construit
    pub geometry: Option<Geometry>,
    /// Description des cas douteux, si l'assemblage n'est pas fiable
    pub fault: Option<String>,
}

impl Assembly {
    fn new(geometry: Option<Geometry>, faults: Vec<String>) -> Self {
        let fault = if faults.is_empty() {
            None
        } else {
            Some(faults.join("; "))
        };
        Self { geometry, fault }
    }

    /// L'enregistrement doit-il être marqué en erreur
    pub fn is_error(&self) -> bool {
        self.fault.is_some()
    }
}

/// Construit la géométrie d'un enregistrement
///
/// Une géométrie douteuse est toujours renvoyée, accompagnée de la
/// description du problème.
pub fn assemble(raw: &RawGeometry) -> Assembly {
    match raw {
        RawGeometry::Point(coords) => assemble_point(coords),
        RawGeometry::Line(parts) => assemble_line(parts),
        RawGeometry::Polygon(parts) => assemble_polygon(parts),
    }
}

fn assemble_point(coords: &[Coord]) -> Assembly {
    match coords {
        [] => Assembly::new(None, vec!["point has no coordinate".to_string()]),
        [coord] => Assembly::new(Some(Geometry::Point(Point::from(*coord))), Vec::new()),
        [first, ..] => Assembly::new(
            Some(Geometry::Point(Point::from(*first))),
            vec![format!(
                "point has {} coordinates, first one kept",
                coords.len()
            )],
        ),
    }
}

fn assemble_line(parts: &[Vec<Coord>]) -> Assembly {
    let mut faults = Vec::new();
    let mut lines = Vec::with_capacity(parts.len());

    for (index, part) in parts.iter().enumerate() {
        if part.len() < 2 {
            faults.push(format!(
                "line part {} has {} coordinate(s), skipped",
                index + 1,
                part.len()
            ));
            continue;
        }
        lines.push(LineString::new(part.clone()));
    }

    if lines.is_empty() {
        faults.push("line has no valid part".to_string());
        return Assembly::new(None, faults);
    }

    Assembly::new(
        Some(Geometry::MultiLineString(MultiLineString::new(lines))),
        faults,
    )
}

fn assemble_polygon(parts: &[Vec<Coord>]) -> Assembly {
    let mut faults = Vec::new();
    let mut rings = Vec::new();

    for (index, part) in parts.iter().enumerate() {
        let split = ring::split_rings(part);
        let prefix = if parts.len() > 1 {
            format!("part {}: ", index + 1)
        } else {
            String::new()
        };
        faults.extend(split.suspects.iter().map(|s| format!("{}{}", prefix, s)));
        rings.extend(split.rings);
    }

    if rings.is_empty() {
        faults.push("polygon has no ring".to_string());
        return Assembly::new(None, faults);
    }

    let polygons = topology::organize_rings(rings);
    Assembly::new(
        Some(Geometry::MultiPolygon(MultiPolygon::new(polygons))),
        faults,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(points: &[(f64, f64)]) -> Vec<Coord> {
        points.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    #[test]
    fn test_single_point() {
        let assembly = assemble(&RawGeometry::Point(coords(&[(1.0, 2.0)])));
        assert_eq!(assembly.geometry, Some(Geometry::Point(Point::new(1.0, 2.0))));
        assert!(!assembly.is_error());
    }

    #[test]
    fn test_point_with_extra_coordinates() {
        let assembly = assemble(&RawGeometry::Point(coords(&[(1.0, 2.0), (3.0, 4.0)])));
        assert_eq!(assembly.geometry, Some(Geometry::Point(Point::new(1.0, 2.0))));
        assert!(assembly.is_error());
    }

    #[test]
    fn test_empty_point() {
        let assembly = assemble(&RawGeometry::Point(Vec::new()));
        assert!(assembly.geometry.is_none());
        assert!(assembly.is_error());
    }

    #[test]
    fn test_multi_part_line() {
        let assembly = assemble(&RawGeometry::Line(vec![
            coords(&[(0.0, 0.0), (10.0, 10.0)]),
            coords(&[(20.0, 20.0), (30.0, 30.0), (40.0, 40.0)]),
        ]));
        let Some(Geometry::MultiLineString(lines)) = assembly.geometry else {
            panic!("expected a MultiLineString");
        };
        assert_eq!(lines.0.len(), 2);
        assert!(assembly.fault.is_none());
    }

    #[test]
    fn test_line_short_part_is_skipped() {
        let assembly = assemble(&RawGeometry::Line(vec![
            coords(&[(0.0, 0.0)]),
            coords(&[(1.0, 1.0), (2.0, 2.0)]),
        ]));
        let Some(Geometry::MultiLineString(lines)) = &assembly.geometry else {
            panic!("expected a MultiLineString");
        };
        assert_eq!(lines.0.len(), 1);
        assert_eq!(
            assembly.fault.as_deref(),
            Some("line part 1 has 1 coordinate(s), skipped")
        );
    }

    #[test]
    fn test_line_without_valid_part() {
        let assembly = assemble(&RawGeometry::Line(vec![coords(&[(0.0, 0.0)])]));
        assert!(assembly.geometry.is_none());
        assert!(assembly.is_error());
    }

    #[test]
    fn test_polygon_with_hole_touching_shell() {
        let assembly = assemble(&RawGeometry::Polygon(vec![coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
            (0.0, 5.0),
            (3.0, 4.0),
            (3.0, 6.0),
            (0.0, 5.0),
        ])]));
        assert!(!assembly.is_error());
        let Some(Geometry::MultiPolygon(polygons)) = assembly.geometry else {
            panic!("expected a MultiPolygon");
        };
        assert_eq!(polygons.0.len(), 1);
        assert_eq!(polygons.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_polygon_with_hole() {
        let assembly = assemble(&RawGeometry::Polygon(vec![coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
            (2.0, 2.0),
            (4.0, 2.0),
            (4.0, 4.0),
            (2.0, 2.0),
        ])]));
        assert!(!assembly.is_error());
        let Some(Geometry::MultiPolygon(polygons)) = assembly.geometry else {
            panic!("expected a MultiPolygon");
        };
        assert_eq!(polygons.0.len(), 1);
        assert_eq!(polygons.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_polygon_duplicate_is_flagged_but_kept() {
        let assembly = assemble(&RawGeometry::Polygon(vec![coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
        ])]));
        assert!(assembly.is_error());
        assert!(matches!(assembly.geometry, Some(Geometry::MultiPolygon(_))));
        assert!(assembly
            .fault
            .as_deref()
            .is_some_and(|f| f.contains("duplicate coordinate (10, 10)")));
    }

    #[test]
    fn test_polygon_parts_are_prefixed() {
        let assembly = assemble(&RawGeometry::Polygon(vec![
            coords(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
            coords(&[(5.0, 5.0), (6.0, 5.0)]),
        ]));
        assert_eq!(
            assembly.fault.as_deref(),
            Some("part 2: ring of 2 points dropped, too short")
        );
    }

    #[test]
    fn test_polygon_without_ring() {
        let assembly = assemble(&RawGeometry::Polygon(vec![coords(&[(0.0, 0.0)])]));
        assert!(assembly.geometry.is_none());
        assert_eq!(
            assembly.fault.as_deref(),
            Some("ring of 1 points dropped, too short; polygon has no ring")
        );
    }
}
