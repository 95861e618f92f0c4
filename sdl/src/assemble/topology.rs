//! Gestion de la topologie (trous, multipolygones)

use geo::{Contains, LineString, Polygon};

/// Organise les anneaux en polygones avec trous
///
/// Profondeur d'un anneau = nombre d'autres anneaux qui le contiennent en
/// entier (un sommet posé sur le contour englobant reste contenu).
/// Profondeur paire : contour extérieur. Profondeur impaire : trou du plus
/// proche anneau englobant de profondeur inférieure d'un.
pub fn organize_rings(rings: Vec<LineString>) -> Vec<Polygon> {
    if rings.len() <= 1 {
        return rings
            .into_iter()
            .map(|ring| Polygon::new(ring, vec![]))
            .collect();
    }

    let shells: Vec<Polygon> = rings
        .iter()
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();

    // containers[i] = indices des anneaux qui contiennent rings[i]
    let containers: Vec<Vec<usize>> = rings
        .iter()
        .enumerate()
        .map(|(i, ring)| {
            shells
                .iter()
                .enumerate()
                .filter(|&(j, shell)| j != i && shell.contains(ring))
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let depth = |i: usize| containers[i].len();

    let mut holes: Vec<Vec<usize>> = vec![Vec::new(); rings.len()];
    for i in 0..rings.len() {
        if depth(i) % 2 == 1 {
            // Le parent direct est l'englobant le plus profond
            if let Some(&parent) = containers[i]
                .iter()
                .filter(|&&j| depth(j) + 1 == depth(i))
                .max_by_key(|&&j| depth(j))
            {
                holes[parent].push(i);
            }
        }
    }

    // Un trou sans parent identifiable est conservé comme contour
    let orphan = |i: usize| {
        depth(i) % 2 == 1 && !holes.iter().any(|children| children.contains(&i))
    };

    (0..rings.len())
        .filter(|&i| depth(i) % 2 == 0 || orphan(i))
        .map(|i| {
            let interiors = holes[i].iter().map(|&h| rings[h].clone()).collect();
            Polygon::new(rings[i].clone(), interiors)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn square(x: f64, y: f64, size: f64) -> LineString {
        LineString::new(vec![
            Coord { x, y },
            Coord { x: x + size, y },
            Coord {
                x: x + size,
                y: y + size,
            },
            Coord { x, y: y + size },
            Coord { x, y },
        ])
    }

    #[test]
    fn test_organize_single_ring() {
        let polygons = organize_rings(vec![square(0.0, 0.0, 1.0)]);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].interiors().is_empty());
    }

    #[test]
    fn test_organize_ring_with_hole() {
        let polygons = organize_rings(vec![square(0.0, 0.0, 10.0), square(2.0, 2.0, 2.0)]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].interiors().len(), 1);
    }

    #[test]
    fn test_organize_hole_listed_first() {
        let polygons = organize_rings(vec![square(2.0, 2.0, 2.0), square(0.0, 0.0, 10.0)]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].exterior(), &square(0.0, 0.0, 10.0));
        assert_eq!(polygons[0].interiors().len(), 1);
    }

    #[test]
    fn test_organize_disjoint_rings() {
        let polygons = organize_rings(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|p| p.interiors().is_empty()));
    }

    #[test]
    fn test_organize_island_in_hole() {
        let polygons = organize_rings(vec![
            square(0.0, 0.0, 100.0),
            square(10.0, 10.0, 50.0),
            square(20.0, 20.0, 10.0),
        ]);
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[0].interiors().len(), 1);
        assert!(polygons[1].interiors().is_empty());
        assert_eq!(polygons[1].exterior(), &square(20.0, 20.0, 10.0));
    }

    #[test]
    fn test_organize_hole_touching_shell() {
        let hole = LineString::from(vec![(0.0, 5.0), (3.0, 4.0), (3.0, 6.0), (0.0, 5.0)]);
        let polygons = organize_rings(vec![square(0.0, 0.0, 10.0), hole.clone()]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].interiors(), &[hole]);
    }

    #[test]
    fn test_organize_hole_with_tangent_vertex_inside() {
        // Premier sommet intérieur, un autre sur le contour
        let hole = LineString::from(vec![(3.0, 5.0), (5.0, 0.0), (6.0, 5.0), (3.0, 5.0)]);
        let polygons = organize_rings(vec![hole, square(0.0, 0.0, 10.0)]);
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].exterior(), &square(0.0, 0.0, 10.0));
        assert_eq!(polygons[0].interiors().len(), 1);
    }

    #[test]
    fn test_organize_no_rings() {
        assert!(organize_rings(Vec::new()).is_empty());
    }
}
