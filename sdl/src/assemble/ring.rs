//! Découpage des anneaux d'un flux de coordonnées de polygone
//!
//! Un anneau se ferme sur la première coordonnée égale à son point de départ.
//! Une coordonnée dupliquée ne se distingue pas toujours d'une fermeture :
//! les cas douteux sont signalés, jamais écartés en silence.

use std::collections::HashSet;
use std::fmt;

use geo::{Coord, LineString};

/// Cas douteux rencontré lors du découpage
#[derive(Debug, Clone, PartialEq)]
pub enum Suspect {
    /// Coordonnée identique à la précédente, non reprise dans l'anneau
    ConsecutiveDuplicate { index: usize, coord: Coord },
    /// Retour au point de départ avant trois sommets distincts
    DegenerateClosure { index: usize },
    /// Sommet déjà présent dans l'anneau en cours
    RepeatedVertex { index: usize, coord: Coord },
    /// Anneau non fermé en fin de partie, fermé automatiquement
    Unclosed { points: usize },
    /// Reste trop court pour former un anneau, écarté
    TooShort { points: usize },
}

impl fmt::Display for Suspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsecutiveDuplicate { index, coord } => write!(
                f,
                "duplicate coordinate ({}, {}) at position {}",
                coord.x, coord.y, index
            ),
            Self::DegenerateClosure { index } => {
                write!(f, "ring closes before 3 vertices at position {}", index)
            }
            Self::RepeatedVertex { index, coord } => write!(
                f,
                "repeated vertex ({}, {}) at position {}",
                coord.x, coord.y, index
            ),
            Self::Unclosed { points } => write!(f, "unclosed ring of {} points", points),
            Self::TooShort { points } => {
                write!(f, "ring of {} points dropped, too short", points)
            }
        }
    }
}

/// Anneaux découpés et cas douteux d'une partie
#[derive(Debug, Default)]
pub struct RingSplit {
    pub rings: Vec<LineString>,
    pub suspects: Vec<Suspect>,
}

/// Découpe un flux de coordonnées en anneaux fermés
///
/// Comparaison exacte des coordonnées, sans tolérance.
pub fn split_rings(coords: &[Coord]) -> RingSplit {
    let mut split = RingSplit::default();
    let mut current: Vec<Coord> = Vec::new();
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut previous: Option<Coord> = None;

    for (index, &coord) in coords.iter().enumerate() {
        if previous == Some(coord) {
            split
                .suspects
                .push(Suspect::ConsecutiveDuplicate { index, coord });
            continue;
        }
        previous = Some(coord);

        let Some(&start) = current.first() else {
            current.push(coord);
            seen.insert(coord_key(coord));
            continue;
        };

        if coord == start {
            if current.len() >= 3 {
                current.push(coord);
                split.rings.push(LineString::new(std::mem::take(&mut current)));
                seen.clear();
            } else {
                split.suspects.push(Suspect::DegenerateClosure { index });
                current.push(coord);
            }
        } else {
            if !seen.insert(coord_key(coord)) {
                split.suspects.push(Suspect::RepeatedVertex { index, coord });
            }
            current.push(coord);
        }
    }

    if !current.is_empty() {
        let points = current.len();
        if points >= 3 {
            tracing::warn!(points, "Auto-closing unclosed ring");
            split.suspects.push(Suspect::Unclosed { points });
            current.push(current[0]);
            split.rings.push(LineString::new(current));
        } else {
            split.suspects.push(Suspect::TooShort { points });
        }
    }

    split
}

fn coord_key(coord: Coord) -> (u64, u64) {
    (coord.x.to_bits(), coord.y.to_bits())
}
