//! Types de données pour le crate sdl

use std::collections::HashMap;

use geo::{Coord, Geometry};

use crate::error::EntryError;

/// Type de géométrie déclaré par un enregistrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    /// Reconnaît le jeton de type d'un en-tête d'enregistrement (insensible à la casse)
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "P" | "POINT" => Some(Self::Point),
            "L" | "LINE" | "POLYLINE" => Some(Self::Line),
            "A" | "AREA" | "POLYGON" => Some(Self::Polygon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Line => "Line",
            Self::Polygon => "Polygon",
        }
    }
}

/// Coordonnées brutes d'un enregistrement, étiquetées par type
#[derive(Debug, Clone, PartialEq)]
pub enum RawGeometry {
    /// Toutes les coordonnées lues (une seule attendue)
    Point(Vec<Coord>),
    /// Une séquence de coordonnées par partie
    Line(Vec<Vec<Coord>>),
    /// Flux de coordonnées par partie, anneaux non encore découpés
    Polygon(Vec<Vec<Coord>>),
}

impl RawGeometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Self::Point(_) => GeometryKind::Point,
            Self::Line(_) => GeometryKind::Line,
            Self::Polygon(_) => GeometryKind::Polygon,
        }
    }

    /// Construit la variante correspondant au type déclaré
    pub fn from_parts(kind: GeometryKind, parts: Vec<Vec<Coord>>) -> Self {
        match kind {
            GeometryKind::Point => Self::Point(parts.into_iter().flatten().collect()),
            GeometryKind::Line => Self::Line(parts),
            GeometryKind::Polygon => Self::Polygon(parts),
        }
    }
}

/// En-tête d'un fichier SDL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Valeur de la directive `#version=`
    pub version: Option<String>,

    /// Blocs de métadonnées, nom en minuscules -> lignes brutes
    pub metadata: HashMap<String, Vec<String>>,
}

impl Header {
    /// Récupère un bloc de métadonnées, quelle que soit la casse du nom
    pub fn metadata(&self, name: &str) -> Option<&[String]> {
        self.metadata
            .get(&name.to_lowercase())
            .map(|lines| lines.as_slice())
    }
}

/// Un enregistrement parsé, avant assemblage de la géométrie
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub name: String,
    pub url_link: String,

    /// Numéro (1-based) de la première ligne de l'enregistrement
    pub line_number: u64,

    /// Coordonnées brutes, ou le défaut de structure rencontré
    pub geometry: Result<RawGeometry, EntryError>,
}

impl Entry {
    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().ok().map(RawGeometry::kind)
    }
}

/// Enregistrement produit par le lecteur
///
/// Tous les enregistrements partagent le même schéma, quel que soit le type
/// de géométrie qu'ils portent.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifiant séquentiel attribué à l'émission (0, 1, 2...)
    pub id: u64,

    /// Point, MultiLineString ou MultiPolygon ; absent si l'assemblage a échoué
    pub geometry: Option<Geometry>,

    pub name: String,
    pub key: String,
    pub url_link: String,
    pub entry_line_number: u64,
    pub parse_error: bool,
    pub error: Option<String>,
}

/// Valeur d'un attribut, dans l'ordre du schéma
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Geometry(Option<Geometry>),
    String(Option<String>),
    Integer(i64),
}

impl Feature {
    /// Identifiant textuel, préfixé par le nom de type
    pub fn fid(&self, type_name: &str) -> String {
        format!("{}.{}", type_name, self.id)
    }

    /// Attribut `parseError` tel qu'exposé par le schéma (0 ou 1)
    pub fn parse_error_flag(&self) -> i64 {
        i64::from(self.parse_error)
    }

    /// Valeurs des attributs dans l'ordre de [`crate::schema::ATTRIBUTES`]
    pub fn values(&self) -> Vec<AttributeValue> {
        vec![
            AttributeValue::Geometry(self.geometry.clone()),
            AttributeValue::String(Some(self.name.clone())),
            AttributeValue::String(Some(self.key.clone())),
            AttributeValue::String(Some(self.url_link.clone())),
            AttributeValue::Integer(i64::try_from(self.entry_line_number).unwrap_or(i64::MAX)),
            AttributeValue::Integer(self.parse_error_flag()),
            AttributeValue::String(self.error.clone()),
        ]
    }
}
