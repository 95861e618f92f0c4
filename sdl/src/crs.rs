//! Résolution du système de référence (CRS)
//!
//! Ordre de priorité : identifiant `srs` fourni par l'appelant, sinon WKT du
//! bloc de métadonnées `CoordinateSystem`, sinon aucun CRS.

use std::sync::OnceLock;

use memchr::memchr;
use regex::Regex;

use crate::types::Header;
use crate::SdlError;

/// Nom (en minuscules) du bloc de métadonnées portant le WKT
pub const COORDINATE_SYSTEM_BLOCK: &str = "coordinatesystem";

/// Autorités reconnues pour les identifiants `srs`
const AUTHORITIES: &[&str] = &["EPSG", "ESRI", "CRS", "IGNF", "OGC"];

/// Mots-clés racines d'un WKT de système de référence (WKT1 et WKT2)
const CRS_KEYWORDS: &[&str] = &[
    "PROJCS",
    "GEOGCS",
    "GEOCCS",
    "VERT_CS",
    "LOCAL_CS",
    "COMPD_CS",
    "FITTED_CS",
    "PROJCRS",
    "GEOGCRS",
    "GEODCRS",
    "VERTCRS",
    "COMPOUNDCRS",
    "ENGCRS",
    "BOUNDCRS",
];

const MAX_WKT_DEPTH: usize = 64;

/// Autorité et code d'un CRS (ex: EPSG / 28992)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub name: String,
    pub code: String,
}

/// Noeud d'un arbre WKT : `KEYWORD[valeur, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct WktNode {
    pub keyword: String,
    pub values: Vec<WktValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WktValue {
    Text(String),
    Number(f64),
    Node(WktNode),
}

impl WktNode {
    /// Premier sous-noeud portant ce mot-clé (insensible à la casse)
    pub fn child(&self, keyword: &str) -> Option<&WktNode> {
        self.values.iter().find_map(|value| match value {
            WktValue::Node(node) if node.keyword.eq_ignore_ascii_case(keyword) => Some(node),
            _ => None,
        })
    }

    /// Première valeur textuelle (le nom pour la plupart des noeuds)
    pub fn first_text(&self) -> Option<&str> {
        self.values.iter().find_map(|value| match value {
            WktValue::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Origine de la définition d'un CRS
#[derive(Debug, Clone, PartialEq)]
pub enum CrsDefinition {
    /// Identifiant décodé, tel que fourni
    Identifier(String),
    /// WKT parsé, avec le texte d'origine
    Wkt { root: WktNode, text: String },
}

/// Système de référence effectif d'un flux
#[derive(Debug, Clone, PartialEq)]
pub struct Crs {
    name: Option<String>,
    authority: Option<Authority>,
    definition: CrsDefinition,
}

impl Crs {
    /// Décode un identifiant qualifié par une autorité
    ///
    /// Formes acceptées : `EPSG:28992`, `urn:ogc:def:crs:EPSG::28992`,
    /// `http://www.opengis.net/def/crs/EPSG/0/28992`,
    /// `http://www.opengis.net/gml/srs/epsg.xml#28992`.
    pub fn from_srs(srs: &str) -> Result<Self, SdlError> {
        let trimmed = srs.trim();
        let invalid = || SdlError::InvalidSrs(srs.to_string());

        let captures = srs_patterns()
            .iter()
            .find_map(|pattern| pattern.captures(trimmed))
            .ok_or_else(invalid)?;

        let name = captures[1].to_ascii_uppercase();
        let code = captures[2].to_ascii_uppercase();
        if !AUTHORITIES.contains(&name.as_str()) {
            return Err(invalid());
        }
        if matches!(name.as_str(), "EPSG" | "ESRI") && !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        Ok(Self {
            name: None,
            authority: Some(Authority { name, code }),
            definition: CrsDefinition::Identifier(trimmed.to_string()),
        })
    }

    /// Parse une description WKT de système de référence
    pub fn from_wkt(wkt: &str) -> Result<Self, SdlError> {
        let root = parse_wkt(wkt).map_err(|reason| SdlError::invalid_wkt(wkt, reason))?;

        if !CRS_KEYWORDS
            .iter()
            .any(|keyword| root.keyword.eq_ignore_ascii_case(keyword))
        {
            return Err(SdlError::invalid_wkt(
                wkt,
                format!("{} is not a coordinate reference system", root.keyword),
            ));
        }

        let name = root.first_text().map(str::to_string);
        let authority = root
            .child("AUTHORITY")
            .or_else(|| root.child("ID"))
            .and_then(authority_from_node);

        Ok(Self {
            name,
            authority,
            definition: CrsDefinition::Wkt {
                root,
                text: wkt.trim().to_string(),
            },
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn authority(&self) -> Option<&Authority> {
        self.authority.as_ref()
    }

    pub fn definition(&self) -> &CrsDefinition {
        &self.definition
    }

    /// Code EPSG, si l'autorité est EPSG
    pub fn epsg(&self) -> Option<u32> {
        self.authority
            .as_ref()
            .filter(|a| a.name.eq_ignore_ascii_case("EPSG"))
            .and_then(|a| a.code.parse().ok())
    }

    /// Identifiant court `AUTORITE:CODE`
    pub fn srs_identifier(&self) -> Option<String> {
        self.authority
            .as_ref()
            .map(|a| format!("{}:{}", a.name, a.code))
    }

    /// Texte WKT d'origine, pour un CRS issu des métadonnées
    pub fn wkt(&self) -> Option<&str> {
        match &self.definition {
            CrsDefinition::Wkt { text, .. } => Some(text),
            CrsDefinition::Identifier(_) => None,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.srs_identifier(), &self.name) {
            (Some(id), Some(name)) => write!(f, "{} ({})", name, id),
            (Some(id), None) => write!(f, "{}", id),
            (None, Some(name)) => write!(f, "{}", name),
            (None, None) => write!(f, "unnamed CRS"),
        }
    }
}

/// Détermine le CRS effectif ; n'échoue qu'à la construction du lecteur
pub fn resolve(srs: Option<&str>, header: &Header) -> Result<Option<Crs>, SdlError> {
    if let Some(srs) = srs {
        return Crs::from_srs(srs).map(Some);
    }

    if let Some(block) = header.metadata(COORDINATE_SYSTEM_BLOCK) {
        let wkt = block.first().map(String::as_str).unwrap_or("");
        return Crs::from_wkt(wkt).map(Some);
    }

    Ok(None)
}

fn srs_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)^urn:(?:x-)?ogc:def:crs:([a-z0-9_]+):[^:]*:([a-z0-9_.]+)$",
            r"(?i)^https?://www\.opengis\.net/def/crs/([a-z0-9_]+)/[^/]+/([a-z0-9_.]+)$",
            r"(?i)^https?://www\.opengis\.net/gml/srs/(epsg)\.xml#([0-9]+)$",
            r"(?i)^([a-z][a-z0-9_]*):([a-z0-9_.]+)$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static SRS pattern"))
        .collect()
    })
}

fn authority_from_node(node: &WktNode) -> Option<Authority> {
    let name = node.first_text()?.to_ascii_uppercase();
    let code = match node.values.get(1)? {
        WktValue::Text(code) => code.clone(),
        WktValue::Number(code) if code.fract() == 0.0 => format!("{}", *code as i64),
        WktValue::Number(code) => code.to_string(),
        WktValue::Node(_) => return None,
    };
    Some(Authority { name, code })
}

/// Parse un texte WKT en arbre de noeuds
pub fn parse_wkt(text: &str) -> Result<WktNode, String> {
    let mut parser = WktParser {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };
    parser.skip_ws();
    if parser.peek().is_none() {
        return Err("empty WKT".to_string());
    }
    let root = parser.node(0)?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(format!("trailing characters at offset {}", parser.pos));
    }
    Ok(root)
}

struct WktParser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl WktParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> String {
        match self.peek() {
            Some(b) => format!("unexpected '{}' at offset {}", b as char, self.pos),
            None => "unexpected end of text".to_string(),
        }
    }

    fn node(&mut self, depth: usize) -> Result<WktNode, String> {
        if depth > MAX_WKT_DEPTH {
            return Err("nesting too deep".to_string());
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.unexpected());
        }
        let keyword = self.text[start..self.pos].to_string();

        self.skip_ws();
        let close = match self.peek() {
            Some(b'[') => b']',
            Some(b'(') => b')',
            // Mot nu (ex: EAST dans AXIS)
            _ => {
                return Ok(WktNode {
                    keyword,
                    values: Vec::new(),
                })
            }
        };
        self.pos += 1;

        let mut values = Vec::new();
        loop {
            self.skip_ws();
            values.push(self.value(depth)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.unexpected()),
            }
        }

        Ok(WktNode { keyword, values })
    }

    fn value(&mut self, depth: usize) -> Result<WktValue, String> {
        match self.peek() {
            Some(b'"') => self.quoted().map(WktValue::Text),
            Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.') => {
                self.number().map(WktValue::Number)
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                self.node(depth + 1).map(WktValue::Node)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Chaîne entre guillemets, `""` pour un guillemet
    fn quoted(&mut self) -> Result<String, String> {
        let mut result = String::new();
        self.pos += 1;
        loop {
            let Some(offset) = memchr(b'"', &self.bytes[self.pos..]) else {
                return Err("unterminated quoted string".to_string());
            };
            let end = self.pos + offset;
            result.push_str(&self.text[self.pos..end]);
            self.pos = end + 1;
            if self.peek() == Some(b'"') {
                result.push('"');
                self.pos += 1;
            } else {
                return Ok(result);
            }
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let literal = &self.text[start..self.pos];
        fast_float::parse(literal).map_err(|_| format!("invalid number \"{}\"", literal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RD_NEW: &str = r#"PROJCS["Amersfoort / RD New",GEOGCS["Amersfoort",DATUM["Amersfoort",SPHEROID["Bessel 1841",6377397.155,299.1528128,AUTHORITY["EPSG","7004"]],AUTHORITY["EPSG","6289"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4289"]],PROJECTION["Oblique_Stereographic"],PARAMETER["latitude_of_origin",52.15616055555555],PARAMETER["central_meridian",5.38763888888889],PARAMETER["scale_factor",0.9999079],PARAMETER["false_easting",155000],PARAMETER["false_northing",463000],UNIT["metre",1],AXIS["X",EAST],AXIS["Y",NORTH],AUTHORITY["EPSG","28992"]]"#;

    fn header_with_wkt(wkt: &str) -> Header {
        let mut header = Header::default();
        header
            .metadata
            .insert(COORDINATE_SYSTEM_BLOCK.to_string(), vec![wkt.to_string()]);
        header
    }

    #[test]
    fn test_from_srs_forms() {
        for srs in [
            "EPSG:28992",
            "epsg:28992",
            "urn:ogc:def:crs:EPSG::28992",
            "urn:ogc:def:crs:EPSG:6.6:28992",
            "http://www.opengis.net/def/crs/EPSG/0/28992",
            "http://www.opengis.net/gml/srs/epsg.xml#28992",
        ] {
            let crs = Crs::from_srs(srs).unwrap();
            assert_eq!(crs.epsg(), Some(28992), "{}", srs);
            assert_eq!(crs.srs_identifier().as_deref(), Some("EPSG:28992"));
            assert!(crs.wkt().is_none());
        }

        let crs = Crs::from_srs("CRS:84").unwrap();
        assert_eq!(crs.epsg(), None);
        assert_eq!(crs.srs_identifier().as_deref(), Some("CRS:84"));
    }

    #[test]
    fn test_from_srs_invalid() {
        for srs in ["", "28992", "EPSG:abc", "FOO:1234", "EPSG:", "urn:ogc:def:crs:EPSG"] {
            match Crs::from_srs(srs) {
                Err(SdlError::InvalidSrs(value)) => assert_eq!(value, srs),
                other => panic!("Expected InvalidSrs for {:?}, got {:?}", srs, other),
            }
        }
    }

    #[test]
    fn test_from_wkt_projcs() {
        let crs = Crs::from_wkt(RD_NEW).unwrap();
        assert_eq!(crs.name(), Some("Amersfoort / RD New"));
        assert_eq!(crs.epsg(), Some(28992));
        assert_eq!(crs.wkt(), Some(RD_NEW));

        let CrsDefinition::Wkt { root, .. } = crs.definition() else {
            panic!("Expected WKT definition");
        };
        assert_eq!(root.keyword, "PROJCS");
        let geogcs = root.child("geogcs").unwrap();
        assert_eq!(geogcs.first_text(), Some("Amersfoort"));
        let axis = root.child("AXIS").unwrap();
        assert_eq!(
            axis.values[1],
            WktValue::Node(WktNode {
                keyword: "EAST".to_string(),
                values: vec![]
            })
        );
    }

    #[test]
    fn test_from_wkt2_with_id() {
        let wkt = r#"GEOGCRS["WGS 84", DATUM["World Geodetic System 1984", ELLIPSOID["WGS 84", 6378137, 298.257223563]], CS[ellipsoidal, 2], ID["EPSG", 4326]]"#;
        let crs = Crs::from_wkt(wkt).unwrap();
        assert_eq!(crs.name(), Some("WGS 84"));
        assert_eq!(crs.epsg(), Some(4326));
    }

    #[test]
    fn test_from_wkt_without_authority() {
        let crs = Crs::from_wkt(r#"LOCAL_CS["Site grid", UNIT("metre", 1)]"#).unwrap();
        assert_eq!(crs.name(), Some("Site grid"));
        assert!(crs.authority().is_none());
        assert_eq!(crs.to_string(), "Site grid");
    }

    #[test]
    fn test_quoted_escape() {
        let node = parse_wkt(r#"LOCAL_CS["the ""best"" grid"]"#).unwrap();
        assert_eq!(node.first_text(), Some(r#"the "best" grid"#));
    }

    #[test]
    fn test_from_wkt_invalid() {
        for wkt in [
            "",
            "GEOGCS[\"WGS 84\"",
            "GEOGCS[\"WGS 84\"]]",
            "GEOGCS[\"WGS 84]",
            "GEOGCS[\"WGS 84\",]",
            "GEOGCS[\"WGS 84\",1.2.3]",
            "POINT(1 2)",
            "UNIT[\"metre\",1]",
        ] {
            match Crs::from_wkt(wkt) {
                Err(SdlError::InvalidWkt { wkt: text, .. }) => assert_eq!(text, wkt),
                other => panic!("Expected InvalidWkt for {:?}, got {:?}", wkt, other),
            }
        }
    }

    #[test]
    fn test_resolve_precedence() {
        let header = header_with_wkt(RD_NEW);

        let crs = resolve(Some("EPSG:4326"), &header).unwrap().unwrap();
        assert_eq!(crs, Crs::from_srs("EPSG:4326").unwrap());
        assert_eq!(crs.epsg(), Some(4326));

        let crs = resolve(None, &header).unwrap().unwrap();
        assert_eq!(crs.epsg(), Some(28992));

        assert!(resolve(None, &Header::default()).unwrap().is_none());
    }

    #[test]
    fn test_resolve_override_skips_invalid_wkt() {
        let header = header_with_wkt("not wkt at all");
        assert!(resolve(Some("EPSG:28992"), &header).is_ok());
        assert!(matches!(
            resolve(None, &header),
            Err(SdlError::InvalidWkt { .. })
        ));
    }

    #[test]
    fn test_resolve_invalid_override() {
        let result = resolve(Some("EPSG:x"), &Header::default());
        assert!(matches!(result, Err(SdlError::InvalidSrs(_))));
    }
}
