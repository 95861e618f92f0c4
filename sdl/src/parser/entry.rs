//! Parser des enregistrements de la section de données
//!
//! Un enregistrement est une ligne d'en-tête `<type>,<clé>,<nom>,<url>` suivie
//! d'une ou plusieurs parties (ligne de comptage puis autant de lignes de
//! coordonnées). Tout défaut de structure est rendu dans l'`Entry` et le
//! parsing reprend à la prochaine ligne d'en-tête.

use std::io::Read;

use geo::Coord;

use crate::error::EntryError;
use crate::scanner::LineScanner;
use crate::types::{Entry, GeometryKind, RawGeometry};
use crate::SdlError;

/// Longueur maximale du texte cité dans un message d'erreur
const QUOTED_TEXT_LIMIT: usize = 60;

/// Parse l'enregistrement suivant
///
/// Retourne `Ok(None)` en fin de flux. Seules les erreurs du flux sont
/// remontées en `Err`.
pub fn parse<R: Read>(scanner: &mut LineScanner<R>) -> Result<Option<Entry>, SdlError> {
    let Some(first) = scanner.next_significant()? else {
        return Ok(None);
    };
    let line_number = first.number;

    let mut entry = Entry {
        key: String::new(),
        name: String::new(),
        url_link: String::new(),
        line_number,
        geometry: Err(EntryError::NoCoordinates { line: line_number }),
    };

    if !is_record_start(&first.text) {
        entry.geometry = Err(EntryError::ExpectedHeader {
            line: line_number,
            text: first.text.chars().take(QUOTED_TEXT_LIMIT).collect(),
        });
        resync(scanner)?;
        return Ok(Some(entry));
    }

    let fields = match split_fields(&first.text, line_number) {
        Ok(fields) => fields,
        Err(e) => {
            entry.geometry = Err(e);
            resync(scanner)?;
            return Ok(Some(entry));
        }
    };

    let mut values = fields.iter().skip(1).cloned();
    entry.key = values.next().unwrap_or_default();
    entry.name = values.next().unwrap_or_default();
    entry.url_link = values.next().unwrap_or_default();

    entry.geometry = match record_kind(&fields, line_number) {
        Ok(kind) => read_parts(scanner, line_number)?.map(|parts| RawGeometry::from_parts(kind, parts)),
        Err(e) => Err(e),
    };
    if entry.geometry.is_err() {
        resync(scanner)?;
    }

    Ok(Some(entry))
}

/// Une ligne d'en-tête commence par une lettre ou un guillemet
pub fn is_record_start(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '"')
}

/// Vrai si la prochaine ligne utile appartient au corps d'un enregistrement
fn next_is_body_line<R: Read>(scanner: &mut LineScanner<R>) -> Result<bool, SdlError> {
    Ok(scanner
        .peek_significant()?
        .is_some_and(|line| !is_record_start(&line.text)))
}

/// Consomme les lignes jusqu'au prochain en-tête ou la fin du flux
fn resync<R: Read>(scanner: &mut LineScanner<R>) -> Result<(), SdlError> {
    while next_is_body_line(scanner)? {
        scanner.next_significant()?;
    }
    Ok(())
}

/// Découpe une ligne d'en-tête en champs séparés par des virgules
///
/// Les champs peuvent être entre guillemets ; `""` y représente un guillemet.
fn split_fields(text: &str, line: u64) -> Result<Vec<String>, EntryError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    let mut chars = text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if !quoted && current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
                quoted = true;
            }
            ',' if !in_quotes => {
                fields.push(finish_field(std::mem::take(&mut current), quoted));
                quoted = false;
            }
            // Après le guillemet fermant, seuls les blancs sont tolérés
            c if quoted && !in_quotes => {
                if !c.is_whitespace() {
                    current.push(c);
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(EntryError::UnterminatedQuote { line });
    }
    fields.push(finish_field(current, quoted));

    Ok(fields)
}

fn finish_field(value: String, quoted: bool) -> String {
    if quoted {
        value
    } else {
        value.trim().to_string()
    }
}

/// Valide les champs d'en-tête et retourne le type de géométrie
fn record_kind(fields: &[String], line: u64) -> Result<GeometryKind, EntryError> {
    let token = fields.first().map(String::as_str).unwrap_or("");
    let kind = GeometryKind::from_token(token).ok_or_else(|| EntryError::UnknownKind {
        line,
        token: token.to_string(),
    })?;

    if fields.get(1).map_or(true, |key| key.is_empty()) {
        return Err(EntryError::MissingKey { line });
    }
    if let Some(extra) = fields.get(4) {
        return Err(EntryError::UnexpectedToken {
            line,
            token: extra.clone(),
        });
    }

    Ok(kind)
}

/// Lit les parties (comptage + coordonnées) d'un enregistrement
fn read_parts<R: Read>(
    scanner: &mut LineScanner<R>,
    line_number: u64,
) -> Result<Result<Vec<Vec<Coord>>, EntryError>, SdlError> {
    let mut parts = Vec::new();

    while next_is_body_line(scanner)? {
        let Some(count_line) = scanner.next_significant()? else {
            break;
        };
        let Some(expected) = parse_count(&count_line.text) else {
            return Ok(Err(EntryError::InvalidCount {
                line: count_line.number,
                text: count_line.text.trim().to_string(),
            }));
        };

        // Le comptage n'est pas fiable : capacité bornée
        let mut coords = Vec::with_capacity(expected.min(1024));
        while coords.len() < expected {
            let coord_line = if next_is_body_line(scanner)? {
                scanner.next_significant()?
            } else {
                None
            };
            let Some(coord_line) = coord_line else {
                return Ok(Err(EntryError::Truncated {
                    line: count_line.number,
                    expected,
                    found: coords.len(),
                }));
            };

            match parse_coord(&coord_line.text) {
                Some(coord) => coords.push(coord),
                None => {
                    return Ok(Err(EntryError::InvalidCoordinate {
                        line: coord_line.number,
                        text: coord_line.text.chars().take(QUOTED_TEXT_LIMIT).collect(),
                    }))
                }
            }
        }
        parts.push(coords);
    }

    if parts.is_empty() {
        return Ok(Err(EntryError::NoCoordinates { line: line_number }));
    }
    Ok(Ok(parts))
}

fn parse_count(text: &str) -> Option<usize> {
    text.trim().parse().ok()
}

/// Parse une ligne de coordonnées : `x,y` ou `x y`
fn parse_coord(text: &str) -> Option<Coord> {
    let text = text.trim();
    let mut tokens: Vec<&str> = if text.contains(',') {
        text.split(',').map(str::trim).collect()
    } else {
        text.split_whitespace().collect()
    };
    // Virgule finale tolérée
    if tokens.len() == 3 && tokens[2].is_empty() {
        tokens.pop();
    }
    if tokens.len() != 2 {
        return None;
    }

    let x = parse_number(tokens[0])?;
    let y = parse_number(tokens[1])?;
    Some(Coord { x, y })
}

#[inline]
fn parse_number(s: &str) -> Option<f64> {
    let value: f64 = fast_float::parse(s.trim_start_matches('+')).ok()?;
    value.is_finite().then_some(value)
}
