//! Types d'erreurs pour le crate sdl

use thiserror::Error;

/// Erreurs fatales pouvant survenir lors de la lecture d'un fichier SDL
///
/// Les erreurs propres à un enregistrement ne passent jamais par ce type :
/// elles sont portées par l'enregistrement lui-même (voir [`EntryError`]).
#[derive(Debug, Error)]
pub enum SdlError {
    /// Erreur d'I/O du flux sous-jacent
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ligne plus longue que le tampon de lecture anticipée
    #[error("Line {line} exceeds the {limit} bytes lookahead limit")]
    LineTooLong { line: u64, limit: usize },

    /// Lecture sur un flux déjà fermé
    #[error("Stream is closed")]
    Closed,

    /// Identifiant de système de référence invalide (paramètre `srs`)
    #[error("Error parsing CoordinateSystem srs: \"{0}\"")]
    InvalidSrs(String),

    /// Libellé d'encodage inconnu
    #[error("Unknown text encoding: \"{0}\"")]
    UnknownEncoding(String),

    /// WKT du bloc de métadonnées CoordinateSystem invalide
    #[error("Error parsing CoordinateSystem WKT: \"{wkt}\" ({reason})")]
    InvalidWkt { wkt: String, reason: String },

    /// Impossible de construire le schéma des enregistrements
    #[error("Error creating feature schema: {0}")]
    Schema(String),

    /// Localisation de la source inutilisable
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// Opération d'écriture sur une source en lecture seule
    #[error("{0} is not supported for read-only source")]
    Unsupported(&'static str),
}

/// Catégorie d'une erreur fatale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Flux illisible, ligne trop longue ou flux fermé
    StreamIo,
    /// Paramétrage invalide (système de référence, encodage)
    Configuration,
    /// Construction du schéma impossible
    SchemaConstruction,
    /// Opération non supportée par une source en lecture seule
    Unsupported,
}

impl SdlError {
    /// Classe l'erreur dans la taxonomie des erreurs fatales
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) | Self::LineTooLong { .. } | Self::Closed | Self::InvalidSource(_) => {
                ErrorCategory::StreamIo
            }
            Self::InvalidSrs(_) | Self::InvalidWkt { .. } | Self::UnknownEncoding(_) => {
                ErrorCategory::Configuration
            }
            Self::Schema(_) => ErrorCategory::SchemaConstruction,
            Self::Unsupported(_) => ErrorCategory::Unsupported,
        }
    }

    /// Crée une erreur de WKT avec contexte
    pub fn invalid_wkt(wkt: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidWkt {
            wkt: wkt.into(),
            reason: reason.into(),
        }
    }
}

/// Défaut de structure d'un enregistrement (non fatal)
///
/// Le message devient l'attribut `error` de l'enregistrement produit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("line {line}: expected a record header, found \"{text}\"")]
    ExpectedHeader { line: u64, text: String },

    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: u64 },

    #[error("line {line}: unknown geometry kind \"{token}\"")]
    UnknownKind { line: u64, token: String },

    #[error("line {line}: missing record key")]
    MissingKey { line: u64 },

    #[error("line {line}: unexpected token \"{token}\"")]
    UnexpectedToken { line: u64, token: String },

    #[error("line {line}: invalid coordinate count \"{text}\"")]
    InvalidCount { line: u64, text: String },

    #[error("line {line}: invalid coordinate \"{text}\"")]
    InvalidCoordinate { line: u64, text: String },

    #[error("line {line}: expected {expected} coordinates, found {found}")]
    Truncated {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: record has no coordinates")]
    NoCoordinates { line: u64 },
}
