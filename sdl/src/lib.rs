//! # sdl
//!
//! Lecteur en flux du format texte SDL (Autodesk SDF Loader).
//!
//! ## Features
//!
//! - Lecture ligne à ligne avec une ligne d'avance, sans retour arrière
//! - En-tête `#version` et blocs `#metadata_begin` / `#metadata_end`
//! - CRS imposé par l'appelant ou WKT embarqué dans les métadonnées
//! - Un enregistrement mal formé devient un enregistrement en erreur
//!   (`parseError = 1`), la lecture continue
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sdl::{FeatureReader, ReaderOptions};
//!
//! let options = ReaderOptions::default().with_srs("EPSG:28992");
//! let mut reader = FeatureReader::open("wegen.sdl", &options)?;
//! println!("Type: {}", reader.schema().type_name());
//!
//! while let Some(feature) = reader.next_feature()? {
//!     if feature.parse_error {
//!         eprintln!("{}: {:?}", feature.entry_line_number, feature.error);
//!     }
//! }
//! reader.close();
//! ```

pub mod assemble;
pub mod crs;
pub mod datastore;
pub mod error;
pub mod parser;
pub mod reader;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod types;

pub use crs::Crs;
pub use datastore::SdlDataStore;
pub use error::{EntryError, ErrorCategory, SdlError};
pub use reader::{FeatureReader, ReaderOptions};
pub use schema::Schema;
pub use types::{Feature, GeometryKind, Header};

use std::io::Read;

/// Ouvre un fichier SDL (chemin ou URL `file://`) avec un CRS optionnel
pub fn open(
    locator: &str,
    srs: Option<&str>,
) -> Result<FeatureReader<Box<dyn Read + Send>>, SdlError> {
    let options = ReaderOptions {
        srs: srs.map(str::to_string),
        ..ReaderOptions::default()
    };
    FeatureReader::open(locator, &options)
}

/// Lit tous les enregistrements d'un flux en mémoire
///
/// Pratique pour les petits fichiers et les tests ; préférer l'itération
/// pour les gros volumes.
pub fn read_all<R: Read>(
    reader: R,
    options: &ReaderOptions,
) -> Result<(Schema, Vec<Feature>), SdlError> {
    let mut reader = FeatureReader::from_reader(reader, options)?;
    let mut features = Vec::new();
    while let Some(feature) = reader.next_feature()? {
        features.push(feature);
    }
    let schema = reader.schema().clone();
    reader.close();
    Ok((schema, features))
}
