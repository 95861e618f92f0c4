//! # sdl-export
//!
//! Export de fichiers SDL (Autodesk SDF Loader) vers GeoJSON, avec rapport
//! d'ingestion.
//!
//! ## Features
//!
//! - Lecture en flux, un lecteur par fichier, fichiers traités en parallèle
//! - Enregistrements en erreur exportés avec `parseError = 1` (ou écartés)
//! - Reprojection optionnelle avec PROJ (feature `reproject`)
//! - Rapport console ou JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Export GeoJSON
//! sdl-export to-geojson --path ./wegen.sdl --output ./geojson/ --srs EPSG:28992
//! sdl-export to-geojson --path ./folder/ --output ./geojson/ --skip-errors --report report.json
//!
//! # Inspection
//! sdl-export info --path ./wegen.sdl --json
//! ```

pub mod cli;
pub mod export;
pub mod report;

pub use export::{export_file, ExportOptions};
pub use report::{ExportReport, ExportStatus};
