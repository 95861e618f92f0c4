//! Rapport d'ingestion
//!
//! Collecte les compteurs d'un ou plusieurs fichiers SDL : enregistrements,
//! erreurs de parsing, géométries absentes, répartition par type.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use geo::Geometry;
use serde::Serialize;

use sdl::Feature;

/// Nombre d'erreurs affichées par [`ExportReport::display`]
const DISPLAYED_ERRORS: usize = 20;

/// Statut global de l'export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStatus {
    /// Tous les enregistrements sont sains
    Success,
    /// Des enregistrements sont en erreur, ou certains fichiers ont échoué
    PartialSuccess,
    /// Aucun fichier n'a pu être lu
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Fichier abandonné
    Fatal,
    /// Enregistrement marqué `parseError`
    Record,
}

/// Erreur avec contexte
#[derive(Debug, Clone, Serialize)]
pub struct ExportError {
    pub level: ErrorLevel,
    /// Fichier source
    pub source: String,
    /// Clé de l'enregistrement (optionnel)
    pub key: Option<String>,
    /// Première ligne de l'enregistrement (optionnel)
    pub line: Option<u64>,
    pub message: String,
}

/// Statistiques par type de géométrie
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub records: usize,
    pub parse_errors: usize,
}

/// Rapport complet
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub duration_secs: f64,
    pub status: ExportStatus,

    pub files_processed: usize,
    pub files_failed: usize,

    /// Enregistrements lus
    pub records: usize,
    /// Enregistrements écrits (hors `--skip-errors`)
    pub written: usize,
    /// Enregistrements écartés par `--skip-errors`
    pub skipped: usize,
    pub parse_errors: usize,
    pub null_geometries: usize,
    pub bytes_read: u64,

    /// Statistiques par type (Point, Line, Polygon, None)
    pub by_kind: BTreeMap<String, KindStats>,

    pub errors: Vec<ExportError>,
}

impl Default for ExportReport {
    fn default() -> Self {
        Self {
            duration_secs: 0.0,
            status: ExportStatus::Success,
            files_processed: 0,
            files_failed: 0,
            records: 0,
            written: 0,
            skipped: 0,
            parse_errors: 0,
            null_geometries: 0,
            bytes_read: 0,
            by_kind: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Libellé du type porté par une géométrie assemblée
pub fn kind_label(geometry: Option<&Geometry>) -> &'static str {
    match geometry {
        Some(Geometry::Point(_)) => "Point",
        Some(Geometry::MultiLineString(_)) => "Line",
        Some(Geometry::MultiPolygon(_)) => "Polygon",
        Some(_) => "Other",
        None => "None",
    }
}

impl ExportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enregistre un enregistrement lu
    pub fn record_feature(&mut self, source: &str, feature: &Feature) {
        self.records += 1;
        if feature.geometry.is_none() {
            self.null_geometries += 1;
        }

        let stats = self
            .by_kind
            .entry(kind_label(feature.geometry.as_ref()).to_string())
            .or_default();
        stats.records += 1;

        if feature.parse_error {
            stats.parse_errors += 1;
            self.parse_errors += 1;
            self.errors.push(ExportError {
                level: ErrorLevel::Record,
                source: source.to_string(),
                key: Some(feature.key.clone()),
                line: Some(feature.entry_line_number),
                message: feature.error.clone().unwrap_or_default(),
            });
        }
    }

    pub fn record_written(&mut self) {
        self.written += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Enregistre un fichier lu jusqu'au bout
    pub fn record_file_success(&mut self, bytes_read: u64) {
        self.files_processed += 1;
        self.bytes_read += bytes_read;
    }

    /// Enregistre un fichier abandonné sur erreur fatale
    pub fn record_file_failure(&mut self, source: &str, message: &str) {
        self.files_processed += 1;
        self.files_failed += 1;
        self.errors.push(ExportError {
            level: ErrorLevel::Fatal,
            source: source.to_string(),
            key: None,
            line: None,
            message: message.to_string(),
        });
    }

    /// Agrège le rapport d'un autre fichier
    pub fn merge(&mut self, other: ExportReport) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.records += other.records;
        self.written += other.written;
        self.skipped += other.skipped;
        self.parse_errors += other.parse_errors;
        self.null_geometries += other.null_geometries;
        self.bytes_read += other.bytes_read;
        for (kind, stats) in other.by_kind {
            let entry = self.by_kind.entry(kind).or_default();
            entry.records += stats.records;
            entry.parse_errors += stats.parse_errors;
        }
        self.errors.extend(other.errors);
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final
    pub fn finalize(&mut self) {
        let all_failed = self.files_processed > 0 && self.files_failed == self.files_processed;

        self.status = if all_failed {
            ExportStatus::Failed
        } else if self.files_failed > 0 || self.parse_errors > 0 {
            ExportStatus::PartialSuccess
        } else {
            ExportStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SDL INGESTION REPORT");
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);

        println!("\n--- SUMMARY ---");
        println!(
            "Files: {} processed, {} failed",
            self.files_processed, self.files_failed
        );
        println!(
            "Records: {} read, {} written, {} skipped",
            self.records, self.written, self.skipped
        );
        println!(
            "Parse errors: {}, null geometries: {}",
            self.parse_errors, self.null_geometries
        );
        println!("Bytes read: {}", self.bytes_read);

        if !self.by_kind.is_empty() {
            println!("\n--- BY KIND ---");
            for (kind, stats) in &self.by_kind {
                println!(
                    "  {}: {} records, {} parse errors",
                    kind, stats.records, stats.parse_errors
                );
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(DISPLAYED_ERRORS) {
                let location = match (&e.key, e.line) {
                    (Some(key), Some(line)) => format!("[{}:{} {}]", e.source, line, key),
                    _ => format!("[{}]", e.source),
                };
                println!("  {:?} {} {}", e.level, location, e.message);
            }
            if self.errors.len() > DISPLAYED_ERRORS {
                println!("  ... and {} more", self.errors.len() - DISPLAYED_ERRORS);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{} records ({} parse errors, {} null geometries) from {} file(s)",
            self.records, self.parse_errors, self.null_geometries, self.files_processed
        )
    }
}
