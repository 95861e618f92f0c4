//! Export d'un fichier SDL vers GeoJSON

pub mod geojson;
pub mod reproject;

pub use geojson::FeatureCollectionWriter;
pub use reproject::Reprojector;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use sdl::crs::Authority;
use sdl::source::type_name_from_locator;
use sdl::{FeatureReader, ReaderOptions};

use crate::report::ExportReport;

/// Paramètres d'export communs à tous les fichiers
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Options de lecture (SRS imposé, encodage)
    pub reader: ReaderOptions,
    /// SRID cible ; pas de reprojection si absent
    pub target_srid: Option<u32>,
    /// N'écrit pas les enregistrements `parseError = 1`
    pub skip_errors: bool,
}

/// Exporte un fichier SDL vers `<output>/<type_name>.geojson`
///
/// Retourne le chemin écrit et le rapport du fichier.
pub fn export_file(
    path: &Path,
    output: &Path,
    options: &ExportOptions,
) -> Result<(PathBuf, ExportReport)> {
    let type_name = options
        .reader
        .type_name
        .clone()
        .unwrap_or_else(|| type_name_from_locator(&path.to_string_lossy()));
    let output_file = output.join(format!("{}.geojson", type_name));
    let report = export_file_to(path, &output_file, options)?;
    Ok((output_file, report))
}

/// Exporte un fichier SDL vers un fichier GeoJSON donné
pub fn export_file_to(
    path: &Path,
    output_file: &Path,
    options: &ExportOptions,
) -> Result<ExportReport> {
    let locator = path.to_string_lossy();
    let mut reader = FeatureReader::open(&locator, &options.reader)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let type_name = reader.schema().type_name().to_string();

    let reprojector = options
        .target_srid
        .map(|srid| {
            reproject::source_epsg(reader.crs()).and_then(|epsg| Reprojector::new(epsg, srid))
        })
        .transpose()?;

    let authority = match options.target_srid {
        Some(srid) => Some(Authority {
            name: "EPSG".to_string(),
            code: srid.to_string(),
        }),
        None => reader.crs().and_then(|crs| crs.authority().cloned()),
    };

    let mut writer = FeatureCollectionWriter::create(output_file, &type_name, authority.as_ref())?;
    let mut report = ExportReport::new();

    while let Some(mut feature) = reader
        .next_feature()
        .with_context(|| format!("Failed to read {}", path.display()))?
    {
        report.record_feature(&locator, &feature);

        if options.skip_errors && feature.parse_error {
            report.record_skipped();
            continue;
        }
        if let Some(reprojector) = &reprojector {
            feature.geometry = reprojector.transform(feature.geometry.as_ref())?;
        }

        writer.write_feature(&feature)?;
        report.record_written();
    }

    writer.finish()?;
    report.record_file_success(reader.bytes_read());
    reader.close();

    debug!(file = %path.display(), summary = %report.summary(), "File exported");
    info!(
        "Exported {} records from {} to {}",
        report.written,
        path.display(),
        output_file.display()
    );

    Ok(report)
}
