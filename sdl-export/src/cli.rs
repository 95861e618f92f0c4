//! Définition et implémentation des commandes CLI
//!
//! - `to-geojson` : SDL → GeoJSON, un fichier par type
//! - `info` : en-tête, CRS, schéma et rapport d'ingestion d'un fichier

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use sdl::source::{is_sdl_file, type_name_from_locator};
use sdl::{FeatureReader, ReaderOptions};

use crate::export::{export_file_to, ExportOptions};
use crate::report::ExportReport;

#[derive(Subcommand)]
pub enum Commands {
    /// Export SDL files to GeoJSON (one file per type)
    ToGeojson(ToGeojsonArgs),

    /// Print header, CRS, schema and ingestion report of a SDL file
    Info(InfoArgs),
}

/// Options de lecture partagées par les commandes
#[derive(Args, Clone, Debug, Default)]
pub struct ReadArgs {
    /// Override CRS (EPSG:28992, urn:ogc:def:crs:EPSG::28992...). Défaut : env SDL_SRS
    #[arg(long)]
    pub srs: Option<String>,

    /// Text encoding label (windows-1252, utf-8...). Défaut : env SDL_ENCODING / windows-1252
    #[arg(long)]
    pub encoding: Option<String>,
}

impl ReadArgs {
    /// Fusionne les arguments avec l'environnement (les arguments priment)
    pub fn reader_options(&self) -> Result<ReaderOptions> {
        let mut options = ReaderOptions::from_env().context("Invalid SDL_* environment")?;
        if let Some(srs) = &self.srs {
            options.srs = Some(srs.clone());
        }
        if let Some(label) = &self.encoding {
            options.encoding = sdl::reader::encoding_for_label(label)?;
        }
        Ok(options)
    }
}

#[derive(Args, Debug)]
pub struct ToGeojsonArgs {
    /// Path to a SDL file (.sdl, .sdl.bz2) or a directory
    #[arg(short, long)]
    pub path: PathBuf,

    /// Output directory for GeoJSON files
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub read: ReadArgs,

    /// Target SRID for reprojection (requires the `reproject` feature)
    #[arg(long)]
    pub srid: Option<u32>,

    /// Do not write records flagged with parseError
    #[arg(long)]
    pub skip_errors: bool,

    /// Save the ingestion report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Path to a SDL file
    #[arg(short, long)]
    pub path: PathBuf,

    #[command(flatten)]
    pub read: ReadArgs,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exécute la commande to-geojson
pub fn cmd_export(args: &ToGeojsonArgs) -> Result<ExportReport> {
    let started_at = Instant::now();
    let options = ExportOptions {
        reader: args.read.reader_options()?,
        target_srid: args.srid,
        skip_errors: args.skip_errors,
    };

    let files = collect_sdl_files(&args.path)?;
    if files.is_empty() {
        anyhow::bail!("No SDL files (.sdl, .sdl.bz2) found in {}", args.path.display());
    }
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;

    let targets = output_files(&args.path, &files, &args.output)?;

    info!(files = files.len(), output = %args.output.display(), "Starting export");

    // Un lecteur par fichier, les rapports sont agrégés à la fin
    let total = Mutex::new(ExportReport::new());
    targets.par_iter().for_each(|(file, target)| {
        let report = match export_file_to(file, target, &options) {
            Ok(report) => report,
            Err(e) => {
                warn!("Failed to export {}: {:#}", file.display(), e);
                let mut report = ExportReport::new();
                report.record_file_failure(&file.to_string_lossy(), &format!("{:#}", e));
                report
            }
        };
        if let Ok(mut total) = total.lock() {
            total.merge(report);
        }
    });

    let mut report = total
        .into_inner()
        .map_err(|_| anyhow::anyhow!("Report lock poisoned"))?;
    report.set_duration(started_at.elapsed());
    report.finalize();

    let epsg_info = args
        .srid
        .map(|s| format!(" (EPSG:{})", s))
        .unwrap_or_default();
    println!(
        "Export complete: {}/{} files, {}{}",
        report.files_processed - report.files_failed,
        files.len(),
        report.summary(),
        epsg_info
    );

    if let Some(path) = &args.report {
        report
            .save_to_file(path)
            .with_context(|| format!("Cannot write report {}", path.display()))?;
        info!(report = %path.display(), "Report saved");
    }

    Ok(report)
}

/// Associe à chaque fichier son GeoJSON de sortie
///
/// Le nom de type sert de nom de fichier. Quand deux sources d'un répertoire
/// portent le même nom de type, leur chemin relatif est préfixé
/// (`a/wegen.sdl` → `a_wegen.geojson`). Une collision restante est une erreur.
pub fn output_files(
    root: &Path,
    files: &[PathBuf],
    output: &Path,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let type_names: Vec<String> = files
        .iter()
        .map(|file| type_name_from_locator(&file.to_string_lossy()))
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in &type_names {
        *counts.entry(name.to_lowercase()).or_default() += 1;
    }

    let mut seen: HashMap<String, &Path> = HashMap::new();
    let mut targets = Vec::with_capacity(files.len());
    for (file, type_name) in files.iter().zip(type_names) {
        let stem = if counts[&type_name.to_lowercase()] > 1 {
            qualified_name(root, file, &type_name)
        } else {
            type_name
        };
        if let Some(other) = seen.insert(stem.to_lowercase(), file.as_path()) {
            anyhow::bail!(
                "{} and {} would both be exported to {}.geojson",
                other.display(),
                file.display(),
                stem
            );
        }
        targets.push((file.clone(), output.join(format!("{}.geojson", stem))));
    }
    Ok(targets)
}

/// Nom de type préfixé des répertoires relatifs à `root`
fn qualified_name(root: &Path, file: &Path, type_name: &str) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(|parent| parent.components())
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.push(type_name.to_string());
    parts.join("_")
}

/// Description d'un fichier pour la commande info
#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub type_name: String,
    pub version: Option<String>,
    pub metadata_blocks: Vec<String>,
    pub crs: Option<String>,
    pub epsg: Option<u32>,
    pub attributes: Vec<String>,
    pub report: ExportReport,
}

/// Lit un fichier entier et décrit son contenu
pub fn inspect(path: &Path, options: &ReaderOptions) -> Result<FileInfo> {
    let started_at = Instant::now();
    let locator = path.to_string_lossy();
    let mut reader = FeatureReader::open(&locator, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut report = ExportReport::new();
    while let Some(feature) = reader.next_feature()? {
        report.record_feature(&locator, &feature);
    }
    report.record_file_success(reader.bytes_read());
    report.set_duration(started_at.elapsed());
    report.finalize();

    let mut metadata_blocks: Vec<String> = reader.header().metadata.keys().cloned().collect();
    metadata_blocks.sort();

    let info = FileInfo {
        type_name: reader.schema().type_name().to_string(),
        version: reader.header().version.clone(),
        metadata_blocks,
        crs: reader.crs().map(ToString::to_string),
        epsg: reader.crs().and_then(|crs| crs.epsg()),
        attributes: reader
            .schema()
            .attributes()
            .iter()
            .map(|a| format!("{}: {:?}", a.name, a.binding))
            .collect(),
        report,
    };
    reader.close();
    Ok(info)
}

/// Exécute la commande info
pub fn cmd_info(args: &InfoArgs) -> Result<()> {
    let info = inspect(&args.path, &args.read.reader_options()?)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("=== {} ===", args.path.display());
    println!("Type: {}", info.type_name);
    println!("Version: {}", info.version.as_deref().unwrap_or("-"));
    println!("Metadata blocks: {}", info.metadata_blocks.join(", "));
    println!("CRS: {}", info.crs.as_deref().unwrap_or("none"));
    println!("Schema:");
    for attribute in &info.attributes {
        println!("  {}", attribute);
    }
    info.report.display();

    Ok(())
}

/// Collecte récursivement les fichiers SDL
pub fn collect_sdl_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(files);
    }

    for entry in std::fs::read_dir(path).with_context(|| format!("Cannot read {}", path.display()))? {
        let entry_path = entry?.path();

        if entry_path.is_dir() {
            files.extend(collect_sdl_files(&entry_path)?);
        } else if is_sdl_file(&entry_path) {
            files.push(entry_path);
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sdl-cli-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_collect_sdl_files() {
        let dir = temp_dir("collect");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("a.sdl"), "").unwrap();
        std::fs::write(dir.join("sub/b.SDL"), "").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();

        let files = collect_sdl_files(&dir).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_sdl_file(f)));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_cmd_export_directory() {
        let dir = temp_dir("export");
        let input = dir.join("input");
        let output = dir.join("output");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("punten.sdl"), "P,\"K1\",\"a\",\"\"\n1\n1,2\n").unwrap();
        std::fs::write(input.join("wegen.sdl"), "L,\"K1\",\"a\",\"\"\n1\n1,2\n").unwrap();

        let args = ToGeojsonArgs {
            path: input,
            output: output.clone(),
            read: ReadArgs {
                srs: Some("EPSG:28992".into()),
                encoding: None,
            },
            srid: None,
            skip_errors: false,
            report: Some(dir.join("report.json")),
        };
        let report = cmd_export(&args).unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.records, 2);
        // Une ligne à une seule coordonnée est signalée
        assert_eq!(report.parse_errors, 1);
        assert!(output.join("punten.geojson").exists());
        assert!(output.join("wegen.geojson").exists());
        assert!(dir.join("report.json").exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_cmd_export_same_type_name_in_subdirectories() {
        let dir = temp_dir("collide");
        let input = dir.join("input");
        let output = dir.join("output");
        std::fs::create_dir_all(input.join("a")).unwrap();
        std::fs::create_dir_all(input.join("b")).unwrap();
        std::fs::write(input.join("a/wegen.sdl"), "P,\"A1\",\"a\",\"\"\n1\n1,2\n").unwrap();
        std::fs::write(
            input.join("b/wegen.sdl"),
            "P,\"B1\",\"b\",\"\"\n1\n1,2\nP,\"B2\",\"b\",\"\"\n1\n3,4\n",
        )
        .unwrap();

        let args = ToGeojsonArgs {
            path: input,
            output: output.clone(),
            read: ReadArgs::default(),
            srid: None,
            skip_errors: false,
            report: None,
        };
        let report = cmd_export(&args).unwrap();
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.written, 3);

        let a = std::fs::read_to_string(output.join("a_wegen.geojson")).unwrap();
        let b = std::fs::read_to_string(output.join("b_wegen.geojson")).unwrap();
        assert!(a.contains("A1"));
        assert!(b.contains("B1") && b.contains("B2"));
        assert!(!output.join("wegen.geojson").exists());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_output_files_unique_names_are_kept() {
        let root = Path::new("/data");
        let files = vec![
            PathBuf::from("/data/x/wegen.sdl"),
            PathBuf::from("/data/y/panden.sdl.bz2"),
        ];
        let targets = output_files(root, &files, Path::new("/out")).unwrap();
        assert_eq!(targets[0].1, PathBuf::from("/out/wegen.geojson"));
        assert_eq!(targets[1].1, PathBuf::from("/out/panden.geojson"));
    }

    #[test]
    fn test_output_files_unresolved_collision() {
        let root = Path::new("/data");
        let files = vec![
            PathBuf::from("/data/a_b/wegen.sdl"),
            PathBuf::from("/data/a/b_wegen.sdl"),
            PathBuf::from("/data/a/b/wegen.sdl"),
        ];
        assert!(output_files(root, &files, Path::new("/out")).is_err());
    }

    #[test]
    fn test_inspect() {
        let dir = temp_dir("inspect");
        let path = dir.join("gebouwen.sdl");
        std::fs::write(
            &path,
            "#VERSION=2.0\n#METADATA_BEGIN=Remarks\n#hello\n#METADATA_END\nP,\"K1\",\"a\",\"\"\n1\n1,2\n",
        )
        .unwrap();

        let info = inspect(&path, &ReaderOptions::default()).unwrap();
        assert_eq!(info.type_name, "gebouwen");
        assert_eq!(info.version.as_deref(), Some("2.0"));
        assert_eq!(info.metadata_blocks, vec!["remarks".to_string()]);
        assert!(info.crs.is_none());
        assert_eq!(info.attributes.len(), 7);
        assert_eq!(info.report.records, 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_path() {
        assert!(collect_sdl_files(Path::new("/nonexistent/sdl")).is_err());
    }
}
