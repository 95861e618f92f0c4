//! Export vers GeoJSON avec geozero (streaming)
//!
//! Les enregistrements sont écrits au fil de la lecture : le fichier n'est
//! jamais chargé entièrement en mémoire.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::{Map, Value};

use sdl::crs::Authority;
use sdl::Feature;

/// Nom du CRS GeoJSON (`urn:ogc:def:crs:EPSG::28992`)
pub fn crs_urn(authority: &Authority) -> String {
    format!("urn:ogc:def:crs:{}::{}", authority.name, authority.code)
}

/// Écrit une FeatureCollection enregistrement par enregistrement
pub struct FeatureCollectionWriter<W: Write> {
    writer: W,
    type_name: String,
    count: usize,
}

impl FeatureCollectionWriter<BufWriter<File>> {
    /// Crée le fichier de sortie
    pub fn create(path: &Path, type_name: &str, crs: Option<&Authority>) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        Self::new(BufWriter::new(file), type_name, crs)
    }
}

impl<W: Write> FeatureCollectionWriter<W> {
    /// Écrit l'en-tête de la collection, avec le membre `crs` si connu
    pub fn new(mut writer: W, type_name: &str, crs: Option<&Authority>) -> Result<Self> {
        write!(writer, r#"{{"type":"FeatureCollection","name":"#)?;
        serde_json::to_writer(&mut writer, type_name)?;
        if let Some(authority) = crs {
            write!(writer, r#","crs":{{"type":"name","properties":{{"name":"#)?;
            serde_json::to_writer(&mut writer, &crs_urn(authority))?;
            write!(writer, "}}}}")?;
        }
        write!(writer, r#","features":["#)?;

        Ok(Self {
            writer,
            type_name: type_name.to_string(),
            count: 0,
        })
    }

    /// Écrit un enregistrement ; géométrie `null` si absente
    pub fn write_feature(&mut self, feature: &Feature) -> Result<()> {
        if self.count > 0 {
            write!(self.writer, ",")?;
        }

        write!(self.writer, r#"{{"type":"Feature","id":"#)?;
        serde_json::to_writer(&mut self.writer, &feature.fid(&self.type_name))?;

        write!(self.writer, r#","geometry":"#)?;
        match &feature.geometry {
            Some(geometry) => {
                let mut geom_buf = Vec::new();
                let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
                geometry.process_geom(&mut geom_writer)?;
                self.writer.write_all(&geom_buf)?;
            }
            None => write!(self.writer, "null")?,
        }

        write!(self.writer, r#","properties":"#)?;
        serde_json::to_writer(&mut self.writer, &properties(feature))?;
        write!(self.writer, "}}")?;

        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Ferme la collection et rend le flux de sortie
    pub fn finish(mut self) -> Result<W> {
        write!(self.writer, "]}}")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Attributs de l'enregistrement, dans l'ordre du schéma
fn properties(feature: &Feature) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("name".into(), Value::from(feature.name.as_str()));
    props.insert("key".into(), Value::from(feature.key.as_str()));
    props.insert("urlLink".into(), Value::from(feature.url_link.as_str()));
    props.insert(
        "entryLineNumber".into(),
        Value::from(feature.entry_line_number),
    );
    props.insert("parseError".into(), Value::from(feature.parse_error_flag()));
    props.insert(
        "error".into(),
        feature
            .error
            .as_deref()
            .map_or(Value::Null, Value::from),
    );
    props
}
