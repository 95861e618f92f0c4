//! Source de données SDL en lecture seule
//!
//! Un fichier SDL expose un seul type d'enregistrement. Le lecteur est créé
//! à la première demande puis réutilisé jusqu'à [`SdlDataStore::dispose`].

use std::io::Read;

use tracing::debug;

use crate::reader::{FeatureReader, ReaderOptions};
use crate::schema::Schema;
use crate::source;
use crate::SdlError;

/// Titre annoncé par [`SdlDataStore::info`]
pub const SERVICE_TITLE: &str = "SDL DataStore";

/// Description de la source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub title: String,
    pub source: String,
}

/// Lecteur mis en cache par la source
pub type SourceReader = FeatureReader<Box<dyn Read + Send>>;

pub struct SdlDataStore {
    locator: String,
    type_name: String,
    options: ReaderOptions,
    reader: Option<SourceReader>,
}

impl SdlDataStore {
    /// Crée la source ; le fichier n'est ouvert qu'au premier accès
    pub fn new(locator: impl Into<String>, srs: Option<String>) -> Self {
        Self::with_options(
            locator,
            ReaderOptions {
                srs,
                ..ReaderOptions::default()
            },
        )
    }

    pub fn with_options(locator: impl Into<String>, options: ReaderOptions) -> Self {
        let locator = locator.into();
        let type_name = options
            .type_name
            .clone()
            .unwrap_or_else(|| source::type_name_from_locator(&locator));
        Self {
            locator,
            options: ReaderOptions {
                type_name: Some(type_name.clone()),
                ..options
            },
            type_name,
            reader: None,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Un seul type par fichier
    pub fn type_names(&self) -> Vec<String> {
        vec![self.type_name.clone()]
    }

    pub fn schema(&mut self) -> Result<&Schema, SdlError> {
        Ok(self.feature_reader()?.schema())
    }

    /// Lecteur de la source, créé une seule fois
    pub fn feature_reader(&mut self) -> Result<&mut SourceReader, SdlError> {
        if self.reader.is_none() {
            self.reader = Some(FeatureReader::open(&self.locator, &self.options)?);
        }
        self.reader.as_mut().ok_or(SdlError::Closed)
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            title: SERVICE_TITLE.to_string(),
            source: self.locator.clone(),
        }
    }

    /// Ferme le lecteur en cache ; sans effet s'il n'existe pas
    pub fn dispose(&mut self) {
        match self.reader.take() {
            Some(mut reader) => reader.close(),
            None => debug!(source = %self.locator, "No feature reader to dispose"),
        }
    }

    pub fn feature_source(&self) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("feature_source"))
    }

    pub fn create_schema(&mut self, _schema: &Schema) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("create_schema"))
    }

    pub fn update_schema(&mut self, _type_name: &str, _schema: &Schema) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("update_schema"))
    }

    pub fn remove_schema(&mut self, _type_name: &str) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("remove_schema"))
    }

    pub fn feature_writer(&mut self, _type_name: &str) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("feature_writer"))
    }

    pub fn feature_writer_append(&mut self, _type_name: &str) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("feature_writer_append"))
    }

    pub fn locking_manager(&self) -> Result<(), SdlError> {
        Err(SdlError::Unsupported("locking_manager"))
    }
}

impl Drop for SdlDataStore {
    fn drop(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
    }
}
