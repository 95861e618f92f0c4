//! Lecteur d'enregistrements SDL en flux

use std::io::Read;

use encoding_rs::{Encoding, WINDOWS_1252};
use tracing::{debug, info};

use crate::assemble::assemble;
use crate::crs::{self, Crs};
use crate::parser::{entry, header};
use crate::scanner::LineScanner;
use crate::schema::Schema;
use crate::source;
use crate::types::{Entry, Feature, Header};
use crate::SdlError;

/// Variable d'environnement fournissant le SRS par défaut
pub const ENV_SRS: &str = "SDL_SRS";

/// Variable d'environnement fournissant le libellé d'encodage
pub const ENV_ENCODING: &str = "SDL_ENCODING";

/// Options d'ouverture d'un lecteur
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// SRS imposé (`EPSG:28992`, URN...), prioritaire sur le WKT du fichier
    pub srs: Option<String>,

    /// Nom de type du schéma ; dérivé de la source si absent
    pub type_name: Option<String>,

    /// Encodage fixe du texte (pas de détection)
    pub encoding: &'static Encoding,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            srs: None,
            type_name: None,
            encoding: WINDOWS_1252,
        }
    }
}

impl ReaderOptions {
    /// Options lues depuis `SDL_SRS` et `SDL_ENCODING`
    pub fn from_env() -> Result<Self, SdlError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut options = Self {
            srs: var(ENV_SRS),
            ..Self::default()
        };
        if let Some(label) = var(ENV_ENCODING) {
            options.encoding = encoding_for_label(&label)?;
        }
        Ok(options)
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Résout un libellé d'encodage (`utf-8`, `latin1`, `windows-1252`...)
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, SdlError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| SdlError::UnknownEncoding(label.to_string()))
}

/// Séquence paresseuse des enregistrements d'un flux SDL
///
/// L'en-tête, le CRS et le schéma sont établis à la construction. Chaque
/// appel à [`FeatureReader::next_feature`] lit exactement un enregistrement.
pub struct FeatureReader<R> {
    scanner: LineScanner<R>,
    header: Header,
    schema: Schema,
    next_id: u64,
    fused: bool,
}

impl FeatureReader<Box<dyn Read + Send>> {
    /// Ouvre une source (chemin ou URL `file://`)
    pub fn open(locator: &str, options: &ReaderOptions) -> Result<Self, SdlError> {
        let stream = source::open(locator)?;
        let type_name = options
            .type_name
            .clone()
            .unwrap_or_else(|| source::type_name_from_locator(locator));
        let reader = Self::from_reader(
            stream,
            &ReaderOptions {
                type_name: Some(type_name),
                ..options.clone()
            },
        )?;
        debug!(source = locator, bytes = reader.bytes_read(), "Opened SDL source");
        Ok(reader)
    }
}

impl<R: Read> FeatureReader<R> {
    /// Construit un lecteur sur un flux déjà ouvert
    pub fn from_reader(reader: R, options: &ReaderOptions) -> Result<Self, SdlError> {
        let mut scanner = LineScanner::new(reader, options.encoding);

        let header = header::parse(&mut scanner)?;
        let crs = crs::resolve(options.srs.as_deref(), &header)?;
        let type_name = options
            .type_name
            .as_deref()
            .unwrap_or(source::UNKNOWN_TYPE_NAME);
        let schema = Schema::build(type_name, crs)?;

        info!(
            type_name = schema.type_name(),
            version = header.version.as_deref().unwrap_or("-"),
            crs = %schema.crs().map(ToString::to_string).unwrap_or_else(|| "none".into()),
            encoding = options.encoding.name(),
            "SDL header parsed"
        );

        Ok(Self {
            scanner,
            header,
            schema,
            next_id: 0,
            fused: false,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.schema.crs()
    }

    /// Reste-t-il un enregistrement ? Appels répétés sans effet
    pub fn has_next(&mut self) -> Result<bool, SdlError> {
        self.scanner.has_more()
    }

    /// Lit l'enregistrement suivant ; `Ok(None)` une fois le flux épuisé
    pub fn next_feature(&mut self) -> Result<Option<Feature>, SdlError> {
        let Some(entry) = entry::parse(&mut self.scanner)? else {
            return Ok(None);
        };

        let feature = self.build_feature(entry);
        self.next_id += 1;

        if feature.parse_error {
            debug!(
                id = feature.id,
                key = %feature.key,
                line = feature.entry_line_number,
                error = feature.error.as_deref().unwrap_or(""),
                "Record flagged"
            );
        }
        Ok(Some(feature))
    }

    fn build_feature(&self, entry: Entry) -> Feature {
        let (geometry, error) = match &entry.geometry {
            Ok(raw) => {
                let assembly = assemble(raw);
                (assembly.geometry, assembly.fault)
            }
            Err(e) => (None, Some(e.to_string())),
        };

        Feature {
            id: self.next_id,
            geometry,
            name: entry.name,
            key: entry.key,
            url_link: entry.url_link,
            entry_line_number: entry.line_number,
            parse_error: error.is_some(),
            error,
        }
    }

    /// Octets consommés depuis la source
    pub fn bytes_read(&self) -> u64 {
        self.scanner.bytes_read()
    }

    /// Nombre d'enregistrements déjà rendus
    pub fn emitted(&self) -> u64 {
        self.next_id
    }

    /// Libère le flux ; peut être appelé plusieurs fois
    pub fn close(&mut self) {
        if !self.scanner.is_closed() {
            debug!(
                type_name = self.schema.type_name(),
                records = self.next_id,
                bytes = self.scanner.bytes_read(),
                "Closing SDL reader"
            );
        }
        self.scanner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.scanner.is_closed()
    }
}

impl<R: Read> Iterator for FeatureReader<R> {
    type Item = Result<Feature, SdlError>;

    /// S'arrête définitivement après une erreur fatale
    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.next_feature() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.fused = true;
                None
            }
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::scanner::MARK_SIZE;
    use geo::Geometry;

    const SAMPLE: &str = "\
#VERSION=2.0
#METADATA_BEGIN=CoordinateSystem
#PROJCS[\"Amersfoort / RD New\",GEOGCS[\"Amersfoort\"],AUTHORITY[\"EPSG\",\"28992\"]]
#METADATA_END
; points d'intérêt
P,\"K-1\",\"Church\",\"http://example/1\"
1
155000.0,463000.0

L,\"K-2\",\"Road\",\"\"
2
0,0
10,10
";

    fn reader(text: &str) -> FeatureReader<&[u8]> {
        FeatureReader::from_reader(
            text.as_bytes(),
            &ReaderOptions::default().with_type_name("sample"),
        )
        .unwrap()
    }

    #[test]
    fn test_read_sample() {
        let mut reader = reader(SAMPLE);
        assert_eq!(reader.header().version.as_deref(), Some("2.0"));
        assert_eq!(reader.crs().and_then(Crs::epsg), Some(28992));
        assert_eq!(reader.schema().type_name(), "sample");

        let first = reader.next_feature().unwrap().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.key, "K-1");
        assert_eq!(first.url_link, "http://example/1");
        assert_eq!(first.entry_line_number, 6);
        assert!(!first.parse_error);
        assert!(matches!(first.geometry, Some(Geometry::Point(_))));

        let second = reader.next_feature().unwrap().unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(second.entry_line_number, 10);
        assert!(matches!(second.geometry, Some(Geometry::MultiLineString(_))));

        assert!(reader.next_feature().unwrap().is_none());
        assert!(reader.next_feature().unwrap().is_none());
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let mut reader = reader(SAMPLE);
        let bytes = reader.bytes_read();
        for _ in 0..5 {
            assert!(reader.has_next().unwrap());
        }
        assert_eq!(reader.bytes_read(), bytes);
        assert_eq!(reader.emitted(), 0);

        reader.next_feature().unwrap();
        reader.next_feature().unwrap();
        assert!(!reader.has_next().unwrap());
        assert!(!reader.has_next().unwrap());
    }

    #[test]
    fn test_srs_override_wins() {
        let reader = FeatureReader::from_reader(
            SAMPLE.as_bytes(),
            &ReaderOptions::default().with_srs("EPSG:4326"),
        )
        .unwrap();
        assert_eq!(reader.crs().and_then(Crs::epsg), Some(4326));
        assert_eq!(reader.schema().type_name(), source::UNKNOWN_TYPE_NAME);
    }

    #[test]
    fn test_invalid_srs_is_configuration_error() {
        let err = FeatureReader::from_reader(
            SAMPLE.as_bytes(),
            &ReaderOptions::default().with_srs("not a crs"),
        )
        .err()
        .unwrap();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_record_fault_does_not_stop_iteration() {
        let text = "P,\"K1\",\"bad\",\"\"\n1\n1.0,x\nP,\"K2\",\"good\",\"\"\n1\n1,2\n";
        let features: Vec<Feature> = reader(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(features.len(), 2);
        assert!(features[0].parse_error);
        assert!(features[0].geometry.is_none());
        assert_eq!(features[0].key, "K1");
        assert!(!features[1].parse_error);
        assert!(features[1].geometry.is_some());
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = reader("");
        assert!(!reader.has_next().unwrap());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reader = reader(SAMPLE);
        reader.close();
        reader.close();
        assert!(reader.is_closed());
        assert!(matches!(reader.has_next(), Err(SdlError::Closed)));

        // L'itérateur rend l'erreur une seule fois
        assert!(matches!(reader.next(), Some(Err(SdlError::Closed))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_line_too_long_aborts_read() {
        let text = format!(
            "P,\"K1\",\"a\",\"\"\n1\n{}\nP,\"K2\",\"b\",\"\"\n1\n1,2\n",
            "9".repeat(MARK_SIZE + 10)
        );
        let mut reader = reader(&text);

        assert!(matches!(
            reader.next_feature(),
            Err(SdlError::LineTooLong { line: 3, .. })
        ));
        assert!(reader.is_closed());
        assert!(matches!(reader.next_feature(), Err(SdlError::Closed)));
        assert!(matches!(reader.next_feature(), Err(SdlError::Closed)));
        assert!(matches!(reader.has_next(), Err(SdlError::Closed)));
        assert_eq!(reader.emitted(), 0);
    }

    #[test]
    fn test_encoding_for_label() {
        assert_eq!(encoding_for_label("utf-8").unwrap(), encoding_rs::UTF_8);
        assert_eq!(encoding_for_label(" latin1 ").unwrap(), WINDOWS_1252);
        assert!(matches!(
            encoding_for_label("klingon"),
            Err(SdlError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_windows_1252_decoding() {
        let bytes = b"P,\"K1\",\"Caf\xe9\",\"\"\n1\n1,2\n";
        let mut reader =
            FeatureReader::from_reader(&bytes[..], &ReaderOptions::default()).unwrap();
        let feature = reader.next_feature().unwrap().unwrap();
        assert_eq!(feature.name, "Café");
    }
}
