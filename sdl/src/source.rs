//! Ouverture des sources SDL (fichier, URL `file://`, `.bz2`)

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bzip2::read::MultiBzDecoder;

use crate::SdlError;

/// Nom de type utilisé quand la source n'en fournit aucun
pub const UNKNOWN_TYPE_NAME: &str = "unknown_sdl";

/// Résout un localisateur (chemin ou URL `file://`) en chemin local
pub fn resolve_path(locator: &str) -> Result<PathBuf, SdlError> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(SdlError::InvalidSource("empty locator".into()));
    }

    let Some((scheme, rest)) = locator.split_once("://") else {
        return Ok(PathBuf::from(locator));
    };

    if !scheme.eq_ignore_ascii_case("file") {
        return Err(SdlError::InvalidSource(format!(
            "unsupported scheme \"{}\" in {}",
            scheme, locator
        )));
    }

    // file:///chemin ou file://localhost/chemin
    let path = rest.strip_prefix("localhost").unwrap_or(rest);
    if !path.starts_with('/') {
        return Err(SdlError::InvalidSource(format!(
            "remote host in {} is not supported",
            locator
        )));
    }
    Ok(PathBuf::from(percent_decode(path)))
}

/// Ouvre le flux d'octets d'une source, décompressé si nécessaire
pub fn open(locator: &str) -> Result<Box<dyn Read + Send>, SdlError> {
    let path = resolve_path(locator)?;
    open_path(&path)
}

/// Ouvre un fichier local ; un suffixe `.bz2` active la décompression
pub fn open_path(path: &Path) -> Result<Box<dyn Read + Send>, SdlError> {
    let file = File::open(path)?;
    if is_bzip2(path) {
        Ok(Box::new(MultiBzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn is_bzip2(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bz2"))
}

/// Reconnaît un fichier SDL d'après son nom (`.sdl` ou `.sdl.bz2`)
pub fn is_sdl_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| {
            let lower = n.to_ascii_lowercase();
            lower.ends_with(".sdl") || lower.ends_with(".sdl.bz2")
        })
}

/// Nom de type dérivé du dernier segment du localisateur
///
/// Le suffixe `.sdl` (ou `.sdl.bz2`) est retiré sans tenir compte de la casse.
pub fn type_name_from_locator(locator: &str) -> String {
    let trimmed = locator.trim().trim_end_matches(['/', '\\']);
    let segment = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed);
    let segment = percent_decode(segment);

    let lower = segment.to_ascii_lowercase();
    let base = if lower.ends_with(".sdl.bz2") {
        &segment[..segment.len() - ".sdl.bz2".len()]
    } else if lower.ends_with(".sdl") {
        &segment[..segment.len() - ".sdl".len()]
    } else {
        segment.as_str()
    };

    if base.trim().is_empty() {
        UNKNOWN_TYPE_NAME.to_string()
    } else {
        base.to_string()
    }
}

/// Décode les séquences `%XX` d'un chemin d'URL
fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
