//! Parser pour l'en-tête (directives `#`)

use std::io::Read;

use tracing::{debug, trace};

use crate::scanner::{LineClass, LineScanner};
use crate::types::Header;
use crate::SdlError;

const VERSION: &str = "#version";
const METADATA_BEGIN: &str = "#metadata_begin";
const METADATA_END: &str = "#metadata_end";

/// Consomme le bloc d'en-tête en tête de flux
///
/// S'arrête sur la première ligne de données, laissée en réserve dans le
/// scanner pour le parsing des enregistrements.
pub fn parse<R: Read>(scanner: &mut LineScanner<R>) -> Result<Header, SdlError> {
    let mut header = Header::default();

    loop {
        scanner.skip_ignorable()?;
        let is_header = match scanner.peek()? {
            Some(line) => line.class() == LineClass::Header,
            None => break,
        };
        if !is_header {
            break;
        }
        let Some(line) = scanner.next_line()? else {
            break;
        };

        let lower = line.text.to_lowercase();
        if lower.starts_with(VERSION) {
            header.version = directive_value(&line.text).map(str::to_string);
        } else if lower.starts_with(METADATA_BEGIN) {
            // Nom en minuscules : recherche insensible à la casse
            let name = directive_value(&lower).unwrap_or("").to_string();
            let contents = read_block(scanner)?;

            if name.is_empty() {
                debug!(line = line.number, "Metadata block without name, ignored");
            } else if contents.is_empty() {
                debug!(block = %name, "Empty metadata block, ignored");
            } else {
                header.metadata.insert(name, contents);
            }
        } else {
            trace!(line = line.number, "Ignoring unknown header line");
        }
    }

    Ok(header)
}

/// Valeur après le premier `=` d'une directive, `None` sans `=`
fn directive_value(text: &str) -> Option<&str> {
    text.split_once('=').map(|(_, value)| value.trim())
}

/// Lit les lignes d'un bloc jusqu'à `#metadata_end` ou la fin du flux
fn read_block<R: Read>(scanner: &mut LineScanner<R>) -> Result<Vec<String>, SdlError> {
    let mut contents = Vec::new();

    while let Some(line) = scanner.next_line()? {
        if line.text.to_lowercase().starts_with(METADATA_END) {
            return Ok(contents);
        }
        if line.class() == LineClass::Blank {
            continue;
        }
        // Retirer le caractère de tête (`#`)
        let mut chars = line.text.chars();
        chars.next();
        contents.push(chars.as_str().to_string());
    }

    debug!("Metadata block not terminated before end of stream");
    Ok(contents)
}
