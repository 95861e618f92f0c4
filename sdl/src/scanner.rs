//! Lecture ligne à ligne avec une ligne d'avance
//!
//! Le scanner garde au plus une ligne déjà décodée en réserve. `peek*` la
//! remplit sans la consommer, `next*` la rend. Les lignes vides et les
//! commentaires (`;`) sont consommés définitivement dès qu'ils sont reconnus.

use std::io::{BufRead, BufReader, ErrorKind, Read};

use encoding_rs::Encoding;
use memchr::memchr;

use crate::SdlError;

/// Taille maximale d'une ligne (octets, sans le terminateur)
pub const MARK_SIZE: usize = 8 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Compte les octets tirés du flux sous-jacent
///
/// Avec le tampon de lecture, le compte peut devancer les lignes rendues.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    pub fn byte_count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Nature d'une ligne
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Blank,
    Comment,
    Header,
    Data,
}

/// Classe une ligne d'après son premier caractère
pub fn classify(text: &str) -> LineClass {
    if text.trim().is_empty() {
        LineClass::Blank
    } else if text.starts_with(';') {
        LineClass::Comment
    } else if text.starts_with('#') {
        LineClass::Header
    } else {
        LineClass::Data
    }
}

/// Une ligne décodée et son numéro (1-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u64,
    pub text: String,
}

impl Line {
    pub fn class(&self) -> LineClass {
        classify(&self.text)
    }

    /// Ligne vide ou commentaire
    pub fn is_ignorable(&self) -> bool {
        matches!(self.class(), LineClass::Blank | LineClass::Comment)
    }
}

/// Scanner de lignes propriétaire du flux
pub struct LineScanner<R> {
    reader: Option<BufReader<CountingReader<R>>>,
    encoding: &'static Encoding,
    lookahead: Option<Line>,
    line_number: u64,
    bytes_at_close: u64,
    buf: Vec<u8>,
}

impl<R: Read> LineScanner<R> {
    pub fn new(reader: R, encoding: &'static Encoding) -> Self {
        Self {
            reader: Some(BufReader::new(CountingReader::new(reader))),
            encoding,
            lookahead: None,
            line_number: 0,
            bytes_at_close: 0,
            buf: Vec::with_capacity(256),
        }
    }

    /// Lit la ligne suivante sans la consommer
    pub fn peek(&mut self) -> Result<Option<&Line>, SdlError> {
        if self.lookahead.is_none() {
            self.lookahead = self.read_or_close()?;
        }
        Ok(self.lookahead.as_ref())
    }

    /// Consomme la ligne suivante, quelle qu'elle soit
    pub fn next_line(&mut self) -> Result<Option<Line>, SdlError> {
        match self.lookahead.take() {
            Some(line) => Ok(Some(line)),
            None => self.read_or_close(),
        }
    }

    /// Consomme les lignes vides et les commentaires
    pub fn skip_ignorable(&mut self) -> Result<(), SdlError> {
        loop {
            let ignorable = match self.peek()? {
                Some(line) => line.is_ignorable(),
                None => return Ok(()),
            };
            if !ignorable {
                return Ok(());
            }
            self.lookahead = None;
        }
    }

    /// Indique s'il reste une ligne utile ; appels répétés sans effet
    pub fn has_more(&mut self) -> Result<bool, SdlError> {
        self.skip_ignorable()?;
        Ok(self.lookahead.is_some())
    }

    /// Prochaine ligne utile, sans la consommer
    pub fn peek_significant(&mut self) -> Result<Option<&Line>, SdlError> {
        self.skip_ignorable()?;
        Ok(self.lookahead.as_ref())
    }

    /// Consomme la prochaine ligne utile
    pub fn next_significant(&mut self) -> Result<Option<Line>, SdlError> {
        self.skip_ignorable()?;
        Ok(self.lookahead.take())
    }

    /// Nombre de lignes lues dans le flux (ligne en réserve comprise)
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Octets tirés du flux jusqu'ici
    pub fn bytes_read(&self) -> u64 {
        self.reader
            .as_ref()
            .map(|r| r.get_ref().byte_count())
            .unwrap_or(self.bytes_at_close)
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Libère le flux ; sans effet si déjà fermé
    pub fn close(&mut self) {
        self.lookahead = None;
        if let Some(reader) = self.reader.take() {
            self.bytes_at_close = reader.get_ref().byte_count();
        }
    }

    /// Une erreur de lecture ferme le flux : les appels suivants rendent `Closed`
    fn read_or_close(&mut self) -> Result<Option<Line>, SdlError> {
        let result = self.read_from_stream();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn read_from_stream(&mut self) -> Result<Option<Line>, SdlError> {
        let reader = self.reader.as_mut().ok_or(SdlError::Closed)?;
        self.buf.clear();

        let mut terminated = false;
        loop {
            let available = match reader.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if available.is_empty() {
                break;
            }

            let (chunk_len, found) = match memchr(b'\n', available) {
                Some(pos) => (pos, true),
                None => (available.len(), false),
            };
            // Un octet de plus pour le `\r` d'une fin de ligne CRLF
            if self.buf.len() + chunk_len > MARK_SIZE + 1 {
                return Err(SdlError::LineTooLong {
                    line: self.line_number + 1,
                    limit: MARK_SIZE,
                });
            }
            self.buf.extend_from_slice(&available[..chunk_len]);

            if found {
                reader.consume(chunk_len + 1);
                terminated = true;
                break;
            }
            reader.consume(chunk_len);
        }

        if !terminated && self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > MARK_SIZE {
            return Err(SdlError::LineTooLong {
                line: self.line_number + 1,
                limit: MARK_SIZE,
            });
        }

        self.line_number += 1;
        if self.line_number == 1 && self.buf.starts_with(UTF8_BOM) {
            self.buf.drain(..UTF8_BOM.len());
        }
        let (decoded, _) = self.encoding.decode_without_bom_handling(&self.buf);
        let mut text = decoded.into_owned();
        if self.line_number == 1 && text.starts_with('\u{feff}') {
            text.remove(0);
        }

        Ok(Some(Line {
            number: self.line_number,
            text,
        }))
    }
}
