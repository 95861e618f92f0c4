//! Parsers du format SDL (en-tête et enregistrements)

pub mod entry;
pub mod header;
