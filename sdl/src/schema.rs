//! Schéma fixe des enregistrements SDL

use crate::crs::Crs;
use crate::SdlError;

/// Type d'un attribut du schéma
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Geometry,
    String,
    Integer,
}

/// Description d'un attribut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub binding: AttributeType,
}

const fn attribute(name: &'static str, binding: AttributeType) -> AttributeDescriptor {
    AttributeDescriptor { name, binding }
}

/// Attributs de chaque enregistrement, dans l'ordre
pub const ATTRIBUTES: [AttributeDescriptor; 7] = [
    attribute("the_geom", AttributeType::Geometry),
    attribute("name", AttributeType::String),
    attribute("key", AttributeType::String),
    attribute("urlLink", AttributeType::String),
    attribute("entryLineNumber", AttributeType::Integer),
    attribute("parseError", AttributeType::Integer),
    attribute("error", AttributeType::String),
];

/// Schéma unique d'un flux SDL
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    type_name: String,
    crs: Option<Crs>,
}

impl Schema {
    /// Construit le schéma pour un nom de type et le CRS résolu
    pub fn build(type_name: &str, crs: Option<Crs>) -> Result<Self, SdlError> {
        if type_name.trim().is_empty() {
            return Err(SdlError::Schema("type name is empty".to_string()));
        }
        if type_name.chars().any(char::is_control) {
            return Err(SdlError::Schema(format!(
                "type name {:?} contains control characters",
                type_name
            )));
        }

        Ok(Self {
            type_name: type_name.to_string(),
            crs,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// CRS porté par l'attribut géométrique
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn attributes(&self) -> &'static [AttributeDescriptor] {
        &ATTRIBUTES
    }

    pub fn geometry_attribute(&self) -> &'static AttributeDescriptor {
        &ATTRIBUTES[0]
    }

    pub fn attribute(&self, name: &str) -> Option<&'static AttributeDescriptor> {
        ATTRIBUTES.iter().find(|a| a.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        ATTRIBUTES.iter().position(|a| a.name == name)
    }
}
