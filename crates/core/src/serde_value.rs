use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Document;

pub const DOCUMENT_SCHEMA: &str = "richmark";
pub const DOCUMENT_VERSION: u32 = 1;

fn default_schema() -> String {
    DOCUMENT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

#[derive(Debug, Error)]
pub enum DocumentValueError {
    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema {0:?}")]
    Schema(String),
    #[error("document version {found} is newer than {DOCUMENT_VERSION}")]
    Version { found: u32 },
}

/// Versioned JSON envelope for a persisted document. A missing schema or
/// version reads as the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl DocumentValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, DocumentValueError> {
        let value: Self = serde_json::from_str(s)?;
        if value.schema != DOCUMENT_SCHEMA {
            return Err(DocumentValueError::Schema(value.schema));
        }
        if value.version > DOCUMENT_VERSION {
            return Err(DocumentValueError::Version {
                found: value.version,
            });
        }
        Ok(value)
    }
}
