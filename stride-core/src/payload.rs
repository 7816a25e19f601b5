use crate::content_type::ContentType;

/// A value accepted by the storage layer.
///
/// The tag decides the serialized form; on load, the filename suffix decides
/// how bytes are decoded back. `.json` files must parse as JSON. Anything
/// else comes back as text when it decodes as UTF-8, raw bytes otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// JSON-serializable record (routes, fitness sessions, model metadata).
    Structured(serde_json::Value),
    /// Raw bytes (model weights, packed training batches).
    Binary(Vec<u8>),
    /// Plain text (CSV exports, GPX tracks).
    Text(String),
}

impl Payload {
    /// Serialized form written to either backend.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Structured(value) => serde_json::to_vec(value),
            Self::Binary(bytes) => Ok(bytes.clone()),
            Self::Text(text) => Ok(text.clone().into_bytes()),
        }
    }

    /// Decode bytes read back from a backend. A present but malformed
    /// `.json` file is an error, not a fallback.
    pub fn from_bytes(filename: &str, bytes: Vec<u8>) -> Result<Self, serde_json::Error> {
        if ContentType::from_filename(filename) == ContentType::Json {
            let value = serde_json::from_slice(&bytes)?;
            return Ok(Self::Structured(value));
        }
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Self::Text(text)),
            Err(e) => Ok(Self::Binary(e.into_bytes())),
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Structured(_) => ContentType::Json,
            Self::Binary(_) => ContentType::OctetStream,
            Self::Text(_) => ContentType::PlainText,
        }
    }

    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Binary(_) => "binary",
            Self::Text(_) => "text",
        }
    }
}
