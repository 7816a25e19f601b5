use std::fmt;

/// Content type for stored payloads.
///
/// Derived from the payload kind on save (the upload's Content-Type header)
/// and from the filename extension on load (which decode path to take).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Json,
    PlainText,
    OctetStream,
}

impl ContentType {
    /// MIME type string (e.g., "application/json").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::PlainText => "text/plain",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Map a filename extension to a content type. Unknown extensions are
    /// opaque bytes.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "json" => Self::Json,
            "txt" | "csv" | "tsv" | "log" | "md" | "gpx" | "tcx" => Self::PlainText,
            _ => Self::OctetStream,
        }
    }

    pub fn from_filename(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::OctetStream,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
