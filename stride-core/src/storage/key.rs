//! Object key construction. Pure string work, no I/O.

use super::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespaces data is stored under. Each variant is one path segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Routes,
    Fitness,
    Models,
    TrainingData,
}

impl DataType {
    /// Every namespace, in the order migration sweeps them.
    pub const ALL: [DataType; 4] = [
        DataType::Routes,
        DataType::Fitness,
        DataType::Models,
        DataType::TrainingData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routes => "routes",
            Self::Fitness => "fitness",
            Self::Models => "models",
            Self::TrainingData => "training_data",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "routes" => Some(Self::Routes),
            "fitness" => Some(Self::Fitness),
            "models" => Some(Self::Models),
            "training_data" => Some(Self::TrainingData),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reject segments that would escape their namespace once joined into a
/// path. Rejection is deliberate; nothing is sanitized.
fn validate_segment(kind: &str, segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() {
        return Err(StorageError::InvalidKey(format!("{kind} is empty")));
    }
    if segment.contains('/') || segment.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "{kind} '{segment}' contains a path separator"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(StorageError::InvalidKey(format!(
            "{kind} '{segment}' is a relative path component"
        )));
    }
    Ok(())
}

/// Full key for one object: `users/{user}/{data_type}/{filename}` when a
/// user scope is given, `{data_type}/{filename}` otherwise.
pub fn object_key(
    user: Option<&str>,
    data_type: DataType,
    filename: &str,
) -> Result<String, StorageError> {
    validate_segment("filename", filename)?;
    let dt = data_type.as_str();
    match user {
        Some(user) => {
            validate_segment("user scope", user)?;
            Ok(format!("users/{user}/{dt}/{filename}"))
        }
        None => Ok(format!("{dt}/{filename}")),
    }
}

/// Namespace prefix for listing, ending in `/`.
pub fn prefix(user: Option<&str>, data_type: DataType) -> Result<String, StorageError> {
    let dt = data_type.as_str();
    match user {
        Some(user) => {
            validate_segment("user scope", user)?;
            Ok(format!("users/{user}/{dt}/"))
        }
        None => Ok(format!("{dt}/")),
    }
}

/// Prefix covering every namespace of one user.
pub fn user_prefix(user: &str) -> Result<String, StorageError> {
    validate_segment("user scope", user)?;
    Ok(format!("users/{user}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_user_scoped_keys() {
        assert_eq!(
            object_key(Some("bob"), DataType::Routes, "trip1.json").unwrap(),
            "users/bob/routes/trip1.json"
        );
        assert_eq!(
            object_key(Some("alice"), DataType::TrainingData, "batch-07.bin").unwrap(),
            "users/alice/training_data/batch-07.bin"
        );
    }

    #[test]
    fn builds_global_keys() {
        assert_eq!(
            object_key(None, DataType::Models, "pace-v3.bin").unwrap(),
            "models/pace-v3.bin"
        );
    }

    #[test]
    fn builds_prefixes() {
        assert_eq!(
            prefix(Some("bob"), DataType::Fitness).unwrap(),
            "users/bob/fitness/"
        );
        assert_eq!(prefix(None, DataType::Models).unwrap(), "models/");
        assert_eq!(user_prefix("bob").unwrap(), "users/bob/");
    }

    #[test]
    fn rejects_escaping_filenames() {
        for bad in ["a/b.json", "a\\b.json", "", ".", ".."] {
            assert!(
                matches!(
                    object_key(Some("bob"), DataType::Routes, bad),
                    Err(StorageError::InvalidKey(_))
                ),
                "filename {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_escaping_user_scopes() {
        assert!(matches!(
            object_key(Some("bo/b"), DataType::Routes, "trip.json"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            prefix(Some(""), DataType::Routes),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            user_prefix(".."),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn data_type_tags_round_trip() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_tag(dt.as_str()), Some(dt));
        }
        assert_eq!(DataType::from_tag("bogus"), None);
    }
}
