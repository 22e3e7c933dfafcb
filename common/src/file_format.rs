//! Serialization format detection and file load/save helpers.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FileFormatError {
    #[error("Failed to get file extension for '{0}'")]
    MissingFileExtension(PathBuf),
    #[error("Unsupported file extension for file: '{0}'")]
    UnsupportedFileExtension(PathBuf),
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML serialization failed")]
    Yaml(#[from] serde_yml::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
}

pub type FileFormatResult<T> = Result<T, FileFormatError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerdeFormat {
    Yaml,
    Json,
}

impl SerdeFormat {
    pub fn from_path(path: &Path) -> FileFormatResult<Self> {
        let ext = path
            .extension()
            .and_then(|os_str| os_str.to_str())
            .ok_or_else(|| FileFormatError::MissingFileExtension(path.to_path_buf()))?;

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            Err(FileFormatError::UnsupportedFileExtension(
                path.to_path_buf(),
            ))
        }
    }
}

pub fn serialize<T: Serialize>(value: &T, format: SerdeFormat) -> FileFormatResult<String> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::to_string(value)?),
        SerdeFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

pub fn deserialize<T: DeserializeOwned>(text: &str, format: SerdeFormat) -> FileFormatResult<T> {
    match format {
        SerdeFormat::Yaml => Ok(serde_yml::from_str(text)?),
        SerdeFormat::Json => Ok(serde_json::from_str(text)?),
    }
}

/// Read and deserialize `path`, picking the format from its extension.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> FileFormatResult<T> {
    let path = path.as_ref();
    let format = SerdeFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| FileFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    deserialize(&text, format)
}

/// Serialize `value` into `path`, picking the format from its extension.
pub fn save<T: Serialize>(value: &T, path: impl AsRef<Path>) -> FileFormatResult<()> {
    let path = path.as_ref();
    let format = SerdeFormat::from_path(path)?;
    let text = serialize(value, format)?;
    std::fs::write(path, text).map_err(|source| FileFormatError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        width: u32,
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            SerdeFormat::from_path(Path::new("a/b.YML")).unwrap(),
            SerdeFormat::Yaml
        );
        assert_eq!(
            SerdeFormat::from_path(Path::new("cfg.json")).unwrap(),
            SerdeFormat::Json
        );
        assert!(matches!(
            SerdeFormat::from_path(Path::new("cfg")),
            Err(FileFormatError::MissingFileExtension(_))
        ));
        assert!(matches!(
            SerdeFormat::from_path(Path::new("cfg.toml")),
            Err(FileFormatError::UnsupportedFileExtension(_))
        ));
    }

    #[test]
    fn test_yaml_and_json_text() {
        let sample = Sample {
            name: "strip".to_string(),
            width: 64,
        };
        for format in [SerdeFormat::Yaml, SerdeFormat::Json] {
            let text = serialize(&sample, format).unwrap();
            let back: Sample = deserialize(&text, format).unwrap();
            assert_eq!(back, sample);
        }
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = load::<Sample>("definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.yaml"));
    }
}
