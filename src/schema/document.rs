// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Document formats
//!
//! Whatever the input format, a document is turned into a generic
//! `serde_yaml::Value` before validation.

use serde_yaml::Value;
use std::fmt;
use std::path::Path;

use crate::errors::{DagcheckError, DagcheckResult};

/// Input format of a DAG document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> DagcheckResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match ext.as_deref() {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(DagcheckError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => write!(f, "YAML"),
            Self::Json => write!(f, "JSON"),
            Self::Toml => write!(f, "TOML"),
        }
    }
}

/// Parse document text into the generic value the validator works on
pub fn parse_document(text: &str, format: DocumentFormat) -> DagcheckResult<Value> {
    let value = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        DocumentFormat::Json => {
            let json: serde_json::Value = serde_json::from_str(text)?;
            serde_yaml::to_value(json)?
        }
        DocumentFormat::Toml => {
            let toml: toml::Value = toml::from_str(text)?;
            serde_yaml::to_value(toml)?
        }
    };
    Ok(value)
}

/// Read and parse a document file
pub fn load_document(path: &Path) -> DagcheckResult<Value> {
    let format = DocumentFormat::from_path(path)?;
    if !path.exists() {
        return Err(DagcheckError::file_not_found(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| DagcheckError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    parse_document(&text, format)
}

/// Name a DAG after its file when the document has no `name`
pub fn default_dag_name(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")).unwrap(), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("dags/a.YML")).unwrap(), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")).unwrap(), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")).unwrap(), DocumentFormat::Toml);
        assert!(matches!(
            DocumentFormat::from_path(Path::new("a.cue")),
            Err(DagcheckError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_formats_agree() {
        let yaml = parse_document("name: x\nsteps:\n  - name: a\n    command: echo\n", DocumentFormat::Yaml).unwrap();
        let json = parse_document(
            r#"{"name": "x", "steps": [{"name": "a", "command": "echo"}]}"#,
            DocumentFormat::Json,
        )
        .unwrap();
        let toml = parse_document("name = \"x\"\n[[steps]]\nname = \"a\"\ncommand = \"echo\"\n", DocumentFormat::Toml).unwrap();
        assert_eq!(yaml, json);
        assert_eq!(yaml, toml);
    }

    #[test]
    fn test_load_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.yaml");
        std::fs::write(&path, "steps: [echo hello]\n").unwrap();

        let value = load_document(&path).unwrap();
        assert!(value.get("steps").is_some());
        assert_eq!(default_dag_name(&path), Some("hello"));

        let missing = load_document(&PathBuf::from("/nonexistent/dag.yaml"));
        assert!(matches!(missing, Err(DagcheckError::FileNotFound { .. })));
    }
}
