// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Graph command - visualize a DAG's steps

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::schema::{default_dag_name, load_document, Dag};

/// Run the graph command
pub async fn run(path: PathBuf, format: GraphFormat, verbose: bool) -> Result<()> {
    let output = render(&path, format)?;
    if verbose {
        eprintln!("{}", path.display());
    }
    print!("{}", output);
    Ok(())
}

/// Load, validate and render one DAG file
pub fn render(path: &std::path::Path, format: GraphFormat) -> crate::DagcheckResult<String> {
    let value = load_document(path)?;
    let dag = match default_dag_name(path) {
        Some(fallback) => Dag::from_named_value(&value, fallback)?,
        None => Dag::from_value(&value)?,
    };

    let graph = dag.graph();
    Ok(match format {
        GraphFormat::Text => graph.to_text(),
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DagcheckError;

    const ETL: &str = "\
name: etl
steps:
  - name: extract
    command: ./extract.sh
  - name: transform
    command: ./transform.sh
    depends: [extract]
  - name: notify
    executor:
      type: http
      method: POST
      url: https://hooks.example.com/done
    depends: [transform]
";

    #[test]
    fn test_render_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.yaml");
        std::fs::write(&path, ETL).unwrap();

        insta::assert_snapshot!(render(&path, GraphFormat::Text).unwrap().trim_end(), @r"
        1. extract (shell)
        2. transform (shell) [depends: extract]
        3. notify (http) [depends: transform]
        ");

        let mermaid = render(&path, GraphFormat::Mermaid).unwrap();
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("    s0 --> s1\n"));

        let dot = render(&path, GraphFormat::Dot).unwrap();
        assert!(dot.contains("\"transform\" -> \"notify\";"));
    }

    #[test]
    fn test_invalid_dag_is_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.yaml");
        std::fs::write(&path, "steps:\n  - name: a\n    command: x\n    depends: [a]\n").unwrap();

        let err = render(&path, GraphFormat::Text).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.render(), "steps[0].depends: cyclic dependency: a → a");
        assert!(matches!(err, DagcheckError::Invalid(_)));
    }
}
