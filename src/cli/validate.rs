// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 dagcheck contributors

//! Validate command - check DAG documents

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use crate::errors::{DagcheckError, DagcheckResult, ValidationErrors};
use crate::schema::{default_dag_name, parse_document, Dag, DocumentFormat};
use crate::utils::{create_spinner, print_detail, print_error, print_info, print_success};

/// What happened to one input file
#[derive(Debug)]
pub enum Outcome {
    Valid(Dag),
    Invalid(ValidationErrors),
    /// The file could not be read or parsed at all
    Unreadable(DagcheckError),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl FileReport {
    pub fn is_valid(&self) -> bool {
        matches!(self.outcome, Outcome::Valid(_))
    }
}

/// Run the validate command
pub async fn run(patterns: Vec<String>, format: OutputFormat, verbose: bool) -> Result<()> {
    let files = expand_inputs(&patterns)?;
    tracing::debug!(files = files.len(), "validating");

    let spinner = (format == OutputFormat::Text && files.len() > 1)
        .then(|| create_spinner(&format!("Validating {} DAG files...", files.len())));
    let reports = validate_files(files).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match format {
        OutputFormat::Text => print_text(&reports, verbose),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonReport::new(&reports)).map_err(DagcheckError::from)?;
            println!("{}", json);
        }
    }

    let failed = reports.iter().filter(|r| !r.is_valid()).count();
    if failed > 0 {
        Err(miette::miette!(
            "{} of {} DAG file(s) failed validation",
            failed,
            reports.len()
        ))
    } else {
        Ok(())
    }
}

/// Expand glob patterns; plain paths pass through so a missing file is
/// reported against its own name
pub fn expand_inputs(patterns: &[String]) -> DagcheckResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            let path = PathBuf::from(pattern);
            if !files.contains(&path) {
                files.push(path);
            }
            continue;
        }

        let mut matched: Vec<PathBuf> = glob::glob(pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        if matched.is_empty() {
            return Err(DagcheckError::NoInputFiles {
                pattern: pattern.clone(),
            });
        }
        matched.sort();
        for path in matched {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Validate files concurrently; reports come back in input order
pub async fn validate_files(files: Vec<PathBuf>) -> Vec<FileReport> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let task = tokio::spawn(validate_file(path.clone()));
            (path, task)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(Ok(dag))) => Outcome::Valid(dag),
            Ok(Ok(Err(errors))) => Outcome::Invalid(errors),
            Ok(Err(e)) => Outcome::Unreadable(e),
            Err(e) => Outcome::Unreadable(e.into()),
        };
        reports.push(FileReport { path, outcome });
    }
    reports
}

async fn validate_file(path: PathBuf) -> DagcheckResult<Result<Dag, ValidationErrors>> {
    let format = DocumentFormat::from_path(&path)?;
    if !tokio::fs::try_exists(&path).await? {
        return Err(DagcheckError::file_not_found(path));
    }
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| DagcheckError::FileReadError {
            path: path.clone(),
            error: e.to_string(),
        })?;
    let fallback = fallback_name(&path);

    tokio::task::spawn_blocking(move || {
        let value = parse_document(&text, format)?;
        Ok::<_, DagcheckError>(Dag::from_named_value(&value, &fallback))
    })
    .await?
}

fn fallback_name(path: &Path) -> String {
    default_dag_name(path).unwrap_or("dag").to_string()
}

fn print_text(reports: &[FileReport], verbose: bool) {
    println!("{}", format!("Validating {} DAG file(s)...", reports.len()).bold());
    println!();

    for report in reports {
        let path = report.path.display();
        match &report.outcome {
            Outcome::Valid(dag) => {
                print_success(&format!(
                    "{} ({}, {} step(s))",
                    path,
                    dag.name(),
                    dag.steps().len()
                ));
                if verbose {
                    let graph = dag.graph();
                    print_info(&format!("run order: {}", graph.execution_order().join(" → ")).dimmed().to_string());
                }
            }
            Outcome::Invalid(errors) => {
                print_error(&format!("{} ({} error(s))", path, errors.len()));
                for error in errors {
                    print_detail(&format!("{}: {}", error.path().to_string().yellow(), error.message()));
                    if verbose {
                        print_detail(&format!("  [{}]", error.kind()).dimmed().to_string());
                    }
                }
            }
            Outcome::Unreadable(e) => {
                print_error(&format!("{} - {}", path, e));
            }
        }
    }

    println!();
    let failed = reports.iter().filter(|r| !r.is_valid()).count();
    if failed == 0 {
        println!("{}", "All DAGs are valid!".green().bold());
    } else {
        println!(
            "{}",
            format!("{} of {} DAG file(s) have problems.", failed, reports.len())
                .red()
                .bold()
        );
        if !verbose {
            println!("Run 'dagcheck explain <KIND>' to learn about an error kind; -v shows kinds.");
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    valid: bool,
    files: Vec<JsonFile<'a>>,
}

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    steps: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<JsonError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

#[derive(Serialize)]
struct JsonError {
    kind: &'static str,
    path: String,
    message: String,
}

impl<'a> JsonReport<'a> {
    fn new(reports: &'a [FileReport]) -> Self {
        let files: Vec<JsonFile<'a>> = reports
            .iter()
            .map(|report| {
                let mut file = JsonFile {
                    path: report.path.display().to_string(),
                    valid: report.is_valid(),
                    dag: None,
                    steps: None,
                    errors: Vec::new(),
                    failure: None,
                };
                match &report.outcome {
                    Outcome::Valid(dag) => {
                        file.dag = Some(dag.name());
                        file.steps = Some(dag.steps().len());
                    }
                    Outcome::Invalid(errors) => {
                        file.errors = errors
                            .iter()
                            .map(|e| JsonError {
                                kind: e.kind().as_str(),
                                path: e.path().to_string(),
                                message: e.message(),
                            })
                            .collect();
                    }
                    Outcome::Unreadable(e) => file.failure = Some(e.to_string()),
                }
                file
            })
            .collect();

        Self {
            valid: files.iter().all(|f| f.valid),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_expand_inputs_keeps_plain_paths_and_sorts_globs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.yaml", "steps: [echo]\n");
        write(&dir, "a.yaml", "steps: [echo]\n");
        write(&dir, "notes.txt", "");

        let pattern = format!("{}/*.yaml", dir.path().display());
        let files = expand_inputs(&["missing.yaml".to_string(), pattern.clone(), pattern]).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["missing.yaml", "a.yaml", "b.yaml"]);
    }

    #[test]
    fn test_unmatched_glob_is_an_error() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/*.yaml", dir.path().display());
        assert!(matches!(
            expand_inputs(&[pattern]),
            Err(DagcheckError::NoInputFiles { .. })
        ));
    }

    #[tokio::test]
    async fn test_reports_in_input_order() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "nightly.yaml", "steps:\n  - name: a\n    command: echo a\n");
        let bad = write(&dir, "bad.json", r#"{"name": "bad", "steps": [{"name": "a", "depends": ["b"], "command": "x"}]}"#);
        let broken = write(&dir, "broken.toml", "name = \n");
        let missing = dir.path().join("missing.yml");

        let reports = validate_files(vec![good, bad, broken, missing]).await;
        assert_eq!(reports.len(), 4);

        match &reports[0].outcome {
            Outcome::Valid(dag) => assert_eq!(dag.name(), "nightly"),
            other => panic!("expected a valid DAG, got {:?}", other),
        }
        match &reports[1].outcome {
            Outcome::Invalid(errors) => assert_eq!(errors.render(), "steps[0].depends[0]: step 'a' depends on unknown step 'b'"),
            other => panic!("expected validation errors, got {:?}", other),
        }
        assert!(matches!(reports[2].outcome, Outcome::Unreadable(DagcheckError::Toml { .. })));
        assert!(matches!(reports[3].outcome, Outcome::Unreadable(DagcheckError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_json_report() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "hourly.yaml", "schedule: '*/5 * *'\nsteps: [echo hi]\n");

        let reports = validate_files(vec![path]).await;
        let json = serde_json::to_value(JsonReport::new(&reports)).unwrap();

        assert_eq!(json["valid"], false);
        assert_eq!(json["files"][0]["errors"][0]["kind"], "InvalidScheduleError");
        assert_eq!(json["files"][0]["errors"][0]["path"], "schedule");
    }
}
