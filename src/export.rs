//! Export orchestration
//!
//! Resolves a schema source, builds the canonical model, formats and
//! serializes it, and writes the artifact. Serialization failures
//! degrade to a logged diagnostic instead of aborting the run; scratch
//! cleanup happens on every exit path.

use crate::dbml::{DbmlSerializer, DbmlSyntax, ProjectDoc, SchemaFormatter, StandardDbml, TableDoc};
use crate::error::ExportError;
use crate::inspect::SchemaInspector;
use crate::replay::{registered_versions, replay_registered, SchemaRecorder};
use crate::schema::Table;
use chrono::Local;
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where the canonical model comes from.
pub enum ExportSource {
    /// Replay the registered change-sets against a recorder.
    Replay,
    /// Inspect a live catalog.
    Catalog(SchemaInspector),
}

/// Result of a completed export run.
#[derive(Debug)]
pub struct ExportOutcome {
    /// Written artifact path; `None` when serialization degraded.
    pub artifact: Option<PathBuf>,
    /// Number of tables in the exported model.
    pub tables: usize,
    /// Whether the run fell back to a diagnostic instead of an artifact.
    pub degraded: bool,
}

/// Drives one export run.
///
/// # Examples
///
/// ```no_run
/// use schemadoc::export::{Exporter, ExportSource};
/// use schemadoc::inspect::{SchemaInspector, SqliteSource};
///
/// let source = SqliteSource::open("app.db")?;
/// let inspector = SchemaInspector::new(Box::new(source));
/// let exporter = Exporter::new("app", "sqlite", "artifacts");
/// let outcome = exporter.run(ExportSource::Catalog(inspector))?;
/// println!("{} tables exported", outcome.tables);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Exporter {
    project: String,
    driver: String,
    artifact_dir: PathBuf,
    type_overrides: HashMap<String, String>,
}

impl Exporter {
    pub fn new(project: &str, driver: &str, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            project: project.to_string(),
            driver: driver.to_string(),
            artifact_dir: artifact_dir.into(),
            type_overrides: HashMap::new(),
        }
    }

    /// Load custom type-name overrides from a JSON file. A missing or
    /// malformed file degrades to no overrides.
    pub fn with_type_overrides_file(mut self, path: &Path) -> Self {
        self.type_overrides = load_type_overrides(path);
        self
    }

    pub fn with_type_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.type_overrides = overrides;
        self
    }

    /// Build the canonical model from the requested source.
    ///
    /// # Errors
    ///
    /// Returns `ExportError::UnresolvedSource` when a replay is requested
    /// with no registered change-sets, or the source's own error.
    pub fn build_tables(source: ExportSource) -> Result<IndexMap<String, Table>, ExportError> {
        match source {
            ExportSource::Replay => {
                let versions = registered_versions()?;
                if versions.is_empty() {
                    return Err(ExportError::UnresolvedSource(
                        "no change-sets are registered".to_string(),
                    ));
                }
                let mut recorder = SchemaRecorder::new();
                let replayed = replay_registered(&mut recorder)?;
                info!("replayed {} change-set(s)", replayed);
                Ok(recorder.into_tables())
            }
            ExportSource::Catalog(mut inspector) => {
                let tables = inspector.tables()?;
                info!(
                    "inspected {} table(s) from '{}' catalog",
                    tables.len(),
                    inspector.driver()
                );
                Ok(tables)
            }
        }
    }

    /// Build and format the model without serializing or writing.
    pub fn documents(
        &self,
        source: ExportSource,
    ) -> Result<(ProjectDoc, Vec<TableDoc>), ExportError> {
        let tables = Self::build_tables(source)?;
        let formatter = SchemaFormatter::with_type_overrides(self.type_overrides.clone());
        let docs = formatter.document(&tables);
        Ok((self.project_doc(), docs))
    }

    /// Run the full pipeline with the stock DBML grammar.
    pub fn run(&self, source: ExportSource) -> Result<ExportOutcome, ExportError> {
        self.run_with_syntax(source, StandardDbml)
    }

    /// Run the full pipeline with a caller-supplied rendering vocabulary.
    ///
    /// A serialization failure is reported and the run completes without
    /// an artifact; every other failure propagates.
    pub fn run_with_syntax<S: DbmlSyntax>(
        &self,
        source: ExportSource,
        syntax: S,
    ) -> Result<ExportOutcome, ExportError> {
        let (project, docs) = self.documents(source)?;
        let tables = docs.len();

        let text = match DbmlSerializer::new(syntax).serialize(&project, &docs) {
            Ok(text) => text,
            Err(err) => {
                error!("serialization degraded, no artifact written: {}", err);
                return Ok(ExportOutcome {
                    artifact: None,
                    tables,
                    degraded: true,
                });
            }
        };

        let artifact = self.write_artifact(&text)?;
        Ok(ExportOutcome {
            artifact: Some(artifact),
            tables,
            degraded: false,
        })
    }

    fn project_doc(&self) -> ProjectDoc {
        ProjectDoc {
            name: self.project.clone(),
            driver: self.driver.clone(),
            note: Some(format!(
                "Generated by schemadoc at {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            )),
        }
    }

    /// Write the artifact as `dbml_{slug}_{rand8}.txt` under the artifact
    /// directory. A partially written file is removed before the error
    /// propagates.
    fn write_artifact(&self, text: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.artifact_dir).map_err(|e| {
            ExportError::Scratch(format!(
                "cannot create artifact directory '{}': {}",
                self.artifact_dir.display(),
                e
            ))
        })?;

        let file_name = format!("dbml_{}_{}.txt", slugify(&self.project), random_suffix());
        let path = self.artifact_dir.join(file_name);

        if let Err(e) = fs::write(&path, text) {
            if path.exists() {
                let _ = fs::remove_file(&path);
            }
            return Err(ExportError::Scratch(format!(
                "cannot write artifact '{}': {}",
                path.display(),
                e
            )));
        }
        info!("artifact written to {}", path.display());
        Ok(path)
    }
}

/// Lowercase the project name and collapse every non-alphanumeric run
/// into a single underscore.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_separator = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    let trimmed = slug.trim_end_matches('_').to_string();
    if trimmed.is_empty() {
        "database".to_string()
    } else {
        trimmed
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Read a `{type name: replacement}` JSON map. Any failure degrades to an
/// empty mapping.
fn load_type_overrides(path: &Path) -> HashMap<String, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(
                "custom type mappings not loaded from '{}': {}",
                path.display(),
                e
            );
            return HashMap::new();
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect(),
        Ok(_) | Err(_) => {
            debug!(
                "custom type mapping file '{}' is not a string map, ignoring",
                path.display()
            );
            HashMap::new()
        }
    }
}
