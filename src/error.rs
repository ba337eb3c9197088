//! Export-specific error types

use crate::inspect::CatalogError;

/// Errors raised while building or writing a schema document
#[derive(Debug)]
pub enum ExportError {
    /// No usable schema source could be resolved
    UnresolvedSource(String),
    /// The catalog source supports no introspection strategy
    MissingCapability { driver: String, capability: String },
    /// A recorded schema command could not be applied to the model
    CommandApply {
        table: String,
        command: String,
        error: String,
    },
    /// Document rendering failed
    Serialization(String),
    /// Scratch resource (artifact directory or file) failure
    Scratch(String),
    /// Change-set registry failure
    Registry(String),
    /// Driver-level catalog error
    Catalog(CatalogError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::UnresolvedSource(msg) => {
                write!(
                    f,
                    "No schema source available: {}\n\
                     Provide a database URL for catalog inspection, or register\n\
                     change-sets before requesting a replay export.",
                    msg
                )
            }
            ExportError::MissingCapability { driver, capability } => {
                write!(
                    f,
                    "Driver '{}' does not support {}",
                    driver, capability
                )
            }
            ExportError::CommandApply { table, command, error } => {
                write!(
                    f,
                    "Failed to apply '{}' on table '{}': {}",
                    command, table, error
                )
            }
            ExportError::Serialization(msg) => write!(f, "Document rendering failed: {}", msg),
            ExportError::Scratch(msg) => write!(f, "Scratch resource error: {}", msg),
            ExportError::Registry(msg) => write!(f, "Change-set registry error: {}", msg),
            ExportError::Catalog(e) => write!(f, "Catalog error: {}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<CatalogError> for ExportError {
    fn from(error: CatalogError) -> Self {
        ExportError::Catalog(error)
    }
}
