//! Change-set trait and global registry
//!
//! Change-sets are compiled-in types describing one schema revision each.
//! They are registered at startup, then replayed in version order against
//! a [`SchemaRecorder`] to rebuild the schema without a database.

use crate::error::ExportError;
use crate::replay::recorder::SchemaRecorder;
use log::info;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// One declarative schema revision.
///
/// # Examples
///
/// ```
/// use schemadoc::replay::{SchemaChange, SchemaRecorder};
/// use schemadoc::ExportError;
///
/// struct CreateUsers;
///
/// impl SchemaChange for CreateUsers {
///     fn name(&self) -> &str {
///         "create_users"
///     }
///
///     fn version(&self) -> i64 {
///         20240101000000
///     }
///
///     fn up(&self, schema: &mut SchemaRecorder) -> Result<(), ExportError> {
///         schema.create("users", |table| {
///             table.id();
///             table.string("email").length(191);
///             table.unique(&["email"]);
///         });
///         Ok(())
///     }
/// }
/// ```
pub trait SchemaChange {
    /// Human-readable change-set name
    fn name(&self) -> &str;

    /// Ordering version (typically a timestamp)
    fn version(&self) -> i64;

    /// Apply the revision to the recorder.
    ///
    /// # Errors
    ///
    /// Returns `ExportError` when a recorded command cannot be applied.
    fn up(&self, schema: &mut SchemaRecorder) -> Result<(), ExportError>;
}

/// Global change-set registry, indexed by version.
///
/// Change-sets are registered at runtime with [`register_change`]; the
/// linking binary typically does this once during startup.
static CHANGE_REGISTRY: LazyLock<Mutex<HashMap<i64, Box<dyn SchemaChange + Send + Sync>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn registry_lock() -> Result<
    std::sync::MutexGuard<'static, HashMap<i64, Box<dyn SchemaChange + Send + Sync>>>,
    ExportError,
> {
    CHANGE_REGISTRY
        .lock()
        .map_err(|e| ExportError::Registry(format!("Failed to lock change-set registry: {e}")))
}

/// Register a change-set in the global registry.
///
/// # Errors
///
/// Returns `ExportError::Registry` if a change-set with the same version
/// is already registered, or if the registry lock cannot be acquired.
pub fn register_change(change: Box<dyn SchemaChange + Send + Sync>) -> Result<(), ExportError> {
    let version = change.version();
    let name = change.name().to_string();

    let mut registry = registry_lock()?;
    if registry.contains_key(&version) {
        return Err(ExportError::Registry(format!(
            "Change-set '{}' (version {}) is already registered",
            name, version
        )));
    }
    registry.insert(version, change);
    Ok(())
}

/// All registered versions, sorted ascending.
///
/// # Errors
///
/// Returns `ExportError::Registry` if the registry lock cannot be acquired.
pub fn registered_versions() -> Result<Vec<i64>, ExportError> {
    let registry = registry_lock()?;
    let mut versions: Vec<i64> = registry.keys().copied().collect();
    versions.sort_unstable();
    Ok(versions)
}

/// Remove a change-set from the registry. Returns whether it was present.
///
/// # Errors
///
/// Returns `ExportError::Registry` if the registry lock cannot be acquired.
pub fn unregister_change(version: i64) -> Result<bool, ExportError> {
    let mut registry = registry_lock()?;
    Ok(registry.remove(&version).is_some())
}

/// Clear the registry. Intended for tests.
///
/// # Errors
///
/// Returns `ExportError::Registry` if the registry lock cannot be acquired.
pub fn clear_registry() -> Result<(), ExportError> {
    let mut registry = registry_lock()?;
    registry.clear();
    Ok(())
}

/// Replay every registered change-set, in version order, against the
/// recorder. Returns the number of change-sets replayed.
///
/// # Errors
///
/// Returns the first error raised by a change-set, wrapped apply failures
/// included, or `ExportError::Registry` on lock failure.
pub fn replay_registered(recorder: &mut SchemaRecorder) -> Result<usize, ExportError> {
    let registry = registry_lock()?;
    let mut versions: Vec<i64> = registry.keys().copied().collect();
    versions.sort_unstable();

    let mut replayed = 0;
    for version in versions {
        if let Some(change) = registry.get(&version) {
            info!("replaying change-set '{}' (version {})", change.name(), version);
            change.up(recorder)?;
            replayed += 1;
        }
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CreateWidgets {
        version: i64,
    }

    impl SchemaChange for CreateWidgets {
        fn name(&self) -> &str {
            "create_widgets"
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn up(&self, schema: &mut SchemaRecorder) -> Result<(), ExportError> {
            schema.create("widgets", |table| {
                table.id();
                table.string("label");
            });
            Ok(())
        }
    }

    struct AlterWidgets {
        version: i64,
    }

    impl SchemaChange for AlterWidgets {
        fn name(&self) -> &str {
            "alter_widgets"
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn up(&self, schema: &mut SchemaRecorder) -> Result<(), ExportError> {
            if schema.has_column("widgets", "label") {
                schema.table("widgets", |table| {
                    table.rename_column("label", "title");
                })
            } else {
                schema.create("widgets", |table| {
                    table.id();
                    table.string("title");
                });
                Ok(())
            }
        }
    }

    // Versions are picked far apart per test so parallel tests sharing the
    // process-wide registry never collide.

    #[test]
    fn test_register_rejects_duplicate_version() {
        register_change(Box::new(CreateWidgets { version: 910_001 })).unwrap();
        let err = register_change(Box::new(CreateWidgets { version: 910_001 })).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        unregister_change(910_001).unwrap();
    }

    #[test]
    fn test_registered_versions_sorted() {
        register_change(Box::new(CreateWidgets { version: 920_002 })).unwrap();
        register_change(Box::new(CreateWidgets { version: 920_001 })).unwrap();

        let versions = registered_versions().unwrap();
        let ours: Vec<i64> = versions
            .into_iter()
            .filter(|v| (920_000..930_000).contains(v))
            .collect();
        assert_eq!(ours, vec![920_001, 920_002]);

        unregister_change(920_001).unwrap();
        unregister_change(920_002).unwrap();
    }

    #[test]
    fn test_replay_runs_in_version_order() {
        register_change(Box::new(CreateWidgets { version: 930_001 })).unwrap();
        register_change(Box::new(AlterWidgets { version: 930_002 })).unwrap();

        let mut recorder = SchemaRecorder::new();
        let replayed = replay_registered(&mut recorder).unwrap();
        assert!(replayed >= 2);
        assert!(recorder.has_column("widgets", "title"));

        unregister_change(930_001).unwrap();
        unregister_change(930_002).unwrap();
    }

    #[test]
    fn test_unregister_reports_presence() {
        register_change(Box::new(CreateWidgets { version: 940_001 })).unwrap();
        assert!(unregister_change(940_001).unwrap());
        assert!(!unregister_change(940_001).unwrap());
    }
}
