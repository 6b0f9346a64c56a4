//! Loading and saving the backend as a JSON snapshot file.

use std::path::Path;

use shelf_engine::{BackendSnapshot, MemoryBackend, SnapshotMetadata};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Build the backend, restoring it from the snapshot file if one is
/// configured and present.
pub async fn load_backend(config: &Config) -> Result<MemoryBackend> {
    let Some(path) = config.snapshot_path.as_deref() else {
        return Ok(MemoryBackend::new().with_blocked_timeout(config.blocked_timeout));
    };

    if !tokio::fs::try_exists(path).await? {
        tracing::info!(path = %path.display(), "No snapshot found, starting empty");
        return Ok(MemoryBackend::new().with_blocked_timeout(config.blocked_timeout));
    }

    let json = tokio::fs::read_to_string(path).await?;
    let snapshot = BackendSnapshot::from_json(&json).map_err(AppError::Snapshot)?;
    let metadata = SnapshotMetadata::from(&snapshot);
    let backend = MemoryBackend::from_snapshot(snapshot).map_err(AppError::Snapshot)?;

    tracing::info!(
        path = %path.display(),
        databases = metadata.database_count,
        records = metadata.record_count,
        "Snapshot loaded"
    );

    Ok(backend.with_blocked_timeout(config.blocked_timeout))
}

/// Write every database of `backend` to `path`.
pub async fn save_backend(backend: &MemoryBackend, path: &Path) -> Result<()> {
    let snapshot = backend.export_snapshot();
    let json = snapshot.to_json_pretty().map_err(AppError::Snapshot)?;

    // Written beside the target, then renamed over it.
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;

    tracing::info!(
        path = %path.display(),
        records = snapshot.record_count(),
        "Snapshot saved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_engine::{CollectionIdentity, SyncedCollection};
    use serde_json::{json, Value};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("shelf-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_snapshot_starts_empty() {
        let config = Config {
            snapshot_path: Some(temp_path("missing")),
            ..Config::default()
        };

        let backend = load_backend(&config).await.unwrap();
        assert!(backend.databases().is_empty());
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = temp_path("roundtrip");
        let backend = MemoryBackend::new();
        {
            let todos: SyncedCollection<Value> = SyncedCollection::connect(
                backend.clone(),
                CollectionIdentity::new("TodoApp", 1, "todos"),
            )
            .await;
            todos.add(&json!({"id": "1", "text": "a"})).await.unwrap();
        }

        save_backend(&backend, &path).await.unwrap();
        let config = Config {
            snapshot_path: Some(path.clone()),
            ..Config::default()
        };
        let restored = load_backend(&config).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(restored.databases(), vec![("TodoApp".to_string(), 1)]);
        assert_eq!(restored.export_snapshot(), backend.export_snapshot());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let path = temp_path("corrupt");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let config = Config {
            snapshot_path: Some(path.clone()),
            ..Config::default()
        };

        let result = load_backend(&config).await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(matches!(result, Err(AppError::Snapshot(_))));
    }
}
