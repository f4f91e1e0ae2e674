use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::fs;

const ARTIFACT_NAME: &str = "binary.tar";

/// Location of the deployed artifact for `(application, commit)`.
pub fn artifact_path(assets_dir: &Path, application: &str, commit: &str) -> PathBuf {
    assets_dir.join(application).join(commit).join(ARTIFACT_NAME)
}

/// Whether the artifact for `(application, commit)` is present locally.
pub async fn artifact_present(assets_dir: &Path, application: &str, commit: &str) -> bool {
    fs::metadata(artifact_path(assets_dir, application, commit))
        .await
        .is_ok()
}

/// Resolves the deployed commit for an application from the local
/// assets directory, preferring the most recently written artifact.
pub async fn deployed_commit(
    assets_dir: &Path,
    application: &str,
) -> io::Result<Option<(String, PathBuf)>> {
    let dir = assets_dir.join(application);
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut newest: Option<(SystemTime, String, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let artifact = entry.path().join(ARTIFACT_NAME);
        let Ok(meta) = fs::metadata(&artifact).await else {
            continue;
        };
        let Some(commit) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let written = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map(|(at, _, _)| written > *at).unwrap_or(true) {
            newest = Some((written, commit, artifact));
        }
    }

    Ok(newest.map(|(_, commit, path)| (commit, path)))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn resolves_nothing_for_an_unknown_application() {
        let root = tempdir().unwrap();
        let resolved = deployed_commit(root.path(), "sensor-fleet").await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn resolves_a_deployed_commit() {
        let root = tempdir().unwrap();
        let commit_dir = root.path().join("sensor-fleet/abc123");
        std::fs::create_dir_all(&commit_dir).unwrap();
        std::fs::write(commit_dir.join("binary.tar"), b"tar").unwrap();

        // commit directories without an artifact don't count
        std::fs::create_dir_all(root.path().join("sensor-fleet/incomplete")).unwrap();

        let (commit, path) = deployed_commit(root.path(), "sensor-fleet")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(commit, "abc123");
        assert_eq!(path, commit_dir.join("binary.tar"));
    }

    #[tokio::test]
    async fn artifact_presence_follows_the_assets_layout() {
        let root = tempdir().unwrap();
        assert!(!artifact_present(root.path(), "sensor-fleet", "abc123").await);

        let commit_dir = root.path().join("sensor-fleet/abc123");
        std::fs::create_dir_all(&commit_dir).unwrap();
        std::fs::write(commit_dir.join("binary.tar"), b"tar").unwrap();

        assert!(artifact_present(root.path(), "sensor-fleet", "abc123").await);
    }
}
