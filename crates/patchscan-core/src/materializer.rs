use crate::error::ScanError;
use crate::providers::RepositoryHost;
use crate::resolver::TreeEntry;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// A remote file copied into scratch storage.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedFile {
    pub relative_path: String,
    pub local_path: PathBuf,
    /// Set when the bytes could not be fetched or written; nothing is written then.
    pub download_error: Option<String>,
}

impl MaterializedFile {
    pub fn is_downloaded(&self) -> bool {
        self.download_error.is_none()
    }
}

/// Download every entry below `scratch_root`, preserving relative paths.
///
/// Output order equals input order. Per-file failures are recorded on the
/// returned file instead of aborting.
pub async fn materialize(
    host: &dyn RepositoryHost,
    entries: &[TreeEntry],
    scratch_root: &Path,
) -> Result<Vec<MaterializedFile>, ScanError> {
    tokio::fs::create_dir_all(scratch_root).await?;

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let file = materialize_one(host, entry, scratch_root).await;
        if let Some(error) = &file.download_error {
            log::warn!("Failed to materialize {}: {}", entry.path, error);
        }
        files.push(file);
    }

    log::info!(
        "Materialized {}/{} files into {}",
        files.iter().filter(|f| f.is_downloaded()).count(),
        files.len(),
        scratch_root.display()
    );
    Ok(files)
}

async fn materialize_one(
    host: &dyn RepositoryHost,
    entry: &TreeEntry,
    scratch_root: &Path,
) -> MaterializedFile {
    let failed = |local_path: PathBuf, error: String| MaterializedFile {
        relative_path: entry.path.clone(),
        local_path,
        download_error: Some(error),
    };

    let Some(relative) = safe_relative_path(&entry.path) else {
        return failed(
            scratch_root.to_path_buf(),
            format!("Refusing to write outside scratch directory: {}", entry.path),
        );
    };
    let local_path = scratch_root.join(relative);

    let Some(locator) = entry.download_locator.as_deref() else {
        return failed(local_path, "No download URL for file".to_string());
    };

    if let Some(parent) = local_path.parent() {
        if let Err(error) = tokio::fs::create_dir_all(parent).await {
            return failed(local_path, format!("Failed to create directory: {}", error));
        }
    }

    let bytes = match host.download(locator).await {
        Ok(bytes) => bytes,
        Err(error) => return failed(local_path, format!("{:#}", error)),
    };

    if let Err(error) = tokio::fs::write(&local_path, &bytes).await {
        return failed(local_path, format!("Failed to write file: {}", error));
    }

    log::debug!("Wrote {} bytes to {}", bytes.len(), local_path.display());
    MaterializedFile {
        relative_path: entry.path.clone(),
        local_path,
        download_error: None,
    }
}

/// Only plain relative components may land under the scratch root.
fn safe_relative_path(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemoryHost;
    use crate::resolver::resolve_tree;

    #[tokio::test]
    async fn test_preserves_relative_paths_and_order() {
        let host = InMemoryHost::new()
            .with_file("a.py", "print('a')")
            .with_file("pkg/mod/b.py", "print('b')");
        let entries = resolve_tree(&host, ".py").await.unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let files = materialize(&host, &entries, scratch.path()).await.unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].relative_path, "a.py");
        assert_eq!(files[1].local_path, scratch.path().join("pkg/mod/b.py"));
        assert_eq!(
            std::fs::read_to_string(&files[1].local_path).unwrap(),
            "print('b')"
        );
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let host = InMemoryHost::new().with_file("a.py", "new");
        let entries = resolve_tree(&host, ".py").await.unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::write(scratch.path().join("a.py"), "old content that is longer").unwrap();

        materialize(&host, &entries, scratch.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(scratch.path().join("a.py")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn test_failed_download_is_recorded_not_written() {
        let host = InMemoryHost::new()
            .with_unreachable_file("gone.py")
            .with_file("ok.py", "x = 1");
        let entries = resolve_tree(&host, ".py").await.unwrap();
        let scratch = tempfile::tempdir().unwrap();

        let files = materialize(&host, &entries, scratch.path()).await.unwrap();

        assert!(!files[0].is_downloaded());
        assert!(!files[0].local_path.exists());
        assert!(files[1].is_downloaded());
    }

    #[tokio::test]
    async fn test_escaping_path_is_rejected() {
        let host = InMemoryHost::new();
        let entries = vec![TreeEntry {
            path: "../evil.py".to_string(),
            kind: crate::resolver::EntryKind::File,
            download_locator: Some("memory://../evil.py".to_string()),
        }];
        let scratch = tempfile::tempdir().unwrap();

        let files = materialize(&host, &entries, scratch.path()).await.unwrap();

        assert!(files[0]
            .download_error
            .as_deref()
            .unwrap()
            .contains("outside scratch directory"));
        assert_eq!(host.download_calls(), 0);
    }

    #[test]
    fn test_safe_relative_path() {
        assert_eq!(safe_relative_path("./a/b.py"), Some(PathBuf::from("a/b.py")));
        assert!(safe_relative_path("/etc/passwd").is_none());
        assert!(safe_relative_path("a/../../b.py").is_none());
        assert!(safe_relative_path("").is_none());
    }
}
