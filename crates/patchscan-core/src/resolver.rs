use crate::error::ScanError;
use crate::providers::{ContentKind, RepositoryHost};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// A tracked source file discovered in the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
    pub download_locator: Option<String>,
}

type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TreeEntry>, ScanError>> + Send + 'a>>;

/// Enumerate every file under the repository root whose name ends in `suffix`.
///
/// Order is the remote listing order with directories expanded depth-first
/// in place. Any failed listing aborts the walk with no partial result.
pub async fn resolve_tree(
    host: &dyn RepositoryHost,
    suffix: &str,
) -> Result<Vec<TreeEntry>, ScanError> {
    let entries = resolve_path(host, suffix, "").await?;
    log::info!("Resolved {} {} files", entries.len(), suffix);
    Ok(entries)
}

/// Recursive step of [`resolve_tree`] starting at `path`.
pub fn resolve_path<'a>(
    host: &'a dyn RepositoryHost,
    suffix: &'a str,
    path: &'a str,
) -> ResolveFuture<'a> {
    Box::pin(async move {
        let mut entries = Vec::new();
        let listing = host.list_contents(path).await?;

        for item in listing {
            match item.kind {
                ContentKind::File if item.name.ends_with(suffix) => {
                    log::debug!("Tracking {}", item.path);
                    entries.push(TreeEntry {
                        path: item.path,
                        kind: EntryKind::File,
                        download_locator: item.download_url,
                    });
                }
                ContentKind::Dir => {
                    let nested = resolve_path(host, suffix, &item.path).await?;
                    entries.extend(nested);
                }
                _ => {}
            }
        }

        Ok(entries)
    })
}
