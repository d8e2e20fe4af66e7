use super::github_api::{ContentItem, ContentKind, RepositoryHost};
use crate::error::ScanError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory repository host for tests and offline runs.
///
/// Files added with [`InMemoryHost::with_file`] register themselves (and any
/// missing parent directories) in insertion order.
#[derive(Default)]
pub struct InMemoryHost {
    listings: HashMap<String, Vec<ContentItem>>,
    blobs: HashMap<String, Vec<u8>>,
    failing_listings: HashSet<String>,
    listing_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        let mut host = Self::default();
        host.listings.insert(String::new(), Vec::new());
        host
    }

    pub fn with_file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        let locator = self.register_file(path);
        self.blobs.insert(locator, content.into());
        self
    }

    /// A file whose download always fails.
    pub fn with_unreachable_file(mut self, path: &str) -> Self {
        self.register_file(path);
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.ensure_dir(path);
        self
    }

    /// Make the listing of `path` fail with a server error.
    pub fn failing_listing(mut self, path: &str) -> Self {
        self.failing_listings.insert(path.to_string());
        self
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn register_file(&mut self, path: &str) -> String {
        let (parent, name) = split_parent(path);
        self.ensure_dir(parent);
        let locator = format!("memory://{}", path);
        self.listings
            .entry(parent.to_string())
            .or_default()
            .push(ContentItem {
                kind: ContentKind::File,
                name: name.to_string(),
                path: path.to_string(),
                download_url: Some(locator.clone()),
            });
        locator
    }

    fn ensure_dir(&mut self, dir: &str) {
        if dir.is_empty() {
            self.listings.entry(String::new()).or_default();
            return;
        }
        if self.listings.contains_key(dir) {
            return;
        }
        let (parent, name) = split_parent(dir);
        self.ensure_dir(parent);
        self.listings
            .entry(parent.to_string())
            .or_default()
            .push(ContentItem {
                kind: ContentKind::Dir,
                name: name.to_string(),
                path: dir.to_string(),
                download_url: None,
            });
        self.listings.insert(dir.to_string(), Vec::new());
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

#[async_trait]
impl RepositoryHost for InMemoryHost {
    async fn list_contents(&self, path: &str) -> Result<Vec<ContentItem>, ScanError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_listings.contains(path) {
            return Err(ScanError::upstream(
                path,
                "GitHub API returned 500 Internal Server Error",
            ));
        }

        self.listings
            .get(path)
            .cloned()
            .ok_or_else(|| ScanError::upstream(path, "GitHub API returned 404 Not Found"))
    }

    async fn download(&self, locator: &str) -> anyhow::Result<Vec<u8>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .get(locator)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("File download returned error: 404 Not Found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nested_file_registers_parents_in_order() {
        let host = InMemoryHost::new()
            .with_file("a.py", "x")
            .with_file("pkg/inner/b.py", "y");

        let root = host.list_contents("").await.unwrap();
        let names: Vec<_> = root.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.py", "pkg"]);

        let inner = host.list_contents("pkg/inner").await.unwrap();
        assert_eq!(inner[0].path, "pkg/inner/b.py");
        assert_eq!(host.listing_calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_listing_is_upstream_error() {
        let host = InMemoryHost::new();
        let err = host.list_contents("nope").await.unwrap_err();
        assert!(matches!(err, ScanError::Upstream { .. }));
    }
}
