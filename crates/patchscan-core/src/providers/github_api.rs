use crate::error::ScanError;
use crate::repo::RepositoryReference;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{ClientBuilder, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kind of an item in a contents listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One item of a `GET contents/{path}` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub name: String,
    pub path: String,
    pub download_url: Option<String>,
}

/// The remote side of a scan: directory listings and raw file downloads.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// List the entries directly under `path` (root is `""`).
    ///
    /// A non-success response is an [`ScanError::Upstream`].
    async fn list_contents(&self, path: &str) -> Result<Vec<ContentItem>, ScanError>;

    /// Fetch the raw bytes behind a download locator.
    async fn download(&self, locator: &str) -> Result<Vec<u8>>;
}

/// GitHub contents API client bound to one repository.
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: Url,
    repo: RepositoryReference,
}

impl GitHubClient {
    /// Create a new GitHub API client for `repo`.
    pub fn new(
        repo: RepositoryReference,
        token: Option<&str>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_builder(repo, client_builder(token, timeout)?, base_url)
    }

    fn with_builder(
        repo: RepositoryReference,
        builder: ClientBuilder,
        base_url: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid GitHub API base URL '{}'", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("GitHub API base URL '{}' cannot carry a path", base_url);
        }

        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            repo,
        })
    }

    pub fn repository(&self) -> &RepositoryReference {
        &self.repo
    }

    /// Every `/`-separated part of `path` is pushed as its own encoded segment.
    fn contents_url(&self, path: &str) -> Result<Url, ScanError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ScanError::Internal(format!("base URL '{}' cannot carry a path", self.base_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str(), "contents"]);
            for part in path.split('/').filter(|part| !part.is_empty()) {
                segments.push(part);
            }
        }
        Ok(url)
    }
}

fn client_builder(token: Option<&str>, timeout: Duration) -> Result<ClientBuilder> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("PatchScan/", env!("CARGO_PKG_VERSION"))),
    );

    if let Some(t) = token {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {}", t)).context("Invalid GitHub token")?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout))
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn list_contents(&self, path: &str) -> Result<Vec<ContentItem>, ScanError> {
        let url = self.contents_url(path)?;
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::upstream(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::upstream(
                path,
                format!("GitHub API returned {}", status),
            ));
        }

        response
            .json::<Vec<ContentItem>>()
            .await
            .map_err(|e| ScanError::upstream(path, format!("unexpected listing format: {}", e)))
    }

    async fn download(&self, locator: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(locator)
            .send()
            .await
            .context("Failed to download file")?
            .error_for_status()
            .context("File download returned error")?
            .bytes()
            .await
            .context("Failed to read file bytes")?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn repo() -> RepositoryReference {
        RepositoryReference::parse("octo/hello").unwrap()
    }

    fn client() -> GitHubClient {
        GitHubClient::new(
            repo(),
            Some("secret-token"),
            "https://api.github.com/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    /// Client pointed at a local server, bypassing any proxy from the environment.
    fn local_client(base_url: &str) -> GitHubClient {
        let builder = client_builder(Some("secret-token"), Duration::from_secs(5))
            .unwrap()
            .no_proxy();
        GitHubClient::with_builder(repo(), builder, base_url).unwrap()
    }

    /// Answer one request with a canned response; the handle yields the request line.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()
        });

        (base, handle)
    }

    #[test]
    fn test_contents_url() {
        let client = client();
        assert_eq!(
            client.contents_url("").unwrap().as_str(),
            "https://api.github.com/repos/octo/hello/contents"
        );
        assert_eq!(
            client.contents_url("src/app").unwrap().as_str(),
            "https://api.github.com/repos/octo/hello/contents/src/app"
        );
    }

    #[test]
    fn test_contents_url_encodes_reserved_characters() {
        let client = client();
        let url = client.contents_url("docs#1").unwrap();
        assert_eq!(url.path(), "/repos/octo/hello/contents/docs%231");
        assert!(url.fragment().is_none());

        let url = client.contents_url("what?/a b").unwrap();
        assert_eq!(url.path(), "/repos/octo/hello/contents/what%3F/a%20b");
        assert!(url.query().is_none());
    }

    #[test]
    fn test_contents_url_keeps_base_path() {
        let client = GitHubClient::new(
            repo(),
            None,
            "https://ghe.example.com/api/v3/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.contents_url("pkg").unwrap().path(),
            "/api/v3/repos/octo/hello/contents/pkg"
        );
    }

    #[test]
    fn test_listing_deserialization() {
        let json = r#"[
            {"type":"file","name":"a.py","path":"a.py","download_url":"https://raw/a.py","sha":"x"},
            {"type":"dir","name":"sub","path":"sub","download_url":null},
            {"type":"symlink","name":"link","path":"link","download_url":"https://raw/link"}
        ]"#;
        let items: Vec<ContentItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].kind, ContentKind::File);
        assert_eq!(items[1].kind, ContentKind::Dir);
        assert!(items[1].download_url.is_none());
        assert_eq!(items[2].kind, ContentKind::Other);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = GitHubClient::new(
            repo(),
            Some("bad\ntoken"),
            "https://api.github.com",
            Duration::from_secs(5),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(GitHubClient::new(repo(), None, "not a url", Duration::from_secs(5)).is_err());
        assert!(GitHubClient::new(repo(), None, "mailto:x@y.z", Duration::from_secs(5)).is_err());
    }

    // ─── Against a local server ───

    #[tokio::test]
    async fn test_listing_sends_encoded_path() {
        let (base, server) = serve_once(
            "200 OK",
            r#"[{"type":"file","name":"a.py","path":"docs#1/a.py","download_url":null}]"#,
        )
        .await;

        let items = local_client(&base).list_contents("docs#1").await.unwrap();

        assert_eq!(items[0].path, "docs#1/a.py");
        assert_eq!(
            server.await.unwrap(),
            "GET /repos/octo/hello/contents/docs%231 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_listing_error_status_is_upstream() {
        let (base, server) = serve_once("403 Forbidden", r#"{"message":"rate limited"}"#).await;

        let err = local_client(&base).list_contents("sub").await.unwrap_err();
        server.await.unwrap();

        match err {
            ScanError::Upstream { path, reason } => {
                assert_eq!(path, "sub");
                assert!(reason.contains("403"), "reason was {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_listing_is_upstream() {
        let (base, server) = serve_once("200 OK", r#"{"not":"a list"}"#).await;

        let err = local_client(&base).list_contents("").await.unwrap_err();
        server.await.unwrap();

        match err {
            ScanError::Upstream { path, reason } => {
                assert_eq!(path, "/");
                assert!(reason.starts_with("unexpected listing format"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_download_error_status_is_err() {
        let (base, server) = serve_once("404 Not Found", "").await;

        let result = local_client(&base)
            .download(&format!("{}/raw/octo/hello/main/a.py", base))
            .await;
        server.await.unwrap();

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("File download returned error"), "message was {message}");
    }

    #[tokio::test]
    async fn test_download_returns_body() {
        let (base, server) = serve_once("200 OK", "import os\n").await;

        let bytes = local_client(&base)
            .download(&format!("{}/raw/a.py", base))
            .await
            .unwrap();

        assert_eq!(bytes, b"import os\n");
        assert_eq!(server.await.unwrap(), "GET /raw/a.py HTTP/1.1");
    }
}
