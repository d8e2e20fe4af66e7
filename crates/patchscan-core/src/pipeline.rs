use crate::analysis::AnalysisRunner;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::materializer::materialize;
use crate::providers::{GitHubClient, RepositoryHost};
use crate::recommend::{RecommendationCache, RecommendationEngine};
use crate::redact::redact_report;
use crate::repo::RepositoryReference;
use crate::report::{assemble, Report};
use crate::resolver::resolve_tree;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runs the full scan: resolve, materialize, analyze, recommend, report.
pub struct Scanner {
    config: ScanConfig,
    runner: AnalysisRunner,
    engine: RecommendationEngine,
    scratch_parent: Option<PathBuf>,
}

impl Scanner {
    /// The cache is shared with every other holder of the same handle.
    pub fn new(config: ScanConfig, cache: RecommendationCache) -> Self {
        Self {
            runner: AnalysisRunner::from_config(&config),
            engine: RecommendationEngine::new(cache),
            config,
            scratch_parent: None,
        }
    }

    /// Create per-scan scratch directories under `parent` instead of the system temp dir.
    pub fn with_scratch_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.scratch_parent = Some(parent.into());
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// Scan the repository behind `url` on the configured GitHub API.
    pub async fn scan_url(&self, url: &str, token: Option<&str>) -> Result<Report, ScanError> {
        let repo = RepositoryReference::parse(url)?;
        let client = GitHubClient::new(
            repo.clone(),
            token,
            &self.config.api_base,
            self.config.request_timeout(),
        )
        .map_err(|e| ScanError::Internal(format!("{:#}", e)))?;

        self.scan(&client, &repo).await
    }

    /// Scan `repo` through an arbitrary host.
    pub async fn scan(
        &self,
        host: &dyn RepositoryHost,
        repo: &RepositoryReference,
    ) -> Result<Report, ScanError> {
        log::info!("Scanning {}", repo);

        let entries = resolve_tree(host, &self.config.source_suffix).await?;
        if entries.is_empty() {
            return Err(ScanError::EmptyResult {
                suffix: self.config.source_suffix.clone(),
            });
        }

        // Removed when dropped, on every return path below.
        let scratch = self.scratch_dir().await?;
        let files = materialize(host, &entries, scratch.path()).await?;
        let analyzed = self.runner.analyze(files).await;
        let report = assemble(repo, analyzed, &self.engine);

        match tokio::task::spawn_blocking(move || scratch.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => log::warn!("Failed to remove scratch directory: {}", error),
            Err(error) => log::warn!("Scratch cleanup task failed: {}", error),
        }

        log::info!(
            "Scan of {} finished: {} files with findings, {} errors",
            repo,
            report.findings_count(),
            report.error_count()
        );

        Ok(if self.config.redact {
            redact_report(&report)
        } else {
            report
        })
    }

    async fn scratch_dir(&self) -> Result<tempfile::TempDir, ScanError> {
        let parent = self.scratch_parent.clone();
        tokio::task::spawn_blocking(move || create_scratch_dir(parent.as_deref()))
            .await
            .map_err(|e| ScanError::Internal(format!("scratch directory task failed: {}", e)))?
            .map_err(ScanError::from)
    }
}

fn create_scratch_dir(parent: Option<&Path>) -> std::io::Result<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("patchscan-");
    match parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
}

/// Body returned to the caller of a scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScanResponse {
    Report { report: String },
    Error { error: String },
}

/// Map a scan result to a status code and response body.
pub fn respond(result: Result<Report, ScanError>) -> (u16, ScanResponse) {
    match result {
        Ok(report) => (
            200,
            ScanResponse::Report {
                report: report.render_text(),
            },
        ),
        Err(error) => {
            let status = error.status_code();
            let message = match &error {
                ScanError::Input(_) | ScanError::EmptyResult { .. } => error.to_string(),
                _ => format!("An error occurred: {}", error),
            };
            log::error!("Scan request failed ({}): {}", status, error);
            (status, ScanResponse::Error { error: message })
        }
    }
}

/// Handle one inbound request end to end.
///
/// The scan runs on its own task so a panic anywhere in the pipeline
/// becomes a 500 response instead of taking the caller down.
pub async fn handle_scan_request(
    scanner: Arc<Scanner>,
    url: Option<String>,
    token: Option<String>,
) -> (u16, ScanResponse) {
    let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
        return respond(Err(ScanError::Input(
            "please provide a GitHub repository URL".to_string(),
        )));
    };

    let task = tokio::spawn(async move { scanner.scan_url(&url, token.as_deref()).await });
    match task.await {
        Ok(result) => respond(result),
        Err(join_error) => respond(Err(ScanError::Internal(join_error.to_string()))),
    }
}
