use crate::config::ScanConfig;
use crate::materializer::MaterializedFile;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Result of running the analysis tool against one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// The tool printed something on stdout.
    Findings(String),
    /// The tool printed nothing, could not run, or the file never arrived.
    ToolError(String),
    /// The materialized file disappeared before analysis.
    FileMissing,
}

impl AnalysisOutcome {
    pub fn findings(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Findings(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, AnalysisOutcome::Findings(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedFile {
    pub file: MaterializedFile,
    pub outcome: AnalysisOutcome,
}

/// Runs `<tool> <args...> <path>` once per file.
#[derive(Debug, Clone)]
pub struct AnalysisRunner {
    tool: String,
    args: Vec<String>,
    timeout: Duration,
}

impl AnalysisRunner {
    pub fn new(tool: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.tool.clone(), config.tool_args.clone(), config.tool_timeout())
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Analyze files strictly one at a time, preserving order.
    pub async fn analyze(&self, files: Vec<MaterializedFile>) -> Vec<AnalyzedFile> {
        let mut analyzed = Vec::with_capacity(files.len());
        for file in files {
            let outcome = self.analyze_file(&file).await;
            analyzed.push(AnalyzedFile { file, outcome });
        }
        analyzed
    }

    pub async fn analyze_file(&self, file: &MaterializedFile) -> AnalysisOutcome {
        log::debug!("Analyzing file: {}", file.relative_path);

        if let Some(error) = &file.download_error {
            return AnalysisOutcome::ToolError(format!("Download failed: {}", error));
        }

        match tokio::fs::try_exists(&file.local_path).await {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("File not found: {}", file.local_path.display());
                return AnalysisOutcome::FileMissing;
            }
            Err(error) => {
                return AnalysisOutcome::ToolError(format!(
                    "Failed to check {}: {}",
                    file.local_path.display(),
                    error
                ))
            }
        }

        match self.run_tool(file).await {
            Ok((stdout, stderr)) => classify(&self.tool, stdout, stderr),
            Err(message) => {
                log::warn!("{}", message);
                AnalysisOutcome::ToolError(message)
            }
        }
    }

    async fn run_tool(&self, file: &MaterializedFile) -> Result<(String, String), String> {
        let child = Command::new(&self.tool)
            .args(&self.args)
            .arg(&file.local_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| format!("Error running {}: {}", self.tool, error))?;

        // On timeout the child is dropped, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                format!(
                    "{} timed out after {}s on {}",
                    self.tool,
                    self.timeout.as_secs_f64(),
                    file.relative_path
                )
            })?
            .map_err(|error| format!("Error running {}: {}", self.tool, error))?;

        log::debug!(
            "{} exited with {} for {}",
            self.tool,
            output.status,
            file.relative_path
        );

        Ok((
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Non-empty stdout means findings; the exit status is ignored.
fn classify(tool: &str, stdout: String, stderr: String) -> AnalysisOutcome {
    if !stdout.is_empty() {
        AnalysisOutcome::Findings(stdout)
    } else if stderr.trim().is_empty() {
        AnalysisOutcome::ToolError(format!("{} produced no output", tool))
    } else {
        AnalysisOutcome::ToolError(format!("{} failed: {}", tool, stderr))
    }
}
