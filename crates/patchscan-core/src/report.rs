use crate::analysis::{AnalysisOutcome, AnalyzedFile};
use crate::recommend::RecommendationEngine;
use crate::repo::RepositoryReference;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// One file's entry in the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub file_label: String,
    pub outcome: AnalysisOutcome,
    pub recommendation: Option<String>,
}

/// The complete scan report, one section per materialized file.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub repository: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<ReportSection>,
}

/// Build the report in materialization order, attaching recommendations to findings.
pub fn assemble(
    repository: &RepositoryReference,
    analyzed: Vec<AnalyzedFile>,
    engine: &RecommendationEngine,
) -> Report {
    let sections = analyzed
        .into_iter()
        .map(|item| {
            let recommendation = item
                .outcome
                .findings()
                .map(|findings| engine.recommend(findings).to_string());
            ReportSection {
                file_label: item.file.relative_path,
                outcome: item.outcome,
                recommendation,
            }
        })
        .collect();

    Report {
        repository: repository.to_string(),
        generated_at: Utc::now(),
        sections,
    }
}

impl Report {
    pub fn findings_count(&self) -> usize {
        self.sections.iter().filter(|s| !s.outcome.is_error()).count()
    }

    pub fn error_count(&self) -> usize {
        self.sections.iter().filter(|s| s.outcome.is_error()).count()
    }

    pub fn file_labels(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.file_label.as_str()).collect()
    }

    /// Plain-text transcription of the sections, in order.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Vulnerability Analysis Report: {}\n", self.repository);

        for (index, section) in self.sections.iter().enumerate() {
            let _ = writeln!(out, "File {}: {}", index + 1, section.file_label);
            match &section.outcome {
                AnalysisOutcome::Findings(findings) => {
                    let _ = writeln!(out, "Vulnerabilities:\n{}", findings.trim_end());
                    let _ = writeln!(
                        out,
                        "Patch Recommendations:\n{}\n",
                        section.recommendation.as_deref().unwrap_or_default()
                    );
                }
                outcome => {
                    let _ = writeln!(out, "Error: {}\n", error_text(outcome));
                }
            }
        }

        out
    }
}

/// Human-readable error line for a non-findings outcome.
pub fn error_text(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::FileMissing => "File not found".to_string(),
        AnalysisOutcome::ToolError(text) => text.trim_end().to_string(),
        AnalysisOutcome::Findings(_) => String::new(),
    }
}
