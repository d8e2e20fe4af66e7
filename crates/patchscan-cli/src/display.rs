use colored::*;
use patchscan_core::analysis::AnalysisOutcome;
use patchscan_core::report::{error_text, Report, ReportSection};

/// Print a full scan report to the terminal.
pub fn print_scan_report(report: &Report) {
    println!();
    println!(
        "{}",
        format!(
            " PatchScan v{} — Scanning {}",
            env!("CARGO_PKG_VERSION"),
            report.repository
        )
        .bold()
    );
    println!();

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    for (index, section) in report.sections.iter().enumerate() {
        print_section(index + 1, section);
        println!();
    }

    println!(" {}", "=".repeat(60).dimmed());
    println!();

    println!(" {}", "Summary".bold().underline());
    println!(
        " {} Files analyzed: {}",
        "|-".dimmed(),
        report.sections.len()
    );
    let with_findings = report.findings_count();
    println!(
        " {} With findings:  {}",
        "|-".dimmed(),
        if with_findings > 0 {
            with_findings.to_string().red().bold().to_string()
        } else {
            "0".green().to_string()
        }
    );
    let errors = report.error_count();
    println!(
        " {} Errors:         {}",
        "|-".dimmed(),
        if errors > 0 {
            errors.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        }
    );
    println!(
        " {} Generated at:   {}",
        "|-".dimmed(),
        report.generated_at.to_rfc3339().dimmed()
    );
    println!();
}

fn print_section(number: usize, section: &ReportSection) {
    let tag = match &section.outcome {
        AnalysisOutcome::Findings(_) => " FINDINGS ".on_red().white().bold().to_string(),
        AnalysisOutcome::ToolError(_) => " ERROR ".on_yellow().black().bold().to_string(),
        AnalysisOutcome::FileMissing => " MISSING ".dimmed().to_string(),
    };

    println!(
        " {} {}",
        tag,
        format!("File {}: {}", number, section.file_label).bold()
    );

    match &section.outcome {
        AnalysisOutcome::Findings(findings) => {
            for line in findings.trim_end().lines() {
                println!("   {} {}", "|".dimmed(), line);
            }
            if let Some(recommendation) = &section.recommendation {
                println!("   {} {}", "|".dimmed(), "Patch Recommendations:".cyan());
                for line in recommendation.lines() {
                    println!("   {} {}", "|".dimmed(), line.green());
                }
            }
        }
        outcome => {
            println!("   {} {}", "|".dimmed(), error_text(outcome).yellow());
        }
    }
}

/// Print a fatal scan error.
pub fn print_scan_error(status: u16, message: &str) {
    println!();
    println!(" {} {}", format!(" {} ", status).on_red().white().bold(), message.bold());
    println!();
}
