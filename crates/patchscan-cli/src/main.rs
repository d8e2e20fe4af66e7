mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use patchscan_core::config::{default_config_path, token_from_env};
use patchscan_core::{handle_scan_request, RecommendationCache, ScanConfig, ScanError, Scanner};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "patchscan",
    version,
    about = "PatchScan — Repository Vulnerability Scanner & Patch Advisor",
    long_about = "Scan a GitHub repository with an external static-analysis tool and get a patch recommendation for every file with findings."
)]
struct Cli {
    /// Verbose logging (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a remote repository and print the vulnerability report
    Scan {
        /// Repository URL, e.g. https://github.com/owner/repo
        url: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// GitHub API token (defaults to $GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,

        /// Path to a TOML config file (defaults to $PATCHSCAN_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the analysis tool command
        #[arg(long)]
        tool: Option<String>,

        /// Override the tracked source file suffix
        #[arg(long)]
        suffix: Option<String>,

        /// Mask credential-looking values in findings
        #[arg(long)]
        redact: bool,
    },

    /// Write a template config file
    InitConfig {
        /// Output path
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan {
            url,
            format,
            token,
            config,
            tool,
            suffix,
            redact,
        } => {
            let mut scan_config = ScanConfig::load(config.as_deref())?;
            if let Some(tool) = tool {
                scan_config.tool = tool;
            }
            if let Some(suffix) = suffix {
                scan_config.source_suffix = suffix;
            }
            scan_config.redact |= redact;
            cmd_scan(&url, &format, token_from_env(token), scan_config).await
        }
        Commands::InitConfig { path } => cmd_init_config(path.unwrap_or_else(default_config_path)),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn cmd_scan(
    url: &str,
    format: &str,
    token: Option<String>,
    config: ScanConfig,
) -> Result<ExitCode> {
    if token.is_none() {
        log::warn!("No GitHub token configured; unauthenticated API rate limits apply");
    }

    let scanner = Arc::new(Scanner::new(config, RecommendationCache::new()));

    match format {
        "json" => {
            let (status, body) =
                handle_scan_request(scanner, Some(url.to_string()), token).await;
            let json = serde_json::to_string_pretty(&body)?;
            println!("{}", json);
            Ok(exit_code(status))
        }
        _ => match scanner.scan_url(url, token.as_deref()).await {
            Ok(report) => {
                display::print_scan_report(&report);
                Ok(ExitCode::SUCCESS)
            }
            Err(error) => {
                let status = error.status_code();
                display::print_scan_error(status, &error.to_string());
                if let ScanError::Input(_) = error {
                    eprintln!("Usage: patchscan scan https://github.com/<owner>/<repo>");
                }
                Ok(exit_code(status))
            }
        },
    }
}

fn cmd_init_config(path: PathBuf) -> Result<ExitCode> {
    let created = ScanConfig::scaffold(&path)
        .with_context(|| format!("Failed to initialize config at {}", path.display()))?;
    if created {
        println!("Config template written to {}", path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_code(status: u16) -> ExitCode {
    match status {
        200 => ExitCode::SUCCESS,
        400 => ExitCode::from(2),
        404 => ExitCode::from(3),
        502 => ExitCode::from(4),
        _ => ExitCode::FAILURE,
    }
}
