pub mod analysis;
pub mod config;
pub mod error;
pub mod materializer;
pub mod pipeline;
pub mod providers;
pub mod recommend;
pub mod redact;
pub mod repo;
pub mod report;
pub mod resolver;

pub use analysis::{AnalysisOutcome, AnalysisRunner};
pub use config::ScanConfig;
pub use error::ScanError;
pub use pipeline::{handle_scan_request, respond, ScanResponse, Scanner};
pub use recommend::{RecommendationCache, RecommendationEngine};
pub use repo::RepositoryReference;
pub use report::{Report, ReportSection};
