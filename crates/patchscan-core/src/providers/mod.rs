pub mod github_api;
pub mod memory;

pub use github_api::{ContentItem, ContentKind, GitHubClient, RepositoryHost};
pub use memory::InMemoryHost;
