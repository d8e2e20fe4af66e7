use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub owner: String,
    pub name: String,
}

impl RepositoryReference {
    /// Parse a user-supplied repository URL.
    ///
    /// Accepted forms:
    /// - `https://github.com/owner/repo` (trailing slash, `.git`, query and fragment ignored)
    /// - `github.com/owner/repo`
    /// - `git@github.com:owner/repo.git`
    /// - `owner/repo`
    ///
    /// The last two path segments are used as owner and name, so deeper URLs
    /// such as `/tree/<branch>` are not understood.
    pub fn parse(url: &str) -> Result<Self, ScanError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ScanError::Input("repository URL is empty".to_string()));
        }

        let without_suffix = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let (has_host, rest) = match without_suffix.split_once("://") {
            Some((_, rest)) => (true, rest),
            None => match without_suffix.split_once(':') {
                // scp-like ssh syntax
                Some((host, rest)) if host.contains('@') => (false, rest),
                _ => (false, without_suffix),
            },
        };

        let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let starts_with_host = segments.first().is_some_and(|s| s.contains('.'));
        if (has_host || starts_with_host) && !segments.is_empty() {
            segments.remove(0);
        }

        if segments.len() < 2 {
            return Err(ScanError::Input(format!(
                "'{}' does not name a repository (expected .../<owner>/<repo>)",
                trimmed
            )));
        }

        let owner = segments[segments.len() - 2];
        let last = segments[segments.len() - 1];
        let name = last.strip_suffix(".git").unwrap_or(last);

        for part in [owner, name] {
            if part.is_empty()
                || part == "."
                || part == ".."
                || part.chars().any(|c| c.is_whitespace())
            {
                return Err(ScanError::Input(format!(
                    "'{}' contains an invalid owner or repository name",
                    trimmed
                )));
            }
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
