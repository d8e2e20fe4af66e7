use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct RecommendationRule {
    id: &'static str,
    trigger: &'static str,
    remediation: &'static str,
}

/// Evaluated top to bottom; the first trigger found in the findings wins.
const RULES: &[RecommendationRule] = &[
    RecommendationRule {
        id: "PSC-REC-001",
        trigger: "SQL injection",
        remediation: "To prevent SQL injection, use parameterized queries or prepared statements.\n\
Example:\n\
cursor.execute(\"SELECT * FROM users WHERE username = %s\", (username,))",
    },
    RecommendationRule {
        id: "PSC-REC-002",
        trigger: "hardcoded password",
        remediation: "Avoid hardcoding passwords in the code. Use environment variables or a secure vault.\n\
Example:\n\
import os\n\
password = os.getenv('DB_PASSWORD')",
    },
    RecommendationRule {
        id: "PSC-REC-003",
        trigger: "use of insecure hash function",
        remediation: "Use a secure hash function like bcrypt or Argon2 instead of MD5 or SHA1.\n\
Example:\n\
import bcrypt\n\
hashed_password = bcrypt.hashpw(password.encode('utf-8'), bcrypt.gensalt())",
    },
    RecommendationRule {
        id: "PSC-REC-004",
        trigger: "insecure deserialization",
        remediation: "Avoid deserializing untrusted data. Use safer serialization formats like JSON.\n\
Example:\n\
import json\n\
data = json.loads(trusted_data)",
    },
];

const GENERIC_REMEDIATION: &str =
    "No specific patch recommendation available. Review the code and follow secure coding practices.";

/// Process-lifetime memo of findings text to remediation text.
///
/// Cloning shares the same underlying map. Entries are never evicted.
#[derive(Clone, Default)]
pub struct RecommendationCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: Mutex<HashMap<String, Arc<str>>>,
    classifications: AtomicUsize,
}

impl RecommendationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the rule table has been evaluated.
    pub fn classifications(&self) -> usize {
        self.inner.classifications.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<str>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Maps findings text to remediation advice, memoized by exact text.
#[derive(Clone, Default)]
pub struct RecommendationEngine {
    cache: RecommendationCache,
}

impl RecommendationEngine {
    pub fn new(cache: RecommendationCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &RecommendationCache {
        &self.cache
    }

    /// Return the remediation for `findings`, classifying it at most once.
    pub fn recommend(&self, findings: &str) -> Arc<str> {
        let mut entries = self.cache.lock();
        if let Some(cached) = entries.get(findings) {
            log::debug!("Reusing recommendation from cache");
            return Arc::clone(cached);
        }

        self.cache
            .inner
            .classifications
            .fetch_add(1, Ordering::SeqCst);
        let remediation: Arc<str> = Arc::from(classify(findings));
        entries.insert(findings.to_string(), Arc::clone(&remediation));
        remediation
    }
}

fn classify(findings: &str) -> &'static str {
    match RULES.iter().find(|rule| findings.contains(rule.trigger)) {
        Some(rule) => {
            log::debug!("Matched recommendation rule {}", rule.id);
            rule.remediation
        }
        None => GENERIC_REMEDIATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_lookup_returns_same_allocation() {
        let engine = RecommendationEngine::default();
        let findings = ">> Issue: [B608] Possible SQL injection vector";

        let first = engine.recommend(findings);
        let second = engine.recommend(findings);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.cache().classifications(), 1);
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn test_first_rule_wins() {
        let engine = RecommendationEngine::default();
        let text = engine.recommend("use of insecure hash function ... SQL injection");
        assert!(text.starts_with("To prevent SQL injection"));
    }

    #[test]
    fn test_each_rule_reachable() {
        let engine = RecommendationEngine::default();
        assert!(engine
            .recommend("Possible hardcoded password: 'hunter2'")
            .contains("environment variables"));
        assert!(engine
            .recommend("use of insecure hash function md5")
            .contains("bcrypt"));
        assert!(engine
            .recommend("insecure deserialization via pickle")
            .contains("json.loads"));
    }

    #[test]
    fn test_no_match_is_generic() {
        let engine = RecommendationEngine::default();
        assert_eq!(
            &*engine.recommend("No issues identified."),
            GENERIC_REMEDIATION
        );
    }

    #[test]
    fn test_near_identical_text_misses_cache() {
        let engine = RecommendationEngine::default();
        engine.recommend("SQL injection in a.py");
        engine.recommend("SQL injection in b.py");
        assert_eq!(engine.cache().classifications(), 2);
    }

    #[test]
    fn test_shared_cache_across_engines_and_threads() {
        let cache = RecommendationCache::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = RecommendationEngine::new(cache.clone());
                std::thread::spawn(move || engine.recommend("hardcoded password found"))
            })
            .collect();

        let results: Vec<Arc<str>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.classifications(), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
