//! Published WordPress image tag catalog
//!
//! Fetches the list of plain-semver tags from the registry's repository
//! API, newest first, with a JSON file cache so repeated UI requests do
//! not hammer the registry.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

const DEFAULT_REPOSITORY: &str = "library/wordpress";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct TagPage {
    results: Vec<TagEntry>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedTags {
    fetched_at: DateTime<Utc>,
    tags: Vec<String>,
}

pub struct TagCatalog {
    repository: String,
    cache_path: PathBuf,
    ttl: chrono::Duration,
}

impl TagCatalog {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            repository: DEFAULT_REPOSITORY.to_string(),
            cache_path: cache_path.into(),
            ttl: chrono::Duration::hours(1),
        }
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Semver image tags, newest first. Served from the file cache while
    /// fresh; refetched (and re-cached) once stale.
    pub async fn tags(&self) -> anyhow::Result<Vec<String>> {
        if let Some(cached) = self.load_cache() {
            debug!(count = cached.len(), "Serving tags from cache");
            return Ok(cached);
        }

        let tags = self.fetch_all().await?;
        self.store_cache(&tags);
        Ok(tags)
    }

    fn load_cache(&self) -> Option<Vec<String>> {
        let content = std::fs::read_to_string(&self.cache_path).ok()?;
        let cached: CachedTags = serde_json::from_str(&content).ok()?;
        if Utc::now() - cached.fetched_at > self.ttl {
            return None;
        }
        Some(cached.tags)
    }

    fn store_cache(&self, tags: &[String]) {
        let cached = CachedTags {
            fetched_at: Utc::now(),
            tags: tags.to_vec(),
        };
        if let Ok(content) = serde_json::to_string_pretty(&cached) {
            // A failed cache write only costs a refetch next time
            let _ = std::fs::write(&self.cache_path, content);
        }
    }

    async fn fetch_all(&self) -> anyhow::Result<Vec<String>> {
        let client = reqwest::Client::new();
        let mut url = format!(
            "https://registry.hub.docker.com/v2/repositories/{}/tags?page_size={}",
            self.repository, PAGE_SIZE
        );
        let mut tags = Vec::new();

        loop {
            let page: TagPage = client
                .get(&url)
                .send()
                .await
                .context("registry request failed")?
                .error_for_status()
                .context("registry returned an error status")?
                .json()
                .await
                .context("invalid registry response")?;

            tags.extend(
                page.results
                    .into_iter()
                    .map(|entry| entry.name)
                    .filter(|name| semver_triple(name).is_some()),
            );

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }

        tags.sort_by(|a, b| semver_triple(b).cmp(&semver_triple(a)));
        info!(
            repository = %self.repository,
            count = tags.len(),
            "Fetched image tag catalog"
        );
        Ok(tags)
    }
}

/// Parse `X.Y.Z` into a sortable triple; anything else is filtered out
fn semver_triple(tag: &str) -> Option<(u64, u64, u64)> {
    let mut parts = tag.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semver_triple_filters_tags() {
        assert_eq!(semver_triple("6.4.0"), Some((6, 4, 0)));
        assert_eq!(semver_triple("6.4"), None);
        assert_eq!(semver_triple("latest"), None);
        assert_eq!(semver_triple("6.4.0-php8.2"), None);
        assert_eq!(semver_triple("6.4.0.1"), None);
    }

    #[test]
    fn test_semver_ordering_newest_first() {
        let mut tags = vec!["6.3.2".to_string(), "6.10.0".to_string(), "6.4.0".to_string()];
        tags.sort_by(|a, b| semver_triple(b).cmp(&semver_triple(a)));
        assert_eq!(tags, vec!["6.10.0", "6.4.0", "6.3.2"]);
    }

    #[test]
    fn test_cache_round_trip_and_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        let catalog = TagCatalog::new(&path);

        catalog.store_cache(&["6.4.0".to_string()]);
        assert_eq!(catalog.load_cache(), Some(vec!["6.4.0".to_string()]));

        // Backdate the cache beyond the TTL
        let stale = CachedTags {
            fetched_at: Utc::now() - chrono::Duration::hours(2),
            tags: vec!["6.4.0".to_string()],
        };
        std::fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();
        assert_eq!(catalog.load_cache(), None);
    }
}
