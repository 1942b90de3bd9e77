//! Expiring download links for report artifacts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

/// Lifetime of a link to a successfully generated report.
pub const SUCCESS_LINK_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of a link to an error artifact.
pub const FAILURE_LINK_TTL: Duration = Duration::from_secs(60);

struct IssuedLink {
    path: PathBuf,
    expires_at: Instant,
}

/// Mints unguessable tokens bound to artifact paths.
///
/// Links are served under `{base_url}/reports/{token}` and stop resolving
/// once their lifetime has elapsed.
pub struct LinkIssuer {
    base_url: String,
    links: RwLock<HashMap<String, IssuedLink>>,
}

impl LinkIssuer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            links: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bind `path` to a fresh token and return its URL.
    pub fn issue(&self, path: PathBuf, ttl: Duration) -> String {
        self.purge_expired();

        let token = Uuid::new_v4().simple().to_string();
        self.links.write().insert(
            token.clone(),
            IssuedLink {
                path,
                expires_at: Instant::now() + ttl,
            },
        );
        format!("{}/reports/{}", self.base_url, token)
    }

    /// Artifact path for `token`, if it exists and has not expired.
    pub fn resolve(&self, token: &str) -> Option<PathBuf> {
        let links = self.links.read();
        let link = links.get(token)?;
        (Instant::now() < link.expires_at).then(|| link.path.clone())
    }

    /// Drop expired links. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|_, link| now < link.expires_at);
        before - links.len()
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}
