use crate::domain::LocationInfo;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },
    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Geolocation disabled")]
    Disabled,
}

/// External geolocation provider.
pub trait GeoLookup: Send + Sync {
    fn lookup(&self) -> BoxFuture<'_, Result<LocationInfo, LookupError>>;
}

/// Lookup used when no provider is configured; always yields the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLookup;

impl GeoLookup for DisabledLookup {
    fn lookup(&self) -> BoxFuture<'_, Result<LocationInfo, LookupError>> {
        futures::future::ready(Err(LookupError::Disabled)).boxed()
    }
}

/// Resolves the session's location at most once.
///
/// Concurrent callers that arrive before the first lookup completes all wait
/// on the same in-flight lookup. Whatever it yields, including the "Unknown"
/// fallback, is cached for the rest of the session.
pub struct LocationResolver {
    lookup: Arc<dyn GeoLookup>,
    timeout: Duration,
    cache: OnceCell<LocationInfo>,
    lookups: AtomicU64,
}

impl LocationResolver {
    pub fn new(lookup: Arc<dyn GeoLookup>) -> Self {
        Self::with_timeout(lookup, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(lookup: Arc<dyn GeoLookup>, timeout: Duration) -> Self {
        Self {
            lookup,
            timeout,
            cache: OnceCell::new(),
            lookups: AtomicU64::new(0),
        }
    }

    pub async fn resolve(&self) -> LocationInfo {
        self.cache
            .get_or_init(|| self.lookup_once())
            .await
            .clone()
    }

    /// Cached value, if resolution already finished.
    pub fn cached(&self) -> Option<&LocationInfo> {
        self.cache.get()
    }

    /// Number of outbound lookups issued so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    async fn lookup_once(&self) -> LocationInfo {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        debug!(timeout = ?self.timeout, "Resolving session location");

        let result = match tokio::time::timeout(self.timeout, self.lookup.lookup()).await {
            Ok(result) => result,
            Err(_) => Err(LookupError::Timeout(self.timeout)),
        };

        match result {
            Ok(location) => {
                info!(
                    country = %location.country,
                    city = %location.city,
                    "Resolved session location"
                );
                location
            }
            Err(e) => {
                warn!(error = %e, "Location lookup failed, caching Unknown fallback");
                LocationInfo::unknown()
            }
        }
    }
}

impl std::fmt::Debug for LocationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResolver")
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.get())
            .field("lookups", &self.lookup_count())
            .finish()
    }
}
