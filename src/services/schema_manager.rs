//! Schema acquisition orchestration.
//!
//! Resolution order for every call:
//!
//! 1. Fresh local entry → returned as-is
//! 2. Remote fetch + validation → written to the store, returned fresh
//! 3. Previously valid local entry → returned stale with a warning
//! 4. Bundled fallback file → written to the store, returned stale
//! 5. Otherwise unavailable

use super::{Clock, SingleFlight, SystemClock};
use crate::config::SchemaCacheConfig;
use crate::fetch::{
    FetchErrorKind, RemoteFetcher, RetryPolicy, RetryingFetcher, SchemaFetcher, UnconfiguredFetcher,
};
use crate::models::{
    CacheMetadata, CacheSource, SchemaDocument, SchemaState, SchemaStatus, StaleWarning,
};
use crate::storage::{LocalStore, is_fresh};
use crate::validation::validate;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// The mutable state behind one cached schema.
///
/// Owned by a [`SchemaManager`] and shared through an `Arc`; there is no
/// process-wide instance.
#[derive(Debug)]
pub struct CacheSlot {
    store: LocalStore,
    flight: SingleFlight<Result<SchemaStatus>>,
    state: AtomicU8,
}

impl CacheSlot {
    /// Creates a slot backed by `store`.
    #[must_use]
    pub const fn new(store: LocalStore) -> Self {
        Self {
            store,
            flight: SingleFlight::new(),
            state: AtomicU8::new(SchemaState::Uninitialized.to_u8()),
        }
    }

    /// Opens a slot in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(LocalStore::open(dir)?))
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SchemaState {
        SchemaState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SchemaState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }
}

/// Diagnostic snapshot of a cache slot.
#[derive(Debug, Clone, Serialize)]
pub struct SlotReport {
    /// Current slot state.
    pub state: SchemaState,
    /// Cache directory.
    pub cache_dir: PathBuf,
    /// Configured endpoint.
    pub endpoint: Option<String>,
    /// TTL the manager applies.
    pub ttl_hours: u64,
    /// Whether the cached entry would be served without a fetch.
    pub fresh: bool,
    /// Age of the cached entry in seconds.
    pub age_seconds: Option<i64>,
    /// Committed metadata, if any.
    pub metadata: Option<CacheMetadata>,
}

/// Obtains, validates, caches and serves the schema document.
pub struct SchemaManager {
    slot: Arc<CacheSlot>,
    fetcher: Box<dyn SchemaFetcher>,
    ttl_hours: u64,
    bundled_schema_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl SchemaManager {
    /// Creates a manager over an existing slot.
    #[must_use]
    pub fn new(slot: Arc<CacheSlot>, fetcher: impl SchemaFetcher + 'static, ttl_hours: u64) -> Self {
        Self {
            slot,
            fetcher: Box::new(fetcher),
            ttl_hours,
            bundled_schema_path: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Builds a manager from configuration.
    ///
    /// Without a configured endpoint every refresh fails, so only cached or
    /// bundled copies are served.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the cache directory
    /// cannot be created.
    pub fn from_config(config: &SchemaCacheConfig) -> Result<Self> {
        config.validate()?;

        let store = LocalStore::open(&config.cache_dir)?
            .with_max_document_bytes(config.max_document_bytes);
        let slot = Arc::new(CacheSlot::new(store));

        let manager = if config.endpoint.is_some() {
            let fetcher = RetryingFetcher::new(
                RemoteFetcher::from_config(config)?,
                RetryPolicy::from_config(config),
            );
            Self::new(slot, fetcher, config.effective_ttl_hours())
        } else {
            tracing::warn!("No GraphQL endpoint configured; serving cached schema only");
            Self::new(slot, UnconfiguredFetcher, config.effective_ttl_hours())
        };

        Ok(manager.with_bundled_schema(config.bundled_schema_path.clone()))
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the schema file used when nothing is cached.
    #[must_use]
    pub fn with_bundled_schema(mut self, path: Option<PathBuf>) -> Self {
        self.bundled_schema_path = path;
        self
    }

    /// Returns the cache slot.
    #[must_use]
    pub const fn slot(&self) -> &Arc<CacheSlot> {
        &self.slot
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SchemaState {
        self.slot.state()
    }

    /// Returns the best available schema, refreshing it if needed.
    ///
    /// Network and validation failures are recovered from and reported
    /// through [`SchemaStatus::Stale`] or [`SchemaStatus::Unavailable`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the endpoint rejected the credentials, even
    /// when a stale copy exists, and [`Error::Io`] if the cache directory
    /// cannot be read or written.
    pub fn ensure_schema(&self) -> Result<SchemaStatus> {
        self.acquire(false)
    }

    /// Like [`Self::ensure_schema`] but always contacts the endpoint first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] on rejected credentials and [`Error::Io`] if
    /// the cache directory cannot be read or written.
    pub fn force_refresh(&self) -> Result<SchemaStatus> {
        self.acquire(true)
    }

    /// Returns the best available schema document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaUnavailable`] if no document exists by any
    /// path, [`Error::Auth`] on rejected credentials, or [`Error::Io`] on
    /// cache failures.
    pub fn get_schema_content(&self) -> Result<Arc<SchemaDocument>> {
        self.ensure_schema()?.into_document()
    }

    /// Returns true if a schema document (fresh or stale) can be served.
    #[must_use]
    pub fn is_schema_available(&self) -> bool {
        match self.ensure_schema() {
            Ok(status) => status.is_available(),
            Err(e) => {
                tracing::warn!(error = %e, "Schema availability check failed");
                false
            },
        }
    }

    /// Reports the slot without fetching.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the metadata cannot be read.
    pub fn status(&self) -> Result<SlotReport> {
        let now = self.clock.now();
        let store = self.slot.store();
        let metadata = store.metadata()?;
        let fresh = metadata.as_ref().is_some_and(|m| self.serves_fresh(m, now)) && store.exists();

        Ok(SlotReport {
            state: self.state(),
            cache_dir: store.dir().to_path_buf(),
            endpoint: self.fetcher.endpoint().map(str::to_string),
            ttl_hours: self.ttl_hours,
            fresh,
            age_seconds: metadata.as_ref().map(|m| m.age(now).num_seconds()),
            metadata,
        })
    }

    fn serves_fresh(&self, metadata: &CacheMetadata, now: DateTime<Utc>) -> bool {
        metadata.source == CacheSource::Remote && is_fresh(metadata, self.ttl_hours, now)
    }

    fn acquire(&self, force: bool) -> Result<SchemaStatus> {
        let span = tracing::info_span!(
            "schema.ensure",
            force = force,
            state = tracing::field::Empty
        );
        let _enter = span.enter();

        if !force && let Some(status) = self.fresh_local()? {
            span.record("state", status.state().as_str());
            return Ok(status);
        }

        let result = self.slot.flight.run(|| {
            if !force && let Some(status) = self.fresh_local()? {
                return Ok(status);
            }
            self.refresh()
        });

        if let Ok(status) = &result {
            span.record("state", status.state().as_str());
        }
        result
    }

    fn fresh_local(&self) -> Result<Option<SchemaStatus>> {
        let now = self.clock.now();
        let Some((document, metadata)) = self.slot.store().read()? else {
            return Ok(None);
        };
        if !self.serves_fresh(&metadata, now) {
            return Ok(None);
        }

        tracing::debug!(
            fetched_at = %metadata.fetched_at,
            ttl_hours = self.ttl_hours,
            "Serving schema from cache"
        );
        metrics::counter!("schema_cache_hits_total").increment(1);
        self.slot.set_state(SchemaState::Fresh);
        Ok(Some(SchemaStatus::Fresh {
            document: Arc::new(document),
            metadata,
        }))
    }

    fn refresh(&self) -> Result<SchemaStatus> {
        let previous = self.slot.store().read()?;
        let settled = self.slot.state();
        self.slot.set_state(SchemaState::Refreshing);
        tracing::info!(
            fetcher = self.fetcher.name(),
            endpoint = self.fetcher.endpoint().unwrap_or(""),
            "Refreshing schema"
        );

        let result = self.fetch_and_store(previous.as_ref().map(|(_, m)| m));
        let cause = match result {
            Ok(status) => {
                self.slot.set_state(SchemaState::Fresh);
                return Ok(status);
            },
            Err(Refresh::Failed(cause)) => cause,
            Err(Refresh::Rejected(err)) => {
                let has_copy = previous.as_ref().is_some_and(|(_, m)| m.is_valid);
                self.slot.set_state(if has_copy {
                    SchemaState::Stale
                } else {
                    SchemaState::Unavailable
                });
                return Err(err);
            },
            Err(Refresh::Store(err)) => {
                self.slot.set_state(settled);
                return Err(err);
            },
        };

        let now = self.clock.now();
        if let Some((document, metadata)) = previous.filter(|(_, m)| m.is_valid) {
            let warning = StaleWarning::new(&metadata, now, cause);
            tracing::warn!(
                fetched_at = %metadata.fetched_at,
                source = metadata.source.as_str(),
                cause = %warning.cause,
                "Serving stale schema"
            );
            metrics::counter!("schema_cache_fallbacks_total", "kind" => "stale").increment(1);
            self.slot.set_state(SchemaState::Stale);
            return Ok(SchemaStatus::Stale {
                document: Arc::new(document),
                metadata,
                warning,
            });
        }

        match self.bundled_fallback(&cause) {
            Ok(Some(status)) => {
                self.slot.set_state(SchemaState::Stale);
                return Ok(status);
            },
            Ok(None) => {},
            Err(err) => {
                self.slot.set_state(settled);
                return Err(err);
            },
        }

        tracing::error!(cause = %cause, "No schema available");
        metrics::counter!("schema_cache_fallbacks_total", "kind" => "unavailable").increment(1);
        self.slot.set_state(SchemaState::Unavailable);
        Ok(SchemaStatus::Unavailable { reason: cause })
    }

    fn fetch_and_store(
        &self,
        previous: Option<&CacheMetadata>,
    ) -> std::result::Result<SchemaStatus, Refresh> {
        let document = self.fetcher.fetch().map_err(|e| {
            if e.kind == FetchErrorKind::Auth {
                tracing::error!(error = %e, "Endpoint rejected credentials");
                Refresh::Rejected(e.into())
            } else {
                tracing::warn!(error = %e, "Schema fetch failed");
                Refresh::Failed(e.to_string())
            }
        })?;

        let report = validate(&document).map_err(|e| {
            tracing::warn!(error = %e, size = document.size(), "Fetched schema rejected");
            Refresh::Failed(e.to_string())
        })?;

        let now = self.clock.now();
        let fetched_at = previous.map_or(now, |m| m.fetched_at.max(now));
        let mut metadata =
            CacheMetadata::for_document(&document, CacheSource::Remote, self.ttl_hours, fetched_at)
                .validated();
        if let Some(endpoint) = self.fetcher.endpoint() {
            metadata = metadata.with_endpoint(endpoint);
        }

        self.slot
            .store()
            .write(&document, &metadata)
            .map_err(Refresh::Store)?;

        tracing::info!(
            query_type = %report.query_type,
            types = report.type_count,
            size_bytes = metadata.size_bytes,
            "Schema refreshed"
        );
        Ok(SchemaStatus::Fresh {
            document: Arc::new(document),
            metadata,
        })
    }

    fn bundled_fallback(&self, cause: &str) -> Result<Option<SchemaStatus>> {
        let Some(path) = self.bundled_schema_path.as_deref() else {
            return Ok(None);
        };
        let Some(document) = read_bundled(path) else {
            return Ok(None);
        };

        if let Err(e) = validate(&document) {
            tracing::warn!(path = %path.display(), error = %e, "Bundled schema rejected");
            return Ok(None);
        }

        let fetched_at = bundled_timestamp(path);
        let metadata = CacheMetadata::for_document(
            &document,
            CacheSource::BundledFallback,
            self.ttl_hours,
            fetched_at,
        )
        .validated();
        self.slot.store().write(&document, &metadata)?;

        tracing::warn!(path = %path.display(), cause, "Serving bundled fallback schema");
        metrics::counter!("schema_cache_fallbacks_total", "kind" => "bundled").increment(1);
        let warning = StaleWarning::new(&metadata, self.clock.now(), cause);
        Ok(Some(SchemaStatus::Stale {
            document: Arc::new(document),
            metadata,
            warning,
        }))
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("slot", &self.slot)
            .field("fetcher", &self.fetcher.name())
            .field("ttl_hours", &self.ttl_hours)
            .field("bundled_schema_path", &self.bundled_schema_path)
            .finish_non_exhaustive()
    }
}

/// Why a refresh produced no fresh document.
enum Refresh {
    /// Recoverable: fall back to older copies.
    Failed(String),
    /// Credentials rejected: no fallback hides it from the caller.
    Rejected(Error),
    /// Store failure: propagated to the caller.
    Store(Error),
}

fn read_bundled(path: &Path) -> Option<SchemaDocument> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(SchemaDocument::detect(text)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read bundled schema");
            None
        },
    }
}

/// Bundled copies carry their file modification time, or the epoch.
fn bundled_timestamp(path: &Path) -> DateTime<Utc> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_or(DateTime::UNIX_EPOCH, DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::services::ManualClock;
    use crate::storage::FaultPoint;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const SDL_V1: &str = "type Query { patient(id: ID!): Patient }\ntype Patient { id: ID! }";
    const SDL_V2: &str = "type Query { patients: [Patient!]! }\ntype Patient { id: ID! }";

    #[derive(Default)]
    struct StubFetcher {
        responses: Mutex<Vec<std::result::Result<SchemaDocument, FetchError>>>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn push(&self, response: std::result::Result<SchemaDocument, FetchError>) {
            self.responses.lock().unwrap().insert(0, response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SchemaFetcher for StubFetcher {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn endpoint(&self) -> Option<&str> {
            Some("https://api.example.com/graphql")
        }

        fn fetch(&self) -> std::result::Result<SchemaDocument, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FetchError::network("connection refused")))
        }
    }

    struct Fixture {
        dir: TempDir,
        fetcher: Arc<StubFetcher>,
        clock: Arc<ManualClock>,
        manager: SchemaManager,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn fixture(ttl_hours: u64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let slot = Arc::new(CacheSlot::open(dir.path().join("cache")).unwrap());
        let fetcher = Arc::new(StubFetcher::default());
        let clock = Arc::new(ManualClock::new(start()));
        let manager = SchemaManager::new(slot, Arc::clone(&fetcher), ttl_hours)
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        Fixture {
            dir,
            fetcher,
            clock,
            manager,
        }
    }

    fn sdl(text: &str) -> SchemaDocument {
        SchemaDocument::detect(text)
    }

    #[test]
    fn test_fetches_when_cache_empty_then_serves_from_cache() {
        let f = fixture(24);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        assert_eq!(f.manager.state(), SchemaState::Uninitialized);

        let status = f.manager.ensure_schema().unwrap();
        assert_eq!(status.state(), SchemaState::Fresh);
        assert_eq!(status.document().unwrap().text(), SDL_V1);
        let metadata = status.metadata().unwrap();
        assert_eq!(metadata.fetched_at, start());
        assert!(metadata.is_valid);
        assert_eq!(metadata.endpoint.as_deref(), Some("https://api.example.com/graphql"));

        f.clock.advance(Duration::hours(23));
        let again = f.manager.ensure_schema().unwrap();
        assert_eq!(again.state(), SchemaState::Fresh);
        assert_eq!(f.fetcher.calls(), 1);
        assert_eq!(f.manager.state(), SchemaState::Fresh);
    }

    #[test]
    fn test_expired_entry_is_refreshed() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();

        f.clock.advance(Duration::hours(2));
        f.fetcher.push(Ok(sdl(SDL_V2)));
        let status = f.manager.ensure_schema().unwrap();

        assert_eq!(status.state(), SchemaState::Fresh);
        assert_eq!(status.document().unwrap().text(), SDL_V2);
        assert_eq!(status.metadata().unwrap().fetched_at, start() + Duration::hours(2));
        assert_eq!(f.fetcher.calls(), 2);
    }

    #[test]
    fn test_expired_entry_served_stale_when_fetch_fails() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();

        f.clock.advance(Duration::hours(2));
        let status = f.manager.ensure_schema().unwrap();

        assert_eq!(status.state(), SchemaState::Stale);
        assert_eq!(status.document().unwrap().text(), SDL_V1);
        let warning = status.warning().unwrap();
        assert_eq!(warning.age, Duration::hours(2));
        assert!(warning.cause.contains("connection refused"));
        assert_eq!(f.manager.state(), SchemaState::Stale);
    }

    #[test]
    fn test_invalid_fetch_is_treated_as_failure() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();
        let committed = f.manager.slot().store().read().unwrap().unwrap().1;

        f.clock.advance(Duration::hours(2));
        f.fetcher.push(Ok(sdl("")));
        let status = f.manager.ensure_schema().unwrap();

        assert_eq!(status.state(), SchemaState::Stale);
        assert_eq!(status.document().unwrap().text(), SDL_V1);
        assert!(status.warning().unwrap().cause.contains("empty"));
        assert_eq!(f.manager.slot().store().read().unwrap().unwrap().1, committed);
    }

    #[test]
    fn test_unavailable_when_nothing_cached() {
        let f = fixture(24);
        f.fetcher.push(Err(FetchError::from_status(503, "maintenance")));

        let status = f.manager.ensure_schema().unwrap();

        assert_eq!(status.state(), SchemaState::Unavailable);
        let SchemaStatus::Unavailable { reason } = &status else {
            unreachable!("expected unavailable");
        };
        assert!(reason.contains("503"));
        assert!(!f.manager.slot().store().exists());
        assert!(matches!(
            f.manager.get_schema_content(),
            Err(Error::SchemaUnavailable(_))
        ));
        assert!(!f.manager.is_schema_available());
    }

    #[test]
    fn test_rejected_credentials_surface_despite_stale_copy() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();
        let committed = f.manager.slot().store().read().unwrap().unwrap();

        f.clock.advance(Duration::hours(2));
        f.fetcher.push(Err(FetchError::from_status(401, "bad token")));
        let err = f.manager.ensure_schema().unwrap_err();

        let Error::Auth(message) = &err else {
            unreachable!("expected auth error, got {err:?}");
        };
        assert!(message.contains("401"));
        assert_eq!(f.manager.state(), SchemaState::Stale);
        assert_eq!(f.manager.slot().store().read().unwrap().unwrap(), committed);

        let report = f.manager.status().unwrap();
        assert!(!report.fresh);
        assert_eq!(report.metadata.unwrap(), committed.1);
    }

    #[test]
    fn test_rejected_credentials_surface_with_empty_cache() {
        let f = fixture(24);
        f.fetcher.push(Err(FetchError::from_status(403, "forbidden")));

        let err = f.manager.get_schema_content().unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(f.manager.state(), SchemaState::Unavailable);
        assert!(!f.manager.slot().store().exists());
        assert_eq!(f.fetcher.calls(), 1);
    }

    #[test]
    fn test_force_refresh_bypasses_fresh_cache() {
        let f = fixture(24);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();

        f.fetcher.push(Ok(sdl(SDL_V2)));
        let status = f.manager.force_refresh().unwrap();

        assert_eq!(status.document().unwrap().text(), SDL_V2);
        assert_eq!(f.fetcher.calls(), 2);
    }

    #[test]
    fn test_zero_ttl_refreshes_every_call_but_keeps_stale_fallback() {
        let f = fixture(0);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        assert_eq!(f.manager.ensure_schema().unwrap().state(), SchemaState::Fresh);

        let status = f.manager.ensure_schema().unwrap();
        assert_eq!(status.state(), SchemaState::Stale);
        assert_eq!(f.fetcher.calls(), 2);
    }

    #[test]
    fn test_fetched_at_never_moves_backwards() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();

        f.clock.set(start() - Duration::hours(5));
        f.fetcher.push(Ok(sdl(SDL_V2)));
        let status = f.manager.force_refresh().unwrap();

        assert_eq!(status.metadata().unwrap().fetched_at, start());
    }

    #[test]
    fn test_bundled_fallback_used_when_nothing_cached() {
        let f = fixture(24);
        let bundled = f.dir.path().join("bundled.graphql");
        std::fs::write(&bundled, SDL_V1).unwrap();
        let manager = SchemaManager::new(Arc::clone(f.manager.slot()), Arc::clone(&f.fetcher), 24)
            .with_bundled_schema(Some(bundled));

        let status = manager.ensure_schema().unwrap();

        assert_eq!(status.state(), SchemaState::Stale);
        assert_eq!(status.metadata().unwrap().source, CacheSource::BundledFallback);
        assert!(status.warning().unwrap().to_string().contains("bundled fallback"));

        // Bundled entries are never fresh, so the next call tries the endpoint again.
        f.fetcher.push(Ok(sdl(SDL_V2)));
        let status = manager.ensure_schema().unwrap();
        assert_eq!(status.state(), SchemaState::Fresh);
        assert_eq!(status.metadata().unwrap().source, CacheSource::Remote);
    }

    #[test]
    fn test_invalid_bundled_schema_is_ignored() {
        let f = fixture(24);
        let bundled = f.dir.path().join("bundled.graphql");
        std::fs::write(&bundled, "type Patient { id: ID! }").unwrap();
        let manager = SchemaManager::new(Arc::clone(f.manager.slot()), Arc::clone(&f.fetcher), 24)
            .with_bundled_schema(Some(bundled));

        assert_eq!(
            manager.ensure_schema().unwrap().state(),
            SchemaState::Unavailable
        );
    }

    #[test]
    fn test_store_failure_propagates_and_keeps_previous_entry() {
        let f = fixture(1);
        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();

        f.clock.advance(Duration::hours(2));
        f.fetcher.push(Ok(sdl(SDL_V2)));
        f.manager
            .slot()
            .store()
            .inject_fault(Some(FaultPoint::BeforeMetadataRename));

        let err = f.manager.ensure_schema().unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_ne!(f.manager.state(), SchemaState::Refreshing);

        f.manager.slot().store().inject_fault(None);
        let (document, _) = f.manager.slot().store().read().unwrap().unwrap();
        assert_eq!(document.text(), SDL_V1);
    }

    #[test]
    fn test_status_report() {
        let f = fixture(24);
        let report = f.manager.status().unwrap();
        assert!(!report.fresh);
        assert!(report.metadata.is_none());

        f.fetcher.push(Ok(sdl(SDL_V1)));
        f.manager.ensure_schema().unwrap();
        f.clock.advance(Duration::minutes(30));

        let report = f.manager.status().unwrap();
        assert!(report.fresh);
        assert_eq!(report.state, SchemaState::Fresh);
        assert_eq!(report.age_seconds, Some(30 * 60));
        assert_eq!(report.endpoint.as_deref(), Some("https://api.example.com/graphql"));
    }
}
