use super::parse_sql_with_dialect;
use crate::error::ParseError;
use crate::types::Dialect;
use indexmap::IndexMap;
use sqlparser::ast::Statement;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
#[cfg(feature = "tracing")]
use tracing::debug;

type Parsed = Result<Arc<Vec<Statement>>, ParseError>;

/// Memoized parse results keyed by `(dialect, sql)`.
///
/// Holds at most `capacity` entries; the oldest entry is evicted first.
/// Failed parses are cached too.
#[derive(Debug)]
pub struct ParserCache {
    capacity: usize,
    entries: Mutex<IndexMap<(Dialect, String), Parsed>>,
}

impl ParserCache {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn parse(&self, sql: &str, dialect: Dialect) -> Parsed {
        let key = (dialect, sql.to_string());
        if let Some(hit) = self.lock().get(&key) {
            return hit.clone();
        }

        // Parse outside the lock; two racing misses both parse and the
        // second insert overwrites an equal value.
        let parsed = parse_sql_with_dialect(sql, dialect).map(Arc::new);

        let mut entries = self.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.shift_remove_index(0);
        }
        entries.insert(key, parsed.clone());
        parsed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<(Dialect, String), Parsed>> {
        // Entries are plain values; a panic mid-insert leaves a usable map.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ParserCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

fn global() -> &'static RwLock<Arc<ParserCache>> {
    static CACHE: OnceLock<RwLock<Arc<ParserCache>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(Arc::new(ParserCache::default())))
}

fn current() -> Arc<ParserCache> {
    Arc::clone(&global().read().unwrap_or_else(PoisonError::into_inner))
}

/// Parses through the process-wide cache.
pub fn parse_cached(sql: &str, dialect: Dialect) -> Parsed {
    current().parse(sql, dialect)
}

/// Replaces the process-wide cache. Parses already holding the previous
/// instance finish against it.
pub fn install_parser_cache(cache: ParserCache) {
    *global().write().unwrap_or_else(PoisonError::into_inner) = Arc::new(cache);
}

/// Drops every cached parse, keeping the current capacity.
pub fn refresh_parser_caches() {
    let capacity = current().capacity;
    #[cfg(feature = "tracing")]
    debug!(capacity, "refreshing parser cache");
    install_parser_cache(ParserCache::new(capacity));
}
