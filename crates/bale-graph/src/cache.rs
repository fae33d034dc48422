//! The content-addressed transform cache.
//!
//! Keyed by `(source hash, transform-options fingerprint)`. Hits skip both
//! the transform and the re-parse of its output. Writes are idempotent:
//! two workers producing the same key write byte-identical values, so the
//! last write winning is harmless. An optional persistent store keeps
//! entries across runs as JSON files named by the key.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bale_core::plugin::Loader;
use bale_core::{BuildOptions, ContentHash};
use bale_parser::{ImportRecord, ParseOutput, TransformOutput};

use crate::module::ModuleFlags;

/// Cached result of transforming and scanning one source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTransform {
    pub output: TransformOutput,
    /// Tables of the transformed text.
    pub parse: ParseOutput,
    /// Flags from scanning the original text.
    pub flags: ModuleFlags,
    /// Type-only records from the original text.
    pub type_only: Vec<ImportRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: ContentHash,
    pub options: ContentHash,
}

/// Fingerprint of every option that changes transform output, except the
/// per-file loader (mixed into the key separately).
pub fn options_fingerprint(options: &BuildOptions) -> ContentHash {
    let mut parts: Vec<Vec<u8>> = Vec::new();
    parts.push(format!("{:?}", options.jsx).into_bytes());
    let mut defines: Vec<(&String, &String)> = options.define.iter().collect();
    defines.sort();
    for (key, value) in defines {
        parts.push(format!("{key}={value}").into_bytes());
    }
    ContentHash::of_parts(parts)
}

/// Mix the per-file loader into the global fingerprint.
pub fn file_fingerprint(global: ContentHash, loader: Loader) -> ContentHash {
    ContentHash::of_parts([global.to_hex().into_bytes(), vec![loader as u8]])
}

#[derive(Default)]
pub struct TransformCache {
    entries: DashMap<CacheKey, Arc<CachedTransform>>,
    store_dir: Option<PathBuf>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TransformCache {
    /// Process-local cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache backed by a persistent directory that survives across runs.
    pub fn with_store(dir: PathBuf) -> Self {
        Self {
            store_dir: Some(dir),
            ..Self::default()
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedTransform>> {
        if let Some(entry) = self.entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value().clone());
        }
        if let Some(cached) = self.read_store(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            let cached = Arc::new(cached);
            self.entries.insert(*key, cached.clone());
            return Some(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: CacheKey, value: CachedTransform) -> Arc<CachedTransform> {
        let value = Arc::new(value);
        self.entries.insert(key, value.clone());
        self.write_store(&key, &value);
        value
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn store_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.store_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}.json", key.source.short(), key.options.short())))
    }

    fn read_store(&self, key: &CacheKey) -> Option<CachedTransform> {
        let path = self.store_path(key)?;
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn write_store(&self, key: &CacheKey, value: &CachedTransform) {
        let Some(path) = self.store_path(key) else {
            return;
        };
        let Some(dir) = path.parent() else { return };
        // Best effort: a failed store write costs a future cache miss,
        // nothing else.
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
        match serde_json::to_string(value) {
            Ok(json) => {
                if let Err(error) = std::fs::write(&path, json) {
                    debug!(path = %path.display(), %error, "cache store write failed");
                }
            }
            Err(error) => debug!(%error, "cache entry serialisation failed"),
        }
    }
}
