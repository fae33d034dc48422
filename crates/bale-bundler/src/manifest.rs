//! The code-splitting manifest and build statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::emit::EmittedChunk;

/// Co-emitted `manifest.json`: what the runtime's dynamic loader (and any
/// serving layer) needs to locate chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Entry chunk id → output file.
    pub entries: BTreeMap<String, String>,
    /// Chunk id → metadata.
    pub chunks: BTreeMap<String, ChunkMetadata>,
    /// Bundler version that produced this manifest.
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Output file path, relative to the outdir.
    pub path: String,
    /// Chunks that must load before this one.
    pub imports: Vec<String>,
    /// Chunks referenced through dynamic `import()`.
    pub dynamic_imports: Vec<String>,
    /// Stylesheet side-asset, when a plugin produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// Stable ids of contained modules.
    pub modules: Vec<String>,
}

impl BundleManifest {
    pub fn from_chunks(chunks: &[EmittedChunk]) -> Self {
        let mut entries = BTreeMap::new();
        let mut chunk_map = BTreeMap::new();
        for chunk in chunks {
            if chunk.is_entry {
                entries.insert(chunk.id.clone(), chunk.file_name.clone());
            }
            chunk_map.insert(
                chunk.id.clone(),
                ChunkMetadata {
                    path: chunk.file_name.clone(),
                    imports: chunk.imports.clone(),
                    dynamic_imports: chunk.dynamic_imports.clone(),
                    css: None,
                    modules: chunk.modules.clone(),
                },
            );
        }
        Self {
            entries,
            chunks: chunk_map,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("manifest serialisation cannot fail")
    }
}

/// Summary numbers logged after each build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub total_modules: usize,
    pub total_chunks: usize,
    pub total_bytes: usize,
    pub duration_ms: u64,
    pub cache_hit_rate: f64,
}

impl BuildStats {
    pub fn hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
