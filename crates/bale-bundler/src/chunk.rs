//! Chunk assignment.
//!
//! Every surviving module lands in exactly one chunk. Entries root entry
//! chunks; dynamic-import targets root dynamic chunks unless a static path
//! from an entry already forces them loaded. Everything else goes into the
//! chunk of its unique reaching root, or into a shared chunk per distinct
//! root set. All orderings are total (absolute path) so assignment is
//! deterministic.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use bale_core::{ContentHash, ModuleId};
use bale_graph::{DependencyKind, ModuleGraph};

/// One output chunk: an ordered set of modules with a stable id.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Stable id derived from the root module(s).
    pub id: String,
    pub roots: Vec<ModuleId>,
    /// Topologically ordered: dependencies first, roots last.
    pub modules: Vec<ModuleId>,
    pub is_entry: bool,
    /// Chunks that must be loaded before this one (shared dependencies).
    pub imports: Vec<usize>,
    /// Chunks this one references through dynamic `import()`.
    pub dynamic_imports: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct ChunkGraph {
    pub chunks: Vec<Chunk>,
}

impl ChunkGraph {
    /// Index of the chunk containing `module`.
    pub fn chunk_of(&self, module: ModuleId) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| c.modules.contains(&module))
    }
}

/// Assign every survivor to a chunk and annotate the graph.
pub fn assign_chunks(
    graph: &mut ModuleGraph,
    survivors: &FxHashSet<ModuleId>,
    splitting: bool,
) -> ChunkGraph {
    let mut survivor_ids: Vec<ModuleId> = survivors.iter().copied().collect();
    survivor_ids.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));

    let entries: Vec<ModuleId> = graph
        .entries()
        .iter()
        .copied()
        .filter(|id| survivors.contains(id))
        .collect();

    if !splitting {
        let chunk = Chunk {
            id: chunk_id_for(graph, &entries),
            roots: entries.clone(),
            modules: topological_order(graph, &survivor_ids, &entries, survivors),
            is_entry: true,
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
        };
        let graph_out = ChunkGraph {
            chunks: vec![chunk],
        };
        annotate(graph, &graph_out);
        return graph_out;
    }

    // Static reachability from entry roots decides which dynamic targets
    // are already force-loaded.
    let static_from_entries = static_closure(graph, &entries, survivors);

    let mut dynamic_roots: Vec<ModuleId> = Vec::new();
    for id in &survivor_ids {
        for dependency in graph.get(*id).dependencies.iter() {
            if dependency.kind != DependencyKind::Dynamic {
                continue;
            }
            if let Some(target) = dependency.internal_target() {
                if survivors.contains(&target)
                    && !static_from_entries.contains(&target)
                    && !entries.contains(&target)
                    && !dynamic_roots.contains(&target)
                {
                    dynamic_roots.push(target);
                }
            }
        }
    }
    dynamic_roots.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));

    // Roots in a fixed order: entries (path-sorted), then dynamic roots.
    let mut roots: Vec<ModuleId> = entries.clone();
    roots.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
    let entry_count = roots.len();
    roots.extend(dynamic_roots);

    // Colour every module with the set of roots that reach it statically;
    // traversal stops at other roots (they own their own chunks).
    let root_set: FxHashSet<ModuleId> = roots.iter().copied().collect();
    let mut reachers: FxHashMap<ModuleId, BTreeSet<usize>> = FxHashMap::default();
    for (root_index, root) in roots.iter().enumerate() {
        let mut stack = vec![*root];
        let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            reachers.entry(id).or_default().insert(root_index);
            for dependency in graph.get(id).static_dependencies() {
                if let Some(target) = dependency.internal_target() {
                    if survivors.contains(&target)
                        && !root_set.contains(&target)
                        && !seen.contains(&target)
                    {
                        stack.push(target);
                    }
                }
            }
        }
    }

    // Group by root set: singleton sets merge into the root's own chunk,
    // larger sets become shared chunks.
    let mut members: FxHashMap<BTreeSet<usize>, Vec<ModuleId>> = FxHashMap::default();
    for id in &survivor_ids {
        let Some(set) = reachers.get(id) else {
            // Unreachable survivor (kept alive only through its importer
            // being dropped is impossible; this is a defensive skip).
            continue;
        };
        members.entry(set.clone()).or_default().push(*id);
    }

    let mut key_order: Vec<BTreeSet<usize>> = members.keys().cloned().collect();
    key_order.sort();

    // Chunk list: one per root first (so chunk index == root index for
    // roots), then shared chunks in key order.
    let mut chunks: Vec<Chunk> = roots
        .iter()
        .enumerate()
        .map(|(index, root)| Chunk {
            id: chunk_id_for(graph, std::slice::from_ref(root)),
            roots: vec![*root],
            modules: Vec::new(),
            is_entry: index < entry_count,
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
        })
        .collect();

    let mut shared_index: FxHashMap<BTreeSet<usize>, usize> = FxHashMap::default();
    for key in &key_order {
        if key.len() > 1 {
            let shared_roots: Vec<ModuleId> = key.iter().map(|i| roots[*i]).collect();
            let index = chunks.len();
            chunks.push(Chunk {
                id: shared_chunk_id(graph, &shared_roots),
                roots: shared_roots,
                modules: Vec::new(),
                is_entry: false,
                imports: Vec::new(),
                dynamic_imports: Vec::new(),
            });
            shared_index.insert(key.clone(), index);
        }
    }

    let mut assignment: FxHashMap<ModuleId, usize> = FxHashMap::default();
    for (key, ids) in &members {
        let chunk_index = if key.len() == 1 {
            *key.iter().next().unwrap()
        } else {
            shared_index[key]
        };
        for id in ids {
            assignment.insert(*id, chunk_index);
        }
    }

    // Materialise ordered module lists.
    for (chunk_index, chunk) in chunks.iter_mut().enumerate() {
        let mut ids: Vec<ModuleId> = assignment
            .iter()
            .filter(|(_, c)| **c == chunk_index)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
        chunk.modules = topological_order(graph, &ids, &chunk.roots, survivors);
    }

    // Chunk-level edges.
    for chunk_index in 0..chunks.len() {
        let mut static_imports: BTreeSet<usize> = BTreeSet::new();
        let mut dynamic_imports: BTreeSet<usize> = BTreeSet::new();
        for id in chunks[chunk_index].modules.clone() {
            for dependency in graph.get(id).dependencies.iter() {
                let Some(target) = dependency.internal_target() else {
                    continue;
                };
                let Some(target_chunk) = assignment.get(&target).copied() else {
                    continue;
                };
                if target_chunk == chunk_index {
                    continue;
                }
                match dependency.kind {
                    DependencyKind::Dynamic => {
                        dynamic_imports.insert(target_chunk);
                    }
                    _ => {
                        static_imports.insert(target_chunk);
                    }
                }
            }
        }
        chunks[chunk_index].imports = static_imports.into_iter().collect();
        chunks[chunk_index].dynamic_imports = dynamic_imports.into_iter().collect();
    }

    let chunk_graph = ChunkGraph { chunks };
    debug!(chunks = chunk_graph.chunks.len(), "chunk assignment complete");
    annotate(graph, &chunk_graph);
    chunk_graph
}

fn annotate(graph: &mut ModuleGraph, chunk_graph: &ChunkGraph) {
    for (index, chunk) in chunk_graph.chunks.iter().enumerate() {
        for id in &chunk.modules {
            graph.get_mut(*id).chunk = Some(index);
        }
    }
}

/// Static-edge closure from `seeds`, restricted to survivors.
fn static_closure(
    graph: &ModuleGraph,
    seeds: &[ModuleId],
    survivors: &FxHashSet<ModuleId>,
) -> FxHashSet<ModuleId> {
    let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
    let mut stack: Vec<ModuleId> = seeds.to_vec();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        for dependency in graph.get(id).static_dependencies() {
            if let Some(target) = dependency.internal_target() {
                if survivors.contains(&target) && !seen.contains(&target) {
                    stack.push(target);
                }
            }
        }
    }
    seen
}

/// Depth-first postorder over intra-chunk static edges: dependencies
/// first, roots last, ties broken by path.
fn topological_order(
    graph: &ModuleGraph,
    members: &[ModuleId],
    roots: &[ModuleId],
    survivors: &FxHashSet<ModuleId>,
) -> Vec<ModuleId> {
    let member_set: FxHashSet<ModuleId> = members.iter().copied().collect();
    let mut ordered = Vec::with_capacity(members.len());
    let mut visited: FxHashSet<ModuleId> = FxHashSet::default();

    // Non-root members first (path order), roots last, so entries end up
    // at the bottom of the chunk.
    let mut starts: Vec<ModuleId> = members
        .iter()
        .copied()
        .filter(|id| !roots.contains(id))
        .collect();
    starts.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
    let mut sorted_roots: Vec<ModuleId> = roots.to_vec();
    sorted_roots.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
    starts.extend(sorted_roots);

    for start in starts {
        visit(
            graph,
            start,
            &member_set,
            survivors,
            &mut visited,
            &mut ordered,
        );
    }
    ordered
}

fn visit(
    graph: &ModuleGraph,
    id: ModuleId,
    members: &FxHashSet<ModuleId>,
    survivors: &FxHashSet<ModuleId>,
    visited: &mut FxHashSet<ModuleId>,
    ordered: &mut Vec<ModuleId>,
) {
    if !members.contains(&id) || !visited.insert(id) {
        return;
    }
    let mut targets: Vec<ModuleId> = graph
        .get(id)
        .static_dependencies()
        .filter_map(|d| d.internal_target())
        .filter(|t| members.contains(t) && survivors.contains(t))
        .collect();
    targets.sort_by(|a, b| graph.get(*a).path.cmp(&graph.get(*b).path));
    targets.dedup();
    for target in targets {
        visit(graph, target, members, survivors, visited, ordered);
    }
    ordered.push(id);
}

/// Chunk id from a root module: root-relative path, extension dropped,
/// separators flattened.
fn chunk_id_for(graph: &ModuleGraph, roots: &[ModuleId]) -> String {
    let root = roots
        .first()
        .expect("chunks always have at least one root");
    let stable = &graph.get(*root).stable_id;
    sanitize_chunk_id(stable)
}

fn shared_chunk_id(graph: &ModuleGraph, roots: &[ModuleId]) -> String {
    let parts: Vec<String> = roots
        .iter()
        .map(|id| graph.get(*id).stable_id.clone())
        .collect();
    format!("shared-{}", ContentHash::of_parts(&parts).short())
}

fn sanitize_chunk_id(stable_id: &str) -> String {
    let without_ext = match stable_id.rfind('.') {
        Some(dot) if dot > 0 => &stable_id[..dot],
        _ => stable_id,
    };
    without_ext
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shake::tree_shake;
    use bale_core::plugin::PluginDriver;
    use bale_core::BuildOptions;
    use bale_graph::{GraphBuilder, TransformCache};
    use bale_resolver::Resolver;
    use std::path::Path;
    use std::sync::Arc;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    async fn chunks_for(
        root: &Path,
        entries: &[&str],
        splitting: bool,
    ) -> (ModuleGraph, ChunkGraph) {
        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.entry = entries.iter().map(|e| e.into()).collect();
        options.splitting = splitting;
        let options = Arc::new(options);
        let plugins = Arc::new(PluginDriver::default());
        let resolver = Arc::new(Resolver::new(&options, plugins.clone()));
        let mut graph =
            GraphBuilder::new(options, resolver, plugins, Arc::new(TransformCache::new()))
                .build()
                .await
                .unwrap();
        let survivors = tree_shake(&graph, true);
        let chunk_graph = assign_chunks(&mut graph, &survivors, splitting);
        (graph, chunk_graph)
    }

    #[tokio::test]
    async fn no_splitting_is_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lazy.js"), "export default 1;");
        write(&root.join("main.js"), "import('./lazy.js');");

        let (_, chunks) = chunks_for(root, &["main.js"], false).await;
        assert_eq!(chunks.chunks.len(), 1);
        assert_eq!(chunks.chunks[0].modules.len(), 2);
        assert!(chunks.chunks[0].is_entry);
    }

    #[tokio::test]
    async fn dynamic_target_roots_its_own_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lazy.js"), "export default 7;");
        write(
            &root.join("main.js"),
            "const m = await import('./lazy.js'); console.log(m.default);",
        );

        let (graph, chunks) = chunks_for(root, &["main.js"], true).await;
        assert_eq!(chunks.chunks.len(), 2);
        let main_chunk = &chunks.chunks[0];
        assert!(main_chunk.is_entry);
        assert_eq!(main_chunk.dynamic_imports, vec![1]);
        let lazy = graph.id_for_path(&root.join("lazy.js")).unwrap();
        assert_eq!(chunks.chunk_of(lazy), Some(1));
    }

    #[tokio::test]
    async fn statically_forced_dynamic_target_stays_in_entry_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("both.js"), "export const b = 1;");
        write(
            &root.join("main.js"),
            "import { b } from './both.js';\nimport('./both.js');\nconsole.log(b);",
        );

        let (_, chunks) = chunks_for(root, &["main.js"], true).await;
        assert_eq!(chunks.chunks.len(), 1);
        assert_eq!(chunks.chunks[0].modules.len(), 2);
    }

    #[tokio::test]
    async fn shared_module_lands_in_shared_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("shared.js"), "export const s = 1;");
        write(
            &root.join("a.js"),
            "import { s } from './shared.js'; export default s + 1;",
        );
        write(
            &root.join("b.js"),
            "import { s } from './shared.js'; export default s + 2;",
        );
        write(
            &root.join("main.js"),
            "import('./a.js'); import('./b.js');",
        );

        let (graph, chunks) = chunks_for(root, &["main.js"], true).await;
        // entry + two dynamic + one shared.
        assert_eq!(chunks.chunks.len(), 4);
        let shared = graph.id_for_path(&root.join("shared.js")).unwrap();
        let shared_chunk = chunks.chunk_of(shared).unwrap();
        let chunk = &chunks.chunks[shared_chunk];
        assert!(chunk.id.starts_with("shared-"));
        assert!(!chunk.is_entry);
        // Both dynamic chunks import the shared chunk.
        let a = graph.id_for_path(&root.join("a.js")).unwrap();
        let a_chunk = &chunks.chunks[chunks.chunk_of(a).unwrap()];
        assert!(a_chunk.imports.contains(&shared_chunk));
    }

    #[tokio::test]
    async fn topological_order_satisfies_static_edges() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a.js"), "export const a = 1;");
        write(&root.join("b.js"), "import { a } from './a.js'; export const b = a;");
        write(&root.join("main.js"), "import { b } from './b.js'; console.log(b);");

        let (graph, chunks) = chunks_for(root, &["main.js"], true).await;
        let order = &chunks.chunks[0].modules;
        let position = |p: &str| {
            order
                .iter()
                .position(|id| graph.get(*id).path == root.join(p))
                .unwrap()
        };
        assert!(position("a.js") < position("b.js"));
        assert!(position("b.js") < position("main.js"));
        // Entry is last.
        assert_eq!(position("main.js"), order.len() - 1);
    }

    #[tokio::test]
    async fn deterministic_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("shared.js"), "export const s = 1;");
        write(&root.join("a.js"), "import { s } from './shared.js'; export default s;");
        write(&root.join("b.js"), "import { s } from './shared.js'; export default s;");
        write(&root.join("main.js"), "import('./a.js'); import('./b.js');");

        let (_, first) = chunks_for(root, &["main.js"], true).await;
        let (_, second) = chunks_for(root, &["main.js"], true).await;
        let ids = |g: &ChunkGraph| g.chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        let lists = |g: &ChunkGraph| {
            g.chunks
                .iter()
                .map(|c| c.modules.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(lists(&first), lists(&second));
    }
}
