//! Module-level tree shaking.
//!
//! Computes the surviving set: every entry, closed under "depended upon by
//! a survivor for a reason that can execute at runtime". Type-only edges
//! never appear here (the graph keeps them out of the dependency list);
//! side-effect-only imports pin their target even when the target's
//! package declares `sideEffects: false`, because importing purely for
//! effect is an explicit request to run the module.

use rustc_hash::FxHashSet;

use bale_core::ModuleId;
use bale_graph::{DependencyKind, ModuleGraph};
use bale_parser::ImportKind;
use tracing::debug;

/// The survival set for `graph`. With `treeshake` disabled this is plain
/// reachability from the entries.
pub fn tree_shake(graph: &ModuleGraph, treeshake: bool) -> FxHashSet<ModuleId> {
    if !treeshake {
        return graph.reachable_from_entries().into_iter().collect();
    }

    let mut alive: FxHashSet<ModuleId> = FxHashSet::default();
    let mut stack: Vec<ModuleId> = graph.entries().to_vec();

    while let Some(id) = stack.pop() {
        if !alive.insert(id) {
            continue;
        }
        let module = graph.get(id);
        for (index, dependency) in module.dependencies.iter().enumerate() {
            let Some(target) = dependency.internal_target() else {
                continue;
            };
            let keeps_alive = match dependency.kind {
                // An explicit effect import or a dynamic load always runs
                // the target.
                DependencyKind::SideEffect | DependencyKind::Dynamic => true,
                DependencyKind::Static | DependencyKind::ReExport => {
                    let record = &module.parse.imports[index];
                    if graph.get(target).has_side_effects {
                        true
                    } else {
                        match record.kind {
                            // A pure module whose bindings are never named
                            // has nothing to contribute.
                            ImportKind::StaticFrom => !record.bindings.is_empty(),
                            // `require()` returns a value used in place.
                            ImportKind::RequireCall => true,
                            // Star forwards are kept conservatively: their
                            // names flow onward invisibly at this level.
                            ImportKind::ReExportAll => true,
                            ImportKind::ReExport => !record.bindings.is_empty(),
                            _ => true,
                        }
                    }
                }
            };
            if keeps_alive && !alive.contains(&target) {
                stack.push(target);
            }
        }
    }

    debug!(
        survivors = alive.len(),
        total = graph.len(),
        "tree shake complete"
    );
    alive
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_core::plugin::PluginDriver;
    use bale_core::BuildOptions;
    use bale_graph::{GraphBuilder, TransformCache};
    use bale_resolver::Resolver;
    use std::path::Path;
    use std::sync::Arc;

    async fn graph_for(root: &Path, entries: &[&str]) -> ModuleGraph {
        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.entry = entries.iter().map(|e| e.into()).collect();
        let options = Arc::new(options);
        let plugins = Arc::new(PluginDriver::default());
        let resolver = Arc::new(Resolver::new(&options, plugins.clone()));
        GraphBuilder::new(options, resolver, plugins, Arc::new(TransformCache::new()))
            .build()
            .await
            .unwrap()
    }

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[tokio::test]
    async fn named_import_keeps_pure_module_alive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pure/package.json"),
            r#"{ "name": "pure", "sideEffects": false, "main": "./index.js" }"#,
        );
        write(
            &root.join("node_modules/pure/index.js"),
            "export const keep = 1; export const drop = 2;",
        );
        write(&root.join("main.js"), "import { keep } from 'pure'; console.log(keep);");

        let graph = graph_for(root, &["main.js"]).await;
        let alive = tree_shake(&graph, true);
        let pure = graph
            .id_for_path(&root.join("node_modules/pure/index.js"))
            .unwrap();
        assert!(alive.contains(&pure));
    }

    #[tokio::test]
    async fn bindingless_import_of_pure_module_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pure/package.json"),
            r#"{ "name": "pure", "sideEffects": false, "main": "./index.js" }"#,
        );
        write(&root.join("node_modules/pure/index.js"), "export const unused = 1;");
        write(&root.join("main.js"), "import {} from 'pure'; console.log('hi');");

        let graph = graph_for(root, &["main.js"]).await;
        let alive = tree_shake(&graph, true);
        let pure = graph
            .id_for_path(&root.join("node_modules/pure/index.js"))
            .unwrap();
        assert!(!alive.contains(&pure));

        // Without tree shaking everything reachable survives.
        let all = tree_shake(&graph, false);
        assert!(all.contains(&pure));
    }

    #[tokio::test]
    async fn side_effect_import_beats_pure_marking() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pure/package.json"),
            r#"{ "name": "pure", "sideEffects": false, "main": "./polyfill.js" }"#,
        );
        write(&root.join("node_modules/pure/polyfill.js"), "globalThis.p = 1;");
        write(&root.join("main.js"), "import 'pure';\nconsole.log(globalThis.p);");

        let graph = graph_for(root, &["main.js"]).await;
        let alive = tree_shake(&graph, true);
        let polyfill = graph
            .id_for_path(&root.join("node_modules/pure/polyfill.js"))
            .unwrap();
        assert!(alive.contains(&polyfill));
    }

    #[tokio::test]
    async fn dropped_importers_drop_their_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pure/package.json"),
            r#"{ "name": "pure", "sideEffects": false, "main": "./index.js" }"#,
        );
        write(
            &root.join("node_modules/pure/index.js"),
            "import { helper } from './helper.js'; export const unused = helper;",
        );
        write(
            &root.join("node_modules/pure/helper.js"),
            "export const helper = 2;",
        );
        write(&root.join("main.js"), "import {} from 'pure'; console.log(1);");

        let graph = graph_for(root, &["main.js"]).await;
        let alive = tree_shake(&graph, true);
        assert!(!alive.contains(
            &graph
                .id_for_path(&root.join("node_modules/pure/helper.js"))
                .unwrap()
        ));
        assert_eq!(alive.len(), 1);
    }

    #[tokio::test]
    async fn reexport_cycle_survives() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a.js"), "export * from './b.js';\nexport const fromA = 1;");
        write(&root.join("b.js"), "export * from './a.js';\nexport const fromB = 2;");
        write(&root.join("main.js"), "import { fromA, fromB } from './a.js'; console.log(fromA, fromB);");

        let graph = graph_for(root, &["main.js"]).await;
        let alive = tree_shake(&graph, true);
        assert_eq!(alive.len(), 3);
    }
}
