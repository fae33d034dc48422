//! The module graph: an arena of modules addressed by [`ModuleId`], with a
//! path-to-id sidecar enforcing one module per absolute path.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use bale_core::ModuleId;

use crate::module::Module;

#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    by_path: FxHashMap<PathBuf, ModuleId>,
    entries: Vec<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module, enforcing path uniqueness. Returns the id the
    /// module received.
    ///
    /// # Panics
    ///
    /// Panics if a module with the same path is already present; the
    /// builder guarantees single insertion per path, so a duplicate is a
    /// bug, not an expected error.
    pub fn insert(&mut self, mut module: Module) -> ModuleId {
        assert!(
            !self.by_path.contains_key(&module.path),
            "duplicate module for {}",
            module.path.display()
        );
        let id = ModuleId::from_index(self.modules.len());
        module.id = id;
        if module.is_entry {
            self.entries.push(id);
        }
        self.by_path.insert(module.path.clone(), id);
        self.modules.push(module);
        id
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn id_for_path(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Module ids sorted by absolute path: the total order every
    /// determinism-sensitive step uses.
    pub fn ids_by_path(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.iter().map(|m| m.id).collect();
        ids.sort_by(|a, b| self.get(*a).path.cmp(&self.get(*b).path));
        ids
    }

    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    /// Every module reachable from the entries through static and dynamic
    /// edges, which - by construction of the builder - is every module in
    /// the arena.
    pub fn reachable_from_entries(&self) -> Vec<ModuleId> {
        let mut seen = vec![false; self.modules.len()];
        let mut stack: Vec<ModuleId> = self.entries.clone();
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            out.push(id);
            for target in self.get(id).internal_targets() {
                if !seen[target.index()] {
                    stack.push(target);
                }
            }
        }
        out.sort_by(|a, b| self.get(*a).path.cmp(&self.get(*b).path));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleFlags, ModuleKind};
    use bale_core::plugin::Loader;
    use bale_core::ContentHash;

    pub(crate) fn test_module(path: &str) -> Module {
        Module {
            id: ModuleId::from_index(0),
            path: PathBuf::from(path),
            stable_id: path.trim_start_matches('/').to_string(),
            hash: ContentHash::of(path.as_bytes()),
            loader: Loader::Js,
            kind: ModuleKind::Esm,
            flags: ModuleFlags::default(),
            source: String::new(),
            code: String::new(),
            prepended_lines: 0,
            parse: Default::default(),
            dependencies: Vec::new(),
            type_only: Vec::new(),
            exported_names: Vec::new(),
            has_side_effects: true,
            is_entry: false,
            chunk: None,
        }
    }

    #[test]
    fn insertion_assigns_sequential_ids() {
        let mut graph = ModuleGraph::new();
        let a = graph.insert(test_module("/p/a.js"));
        let b = graph.insert(test_module("/p/b.js"));
        assert_ne!(a, b);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.id_for_path(Path::new("/p/a.js")), Some(a));
    }

    #[test]
    #[should_panic(expected = "duplicate module")]
    fn duplicate_paths_are_a_bug() {
        let mut graph = ModuleGraph::new();
        graph.insert(test_module("/p/a.js"));
        graph.insert(test_module("/p/a.js"));
    }

    #[test]
    fn ids_by_path_is_path_ordered() {
        let mut graph = ModuleGraph::new();
        graph.insert(test_module("/p/z.js"));
        graph.insert(test_module("/p/a.js"));
        let ordered = graph.ids_by_path();
        assert_eq!(graph.get(ordered[0]).path, PathBuf::from("/p/a.js"));
        assert_eq!(graph.get(ordered[1]).path, PathBuf::from("/p/z.js"));
    }
}
