//! Patch computation between consecutive emissions.
//!
//! Chunks are rederived every build, so the diff works on outputs, not on
//! the graph: identical chunk/module shape with changed module bodies is
//! patchable; any change to the shape itself - chunks appearing or
//! vanishing, modules moving between chunks - forces a full reload.

use bale_bundler::BuildOutput;

use crate::protocol::{UpdateItem, UpdateKind};

/// What the dev server should tell clients after a successful rebuild.
#[derive(Debug, PartialEq)]
pub enum Patch {
    /// Nothing observable changed.
    Unchanged,
    /// Per-chunk patches clients can apply in place.
    Update(Vec<UpdateItem>),
    /// The shape changed; clients must reload.
    FullReload,
}

/// Diff two successful builds.
pub fn diff(previous: &BuildOutput, next: &BuildOutput) -> Patch {
    // Shape comparison: same chunk ids, same module lists per chunk.
    if shape(previous) != shape(next) {
        return Patch::FullReload;
    }

    let mut updates = Vec::new();
    for chunk in &next.chunks {
        let Some(old) = previous.chunks.iter().find(|c| c.id == chunk.id) else {
            return Patch::FullReload;
        };
        if old.hash == chunk.hash {
            continue;
        }
        let changed: Vec<String> = chunk
            .module_hashes
            .iter()
            .filter(|(id, hash)| {
                old.module_hashes
                    .iter()
                    .find(|(old_id, _)| old_id == id)
                    .map_or(true, |(_, old_hash)| old_hash != hash)
            })
            .map(|(id, _)| id.clone())
            .collect();
        updates.push(UpdateItem {
            kind: UpdateKind::Js,
            chunk_id: chunk.id.clone(),
            module_ids: changed,
            new_bytes: chunk.code.clone(),
        });
    }

    if updates.is_empty() {
        Patch::Unchanged
    } else {
        Patch::Update(updates)
    }
}

/// `(chunk id, module ids)` per chunk, in emission order: the part of an
/// emission that must be identical for patching to be safe.
fn shape(output: &BuildOutput) -> Vec<(String, Vec<String>)> {
    output
        .chunks
        .iter()
        .map(|chunk| (chunk.id.clone(), chunk.modules.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_bundler::Bundler;
    use bale_core::BuildOptions;
    use std::path::Path;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn options(root: &Path, entries: &[&str]) -> BuildOptions {
        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.entry = entries.iter().map(|e| e.into()).collect();
        options
    }

    #[tokio::test]
    async fn identical_builds_diff_to_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("main.js"), "console.log(1);\n");

        let bundler = Bundler::new(options(root, &["main.js"])).unwrap();
        let first = bundler.build().await.unwrap();
        let second = bundler.build().await.unwrap();
        assert_eq!(diff(&first, &second), Patch::Unchanged);
    }

    #[tokio::test]
    async fn edited_module_produces_an_update() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a.js"), "export const x = 1;\n");
        write(&root.join("main.js"), "import { x } from './a.js';\nconsole.log(x);\n");

        let bundler = Bundler::new(options(root, &["main.js"])).unwrap();
        let first = bundler.build().await.unwrap();

        write(&root.join("a.js"), "export const x = 2;\n");
        bundler.resolver().invalidate();
        let second = bundler.build().await.unwrap();

        match diff(&first, &second) {
            Patch::Update(updates) => {
                assert_eq!(updates.len(), 1);
                assert_eq!(updates[0].module_ids, vec!["a.js".to_string()]);
                assert!(updates[0].new_bytes.contains("x = 2"));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn new_import_forces_full_reload() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a.js"), "export const x = 1;\n");
        write(&root.join("main.js"), "import { x } from './a.js';\nconsole.log(x);\n");

        let bundler = Bundler::new(options(root, &["main.js"])).unwrap();
        let first = bundler.build().await.unwrap();

        write(&root.join("b.js"), "export const y = 2;\n");
        write(
            &root.join("main.js"),
            "import { x } from './a.js';\nimport { y } from './b.js';\nconsole.log(x + y);\n",
        );
        bundler.resolver().invalidate();
        let second = bundler.build().await.unwrap();

        assert_eq!(diff(&first, &second), Patch::FullReload);
    }
}
