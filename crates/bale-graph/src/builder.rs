//! Graph discovery.
//!
//! A work queue seeded with the entries fans module processing (read,
//! hash, transform, scan) out across blocking workers bounded by the CPU
//! count. The driver stays single-threaded: it resolves specifiers,
//! dedupes paths, and owns every graph mutation, so path uniqueness holds
//! without locks. Errors are aggregated; discovery continues past a broken
//! module so one build reports everything at once.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::task::JoinSet;
use tracing::{debug, info};

use bale_core::plugin::{Loader, PluginDriver};
use bale_core::{
    stable_module_id, BuildError, BuildOptions, ConfigError, ContentHash, Diagnostics, GraphError,
    ParseError,
};
use bale_parser::{parse, transform, ImportKind, TransformOptions, TransformOutput};
use bale_resolver::{Resolved, Resolver};

use crate::cache::{file_fingerprint, options_fingerprint, CacheKey, CachedTransform, TransformCache};
use crate::graph::ModuleGraph;
use crate::module::{
    Dependency, DependencyKind, DependencyTarget, Module, ModuleFlags, ModuleKind, TypeOnlyImport,
};

pub struct GraphBuilder {
    options: Arc<BuildOptions>,
    resolver: Arc<Resolver>,
    plugins: Arc<PluginDriver>,
    cache: Arc<TransformCache>,
}

/// What a worker learned about one file.
struct Processed {
    source: String,
    hash: ContentHash,
    loader: Loader,
    cached: Arc<CachedTransform>,
}

/// Driver-side record of a finished module awaiting id assignment.
struct Finished {
    path: PathBuf,
    is_entry: bool,
    processed: Processed,
    /// `(specifier, kind, target path or external name)`.
    dependencies: Vec<(String, DependencyKind, Result<PathBuf, String>)>,
    type_only: Vec<(String, Option<PathBuf>)>,
}

impl GraphBuilder {
    pub fn new(
        options: Arc<BuildOptions>,
        resolver: Arc<Resolver>,
        plugins: Arc<PluginDriver>,
        cache: Arc<TransformCache>,
    ) -> Self {
        Self {
            options,
            resolver,
            plugins,
            cache,
        }
    }

    /// Discover the complete module graph for the configured entries.
    pub async fn build(&self) -> Result<ModuleGraph, Diagnostics> {
        self.resolver.begin_build();
        let mut diagnostics = Diagnostics::new();
        let mut queue: VecDeque<(PathBuf, bool)> = VecDeque::new();
        let mut scheduled: FxHashSet<PathBuf> = FxHashSet::default();
        let mut finished: Vec<Finished> = Vec::new();

        for entry in &self.options.entry {
            match self.resolver.resolve_entry(entry) {
                Ok(Resolved::File { path, .. }) => {
                    if scheduled.insert(path.clone()) {
                        queue.push_back((path, true));
                    }
                }
                Ok(Resolved::External(name)) => diagnostics.push(ConfigError::InvalidValue {
                    field: "entry".into(),
                    value: name,
                    hint: "entry points cannot be external".into(),
                }),
                Err(error) => diagnostics.push(error),
            }
        }

        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let global_fingerprint = options_fingerprint(&self.options);
        let mut workers: JoinSet<(PathBuf, bool, Result<Processed, BuildError>)> = JoinSet::new();

        loop {
            while workers.len() < parallelism {
                let Some((path, is_entry)) = queue.pop_front() else {
                    break;
                };
                let plugins = self.plugins.clone();
                let cache = self.cache.clone();
                let options = self.options.clone();
                workers.spawn_blocking(move || {
                    let result =
                        process_module(&path, &plugins, &cache, &options, global_fingerprint);
                    (path, is_entry, result)
                });
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };
            let (path, is_entry, result) = match joined {
                Ok(output) => output,
                Err(join_error) => {
                    // A worker panic is a bug; surface it rather than hang.
                    std::panic::resume_unwind(join_error.into_panic());
                }
            };
            match result {
                Ok(processed) => {
                    let record = self.link_dependencies(
                        path,
                        is_entry,
                        processed,
                        &mut queue,
                        &mut scheduled,
                        &mut diagnostics,
                    );
                    finished.push(record);
                }
                Err(error) => diagnostics.push(error),
            }
        }

        let (hits, misses) = self.cache.stats();
        info!(
            modules = finished.len(),
            cache_hits = hits,
            cache_misses = misses,
            "module discovery complete"
        );

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        Ok(self.assemble(finished))
    }

    /// Resolve every import of a freshly processed module on the driver
    /// thread, enqueueing unseen internal targets.
    fn link_dependencies(
        &self,
        path: PathBuf,
        is_entry: bool,
        processed: Processed,
        queue: &mut VecDeque<(PathBuf, bool)>,
        scheduled: &mut FxHashSet<PathBuf>,
        diagnostics: &mut Diagnostics,
    ) -> Finished {
        let mut dependencies = Vec::with_capacity(processed.cached.parse.imports.len());
        for record in &processed.cached.parse.imports {
            let kind = DependencyKind::from_import(record.kind);
            let target = match self.resolver.resolve(&record.specifier, &path) {
                Ok(Resolved::File {
                    path: target_path, ..
                }) => {
                    if scheduled.insert(target_path.clone()) {
                        queue.push_back((target_path.clone(), false));
                    }
                    Ok(target_path)
                }
                Ok(Resolved::External(name)) => Err(name),
                Err(error) => {
                    diagnostics.push(error);
                    // Placeholder keeps index alignment; the build fails.
                    Err(record.specifier.clone())
                }
            };
            dependencies.push((record.specifier.clone(), kind, target));
        }

        // Type-only edges are recorded, never enqueued: nothing at runtime
        // needs their targets.
        let mut type_only = Vec::new();
        for record in &processed.cached.type_only {
            let target = match self.resolver.resolve(&record.specifier, &path) {
                Ok(Resolved::File {
                    path: target_path, ..
                }) => Some(target_path),
                _ => None,
            };
            type_only.push((record.specifier.clone(), target));
        }

        debug!(path = %path.display(), deps = dependencies.len(), "linked");
        Finished {
            path,
            is_entry,
            processed,
            dependencies,
            type_only,
        }
    }

    /// Assign ids in path order and materialise the arena. Path-ordered
    /// ids make every downstream ordering independent of discovery timing.
    fn assemble(&self, mut finished: Vec<Finished>) -> ModuleGraph {
        finished.sort_by(|a, b| a.path.cmp(&b.path));
        let id_by_path: FxHashMap<PathBuf, usize> = finished
            .iter()
            .enumerate()
            .map(|(index, f)| (f.path.clone(), index))
            .collect();

        let mut graph = ModuleGraph::new();
        for record in finished {
            let Finished {
                path,
                is_entry,
                processed,
                dependencies,
                type_only,
            } = record;

            let dependencies = dependencies
                .into_iter()
                .map(|(specifier, kind, target)| Dependency {
                    specifier,
                    kind,
                    target: match target {
                        Ok(target_path) => DependencyTarget::Internal(
                            bale_core::ModuleId::from_index(id_by_path[&target_path]),
                        ),
                        Err(name) => DependencyTarget::External(name),
                    },
                })
                .collect();

            let type_only = type_only
                .into_iter()
                .map(|(specifier, target)| TypeOnlyImport {
                    specifier,
                    target: target
                        .and_then(|p| id_by_path.get(&p).copied())
                        .map(bale_core::ModuleId::from_index),
                })
                .collect();

            let parse = processed.cached.parse.clone();
            let kind = classify(&parse);
            let has_side_effects = self
                .resolver
                .package_for(&path)
                .map(|pkg| pkg.module_has_side_effects(&path))
                .unwrap_or(true);

            let module = Module {
                id: bale_core::ModuleId::from_index(0), // assigned by insert
                stable_id: stable_module_id(&self.options.root, &path),
                path,
                hash: processed.hash,
                loader: processed.loader,
                kind,
                flags: processed.cached.flags,
                source: processed.source,
                code: processed.cached.output.code.clone(),
                prepended_lines: processed.cached.output.prepended_lines,
                exported_names: parse.exported_names(),
                parse,
                dependencies,
                type_only,
                has_side_effects,
                is_entry,
                chunk: None,
            };
            graph.insert(module);
        }
        graph
    }
}

fn classify(parse: &bale_parser::ParseOutput) -> ModuleKind {
    let esm_imports = parse.imports.iter().any(|record| {
        matches!(
            record.kind,
            ImportKind::StaticFrom
                | ImportKind::SideEffect
                | ImportKind::ReExport
                | ImportKind::ReExportAll
        )
    });
    if esm_imports || !parse.exports.is_empty() {
        ModuleKind::Esm
    } else {
        ModuleKind::Script
    }
}

/// The worker half: everything that does not touch the graph.
fn process_module(
    path: &PathBuf,
    plugins: &PluginDriver,
    cache: &TransformCache,
    options: &BuildOptions,
    global_fingerprint: ContentHash,
) -> Result<Processed, BuildError> {
    let (source, loader) = match plugins.load(path)? {
        Some(loaded) => (loaded.source, loaded.loader),
        None => {
            let bytes = std::fs::read(path).map_err(|source| GraphError::Unreadable {
                path: path.clone(),
                source,
            })?;
            let text = String::from_utf8(bytes)
                .map_err(|_| GraphError::InvalidUtf8 { path: path.clone() })?;
            (text, Loader::from_path(path))
        }
    };

    let hash = ContentHash::of(source.as_bytes());
    let key = CacheKey {
        source: hash,
        options: file_fingerprint(global_fingerprint, loader),
    };
    if let Some(cached) = cache.get(&key) {
        return Ok(Processed {
            source,
            hash,
            loader,
            cached,
        });
    }

    // Scan the original for flags, syntax errors and type-only records.
    let original = parse(&source, loader);
    if let Some(issue) = original.errors.first() {
        return Err(ParseError {
            file: path.clone(),
            line: issue.line,
            column: issue.column,
            message: issue.message.clone(),
        }
        .into());
    }

    let lowered = transform(
        &source,
        &TransformOptions {
            loader,
            jsx: options.jsx.clone(),
            define: options.define.clone(),
        },
    );
    let code = plugins.transform(path, lowered.code)?;
    let output = TransformOutput {
        code,
        prepended_lines: lowered.prepended_lines,
    };

    // The tables the graph and the emitter share come from the transformed
    // text, so spans line up with what is emitted.
    let table_parse = parse(&output.code, Loader::Js);
    let flags = ModuleFlags {
        has_jsx: original.has_jsx,
        has_typescript: original.has_typescript,
        has_dynamic_import: original.has_dynamic_import,
        has_top_level_await: original.has_top_level_await,
    };
    let type_only = original
        .imports
        .iter()
        .filter(|record| record.type_only)
        .cloned()
        .collect();

    let cached = cache.insert(
        key,
        CachedTransform {
            output,
            parse: table_parse,
            flags,
            type_only,
        },
    );
    Ok(Processed {
        source,
        hash,
        loader,
        cached,
    })
}
