//! Chunk emission.
//!
//! Assembles each chunk: format shell, runtime preamble, module factories
//! in topological order, and an entry trailer. The emitted bytes are fully
//! determined by the graph and options - every ordering used here is
//! total.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::debug;

use bale_core::{BuildOptions, ContentHash, ModuleId, OutputFormat, SourceMapMode};
use bale_graph::{DependencyTarget, ModuleGraph};

use crate::chunk::ChunkGraph;
use crate::rewrite::rewrite_module;
use crate::runtime;
use crate::source_map::{self, LineOrigin};

/// One emitted artifact.
#[derive(Debug, Clone)]
pub struct EmittedChunk {
    pub id: String,
    pub file_name: String,
    pub code: String,
    /// Hash of the final bytes.
    pub hash: ContentHash,
    pub source_map: Option<String>,
    pub map_file_name: Option<String>,
    pub is_entry: bool,
    /// Stable ids of contained modules, in emission order.
    pub modules: Vec<String>,
    /// Per-module hash of the rewritten factory body, for dev patching.
    pub module_hashes: Vec<(String, ContentHash)>,
    /// Chunk ids this chunk statically depends on.
    pub imports: Vec<String>,
    /// Chunk ids this chunk references via `import()`.
    pub dynamic_imports: Vec<String>,
}

pub struct Emitter<'a> {
    graph: &'a ModuleGraph,
    chunks: &'a ChunkGraph,
    options: &'a BuildOptions,
    star_names: FxHashMap<ModuleId, Vec<String>>,
    file_names: Vec<String>,
}

impl<'a> Emitter<'a> {
    pub fn new(graph: &'a ModuleGraph, chunks: &'a ChunkGraph, options: &'a BuildOptions) -> Self {
        let star_names = star_export_names(graph);
        let file_names = chunks
            .chunks
            .iter()
            .map(|chunk| {
                if options.hashed_names {
                    // Name hashes derive from module contents so file names
                    // are known before chunks reference each other.
                    let parts: Vec<&str> = chunk
                        .modules
                        .iter()
                        .flat_map(|id| {
                            let module = graph.get(*id);
                            [module.stable_id.as_str(), module.code.as_str()]
                        })
                        .collect();
                    format!("{}-{}.js", chunk.id, ContentHash::of_parts(parts).short())
                } else {
                    format!("{}.js", chunk.id)
                }
            })
            .collect();
        Self {
            graph,
            chunks,
            options,
            star_names,
            file_names,
        }
    }

    /// The complete export name set of a module (the `export *` fixed
    /// point), for callers that surface entry exports.
    pub fn export_names_of(&self, id: ModuleId) -> &[String] {
        self.star_names
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn emit_all(&self) -> Vec<EmittedChunk> {
        (0..self.chunks.chunks.len())
            .map(|index| self.emit_chunk(index))
            .collect()
    }

    fn emit_chunk(&self, chunk_index: usize) -> EmittedChunk {
        let chunk = &self.chunks.chunks[chunk_index];
        let format = self.options.format;
        let mut writer = ChunkWriter::default();

        // Shell opening.
        match format {
            OutputFormat::Iife => writer.glue("(function () {\n\"use strict\";\n"),
            OutputFormat::Cjs => writer.glue("\"use strict\";\n"),
            OutputFormat::Esm => {
                for (index, name) in self.chunk_externals(chunk_index).iter().enumerate() {
                    writer.glue(&format!(
                        "import * as __bale_ext{index} from \"{}\";\n",
                        escape(name)
                    ));
                }
                let bindings: Vec<String> = self
                    .chunk_externals(chunk_index)
                    .iter()
                    .enumerate()
                    .map(|(index, name)| format!("\"{}\": __bale_ext{index}", escape(name)))
                    .collect();
                writer.glue(&format!(
                    "var __bale_externals = {{ {} }};\n",
                    bindings.join(", ")
                ));
            }
        }

        // Runtime.
        writer.glue(runtime::CORE);
        writer.glue(runtime::external_helper(format));
        if !chunk.dynamic_imports.is_empty() {
            let manifest = self.runtime_manifest_literal();
            writer.glue(&runtime::dynamic_loader(
                self.options.target,
                format,
                &manifest,
            ));
        }

        // Module factories, dependencies before dependents.
        let mut sources: Vec<String> = Vec::new();
        let mut sources_content: Vec<String> = Vec::new();
        let mut module_hashes = Vec::new();
        for id in &chunk.modules {
            let module = self.graph.get(*id);
            let rewritten = rewrite_module(module, self.graph, self.chunks, &self.star_names);
            let source_index = sources.len();
            sources.push(module.stable_id.clone());
            sources_content.push(module.source.clone());

            writer.glue(&format!(
                "__bale_modules[\"{}\"] = function (module, exports, require) {{\n",
                escape(&module.stable_id)
            ));
            if !rewritten.header.is_empty() {
                writer.glue(&format!("{}\n", rewritten.header));
            }
            writer.module_body(&rewritten.body, source_index, module.prepended_lines);
            writer.glue("};\n");

            module_hashes.push((
                module.stable_id.clone(),
                ContentHash::of(rewritten.body.as_bytes()),
            ));
        }

        // Trailer.
        if chunk.is_entry {
            match format {
                OutputFormat::Iife => {
                    for root in &chunk.roots {
                        writer.glue(&format!(
                            "__bale_require(\"{}\");\n",
                            escape(&self.graph.get(*root).stable_id)
                        ));
                    }
                }
                OutputFormat::Cjs => {
                    if let Some(first) = chunk.roots.first() {
                        writer.glue(&format!(
                            "module.exports = __bale_require(\"{}\");\n",
                            escape(&self.graph.get(*first).stable_id)
                        ));
                    }
                    for extra in chunk.roots.iter().skip(1) {
                        writer.glue(&format!(
                            "__bale_require(\"{}\");\n",
                            escape(&self.graph.get(*extra).stable_id)
                        ));
                    }
                }
                OutputFormat::Esm => {
                    if let Some(first) = chunk.roots.first() {
                        for extra in chunk.roots.iter().skip(1) {
                            writer.glue(&format!(
                                "__bale_require(\"{}\");\n",
                                escape(&self.graph.get(*extra).stable_id)
                            ));
                        }
                        let entry = self.graph.get(*first);
                        writer.glue(&format!(
                            "var __bale_entry = __bale_require(\"{}\");\n",
                            escape(&entry.stable_id)
                        ));
                        for name in self.export_names_of(*first) {
                            if name == "default" {
                                writer
                                    .glue("export default __bale_default(__bale_entry);\n");
                            } else if is_identifier(name) {
                                writer.glue(&format!(
                                    "export var {name} = __bale_entry[\"{}\"];\n",
                                    escape(name)
                                ));
                            }
                        }
                    }
                }
            }
        }
        if format == OutputFormat::Iife {
            writer.glue("})();\n");
        }

        let file_name = self.file_names[chunk_index].clone();
        let (code, source_map, map_file_name) = match self.options.sourcemap {
            SourceMapMode::None => (writer.text, None, None),
            SourceMapMode::Inline => {
                let map =
                    source_map::render(&file_name, &sources, &sources_content, &writer.origins);
                let mut code = writer.text;
                code.push_str(&source_map::inline_comment(&map));
                (code, Some(map), None)
            }
            SourceMapMode::External => {
                let map =
                    source_map::render(&file_name, &sources, &sources_content, &writer.origins);
                let map_file = format!("{file_name}.map");
                let mut code = writer.text;
                code.push_str(&source_map::external_comment(&map_file));
                (code, Some(map), Some(map_file))
            }
        };

        debug!(chunk = %chunk.id, bytes = code.len(), "emitted");
        EmittedChunk {
            id: chunk.id.clone(),
            file_name,
            hash: ContentHash::of(code.as_bytes()),
            code,
            source_map,
            map_file_name,
            is_entry: chunk.is_entry,
            modules: chunk
                .modules
                .iter()
                .map(|id| self.graph.get(*id).stable_id.clone())
                .collect(),
            module_hashes,
            imports: chunk
                .imports
                .iter()
                .map(|i| self.chunks.chunks[*i].id.clone())
                .collect(),
            dynamic_imports: chunk
                .dynamic_imports
                .iter()
                .map(|i| self.chunks.chunks[*i].id.clone())
                .collect(),
        }
    }

    /// External names referenced by a chunk's modules, sorted.
    fn chunk_externals(&self, chunk_index: usize) -> Vec<String> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        for id in &self.chunks.chunks[chunk_index].modules {
            for dependency in &self.graph.get(*id).dependencies {
                if let DependencyTarget::External(name) = &dependency.target {
                    names.insert(name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// The embedded manifest literal the dynamic loader consults:
    /// chunk id → `{path, imports}`.
    fn runtime_manifest_literal(&self) -> String {
        let mut entries: Vec<String> = Vec::new();
        for (index, chunk) in self.chunks.chunks.iter().enumerate() {
            let imports: Vec<String> = chunk
                .imports
                .iter()
                .map(|i| format!("\"{}\"", escape(&self.chunks.chunks[*i].id)))
                .collect();
            entries.push(format!(
                "\"{}\": {{ \"path\": \"{}\", \"imports\": [{}] }}",
                escape(&chunk.id),
                escape(&self.file_names[index]),
                imports.join(", ")
            ));
        }
        format!("{{ {} }}", entries.join(", "))
    }
}

/// Compute the `export *` fixed point: each module's complete export name
/// set after expanding internal star re-exports, cycles included.
pub fn star_export_names(graph: &ModuleGraph) -> FxHashMap<ModuleId, Vec<String>> {
    let mut names: FxHashMap<ModuleId, BTreeSet<String>> = FxHashMap::default();
    for module in graph.iter() {
        names.insert(
            module.id,
            module.exported_names.iter().cloned().collect(),
        );
    }

    let order = graph.ids_by_path();
    loop {
        let mut changed = false;
        for id in &order {
            let module = graph.get(*id);
            let mut additions: Vec<String> = Vec::new();
            for (index, record) in module.parse.imports.iter().enumerate() {
                if record.kind != bale_parser::ImportKind::ReExportAll {
                    continue;
                }
                if let DependencyTarget::Internal(target) = &module.dependencies[index].target {
                    if let Some(target_names) = names.get(target) {
                        additions.extend(
                            target_names
                                .iter()
                                .filter(|n| n.as_str() != "default")
                                .cloned(),
                        );
                    }
                }
            }
            if !additions.is_empty() {
                let own = names.get_mut(id).expect("all modules seeded");
                for name in additions {
                    changed |= own.insert(name);
                }
            }
        }
        if !changed {
            break;
        }
    }

    names
        .into_iter()
        .map(|(id, set)| (id, set.into_iter().collect()))
        .collect()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Accumulates chunk text and the per-line origin table for the map.
#[derive(Default)]
struct ChunkWriter {
    text: String,
    origins: Vec<LineOrigin>,
}

impl ChunkWriter {
    /// Append glue text that maps to no source.
    fn glue(&mut self, text: &str) {
        for _ in 0..text.matches('\n').count() {
            self.origins.push(None);
        }
        self.text.push_str(text);
        debug_assert!(text.ends_with('\n') || !text.contains('\n'));
    }

    /// Append a rewritten module body, mapping its lines back to the
    /// module source (offset by the transformer's prepended lines).
    fn module_body(&mut self, body: &str, source_index: usize, prepended_lines: u32) {
        let line_count = body.matches('\n').count() + usize::from(!body.ends_with('\n'));
        for line in 0..line_count {
            let line = line as u32;
            if line < prepended_lines {
                self.origins.push(None);
            } else {
                self.origins
                    .push(Some((source_index, line - prepended_lines)));
            }
        }
        self.text.push_str(body);
        if !body.ends_with('\n') {
            self.text.push('\n');
        }
    }
}
