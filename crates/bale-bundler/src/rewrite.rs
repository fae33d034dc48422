//! Import/export rewriting.
//!
//! Turns a module's transformed text into a registry factory body by
//! splicing replacements at the byte spans the scanner recorded - one
//! strategy, driven entirely by the tables, never by pattern matching over
//! the text. Newline counts are preserved at every splice so line-level
//! source maps survive rewriting.

use rustc_hash::FxHashMap;

use bale_core::ModuleId;
use bale_graph::{DependencyTarget, Module, ModuleGraph, ModuleKind};
use bale_parser::{Binding, ExportStatement, ImportKind, Span};

use crate::chunk::ChunkGraph;

/// A rewritten factory body plus the header the emitter prepends.
pub struct RewrittenModule {
    /// Single header line: ESM marker and export getters.
    pub header: String,
    /// The spliced module text.
    pub body: String,
}

struct Splice {
    span: Span,
    text: String,
}

/// Rewrite one module for emission.
///
/// `star_names` carries the build-time `export *` fixed point: for each
/// module, its complete export name set (used when this module star
/// re-exports an internal target).
pub fn rewrite_module(
    module: &Module,
    graph: &ModuleGraph,
    chunks: &ChunkGraph,
    star_names: &FxHashMap<ModuleId, Vec<String>>,
) -> RewrittenModule {
    let mut splices: Vec<Splice> = Vec::new();

    for (index, record) in module.parse.imports.iter().enumerate() {
        let dependency = &module.dependencies[index];
        let temp = format!("__bale_i{index}");
        let require_expr = match &dependency.target {
            DependencyTarget::Internal(id) => {
                format!("require(\"{}\")", graph.get(*id).stable_id)
            }
            DependencyTarget::External(name) => {
                format!("__bale_external(\"{}\")", escape(name))
            }
        };

        let text = match record.kind {
            ImportKind::StaticFrom => {
                if record.bindings.is_empty() {
                    format!("{require_expr};")
                } else {
                    let mut parts = vec![format!("var {temp} = {require_expr};")];
                    let mut named: Vec<String> = Vec::new();
                    for binding in &record.bindings {
                        match binding {
                            Binding::Default { local } => {
                                parts.push(format!("var {local} = __bale_default({temp});"));
                            }
                            Binding::Namespace { local } => {
                                parts.push(format!("var {local} = __bale_ns({temp});"));
                            }
                            Binding::Named { imported, local } => {
                                if imported == local {
                                    named.push(local.clone());
                                } else {
                                    named.push(format!("{imported}: {local}"));
                                }
                            }
                        }
                    }
                    if !named.is_empty() {
                        parts.push(format!("var {{ {} }} = {temp};", named.join(", ")));
                    }
                    parts.join(" ")
                }
            }
            ImportKind::SideEffect => format!("{require_expr};"),
            ImportKind::RequireCall => require_expr,
            ImportKind::DynamicCall => match &dependency.target {
                DependencyTarget::Internal(id) => {
                    let target = graph.get(*id);
                    if target.chunk == module.chunk {
                        // The target was forced into this very chunk;
                        // nothing to fetch, just defer instantiation.
                        format!(
                            "Promise.resolve().then(function () {{ return __bale_require(\"{}\"); }})",
                            escape(&target.stable_id)
                        )
                    } else {
                        let chunk_id = target
                            .chunk
                            .map(|index| chunks.chunks[index].id.clone())
                            .unwrap_or_default();
                        format!(
                            "__bale_import(\"{}\", \"{}\")",
                            escape(&chunk_id),
                            escape(&target.stable_id)
                        )
                    }
                }
                DependencyTarget::External(name) => {
                    format!("__bale_import_external(\"{}\")", escape(name))
                }
            },
            ImportKind::ReExport => {
                let mut getters: Vec<String> = Vec::new();
                for binding in &record.bindings {
                    match binding {
                        Binding::Named { imported, local } => getters.push(format!(
                            "\"{}\": function () {{ return {temp}[\"{}\"]; }}",
                            escape(local),
                            escape(imported)
                        )),
                        Binding::Namespace { local } => getters.push(format!(
                            "\"{}\": function () {{ return __bale_ns({temp}); }}",
                            escape(local)
                        )),
                        Binding::Default { local } => getters.push(format!(
                            "\"{}\": function () {{ return __bale_default({temp}); }}",
                            escape(local)
                        )),
                    }
                }
                format!(
                    "var {temp} = {require_expr}; __bale_export(exports, {{ {} }});",
                    getters.join(", ")
                )
            }
            ImportKind::ReExportAll => match &dependency.target {
                DependencyTarget::Internal(id) => {
                    // Build-time expansion: forward the target's complete
                    // export set (the re-export fixed point), minus
                    // `default` and anything exported locally.
                    let forwarded: Vec<&String> = star_names
                        .get(id)
                        .map(|names| {
                            names
                                .iter()
                                .filter(|name| {
                                    name.as_str() != "default"
                                        && !module.exported_names.contains(name)
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    let getters: Vec<String> = forwarded
                        .iter()
                        .map(|name| {
                            format!(
                                "\"{0}\": function () {{ return {temp}[\"{0}\"]; }}",
                                escape(name)
                            )
                        })
                        .collect();
                    format!(
                        "var {temp} = {require_expr}; __bale_export(exports, {{ {} }});",
                        getters.join(", ")
                    )
                }
                DependencyTarget::External(_) => {
                    // Unknown names at build time: runtime copy.
                    format!("__bale_star(__bale_ns({require_expr}), exports);")
                }
            },
        };
        splices.push(Splice {
            span: record.span,
            text,
        });
    }

    let mut getters: Vec<(String, String)> = Vec::new();
    for statement in &module.parse.exports {
        match statement {
            ExportStatement::Declaration { names, span } => {
                for name in names {
                    getters.push((name.clone(), name.clone()));
                }
                splices.push(Splice {
                    span: *span,
                    text: String::new(),
                });
            }
            ExportStatement::Default { span, .. } => {
                splices.push(Splice {
                    span: *span,
                    text: "exports[\"default\"] =".to_string(),
                });
            }
            ExportStatement::NamedList { names, span } => {
                for (local, exported) in names {
                    getters.push((exported.clone(), local.clone()));
                }
                splices.push(Splice {
                    span: *span,
                    text: String::new(),
                });
            }
        }
    }

    let mut header = String::new();
    if module.kind == ModuleKind::Esm {
        header.push_str("exports.__esModule = true;");
    }
    if !getters.is_empty() {
        let list: Vec<String> = getters
            .iter()
            .map(|(exported, local)| {
                format!("\"{}\": function () {{ return {local}; }}", escape(exported))
            })
            .collect();
        if !header.is_empty() {
            header.push(' ');
        }
        header.push_str(&format!("__bale_export(exports, {{ {} }});", list.join(", ")));
    }

    RewrittenModule {
        header,
        body: splice_all(&module.code, splices),
    }
}

/// Apply splices in order, preserving the newline count of every replaced
/// range.
fn splice_all(code: &str, mut splices: Vec<Splice>) -> String {
    splices.sort_by_key(|s| s.span.start);
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0usize;
    for splice in splices {
        // Overlapping spans would mean the scanner produced nonsense;
        // skip the latecomer rather than corrupt output.
        if splice.span.start < cursor {
            continue;
        }
        out.push_str(&code[cursor..splice.span.start]);
        let replaced = &code[splice.span.start..splice.span.end.min(code.len())];
        out.push_str(&splice.text);
        let removed_newlines = replaced.matches('\n').count();
        let added_newlines = splice.text.matches('\n').count();
        for _ in added_newlines..removed_newlines {
            out.push('\n');
        }
        cursor = splice.span.end.min(code.len());
    }
    out.push_str(&code[cursor..]);
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_preserves_newlines() {
        let code = "aaa\nbbb\nccc";
        let out = splice_all(
            code,
            vec![Splice {
                span: Span::new(0, 8),
                text: "X".into(),
            }],
        );
        assert_eq!(out, "X\n\nccc");
        assert_eq!(out.matches('\n').count(), code.matches('\n').count());
    }

    #[test]
    fn splices_apply_in_span_order() {
        let code = "one two three";
        let out = splice_all(
            code,
            vec![
                Splice {
                    span: Span::new(8, 13),
                    text: "3".into(),
                },
                Splice {
                    span: Span::new(0, 3),
                    text: "1".into(),
                },
            ],
        );
        assert_eq!(out, "1 two 3");
    }
}
