//! End-to-end pipeline tests over real on-disk module trees.

use std::path::Path;
use std::sync::Arc;

use bale_bundler::{BuildOutput, Bundler};
use bale_core::{BuildOptions, OutputFormat, SourceMapMode, Target};

fn write(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn options(root: &Path, entries: &[&str]) -> BuildOptions {
    let mut options = BuildOptions::default();
    options.root = root.to_path_buf();
    options.entry = entries.iter().map(|e| e.into()).collect();
    options.outdir = root.join("dist");
    options
}

async fn build(options: BuildOptions) -> BuildOutput {
    Bundler::new(options).unwrap().build().await.unwrap()
}

#[tokio::test]
async fn minimal_esm_single_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.js"), "export const x = 1;\n");
    write(&root.join("b.js"), "import { x } from './a.js';\nconsole.log(x);\n");

    let mut opts = options(root, &["b.js"]);
    opts.format = OutputFormat::Iife;
    opts.splitting = false;
    let output = build(opts).await;

    assert_eq!(output.chunks.len(), 1);
    let chunk = &output.chunks[0];
    assert!(chunk.is_entry);
    // Registry entries for both modules; a.js required exactly once from
    // b.js's factory.
    assert!(chunk.code.contains("__bale_modules[\"a.js\"]"));
    assert!(chunk.code.contains("__bale_modules[\"b.js\"]"));
    assert_eq!(chunk.code.matches("require(\"a.js\")").count(), 1);
    // The entry trailer runs b.js.
    assert!(chunk.code.contains("__bale_require(\"b.js\");"));
    // IIFE shell.
    assert!(chunk.code.starts_with("(function () {"));
    assert!(chunk.code.trim_end().ends_with("})();"));
}

#[tokio::test]
async fn typescript_and_jsx_are_erased() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    // The automatic runtime import the transformer injects resolves like
    // any other bare specifier.
    write(
        &root.join("node_modules/react/package.json"),
        r#"{ "name": "react", "main": "./index.js" }"#,
    );
    write(&root.join("node_modules/react/index.js"), "export default {};\n");
    write(
        &root.join("node_modules/react/jsx-runtime.js"),
        "export function jsx(t, p) { return { t, p }; }\nexport function jsxs(t, p) { return { t, p }; }\nexport var Fragment = {};\n",
    );
    write(
        &root.join("c.tsx"),
        "export const V: number = 2;\nexport const E = <div>{V}</div>;\n",
    );

    let output = build(options(root, &["c.tsx"])).await;
    let code = &output.chunks[0].code;
    assert!(!code.contains(": number"));
    assert!(!code.contains("<div>"));
    assert!(code.contains("_jsx"));
    assert!(code.contains("__bale_modules[\"c.tsx\"]"));
    assert!(output.chunks[0]
        .modules
        .contains(&"node_modules/react/jsx-runtime.js".to_string()));
}

#[tokio::test]
async fn dynamic_import_splits_and_lands_in_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("e.js"), "export default 7;\n");
    write(
        &root.join("m.js"),
        "const m = await import('./e.js');\nconsole.log(m.default);\n",
    );

    let mut opts = options(root, &["m.js"]);
    opts.splitting = true;
    let output = build(opts).await;

    assert_eq!(output.chunks.len(), 2);
    let main = output.chunks.iter().find(|c| c.is_entry).unwrap();
    let lazy = output.chunks.iter().find(|c| !c.is_entry).unwrap();
    assert!(main.modules.contains(&"m.js".to_string()));
    assert!(lazy.modules.contains(&"e.js".to_string()));

    // The entry chunk calls the loader with the lazy chunk's id.
    assert!(main
        .code
        .contains(&format!("__bale_import(\"{}\", \"e.js\")", lazy.id)));
    // And the manifest maps that id to the emitted path.
    assert_eq!(output.manifest.chunks[&lazy.id].path, lazy.file_name);
    assert!(main.dynamic_imports.contains(&lazy.id));
}

#[tokio::test]
async fn treeshaken_module_with_live_import_survives() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("package.json"),
        r#"{ "name": "app", "sideEffects": false }"#,
    );
    write(&root.join("u.js"), "export const keep = 1;\nexport const drop = 2;\n");
    write(&root.join("main.js"), "import { keep } from './u.js';\nconsole.log(keep);\n");

    let output = build(options(root, &["main.js"])).await;
    let chunk = &output.chunks[0];
    assert!(chunk.modules.contains(&"u.js".to_string()));
    assert!(chunk.code.contains("keep"));
}

#[tokio::test]
async fn alias_resolution_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("x/v.js"), "export default 5;\n");
    write(&root.join("main.js"), "import v from '@x/v.js';\nconsole.log(v);\n");

    let mut opts = options(root, &["main.js"]);
    opts.alias.insert(
        "@x".to_string(),
        root.join("x").to_string_lossy().into_owned(),
    );
    let output = build(opts).await;
    let chunk = &output.chunks[0];
    assert!(chunk.modules.contains(&"x/v.js".to_string()));
    assert!(chunk.code.contains("exports[\"default\"] = 5;"));
    assert!(chunk.code.contains("__bale_default("));
}

#[tokio::test]
async fn conditional_exports_follow_target() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("node_modules/pkg/package.json"),
        r#"{ "name": "pkg", "exports": { "./sub": { "browser": "./b.js", "default": "./d.js" } } }"#,
    );
    write(&root.join("node_modules/pkg/b.js"), "export const which = 'browser';\n");
    write(&root.join("node_modules/pkg/d.js"), "export const which = 'server';\n");
    write(&root.join("main.js"), "import { which } from 'pkg/sub';\nconsole.log(which);\n");

    let mut browser = options(root, &["main.js"]);
    browser.target = Target::Browser;
    let output = build(browser).await;
    assert!(output.chunks[0]
        .modules
        .contains(&"node_modules/pkg/b.js".to_string()));

    let mut server = options(root, &["main.js"]);
    server.target = Target::Server;
    server.format = OutputFormat::Cjs;
    let output = build(server).await;
    assert!(output.chunks[0]
        .modules
        .contains(&"node_modules/pkg/d.js".to_string()));
}

#[tokio::test]
async fn double_build_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("dep.js"), "export const d = 1;\n");
    write(&root.join("lazy.js"), "import { d } from './dep.js';\nexport default d;\n");
    write(
        &root.join("main.js"),
        "import { d } from './dep.js';\nimport('./lazy.js');\nconsole.log(d);\n",
    );

    let first = build(options(root, &["main.js"])).await;
    let second = build(options(root, &["main.js"])).await;

    let render = |output: &BuildOutput| {
        output
            .chunks
            .iter()
            .map(|c| (c.file_name.clone(), c.code.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(render(&first), render(&second));
    assert_eq!(first.manifest.to_json(), second.manifest.to_json());
}

#[tokio::test]
async fn edit_and_revert_round_trips_to_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.js"), "export const x = 1;\n");
    write(&root.join("main.js"), "import { x } from './a.js';\nconsole.log(x);\n");

    // One bundler instance across builds, as the dev loop uses it.
    let bundler = Bundler::new(options(root, &["main.js"])).unwrap();
    let first = bundler.build().await.unwrap();

    write(&root.join("a.js"), "export const x = 2;\n");
    bundler.resolver().invalidate();
    let edited = bundler.build().await.unwrap();
    assert_ne!(first.chunks[0].code, edited.chunks[0].code);

    write(&root.join("a.js"), "export const x = 1;\n");
    bundler.resolver().invalidate();
    let reverted = bundler.build().await.unwrap();
    assert_eq!(first.chunks[0].code, reverted.chunks[0].code);
    assert_eq!(first.chunks[0].hash, reverted.chunks[0].hash);
}

#[tokio::test]
async fn reexport_cycle_emits_both_modules() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.js"), "export * from './b.js';\nexport const fromA = 1;\n");
    write(&root.join("b.js"), "export * from './a.js';\nexport const fromB = 2;\n");
    write(
        &root.join("main.js"),
        "import { fromA, fromB } from './a.js';\nconsole.log(fromA, fromB);\n",
    );

    let output = build(options(root, &["main.js"])).await;
    let chunk = &output.chunks[0];
    assert!(chunk.modules.contains(&"a.js".to_string()));
    assert!(chunk.modules.contains(&"b.js".to_string()));
    // The star expansion reached the fixed point: a.js forwards fromB.
    let a_factory = chunk
        .code
        .split("__bale_modules[\"a.js\"]")
        .nth(1)
        .unwrap()
        .split("__bale_modules[")
        .next()
        .unwrap();
    assert!(a_factory.contains("\"fromB\""));
}

#[tokio::test]
async fn module_with_no_imports_or_exports_is_a_valid_entry() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("main.js"), "console.log('standalone');\n");

    let output = build(options(root, &["main.js"])).await;
    let chunk = &output.chunks[0];
    assert!(chunk.code.contains("__bale_modules[\"main.js\"]"));
    assert!(chunk.code.contains("__bale_require(\"main.js\");"));
}

#[tokio::test]
async fn externals_are_left_to_the_host() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("main.js"),
        "import fs from 'node:fs';\nimport react from 'react';\nconsole.log(fs, react);\n",
    );

    let mut opts = options(root, &["main.js"]);
    opts.target = Target::Server;
    opts.format = OutputFormat::Cjs;
    opts.external = vec!["react".into()];
    let output = build(opts).await;
    let code = &output.chunks[0].code;
    assert!(code.contains("__bale_external(\"node:fs\")"));
    assert!(code.contains("__bale_external(\"react\")"));
    // Externals never become modules.
    assert_eq!(output.chunks[0].modules, vec!["main.js".to_string()]);
}

#[tokio::test]
async fn esm_format_exports_entry_names() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("lib.js"), "export const version = 3;\nexport default version;\n");

    let mut opts = options(root, &["lib.js"]);
    opts.format = OutputFormat::Esm;
    let output = build(opts).await;
    let code = &output.chunks[0].code;
    assert!(code.contains("export var version = __bale_entry[\"version\"];"));
    assert!(code.contains("export default __bale_default(__bale_entry);"));
}

#[tokio::test]
async fn source_maps_cover_every_module() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("a.js"), "export const x = 1;\n");
    write(&root.join("main.js"), "import { x } from './a.js';\nconsole.log(x);\n");

    let mut opts = options(root, &["main.js"]);
    opts.sourcemap = SourceMapMode::External;
    let output = build(opts).await;
    let chunk = &output.chunks[0];
    let map = chunk.source_map.as_ref().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(map).unwrap();
    let sources: Vec<&str> = parsed["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert_eq!(sources, ["a.js", "main.js"]);
    assert!(chunk.code.contains("sourceMappingURL="));
    assert_eq!(chunk.map_file_name.as_deref(), Some(&*format!("{}.map", chunk.file_name)));
}

#[tokio::test]
async fn minify_produces_smaller_byte_identical_reruns() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("main.js"),
        "// a comment\nexport const value = 1;\n\nconsole.log( value );\n",
    );

    let mut opts = options(root, &["main.js"]);
    opts.minify = true;
    let first = build(opts.clone()).await;
    let second = build(opts).await;
    assert_eq!(first.chunks[0].code, second.chunks[0].code);
    assert!(!first.chunks[0].code.contains("// a comment"));
}

#[tokio::test]
async fn write_output_writes_chunks_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("main.js"), "console.log(1);\n");

    let bundler = Bundler::new(options(root, &["main.js"])).unwrap();
    let output = bundler.build().await.unwrap();
    bundler.write_output(&output).unwrap();

    let outdir = root.join("dist");
    assert!(outdir.join(&output.chunks[0].file_name).is_file());
    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(outdir.join("manifest.json")).unwrap())
            .unwrap();
    assert!(manifest["chunks"].is_object());
}

#[tokio::test]
async fn plugins_intercept_resolution_and_loading() {
    use bale_core::plugin::{Loaded, Loader, Plugin, PluginBuild, ResolveOutcome};

    struct Virtual;
    impl Plugin for Virtual {
        fn name(&self) -> &str {
            "virtual"
        }
        fn setup(&self, build: &mut PluginBuild) {
            build.on_resolve(regex::Regex::new("^virtual:").unwrap(), |args| {
                Ok(Some(ResolveOutcome::Path(
                    std::path::Path::new("/virtual").join(&args.specifier["virtual:".len()..]),
                )))
            });
            build.on_load(regex::Regex::new("^/virtual/").unwrap(), |path| {
                let name = path.file_name().unwrap().to_string_lossy();
                Ok(Some(Loaded {
                    source: format!("export const provided = \"{name}\";"),
                    loader: Loader::Js,
                }))
            });
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        &root.join("main.js"),
        "import { provided } from 'virtual:thing';\nconsole.log(provided);\n",
    );

    let bundler =
        Bundler::with_plugins(options(root, &["main.js"]), vec![Arc::new(Virtual)]).unwrap();
    let output = bundler.build().await.unwrap();
    assert!(output.chunks[0].code.contains("provided = \"thing\""));
}
