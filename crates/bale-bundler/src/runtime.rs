//! The self-hosted runtime.
//!
//! Every chunk carries a small loader: a module registry keyed by stable
//! id, a memoising `require`, interop helpers for default/namespace
//! imports, and - when the chunk uses `import()` - a manifest-driven
//! dynamic loader. The registry lives on `globalThis` so chunks loaded
//! separately share one module instance space.
//!
//! The JavaScript here is static template data; nothing is assembled
//! per-build except the embedded manifest literal.

use bale_core::{OutputFormat, Target};

/// Registry, `require`, and interop helpers. Present in every chunk.
pub const CORE: &str = r#"var __bale_modules = (globalThis.__bale_modules = globalThis.__bale_modules || {});
var __bale_cache = (globalThis.__bale_cache = globalThis.__bale_cache || {});
function __bale_require(id) {
  var cached = __bale_cache[id];
  if (cached) return cached.exports;
  var module = (__bale_cache[id] = { exports: {} });
  __bale_modules[id](module, module.exports, __bale_require);
  return module.exports;
}
function __bale_default(m) {
  return m && m.__esModule ? m["default"] : m;
}
function __bale_ns(m) {
  if (m && m.__esModule) return m;
  var ns = { __esModule: true, "default": m };
  for (var key in m) if (key !== "default") ns[key] = m[key];
  return ns;
}
function __bale_export(exports, getters) {
  for (var name in getters) {
    if (!Object.prototype.hasOwnProperty.call(exports, name)) {
      Object.defineProperty(exports, name, { get: getters[name], enumerable: true, configurable: true });
    }
  }
}
function __bale_star(from, exports) {
  for (var key in from) {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(exports, key)) {
      exports[key] = from[key];
    }
  }
  return exports;
}
"#;

/// How external specifiers reach the host environment, per format.
pub fn external_helper(format: OutputFormat) -> &'static str {
    match format {
        // The host `require` satisfies externals directly.
        OutputFormat::Cjs => {
            "function __bale_external(name) { return require(name); }\n\
             function __bale_import_external(name) { return Promise.resolve(__bale_ns(__bale_external(name))); }\n"
        }
        // Browsers get externals from a pre-bound global map (an import
        // map loader or inline script populates it).
        OutputFormat::Iife => {
            "function __bale_external(name) {\n\
               var provided = (globalThis.__bale_externals || {})[name];\n\
               if (provided === undefined) throw new Error(\"external module '\" + name + \"' is not provided\");\n\
               return provided;\n\
             }\n\
             function __bale_import_external(name) { return Promise.resolve(__bale_ns(__bale_external(name))); }\n"
        }
        // ESM chunks import externals statically; the emitter binds them
        // into __bale_externals above this helper.
        OutputFormat::Esm => {
            "function __bale_external(name) { return __bale_ns(__bale_externals[name]); }\n\
             function __bale_import_external(name) { return Promise.resolve(__bale_external(name)); }\n"
        }
    }
}

/// The dynamic loader. `manifest_literal` is the embedded chunk-id →
/// `{path, imports, css?}` object the loader consults.
pub fn dynamic_loader(target: Target, format: OutputFormat, manifest_literal: &str) -> String {
    let mut out = String::new();
    out.push_str("var __bale_manifest = ");
    out.push_str(manifest_literal);
    out.push_str(";\n");
    out.push_str(
        "var __bale_loaded = (globalThis.__bale_loaded = globalThis.__bale_loaded || {});\n",
    );
    match target {
        Target::Browser => out.push_str(
            r#"function __bale_load(chunkId) {
  if (__bale_loaded[chunkId]) return __bale_loaded[chunkId];
  var entry = __bale_manifest[chunkId];
  var promise = Promise.all(entry.imports.map(__bale_load)).then(function () {
    return new Promise(function (resolve, reject) {
      if (entry.css) {
        var link = document.createElement("link");
        link.rel = "stylesheet";
        link.href = entry.css;
        document.head.appendChild(link);
      }
      var script = document.createElement("script");
      script.src = entry.path;
      script.onload = function () { resolve(); };
      script.onerror = function () { reject(new Error("failed to load chunk " + chunkId)); };
      document.head.appendChild(script);
    });
  });
  return (__bale_loaded[chunkId] = promise);
}
"#,
        ),
        Target::Server => match format {
            OutputFormat::Esm => out.push_str(
                r#"function __bale_load(chunkId) {
  if (__bale_loaded[chunkId]) return __bale_loaded[chunkId];
  var entry = __bale_manifest[chunkId];
  var promise = Promise.all(entry.imports.map(__bale_load)).then(function () {
    return import("./" + entry.path);
  });
  return (__bale_loaded[chunkId] = promise);
}
"#,
            ),
            _ => out.push_str(
                r#"function __bale_load(chunkId) {
  if (__bale_loaded[chunkId]) return __bale_loaded[chunkId];
  var entry = __bale_manifest[chunkId];
  var promise = Promise.all(entry.imports.map(__bale_load)).then(function () {
    require("./" + entry.path);
  });
  return (__bale_loaded[chunkId] = promise);
}
"#,
            ),
        },
    }
    out.push_str(
        "function __bale_import(chunkId, moduleId) {\n  return __bale_load(chunkId).then(function () { return __bale_require(moduleId); });\n}\n",
    );
    out
}
