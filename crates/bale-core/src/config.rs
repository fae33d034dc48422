//! Build configuration.
//!
//! [`BuildOptions`] carries every recognized option. It deserializes from
//! `bale.config.json` (camelCase keys) and is validated once, up front;
//! invalid configuration never reaches the pipeline.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Execution environment the output is emitted for.
///
/// The target selects the `exports` condition priority, the runtime
/// preamble variant, and the set of builtin specifiers treated as external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Browser,
    Server,
}

impl Target {
    /// Condition names tried, in priority order, during `exports`
    /// resolution.
    pub fn condition_names(&self) -> &'static [&'static str] {
        match self {
            Target::Browser => &["browser", "import", "module", "default", "require"],
            Target::Server => &["node", "import", "module", "require", "default"],
        }
    }

    /// Runtime builtins satisfied by the host rather than the bundle.
    ///
    /// Browser builds have none; `node:`-prefixed specifiers are external
    /// for every target and are handled before this list is consulted.
    pub fn builtin_modules(&self) -> &'static [&'static str] {
        match self {
            Target::Browser => &[],
            Target::Server => &[
                "assert",
                "buffer",
                "child_process",
                "cluster",
                "console",
                "constants",
                "crypto",
                "dgram",
                "dns",
                "events",
                "fs",
                "http",
                "http2",
                "https",
                "module",
                "net",
                "os",
                "path",
                "perf_hooks",
                "process",
                "querystring",
                "readline",
                "stream",
                "string_decoder",
                "timers",
                "tls",
                "tty",
                "url",
                "util",
                "v8",
                "vm",
                "worker_threads",
                "zlib",
            ],
        }
    }
}

/// Shape of the emitted chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Iife,
    Cjs,
    Esm,
}

/// Source map emission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    #[default]
    None,
    Inline,
    External,
}

/// JSX lowering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    /// `h(tag, props, ...children)` against a configured factory.
    Classic,
    /// `jsx(tag, props)` / `jsxs(tag, props)` imported from
    /// `<importSource>/jsx-runtime`.
    #[default]
    Automatic,
}

/// JSX lowering options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsxOptions {
    pub runtime: JsxRuntime,
    /// Factory for the classic runtime.
    pub factory: String,
    /// Fragment reference for the classic runtime.
    pub fragment: String,
    /// Package providing `jsx-runtime` for the automatic runtime.
    pub import_source: String,
}

impl Default for JsxOptions {
    fn default() -> Self {
        Self {
            runtime: JsxRuntime::Automatic,
            factory: "h".to_string(),
            fragment: "Fragment".to_string(),
            import_source: "react".to_string(),
        }
    }
}

/// Default extension probe order for a JavaScript project.
pub const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "json"];

/// Default extension probe order for a TypeScript project.
pub const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json"];

/// The full set of recognized build options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildOptions {
    /// Entry paths, resolved like relative imports from [`Self::root`].
    pub entry: Vec<PathBuf>,
    /// Project root; defaults to the process working directory.
    pub root: PathBuf,
    /// Directory chunks and assets are written into.
    pub outdir: PathBuf,
    pub target: Target,
    pub format: OutputFormat,
    /// When false, every surviving module lands in a single chunk.
    pub splitting: bool,
    /// When false, survival equals reachability from the entries.
    pub treeshake: bool,
    /// Run the configured minifier over each emitted chunk.
    pub minify: bool,
    pub sourcemap: SourceMapMode,
    /// Literal names and `prefix*` patterns marked external.
    pub external: Vec<String>,
    /// Specifier prefix replacements, applied before filesystem probing.
    pub alias: FxHashMap<String, String>,
    /// Dotted identifier path -> replacement literal.
    pub define: FxHashMap<String, String>,
    /// tsconfig-style path maps: pattern -> candidate targets in order.
    pub paths: FxHashMap<String, Vec<String>>,
    /// Extension probe order; empty means derive from the entry extensions.
    pub extensions: Vec<String>,
    pub jsx: JsxOptions,
    /// Include the chunk content hash in emitted file names.
    pub hashed_names: bool,
    /// Directory for the persistent transform cache; `None` keeps the
    /// cache process-local.
    pub cache_dir: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            root: PathBuf::from("."),
            outdir: PathBuf::from("dist"),
            target: Target::default(),
            format: OutputFormat::default(),
            splitting: true,
            treeshake: true,
            minify: false,
            sourcemap: SourceMapMode::None,
            external: Vec::new(),
            alias: FxHashMap::default(),
            define: FxHashMap::default(),
            paths: FxHashMap::default(),
            extensions: Vec::new(),
            jsx: JsxOptions::default(),
            hashed_names: false,
            cache_dir: None,
        }
    }
}

impl BuildOptions {
    /// Convenience constructor for a single entry.
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: vec![entry.into()],
            ..Self::default()
        }
    }

    /// Load options from a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|source| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            source: serde_json::Error::io(source),
        })?;
        serde_json::from_reader(file).map_err(|source| ConfigError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The extension probe order, derived from the entries when not
    /// configured: a project whose entries include TypeScript prefers
    /// TypeScript completions.
    pub fn extension_order(&self) -> Vec<String> {
        if !self.extensions.is_empty() {
            return self.extensions.clone();
        }
        let typescript_entry = self.entry.iter().any(|e| {
            matches!(
                e.extension().and_then(|x| x.to_str()),
                Some("ts") | Some("tsx") | Some("mts") | Some("cts")
            )
        });
        let defaults = if typescript_entry {
            TS_EXTENSIONS
        } else {
            JS_EXTENSIONS
        };
        defaults.iter().map(|s| s.to_string()).collect()
    }

    /// Validate the configuration up front.
    ///
    /// Entries must exist on disk relative to the root, patterns must be
    /// well formed, and the outdir must not shadow the root itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.is_empty() {
            return Err(ConfigError::NoEntries);
        }
        for entry in &self.entry {
            let absolute = self.entry_path(entry);
            if !absolute.is_file() {
                return Err(ConfigError::EntryNotFound(absolute));
            }
        }
        for pattern in &self.external {
            if pattern.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "external".into(),
                    value: String::new(),
                    hint: "external patterns must be non-empty".into(),
                });
            }
            if let Some(star) = pattern.find('*') {
                if star != pattern.len() - 1 {
                    return Err(ConfigError::InvalidValue {
                        field: "external".into(),
                        value: pattern.clone(),
                        hint: "only trailing '*' wildcards are supported".into(),
                    });
                }
            }
        }
        for (key, value) in &self.define {
            if key.is_empty() || key.split('.').any(|seg| !is_identifier(seg)) {
                return Err(ConfigError::InvalidValue {
                    field: "define".into(),
                    value: key.clone(),
                    hint: "define keys must be dotted identifier paths".into(),
                });
            }
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "define".into(),
                    value: key.clone(),
                    hint: "define replacements must be non-empty literals".into(),
                });
            }
        }
        Ok(())
    }

    /// Absolute path of an entry specifier.
    pub fn entry_path(&self, entry: &Path) -> PathBuf {
        if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.root.join(entry)
        }
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_priority_by_target() {
        assert_eq!(
            Target::Browser.condition_names(),
            &["browser", "import", "module", "default", "require"]
        );
        assert_eq!(
            Target::Server.condition_names(),
            &["node", "import", "module", "require", "default"]
        );
    }

    #[test]
    fn extension_order_prefers_typescript_for_ts_entries() {
        let opts = BuildOptions::new("src/index.ts");
        assert_eq!(opts.extension_order()[0], "ts");

        let opts = BuildOptions::new("src/index.js");
        assert_eq!(opts.extension_order()[0], "js");
    }

    #[test]
    fn validate_rejects_empty_entries() {
        let opts = BuildOptions::default();
        assert!(matches!(opts.validate(), Err(ConfigError::NoEntries)));
    }

    #[test]
    fn validate_rejects_infix_wildcards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "export {}").unwrap();
        let mut opts = BuildOptions::new(dir.path().join("a.js"));
        opts.external.push("pre*post".into());
        assert!(matches!(
            opts.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "external"
        ));
    }

    #[test]
    fn validate_rejects_bad_define_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "export {}").unwrap();
        let mut opts = BuildOptions::new(dir.path().join("a.js"));
        opts.define.insert("1bad.key".into(), "true".into());
        assert!(opts.validate().is_err());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bale.config.json"),
            r#"{
                "entry": ["src/main.ts"],
                "target": "server",
                "format": "cjs",
                "splitting": false,
                "define": { "process.env.NODE_ENV": "\"production\"" }
            }"#,
        )
        .unwrap();
        let opts = BuildOptions::from_file(&dir.path().join("bale.config.json")).unwrap();
        assert_eq!(opts.target, Target::Server);
        assert_eq!(opts.format, OutputFormat::Cjs);
        assert!(!opts.splitting);
        assert!(opts.treeshake);
        assert_eq!(
            opts.define.get("process.env.NODE_ENV").map(String::as_str),
            Some("\"production\"")
        );
    }
}
