//! # bale-resolver
//!
//! Node-style module resolution for the bale bundler.
//!
//! Maps `(specifier, importing file)` to an absolute on-disk path or an
//! external reference. The pipeline, applied in order: plugin interception,
//! configured externals and runtime builtins, alias substitution,
//! tsconfig-style path maps, relative/absolute paths, and the
//! `node_modules` walk with full package `exports` support.
//!
//! Resolution is memoised on `(importing directory, specifier)` - Node
//! resolution depends only on the containing directory - and package
//! descriptors are cached by path. The dev layer invalidates both when the
//! watcher reports a change that could affect them.

mod exports;
mod probe;

pub mod package_json;

pub use package_json::{package_name, package_subpath, PackageJson, SideEffects};
pub use probe::FsProbe;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use tracing::trace;

use bale_core::plugin::{PluginDriver, ResolveArgs, ResolveOutcome};
use bale_core::{BuildOptions, ResolveError, Target};

/// Upward-walk ceiling; a deeper chain implies a symlink cycle.
const MAX_WALK_DEPTH: usize = 64;

/// Alias substitution ceiling; a deeper chain implies an alias cycle.
const MAX_ALIAS_DEPTH: usize = 8;

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// An on-disk module to bundle, with the descriptor of its owning
    /// package when one exists.
    File {
        path: PathBuf,
        package: Option<Arc<PackageJson>>,
    },
    /// A dependency satisfied by the host environment at load time.
    External(String),
}

#[derive(Debug, Clone)]
enum CachedResolution {
    File(PathBuf),
    External(String),
    NotFound,
}

/// The module resolver. One instance lives for the whole process; the dev
/// layer calls the invalidation methods on watcher events.
pub struct Resolver {
    root: PathBuf,
    target: Target,
    external: Vec<String>,
    alias: Vec<(String, String)>,
    paths: Vec<(String, Vec<String>)>,
    extensions: Vec<String>,
    plugins: Arc<PluginDriver>,
    fs: FsProbe,
    resolutions: Mutex<FxHashMap<(PathBuf, String), CachedResolution>>,
    descriptors: Mutex<FxHashMap<PathBuf, Arc<PackageJson>>>,
    nearest: Mutex<FxHashMap<PathBuf, Option<Arc<PackageJson>>>>,
}

impl Resolver {
    pub fn new(options: &BuildOptions, plugins: Arc<PluginDriver>) -> Self {
        let mut alias: Vec<(String, String)> = options
            .alias
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        // Longest key first so `@app/x` wins over `@app`.
        alias.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut paths: Vec<(String, Vec<String>)> = options
            .paths
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        paths.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            root: options.root.clone(),
            target: options.target,
            external: options.external.clone(),
            alias,
            paths,
            extensions: options.extension_order(),
            plugins,
            fs: FsProbe::default(),
            resolutions: Mutex::new(FxHashMap::default()),
            descriptors: Mutex::new(FxHashMap::default()),
            nearest: Mutex::new(FxHashMap::default()),
        }
    }

    /// Resolve a specifier as written in `importer`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<Resolved, ResolveError> {
        let dir = importer.parent().unwrap_or(Path::new("/")).to_path_buf();
        self.resolve_from_dir(specifier, &dir, importer)
    }

    /// Resolve an entry specifier relative to the project root.
    pub fn resolve_entry(&self, specifier: &Path) -> Result<Resolved, ResolveError> {
        let candidate = if specifier.is_absolute() {
            specifier.to_path_buf()
        } else {
            self.root.join(specifier)
        }
        .clean();
        match self.probe_path(&candidate)? {
            Some(path) => Ok(self.found(path)),
            None => Err(ResolveError::NotFound {
                specifier: specifier.to_string_lossy().into_owned(),
                importer: self.root.clone(),
            }),
        }
    }

    /// Resolve from an importing directory. Results (including misses) are
    /// memoised on `(dir, specifier)`.
    pub fn resolve_from_dir(
        &self,
        specifier: &str,
        dir: &Path,
        importer: &Path,
    ) -> Result<Resolved, ResolveError> {
        let key = (dir.to_path_buf(), specifier.to_string());
        if let Some(cached) = self.resolutions.lock().get(&key) {
            return match cached {
                CachedResolution::File(path) => Ok(self.found(path.clone())),
                CachedResolution::External(name) => Ok(Resolved::External(name.clone())),
                CachedResolution::NotFound => Err(ResolveError::NotFound {
                    specifier: specifier.to_string(),
                    importer: importer.to_path_buf(),
                }),
            };
        }

        let result = self.resolve_uncached(specifier, dir, importer, 0);
        let cached = match &result {
            Ok(Resolved::File { path, .. }) => Some(CachedResolution::File(path.clone())),
            Ok(Resolved::External(name)) => Some(CachedResolution::External(name.clone())),
            Err(ResolveError::NotFound { .. }) => Some(CachedResolution::NotFound),
            // Ambiguity, cycles and I/O failures are not cached; they are
            // either fatal or may heal on the next filesystem change.
            Err(_) => None,
        };
        if let Some(cached) = cached {
            self.resolutions.lock().insert(key, cached);
        }
        result
    }

    fn resolve_uncached(
        &self,
        specifier: &str,
        dir: &Path,
        importer: &Path,
        alias_depth: usize,
    ) -> Result<Resolved, ResolveError> {
        trace!(specifier, dir = %dir.display(), "resolve");

        // 1. Plugins intercept everything else.
        let args = ResolveArgs {
            specifier,
            importer: Some(importer),
        };
        if let Some(outcome) = self.plugins.resolve(&args)? {
            return Ok(match outcome {
                ResolveOutcome::Path(path) => self.found(path.clean()),
                ResolveOutcome::External => Resolved::External(specifier.to_string()),
            });
        }

        // 2. Externals: configured patterns, node: scheme, runtime builtins.
        if self.is_external(specifier) {
            return Ok(Resolved::External(specifier.to_string()));
        }

        // 3. Alias substitution restarts the pipeline.
        if alias_depth < MAX_ALIAS_DEPTH {
            if let Some(substituted) = self.apply_alias(specifier) {
                return self.resolve_uncached(&substituted, dir, importer, alias_depth + 1);
            }
        }

        // 4. Path maps.
        if let Some(path) = self.apply_path_maps(specifier)? {
            return Ok(self.found(path));
        }

        // 5. Relative / absolute specifiers probe the filesystem directly.
        if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
        {
            let candidate = dir.join(specifier).clean();
            return match self.probe_path(&candidate)? {
                Some(path) => Ok(self.found(path)),
                None => Err(ResolveError::NotFound {
                    specifier: specifier.to_string(),
                    importer: importer.to_path_buf(),
                }),
            };
        }

        // 6. Bare specifiers walk node_modules upward.
        self.resolve_bare(specifier, dir, importer)
    }

    fn found(&self, path: PathBuf) -> Resolved {
        let package = self.package_for(&path);
        Resolved::File { path, package }
    }

    fn is_external(&self, specifier: &str) -> bool {
        if specifier.starts_with("node:") {
            return true;
        }
        for pattern in &self.external {
            if let Some(prefix) = pattern.strip_suffix('*') {
                if specifier.starts_with(prefix) {
                    return true;
                }
            } else if specifier == pattern {
                return true;
            }
        }
        let first_segment = specifier.split('/').next().unwrap_or(specifier);
        self.target
            .builtin_modules()
            .contains(&first_segment)
    }

    fn apply_alias(&self, specifier: &str) -> Option<String> {
        for (key, replacement) in &self.alias {
            if specifier == key {
                return Some(replacement.clone());
            }
            if let Some(rest) = specifier.strip_prefix(key) {
                if let Some(rest) = rest.strip_prefix('/') {
                    return Some(format!("{replacement}/{rest}"));
                }
            }
        }
        None
    }

    fn apply_path_maps(&self, specifier: &str) -> Result<Option<PathBuf>, ResolveError> {
        for (pattern, targets) in &self.paths {
            let capture = if pattern.contains('*') {
                match exports::match_pattern(pattern, specifier) {
                    Some(capture) => capture,
                    None => continue,
                }
            } else if specifier == pattern {
                ""
            } else {
                continue;
            };
            for target in targets {
                let substituted = target.replace('*', capture);
                let candidate = self.root.join(substituted).clean();
                if let Some(path) = self.probe_path(&candidate)? {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    /// The file probe: exact file, extension completion, directory index,
    /// then the package probe for directories carrying a `package.json`.
    fn probe_path(&self, candidate: &Path) -> Result<Option<PathBuf>, ResolveError> {
        if self.fs.is_file(candidate) {
            return Ok(Some(candidate.to_path_buf()));
        }
        for ext in &self.extensions {
            let with_ext = probe::append_extension(candidate, ext);
            if self.fs.is_file(&with_ext) {
                return Ok(Some(with_ext));
            }
        }
        if self.fs.is_dir(candidate) {
            for ext in &self.extensions {
                let index = candidate.join(format!("index.{ext}"));
                if self.fs.is_file(&index) {
                    return Ok(Some(index));
                }
            }
            if self.fs.is_file(&candidate.join("package.json")) {
                return self.package_probe(candidate, ".");
            }
        }
        Ok(None)
    }

    fn resolve_bare(
        &self,
        specifier: &str,
        dir: &Path,
        importer: &Path,
    ) -> Result<Resolved, ResolveError> {
        let name = package_name(specifier);
        let subpath = package_subpath(specifier);

        let mut current = Some(dir.to_path_buf());
        let mut depth = 0usize;
        while let Some(dir) = current {
            depth += 1;
            if depth > MAX_WALK_DEPTH {
                return Err(ResolveError::PackageCycle { dir });
            }
            let package_dir = dir.join("node_modules").join(name);
            if self.fs.is_dir(&package_dir) {
                if let Some(path) = self.package_probe(&package_dir, &subpath)? {
                    return Ok(self.found(path));
                }
                return Err(ResolveError::NotFound {
                    specifier: specifier.to_string(),
                    importer: importer.to_path_buf(),
                });
            }
            current = dir.parent().map(Path::to_path_buf);
        }

        Err(ResolveError::NotFound {
            specifier: specifier.to_string(),
            importer: importer.to_path_buf(),
        })
    }

    /// The package probe. `exports` is authoritative when present; a
    /// mismatch is an ambiguity, not a fallback to `main`.
    fn package_probe(
        &self,
        package_dir: &Path,
        subpath: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let manifest_path = package_dir.join("package.json");
        if !self.fs.is_file(&manifest_path) {
            // No manifest: treat the directory as plain files.
            return if subpath == "." {
                Ok(None)
            } else {
                self.probe_relative(package_dir, subpath)
            };
        }

        let descriptor = self.descriptor(&manifest_path)?;

        if let Some(exports) = &descriptor.exports {
            let conditions = self.target.condition_names();
            return match exports::resolve_exports(exports, subpath, conditions) {
                Some(target) => {
                    let candidate = package_dir.join(target).clean();
                    self.probe_path(&candidate)
                }
                None => Err(ResolveError::Ambiguous {
                    specifier: subpath.to_string(),
                    candidate: manifest_path,
                }),
            };
        }

        if subpath != "." {
            return self.probe_relative(package_dir, subpath);
        }

        if self.target == Target::Browser {
            if let Some(browser) = descriptor.browser_entry() {
                if let Some(path) = self.probe_relative(package_dir, browser)? {
                    return Ok(Some(path));
                }
            }
        }
        for entry in [descriptor.module.as_deref(), descriptor.main.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Some(path) = self.probe_relative(package_dir, entry)? {
                return Ok(Some(path));
            }
        }
        for ext in &self.extensions {
            let index = package_dir.join(format!("index.{ext}"));
            if self.fs.is_file(&index) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn probe_relative(
        &self,
        base: &Path,
        relative: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let relative = relative.strip_prefix("./").unwrap_or(relative);
        self.probe_path(&base.join(relative).clean())
    }

    fn descriptor(&self, manifest_path: &Path) -> Result<Arc<PackageJson>, ResolveError> {
        if let Some(descriptor) = self.descriptors.lock().get(manifest_path) {
            return Ok(descriptor.clone());
        }
        let descriptor = PackageJson::load(manifest_path)?;
        self.descriptors
            .lock()
            .insert(manifest_path.to_path_buf(), descriptor.clone());
        Ok(descriptor)
    }

    /// The nearest package descriptor above a module, if any. Used for
    /// side-effect determination during tree shaking.
    pub fn package_for(&self, path: &Path) -> Option<Arc<PackageJson>> {
        let start = path.parent()?.to_path_buf();
        if let Some(cached) = self.nearest.lock().get(&start) {
            return cached.clone();
        }
        let mut dir = Some(start.clone());
        let mut result = None;
        while let Some(current) = dir {
            let manifest = current.join("package.json");
            if self.fs.is_file(&manifest) {
                result = self.descriptor(&manifest).ok();
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        self.nearest.lock().insert(start, result.clone());
        result
    }

    /// Forget memoised file-existence probes. Called at the start of every
    /// build; resolutions and descriptors persist across builds.
    pub fn begin_build(&self) {
        self.fs.clear();
    }

    /// Drop every cache. The dev layer calls this when a watcher event can
    /// change resolution outcomes: a file appearing or disappearing, or a
    /// `package.json` edit.
    pub fn invalidate(&self) {
        self.fs.clear();
        self.resolutions.lock().clear();
        self.descriptors.lock().clear();
        self.nearest.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn resolver_at(root: &Path) -> Resolver {
        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        Resolver::new(&options, Arc::new(PluginDriver::default()))
    }

    fn resolved_path(resolved: Resolved) -> PathBuf {
        match resolved {
            Resolved::File { path, .. } => path,
            Resolved::External(name) => panic!("unexpectedly external: {name}"),
        }
    }

    #[test]
    fn relative_with_extension_completion() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("src/util.js"), "export const u = 1;");
        write(&root.join("src/main.js"), "import { u } from './util';");

        let resolver = resolver_at(root);
        let resolved = resolver.resolve("./util", &root.join("src/main.js")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("src/util.js"));
    }

    #[test]
    fn directory_index_completion() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("src/lib/index.js"), "export {};");
        write(&root.join("src/main.js"), "import './lib';");

        let resolver = resolver_at(root);
        let resolved = resolver.resolve("./lib", &root.join("src/main.js")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("src/lib/index.js"));
    }

    #[test]
    fn bare_specifier_walks_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "main": "./lib/entry.js" }"#,
        );
        write(&root.join("node_modules/pkg/lib/entry.js"), "export {};");
        write(&root.join("src/deep/main.js"), "import 'pkg';");

        let resolver = resolver_at(root);
        let resolved = resolver
            .resolve("pkg", &root.join("src/deep/main.js"))
            .unwrap();
        assert_eq!(
            resolved_path(resolved),
            root.join("node_modules/pkg/lib/entry.js")
        );
    }

    #[test]
    fn exports_beat_main() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "main": "./wrong.js", "exports": { ".": "./right.js" } }"#,
        );
        write(&root.join("node_modules/pkg/wrong.js"), "export {};");
        write(&root.join("node_modules/pkg/right.js"), "export {};");
        write(&root.join("main.js"), "import 'pkg';");

        let resolver = resolver_at(root);
        let resolved = resolver.resolve("pkg", &root.join("main.js")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("node_modules/pkg/right.js"));
    }

    #[test]
    fn exports_mismatch_is_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "exports": { "./only": "./only.js" } }"#,
        );
        write(&root.join("node_modules/pkg/only.js"), "export {};");
        write(&root.join("main.js"), "import 'pkg/other';");

        let resolver = resolver_at(root);
        let err = resolver
            .resolve("pkg/other", &root.join("main.js"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Ambiguous { .. }));
    }

    #[test]
    fn exports_wildcard_routes_subpaths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "exports": { "./lib/*": "./src/*.js" } }"#,
        );
        write(&root.join("node_modules/pkg/src/foo.js"), "export {};");
        write(&root.join("main.js"), "import 'pkg/lib/foo';");

        let resolver = resolver_at(root);
        let resolved = resolver.resolve("pkg/lib/foo", &root.join("main.js")).unwrap();
        assert_eq!(
            resolved_path(resolved),
            root.join("node_modules/pkg/src/foo.js")
        );
    }

    #[test]
    fn conditional_exports_follow_target() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "exports": { "./sub": { "browser": "./b.js", "default": "./d.js" } } }"#,
        );
        write(&root.join("node_modules/pkg/b.js"), "export {};");
        write(&root.join("node_modules/pkg/d.js"), "export {};");
        write(&root.join("main.js"), "import 'pkg/sub';");

        let browser = resolver_at(root);
        let resolved = browser.resolve("pkg/sub", &root.join("main.js")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("node_modules/pkg/b.js"));

        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.target = Target::Server;
        let server = Resolver::new(&options, Arc::new(PluginDriver::default()));
        let resolved = server.resolve("pkg/sub", &root.join("main.js")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("node_modules/pkg/d.js"));
    }

    #[test]
    fn alias_substitution_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("src/x/v.js"), "export default 5;");
        write(&root.join("src/main.js"), "import v from '@x/v.js';");

        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.alias.insert(
            "@x".to_string(),
            root.join("src/x").to_string_lossy().into_owned(),
        );
        let resolver = Resolver::new(&options, Arc::new(PluginDriver::default()));
        let resolved = resolver
            .resolve("@x/v.js", &root.join("src/main.js"))
            .unwrap();
        assert_eq!(resolved_path(resolved), root.join("src/x/v.js"));
    }

    #[test]
    fn path_maps_try_targets_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("lib/b/impl.ts"), "export {};");
        write(&root.join("main.ts"), "import '#a/impl';");

        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.entry = vec![root.join("main.ts")];
        options.paths.insert(
            "#a/*".to_string(),
            vec!["lib/a/*".to_string(), "lib/b/*".to_string()],
        );
        let resolver = Resolver::new(&options, Arc::new(PluginDriver::default()));
        let resolved = resolver.resolve("#a/impl", &root.join("main.ts")).unwrap();
        assert_eq!(resolved_path(resolved), root.join("lib/b/impl.ts"));
    }

    #[test]
    fn externals_and_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("main.js"), "import fs from 'node:fs';");

        let mut options = BuildOptions::default();
        options.root = root.to_path_buf();
        options.target = Target::Server;
        options.external = vec!["react".into(), "@app/*".into()];
        let resolver = Resolver::new(&options, Arc::new(PluginDriver::default()));

        let importer = root.join("main.js");
        assert!(matches!(
            resolver.resolve("node:fs", &importer).unwrap(),
            Resolved::External(_)
        ));
        assert!(matches!(
            resolver.resolve("fs", &importer).unwrap(),
            Resolved::External(_)
        ));
        assert!(matches!(
            resolver.resolve("path/posix", &importer).unwrap(),
            Resolved::External(_)
        ));
        assert!(matches!(
            resolver.resolve("react", &importer).unwrap(),
            Resolved::External(_)
        ));
        assert!(matches!(
            resolver.resolve("@app/anything", &importer).unwrap(),
            Resolved::External(_)
        ));
    }

    #[test]
    fn misses_are_cached_and_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("main.js"), "import './later';");

        let resolver = resolver_at(root);
        let importer = root.join("main.js");
        assert!(resolver.resolve("./later", &importer).is_err());

        // The file appears; the cached miss still answers until the dev
        // layer invalidates.
        write(&root.join("later.js"), "export {};");
        assert!(resolver.resolve("./later", &importer).is_err());

        resolver.invalidate();
        assert!(resolver.resolve("./later", &importer).is_ok());
    }

    #[test]
    fn same_result_regardless_of_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("a/dep.js"), "export {};");
        write(&root.join("a/one.js"), "import './dep';");
        write(&root.join("a/two.js"), "import './dep';");

        let resolver = resolver_at(root);
        let first = resolved_path(resolver.resolve("./dep", &root.join("a/one.js")).unwrap());
        let second = resolved_path(resolver.resolve("./dep", &root.join("a/two.js")).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn package_for_finds_nearest_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("node_modules/pure/package.json"),
            r#"{ "name": "pure", "sideEffects": false, "main": "./index.js" }"#,
        );
        write(&root.join("node_modules/pure/index.js"), "export const x = 1;");

        let resolver = resolver_at(root);
        let package = resolver
            .package_for(&root.join("node_modules/pure/index.js"))
            .expect("descriptor");
        assert_eq!(package.name.as_deref(), Some("pure"));
        assert!(!package.module_has_side_effects(&root.join("node_modules/pure/index.js")));
    }
}
