//! The plugin interface.
//!
//! A plugin is a named object whose `setup` registers callbacks against a
//! fixed, enumerated set of hooks. There is no dynamic hook name to
//! misspell: anything outside this set is unrepresentable. Registration
//! order is plugin order; the first non-`None` result wins for resolve and
//! load, transform callbacks chain, and lifecycle hooks all run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::error::{ResolveError, TransformError};

/// What a resolve callback decided about a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Bundle the file at this absolute path.
    Path(PathBuf),
    /// Leave the specifier for the host environment.
    External,
}

/// Arguments handed to resolve callbacks.
#[derive(Debug, Clone, Copy)]
pub struct ResolveArgs<'a> {
    pub specifier: &'a str,
    pub importer: Option<&'a Path>,
}

/// Source kind a load callback declares for the text it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loader {
    #[default]
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
}

impl Loader {
    /// Loader inferred from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsx") => Loader::Jsx,
            Some("ts") | Some("mts") | Some("cts") => Loader::Ts,
            Some("tsx") => Loader::Tsx,
            Some("json") => Loader::Json,
            _ => Loader::Js,
        }
    }
}

/// Replacement source produced by a load callback.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub source: String,
    pub loader: Loader,
}

/// Errors produced inside plugin callbacks; the driver wraps them with the
/// plugin name before they surface.
pub type HookResult<T> = Result<T, String>;

type ResolveHook = Box<dyn Fn(&ResolveArgs<'_>) -> HookResult<Option<ResolveOutcome>> + Send + Sync>;
type LoadHook = Box<dyn Fn(&Path) -> HookResult<Option<Loaded>> + Send + Sync>;
type TransformHook = Box<dyn Fn(&Path, String) -> HookResult<String> + Send + Sync>;
type LifecycleHook = Box<dyn Fn() + Send + Sync>;

/// A bundler plugin.
pub trait Plugin: Send + Sync {
    /// Name used in diagnostics when a callback fails.
    fn name(&self) -> &str;

    /// Register callbacks. Called exactly once, in plugin order.
    fn setup(&self, build: &mut PluginBuild);
}

/// Registration surface passed to [`Plugin::setup`].
#[derive(Default)]
pub struct PluginBuild {
    resolve: Vec<(Regex, ResolveHook)>,
    load: Vec<(Regex, LoadHook)>,
    transform: Vec<(Regex, TransformHook)>,
    start: Vec<LifecycleHook>,
    end: Vec<LifecycleHook>,
}

impl PluginBuild {
    /// Intercept resolution of specifiers matching `filter`.
    pub fn on_resolve<F>(&mut self, filter: Regex, callback: F)
    where
        F: Fn(&ResolveArgs<'_>) -> HookResult<Option<ResolveOutcome>> + Send + Sync + 'static,
    {
        self.resolve.push((filter, Box::new(callback)));
    }

    /// Replace the filesystem read for paths matching `filter`.
    pub fn on_load<F>(&mut self, filter: Regex, callback: F)
    where
        F: Fn(&Path) -> HookResult<Option<Loaded>> + Send + Sync + 'static,
    {
        self.load.push((filter, Box::new(callback)));
    }

    /// Post-process transformed source for paths matching `filter`.
    pub fn on_transform<F>(&mut self, filter: Regex, callback: F)
    where
        F: Fn(&Path, String) -> HookResult<String> + Send + Sync + 'static,
    {
        self.transform.push((filter, Box::new(callback)));
    }

    /// Run at the start of every build.
    pub fn on_start<F: Fn() + Send + Sync + 'static>(&mut self, callback: F) {
        self.start.push(Box::new(callback));
    }

    /// Run at the end of every build, success or failure.
    pub fn on_end<F: Fn() + Send + Sync + 'static>(&mut self, callback: F) {
        self.end.push(Box::new(callback));
    }
}

struct Registered {
    plugin_name: String,
    build: PluginBuild,
}

/// Dispatches pipeline events to every registered plugin in order.
#[derive(Default)]
pub struct PluginDriver {
    registered: Vec<Registered>,
}

impl PluginDriver {
    /// Run `setup` for each plugin, in order.
    pub fn new(plugins: &[Arc<dyn Plugin>]) -> Self {
        let mut registered = Vec::with_capacity(plugins.len());
        for plugin in plugins {
            let mut build = PluginBuild::default();
            plugin.setup(&mut build);
            registered.push(Registered {
                plugin_name: plugin.name().to_string(),
                build,
            });
        }
        Self { registered }
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// First non-`None` resolve result wins. Callback failures surface as
    /// resolution errors carrying the plugin name.
    pub fn resolve(
        &self,
        args: &ResolveArgs<'_>,
    ) -> Result<Option<ResolveOutcome>, ResolveError> {
        for reg in &self.registered {
            for (filter, hook) in &reg.build.resolve {
                if !filter.is_match(args.specifier) {
                    continue;
                }
                match hook(args) {
                    Ok(Some(outcome)) => return Ok(Some(outcome)),
                    Ok(None) => {}
                    Err(message) => {
                        return Err(ResolveError::Plugin {
                            plugin: reg.plugin_name.clone(),
                            specifier: args.specifier.to_string(),
                            message,
                        })
                    }
                }
            }
        }
        Ok(None)
    }

    /// First non-`None` load result wins.
    pub fn load(&self, path: &Path) -> Result<Option<Loaded>, TransformError> {
        let text = path.to_string_lossy();
        for reg in &self.registered {
            for (filter, hook) in &reg.build.load {
                if !filter.is_match(&text) {
                    continue;
                }
                match hook(path) {
                    Ok(Some(loaded)) => return Ok(Some(loaded)),
                    Ok(None) => {}
                    Err(message) => {
                        return Err(TransformError::Plugin {
                            plugin: reg.plugin_name.clone(),
                            file: path.to_path_buf(),
                            message,
                        })
                    }
                }
            }
        }
        Ok(None)
    }

    /// Chain transform callbacks over the code, in registration order.
    pub fn transform(&self, path: &Path, mut code: String) -> Result<String, TransformError> {
        let text = path.to_string_lossy();
        for reg in &self.registered {
            for (filter, hook) in &reg.build.transform {
                if !filter.is_match(&text) {
                    continue;
                }
                code = hook(path, code).map_err(|message| TransformError::Plugin {
                    plugin: reg.plugin_name.clone(),
                    file: path.to_path_buf(),
                    message,
                })?;
            }
        }
        Ok(code)
    }

    pub fn start(&self) {
        for reg in &self.registered {
            for hook in &reg.build.start {
                hook();
            }
        }
    }

    pub fn end(&self) {
        for reg in &self.registered {
            for hook in &reg.build.end {
                hook();
            }
        }
    }
}
