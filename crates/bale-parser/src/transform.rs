//! The transform driver.
//!
//! Applies, in order: TypeScript erasure, JSX lowering, compile-time
//! `define` substitution, and the automatic-runtime import injection. The
//! transformer is stateless and pure: identical input and options always
//! produce identical output. Nothing here changes observable runtime
//! behaviour beyond the documented lowerings.

use rustc_hash::FxHashMap;

use bale_core::config::{JsxOptions, JsxRuntime};
use bale_core::plugin::Loader;

use crate::define::apply_defines;
use crate::jsx::{automatic_runtime_import, lower_jsx};
use crate::strip::strip_types;

/// Options that affect transform output. Hashed into the transform cache
/// key by the graph builder.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub loader: Loader,
    pub jsx: JsxOptions,
    pub define: FxHashMap<String, String>,
}

/// Transformed module text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransformOutput {
    pub code: String,
    /// Lines inserted at the top (the JSX runtime import); the source-map
    /// writer shifts its line mapping by this much.
    pub prepended_lines: u32,
}

/// Lower `source` to portable JavaScript.
pub fn transform(source: &str, options: &TransformOptions) -> TransformOutput {
    // JSON modules become a default export of their data.
    if options.loader == Loader::Json {
        return TransformOutput {
            code: format!("export default {};\n", source.trim_end()),
            prepended_lines: 0,
        };
    }

    let mut code;
    match options.loader {
        Loader::Ts | Loader::Tsx => {
            code = strip_types(source).code;
        }
        _ => code = source.to_string(),
    }

    let mut prepended_lines = 0;
    if matches!(options.loader, Loader::Jsx | Loader::Tsx) {
        let lowered = lower_jsx(&code, &options.jsx);
        code = lowered.code;
        if lowered.had_jsx && options.jsx.runtime == JsxRuntime::Automatic {
            code = format!("{}{}", automatic_runtime_import(&options.jsx), code);
            prepended_lines = 1;
        }
    }

    if !options.define.is_empty() {
        code = apply_defines(&code, &options.define);
    }

    TransformOutput {
        code,
        prepended_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(loader: Loader) -> TransformOptions {
        TransformOptions {
            loader,
            jsx: JsxOptions::default(),
            define: FxHashMap::default(),
        }
    }

    #[test]
    fn typescript_and_jsx_are_gone() {
        let source = "export const V: number = 2;\nexport const E = <div>{V}</div>;\n";
        let out = transform(source, &options(Loader::Tsx));
        assert!(!out.code.contains(": number"));
        assert!(!out.code.contains("<div>"));
        assert!(out.code.contains("_jsx"));
        assert_eq!(out.prepended_lines, 1);
        assert!(out.code.starts_with("import { jsx as _jsx"));
    }

    #[test]
    fn plain_javascript_is_untouched() {
        let source = "export const x = 1;\n";
        let out = transform(source, &options(Loader::Js));
        assert_eq!(out.code, source);
        assert_eq!(out.prepended_lines, 0);
    }

    #[test]
    fn deterministic() {
        let source = "const a: string = 'x'; export default <b>{a}</b>;";
        let first = transform(source, &options(Loader::Tsx));
        let second = transform(source, &options(Loader::Tsx));
        assert_eq!(first, second);
    }

    #[test]
    fn classic_runtime_skips_import_injection() {
        let mut opts = options(Loader::Jsx);
        opts.jsx.runtime = JsxRuntime::Classic;
        let out = transform("const e = <div />;", &opts);
        assert!(out.code.contains("h(\"div\""));
        assert_eq!(out.prepended_lines, 0);
    }

    #[test]
    fn defines_apply_after_lowering() {
        let mut opts = options(Loader::Js);
        opts.define
            .insert("process.env.NODE_ENV".into(), "\"production\"".into());
        let out = transform("console.log(process.env.NODE_ENV);", &opts);
        assert_eq!(out.code, "console.log(\"production\");");
    }

    #[test]
    fn json_becomes_default_export() {
        let out = transform("{ \"a\": 1 }", &options(Loader::Json));
        assert_eq!(out.code, "export default { \"a\": 1 };\n");
    }
}
