//! Resolution of the package `exports` field.
//!
//! The `exports` value is a tree of strings (final targets), arrays
//! (fallback chains), and objects whose keys are either subpaths (starting
//! with `.`) or condition names. Resolution walks subpath keys first
//! (literal match, then `*` patterns with greedy capture), then condition
//! keys in the priority order configured for the build target.

use serde_json::Value;

/// Resolve `subpath` (`"."` or `"./…"`) against an `exports` tree.
///
/// Returns the package-relative target string on success. `None` means the
/// field exists but matched nothing; since `exports` is authoritative the
/// caller reports that as an ambiguity rather than falling back to `main`.
pub fn resolve_exports(exports: &Value, subpath: &str, conditions: &[&str]) -> Option<String> {
    match exports {
        // Shorthand forms apply to the package root only.
        Value::String(_) | Value::Array(_) => {
            if subpath == "." {
                resolve_target(exports, "", conditions)
            } else {
                None
            }
        }
        Value::Object(map) => {
            let all_subpaths = map.keys().all(|k| k.starts_with('.'));
            if all_subpaths {
                resolve_subpath_map(map, subpath, conditions)
            } else if subpath == "." {
                // Bare condition object stands for the "." subpath.
                resolve_target(exports, "", conditions)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn resolve_subpath_map(
    map: &serde_json::Map<String, Value>,
    subpath: &str,
    conditions: &[&str],
) -> Option<String> {
    // Literal keys win outright.
    if let Some(value) = map.get(subpath) {
        return resolve_target(value, "", conditions);
    }

    // Pattern keys: the `*` captures greedily; when several patterns match,
    // the longest literal prefix is the most specific and wins. Ties are
    // broken by the full key so the choice is deterministic.
    let mut patterns: Vec<(&String, &Value)> =
        map.iter().filter(|(k, _)| k.contains('*')).collect();
    patterns.sort_by(|(a, _), (b, _)| {
        let a_prefix = a.split('*').next().unwrap_or("").len();
        let b_prefix = b.split('*').next().unwrap_or("").len();
        b_prefix.cmp(&a_prefix).then_with(|| a.cmp(b))
    });

    for (key, value) in patterns {
        if let Some(capture) = match_pattern(key, subpath) {
            return resolve_target(value, capture, conditions);
        }
    }
    None
}

/// Match a `./lib/*` style key against a subpath, returning the text the
/// `*` captured. Also used for tsconfig-style path maps.
pub(crate) fn match_pattern<'a>(pattern: &str, subpath: &'a str) -> Option<&'a str> {
    let star = pattern.find('*')?;
    let (prefix, suffix) = (&pattern[..star], &pattern[star + 1..]);
    if !subpath.starts_with(prefix) || !subpath.ends_with(suffix) {
        return None;
    }
    let captured = &subpath[prefix.len()..subpath.len() - suffix.len()];
    if captured.is_empty() {
        None
    } else {
        Some(captured)
    }
}

/// Resolve a target value: a string (with `*` substitution), an array of
/// fallbacks, or a condition object.
fn resolve_target(value: &Value, capture: &str, conditions: &[&str]) -> Option<String> {
    match value {
        Value::String(target) => Some(target.replace('*', capture)),
        Value::Array(items) => items
            .iter()
            .find_map(|item| resolve_target(item, capture, conditions)),
        Value::Object(map) => {
            for condition in conditions {
                if let Some(next) = map.get(*condition) {
                    if let Some(resolved) = resolve_target(next, capture, conditions) {
                        return Some(resolved);
                    }
                }
            }
            None
        }
        // `null` targets block the subpath.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BROWSER: &[&str] = &["browser", "import", "module", "default", "require"];
    const SERVER: &[&str] = &["node", "import", "module", "require", "default"];

    #[test]
    fn string_shorthand_resolves_root_only() {
        let exports = json!("./index.js");
        assert_eq!(
            resolve_exports(&exports, ".", BROWSER),
            Some("./index.js".into())
        );
        assert_eq!(resolve_exports(&exports, "./sub", BROWSER), None);
    }

    #[test]
    fn literal_subpath_wins_over_pattern() {
        let exports = json!({
            "./feature": "./lib/feature-exact.js",
            "./*": "./lib/*.js"
        });
        assert_eq!(
            resolve_exports(&exports, "./feature", BROWSER),
            Some("./lib/feature-exact.js".into())
        );
        assert_eq!(
            resolve_exports(&exports, "./other", BROWSER),
            Some("./lib/other.js".into())
        );
    }

    #[test]
    fn wildcard_capture_substitutes_into_target() {
        let exports = json!({ "./lib/*": "./src/*.js" });
        assert_eq!(
            resolve_exports(&exports, "./lib/foo", BROWSER),
            Some("./src/foo.js".into())
        );
        // The capture is greedy across segments.
        assert_eq!(
            resolve_exports(&exports, "./lib/a/b", BROWSER),
            Some("./src/a/b.js".into())
        );
    }

    #[test]
    fn most_specific_pattern_wins() {
        let exports = json!({
            "./lib/deep/*": "./deep/*.js",
            "./lib/*": "./shallow/*.js"
        });
        assert_eq!(
            resolve_exports(&exports, "./lib/deep/x", BROWSER),
            Some("./deep/x.js".into())
        );
        assert_eq!(
            resolve_exports(&exports, "./lib/x", BROWSER),
            Some("./shallow/x.js".into())
        );
    }

    #[test]
    fn conditions_follow_target_priority() {
        let exports = json!({
            "./sub": { "browser": "./b.js", "default": "./d.js" }
        });
        assert_eq!(
            resolve_exports(&exports, "./sub", BROWSER),
            Some("./b.js".into())
        );
        assert_eq!(
            resolve_exports(&exports, "./sub", SERVER),
            Some("./d.js".into())
        );
    }

    #[test]
    fn nested_conditions_recurse() {
        let exports = json!({
            ".": {
                "node": { "import": "./node.mjs", "require": "./node.cjs" },
                "default": "./browser.js"
            }
        });
        assert_eq!(
            resolve_exports(&exports, ".", SERVER),
            Some("./node.mjs".into())
        );
        assert_eq!(
            resolve_exports(&exports, ".", BROWSER),
            Some("./browser.js".into())
        );
    }

    #[test]
    fn array_fallback_chain() {
        let exports = json!({
            ".": [{ "import": "./a.mjs" }, "./b.js"]
        });
        // First entry matches via the import condition.
        assert_eq!(
            resolve_exports(&exports, ".", BROWSER),
            Some("./a.mjs".into())
        );
        let no_conditions = json!({ ".": [{ "weird": "./a.js" }, "./b.js"] });
        assert_eq!(
            resolve_exports(&no_conditions, ".", BROWSER),
            Some("./b.js".into())
        );
    }

    #[test]
    fn null_blocks_a_subpath() {
        let exports = json!({ "./secret": null, "./*": "./lib/*.js" });
        assert_eq!(resolve_exports(&exports, "./secret", BROWSER), None);
    }

    #[test]
    fn unmatched_subpath_is_none() {
        let exports = json!({ "./only": "./only.js" });
        assert_eq!(resolve_exports(&exports, "./missing", BROWSER), None);
    }
}
