//! Compile-time substitution.
//!
//! Replaces dotted identifier paths (`process.env.NODE_ENV`) with
//! configured literals. Substitution is textual on token boundaries only:
//! never inside strings, comments or member tails, and only where the path
//! is read, not assigned.

use rustc_hash::FxHashMap;

/// Apply a `define` map to `source`.
pub fn apply_defines(source: &str, defines: &FxHashMap<String, String>) -> String {
    if defines.is_empty() {
        return source.to_string();
    }
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    let mut last_sig = 0u8;

    while i < len {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                let quote = b;
                out.push(b as char);
                i += 1;
                while i < len {
                    let c = bytes[i];
                    out.push(c as char);
                    i += 1;
                    if c == b'\\' {
                        if i < len {
                            out.push(bytes[i] as char);
                            i += 1;
                        }
                    } else if c == quote {
                        break;
                    } else if c == b'\n' && quote != b'`' {
                        break;
                    }
                }
                last_sig = b'"';
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'/' => {
                while i < len && bytes[i] != b'\n' {
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                out.push_str("/*");
                i += 2;
                while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    out.push(bytes[i] as char);
                    i += 1;
                }
                if i + 1 < len {
                    out.push_str("*/");
                    i += 2;
                }
            }
            c if is_ident_start(c) => {
                let start = i;
                // Read the maximal dotted chain: ident(.ident)*.
                loop {
                    while i < len && is_ident_continue(bytes[i]) {
                        i += 1;
                    }
                    if i < len && bytes[i] == b'.' && i + 1 < len && is_ident_start(bytes[i + 1]) {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let chain = &source[start..i];

                let substitutable = last_sig != b'.'
                    && !is_assignment_target(bytes, i)
                    && !is_object_key(bytes, i, last_sig);
                let replacement = if substitutable {
                    longest_prefix_match(chain, defines)
                } else {
                    None
                };
                match replacement {
                    Some((matched_len, literal)) => {
                        out.push_str(literal);
                        // Keep any member tail past the matched path.
                        out.push_str(&chain[matched_len..]);
                    }
                    None => out.push_str(chain),
                }
                last_sig = b'a';
            }
            b' ' | b'\t' | b'\r' | b'\n' => {
                out.push(b as char);
                i += 1;
            }
            _ => {
                out.push(b as char);
                last_sig = b;
                i += 1;
            }
        }
    }
    out
}

/// Longest configured path that is a segment-boundary prefix of `chain`.
fn longest_prefix_match<'a>(
    chain: &str,
    defines: &'a FxHashMap<String, String>,
) -> Option<(usize, &'a str)> {
    let mut best: Option<(usize, &'a str)> = None;
    for (key, literal) in defines {
        if chain == key
            || (chain.starts_with(key.as_str()) && chain.as_bytes().get(key.len()) == Some(&b'.'))
        {
            if best.map_or(true, |(len, _)| key.len() > len) {
                best = Some((key.len(), literal));
            }
        }
    }
    best
}

/// `path = …`, `path += …`, `path++` are writes, not reads.
fn is_assignment_target(bytes: &[u8], mut i: usize) -> bool {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    match bytes.get(i) {
        Some(&b'=') => !matches!(bytes.get(i + 1), Some(&b'=') | Some(&b'>')),
        Some(&b'+') | Some(&b'-') => {
            matches!(bytes.get(i + 1), Some(&b'=')) || bytes.get(i + 1) == bytes.get(i)
        }
        Some(&b'*') | Some(&b'/') | Some(&b'%') | Some(&b'&') | Some(&b'|') | Some(&b'^') => {
            matches!(bytes.get(i + 1), Some(&b'='))
        }
        _ => false,
    }
}

/// `{ process: 1 }` - a bare identifier directly before `:` in an object
/// literal is a key. The heuristic: a single-segment chain followed by a
/// colon after `{` or `,`.
fn is_object_key(bytes: &[u8], mut i: usize, last_sig: u8) -> bool {
    if !matches!(last_sig, b'{' | b',') {
        return false;
    }
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    bytes.get(i) == Some(&b':')
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}
