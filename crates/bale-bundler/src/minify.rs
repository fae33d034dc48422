//! The minifier seam.
//!
//! Minification is a pluggable post-processor over emitted chunk text.
//! [`BasicMinifier`] is the built-in implementation: comment stripping and
//! whitespace collapse, careful to leave string, template and regex
//! contents untouched. Anything smarter plugs in through the trait.

/// A chunk post-processor.
pub trait Minify: Send + Sync {
    fn minify(&self, code: &str) -> String;
}

/// Conservative built-in minifier: strips comments, collapses whitespace
/// runs, preserves literals byte-for-byte.
#[derive(Debug, Default)]
pub struct BasicMinifier;

impl Minify for BasicMinifier {
    fn minify(&self, code: &str) -> String {
        let bytes = code.as_bytes();
        let len = bytes.len();
        let mut out = String::with_capacity(len);
        let mut i = 0;
        let mut pending_space = false;
        let mut last_sig = 0u8;
        // A `/` after `return`, `typeof` and friends starts a regex even
        // though the last byte is wordish; track the last word to tell.
        let mut after_expr_keyword = false;

        while i < len {
            let b = bytes[i];
            match b {
                b'\'' | b'"' | b'`' => {
                    flush_space(&mut out, &mut pending_space, last_sig, b);
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
                        }
                    }
                    last_sig = b'"';
                    after_expr_keyword = false;
                }
                b'/' if i + 1 < len && bytes[i + 1] == b'/' => {
                    while i < len && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                    i += 2;
                    while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                        i += 1;
                    }
                    i = (i + 2).min(len);
                }
                b'/' if is_regex_position(last_sig) || after_expr_keyword => {
                    flush_space(&mut out, &mut pending_space, last_sig, b);
                    out.push('/');
                    i += 1;
                    let mut in_class = false;
                    while i < len {
                        let c = bytes[i];
                        out.push(c as char);
                        i += 1;
                        match c {
                            b'\\' => {
                                if i < len {
                                    out.push(bytes[i] as char);
                                    i += 1;
                                }
                            }
                            b'[' => in_class = true,
                            b']' => in_class = false,
                            b'/' if !in_class => break,
                            _ => {}
                        }
                    }
                    last_sig = b'a';
                    after_expr_keyword = false;
                }
                b' ' | b'\t' | b'\r' | b'\n' => {
                    pending_space = true;
                    i += 1;
                }
                c if is_word_start(c) => {
                    flush_space(&mut out, &mut pending_space, last_sig, b);
                    let start = i;
                    while i < len && is_word_continue(bytes[i]) {
                        i += 1;
                    }
                    let word = &code[start..i];
                    out.push_str(word);
                    last_sig = *word.as_bytes().last().unwrap_or(&b'a');
                    after_expr_keyword = is_expr_keyword(word);
                }
                _ => {
                    flush_space(&mut out, &mut pending_space, last_sig, b);
                    out.push(b as char);
                    last_sig = b;
                    after_expr_keyword = false;
                    i += 1;
                }
            }
        }
        out
    }
}

/// Emit a collapsed space only where dropping it would glue two tokens
/// together (identifier/keyword boundaries).
fn flush_space(out: &mut String, pending: &mut bool, last_sig: u8, next: u8) {
    if std::mem::take(pending) && needs_space(last_sig, next) {
        out.push(' ');
    }
}

fn needs_space(a: u8, b: u8) -> bool {
    let wordish = |c: u8| c.is_ascii_alphanumeric() || c == b'_' || c == b'$';
    (wordish(a) && wordish(b)) || (a == b'+' && b == b'+') || (a == b'-' && b == b'-')
}

fn is_regex_position(last_sig: u8) -> bool {
    matches!(
        last_sig,
        0 | b'=' | b'(' | b',' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b'}' | b';'
    )
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_word_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Keywords after which an expression (and so a regex literal) follows.
fn is_expr_keyword(word: &str) -> bool {
    matches!(
        word,
        "return"
            | "typeof"
            | "case"
            | "delete"
            | "void"
            | "in"
            | "of"
            | "instanceof"
            | "do"
            | "else"
            | "yield"
            | "throw"
            | "new"
    )
}
