//! JSX lowering.
//!
//! Rewrites JSX elements to factory calls: the automatic runtime
//! (`jsx`/`jsxs` from `<importSource>/jsx-runtime`) or the classic runtime
//! (a configured factory such as `h`). Expressions embedded in braces are
//! lowered recursively, so JSX nested inside callbacks works.
//!
//! Newlines consumed from a JSX element are re-emitted inside the generated
//! call (argument lists may span lines), keeping the output line count
//! equal to the input so source maps stay line-accurate.

use bale_core::config::{JsxOptions, JsxRuntime};

pub struct JsxLowered {
    pub code: String,
    pub had_jsx: bool,
}

/// Lower all JSX in `source`.
pub fn lower_jsx(source: &str, options: &JsxOptions) -> JsxLowered {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    let had_jsx = lower_into(source, options, &mut out);
    JsxLowered { code: out, had_jsx }
}

/// The import statement the automatic runtime needs, injected by the
/// transformer driver when lowering produced any JSX calls.
pub fn automatic_runtime_import(options: &JsxOptions) -> String {
    format!(
        "import {{ jsx as _jsx, jsxs as _jsxs, Fragment as _Fragment }} from \"{}/jsx-runtime\";\n",
        options.import_source
    )
}

const EXPR_POSITION: &[u8] = b"=([{,;:!&|?+-*%^~<>";

fn lower_into(source: &str, options: &JsxOptions, out: &mut String) -> bool {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut had_jsx = false;
    let mut last_sig = 0u8;

    while i < len {
        let b = bytes[i];
        match b {
            b'\'' | b'"' => {
                i = copy_string(bytes, i, out);
                last_sig = b'"';
            }
            b'`' => {
                i = copy_template(bytes, i, out);
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
            b'<' if jsx_can_start(last_sig) && looks_like_jsx(bytes, i) => {
                let start = i;
                match parse_element(source, i, options) {
                    Some((code, consumed)) => {
                        had_jsx = true;
                        let eaten = &source[start..consumed];
                        let missing = eaten
                            .matches('\n')
                            .count()
                            .saturating_sub(code.matches('\n').count());
                        out.push_str(&pad_newlines(&code, missing));
                        i = consumed;
                        last_sig = b')';
                    }
                    None => {
                        out.push('<');
                        i += 1;
                        last_sig = b'<';
                    }
                }
            }
            b' ' | b'\t' | b'\r' | b'\n' => {
                out.push(b as char);
                i += 1;
            }
            c if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' => {
                let start = i;
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
                let word = &source[start..i];
                out.push_str(word);
                last_sig = match word {
                    "return" | "typeof" | "case" | "in" | "of" | "do" | "else" | "yield"
                    | "await" | "void" | "delete" | "new" => b'=',
                    _ => b'a',
                };
            }
            _ => {
                out.push(b as char);
                i += 1;
                last_sig = b;
            }
        }
    }
    had_jsx
}

fn jsx_can_start(last_sig: u8) -> bool {
    last_sig == 0 || EXPR_POSITION.contains(&last_sig)
}

fn looks_like_jsx(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i + 1) {
        Some(c) if c.is_ascii_alphabetic() || *c == b'_' => true,
        Some(&b'>') => true, // fragment
        _ => false,
    }
}

/// Insert `count` newlines before the final closing paren of a generated
/// call, where a line break is syntactically free.
fn pad_newlines(code: &str, count: usize) -> String {
    if count == 0 {
        return code.to_string();
    }
    match code.rfind(')') {
        Some(idx) => {
            let mut padded = String::with_capacity(code.len() + count);
            padded.push_str(&code[..idx]);
            for _ in 0..count {
                padded.push('\n');
            }
            padded.push_str(&code[idx..]);
            padded
        }
        None => {
            let mut padded = code.to_string();
            for _ in 0..count {
                padded.push('\n');
            }
            padded
        }
    }
}

fn copy_string(bytes: &[u8], mut i: usize, out: &mut String) -> usize {
    let quote = bytes[i];
    out.push(quote as char);
    i += 1;
    while i < bytes.len() {
        let b = bytes[i];
        out.push(b as char);
        i += 1;
        if b == b'\\' {
            if i < bytes.len() {
                out.push(bytes[i] as char);
                i += 1;
            }
        } else if b == quote || b == b'\n' {
            break;
        }
    }
    i
}

fn copy_template(bytes: &[u8], mut i: usize, out: &mut String) -> usize {
    out.push('`');
    i += 1;
    while i < bytes.len() {
        let b = bytes[i];
        out.push(b as char);
        i += 1;
        if b == b'\\' {
            if i < bytes.len() {
                out.push(bytes[i] as char);
                i += 1;
            }
        } else if b == b'`' {
            break;
        }
    }
    i
}

/// Parse one JSX element starting at `<`. Returns the generated call and
/// the index just past the element.
fn parse_element(source: &str, start: usize, options: &JsxOptions) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut i = start + 1;

    // Fragment: <> … </>
    if bytes.get(i) == Some(&b'>') {
        i += 1;
        let (children, consumed) = parse_children(source, i, options)?;
        i = consumed;
        if !source[i..].starts_with("</>") {
            return None;
        }
        i += 3;
        let code = generate_call(FRAGMENT_TAG, &[], None, &children, options);
        return Some((code, i));
    }

    // Tag name: letters, digits, dots (member components), dashes.
    let name_start = i;
    while i < len
        && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'$' | b'.' | b'-'))
    {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let tag_name = &source[name_start..i];
    let is_component = tag_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        || tag_name.contains('.');
    let tag = if is_component {
        tag_name.to_string()
    } else {
        format!("\"{tag_name}\"")
    };

    // Attributes.
    let mut props: Vec<String> = Vec::new();
    let mut key: Option<String> = None;
    loop {
        while i < len && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            Some(&b'>') => {
                i += 1;
                break;
            }
            Some(&b'/') if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                let code = generate_call(&tag, &props, key.as_deref(), &[], options);
                return Some((code, i));
            }
            Some(&b'{') if source[i..].starts_with("{...") => {
                i += 4;
                let (expr, consumed) = read_expression(source, i, options)?;
                i = consumed;
                if bytes.get(i) == Some(&b'}') {
                    i += 1;
                }
                props.push(format!("...{expr}"));
            }
            Some(c) if c.is_ascii_alphabetic() || *c == b'_' => {
                let attr_start = i;
                while i < len
                    && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-'))
                {
                    i += 1;
                }
                let attr_name = attribute_name(&source[attr_start..i]);
                while i < len && (bytes[i] == b' ' || bytes[i] == b'\t') {
                    i += 1;
                }
                if bytes.get(i) == Some(&b'=') {
                    i += 1;
                    while i < len && (bytes[i] == b' ' || bytes[i] == b'\t') {
                        i += 1;
                    }
                    let value = match bytes.get(i) {
                        Some(&(q @ (b'"' | b'\''))) => {
                            i += 1;
                            let value_start = i;
                            while i < len && bytes[i] != q {
                                i += 1;
                            }
                            let raw = &source[value_start..i];
                            i += 1;
                            format!("\"{}\"", escape_text(raw))
                        }
                        Some(&b'{') => {
                            i += 1;
                            let (expr, consumed) = read_expression(source, i, options)?;
                            i = consumed;
                            if bytes.get(i) == Some(&b'}') {
                                i += 1;
                            }
                            expr
                        }
                        _ => return None,
                    };
                    if attr_name == "key" {
                        key = Some(value);
                    } else {
                        props.push(format!("{}: {}", property_key(&attr_name), value));
                    }
                } else {
                    props.push(format!("{}: true", property_key(&attr_name)));
                }
            }
            _ => return None,
        }
    }

    // Children, then the matching close tag.
    let (children, consumed) = parse_children(source, i, options)?;
    i = consumed;
    if !source[i..].starts_with("</") {
        return None;
    }
    i += 2;
    while i < len && bytes[i] != b'>' {
        i += 1;
    }
    i = (i + 1).min(len);

    let code = generate_call(&tag, &props, key.as_deref(), &children, options);
    Some((code, i))
}

/// Parse children until a closing tag (`</`) is next. Returns the child
/// expressions and the index of the `<` of the close tag.
fn parse_children(
    source: &str,
    mut i: usize,
    options: &JsxOptions,
) -> Option<(Vec<String>, usize)> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut children = Vec::new();
    let mut text = String::new();

    loop {
        if i >= len {
            return None;
        }
        let b = bytes[i];
        if b == b'<' {
            if bytes.get(i + 1) == Some(&b'/') {
                flush_text(&mut text, &mut children);
                return Some((children, i));
            }
            flush_text(&mut text, &mut children);
            let (child, consumed) = parse_element(source, i, options)?;
            children.push(child);
            i = consumed;
            continue;
        }
        if b == b'{' {
            flush_text(&mut text, &mut children);
            i += 1;
            let (expr, consumed) = read_expression(source, i, options)?;
            i = consumed;
            if bytes.get(i) == Some(&b'}') {
                i += 1;
            }
            // `{}` and `{/* comment */}` contribute no child.
            let trimmed = expr.trim();
            let is_comment = trimmed.starts_with("/*") && trimmed.ends_with("*/");
            if !trimmed.is_empty() && !is_comment {
                children.push(expr);
            }
            continue;
        }
        text.push(b as char);
        i += 1;
    }
}

fn flush_text(text: &mut String, children: &mut Vec<String>) {
    let collapsed = collapse_jsx_text(text);
    if !collapsed.is_empty() {
        children.push(format!("\"{}\"", escape_text(&collapsed)));
    }
    text.clear();
}

/// JSX text semantics, simplified: trim and collapse interior whitespace
/// runs to a single space.
fn collapse_jsx_text(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut pending_space = false;
    for c in trimmed.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// Read a brace-delimited expression (cursor just past `{`), lowering any
/// JSX inside it. Returns the lowered text and the index of the closing
/// `}`.
fn read_expression(source: &str, start: usize, options: &JsxOptions) -> Option<(String, usize)> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut i = start;
    let mut depth = 0usize;

    while i < len {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                if depth == 0 {
                    let raw = &source[start..i];
                    let mut lowered = String::with_capacity(raw.len());
                    lower_into(raw, options, &mut lowered);
                    return Some((lowered.trim().to_string(), i));
                }
                depth -= 1;
            }
            b'\'' | b'"' => {
                let quote = bytes[i];
                i += 1;
                while i < len && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < len && bytes[i] != b'`' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'<' if looks_like_jsx(bytes, i) => {
                // Skip a whole nested element so its braces do not confuse
                // the depth count; lowering happens on the raw slice later.
                if let Some((_, consumed)) = parse_element(source, i, options) {
                    i = consumed;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Marker for fragments; replaced per runtime in `generate_call`.
const FRAGMENT_TAG: &str = "\u{0}fragment";

fn generate_call(
    tag: &str,
    props: &[String],
    key: Option<&str>,
    children: &[String],
    options: &JsxOptions,
) -> String {
    match options.runtime {
        JsxRuntime::Automatic => {
            let tag = if tag == FRAGMENT_TAG { "_Fragment" } else { tag };
            let mut all = props.to_vec();
            let func = if children.len() > 1 { "_jsxs" } else { "_jsx" };
            match children.len() {
                0 => {}
                1 => all.push(format!("children: {}", children[0])),
                _ => all.push(format!("children: [{}]", children.join(", "))),
            }
            let props_obj = if all.is_empty() {
                "{}".to_string()
            } else {
                format!("{{ {} }}", all.join(", "))
            };
            match key {
                Some(key) => format!("{func}({tag}, {props_obj}, {key})"),
                None => format!("{func}({tag}, {props_obj})"),
            }
        }
        JsxRuntime::Classic => {
            let factory = &options.factory;
            let tag = if tag == FRAGMENT_TAG {
                options.fragment.as_str()
            } else {
                tag
            };
            let mut all = props.to_vec();
            if let Some(key) = key {
                all.push(format!("key: {key}"));
            }
            let props_obj = if all.is_empty() {
                "null".to_string()
            } else {
                format!("{{ {} }}", all.join(", "))
            };
            let mut args = vec![tag.to_string(), props_obj];
            args.extend(children.iter().cloned());
            format!("{factory}({})", args.join(", "))
        }
    }
}

/// React-style attribute name fixups for DOM elements.
fn attribute_name(name: &str) -> String {
    match name {
        "class" => "className".to_string(),
        "for" => "htmlFor".to_string(),
        _ => name.to_string(),
    }
}

/// Quote property keys that are not valid identifiers (`data-*`, `aria-*`).
fn property_key(name: &str) -> String {
    if name.contains('-') {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automatic() -> JsxOptions {
        JsxOptions::default()
    }

    fn classic() -> JsxOptions {
        JsxOptions {
            runtime: JsxRuntime::Classic,
            ..JsxOptions::default()
        }
    }

    #[test]
    fn simple_element() {
        let out = lower_jsx("const e = <div>Hello</div>;", &automatic());
        assert!(out.had_jsx);
        assert_eq!(out.code, "const e = _jsx(\"div\", { children: \"Hello\" });");
    }

    #[test]
    fn component_vs_dom_tag() {
        let out = lower_jsx("const e = <Widget x={1} />;", &automatic());
        assert!(out.code.contains("_jsx(Widget, { x: 1 })"));

        let out = lower_jsx("const e = <span id=\"a\" />;", &automatic());
        assert!(out.code.contains("_jsx(\"span\", { id: \"a\" })"));
    }

    #[test]
    fn member_component() {
        let out = lower_jsx("const e = <UI.Button />;", &automatic());
        assert!(out.code.contains("_jsx(UI.Button, {})"));
    }

    #[test]
    fn multiple_children_use_jsxs() {
        let out = lower_jsx("const e = <ul><li>a</li><li>b</li></ul>;", &automatic());
        assert!(out.code.contains("_jsxs(\"ul\""));
        assert!(out.code.contains("children: [_jsx(\"li\", { children: \"a\" }), _jsx(\"li\", { children: \"b\" })]"));
    }

    #[test]
    fn fragments() {
        let out = lower_jsx("const e = <>text</>;", &automatic());
        assert!(out.code.contains("_jsx(_Fragment, { children: \"text\" })"));

        let out = lower_jsx("const e = <>text</>;", &classic());
        assert!(out.code.contains("h(Fragment, null, \"text\")"));
    }

    #[test]
    fn expressions_and_spreads() {
        let out = lower_jsx("const e = <div id={myId} {...rest}>{value}</div>;", &automatic());
        assert!(out.code.contains("id: myId"));
        assert!(out.code.contains("...rest"));
        assert!(out.code.contains("children: value"));
    }

    #[test]
    fn nested_jsx_inside_expressions_is_lowered() {
        let out = lower_jsx(
            "const e = <ul>{items.map(x => <li>{x}</li>)}</ul>;",
            &automatic(),
        );
        assert!(out.code.contains("items.map(x => _jsx(\"li\", { children: x }))"));
        assert!(!out.code.contains("<li>"));
    }

    #[test]
    fn key_becomes_third_argument() {
        let out = lower_jsx("const e = <li key={id}>x</li>;", &automatic());
        assert!(out.code.contains("_jsx(\"li\", { children: \"x\" }, id)"));
    }

    #[test]
    fn classic_runtime_uses_factory() {
        let out = lower_jsx("const e = <div className=\"a\">hi</div>;", &classic());
        assert_eq!(out.code, "const e = h(\"div\", { className: \"a\" }, \"hi\");");
    }

    #[test]
    fn class_attribute_is_renamed() {
        let out = lower_jsx("const e = <div class=\"a\" data-x=\"y\" />;", &automatic());
        assert!(out.code.contains("className: \"a\""));
        assert!(out.code.contains("\"data-x\": \"y\""));
    }

    #[test]
    fn comparisons_are_not_jsx() {
        let source = "const ok = a < b && c > d;";
        let out = lower_jsx(source, &automatic());
        assert!(!out.had_jsx);
        assert_eq!(out.code, source);
    }

    #[test]
    fn line_count_is_preserved() {
        let source = "const e = (\n  <div>\n    <span>a</span>\n    <span>b</span>\n  </div>\n);";
        let out = lower_jsx(source, &automatic());
        assert_eq!(
            source.matches('\n').count(),
            out.code.matches('\n').count()
        );
    }

    #[test]
    fn boolean_attribute() {
        let out = lower_jsx("const e = <input disabled />;", &automatic());
        assert!(out.code.contains("disabled: true"));
    }

    #[test]
    fn self_closing_with_no_props() {
        let out = lower_jsx("const e = <br />;", &automatic());
        assert!(out.code.contains("_jsx(\"br\", {})"));
    }

    #[test]
    fn automatic_import_text() {
        let import = automatic_runtime_import(&automatic());
        assert!(import.contains("react/jsx-runtime"));
        assert!(import.contains("jsx as _jsx"));
    }
}
