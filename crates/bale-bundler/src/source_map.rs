//! Line-level source maps.
//!
//! The transformer is line-preserving and the rewriter keeps newline
//! counts, so a chunk's map only needs one segment per output line:
//! column 0 of the emitted line maps to column 0 of the originating source
//! line. Glue lines (runtime, factory wrappers) map to nothing.

use serde::Serialize;

/// One output line's origin: `(source index, source line)`, both 0-based.
pub type LineOrigin = Option<(usize, u32)>;

#[derive(Serialize)]
struct SourceMapJson<'a> {
    version: u32,
    file: &'a str,
    sources: &'a [String],
    #[serde(rename = "sourcesContent")]
    sources_content: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

/// Render a source map v3 document.
pub fn render(
    file: &str,
    sources: &[String],
    sources_content: &[String],
    line_origins: &[LineOrigin],
) -> String {
    let map = SourceMapJson {
        version: 3,
        file,
        sources,
        sources_content,
        names: [],
        mappings: encode_mappings(line_origins),
    };
    serde_json::to_string(&map).expect("source map serialisation cannot fail")
}

/// An inline `sourceMappingURL` comment for `map`.
pub fn inline_comment(map: &str) -> String {
    format!(
        "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
        base64(map.as_bytes())
    )
}

/// A file-reference `sourceMappingURL` comment.
pub fn external_comment(map_file: &str) -> String {
    format!("//# sourceMappingURL={map_file}\n")
}

/// Encode one segment per mapped line; VLQ fields are deltas against the
/// previous segment.
fn encode_mappings(line_origins: &[LineOrigin]) -> String {
    let mut out = String::new();
    let mut previous_source = 0i64;
    let mut previous_line = 0i64;
    for (index, origin) in line_origins.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        if let Some((source, line)) = origin {
            let source = *source as i64;
            let line = *line as i64;
            out.push_str(&vlq(0));
            out.push_str(&vlq(source - previous_source));
            out.push_str(&vlq(line - previous_line));
            out.push_str(&vlq(0));
            previous_source = source;
            previous_line = line;
        }
    }
    out
}

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn vlq(value: i64) -> String {
    let mut out = String::new();
    let mut vlq = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq != 0 {
            digit |= 0b100000;
        }
        out.push(BASE64_CHARS[digit] as char);
        if vlq == 0 {
            break;
        }
    }
    out
}

fn base64(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;
        out.push(BASE64_CHARS[(triple >> 18) as usize & 63] as char);
        out.push(BASE64_CHARS[(triple >> 12) as usize & 63] as char);
        if chunk.len() > 1 {
            out.push(BASE64_CHARS[(triple >> 6) as usize & 63] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64_CHARS[triple as usize & 63] as char);
        } else {
            out.push('=');
        }
    }
    out
}
