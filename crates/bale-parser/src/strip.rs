//! TypeScript erasure.
//!
//! Removes type-level syntax and nothing else: type imports/exports,
//! interfaces, type aliases, annotations, generics, `as`/`satisfies`
//! assertions, non-null `!`, `implements` clauses. Whatever is erased,
//! newlines inside it are kept, so the output has the same line count as
//! the input and source maps stay line-accurate.
//!
//! The eraser is a scanner, not a parser. It tracks just enough context to
//! stay out of trouble: which braces are object literals (their colons are
//! properties), pending ternaries (their colons are operators), `case`
//! labels, and import/export statements (their `as` is not an assertion).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// `{` in expression position: colons are properties.
    Object,
    /// Statement blocks and function bodies: colons are labels/ternaries.
    Block,
    /// `class … {`: colons are field type annotations.
    Class,
}

pub struct Stripped {
    pub code: String,
    pub had_types: bool,
}

/// Erase TypeScript syntax from `source`.
pub fn strip_types(source: &str) -> Stripped {
    let mut stripper = Stripper {
        bytes: source.as_bytes(),
        source,
        pos: 0,
        out: String::with_capacity(source.len()),
        frames: Vec::new(),
        ternaries: Vec::new(),
        depth: 0,
        last_sig: 0,
        pending_class_body: false,
        had_types: false,
    };
    stripper.run();
    Stripped {
        code: stripper.out,
        had_types: stripper.had_types,
    }
}

struct Stripper<'a> {
    bytes: &'a [u8],
    source: &'a str,
    pos: usize,
    out: String,
    /// Open braces with the combined depth of their interior.
    frames: Vec<(Frame, usize)>,
    /// Depths at which a `?:` ternary is waiting for its colon.
    ternaries: Vec<usize>,
    /// Combined paren/brace/bracket depth.
    depth: usize,
    last_sig: u8,
    pending_class_body: bool,
    had_types: bool,
}

/// Bytes after which `{` opens an object literal and `/` a regex.
const EXPR_POSITION: &[u8] = b"=([{,;:!&|?+-*%<>^~";

impl<'a> Stripper<'a> {
    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\'' | b'"' => self.copy_string(b),
                b'`' => self.copy_template(),
                b'/' if self.peek(1) == b'/' => self.copy_line_comment(),
                b'/' if self.peek(1) == b'*' => self.copy_block_comment(),
                b'/' if EXPR_POSITION.contains(&self.last_sig) || self.last_sig == 0 => {
                    self.copy_regex()
                }
                b'{' => {
                    let frame = if self.pending_class_body {
                        self.pending_class_body = false;
                        Frame::Class
                    } else if EXPR_POSITION.contains(&self.last_sig) || self.last_sig == 0 {
                        Frame::Object
                    } else {
                        Frame::Block
                    };
                    self.depth += 1;
                    self.frames.push((frame, self.depth));
                    self.copy_byte();
                }
                b'}' => {
                    self.frames.pop();
                    self.depth = self.depth.saturating_sub(1);
                    self.ternaries.retain(|&d| d < self.depth + 1);
                    self.copy_byte();
                }
                b'(' | b'[' => {
                    self.depth += 1;
                    self.copy_byte();
                }
                b')' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.ternaries.retain(|&d| d <= self.depth);
                    self.copy_byte();
                }
                b'?' => self.question_mark(),
                b':' => self.colon(),
                b'!' => self.bang(),
                b'<' => self.angle(),
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.out.push(b as char);
                    self.pos += 1;
                }
                c if is_ident_start(c) => self.word(),
                _ => self.copy_byte(),
            }
        }
    }

    // ---- copying helpers ---------------------------------------------------

    fn peek(&self, n: usize) -> u8 {
        *self.bytes.get(self.pos + n).unwrap_or(&0)
    }

    fn copy_byte(&mut self) {
        let b = self.bytes[self.pos];
        self.out.push(b as char);
        self.last_sig = b;
        self.pos += 1;
    }

    fn copy_string(&mut self, quote: u8) {
        self.copy_byte();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.out.push(b as char);
            self.pos += 1;
            if b == b'\\' {
                if self.pos < self.bytes.len() {
                    self.out.push(self.bytes[self.pos] as char);
                    self.pos += 1;
                }
            } else if b == quote || b == b'\n' {
                break;
            }
        }
        self.last_sig = b'"';
    }

    fn copy_template(&mut self) {
        self.copy_byte();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'\\' {
                self.out.push('\\');
                self.pos += 1;
                if self.pos < self.bytes.len() {
                    self.out.push(self.bytes[self.pos] as char);
                    self.pos += 1;
                }
                continue;
            }
            if b == b'`' {
                self.out.push('`');
                self.pos += 1;
                break;
            }
            if b == b'$' && self.peek(1) == b'{' {
                self.out.push_str("${");
                self.pos += 2;
                // Interpolations may contain arbitrary expressions; copy
                // them through the balanced close without erasure. Types
                // cannot appear there.
                let mut depth = 1usize;
                while self.pos < self.bytes.len() && depth > 0 {
                    let c = self.bytes[self.pos];
                    match c {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    if depth > 0 {
                        self.out.push(c as char);
                    } else {
                        self.out.push('}');
                    }
                    self.pos += 1;
                }
                continue;
            }
            self.out.push(b as char);
            self.pos += 1;
        }
        self.last_sig = b'"';
    }

    fn copy_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.out.push(self.bytes[self.pos] as char);
            self.pos += 1;
        }
    }

    fn copy_block_comment(&mut self) {
        self.out.push_str("/*");
        self.pos += 2;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'*' && self.peek(1) == b'/' {
                self.out.push_str("*/");
                self.pos += 2;
                return;
            }
            self.out.push(self.bytes[self.pos] as char);
            self.pos += 1;
        }
    }

    fn copy_regex(&mut self) {
        self.copy_byte();
        let mut in_class = false;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            self.out.push(b as char);
            self.pos += 1;
            match b {
                b'\\' => {
                    if self.pos < self.bytes.len() {
                        self.out.push(self.bytes[self.pos] as char);
                        self.pos += 1;
                    }
                }
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => break,
                b'\n' => break,
                _ => {}
            }
        }
        self.last_sig = b'a';
    }

    /// Skip erased input, preserving its newlines in the output.
    fn erase(&mut self, to: usize) {
        let to = to.min(self.bytes.len());
        while self.pos < to {
            if self.bytes[self.pos] == b'\n' {
                self.out.push('\n');
            }
            self.pos += 1;
        }
        self.had_types = true;
    }

    /// Erase from the cursor to the end of a simple statement: through the
    /// next `;` at depth zero, or the end of the line.
    fn erase_statement(&mut self) {
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\'' | b'"' => {
                    let quote = b;
                    self.pos += 1;
                    while self.pos < self.bytes.len() {
                        let c = self.bytes[self.pos];
                        self.pos += 1;
                        if c == b'\\' {
                            self.pos += 1;
                        } else if c == quote || c == b'\n' {
                            break;
                        }
                    }
                    continue;
                }
                b'{' | b'(' | b'[' | b'<' => depth += 1,
                b'}' | b')' | b']' | b'>' => depth = depth.saturating_sub(1),
                b';' if depth == 0 => {
                    self.pos += 1;
                    self.had_types = true;
                    return;
                }
                b'\n' if depth == 0 => {
                    self.out.push('\n');
                    self.pos += 1;
                    self.had_types = true;
                    return;
                }
                b'\n' => self.out.push('\n'),
                _ => {}
            }
            self.pos += 1;
        }
        self.had_types = true;
    }

    /// Erase a balanced `{ … }` body (cursor anywhere before the opener).
    fn erase_braced_body(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'{' {
            if self.bytes[self.pos] == b'\n' {
                self.out.push('\n');
            }
            self.pos += 1;
        }
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'\n' {
                self.out.push('\n');
            } else if b == b'{' {
                depth += 1;
            } else if b == b'}' {
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    break;
                }
            }
            self.pos += 1;
        }
        self.had_types = true;
    }

    // ---- punctuation -------------------------------------------------------

    fn question_mark(&mut self) {
        let next = self.peek(1);
        if next == b'.' || next == b'?' {
            // Optional chaining / nullish coalescing.
            self.copy_byte();
            self.copy_byte();
            return;
        }
        // Optional member/parameter marker: `x?: T`, `(x?)` or `x?,`.
        let mut ahead = self.pos + 1;
        while ahead < self.bytes.len() && (self.bytes[ahead] == b' ' || self.bytes[ahead] == b'\t')
        {
            ahead += 1;
        }
        match self.bytes.get(ahead) {
            Some(&b':') | Some(&b')') | Some(&b',') => {
                self.erase(self.pos + 1);
                self.last_sig = b'a';
            }
            _ => {
                self.ternaries.push(self.depth);
                self.copy_byte();
            }
        }
    }

    fn colon(&mut self) {
        // Property colon directly inside an object literal (not nested in
        // parens, e.g. method parameter annotations).
        if self.frames.last() == Some(&(Frame::Object, self.depth)) {
            self.copy_byte();
            return;
        }
        // Ternary colon.
        if self.ternaries.last() == Some(&self.depth) {
            self.ternaries.pop();
            self.copy_byte();
            return;
        }
        // Everything else is a type annotation.
        self.erase_annotation();
    }

    /// Erase `: T` with `T` possibly generic, parenthesised, an object
    /// type, a function type, or a union. Stops before `=` (initialiser),
    /// `=>` (arrow body, unless it continues a function type), `,`, `;`,
    /// `)`, `}`, `]` and statement-terminating `{`.
    fn erase_annotation(&mut self) {
        let annotation_start = self.pos;
        self.pos += 1; // the colon
        let mut depth = 0usize;
        let mut consumed_any = false;
        let mut last_type_byte = 0u8;

        loop {
            let Some(&b) = self.bytes.get(self.pos) else {
                break;
            };
            match b {
                b' ' | b'\t' => {
                    // Whitespace before a terminator belongs to the code
                    // that follows, not to the erased annotation.
                    if depth == 0 && consumed_any && self.terminator_after_ws(last_type_byte) {
                        break;
                    }
                    self.pos += 1;
                }
                b'\n' => {
                    if depth == 0 && consumed_any {
                        break;
                    }
                    self.out.push('\n');
                    self.pos += 1;
                }
                b'<' | b'(' | b'[' => {
                    depth += 1;
                    consumed_any = true;
                    last_type_byte = b;
                    self.pos += 1;
                }
                b'>' | b')' | b']' if depth > 0 => {
                    depth -= 1;
                    last_type_byte = b')';
                    self.pos += 1;
                }
                b',' | b';' if depth > 0 => {
                    last_type_byte = b',';
                    self.pos += 1;
                }
                b')' | b']' | b',' | b';' => break,
                b'{' if depth == 0 => {
                    // Object type only at the head of the annotation or
                    // after a type operator; otherwise it is a body.
                    if !consumed_any || matches!(last_type_byte, b'|' | b'&' | b'>') {
                        self.pos += 1;
                        let mut inner = 1usize;
                        while self.pos < self.bytes.len() && inner > 0 {
                            match self.bytes[self.pos] {
                                b'{' => inner += 1,
                                b'}' => inner -= 1,
                                b'\n' => self.out.push('\n'),
                                _ => {}
                            }
                            self.pos += 1;
                        }
                        consumed_any = true;
                        last_type_byte = b')';
                    } else {
                        break;
                    }
                }
                b'}' if depth == 0 => break,
                b'=' => {
                    if depth > 0 {
                        // Default type parameters: `<T = any>`.
                        self.pos += 1;
                    } else if self.peek(1) == b'>' && last_type_byte == b')' {
                        // Function type arrow: `(a) => b` continues.
                        self.pos += 2;
                        last_type_byte = b'|';
                    } else {
                        break;
                    }
                }
                b'|' | b'&' => {
                    last_type_byte = b'|';
                    self.pos += 1;
                }
                _ => {
                    if !consumed_any {
                        // Guard against labels: `loop: for (…)`.
                        let word = self.peek_word();
                        if matches!(word.as_str(), "for" | "while" | "do" | "switch") {
                            self.pos = annotation_start;
                            self.copy_byte();
                            return;
                        }
                    }
                    consumed_any = true;
                    last_type_byte = if b.is_ascii_alphanumeric() { b'a' } else { b };
                    self.pos += 1;
                }
            }
            if self.pos >= self.bytes.len() {
                break;
            }
        }
        self.had_types = true;
        self.last_sig = b'a';
    }

    /// After a whitespace run at annotation depth zero: does a token follow
    /// that ends the annotation (`=` initialiser, terminators, a body `{`)?
    fn terminator_after_ws(&self, last_type_byte: u8) -> bool {
        let mut j = self.pos;
        while j < self.bytes.len() && (self.bytes[j] == b' ' || self.bytes[j] == b'\t') {
            j += 1;
        }
        match self.bytes.get(j) {
            Some(&b'=') => {
                // `=>` continuing a function type is part of the type.
                !(self.bytes.get(j + 1) == Some(&b'>') && last_type_byte == b')')
            }
            Some(&b'{') => {
                // Object type continues after a type operator.
                !matches!(last_type_byte, b'|' | b'&' | b'>')
            }
            Some(&b',') | Some(&b';') | Some(&b')') | Some(&b']') | Some(&b'}') => true,
            _ => false,
        }
    }

    fn peek_word(&self) -> String {
        let mut end = self.pos;
        while end < self.bytes.len() && is_ident_continue(self.bytes[end]) {
            end += 1;
        }
        self.source[self.pos..end].to_string()
    }

    fn bang(&mut self) {
        // Non-null assertion: `x!`, `)!`, `]!` followed by a terminator or
        // member access. `!=` and prefix negation are untouched.
        let prev_ok = matches!(self.last_sig, b')' | b']' | b'a')
            || self
                .out
                .as_bytes()
                .last()
                .is_some_and(|b| is_ident_continue(*b));
        let next = self.peek(1);
        let next_ok = matches!(next, b'.' | b'[' | b')' | b']' | b',' | b';' | b'\n' | b' ');
        if prev_ok && next_ok && next != b'=' {
            self.erase(self.pos + 1);
        } else {
            self.copy_byte();
        }
    }

    fn angle(&mut self) {
        // Generic argument/parameter lists directly follow an identifier.
        let after_ident = self
            .out
            .as_bytes()
            .last()
            .is_some_and(|b| is_ident_continue(*b));
        if !after_ident {
            self.copy_byte();
            return;
        }
        // Balance `<…>`; give up at `;` or an unbalanced newline run.
        let mut end = self.pos + 1;
        let mut depth = 1usize;
        while end < self.bytes.len() && depth > 0 {
            match self.bytes[end] {
                b'<' => depth += 1,
                b'>' => depth -= 1,
                b';' => break,
                b'&' if self.bytes.get(end + 1) == Some(&b'&') => break,
                b'|' if self.bytes.get(end + 1) == Some(&b'|') => break,
                _ => {}
            }
            end += 1;
        }
        if depth != 0 {
            self.copy_byte();
            return;
        }
        // What follows decides: `(` call/definition, `{` body, `=>`, or
        // `extends`/implements keywords mean this was a generic list.
        let mut after = end;
        while after < self.bytes.len()
            && (self.bytes[after] == b' '
                || self.bytes[after] == b'\t'
                || self.bytes[after] == b'\n')
        {
            after += 1;
        }
        let looks_generic = match self.bytes.get(after) {
            Some(&b'(') | Some(&b'{') => true,
            Some(&b'=') => self.bytes.get(after + 1) == Some(&b'>'),
            Some(c) if is_ident_start(*c) => {
                let mut word_end = after;
                while word_end < self.bytes.len() && is_ident_continue(self.bytes[word_end]) {
                    word_end += 1;
                }
                matches!(&self.source[after..word_end], "extends" | "implements")
            }
            _ => false,
        };
        if looks_generic {
            self.erase(end);
            self.last_sig = b'a';
        } else {
            self.copy_byte();
        }
    }

    // ---- words -------------------------------------------------------------

    fn word(&mut self) {
        let start = self.pos;
        let mut end = self.pos;
        while end < self.bytes.len() && is_ident_continue(self.bytes[end]) {
            end += 1;
        }
        let word = &self.source[start..end];

        // Member access keeps everything literal.
        if self.last_sig == b'.' {
            self.copy_word(end);
            return;
        }

        let at_statement_position = matches!(self.last_sig, 0 | b';' | b'{' | b'}' | b'\n')
            || self.out.trim_end().is_empty()
            || self
                .out
                .trim_end()
                .ends_with(|c: char| c == ';' || c == '{' || c == '}');

        match word {
            "import" if at_statement_position => self.import_statement(end),
            "export" if at_statement_position => self.export_statement(end),
            "interface" if at_statement_position && self.looks_like_interface(end) => {
                self.erase_braced_body();
            }
            "type" if at_statement_position && self.looks_like_type_alias(end) => {
                self.erase_statement();
            }
            "declare" if at_statement_position => {
                if self.declared_body_follows(end) {
                    self.erase_braced_body();
                } else {
                    self.erase_statement();
                }
            }
            "abstract" if self.next_word_is(end, "class") => {
                self.erase(end);
                // Eat the single following space so `abstract class` erases
                // to `class`.
                if self.peek(0) == b' ' {
                    self.pos += 1;
                }
            }
            "implements" => {
                // Erase the clause up to the class body.
                self.pos = end;
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'{' {
                    if self.bytes[self.pos] == b'\n' {
                        self.out.push('\n');
                    }
                    self.pos += 1;
                }
                self.had_types = true;
                self.last_sig = b'a';
            }
            "satisfies" => {
                self.pos = end;
                self.erase_type_operand();
            }
            "as" if self.assertion_position() => {
                self.pos = end;
                if self.next_word_is(self.pos, "const") {
                    // `as const`: erase through the keyword.
                    while self.pos < self.bytes.len()
                        && (self.bytes[self.pos] == b' ' || self.bytes[self.pos] == b'\t')
                    {
                        self.pos += 1;
                    }
                    self.pos += "const".len();
                    self.had_types = true;
                    self.last_sig = b'a';
                } else {
                    self.erase_type_operand();
                }
            }
            "class" => {
                self.pending_class_body = true;
                self.copy_word(end);
            }
            _ => self.copy_word(end),
        }
    }

    fn copy_word(&mut self, end: usize) {
        self.out.push_str(&self.source[self.pos..end]);
        self.pos = end;
        self.last_sig = b'a';
    }

    fn next_word_is(&self, from: usize, expected: &str) -> bool {
        let mut i = from;
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        self.source[i..].starts_with(expected)
            && !is_ident_continue(*self.bytes.get(i + expected.len()).unwrap_or(&0))
    }

    fn looks_like_interface(&self, end: usize) -> bool {
        // `interface Name … {` - an identifier must follow.
        let mut i = end;
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        self.bytes.get(i).is_some_and(|b| is_ident_start(*b))
    }

    fn looks_like_type_alias(&self, end: usize) -> bool {
        // `type Name =` / `type Name<…> =`.
        let mut i = end;
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        if !self.bytes.get(i).is_some_and(|b| is_ident_start(*b)) {
            return false;
        }
        while i < self.bytes.len() && is_ident_continue(self.bytes[i]) {
            i += 1;
        }
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        if self.bytes.get(i) == Some(&b'<') {
            let mut depth = 1usize;
            i += 1;
            while i < self.bytes.len() && depth > 0 {
                match self.bytes[i] {
                    b'<' => depth += 1,
                    b'>' => depth -= 1,
                    b';' | b'\n' => return false,
                    _ => {}
                }
                i += 1;
            }
            while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
                i += 1;
            }
        }
        self.bytes.get(i) == Some(&b'=') && self.bytes.get(i + 1) != Some(&b'=')
    }

    fn declared_body_follows(&self, end: usize) -> bool {
        // `declare namespace X {`, `declare module '…' {` have bodies;
        // `declare const x: T;` does not.
        let mut i = end;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'{' => return true,
                b';' | b'\n' => return false,
                _ => i += 1,
            }
        }
        false
    }

    fn assertion_position(&self) -> bool {
        // `expr as T` - something value-like must precede.
        let trimmed = self.out.trim_end();
        trimmed.ends_with(|c: char| {
            c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == ')' || c == ']' || c == '"'
                || c == '\''
        })
    }

    /// Erase a type operand after `as`/`satisfies` up to an expression
    /// boundary.
    fn erase_type_operand(&mut self) {
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'<' | b'(' | b'[' | b'{' => depth += 1,
                b'>' | b')' | b']' | b'}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                b',' | b';' | b'\n' if depth == 0 => break,
                b'=' if depth == 0 => break,
                _ => {}
            }
            if b == b'\n' {
                self.out.push('\n');
            }
            self.pos += 1;
        }
        self.had_types = true;
        self.last_sig = b'a';
    }

    // ---- import / export statements ---------------------------------------

    fn import_statement(&mut self, end: usize) {
        // `import type …` (but not `import type from`) vanishes.
        if self.next_word_is(end, "type") {
            let mut after_type = end;
            while after_type < self.bytes.len()
                && (self.bytes[after_type] == b' ' || self.bytes[after_type] == b'\t')
            {
                after_type += 1;
            }
            after_type += "type".len();
            if !self.next_word_is(after_type, "from") {
                self.erase_statement();
                return;
            }
        }
        self.copy_import_like(end);
    }

    fn export_statement(&mut self, end: usize) {
        if self.next_word_is(end, "type") || self.next_word_is(end, "interface") {
            if self.next_word_is(end, "interface") {
                self.erase_braced_body();
            } else {
                self.erase_statement();
            }
            return;
        }
        if self.next_word_is(end, "declare") {
            if self.declared_body_follows(end) {
                self.erase_braced_body();
            } else {
                self.erase_statement();
            }
            return;
        }
        if self.next_word_is(end, "abstract") {
            // `export abstract class` - drop just the modifier.
            self.out.push_str(&self.source[self.pos..end]);
            self.pos = end;
            while self.pos < self.bytes.len() && self.bytes[self.pos] == b' ' {
                self.out.push(' ');
                self.pos += 1;
            }
            self.pos += "abstract".len();
            if self.peek(0) == b' ' {
                self.pos += 1;
            }
            self.had_types = true;
            self.last_sig = b'a';
            return;
        }
        // Only the clause forms (`export {…}`, `export * from`) are copied
        // as units; declarations return to the general walk so their
        // annotations are still erased.
        let mut i = end;
        while i < self.bytes.len() && (self.bytes[i] == b' ' || self.bytes[i] == b'\t') {
            i += 1;
        }
        match self.bytes.get(i) {
            Some(&b'{') | Some(&b'*') => self.copy_import_like(end),
            _ => self.copy_word(end),
        }
    }

    /// Copy an import/export statement head verbatim, dropping inline
    /// `type` specifiers inside its braces. Processing resumes normally
    /// after the clause, so dynamic imports and declarations are
    /// unaffected.
    fn copy_import_like(&mut self, end: usize) {
        self.copy_word(end);
        // Copy up to `{`, a string, or anything that ends the clause.
        loop {
            match self.peek(0) {
                b'{' => {
                    self.copy_byte();
                    self.copy_brace_items();
                    return;
                }
                b'\'' | b'"' => return,
                b'\n' | b';' | 0 => return,
                b'(' => return, // dynamic import; the general walk handles it
                _ => {
                    let b = self.peek(0);
                    if is_ident_start(b) {
                        let mut word_end = self.pos;
                        while word_end < self.bytes.len()
                            && is_ident_continue(self.bytes[word_end])
                        {
                            word_end += 1;
                        }
                        self.out.push_str(&self.source[self.pos..word_end]);
                        self.pos = word_end;
                    } else {
                        self.out.push(b as char);
                        self.pos += 1;
                    }
                }
            }
        }
    }

    /// Copy `{ a, type T, b as c }` dropping `type …` items, through the
    /// closing brace.
    fn copy_brace_items(&mut self) {
        loop {
            // Skip leading whitespace of the item, copying it.
            while matches!(self.peek(0), b' ' | b'\t' | b'\n' | b'\r') {
                self.out.push(self.peek(0) as char);
                self.pos += 1;
            }
            if self.peek(0) == b'}' || self.peek(0) == 0 {
                if self.peek(0) == b'}' {
                    self.copy_byte();
                }
                return;
            }
            // `type X` or `type X as Y` - but `type` alone or `type as Y`
            // is a binding named `type`.
            let item_start = self.pos;
            let mut probe = self.pos;
            let mut first_word_end = probe;
            while first_word_end < self.bytes.len() && is_ident_continue(self.bytes[first_word_end])
            {
                first_word_end += 1;
            }
            let is_type_item = &self.source[probe..first_word_end] == "type" && {
                probe = first_word_end;
                while probe < self.bytes.len()
                    && (self.bytes[probe] == b' ' || self.bytes[probe] == b'\t')
                {
                    probe += 1;
                }
                let mut second_end = probe;
                while second_end < self.bytes.len() && is_ident_continue(self.bytes[second_end]) {
                    second_end += 1;
                }
                second_end > probe && &self.source[probe..second_end] != "as"
            };
            // Walk to the end of this item (the `,` or `}`).
            let mut item_end = item_start;
            while item_end < self.bytes.len()
                && self.bytes[item_end] != b','
                && self.bytes[item_end] != b'}'
            {
                item_end += 1;
            }
            let include_comma = self.bytes.get(item_end) == Some(&b',');
            if is_type_item {
                self.had_types = true;
                let erase_to = if include_comma { item_end + 1 } else { item_end };
                self.erase(erase_to);
            } else {
                self.out.push_str(&self.source[item_start..item_end]);
                self.pos = item_end;
                if include_comma {
                    self.copy_byte();
                }
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(source: &str) -> String {
        strip_types(source).code
    }

    #[test]
    fn variable_annotations() {
        assert_eq!(strip("const x: number = 5;"), "const x = 5;");
        assert_eq!(strip("let s: string;"), "let s;");
        assert_eq!(
            strip("const m: Map<string, number> = new Map();"),
            "const m = new Map();"
        );
    }

    #[test]
    fn parameter_and_return_annotations() {
        assert_eq!(
            strip("function f(a: number, b?: string): void {}"),
            "function f(a, b) {}"
        );
        assert_eq!(strip("const f = (x: T): U => x;"), "const f = (x) => x;");
    }

    #[test]
    fn function_type_annotations() {
        assert_eq!(strip("const f: (a: number) => void = impl;"), "const f = impl;");
    }

    #[test]
    fn object_literals_are_untouched() {
        let source = "const o = { color: Red, n: 1, f: () => 2 };";
        assert_eq!(strip(source), source);
    }

    #[test]
    fn ternaries_are_untouched() {
        let source = "const x = cond ? a : b;";
        assert_eq!(strip(source), source);
        let nested = "const y = p ? q ? r : s : t;";
        assert_eq!(strip(nested), nested);
    }

    #[test]
    fn interfaces_and_aliases_vanish() {
        let out = strip("interface Props { name: string; }\nconst x = 1;");
        assert!(!out.contains("interface"));
        assert!(out.contains("const x = 1;"));
        // Line count preserved.
        assert_eq!(out.matches('\n').count(), 1);

        let out = strip("type A = { a: number };\nlet ok = true;");
        assert!(!out.contains("type A"));
        assert!(out.contains("let ok = true;"));
    }

    #[test]
    fn type_imports_vanish_but_value_imports_stay() {
        let out = strip("import type { P } from './t';\nimport React from 'react';");
        assert!(!out.contains("./t"));
        assert!(out.contains("import React from 'react';"));
        assert_eq!(out.matches('\n').count(), 1);
    }

    #[test]
    fn inline_type_specifiers_are_dropped() {
        let out = strip("import { type T, useState } from 'react';");
        assert!(!out.contains("type T"));
        assert!(out.contains("useState"));
    }

    #[test]
    fn export_type_vanishes() {
        let out = strip("export type { A } from './m';\nexport const real = 1;");
        assert!(!out.contains("./m"));
        assert!(out.contains("export const real = 1;"));
    }

    #[test]
    fn assertions_and_non_null() {
        assert_eq!(strip("const a = b as string;"), "const a = b ;");
        assert_eq!(strip("const a = b as const;"), "const a = b ;");
        assert_eq!(strip("const v = maybe!.value;"), "const v = maybe.value;");
        assert_eq!(strip("if (a !== b) {}"), "if (a !== b) {}");
        assert_eq!(strip("const n = !flag;"), "const n = !flag;");
    }

    #[test]
    fn generics_on_calls_and_declarations() {
        assert_eq!(strip("const s = new Set<string>();"), "const s = new Set();");
        assert_eq!(strip("function id<T>(x: T): T { return x; }"), "function id(x) { return x; }");
        // Comparisons keep their angle brackets.
        assert_eq!(strip("const ok = a < b && c > d;"), "const ok = a < b && c > d;");
    }

    #[test]
    fn class_heads() {
        let out = strip("class C extends Base implements I, J {\n  x: number = 1;\n}");
        assert!(out.contains("class C extends Base {"));
        assert!(out.contains("x = 1;"));

        let out = strip("export abstract class A {}");
        assert_eq!(out, "export class A {}");
    }

    #[test]
    fn strings_survive() {
        let source = "const s = 'a: b'; const t = \"x as y\"; const u = `v: ${w}`;";
        assert_eq!(strip(source), source);
    }

    #[test]
    fn labels_survive() {
        let source = "outer: for (;;) { break outer; }";
        assert_eq!(strip(source), source);
    }

    #[test]
    fn line_counts_always_match() {
        let source = "interface I {\n  a: string;\n  b: number;\n}\nconst keep = 1;\n";
        let out = strip(source);
        assert_eq!(source.matches('\n').count(), out.matches('\n').count());
    }

    #[test]
    fn flags_reported() {
        assert!(strip_types("const x: number = 1;").had_types);
        assert!(!strip_types("const x = 1;").had_types);
    }
}
