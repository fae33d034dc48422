//! The statement-level module scanner.
//!
//! Extracts the import/export tables and the source classification flags
//! without building an AST: a byte cursor walks the source, skipping
//! strings, templates, comments and regexes, and recognises the handful of
//! statement shapes the bundler cares about. Top-level-await detection uses
//! a real scope stack (function bodies vs. plain blocks), not a textual
//! heuristic.

use bale_core::plugin::Loader;

use crate::tables::{
    Binding, ExportStatement, ImportKind, ImportRecord, ParseOutput, Span, SyntaxIssue,
};

/// Scan a module and produce its tables.
///
/// `loader` is the filename-derived classification hint; it seeds
/// `has_typescript`/`has_jsx` which the scanner then refines from syntax.
pub fn parse(source: &str, loader: Loader) -> ParseOutput {
    let mut scanner = Scanner::new(source, loader);
    scanner.run();
    scanner.out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brace {
    Block,
    Function,
}

/// Where a `/` means a regex and a `<` may open JSX: after any of these
/// significant bytes the parser is at an expression position.
const EXPR_POSITION: &[u8] = b"=([{,;:!&|?+-*%<>^~\0";

struct Scanner<'a> {
    bytes: &'a [u8],
    source: &'a str,
    pos: usize,
    out: ParseOutput,
    braces: Vec<Brace>,
    parens: usize,
    /// Word preceding each currently-open paren group.
    paren_owners: Vec<Option<String>>,
    /// Owner of the most recently closed group, if the very next token is `{`.
    closed_owner: Option<Option<String>>,
    /// `function` keyword seen at this paren depth; the next `{` at that
    /// depth is its body.
    pending_function: Option<usize>,
    /// `=>` seen with a `{` body pending.
    pending_arrow_body: bool,
    /// Braceless arrow bodies: (paren depth, brace depth) they started at.
    arrow_exprs: Vec<(usize, usize)>,
    /// Last significant byte, `\0` at start of input.
    last_sig: u8,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, loader: Loader) -> Self {
        let mut out = ParseOutput::default();
        out.has_typescript = matches!(loader, Loader::Ts | Loader::Tsx);
        Self {
            bytes: source.as_bytes(),
            source,
            pos: 0,
            out,
            braces: Vec::new(),
            parens: 0,
            paren_owners: Vec::new(),
            closed_owner: None,
            pending_function: None,
            pending_arrow_body: false,
            arrow_exprs: Vec::new(),
            last_sig: 0,
        }
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' => self.slash(),
                b'\'' | b'"' => {
                    self.skip_string(b);
                    self.sig(b'"');
                }
                b'`' => {
                    self.skip_template();
                    self.sig(b'"');
                }
                b'{' => self.open_brace(),
                b'}' => self.close_brace(),
                b'(' => self.open_paren(None),
                b')' => self.close_paren(),
                b'=' => {
                    if self.peek(1) == b'>' {
                        self.pos += 2;
                        self.after_arrow();
                    } else {
                        self.pos += 1;
                        self.sig(b'=');
                    }
                }
                b'<' => {
                    self.maybe_jsx();
                    self.pos += 1;
                    self.sig(b'<');
                }
                b';' | b',' => {
                    self.pos += 1;
                    self.end_arrow_exprs_at_level();
                    self.sig(b);
                }
                c if is_ident_start(c) => self.word(),
                _ => {
                    self.pos += 1;
                    self.sig(b);
                }
            }
        }
        if !self.braces.is_empty() {
            self.issue(self.bytes.len(), "unbalanced braces at end of input");
        }
    }

    // ---- low-level helpers -------------------------------------------------

    fn peek(&self, n: usize) -> u8 {
        *self.bytes.get(self.pos + n).unwrap_or(&0)
    }

    fn sig(&mut self, b: u8) {
        self.last_sig = b;
        self.closed_owner = None;
    }

    fn issue(&mut self, at: usize, message: &str) {
        let (line, column) = line_col(self.source, at);
        self.out.errors.push(SyntaxIssue {
            line,
            column,
            message: message.to_string(),
        });
    }

    /// Skip whitespace and comments without recording significance.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek(0) {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek(1) == b'/' => {
                    while self.pos < self.bytes.len() && self.peek(0) != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.peek(1) == b'*' => {
                    self.pos += 2;
                    while self.pos < self.bytes.len()
                        && !(self.peek(0) == b'*' && self.peek(1) == b'/')
                    {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.bytes.len());
                }
                _ => break,
            }
        }
    }

    fn slash(&mut self) {
        if self.peek(1) == b'/' || self.peek(1) == b'*' {
            self.skip_trivia();
            return;
        }
        if EXPR_POSITION.contains(&self.last_sig) || self.last_sig == 0 {
            self.skip_regex();
        } else {
            self.pos += 1;
            self.sig(b'/');
        }
    }

    fn skip_regex(&mut self) {
        self.pos += 1; // opening /
        let mut in_class = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 1,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'/' if !in_class => break,
                b'\n' => break, // not a regex after all; bail quietly
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = (self.pos + 1).min(self.bytes.len());
        self.sig(b'a');
    }

    fn skip_string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 1,
                b'\n' => {
                    self.issue(start, "unterminated string literal");
                    return;
                }
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.issue(start, "unterminated string literal");
    }

    fn skip_template(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 1,
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek(1) == b'{' => {
                    self.pos += 2;
                    self.skip_balanced(b'{', b'}');
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.issue(start, "unterminated template literal");
    }

    /// Skip until the close matching an already-consumed opener, respecting
    /// nesting, strings and comments.
    fn skip_balanced(&mut self, open: u8, close: u8) {
        let mut depth = 1usize;
        while self.pos < self.bytes.len() && depth > 0 {
            let b = self.bytes[self.pos];
            match b {
                b'\'' | b'"' => {
                    self.skip_string(b);
                    continue;
                }
                b'`' => {
                    self.skip_template();
                    continue;
                }
                b'/' if self.peek(1) == b'/' || self.peek(1) == b'*' => {
                    self.skip_trivia();
                    continue;
                }
                _ if b == open => depth += 1,
                _ if b == close => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ---- scope tracking ----------------------------------------------------

    fn open_brace(&mut self) {
        let kind = if self.pending_function == Some(self.parens) {
            self.pending_function = None;
            Brace::Function
        } else if self.pending_arrow_body {
            self.pending_arrow_body = false;
            Brace::Function
        } else if let Some(owner) = self.closed_owner.take() {
            match owner.as_deref() {
                Some("if") | Some("for") | Some("while") | Some("switch") | Some("catch")
                | Some("with") | None => Brace::Block,
                Some(_) => Brace::Function,
            }
        } else {
            Brace::Block
        };
        self.braces.push(kind);
        self.pos += 1;
        self.sig(b'{');
    }

    fn close_brace(&mut self) {
        self.braces.pop();
        self.pos += 1;
        let braces = self.braces.len();
        self.arrow_exprs.retain(|&(_, b)| b <= braces);
        self.last_sig = b'}';
        self.closed_owner = None;
    }

    fn open_paren(&mut self, owner: Option<String>) {
        self.paren_owners.push(owner);
        self.parens += 1;
        self.pos += 1;
        self.sig(b'(');
    }

    fn close_paren(&mut self) {
        self.parens = self.parens.saturating_sub(1);
        let owner = self.paren_owners.pop().unwrap_or(None);
        self.pos += 1;
        let parens = self.parens;
        self.arrow_exprs.retain(|&(p, _)| p <= parens);
        self.last_sig = b')';
        self.closed_owner = Some(owner);
    }

    fn after_arrow(&mut self) {
        self.skip_trivia();
        if self.peek(0) == b'{' {
            self.pending_arrow_body = true;
        } else {
            self.arrow_exprs.push((self.parens, self.braces.len()));
        }
        self.last_sig = b'=';
        self.closed_owner = None;
    }

    fn end_arrow_exprs_at_level(&mut self) {
        let parens = self.parens;
        let braces = self.braces.len();
        self.arrow_exprs
            .retain(|&(p, b)| p < parens || b < braces);
    }

    fn at_module_scope(&self) -> bool {
        self.pending_function.is_none()
            && self.arrow_exprs.is_empty()
            && !self.braces.contains(&Brace::Function)
    }

    fn maybe_jsx(&mut self) {
        if !(EXPR_POSITION.contains(&self.last_sig) || self.last_sig == 0 || self.last_sig == b'>')
        {
            return;
        }
        let next = self.peek(1);
        if next.is_ascii_alphabetic() || next == b'>' || next == b'_' {
            self.out.has_jsx = true;
        }
    }

    // ---- words -------------------------------------------------------------

    fn word(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let word = &self.source[start..self.pos];

        // Member accesses are never keywords of interest.
        if self.last_sig == b'.' {
            self.sig(b'a');
            return;
        }

        match word {
            "import" => self.handle_import(start),
            "export" if self.braces.is_empty() => self.handle_export(start),
            "require" => self.handle_require(start),
            "await" => {
                if self.at_module_scope() {
                    self.out.has_top_level_await = true;
                }
                self.sig(b'=');
            }
            "function" => {
                self.pending_function = Some(self.parens);
                self.sig(b'a');
            }
            "return" | "typeof" | "case" | "in" | "of" | "new" | "delete" | "void"
            | "instanceof" | "do" | "else" | "yield" | "throw" => {
                // Expression follows: a `/` here is a regex, a `<` may be JSX.
                self.last_sig = b'=';
                self.closed_owner = None;
            }
            _ => {
                self.sig(b'a');
                // Remember the word in case it owns a paren group.
                self.skip_trivia();
                if self.peek(0) == b'(' {
                    self.open_paren(Some(word.to_string()));
                }
            }
        }
    }

    fn read_word(&mut self) -> Option<String> {
        self.skip_trivia();
        let start = self.pos;
        if !is_ident_start(self.peek(0)) {
            return None;
        }
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        Some(self.source[start..self.pos].to_string())
    }

    fn read_string_literal(&mut self) -> Option<String> {
        self.skip_trivia();
        let quote = self.peek(0);
        if quote != b'\'' && quote != b'"' {
            return None;
        }
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == quote {
                let text = self.source[start..self.pos].to_string();
                self.pos += 1;
                return Some(text);
            }
            if b == b'\\' {
                self.pos += 1;
            }
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
        self.issue(start, "unterminated string literal");
        None
    }

    /// Consume an optional trailing semicolon and return the statement end.
    fn statement_end(&mut self) -> usize {
        let mark = self.pos;
        self.skip_trivia();
        if self.peek(0) == b';' {
            self.pos += 1;
            self.pos
        } else {
            self.pos = mark;
            mark
        }
    }

    // ---- import ------------------------------------------------------------

    fn handle_import(&mut self, start: usize) {
        self.skip_trivia();
        match self.peek(0) {
            b'(' => self.dynamic_import(start),
            b'.' => {
                // import.meta - plain expression.
                self.sig(b'a');
            }
            b'\'' | b'"' => {
                if let Some(specifier) = self.read_string_literal() {
                    let end = self.statement_end();
                    self.record(ImportRecord {
                        specifier,
                        kind: ImportKind::SideEffect,
                        bindings: Vec::new(),
                        type_only: false,
                        span: Span::new(start, end),
                    });
                }
                self.sig(b'a');
            }
            _ if self.braces.is_empty() => self.import_clause(start),
            _ => self.sig(b'a'),
        }
    }

    fn dynamic_import(&mut self, start: usize) {
        self.out.has_dynamic_import = true;
        self.pos += 1; // consume (
        self.skip_trivia();
        let literal = match self.peek(0) {
            b'\'' | b'"' => self.read_string_literal(),
            _ => None,
        };
        // Literal or not, consume through the matching close paren.
        self.skip_balanced(b'(', b')');
        let end = self.pos;
        if let Some(specifier) = literal {
            self.record(ImportRecord {
                specifier,
                kind: ImportKind::DynamicCall,
                bindings: Vec::new(),
                type_only: false,
                span: Span::new(start, end),
            });
        }
        self.sig(b')');
    }

    fn import_clause(&mut self, start: usize) {
        let mut type_only = false;
        let mut bindings = Vec::new();

        let mut first = self.read_word();
        if first.as_deref() == Some("type") {
            // `import type X …` is type-only; `import type from 'm'` is a
            // default import of a binding literally named `type`.
            let mark = self.pos;
            let following = self.read_word();
            match following.as_deref() {
                Some("from") => {
                    self.pos = mark;
                }
                _ => {
                    type_only = true;
                    self.out.has_typescript = true;
                    self.pos = mark;
                    first = self.read_word();
                    if first.is_none() {
                        self.skip_trivia();
                    }
                }
            }
        }

        if let Some(name) = first {
            bindings.push(Binding::Default { local: name });
            self.skip_trivia();
            if self.peek(0) == b',' {
                self.pos += 1;
                self.skip_trivia();
            }
        }

        self.skip_trivia();
        match self.peek(0) {
            b'{' => {
                self.pos += 1;
                for (imported, local, item_type_only) in self.named_items() {
                    if !item_type_only {
                        bindings.push(Binding::Named { imported, local });
                    }
                }
            }
            b'*' => {
                self.pos += 1;
                if self.read_word().as_deref() == Some("as") {
                    if let Some(local) = self.read_word() {
                        bindings.push(Binding::Namespace { local });
                    }
                }
            }
            _ => {}
        }

        // `import x from 'm'` - the `from` keyword; absent for bindingless
        // malformed input, in which case we bail without a record.
        let keyword = self.read_word();
        if keyword.as_deref() != Some("from") && !bindings.is_empty() {
            self.issue(self.pos, "expected 'from' in import statement");
            return;
        }
        let Some(specifier) = self.read_string_literal() else {
            self.issue(self.pos, "expected module specifier string");
            return;
        };
        let end = self.statement_end();
        self.record(ImportRecord {
            specifier,
            kind: ImportKind::StaticFrom,
            bindings,
            type_only,
            span: Span::new(start, end),
        });
        self.sig(b'a');
    }

    /// Parse `a, b as c, type T` items up to and including the closing `}`.
    /// Returns `(imported, local, type_only)` triples.
    fn named_items(&mut self) -> Vec<(String, String, bool)> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek(0) {
                b'}' => {
                    self.pos += 1;
                    break;
                }
                b',' => {
                    self.pos += 1;
                }
                b'\'' | b'"' => {
                    // String export names: `{ 'a-b' as c }`.
                    let Some(imported) = self.read_string_literal() else {
                        break;
                    };
                    let local = self.maybe_alias().unwrap_or_else(|| imported.clone());
                    items.push((imported, local, false));
                }
                0 => break,
                _ => {
                    let Some(mut name) = self.read_word() else {
                        self.pos += 1;
                        continue;
                    };
                    let mut item_type_only = false;
                    if name == "type" {
                        let mark = self.pos;
                        if let Some(actual) = self.read_word() {
                            if actual != "as" {
                                item_type_only = true;
                                self.out.has_typescript = true;
                                name = actual;
                            } else {
                                self.pos = mark;
                            }
                        } else {
                            self.pos = mark;
                        }
                    }
                    let local = self.maybe_alias().unwrap_or_else(|| name.clone());
                    items.push((name, local, item_type_only));
                }
            }
        }
        items
    }

    fn maybe_alias(&mut self) -> Option<String> {
        let mark = self.pos;
        if self.read_word().as_deref() == Some("as") {
            if let Some(local) = self.read_word() {
                return Some(local);
            }
        }
        self.pos = mark;
        None
    }

    fn handle_require(&mut self, start: usize) {
        self.skip_trivia();
        if self.peek(0) != b'(' {
            self.sig(b'a');
            return;
        }
        self.pos += 1;
        self.skip_trivia();
        let literal = match self.peek(0) {
            b'\'' | b'"' => self.read_string_literal(),
            _ => None,
        };
        self.skip_balanced(b'(', b')');
        let end = self.pos;
        if let Some(specifier) = literal {
            self.record(ImportRecord {
                specifier,
                kind: ImportKind::RequireCall,
                bindings: Vec::new(),
                type_only: false,
                span: Span::new(start, end),
            });
        }
        self.sig(b')');
    }

    // ---- export ------------------------------------------------------------

    fn handle_export(&mut self, start: usize) {
        let export_kw_end = self.pos;
        self.skip_trivia();
        match self.peek(0) {
            b'{' => {
                self.pos += 1;
                let items = self.named_items();
                let mark = self.pos;
                if self.read_word().as_deref() == Some("from") {
                    if let Some(specifier) = self.read_string_literal() {
                        let end = self.statement_end();
                        let bindings = items
                            .into_iter()
                            .filter(|(_, _, type_only)| !type_only)
                            .map(|(imported, local, _)| Binding::Named { imported, local })
                            .collect();
                        self.record(ImportRecord {
                            specifier,
                            kind: ImportKind::ReExport,
                            bindings,
                            type_only: false,
                            span: Span::new(start, end),
                        });
                    }
                } else {
                    self.pos = mark;
                    let end = self.statement_end();
                    let names = items
                        .into_iter()
                        .filter(|(_, _, type_only)| !type_only)
                        .map(|(local, exported, _)| (local, exported))
                        .collect();
                    self.out.exports.push(ExportStatement::NamedList {
                        names,
                        span: Span::new(start, end),
                    });
                }
                self.sig(b'a');
            }
            b'*' => {
                self.pos += 1;
                let mut namespace = None;
                let mark = self.pos;
                match self.read_word().as_deref() {
                    Some("as") => namespace = self.read_word(),
                    Some("from") => self.pos = mark,
                    _ => self.pos = mark,
                }
                if self.read_word().as_deref() != Some("from") {
                    self.issue(self.pos, "expected 'from' in export * statement");
                    return;
                }
                if let Some(specifier) = self.read_string_literal() {
                    let end = self.statement_end();
                    match namespace {
                        Some(local) => self.record(ImportRecord {
                            specifier,
                            kind: ImportKind::ReExport,
                            bindings: vec![Binding::Namespace { local }],
                            type_only: false,
                            span: Span::new(start, end),
                        }),
                        None => self.record(ImportRecord {
                            specifier,
                            kind: ImportKind::ReExportAll,
                            bindings: Vec::new(),
                            type_only: false,
                            span: Span::new(start, end),
                        }),
                    }
                }
                self.sig(b'a');
            }
            _ => {
                let mark = self.pos;
                let Some(word) = self.read_word() else {
                    self.sig(b'a');
                    return;
                };
                match word.as_str() {
                    "default" => {
                        let prefix_end = self.pos;
                        let name_hint = self.default_name_hint();
                        self.out.exports.push(ExportStatement::Default {
                            span: Span::new(start, prefix_end),
                            name_hint,
                        });
                        self.sig(b'a');
                    }
                    "type" => {
                        // `export type …` is erased entirely.
                        self.out.has_typescript = true;
                        self.skip_type_export();
                    }
                    "const" | "let" | "var" => {
                        let names = self.binding_names();
                        self.out.exports.push(ExportStatement::Declaration {
                            names,
                            // Strip `export` plus the single following space.
                            span: Span::new(start, mark.min(export_kw_end + 1)),
                        });
                        self.sig(b'a');
                    }
                    "function" => {
                        self.export_declaration(start, export_kw_end, mark, true);
                    }
                    "class" => {
                        self.export_declaration(start, export_kw_end, mark, false);
                    }
                    "async" => {
                        let inner = self.read_word();
                        if inner.as_deref() == Some("function") {
                            self.export_declaration(start, export_kw_end, mark, true);
                        } else {
                            self.sig(b'a');
                        }
                    }
                    "interface" | "enum" | "abstract" | "declare" => {
                        // TypeScript surface; the eraser removes the body,
                        // nothing is exported at runtime. `export enum` is
                        // not supported for value semantics.
                        self.out.has_typescript = true;
                        self.sig(b'a');
                    }
                    _ => self.sig(b'a'),
                }
            }
        }
    }

    fn export_declaration(
        &mut self,
        start: usize,
        export_kw_end: usize,
        _decl_start: usize,
        is_function: bool,
    ) {
        // Cursor sits right after the declaration keyword; the next word is
        // the declared name (generators put a `*` first).
        self.skip_trivia();
        if is_function && self.peek(0) == b'*' {
            self.pos += 1;
        }
        let Some(name) = self.read_word() else {
            self.issue(self.pos, "expected a name in export declaration");
            return;
        };
        if is_function {
            // The body brace that follows opens a function scope.
            self.pending_function = Some(self.parens);
        }
        self.out.exports.push(ExportStatement::Declaration {
            names: vec![name],
            span: Span::new(start, export_kw_end + 1),
        });
        self.sig(b'a');
    }

    fn default_name_hint(&mut self) -> Option<String> {
        let mark = self.pos;
        let hint = match self.read_word().as_deref() {
            Some("function") => {
                self.skip_trivia();
                if self.peek(0) == b'*' {
                    self.pos += 1;
                }
                self.read_word()
            }
            Some("class") => self.read_word(),
            Some("async") => {
                if self.read_word().as_deref() == Some("function") {
                    self.read_word()
                } else {
                    None
                }
            }
            _ => None,
        };
        self.pos = mark;
        hint
    }

    /// Skip a dropped `export type …` statement: to the end of a `{…}`
    /// group when one opens before the terminator, else to `;`/newline.
    fn skip_type_export(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' => {
                    self.pos += 1;
                    self.skip_balanced(b'{', b'}');
                    // A `from 'x'` clause may still follow; consume simply.
                }
                b';' | b'\n' => {
                    self.pos += 1;
                    return;
                }
                b'\'' | b'"' => {
                    let quote = self.bytes[self.pos];
                    self.skip_string(quote);
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Names bound by `const/let/var` declarators, including destructuring
    /// patterns, up to the `=` of each initialiser.
    fn binding_names(&mut self) -> Vec<String> {
        let mut names = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek(0) {
                b'{' | b'[' => {
                    let close = if self.peek(0) == b'{' { b'}' } else { b']' };
                    self.pos += 1;
                    self.pattern_names(close, &mut names);
                }
                _ => {
                    if let Some(name) = self.read_word() {
                        names.push(name);
                    } else {
                        break;
                    }
                }
            }
            // Skip the initialiser up to `,` (next declarator) or `;`.
            if !self.skip_initialiser() {
                break;
            }
        }
        names
    }

    /// Collect bound names inside a destructuring pattern; the opener has
    /// been consumed.
    fn pattern_names(&mut self, close: u8, names: &mut Vec<String>) {
        loop {
            self.skip_trivia();
            let b = self.peek(0);
            match b {
                0 => return,
                _ if b == close => {
                    self.pos += 1;
                    return;
                }
                b',' => self.pos += 1,
                b'.' => self.pos += 1, // rest `...`
                b'{' | b'[' => {
                    let inner_close = if b == b'{' { b'}' } else { b']' };
                    self.pos += 1;
                    self.pattern_names(inner_close, names);
                }
                b'\'' | b'"' => {
                    // String keys: the binding follows the `:`.
                    let _ = self.read_string_literal();
                }
                _ => {
                    let Some(word) = self.read_word() else {
                        self.pos += 1;
                        continue;
                    };
                    self.skip_trivia();
                    match self.peek(0) {
                        b':' => {
                            // `key: binding` - the right side binds.
                            self.pos += 1;
                            self.skip_trivia();
                            match self.peek(0) {
                                b'{' | b'[' => {
                                    let inner_close =
                                        if self.peek(0) == b'{' { b'}' } else { b']' };
                                    self.pos += 1;
                                    self.pattern_names(inner_close, names);
                                }
                                _ => {
                                    if let Some(binding) = self.read_word() {
                                        names.push(binding);
                                    }
                                }
                            }
                        }
                        b'=' => {
                            names.push(word);
                            self.pos += 1;
                            self.skip_default_value(close);
                        }
                        _ => names.push(word),
                    }
                }
            }
        }
    }

    /// Skip a default value inside a pattern until `,` or the pattern close
    /// at this nesting level.
    fn skip_default_value(&mut self, close: u8) {
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match b {
                b'\'' | b'"' => {
                    self.skip_string(b);
                    continue;
                }
                b'`' => {
                    self.skip_template();
                    continue;
                }
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                b',' if depth == 0 => return,
                _ => {}
            }
            if depth == 0 && b == close {
                return;
            }
            self.pos += 1;
        }
    }

    /// After a declarator name/pattern: skip `= init` if present. Returns
    /// `true` when another declarator follows (`,`), `false` at `;`/end.
    fn skip_initialiser(&mut self) -> bool {
        self.skip_trivia();
        // Type annotation: `: T` up to `=`/`,`/`;`.
        if self.peek(0) == b':' {
            self.out.has_typescript = true;
            self.pos += 1;
            let mut depth = 0usize;
            while self.pos < self.bytes.len() {
                let b = self.bytes[self.pos];
                match b {
                    b'<' | b'(' | b'[' | b'{' => depth += 1,
                    b'>' | b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                    b'=' | b',' | b';' | b'\n' if depth == 0 => break,
                    _ => {}
                }
                self.pos += 1;
            }
        }
        self.skip_trivia();
        if self.peek(0) == b'=' {
            self.pos += 1;
            let mut depth = 0usize;
            while self.pos < self.bytes.len() {
                let b = self.bytes[self.pos];
                match b {
                    b'\'' | b'"' => {
                        self.skip_string(b);
                        continue;
                    }
                    b'`' => {
                        self.skip_template();
                        continue;
                    }
                    b'/' if self.peek(1) == b'/' || self.peek(1) == b'*' => {
                        self.skip_trivia();
                        continue;
                    }
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => {
                        if depth == 0 {
                            return false;
                        }
                        depth -= 1;
                    }
                    b',' if depth == 0 => {
                        self.pos += 1;
                        return true;
                    }
                    b';' | b'\n' if depth == 0 => {
                        return false;
                    }
                    _ => {}
                }
                self.pos += 1;
            }
            return false;
        }
        if self.peek(0) == b',' {
            self.pos += 1;
            return true;
        }
        false
    }

    fn record(&mut self, record: ImportRecord) {
        self.out.imports.push(record);
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let clamped = offset.min(source.len());
    let mut line = 1u32;
    let mut column = 1u32;
    for b in source.as_bytes()[..clamped].iter() {
        if *b == b'\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
