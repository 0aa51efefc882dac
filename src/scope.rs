//! Static scope validation of the generated unit.
//!
//! Re-reads the assembled [`CompiledUnit`] into a token-level structural
//! form and checks that every referenced name resolves somewhere in its
//! scope chain: host builtins, runtime symbols and other import-bound
//! names, module constants, the component callable, the props parameter,
//! function-scoped assignment and loop targets, `def` names and
//! parameters, and — visible only within their own logical line — lambda
//! parameters, comprehension targets, and walrus bindings.
//!
//! All violations are collected, not just the first, each carrying the
//! original source line recovered through the unit's line map.

use lazy_static::lazy_static;
use std::collections::HashSet;

use crate::diagnostics::Diagnostic;
use crate::document::CompiledUnit;

lazy_static! {
    /// Host-language keywords; never name references.
    static ref HOST_KEYWORDS: HashSet<&'static str> = {
        [
            "and", "as", "assert", "async", "await", "break", "case", "class",
            "continue", "def", "del", "elif", "else", "except", "finally",
            "for", "from", "global", "if", "import", "in", "is", "lambda",
            "match", "nonlocal", "not", "or", "pass", "raise", "return",
            "try", "while", "with", "yield", "True", "False", "None",
        ]
        .into_iter()
        .collect()
    };

    /// Host builtins plus the browser-interop globals the runtime exposes.
    static ref HOST_BUILTINS: HashSet<&'static str> = {
        [
            "abs", "all", "any", "bool", "bytes", "callable", "chr",
            "classmethod", "dict", "dir", "divmod", "enumerate", "filter",
            "float", "format", "frozenset", "getattr", "hasattr", "hash",
            "hex", "id", "int", "isinstance", "issubclass", "iter", "len",
            "list", "map", "max", "min", "next", "object", "oct", "ord",
            "pow", "print", "property", "range", "repr", "reversed",
            "round", "set", "setattr", "slice", "sorted", "staticmethod",
            "str", "sum", "super", "tuple", "type", "vars", "zip",
            "Exception", "ValueError", "TypeError", "KeyError",
            "IndexError", "AttributeError", "RuntimeError", "StopIteration",
            "NotImplementedError", "ZeroDivisionError",
            // Browser interop exposed by the runtime environment.
            "console", "window", "document", "js",
        ]
        .into_iter()
        .collect()
    };
}

// ── Host token scanner ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum HostTok {
    Ident(String),
    Op(String),
    Str { fstring: bool, content: String },
    Newline,
}

#[derive(Debug, Clone)]
struct SpannedTok {
    tok: HostTok,
    /// Bracket depth at the token.
    depth: i32,
    /// 0-based line within the scanned text.
    line: u32,
}

/// Tokenize host-language code: identifiers, operators, strings (including
/// triple-quoted and f-strings), comments stripped, numbers skipped.
fn scan_host(code: &str) -> Vec<SpannedTok> {
    let chars: Vec<char> = code.chars().collect();
    let mut toks = Vec::new();
    let mut depth = 0i32;
    let mut line = 0u32;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            toks.push(SpannedTok {
                tok: HostTok::Newline,
                depth,
                line,
            });
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            // String prefix (f"...", rb'...', ...)?
            let lower = word.to_lowercase();
            if word.len() <= 2
                && lower.chars().all(|c| "frbu".contains(c))
                && matches!(chars.get(i), Some('"') | Some('\''))
            {
                let fstring = lower.contains('f');
                let (content, consumed, newlines) = scan_string(&chars, i);
                toks.push(SpannedTok {
                    tok: HostTok::Str { fstring, content },
                    depth,
                    line,
                });
                i += consumed;
                line += newlines;
                continue;
            }
            toks.push(SpannedTok {
                tok: HostTok::Ident(word),
                depth,
                line,
            });
            continue;
        }
        if c == '"' || c == '\'' {
            let (content, consumed, newlines) = scan_string(&chars, i);
            toks.push(SpannedTok {
                tok: HostTok::Str {
                    fstring: false,
                    content,
                },
                depth,
                line,
            });
            i += consumed;
            line += newlines;
            continue;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '.' || chars[i] == '_')
            {
                i += 1;
            }
            continue;
        }

        // Operator; brackets adjust depth.
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
        let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
        let op = match two.as_str() {
            "==" | "!=" | "<=" | ">=" | ":=" | "->" | "**" | "//" | "+=" | "-=" | "*=" | "/="
            | "%=" | "&=" | "|=" | "^=" => {
                i += 2;
                two
            }
            _ => {
                i += 1;
                c.to_string()
            }
        };
        toks.push(SpannedTok {
            tok: HostTok::Op(op),
            depth,
            line,
        });
    }
    toks
}

/// Scan a string literal starting at `start` (a quote). Returns content,
/// chars consumed, and newlines crossed.
fn scan_string(chars: &[char], start: usize) -> (String, usize, u32) {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let (open_len, close): (usize, String) = if triple {
        (3, quote.to_string().repeat(3))
    } else {
        (1, quote.to_string())
    };
    let mut i = start + open_len;
    let mut content = String::new();
    let mut newlines = 0u32;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            content.push(chars[i]);
            content.push(chars[i + 1]);
            if chars[i + 1] == '\n' {
                newlines += 1;
            }
            i += 2;
            continue;
        }
        let matches_close = close
            .chars()
            .enumerate()
            .all(|(k, q)| chars.get(i + k) == Some(&q));
        if matches_close && (triple || chars[i] == quote) {
            i += close.chars().count();
            return (content, i - start, newlines);
        }
        if chars[i] == '\n' {
            newlines += 1;
        }
        content.push(chars[i]);
        i += 1;
    }
    (content, i - start, newlines)
}

/// Interpolation code regions of an f-string body, format specs stripped.
fn fstring_code_regions(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let mut regions = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] == '{' {
            if chars.get(i + 1) == Some(&'{') {
                i += 2;
                continue;
            }
            let start = i + 1;
            let mut depth = 1i32;
            let mut j = start;
            while j < chars.len() && depth > 0 {
                match chars[j] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            let inner: String = chars[start..j.saturating_sub(1)].iter().collect();
            // Strip `!r` conversions and `:>10`-style format specs.
            let code = split_format_spec(&inner);
            regions.push(code.to_string());
            i = j;
        } else if chars[i] == '}' && chars.get(i + 1) == Some(&'}') {
            i += 2;
        } else {
            i += 1;
        }
    }
    regions
}

fn split_format_spec(inner: &str) -> &str {
    let bytes = inner.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' | b'!' if depth == 0 => return &inner[..i],
            _ => {}
        }
    }
    inner
}

// ── Logical lines ────────────────────────────────────────────────────────

struct LogicalLine {
    toks: Vec<SpannedTok>,
    /// 0-based first line of the statement within the scanned text.
    start_line: u32,
}

/// Group tokens into logical lines: newlines inside brackets continue the
/// statement.
fn logical_lines(toks: Vec<SpannedTok>) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut current: Vec<SpannedTok> = Vec::new();
    for tok in toks {
        if matches!(tok.tok, HostTok::Newline) {
            if tok.depth <= 0 && !current.is_empty() {
                let start_line = current[0].line;
                lines.push(LogicalLine {
                    toks: std::mem::take(&mut current),
                    start_line,
                });
            }
            continue;
        }
        current.push(tok);
    }
    if !current.is_empty() {
        let start_line = current[0].line;
        lines.push(LogicalLine {
            toks: current,
            start_line,
        });
    }
    lines
}

// ── Binding and reference extraction ─────────────────────────────────────

fn ident_at(toks: &[SpannedTok], i: usize) -> Option<&str> {
    match toks.get(i).map(|t| &t.tok) {
        Some(HostTok::Ident(name)) => Some(name.as_str()),
        _ => None,
    }
}

fn op_at(toks: &[SpannedTok], i: usize) -> Option<&str> {
    match toks.get(i).map(|t| &t.tok) {
        Some(HostTok::Op(op)) => Some(op.as_str()),
        _ => None,
    }
}

/// Function-scoped bindings of one logical line: assignment targets
/// (plain, chained, augmented, annotated), statement-level `for` targets,
/// `as` targets, `def` names and parameters, `global`/`nonlocal` names.
fn collect_line_bindings(line: &LogicalLine, bindings: &mut HashSet<String>) {
    let toks = &line.toks;
    let base_depth = toks.first().map(|t| t.depth).unwrap_or(0);

    // `def name(params):`
    let head = ident_at(toks, 0);
    let def_at = if head == Some("def") {
        Some(0)
    } else if head == Some("async") && ident_at(toks, 1) == Some("def") {
        Some(1)
    } else {
        None
    };
    if let Some(k) = def_at {
        if let Some(name) = ident_at(toks, k + 1) {
            bindings.insert(name.to_string());
        }
        // Parameters: idents directly after '(' ',' '*' or '**'.
        for i in k + 2..toks.len() {
            if let Some(name) = ident_at(toks, i) {
                if matches!(op_at(toks, i - 1), Some("(") | Some(",") | Some("*") | Some("**")) {
                    bindings.insert(name.to_string());
                }
            }
        }
        return;
    }

    if head == Some("global") || head == Some("nonlocal") {
        for t in toks.iter().skip(1) {
            if let HostTok::Ident(name) = &t.tok {
                bindings.insert(name.clone());
            }
        }
        return;
    }

    // Statement-level `for target[, target] in ...`.
    if head == Some("for") {
        collect_for_targets(toks, 0, base_depth, bindings);
    }

    // `as name` targets (with / except / import).
    for i in 0..toks.len() {
        if ident_at(toks, i) == Some("as") {
            if let Some(name) = ident_at(toks, i + 1) {
                bindings.insert(name.to_string());
            }
        }
    }

    // Assignments: segments between top-level `=` ops; every segment but
    // the last is a target list.
    let eq_positions: Vec<usize> = toks
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            t.depth == base_depth
                && matches!(&t.tok, HostTok::Op(op) if op == "=" || op.len() == 2 && op.ends_with('=')
                    && !matches!(op.as_str(), "==" | "!=" | "<=" | ">="))
        })
        .map(|(i, _)| i)
        .collect();
    if !eq_positions.is_empty() {
        let mut segment_start = 0usize;
        for &eq in &eq_positions {
            collect_target_idents(&toks[segment_start..eq], base_depth, bindings);
            segment_start = eq + 1;
        }
    }
}

/// `for` targets between `for` and `in`, statement or comprehension level.
fn collect_for_targets(
    toks: &[SpannedTok],
    for_index: usize,
    depth: i32,
    out: &mut HashSet<String>,
) {
    let mut i = for_index + 1;
    while i < toks.len() {
        if toks[i].depth == depth && ident_at(toks, i) == Some("in") {
            break;
        }
        if let Some(name) = ident_at(toks, i) {
            let after_dot = matches!(op_at(toks, i.wrapping_sub(1)), Some("."));
            if !after_dot {
                out.insert(name.to_string());
            }
        }
        i += 1;
    }
}

/// Idents of an assignment-target segment. Attribute and subscript targets
/// reference their base instead of binding a new name; an annotation
/// restricts targets to the part before the colon.
fn collect_target_idents(segment: &[SpannedTok], base_depth: i32, out: &mut HashSet<String>) {
    let annotation = segment
        .iter()
        .position(|t| t.depth == base_depth && matches!(&t.tok, HostTok::Op(op) if op == ":"));
    let segment = match annotation {
        Some(end) => &segment[..end],
        None => segment,
    };
    for i in 0..segment.len() {
        if let Some(name) = ident_at(segment, i) {
            let after_dot = matches!(op_at(segment, i.wrapping_sub(1)), Some("."));
            let attribute_or_subscript =
                matches!(op_at(segment, i + 1), Some(".") | Some("["));
            if !after_dot && !attribute_or_subscript {
                out.insert(name.to_string());
            }
        }
    }
}

/// Statement-local binders: lambda parameters, comprehension targets,
/// walrus targets. These never leak to sibling statements.
fn collect_statement_locals(line: &LogicalLine) -> HashSet<String> {
    let toks = &line.toks;
    let base_depth = toks.first().map(|t| t.depth).unwrap_or(0);
    let mut locals = HashSet::new();

    for i in 0..toks.len() {
        match &toks[i].tok {
            HostTok::Ident(word) if word == "lambda" => {
                let lambda_depth = toks[i].depth;
                let mut j = i + 1;
                while j < toks.len() {
                    if toks[j].depth == lambda_depth
                        && matches!(&toks[j].tok, HostTok::Op(op) if op == ":")
                    {
                        break;
                    }
                    if let Some(name) = ident_at(toks, j) {
                        let bindable = matches!(
                            op_at(toks, j.wrapping_sub(1)),
                            Some(",") | Some("*") | Some("**")
                        ) || j == i + 1;
                        if bindable {
                            locals.insert(name.to_string());
                        }
                    }
                    j += 1;
                }
            }
            HostTok::Ident(word) if word == "for" && toks[i].depth > base_depth => {
                collect_for_targets(toks, i, toks[i].depth, &mut locals);
            }
            HostTok::Ident(name) => {
                if op_at(toks, i + 1) == Some(":=") {
                    locals.insert(name.clone());
                }
            }
            _ => {}
        }
    }
    locals
}

/// Name references of one logical line: identifiers that are not keywords,
/// attribute names, or keyword-argument names. F-string interpolations are
/// scanned as code.
fn collect_references(line: &LogicalLine) -> Vec<String> {
    let mut refs = Vec::new();
    collect_refs_from(&line.toks, &mut refs);
    refs
}

fn collect_refs_from(toks: &[SpannedTok], refs: &mut Vec<String>) {
    for i in 0..toks.len() {
        match &toks[i].tok {
            HostTok::Ident(name) => {
                if HOST_KEYWORDS.contains(name.as_str()) {
                    continue;
                }
                if matches!(op_at(toks, i.wrapping_sub(1)), Some(".")) {
                    continue;
                }
                // Keyword-argument name inside a call.
                if toks[i].depth > 0
                    && op_at(toks, i + 1) == Some("=")
                    && matches!(op_at(toks, i.wrapping_sub(1)), Some("(") | Some(","))
                {
                    continue;
                }
                refs.push(name.clone());
            }
            HostTok::Str { fstring: true, content } => {
                for region in fstring_code_regions(content) {
                    let inner = scan_host(&region);
                    collect_refs_from(&inner, refs);
                }
            }
            _ => {}
        }
    }
}

// ── Import-line parsing ──────────────────────────────────────────────────

/// Names bound at module level by an import line.
pub fn import_bound_names(line: &str) -> Vec<String> {
    let line = line.trim();
    let mut names = Vec::new();
    let collect_clauses = |clause_text: &str, names: &mut Vec<String>| {
        for clause in clause_text.split(',') {
            let clause = clause.trim().trim_end_matches('\\').trim();
            if clause.is_empty() || clause == "*" || clause == "(" || clause == ")" {
                continue;
            }
            let clause = clause.trim_matches(|c| c == '(' || c == ')').trim();
            let name = match clause.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                // `import a.b.c` binds the top package name.
                None => clause.split('.').next().unwrap_or(clause).trim(),
            };
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    };
    if let Some(rest) = line.strip_prefix("from ") {
        if let Some((_, imported)) = rest.split_once(" import ") {
            collect_clauses(imported, &mut names);
        }
    } else if let Some(rest) = line.strip_prefix("import ") {
        collect_clauses(rest, &mut names);
    }
    names
}

// ── Validator ────────────────────────────────────────────────────────────

pub struct ScopeValidator<'a> {
    file: &'a str,
}

impl<'a> ScopeValidator<'a> {
    pub fn new(file: &'a str) -> Self {
        ScopeValidator { file }
    }

    /// Check every name reference in the unit. Returns the full violation
    /// list; an empty vector means the unit is scope-clean.
    pub fn validate(&self, unit: &CompiledUnit) -> Vec<Diagnostic> {
        let mut module_scope: HashSet<String> = HashSet::new();
        for line in &unit.import_lines {
            module_scope.extend(import_bound_names(line));
        }
        for def in &unit.constant_defs {
            if let Some((name, _)) = def.split_once(" = ") {
                module_scope.insert(name.trim().to_string());
            }
        }
        // The callable and any context wrapper assignments bind at module
        // level.
        for line in &unit.function_def {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("def ") {
                if let Some(name) = rest.split('(').next() {
                    module_scope.insert(name.trim().to_string());
                }
            }
            if !line.starts_with(' ') && !line.starts_with('@') {
                if let Some((lhs, _)) = line.split_once(" = ") {
                    if lhs.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        module_scope.insert(lhs.to_string());
                    }
                }
            }
        }

        // Function scope: the props parameter plus flat bindings over the
        // whole body (host function scoping is flat across its suites).
        let body_text = unit.function_def.join("\n");
        let toks = scan_host(&body_text);
        let lines = logical_lines(toks);

        let mut function_scope: HashSet<String> = HashSet::new();
        if let Some(def_line) = unit
            .function_def
            .iter()
            .find(|l| l.trim_start().starts_with("def "))
        {
            if let Some(params) = def_line.split('(').nth(1) {
                let params = params.trim_end_matches(':').trim_end_matches(')');
                for param in params.split(',') {
                    let name = param.trim().trim_start_matches('*').trim();
                    let name = name.split(&['=', ':'][..]).next().unwrap_or("").trim();
                    if !name.is_empty() {
                        function_scope.insert(name.to_string());
                    }
                }
            }
        }
        for line in &lines {
            if is_decorator_or_def(line) {
                // The def line's parameter handling above is authoritative;
                // decorators bind nothing.
                if ident_at(&line.toks, 0) == Some("def")
                    || ident_at(&line.toks, 0) == Some("async")
                {
                    collect_line_bindings(line, &mut function_scope);
                }
                continue;
            }
            collect_line_bindings(line, &mut function_scope);
        }

        // The generated-line offset of function_def within source().
        let count = |lines: &[String]| -> u32 {
            lines.iter().map(|l| 1 + l.matches('\n').count() as u32).sum()
        };
        let base_line = count(&unit.import_lines) + 1 + count(&unit.constant_defs);

        let mut violations = Vec::new();
        let mut seen: HashSet<(String, u32)> = HashSet::new();
        for line in &lines {
            let locals = collect_statement_locals(line);
            for name in collect_references(line) {
                if HOST_BUILTINS.contains(name.as_str())
                    || module_scope.contains(&name)
                    || function_scope.contains(&name)
                    || locals.contains(&name)
                {
                    continue;
                }
                let generated = base_line + line.start_line + 1;
                let original = unit.original_line(generated).unwrap_or(0);
                if !seen.insert((name.clone(), generated)) {
                    continue;
                }
                violations.push(
                    Diagnostic::undefined_name(&name, self.file, original)
                        .with_excerpt(render_line(line)),
                );
            }
        }
        violations
    }
}

fn is_decorator_or_def(line: &LogicalLine) -> bool {
    match line.toks.first().map(|t| &t.tok) {
        Some(HostTok::Op(op)) if op == "@" => true,
        Some(HostTok::Ident(word)) if word == "def" || word == "async" => true,
        _ => false,
    }
}

fn render_line(line: &LogicalLine) -> String {
    let mut out = String::new();
    for t in line.toks.iter().take(24) {
        match &t.tok {
            HostTok::Ident(name) => {
                if !out.is_empty() && !out.ends_with(|c: char| "([{. ".contains(c)) {
                    out.push(' ');
                }
                out.push_str(name);
            }
            HostTok::Op(op) => out.push_str(op),
            HostTok::Str { content, .. } => {
                out.push('"');
                out.push_str(content);
                out.push('"');
            }
            HostTok::Newline => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CompiledUnit;

    fn unit_with_body(imports: &[&str], body: &[&str]) -> CompiledUnit {
        let mut import_lines = vec![
            "from ptml.runtime import makeElement, invokeComponent, component, page, loadStyle, applyStyle, provideContext".to_string(),
        ];
        import_lines.extend(imports.iter().map(|s| s.to_string()));
        let mut function_def = vec![
            "@component(props={})".to_string(),
            "def App(**props):".to_string(),
        ];
        function_def.extend(body.iter().map(|s| format!("    {}", s)));
        CompiledUnit {
            import_lines,
            constant_defs: vec![],
            function_def,
            line_map: vec![],
        }
    }

    fn validate(imports: &[&str], body: &[&str]) -> Vec<Diagnostic> {
        ScopeValidator::new("test.ptml").validate(&unit_with_body(imports, body))
    }

    #[test]
    fn assigned_names_resolve() {
        let violations = validate(&[], &["x = 1", "y = x + 1", "return y"]);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn undefined_reference_is_reported() {
        let violations = validate(&[], &["x = y + 1"]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("'y'"));
    }

    #[test]
    fn all_violations_collected_not_just_first() {
        let violations = validate(&[], &["a = missing_one", "b = missing_two"]);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn import_bound_names_resolve() {
        let violations = validate(
            &["from app.store import counter", "import math"],
            &["x = counter.total + math.pi"],
        );
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn import_aliases_bind() {
        assert_eq!(import_bound_names("import numpy as np"), vec!["np"]);
        assert_eq!(
            import_bound_names("from m import a, b as c"),
            vec!["a", "c"]
        );
        assert_eq!(import_bound_names("import a.b.c"), vec!["a"]);
    }

    #[test]
    fn lambda_params_do_not_leak_between_statements() {
        let violations = validate(&[], &["f = lambda item: item.name", "x = item"]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("'item'"));
    }

    #[test]
    fn comprehension_targets_are_statement_local() {
        let ok = validate(&[], &["xs = [1, 2]", "ys = [n * 2 for n in xs]"]);
        assert!(ok.is_empty(), "{:?}", ok);
        let bad = validate(&[], &["xs = [1, 2]", "ys = [n for n in xs]", "z = n"]);
        assert_eq!(bad.len(), 1);
    }

    #[test]
    fn props_param_and_keyword_args_are_not_references() {
        let violations = validate(
            &[],
            &["x = props.get('n', fallback=0)", "return x"],
        );
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn attribute_names_are_not_references() {
        let violations = validate(&[], &["x = 1", "y = x.missing_attr.deeper"]);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn def_params_are_visible_in_their_body() {
        let violations = validate(
            &[],
            &["def fmt(value):", "    return value * 2", "x = fmt(2)"],
        );
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn for_loop_targets_bind() {
        let violations = validate(&[], &["total = 0", "for a, b in pairs():", "    total = a + b"]);
        // `pairs` is undefined; a and b are fine.
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("'pairs'"));
    }

    #[test]
    fn fstring_interpolations_are_scanned() {
        let violations = validate(&[], &["x = f\"hello {who}\""]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("'who'"));
    }

    #[test]
    fn fstring_format_spec_is_not_code() {
        let violations = validate(&[], &["n = 3", "x = f\"{n:>10}\""]);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn multi_line_call_is_one_logical_line() {
        let violations = validate(
            &[],
            &["x = max(", "    1,", "    2,", ")"],
        );
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn augmented_assignment_binds() {
        let violations = validate(&[], &["x = 0", "x += 1", "return x"]);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn annotation_type_is_a_reference() {
        let violations = validate(&[], &["x: MissingType = 1"]);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("'MissingType'"));
    }
}
