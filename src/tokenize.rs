//! Template lexer.
//!
//! Scans the raw text of a `@template` block into a flat token stream. The
//! scanner has three explicit modes: TEXT (the default), TAG (between `<`
//! and `>`), and EXPRESSION (inside `@{ ... }`, brace depth tracked so
//! nested dict or set literals do not terminate the expression early).
//! Directives (`@if`, `@elif`, `@else`, `@foreach`, `@switch`, `@match`,
//! `@fallback`) are recognized at directive position and their header
//! expressions are emitted as expression-body tokens.
//!
//! Every token carries a 1-based line and column; syntax failures carry
//! the offending character context.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    TagOpenStart,  // <
    TagOpenEnd,    // >
    TagCloseStart, // </
    TagSelfClose,  // />
    TagName,
    AttrName,
    AttrEq,       // =
    AttrExprEq,   // :=
    AttrValue,    // quoted literal
    AttrSpread,   // @{...} inside a tag
    Text,
    ExprStart, // @{
    ExprBody,
    ExprEnd, // }
    DirectiveIf,
    DirectiveElif,
    DirectiveElse,
    DirectiveForeach,
    DirectiveSwitch,
    DirectiveMatch,
    DirectiveFallback,
    KeywordIn,
    KeywordKey,
    KeywordFallback,
    Arrow, // ->
    BlockOpen,
    BlockClose,
    FragmentOpen,  // <>
    FragmentClose, // </>
    Eof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

pub struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    line_start: usize,
    /// Added to every emitted line so diagnostics point into the original
    /// file rather than the extracted block.
    line_offset: u32,
    file: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &str, file: &'a str, line_offset: u32) -> Self {
        Tokenizer {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            line_start: 0,
            line_offset,
            file,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '<' => {
                    if self.lookahead("<!--") {
                        self.skip_until("-->", "Unterminated HTML comment")?;
                    } else if self.lookahead("</>") {
                        self.push(TokenKind::FragmentClose, "</>");
                        self.advance_n(3);
                    } else if self.lookahead("</") {
                        self.push(TokenKind::TagCloseStart, "</");
                        self.advance_n(2);
                        self.skip_whitespace();
                        self.read_identifier(TokenKind::TagName)?;
                        self.skip_whitespace();
                        if self.peek() == Some('>') {
                            self.push(TokenKind::TagOpenEnd, ">");
                            self.advance_n(1);
                        } else {
                            return Err(self.error("Unterminated closing tag"));
                        }
                    } else if self.lookahead("<>") {
                        self.push(TokenKind::FragmentOpen, "<>");
                        self.advance_n(2);
                    } else {
                        self.push(TokenKind::TagOpenStart, "<");
                        self.advance_n(1);
                        self.read_tag()?;
                    }
                }
                '{' => {
                    self.push(TokenKind::BlockOpen, "{");
                    self.advance_n(1);
                }
                '}' => {
                    self.push(TokenKind::BlockClose, "}");
                    self.advance_n(1);
                }
                '@' => {
                    if self.peek_at(1) == Some('{') {
                        self.read_expression()?;
                    } else {
                        self.read_directive()?;
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.skip_until("*/", "Unterminated comment")?;
                }
                '#' => self.skip_line_comment(),
                '-' if self.peek_at(1) == Some('>') => {
                    self.push(TokenKind::Arrow, "->");
                    self.advance_n(2);
                }
                _ => self.read_text(),
            }
        }
        self.push(TokenKind::Eof, "");
        Ok(self.tokens)
    }

    // ── TAG mode ─────────────────────────────────────────────────────────

    fn read_tag(&mut self) -> Result<(), Diagnostic> {
        self.read_identifier(TokenKind::TagName)?;
        loop {
            self.skip_whitespace();
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.error("Unterminated tag")),
            };
            match c {
                '>' => {
                    self.push(TokenKind::TagOpenEnd, ">");
                    self.advance_n(1);
                    return Ok(());
                }
                '/' if self.peek_at(1) == Some('>') => {
                    self.push(TokenKind::TagSelfClose, "/>");
                    self.advance_n(2);
                    return Ok(());
                }
                '@' if self.peek_at(1) == Some('{') => {
                    let body = self.read_braced_expression()?;
                    self.push(TokenKind::AttrSpread, &body);
                    continue;
                }
                _ => {}
            }

            if !(c.is_alphanumeric() || c == '_') {
                return Err(self.error(&format!("Unexpected character '{}' in tag content", c)));
            }
            self.read_identifier(TokenKind::AttrName)?;
            self.skip_whitespace();
            if self.lookahead(":=") {
                self.push(TokenKind::AttrExprEq, ":=");
                self.advance_n(2);
                self.skip_whitespace();
                self.read_bare_attr_expression()?;
            } else if self.peek() == Some('=') {
                self.push(TokenKind::AttrEq, "=");
                self.advance_n(1);
                self.skip_whitespace();
                self.read_attr_value()?;
            } else {
                // Boolean attribute: valid only when followed by the tag
                // end or the start of the next attribute.
                match self.peek() {
                    Some('>') => {}
                    Some('/') if self.peek_at(1) == Some('>') => {}
                    Some(c) if c.is_alphanumeric() || "-_:@".contains(c) => {}
                    Some(c) => {
                        return Err(self.error(&format!(
                            "Unexpected character '{}' in tag content",
                            c
                        )))
                    }
                    None => return Err(self.error("Unterminated tag")),
                }
            }
        }
    }

    fn read_attr_value(&mut self) -> Result<(), Diagnostic> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                let (line, col) = self.location();
                self.advance_n(1);
                let start = self.pos;
                while self.pos < self.chars.len() && self.chars[self.pos] != quote {
                    self.advance_n(1);
                }
                if self.pos >= self.chars.len() {
                    return Err(Diagnostic::syntax(
                        "Unterminated quoted attribute value",
                        self.file,
                        line + self.line_offset,
                    )
                    .with_column(col));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.tokens.push(Token {
                    kind: TokenKind::AttrValue,
                    text: value,
                    line: line + self.line_offset,
                    col,
                });
                self.advance_n(1);
                Ok(())
            }
            Some('@') if self.peek_at(1) == Some('{') => self.read_expression(),
            Some(c) => Err(self.error(&format!("Expected attribute value, found '{}'", c))),
            None => Err(self.error("Unterminated tag")),
        }
    }

    /// `name := expr` value: bare host expression up to whitespace or tag
    /// end, quotes respected.
    fn read_bare_attr_expression(&mut self) -> Result<(), Diagnostic> {
        let (line, col) = self.location();
        let start = self.pos;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(quote) = in_string {
                if c == quote && self.chars.get(self.pos.wrapping_sub(1)) != Some(&'\\') {
                    in_string = None;
                }
                self.advance_n(1);
                continue;
            }
            match c {
                '"' | '\'' => in_string = Some(c),
                '>' => break,
                '/' if self.peek_at(1) == Some('>') => break,
                c if c.is_whitespace() => break,
                _ => {}
            }
            self.advance_n(1);
        }
        if in_string.is_some() {
            return Err(self.error("Unterminated string in attribute expression"));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.is_empty() {
            return Err(self.error("Empty ':=' attribute expression"));
        }
        self.tokens.push(Token {
            kind: TokenKind::ExprBody,
            text,
            line: line + self.line_offset,
            col,
        });
        Ok(())
    }

    // ── EXPRESSION mode ──────────────────────────────────────────────────

    /// `@{ ... }` with brace-depth tracking: emits ExprStart/ExprBody/ExprEnd.
    fn read_expression(&mut self) -> Result<(), Diagnostic> {
        self.push(TokenKind::ExprStart, "@{");
        let body = self.read_braced_expression()?;
        let (line, col) = self.last_expr_location();
        self.tokens.push(Token {
            kind: TokenKind::ExprBody,
            text: body,
            line,
            col,
        });
        self.push(TokenKind::ExprEnd, "}");
        Ok(())
    }

    /// Consumes `@{ ... }` and returns the trimmed body. Nested literal
    /// braces (dict/set literals) and string contents do not terminate it.
    fn read_braced_expression(&mut self) -> Result<String, Diagnostic> {
        let (line, col) = self.location();
        self.advance_n(2); // @{
        let start = self.pos;
        let mut depth = 1i32;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(quote) = in_string {
                if c == quote && self.chars.get(self.pos.wrapping_sub(1)) != Some(&'\\') {
                    in_string = None;
                }
                self.advance_n(1);
                continue;
            }
            match c {
                '"' | '\'' => in_string = Some(c),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body: String = self.chars[start..self.pos].iter().collect();
                        self.advance_n(1);
                        return Ok(body.trim().to_string());
                    }
                }
                _ => {}
            }
            self.advance_n(1);
        }
        Err(
            Diagnostic::syntax("Unterminated '@{' expression", self.file, line + self.line_offset)
                .with_column(col)
                .with_excerpt(self.context_from(start.saturating_sub(2))),
        )
    }

    // ── Directives ───────────────────────────────────────────────────────

    fn read_directive(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        self.advance_n(1); // @
        while self.pos < self.chars.len() && self.chars[self.pos].is_alphabetic() {
            self.advance_n(1);
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "@if" => {
                self.push_at(start, TokenKind::DirectiveIf, &word);
                self.read_directive_header(true)?;
            }
            "@elif" => {
                self.push_at(start, TokenKind::DirectiveElif, &word);
                self.read_directive_header(true)?;
            }
            "@else" => self.push_at(start, TokenKind::DirectiveElse, &word),
            "@foreach" => {
                self.push_at(start, TokenKind::DirectiveForeach, &word);
                self.read_foreach_header()?;
            }
            "@switch" => {
                self.push_at(start, TokenKind::DirectiveSwitch, &word);
                self.read_directive_header(false)?;
            }
            "@match" => {
                self.push_at(start, TokenKind::DirectiveMatch, &word);
                self.read_directive_header(true)?;
            }
            "@fallback" => self.push_at(start, TokenKind::DirectiveFallback, &word),
            _ => {
                // Not a directive: emit the run as literal text.
                let (line, col) = self.location_at(start);
                self.tokens.push(Token {
                    kind: TokenKind::Text,
                    text: word,
                    line,
                    col,
                });
            }
        }
        Ok(())
    }

    /// Directive header expression: either `header {` (read up to the
    /// brace) or the braced form `@if{cond}{...}`, where the first balanced
    /// group is the header only if a second group follows. `required`
    /// rejects an empty header.
    fn read_directive_header(&mut self, required: bool) -> Result<(), Diagnostic> {
        self.skip_whitespace();
        let (line, col) = self.location();
        let header = if self.peek() == Some('{') {
            let saved = (self.pos, self.line, self.line_start);
            let group = self.read_balanced_braces()?;
            self.skip_whitespace();
            if self.peek() == Some('{') {
                group
            } else {
                // Single group: that was the body, not a header.
                (self.pos, self.line, self.line_start) = saved;
                String::new()
            }
        } else {
            let start = self.pos;
            let mut in_string: Option<char> = None;
            while self.pos < self.chars.len() {
                let c = self.chars[self.pos];
                if let Some(quote) = in_string {
                    if c == quote && self.chars.get(self.pos.wrapping_sub(1)) != Some(&'\\') {
                        in_string = None;
                    }
                } else if c == '"' || c == '\'' {
                    in_string = Some(c);
                } else if c == '{' {
                    break;
                }
                self.advance_n(1);
            }
            let text: String = self.chars[start..self.pos].iter().collect();
            text.trim().to_string()
        };
        if required && header.is_empty() {
            return Err(
                Diagnostic::syntax("Directive requires a condition", self.file, line + self.line_offset)
                    .with_column(col),
            );
        }
        if !header.is_empty() {
            self.tokens.push(Token {
                kind: TokenKind::ExprBody,
                text: header,
                line: line + self.line_offset,
                col,
            });
        }
        Ok(())
    }

    /// `@foreach item[, index] in iterable[, key=expr][, fallback=expr] {`
    fn read_foreach_header(&mut self) -> Result<(), Diagnostic> {
        self.skip_whitespace();
        let (line, col) = self.location();
        let start = self.pos;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(quote) = in_string {
                if c == quote && self.chars.get(self.pos.wrapping_sub(1)) != Some(&'\\') {
                    in_string = None;
                }
            } else if c == '"' || c == '\'' {
                in_string = Some(c);
            } else if c == '{' {
                break;
            }
            self.advance_n(1);
        }
        let header: String = self.chars[start..self.pos].iter().collect();
        let header = header.trim();

        let emit = |tokens: &mut Vec<Token>, kind: TokenKind, text: &str| {
            tokens.push(Token {
                kind,
                text: text.to_string(),
                line: line + self.line_offset,
                col,
            });
        };

        let Some((item_part, rest)) = split_once_top_level(header, " in ") else {
            if header.is_empty() {
                return Err(Diagnostic::syntax(
                    "@foreach requires 'item in iterable'",
                    self.file,
                    line + self.line_offset,
                )
                .with_column(col));
            }
            emit(&mut self.tokens, TokenKind::ExprBody, header);
            return Ok(());
        };

        emit(&mut self.tokens, TokenKind::ExprBody, item_part.trim());
        emit(&mut self.tokens, TokenKind::KeywordIn, "in");

        // Split the remainder on top-level commas that introduce a
        // key=/fallback= clause; commas inside calls, subscripts, and
        // strings belong to the iterable expression.
        let parts = split_foreach_clauses(rest);
        let iterable = parts
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Diagnostic::syntax(
                    "@foreach requires an iterable expression",
                    self.file,
                    line + self.line_offset,
                )
                .with_column(col)
            })?;
        emit(&mut self.tokens, TokenKind::ExprBody, iterable);

        for clause in parts.iter().skip(1) {
            let clause = clause.trim();
            if let Some(expr) = clause.strip_prefix("key=") {
                emit(&mut self.tokens, TokenKind::KeywordKey, "key");
                emit(&mut self.tokens, TokenKind::ExprBody, expr.trim());
            } else if let Some(expr) = clause.strip_prefix("fallback=") {
                emit(&mut self.tokens, TokenKind::KeywordFallback, "fallback");
                emit(&mut self.tokens, TokenKind::ExprBody, expr.trim());
            }
        }
        Ok(())
    }

    /// Balanced `{ ... }` group starting at the current `{`.
    fn read_balanced_braces(&mut self) -> Result<String, Diagnostic> {
        let (line, col) = self.location();
        let open = self.pos;
        let mut depth = 0i32;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(quote) = in_string {
                if c == quote && self.chars.get(self.pos.wrapping_sub(1)) != Some(&'\\') {
                    in_string = None;
                }
            } else {
                match c {
                    '"' | '\'' => in_string = Some(c),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            let inner: String = self.chars[open + 1..self.pos].iter().collect();
                            self.advance_n(1);
                            return Ok(inner.trim().to_string());
                        }
                    }
                    _ => {}
                }
            }
            self.advance_n(1);
        }
        Err(
            Diagnostic::syntax("Unterminated '{' group", self.file, line + self.line_offset)
                .with_column(col),
        )
    }

    // ── TEXT mode ────────────────────────────────────────────────────────

    fn read_text(&mut self) {
        let (line, col) = self.location();
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '<' || c == '@' || c == '{' || c == '}' || c == '#' {
                break;
            }
            if c == '-' && self.peek_at(1) == Some('>') {
                break;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                break;
            }
            self.advance_n(1);
        }
        let value: String = self.chars[start..self.pos].iter().collect();
        if !value.is_empty() {
            self.tokens.push(Token {
                kind: TokenKind::Text,
                text: value,
                line: line + self.line_offset,
                col,
            });
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn read_identifier(&mut self, kind: TokenKind) -> Result<(), Diagnostic> {
        let (line, col) = self.location();
        let start = self.pos;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == ':') {
                break;
            }
            if c == ':' && self.peek_at(1) == Some('=') {
                break;
            }
            self.advance_n(1);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token {
            kind,
            text,
            line: line + self.line_offset,
            col,
        });
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos] != '\n' {
            self.advance_n(1);
        }
    }

    fn skip_until(&mut self, terminator: &str, message: &str) -> Result<(), Diagnostic> {
        let (line, col) = self.location();
        while self.pos < self.chars.len() {
            if self.lookahead(terminator) {
                self.advance_n(terminator.chars().count());
                return Ok(());
            }
            self.advance_n(1);
        }
        Err(
            Diagnostic::syntax(message, self.file, line + self.line_offset).with_column(col),
        )
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.advance_n(1);
        }
    }

    fn lookahead(&self, s: &str) -> bool {
        let mut i = self.pos;
        for expected in s.chars() {
            if self.chars.get(i) != Some(&expected) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(&c) = self.chars.get(self.pos) {
                self.pos += 1;
                if c == '\n' {
                    self.line += 1;
                    self.line_start = self.pos;
                }
            }
        }
    }

    fn location(&self) -> (u32, u32) {
        (self.line, (self.pos - self.line_start) as u32 + 1)
    }

    fn location_at(&self, index: usize) -> (u32, u32) {
        // Recomputed from scratch; only used on cold paths.
        let line = self.chars[..index].iter().filter(|c| **c == '\n').count() as u32 + 1;
        let line_start = self.chars[..index]
            .iter()
            .rposition(|c| *c == '\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        (line + self.line_offset, (index - line_start) as u32 + 1)
    }

    fn last_expr_location(&self) -> (u32, u32) {
        self.tokens
            .last()
            .map(|t| (t.line, t.col))
            .unwrap_or((self.line + self.line_offset, 1))
    }

    fn context_from(&self, index: usize) -> String {
        let end = (index + 40).min(self.chars.len());
        self.chars[index..end].iter().collect()
    }

    fn push(&mut self, kind: TokenKind, text: &str) {
        let (line, col) = self.location();
        self.tokens.push(Token {
            kind,
            text: text.to_string(),
            line: line + self.line_offset,
            col,
        });
    }

    fn push_at(&mut self, index: usize, kind: TokenKind, text: &str) {
        let (line, col) = self.location_at(index);
        self.tokens.push(Token {
            kind,
            text: text.to_string(),
            line,
            col,
        });
    }

    fn error(&self, message: &str) -> Diagnostic {
        let (line, col) = self.location();
        Diagnostic::syntax(message, self.file, line + self.line_offset)
            .with_column(col)
            .with_excerpt(self.context_from(self.pos.saturating_sub(10)))
    }
}

/// Split `s` at the first occurrence of `sep` that sits outside brackets
/// and string literals.
fn split_once_top_level<'s>(s: &'s str, sep: &str) -> Option<(&'s str, &'s str)> {
    let bytes = s.as_bytes();
    let sep_bytes = sep.as_bytes();
    let mut depth = 0i32;
    let mut in_string: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
        } else {
            match b {
                b'"' | b'\'' => in_string = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                _ => {
                    if depth == 0 && bytes[i..].starts_with(sep_bytes) {
                        return Some((&s[..i], &s[i + sep.len()..]));
                    }
                }
            }
        }
        i += 1;
    }
    None
}

/// Split the post-`in` part of a foreach header on top-level commas, but
/// only where the next clause is `key=` or `fallback=`; other commas are
/// part of the iterable expression.
fn split_foreach_clauses(rest: &str) -> Vec<String> {
    let chars: Vec<char> = rest.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(quote) = in_string {
            if c == quote && !current.ends_with('\\') {
                in_string = None;
            }
            current.push(c);
        } else {
            match c {
                '"' | '\'' => {
                    in_string = Some(c);
                    current.push(c);
                }
                '(' | '[' | '{' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '}' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    let remaining: String = chars[i + 1..].iter().collect();
                    let remaining = remaining.trim_start().to_string();
                    if remaining.starts_with("key=") || remaining.starts_with("fallback=") {
                        parts.push(current.trim().to_string());
                        current = String::new();
                    } else {
                        current.push(c);
                    }
                }
                _ => current.push(c),
            }
        }
        i += 1;
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}
