//! Top-level block extraction.
//!
//! A PTML source file is a sequence of `@kind(args) { content }` blocks:
//! one `@component` or `@page`, one `@template`, optionally one `@style`,
//! optionally one props block (any non-reserved name, conventionally
//! `@props`), and zero or more context-wrapper blocks of the form
//! `<-- @context(Ref) @Wrapper { ... }`.
//!
//! The scanner matches braces while respecting string literals, escaped
//! braces, and nested directive sub-blocks, so `@template { @if x { } }`
//! extracts as one block.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;

pub const KIND_COMPONENT: &str = "component";
pub const KIND_PAGE: &str = "page";
pub const KIND_TEMPLATE: &str = "template";
pub const KIND_STYLE: &str = "style";
pub const KIND_CONTEXT: &str = "context";

/// One extracted top-level block, content still raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Raw argument text, parens stripped. Empty when the block had none.
    pub args: String,
    pub content: String,
    /// 1-based line of the opening brace.
    pub start_line: u32,
}

/// A context-wrapper block: `<-- @context(Ref) @Wrapper { @value k = v }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBlock {
    pub context_ref: String,
    pub wrapper_name: String,
    pub content: String,
    pub start_line: u32,
}

/// All blocks of one source file, one slot per kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBlocks {
    pub component: Option<Block>,
    pub page: Option<Block>,
    /// The props block together with its user-chosen name.
    pub props: Option<(String, Block)>,
    pub template: Option<Block>,
    pub style: Option<Block>,
    pub contexts: Vec<ContextBlock>,
}

pub struct BlockParser<'a> {
    chars: Vec<char>,
    pos: usize,
    file: &'a str,
}

impl<'a> BlockParser<'a> {
    pub fn new(source: &str, file: &'a str) -> Self {
        BlockParser {
            chars: source.chars().collect(),
            pos: 0,
            file,
        }
    }

    pub fn parse(mut self) -> Result<SourceBlocks, Diagnostic> {
        let mut blocks = SourceBlocks::default();
        let mut last_block_end = 0usize;

        while let Some(at_index) = self.find_next('@') {
            self.pos = at_index + 1;
            let name = self.read_identifier();
            if name.is_empty() {
                continue;
            }

            if name == KIND_CONTEXT {
                // The wrapper form requires a `<-` marker between the
                // previous block and `@context`.
                let preceding: String = self.chars[last_block_end..at_index].iter().collect();
                if !preceding.contains("<-") {
                    return Err(Diagnostic::syntax(
                        "Context block must be preceded by '<-'",
                        self.file,
                        self.line_at(at_index),
                    ));
                }
            }

            self.skip_whitespace();
            let args = self.read_paren_args(at_index)?;
            self.skip_whitespace();

            // `@context(Ref) @Wrapper { ... }` names its output variable.
            let mut wrapper_name = String::new();
            if name == KIND_CONTEXT && self.peek() == Some('@') {
                self.pos += 1;
                wrapper_name = self.read_identifier();
                self.skip_whitespace();
            }

            let block = if self.peek() == Some('{') {
                let brace_pos = self.pos;
                let start_line = self.line_at(brace_pos);
                let content = self.read_braced_content(brace_pos)?;
                last_block_end = self.pos;
                Block {
                    args,
                    content,
                    start_line,
                }
            } else if name == KIND_COMPONENT || name == KIND_PAGE {
                // `@component("Card")` with no body is the common form;
                // metadata lives entirely in the arguments.
                last_block_end = self.pos;
                Block {
                    args,
                    content: String::new(),
                    start_line: self.line_at(at_index),
                }
            } else {
                // An `@` without a block body here is template or
                // expression syntax owned by a later phase, not a block.
                continue;
            };
            let start_line = block.start_line;

            match name.as_str() {
                KIND_COMPONENT => blocks.component = Some(block),
                KIND_PAGE => blocks.page = Some(block),
                KIND_TEMPLATE => blocks.template = Some(block),
                KIND_STYLE => blocks.style = Some(block),
                KIND_CONTEXT => blocks.contexts.push(ContextBlock {
                    context_ref: block.args.clone(),
                    wrapper_name,
                    content: block.content,
                    start_line: block.start_line,
                }),
                other => {
                    // First non-reserved block is the props block; its name
                    // becomes the props parameter.
                    if blocks.props.is_none() {
                        blocks.props = Some((other.to_string(), block));
                    } else {
                        return Err(Diagnostic::syntax(
                            format!("Unknown block kind '@{}'", other),
                            self.file,
                            start_line,
                        ));
                    }
                }
            }
        }

        self.check_structure(&blocks)?;
        Ok(blocks)
    }

    fn check_structure(&self, blocks: &SourceBlocks) -> Result<(), Diagnostic> {
        if blocks.component.is_some() && blocks.page.is_some() {
            return Err(Diagnostic::structural(
                "A file cannot contain both @component and @page blocks",
                self.file,
                blocks.page.as_ref().map(|b| b.start_line).unwrap_or(0),
            ));
        }
        if blocks.component.is_none() && blocks.page.is_none() {
            return Err(Diagnostic::structural(
                "File must contain either a @component or @page block",
                self.file,
                0,
            ));
        }
        if blocks.template.is_none() {
            return Err(Diagnostic::structural(
                "File must contain a @template block",
                self.file,
                0,
            ));
        }
        Ok(())
    }

    /// Balanced `( ... )` group after a block name, outer parens stripped.
    fn read_paren_args(&mut self, at_index: usize) -> Result<String, Diagnostic> {
        if self.peek() != Some('(') {
            return Ok(String::new());
        }
        let open = self.pos;
        let mut depth = 0i32;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if let Some(quote) = in_string {
                if c == quote && self.chars.get(self.pos - 1) != Some(&'\\') {
                    in_string = None;
                }
            } else {
                match c {
                    '"' | '\'' => in_string = Some(c),
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            self.pos += 1;
                            let inner: String =
                                self.chars[open + 1..self.pos - 1].iter().collect();
                            return Ok(inner.trim().to_string());
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Err(Diagnostic::syntax(
            "Unterminated '(' in block arguments",
            self.file,
            self.line_at(at_index),
        ))
    }

    /// Balanced `{ ... }` body, honoring string literals, `\{`/`\}`
    /// escapes, and nested braces from directive sub-blocks.
    fn read_braced_content(&mut self, brace_pos: usize) -> Result<String, Diagnostic> {
        let mut depth = 0i32;
        let mut in_string: Option<char> = None;
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            if c == '\\' && self.pos + 1 < self.chars.len() {
                self.pos += 2;
                continue;
            }
            if let Some(quote) = in_string {
                if c == quote {
                    in_string = None;
                }
            } else {
                match c {
                    '"' | '\'' => in_string = Some(c),
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            self.pos += 1;
                            let inner: String =
                                self.chars[brace_pos + 1..self.pos - 1].iter().collect();
                            return Ok(inner);
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Err(Diagnostic::syntax(
            "Unterminated '{' in block body",
            self.file,
            self.line_at(brace_pos),
        ))
    }

    fn find_next(&self, target: char) -> Option<usize> {
        self.chars[self.pos..]
            .iter()
            .position(|c| *c == target)
            .map(|offset| self.pos + offset)
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos].is_alphanumeric() {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn line_at(&self, char_index: usize) -> u32 {
        self.chars[..char_index.min(self.chars.len())]
            .iter()
            .filter(|c| **c == '\n')
            .count() as u32
            + 1
    }
}

/// Strip the common leading indentation from block content, so logic
/// written indented inside `@component { ... }` emits flush-left.
pub fn dedent(content: &str) -> String {
    let mut min_indent: Option<usize> = None;
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        min_indent = Some(min_indent.map_or(indent, |m: usize| m.min(indent)));
    }
    let cut = min_indent.unwrap_or(0);
    content
        .lines()
        .map(|line| line.get(cut..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
