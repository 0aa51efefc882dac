//! Block processing.
//!
//! Consumes the extracted [`SourceBlocks`] and produces a [`ComponentSpec`]:
//! component metadata, prop declarations, imports, body statements (with
//! their original lines), context bindings, and the style payload. The raw
//! template text is left for the template pipeline; inline template
//! fragments embedded in logic (`@t{ ... }` and `@: <tag ...>`) are expanded
//! here through the same pipeline and substituted back as expressions.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blocks::{dedent, Block, ContextBlock, SourceBlocks};
use crate::codegen::Generator;
use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropSpec {
    pub name: String,
    pub type_name: String,
    /// False when no `= literal` followed the type; the default is then
    /// the host language's null.
    pub has_default: bool,
    pub default: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyStatement {
    pub text: String,
    /// 1-based line in the original source.
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleBlock {
    pub language: String,
    pub scope: String,
    pub text: String,
    pub src: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBinding {
    pub context_ref: String,
    pub wrapper_name: String,
    pub values: Vec<(String, String)>,
    pub start_line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    pub name: String,
    pub is_page: bool,
    pub route_uri: Option<String>,
    /// Name of the props mapping parameter (the props block's name).
    pub props_param: String,
    pub props: Vec<PropSpec>,
    pub imports: Vec<String>,
    pub body: Vec<BodyStatement>,
    pub contexts: Vec<ContextBinding>,
    pub style: Option<StyleBlock>,
}

pub struct BlockProcessor<'a> {
    file: &'a str,
}

impl<'a> BlockProcessor<'a> {
    pub fn new(file: &'a str) -> Self {
        BlockProcessor { file }
    }

    pub fn process(
        &self,
        blocks: &SourceBlocks,
        generator: &mut Generator<'_>,
    ) -> Result<ComponentSpec, Diagnostic> {
        let (name, is_page, route_uri) = self.extract_metadata(blocks);
        let props_param = blocks
            .props
            .as_ref()
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| "props".to_string());
        let has_props_block = blocks.props.is_some();

        let mut spec = ComponentSpec {
            name,
            is_page,
            route_uri,
            props_param,
            props: Vec::new(),
            imports: Vec::new(),
            body: Vec::new(),
            contexts: Vec::new(),
            style: self.extract_style(blocks)?,
        };

        if let Some((_, block)) = &blocks.props {
            self.process_logic_block(block, &mut spec, has_props_block, generator)?;
        }
        if let Some(block) = &blocks.component {
            if !block.content.is_empty() {
                self.process_logic_block(block, &mut spec, has_props_block, generator)?;
            }
        }
        if let Some(block) = &blocks.page {
            if !block.content.is_empty() {
                self.process_logic_block(block, &mut spec, has_props_block, generator)?;
            }
        }
        for ctx in &blocks.contexts {
            spec.contexts.push(self.process_context_block(ctx)?);
        }
        Ok(spec)
    }

    fn extract_metadata(&self, blocks: &SourceBlocks) -> (String, bool, Option<String>) {
        if let Some(component) = &blocks.component {
            let name = strip_quotes(component.args.trim());
            let name = if name.is_empty() {
                "Component".to_string()
            } else {
                name
            };
            return (name, false, None);
        }
        let mut name = "Component".to_string();
        let mut route = None;
        if let Some(page) = &blocks.page {
            let parts: Vec<&str> = split_top_level_commas(&page.args);
            if let Some(uri) = parts.first() {
                // Kept verbatim (quotes included); emitted into the page
                // decorator as written.
                route = Some(uri.trim().to_string());
            }
            if let Some(n) = parts.get(1) {
                name = strip_quotes(n.trim());
            }
        }
        (name, true, route)
    }

    fn extract_style(&self, blocks: &SourceBlocks) -> Result<Option<StyleBlock>, Diagnostic> {
        let Some(style) = &blocks.style else {
            return Ok(None);
        };
        let args = parse_kwarg_string(&style.args);
        let get = |key: &str| args.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        Ok(Some(StyleBlock {
            language: get("lang").unwrap_or_else(|| "css".to_string()),
            scope: get("scope").unwrap_or_else(|| "scoped".to_string()),
            text: style.content.trim().to_string(),
            src: get("src").or_else(|| get("name")),
        }))
    }

    fn process_logic_block(
        &self,
        block: &Block,
        spec: &mut ComponentSpec,
        has_props_block: bool,
        generator: &mut Generator<'_>,
    ) -> Result<(), Diagnostic> {
        let content = self.expand_inline_templates(&block.content, block.start_line, generator)?;
        let content = dedent(&content);

        for (i, line) in content.split('\n').enumerate() {
            let stripped = line.trim();
            if stripped.is_empty() {
                continue;
            }
            let original_line = block.start_line + i as u32;

            if stripped.starts_with("from ") || stripped.starts_with("import ") {
                spec.imports.push(stripped.to_string());
            } else if let Some(decl) = stripped.strip_prefix("@prop ") {
                spec.props.push(self.parse_prop_line(decl, original_line)?);
            } else {
                self.push_body_line(line, spec, has_props_block, original_line)?;
            }
        }
        Ok(())
    }

    fn push_body_line(
        &self,
        line: &str,
        spec: &mut ComponentSpec,
        has_props_block: bool,
        original_line: u32,
    ) -> Result<(), Diagnostic> {
        let props_ref = format!("@{}", spec.props_param);

        if line.contains("@props") && spec.props_param != "props" {
            return Err(Diagnostic::syntax(
                format!(
                    "Cannot use @props when the props block is named @{}; use @{} instead",
                    spec.props_param, spec.props_param
                ),
                self.file,
                original_line,
            ));
        }
        if line.contains("@props") && !has_props_block {
            return Err(Diagnostic::syntax(
                "Cannot use @props when no props block is defined",
                self.file,
                original_line,
            ));
        }
        if !has_props_block {
            let word = Regex::new(&format!(r"\b{}\b", regex::escape(&spec.props_param)))
                .expect("props-param pattern is a valid regex");
            if word.is_match(line) {
                return Err(Diagnostic::syntax(
                    format!(
                        "Cannot access '{}' when no @{} block is defined",
                        spec.props_param, spec.props_param
                    ),
                    self.file,
                    original_line,
                )
                .with_excerpt(line.trim()));
            }
        }

        let rewritten = if has_props_block {
            line.replace(&props_ref, &spec.props_param)
        } else {
            line.to_string()
        };
        spec.body.push(BodyStatement {
            text: rewritten.trim_end().to_string(),
            line: original_line,
        });
        Ok(())
    }

    fn parse_prop_line(&self, decl: &str, line: u32) -> Result<PropSpec, Diagnostic> {
        let Some((name, rest)) = decl.split_once(':') else {
            return Err(Diagnostic::syntax(
                format!("Malformed @prop declaration: '{}'", decl.trim()),
                self.file,
                line,
            )
            .with_hint("expected '@prop name: type = default'"));
        };
        let name = name.trim();
        if name.is_empty() || !is_identifier(name) {
            return Err(Diagnostic::syntax(
                format!("Invalid prop name '{}'", name),
                self.file,
                line,
            ));
        }
        let (type_name, has_default, default) = match rest.split_once('=') {
            Some((ty, default)) => (ty.trim(), true, default.trim().to_string()),
            None => (rest.trim(), false, "None".to_string()),
        };
        if type_name.is_empty() {
            return Err(Diagnostic::syntax(
                format!("Missing type in @prop declaration for '{}'", name),
                self.file,
                line,
            ));
        }
        Ok(PropSpec {
            name: name.to_string(),
            type_name: type_name.to_string(),
            has_default,
            default,
        })
    }

    fn process_context_block(&self, ctx: &ContextBlock) -> Result<ContextBinding, Diagnostic> {
        if ctx.wrapper_name.is_empty() {
            return Err(Diagnostic::syntax(
                "Context block is missing an output variable name (e.g. @MyApp)",
                self.file,
                ctx.start_line,
            ));
        }
        if ctx.context_ref.is_empty() {
            return Err(Diagnostic::syntax(
                "Context block is missing the context argument (e.g. @context(ThemeContext))",
                self.file,
                ctx.start_line,
            ));
        }
        let mut values = Vec::new();
        for line in ctx.content.lines() {
            let stripped = line.trim();
            if let Some(decl) = stripped.strip_prefix("@value ") {
                if let Some((name, expr)) = decl.split_once('=') {
                    values.push((name.trim().to_string(), expr.trim().to_string()));
                }
            }
        }
        if values.is_empty() {
            return Err(Diagnostic::syntax(
                "Context block is missing a @value declaration",
                self.file,
                ctx.start_line,
            ));
        }
        Ok(ContextBinding {
            context_ref: ctx.context_ref.clone(),
            wrapper_name: ctx.wrapper_name.clone(),
            values,
            start_line: ctx.start_line,
        })
    }

    // ── Inline templates in logic ────────────────────────────────────────

    /// Expand `@t{ ... }` and `@: <tag ...>` fragments through the template
    /// pipeline, substituting the compiled expression back into the logic
    /// text. Recursion is bounded by the source size.
    fn expand_inline_templates(
        &self,
        content: &str,
        start_line: u32,
        generator: &mut Generator<'_>,
    ) -> Result<String, Diagnostic> {
        let chars: Vec<char> = content.chars().collect();
        let mut out = String::with_capacity(content.len());
        let mut pos = 0usize;

        while pos < chars.len() {
            if starts_with_at(&chars, pos, "@t{") {
                let line = start_line + line_of(&chars, pos);
                let open = pos + 2;
                let end = find_balanced_brace(&chars, open).ok_or_else(|| {
                    Diagnostic::syntax(
                        "Unclosed inline template block starting with @t{",
                        self.file,
                        line,
                    )
                })?;
                let inner: String = chars[open + 1..end].iter().collect();
                out.push_str(&generator.compile_fragment(&inner, line.saturating_sub(1))?);
                pos = end + 1;
            } else if starts_with_at(&chars, pos, "@:") {
                let line = start_line + line_of(&chars, pos);
                let mut cursor = pos + 2;
                while cursor < chars.len() && chars[cursor].is_whitespace() {
                    cursor += 1;
                }
                if cursor >= chars.len() || chars[cursor] != '<' {
                    // Not an inline tag after all; keep the text as-is.
                    out.push_str("@:");
                    pos += 2;
                    continue;
                }
                let end = find_inline_tag_end(&chars, cursor).ok_or_else(|| {
                    Diagnostic::syntax(
                        "Unclosed inline template tag starting with @:",
                        self.file,
                        line,
                    )
                })?;
                let inner: String = chars[cursor..end].iter().collect();
                out.push_str(&generator.compile_fragment(&inner, line.saturating_sub(1))?);
                pos = end;
            } else {
                out.push(chars[pos]);
                pos += 1;
            }
        }
        Ok(out)
    }
}

fn starts_with_at(chars: &[char], pos: usize, needle: &str) -> bool {
    needle
        .chars()
        .enumerate()
        .all(|(i, c)| chars.get(pos + i) == Some(&c))
}

fn line_of(chars: &[char], pos: usize) -> u32 {
    chars[..pos].iter().filter(|c| **c == '\n').count() as u32
}

/// Index of the brace closing the group that opens at `open`.
fn find_balanced_brace(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i];
        if let Some(quote) = in_string {
            if c == quote && chars.get(i.wrapping_sub(1)) != Some(&'\\') {
                in_string = None;
            }
        } else {
            match c {
                '"' | '\'' => in_string = Some(c),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// End (exclusive) of an inline `<tag ...>...</tag>` run starting at `<`.
/// Balances nested tags and skips strings, `@{}` expressions, and HTML
/// comments.
fn find_inline_tag_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if let Some(quote) = in_string {
            if c == quote && chars.get(i.wrapping_sub(1)) != Some(&'\\') {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' => {
                in_string = Some(c);
                i += 1;
            }
            '@' if chars.get(i + 1) == Some(&'{') => {
                let end = find_balanced_brace(chars, i + 1)?;
                i = end + 1;
            }
            '<' if starts_with_at(chars, i, "<!--") => {
                i += 4;
                while i < chars.len() && !starts_with_at(chars, i, "-->") {
                    i += 1;
                }
                if i >= chars.len() {
                    return None;
                }
                i += 3;
            }
            '<' if chars.get(i + 1) == Some(&'/') => {
                depth -= 1;
                while i < chars.len() && chars[i] != '>' {
                    i += 1;
                }
                if i >= chars.len() {
                    return None;
                }
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            '<' => {
                depth += 1;
                i += 1;
            }
            '>' if i > start && chars[i - 1] == '/' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Split on commas outside brackets and strings.
fn split_top_level_commas(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string: Option<u8> = None;
    let mut start = 0usize;
    let mut i = 0usize;
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
                b',' if depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    if start < s.len() || !parts.is_empty() {
        parts.push(&s[start..]);
    } else if !s.trim().is_empty() {
        parts.push(s);
    }
    parts
}

/// `key=value, key=value` argument strings, values unquoted.
fn parse_kwarg_string(s: &str) -> Vec<(String, String)> {
    lazy_static! {
        static ref UNQUOTE: Regex = Regex::new(r#"^["']|["']$"#).unwrap();
    }
    split_top_level_commas(s)
        .into_iter()
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            Some((
                key.trim().to_string(),
                UNQUOTE.replace_all(value.trim(), "").to_string(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockParser;
    use crate::diagnostics::DiagnosticKind;

    fn process(src: &str) -> Result<ComponentSpec, Diagnostic> {
        let blocks = BlockParser::new(src, "test.ptml").parse()?;
        let mut generator = Generator::new("test.ptml");
        BlockProcessor::new("test.ptml").process(&blocks, &mut generator)
    }

    #[test]
    fn component_metadata_and_props() {
        let spec = process(
            "@component(\"Counter\")\n@props {\n    @prop count: int = 0\n    @prop label: str\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert_eq!(spec.name, "Counter");
        assert!(!spec.is_page);
        assert_eq!(spec.props.len(), 2);
        assert_eq!(spec.props[0].name, "count");
        assert_eq!(spec.props[0].type_name, "int");
        assert!(spec.props[0].has_default);
        assert_eq!(spec.props[0].default, "0");
        assert!(!spec.props[1].has_default);
        assert_eq!(spec.props[1].default, "None");
    }

    #[test]
    fn page_metadata_with_route() {
        let spec = process("@page(\"/home\", \"Home\") @props {} @template { <div></div> }").unwrap();
        assert!(spec.is_page);
        assert_eq!(spec.route_uri.as_deref(), Some("\"/home\""));
        assert_eq!(spec.name, "Home");
    }

    #[test]
    fn imports_split_from_body_in_order() {
        let spec = process(
            "@component(\"C\")\n@props {\n    from app.store import counter\n    total = counter.total\n    import math\n    doubled = total * 2\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert_eq!(
            spec.imports,
            vec!["from app.store import counter", "import math"]
        );
        assert_eq!(spec.body.len(), 2);
        assert_eq!(spec.body[0].text, "total = counter.total");
        assert_eq!(spec.body[1].text, "doubled = total * 2");
    }

    #[test]
    fn body_lines_keep_original_line_numbers() {
        let spec = process(
            "@component(\"C\")\n@props {\n    x = 1\n\n    y = 2\n}\n@template { <div></div> }",
        )
        .unwrap();
        // Props block opens on line 2; content lines count from there.
        assert_eq!(spec.body[0].line, 3);
        assert_eq!(spec.body[1].line, 5);
    }

    #[test]
    fn malformed_prop_rejected() {
        let err = process("@component(\"C\") @props { @prop count } @template { <d></d> }")
            .unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("@prop"));
    }

    #[test]
    fn no_props_block_is_fine_when_unreferenced() {
        let spec = process("@component(\"C\")\n@template { <div></div> }").unwrap();
        assert_eq!(spec.props_param, "props");
        assert!(spec.props.is_empty());
    }

    #[test]
    fn props_reference_without_block_rejected() {
        let err = process(
            "@component(\"C\") {\n    x = props.get(\"n\")\n}\n@template { <div></div> }",
        )
        .unwrap_err();
        assert!(err.message.contains("props"));
    }

    #[test]
    fn props_param_reference_is_rewritten() {
        let spec = process(
            "@component(\"C\")\n@data {\n    @prop n: int = 0\n    total = @data.get('n')\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert_eq!(spec.props_param, "data");
        assert_eq!(spec.body[0].text, "total = data.get('n')");
    }

    #[test]
    fn inline_template_block_expands_to_expression() {
        let spec = process(
            "@component(\"C\")\n@props {\n    banner = @t{ <b>hi</b> }\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert!(spec.body[0].text.starts_with("banner = "));
        assert!(
            spec.body[0].text.contains("makeElement")
                || spec.body[0].text.contains("_static_")
        );
    }

    #[test]
    fn inline_tag_shorthand_expands() {
        let spec = process(
            "@component(\"C\")\n@props {\n    row = @: <li>item</li>\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert!(spec.body[0].text.starts_with("row = "));
        assert!(
            spec.body[0].text.contains("makeElement")
                || spec.body[0].text.contains("_static_")
        );
    }

    #[test]
    fn style_block_args_parsed() {
        let spec = process(
            "@component(\"C\") @props {} @style(lang=scss, scope=global) {\n.card { color: red; }\n} @template { <div></div> }",
        )
        .unwrap();
        let style = spec.style.unwrap();
        assert_eq!(style.language, "scss");
        assert_eq!(style.scope, "global");
        assert!(style.text.contains(".card"));
    }

    #[test]
    fn context_values_collected() {
        let spec = process(
            "@component(\"App\") @props {} <-- @context(ThemeContext) @MyApp {\n    @value theme = \"light\"\n}\n@template { <div></div> }",
        )
        .unwrap();
        assert_eq!(spec.contexts.len(), 1);
        assert_eq!(spec.contexts[0].context_ref, "ThemeContext");
        assert_eq!(spec.contexts[0].wrapper_name, "MyApp");
        assert_eq!(
            spec.contexts[0].values,
            vec![("theme".to_string(), "\"light\"".to_string())]
        );
    }

    #[test]
    fn context_without_value_rejected() {
        let err = process(
            "@component(\"App\") @props {} <-- @context(ThemeContext) @MyApp {\n}\n@template { <div></div> }",
        )
        .unwrap_err();
        assert!(err.message.contains("@value"));
    }
}
