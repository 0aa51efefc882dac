//! Recursive-descent template parser.
//!
//! Turns the token stream into a [`TemplateNode`] tree. The node type is a
//! closed tagged union matched exhaustively by the generator and validator,
//! so adding a node kind forces every consumer to be updated at compile
//! time.
//!
//! Dispatch is keyed on the current token kind: tag-open starts an element,
//! fragment-open a fragment, expr-start an interpolation, the directive
//! tokens their control-flow forms, and anything else is text.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::tokenize::{Token, TokenKind};

/// Attribute value: a static string literal or a host-language expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttrValue {
    Static(String),
    Dynamic(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Expression(ExpressionNode),
    If(IfNode),
    ForEach(ForEachNode),
    Switch(SwitchNode),
    Fragment(FragmentNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    /// Declaration order preserved; never a hash map.
    pub attrs: Vec<(String, AttrValue)>,
    /// Spread expressions (`@{**rest}`), merged into attrs at generation.
    pub spreads: Vec<String>,
    pub children: Vec<TemplateNode>,
    /// Uppercase-initial tags are component invocations.
    pub is_component: bool,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub code: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfNode {
    pub condition: String,
    pub then_children: Vec<TemplateNode>,
    /// Empty when no else clause; an `@elif` chain nests here as a single If.
    pub else_children: Vec<TemplateNode>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForEachNode {
    pub item_var: String,
    pub index_var: Option<String>,
    pub iterable: String,
    pub key_expr: Option<String>,
    pub children: Vec<TemplateNode>,
    pub fallback: Option<ForEachFallback>,
    pub line: u32,
}

/// Empty-iterable fallback: a template clause or a bare expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForEachFallback {
    Children(Vec<TemplateNode>),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchNode {
    pub subject: Option<String>,
    /// Ordered case list, evaluated first-match-wins.
    pub cases: Vec<SwitchCase>,
    pub fallback: Option<Vec<TemplateNode>>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCase {
    pub when_expr: String,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentNode {
    pub children: Vec<TemplateNode>,
}

pub fn is_component_tag(tag: &str) -> bool {
    tag.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, file: &'a str) -> Self {
        Parser {
            tokens,
            pos: 0,
            file,
        }
    }

    /// Parse the whole stream into a root [`FragmentNode`].
    pub fn parse(mut self) -> Result<TemplateNode, Diagnostic> {
        let mut children = Vec::new();
        while self.current().kind != TokenKind::Eof {
            match self.parse_node()? {
                Some(node) => children.push(node),
                None => break,
            }
        }
        drop_structural_whitespace(&mut children);
        Ok(TemplateNode::Fragment(FragmentNode { children }))
    }

    fn parse_node(&mut self) -> Result<Option<TemplateNode>, Diagnostic> {
        let token = self.current().clone();
        let node = match token.kind {
            TokenKind::TagOpenStart => Some(self.parse_element()?),
            TokenKind::FragmentOpen => Some(self.parse_fragment()?),
            TokenKind::ExprStart => Some(self.parse_expression()?),
            TokenKind::DirectiveIf => Some(self.parse_if()?),
            TokenKind::DirectiveForeach => Some(self.parse_foreach()?),
            TokenKind::DirectiveSwitch => Some(self.parse_switch()?),
            TokenKind::Text => {
                self.advance();
                Some(TemplateNode::Text(TextNode { value: token.text }))
            }
            // Stray structural characters outside their construct read as
            // literal text.
            TokenKind::Arrow
            | TokenKind::KeywordIn
            | TokenKind::KeywordKey
            | TokenKind::KeywordFallback => {
                self.advance();
                Some(TemplateNode::Text(TextNode { value: token.text }))
            }
            TokenKind::Eof => None,
            _ => {
                return Err(Diagnostic::syntax(
                    format!("Unexpected token '{}'", token.text),
                    self.file,
                    token.line,
                )
                .with_column(token.col))
            }
        };
        Ok(node)
    }

    // ── Elements and fragments ───────────────────────────────────────────

    fn parse_element(&mut self) -> Result<TemplateNode, Diagnostic> {
        let open = self.expect(TokenKind::TagOpenStart)?;
        let name_token = self.expect(TokenKind::TagName)?;
        let tag = name_token.text;
        if tag.is_empty() {
            return Err(Diagnostic::syntax("Missing tag name", self.file, open.line)
                .with_column(open.col));
        }

        let mut attrs: Vec<(String, AttrValue)> = Vec::new();
        let mut spreads: Vec<String> = Vec::new();
        loop {
            let token = self.current().clone();
            match token.kind {
                TokenKind::TagOpenEnd => {
                    self.advance();
                    break;
                }
                TokenKind::TagSelfClose => {
                    self.advance();
                    return Ok(self.finish_element(tag, attrs, spreads, Vec::new(), open.line));
                }
                TokenKind::AttrSpread => {
                    self.advance();
                    spreads.push(token.text);
                }
                TokenKind::AttrName => {
                    self.advance();
                    let value = self.parse_attr_value(&token)?;
                    attrs.push((token.text, value));
                }
                _ => {
                    return Err(Diagnostic::syntax(
                        format!("Unexpected token '{}' in <{}> tag", token.text, tag),
                        self.file,
                        token.line,
                    )
                    .with_column(token.col))
                }
            }
        }

        let mut children = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::TagCloseStart => {
                    self.advance();
                    let close_name = self.expect(TokenKind::TagName)?;
                    self.expect(TokenKind::TagOpenEnd)?;
                    if close_name.text != tag {
                        return Err(Diagnostic::syntax(
                            format!(
                                "Mismatched closing tag: expected </{}>, found </{}>",
                                tag, close_name.text
                            ),
                            self.file,
                            close_name.line,
                        )
                        .with_column(close_name.col));
                    }
                    break;
                }
                TokenKind::Eof => {
                    return Err(Diagnostic::syntax(
                        format!("Unclosed <{}> tag", tag),
                        self.file,
                        open.line,
                    )
                    .with_column(open.col))
                }
                _ => match self.parse_node()? {
                    Some(node) => children.push(node),
                    None => break,
                },
            }
        }
        drop_structural_whitespace(&mut children);
        Ok(self.finish_element(tag, attrs, spreads, children, open.line))
    }

    fn finish_element(
        &self,
        tag: String,
        attrs: Vec<(String, AttrValue)>,
        spreads: Vec<String>,
        children: Vec<TemplateNode>,
        line: u32,
    ) -> TemplateNode {
        let is_component = is_component_tag(&tag);
        TemplateNode::Element(ElementNode {
            tag,
            attrs,
            spreads,
            children,
            is_component,
            line,
        })
    }

    fn parse_attr_value(&mut self, name_token: &Token) -> Result<AttrValue, Diagnostic> {
        match self.current().kind {
            TokenKind::AttrEq => {
                self.advance();
                match self.current().kind {
                    TokenKind::AttrValue => {
                        let value = self.advance_owned();
                        Ok(AttrValue::Static(value.text))
                    }
                    TokenKind::ExprStart => {
                        let code = self.parse_expr_body()?;
                        Ok(AttrValue::Dynamic(code))
                    }
                    _ => {
                        let t = self.current();
                        Err(Diagnostic::syntax(
                            format!("Expected value for attribute '{}'", name_token.text),
                            self.file,
                            t.line,
                        )
                        .with_column(t.col))
                    }
                }
            }
            TokenKind::AttrExprEq => {
                self.advance();
                let body = self.expect(TokenKind::ExprBody)?;
                Ok(AttrValue::Dynamic(body.text))
            }
            // Boolean attribute.
            _ => Ok(AttrValue::Static("true".to_string())),
        }
    }

    fn parse_fragment(&mut self) -> Result<TemplateNode, Diagnostic> {
        let open = self.expect(TokenKind::FragmentOpen)?;
        let mut children = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::FragmentClose => {
                    self.advance();
                    break;
                }
                TokenKind::TagCloseStart => {
                    let t = self.current().clone();
                    return Err(Diagnostic::syntax(
                        "Mismatched fragment close: expected </>",
                        self.file,
                        t.line,
                    )
                    .with_column(t.col));
                }
                TokenKind::Eof => {
                    return Err(Diagnostic::syntax(
                        "Unclosed fragment",
                        self.file,
                        open.line,
                    )
                    .with_column(open.col))
                }
                _ => match self.parse_node()? {
                    Some(node) => children.push(node),
                    None => break,
                },
            }
        }
        drop_structural_whitespace(&mut children);
        Ok(TemplateNode::Fragment(FragmentNode { children }))
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<TemplateNode, Diagnostic> {
        let line = self.current().line;
        let code = self.parse_expr_body()?;
        Ok(TemplateNode::Expression(ExpressionNode { code, line }))
    }

    /// `ExprStart ExprBody ExprEnd` → the body text.
    fn parse_expr_body(&mut self) -> Result<String, Diagnostic> {
        self.expect(TokenKind::ExprStart)?;
        let body = self.expect(TokenKind::ExprBody)?;
        self.expect(TokenKind::ExprEnd)?;
        if body.text.is_empty() {
            return Err(Diagnostic::syntax(
                "Empty expression",
                self.file,
                body.line,
            )
            .with_column(body.col));
        }
        Ok(body.text)
    }

    // ── Directives ───────────────────────────────────────────────────────

    fn parse_if(&mut self) -> Result<TemplateNode, Diagnostic> {
        let directive = self.expect(TokenKind::DirectiveIf)?;
        let condition = self.expect(TokenKind::ExprBody)?.text;
        let then_children = self.parse_block()?;
        let else_children = self.parse_else_chain()?;
        Ok(TemplateNode::If(IfNode {
            condition,
            then_children,
            else_children,
            line: directive.line,
        }))
    }

    /// `@elif` chains desugar to a nested If in the else slot; a final
    /// `@else` supplies its children directly. No marker → empty.
    fn parse_else_chain(&mut self) -> Result<Vec<TemplateNode>, Diagnostic> {
        let saved = self.pos;
        // An else marker may be separated from the closing brace by
        // insignificant whitespace.
        while self.current().kind == TokenKind::Text && self.current().text.trim().is_empty() {
            self.advance();
        }
        match self.current().kind {
            TokenKind::DirectiveElif => {
                let directive = self.advance_owned();
                let condition = self.expect(TokenKind::ExprBody)?.text;
                let then_children = self.parse_block()?;
                let else_children = self.parse_else_chain()?;
                Ok(vec![TemplateNode::If(IfNode {
                    condition,
                    then_children,
                    else_children,
                    line: directive.line,
                })])
            }
            TokenKind::DirectiveElse => {
                self.advance();
                self.parse_block()
            }
            _ => {
                self.pos = saved;
                Ok(Vec::new())
            }
        }
    }

    fn parse_foreach(&mut self) -> Result<TemplateNode, Diagnostic> {
        let directive = self.expect(TokenKind::DirectiveForeach)?;
        let binding = self.expect(TokenKind::ExprBody)?;
        if self.current().kind != TokenKind::KeywordIn {
            return Err(Diagnostic::syntax(
                "@foreach requires 'item in iterable'",
                self.file,
                directive.line,
            )
            .with_column(directive.col));
        }
        self.advance();
        let iterable = self.expect(TokenKind::ExprBody)?.text;

        let (item_var, index_var) = match binding.text.split_once(',') {
            Some((item, index)) => (item.trim().to_string(), Some(index.trim().to_string())),
            None => (binding.text.trim().to_string(), None),
        };
        if item_var.is_empty() {
            return Err(Diagnostic::syntax(
                "@foreach requires an item variable",
                self.file,
                directive.line,
            )
            .with_column(directive.col));
        }

        let mut key_expr = None;
        let mut fallback = None;
        // Header clauses (`key=`, `fallback=`) arrive as keyword tokens
        // before the body block.
        loop {
            match self.current().kind {
                TokenKind::KeywordKey => {
                    self.advance();
                    key_expr = Some(self.expect(TokenKind::ExprBody)?.text);
                }
                TokenKind::KeywordFallback => {
                    self.advance();
                    fallback = Some(ForEachFallback::Expr(
                        self.expect(TokenKind::ExprBody)?.text,
                    ));
                }
                _ => break,
            }
        }

        let children = self.parse_block()?;

        // Trailing clause: `-> fallback { ... }`.
        let saved = self.pos;
        while self.current().kind == TokenKind::Text && self.current().text.trim().is_empty() {
            self.advance();
        }
        if self.current().kind == TokenKind::Arrow {
            self.advance();
            let is_fallback = self.current().kind == TokenKind::Text
                && self.current().text.trim() == "fallback";
            if is_fallback {
                self.advance();
                fallback = Some(ForEachFallback::Children(self.parse_block()?));
            } else {
                self.pos = saved;
            }
        } else {
            self.pos = saved;
        }

        Ok(TemplateNode::ForEach(ForEachNode {
            item_var,
            index_var,
            iterable,
            key_expr,
            children,
            fallback,
            line: directive.line,
        }))
    }

    fn parse_switch(&mut self) -> Result<TemplateNode, Diagnostic> {
        let directive = self.expect(TokenKind::DirectiveSwitch)?;
        let subject = if self.current().kind == TokenKind::ExprBody {
            Some(self.advance_owned().text)
        } else {
            None
        };

        while self.current().kind == TokenKind::Text && self.current().text.trim().is_empty() {
            self.advance();
        }
        self.expect(TokenKind::BlockOpen)?;
        let mut cases = Vec::new();
        let mut fallback = None;
        loop {
            match self.current().kind {
                TokenKind::DirectiveMatch => {
                    self.advance();
                    let when_expr = self.expect(TokenKind::ExprBody)?.text;
                    let children = self.parse_block()?;
                    cases.push(SwitchCase {
                        when_expr,
                        children,
                    });
                }
                TokenKind::DirectiveFallback => {
                    self.advance();
                    fallback = Some(self.parse_block()?);
                }
                TokenKind::Text if self.current().text.trim().is_empty() => {
                    self.advance();
                }
                TokenKind::BlockClose => {
                    self.advance();
                    break;
                }
                _ => {
                    let t = self.current();
                    return Err(Diagnostic::syntax(
                        "@switch body may only contain @match and @fallback clauses",
                        self.file,
                        t.line,
                    )
                    .with_column(t.col));
                }
            }
        }
        if cases.is_empty() {
            return Err(Diagnostic::syntax(
                "@switch requires at least one @match clause",
                self.file,
                directive.line,
            )
            .with_column(directive.col));
        }
        Ok(TemplateNode::Switch(SwitchNode {
            subject,
            cases,
            fallback,
            line: directive.line,
        }))
    }

    /// `{ children }` for a directive clause.
    fn parse_block(&mut self) -> Result<Vec<TemplateNode>, Diagnostic> {
        // Whitespace between a directive header and its block is
        // insignificant.
        while self.current().kind == TokenKind::Text && self.current().text.trim().is_empty() {
            self.advance();
        }
        self.expect(TokenKind::BlockOpen)?;
        let mut children = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::BlockClose => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    let t = self.current();
                    return Err(Diagnostic::syntax(
                        "Unterminated directive block",
                        self.file,
                        t.line,
                    )
                    .with_column(t.col));
                }
                _ => match self.parse_node()? {
                    Some(node) => children.push(node),
                    None => break,
                },
            }
        }
        drop_structural_whitespace(&mut children);
        Ok(children)
    }

    // ── Token plumbing ───────────────────────────────────────────────────

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with EOF"))
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn advance_owned(&mut self) -> Token {
        let token = self.current().clone();
        self.advance();
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        let token = self.current().clone();
        if token.kind != kind {
            return Err(Diagnostic::syntax(
                format!("Expected {:?}, found '{}'", kind, token.text),
                self.file,
                token.line,
            )
            .with_column(token.col));
        }
        self.advance();
        Ok(token)
    }
}

/// Whitespace policy: a text run consisting solely of whitespace is dropped
/// when its neighbors (including the enclosing tag boundaries) are
/// structural nodes; it is preserved when either neighbor is text or an
/// interpolated expression.
fn drop_structural_whitespace(children: &mut Vec<TemplateNode>) {
    let inline = |node: Option<&TemplateNode>| {
        matches!(
            node,
            Some(TemplateNode::Text(_)) | Some(TemplateNode::Expression(_))
        )
    };
    let keep: Vec<bool> = children
        .iter()
        .enumerate()
        .map(|(i, node)| match node {
            TemplateNode::Text(t) if t.value.trim().is_empty() => {
                let prev = if i > 0 { children.get(i - 1) } else { None };
                inline(prev) || inline(children.get(i + 1))
            }
            _ => true,
        })
        .collect();
    let mut iter = keep.iter();
    children.retain(|_| *iter.next().expect("keep mask matches children"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::tokenize::Tokenizer;

    fn parse(src: &str) -> Result<TemplateNode, Diagnostic> {
        let tokens = Tokenizer::new(src, "test.ptml", 0).tokenize()?;
        Parser::new(tokens, "test.ptml").parse()
    }

    fn root_children(src: &str) -> Vec<TemplateNode> {
        match parse(src).unwrap() {
            TemplateNode::Fragment(f) => f.children,
            other => panic!("expected root fragment, got {:?}", other),
        }
    }

    #[test]
    fn element_with_children_and_attrs() {
        let children = root_children("<div class=\"card\" id=@{uid}>hi <b>there</b></div>");
        let TemplateNode::Element(div) = &children[0] else {
            panic!("expected element");
        };
        assert_eq!(div.tag, "div");
        assert!(!div.is_component);
        assert_eq!(div.attrs[0], ("class".into(), AttrValue::Static("card".into())));
        assert_eq!(div.attrs[1], ("id".into(), AttrValue::Dynamic("uid".into())));
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn component_tag_detected_by_case() {
        let children = root_children("<Card title=\"x\"/>");
        let TemplateNode::Element(card) = &children[0] else {
            panic!("expected element");
        };
        assert!(card.is_component);
    }

    #[test]
    fn mismatched_close_names_both_tags_and_line() {
        let err = parse("<div>\n  x\n</span>").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("div"));
        assert!(err.message.contains("span"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn if_without_else_has_empty_else_children() {
        let children = root_children("@if{x>0}{<p>pos</p>}");
        let TemplateNode::If(node) = &children[0] else {
            panic!("expected if");
        };
        assert_eq!(node.condition, "x>0");
        assert_eq!(node.then_children.len(), 1);
        assert!(node.else_children.is_empty());
    }

    #[test]
    fn elif_desugars_to_nested_if() {
        let children =
            root_children("@if a { <p>a</p> } @elif b { <p>b</p> } @else { <p>c</p> }");
        let TemplateNode::If(outer) = &children[0] else {
            panic!("expected if");
        };
        assert_eq!(outer.condition, "a");
        let TemplateNode::If(inner) = &outer.else_children[0] else {
            panic!("expected nested if");
        };
        assert_eq!(inner.condition, "b");
        assert_eq!(inner.else_children.len(), 1);
    }

    #[test]
    fn foreach_full_header_and_trailing_fallback() {
        let children = root_children(
            "@foreach item, i in items, key=item.id { <li>@{item}</li> } -> fallback { <p>empty</p> }",
        );
        let TemplateNode::ForEach(node) = &children[0] else {
            panic!("expected foreach");
        };
        assert_eq!(node.item_var, "item");
        assert_eq!(node.index_var.as_deref(), Some("i"));
        assert_eq!(node.iterable, "items");
        assert_eq!(node.key_expr.as_deref(), Some("item.id"));
        assert!(matches!(
            node.fallback,
            Some(ForEachFallback::Children(ref c)) if c.len() == 1
        ));
    }

    #[test]
    fn switch_collects_ordered_cases_and_fallback() {
        let children = root_children(
            "@switch status { @match \"on\" { <p>on</p> } @match \"off\" { <p>off</p> } @fallback { <p>?</p> } }",
        );
        let TemplateNode::Switch(node) = &children[0] else {
            panic!("expected switch");
        };
        assert_eq!(node.subject.as_deref(), Some("status"));
        assert_eq!(node.cases.len(), 2);
        assert_eq!(node.cases[0].when_expr, "\"on\"");
        assert!(node.fallback.is_some());
    }

    #[test]
    fn switch_without_subject() {
        let children = root_children("@switch { @match a > 1 { <p>big</p> } }");
        let TemplateNode::Switch(node) = &children[0] else {
            panic!("expected switch");
        };
        assert!(node.subject.is_none());
        assert_eq!(node.cases[0].when_expr, "a > 1");
    }

    #[test]
    fn whitespace_between_tags_is_dropped() {
        let children = root_children("<div>\n  <p>a</p>\n  <p>b</p>\n</div>");
        let TemplateNode::Element(div) = &children[0] else {
            panic!("expected element");
        };
        assert_eq!(div.children.len(), 2);
        assert!(matches!(div.children[0], TemplateNode::Element(_)));
    }

    #[test]
    fn whitespace_next_to_inline_content_is_preserved() {
        let children = root_children("<p><b>a</b> @{x}</p>");
        let TemplateNode::Element(p) = &children[0] else {
            panic!("expected element");
        };
        assert_eq!(p.children.len(), 3);
        assert!(matches!(&p.children[1], TemplateNode::Text(t) if t.value == " "));
    }

    #[test]
    fn mismatched_fragment_close_rejected() {
        let err = parse("<>x</div>").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Syntax);
        assert!(err.message.contains("fragment"));
    }

    #[test]
    fn unclosed_tag_rejected_at_open_line() {
        let err = parse("<div><p>x</p>").unwrap_err();
        assert!(err.message.contains("div"));
        assert_eq!(err.line, 1);
    }
}
