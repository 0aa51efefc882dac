//! Code generator.
//!
//! Maps the template AST onto the runtime call contract, producing a
//! structured [`OutputExpr`] tree that is serialized exactly once by the
//! assembler. Working on a tree instead of strings keeps generation
//! testable independent of formatting and makes hoisting a tree-level
//! transform.
//!
//! Emission contract:
//!
//! | AST node            | Emitted construct                                  |
//! |---------------------|----------------------------------------------------|
//! | Element (host)      | `makeElement(tag, attrsMap, childList)`            |
//! | Element (component) | `invokeComponent(Name, propsMap, childrenThunk)`   |
//! | Expression          | raw code, `lambda:`-wrapped as child/attr binding  |
//! | If                  | `conditional(cond, then, else-or-None)` thunks     |
//! | ForEach             | `iterate(iterable, key, itemThunk[, fallback=..])` |
//! | Switch              | `selectFirst([(when, body), ...], fallback)`       |
//! | Fragment            | ordered list literal, no wrapper                   |
//!
//! A subtree containing only host elements and text — no expression,
//! directive, or component anywhere — is hoisted: emitted once as a shared
//! module constant and referenced wherever it recurs in the unit. Hoisted
//! values are shared, so the runtime must never mutate them in place.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::diagnostics::Diagnostic;
use crate::parse::{
    AttrValue, ElementNode, ForEachFallback, ForEachNode, IfNode, Parser, SwitchNode,
    TemplateNode,
};
use crate::tokenize::Tokenizer;

pub const RT_MAKE_ELEMENT: &str = "makeElement";
pub const RT_INVOKE_COMPONENT: &str = "invokeComponent";
pub const RT_CONDITIONAL: &str = "conditional";
pub const RT_ITERATE: &str = "iterate";
pub const RT_SELECT_FIRST: &str = "selectFirst";
pub const RT_UNWRAP: &str = "unwrap";

/// Structured output expression, serialized once at the end of assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputExpr {
    /// Host-language expression text, emitted verbatim.
    Raw(String),
    /// Quoted string literal.
    Str(String),
    /// Interpolated string literal; content already in f-string form.
    FStr(String),
    /// `lambda: <expr>`
    Thunk(Box<OutputExpr>),
    /// `lambda a, b: <expr>`
    Lambda {
        params: Vec<String>,
        body: Box<OutputExpr>,
    },
    Call {
        func: String,
        args: Vec<OutputExpr>,
        kwargs: Vec<(String, OutputExpr)>,
    },
    /// `{**spread, "key": value}` — spreads first so explicit keys win.
    Dict {
        spreads: Vec<String>,
        entries: Vec<(String, OutputExpr)>,
    },
    List(Vec<OutputExpr>),
    Tuple(Vec<OutputExpr>),
    /// Reference to a hoisted module constant.
    ConstRef(String),
    None_,
}

impl OutputExpr {
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        match self {
            OutputExpr::Raw(code) => out.push_str(code),
            OutputExpr::Str(s) => {
                out.push('"');
                out.push_str(&escape_str(s));
                out.push('"');
            }
            OutputExpr::FStr(s) => {
                out.push_str("f\"");
                out.push_str(s);
                out.push('"');
            }
            OutputExpr::Thunk(body) => {
                out.push_str("lambda: ");
                body.write(out);
            }
            OutputExpr::Lambda { params, body } => {
                out.push_str("lambda ");
                out.push_str(&params.join(", "));
                out.push_str(": ");
                body.write(out);
            }
            OutputExpr::Call { func, args, kwargs } => {
                out.push_str(func);
                out.push('(');
                let mut first = true;
                for arg in args {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    arg.write(out);
                }
                for (name, value) in kwargs {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    out.push_str(name);
                    out.push('=');
                    value.write(out);
                }
                out.push(')');
            }
            OutputExpr::Dict { spreads, entries } => {
                out.push('{');
                let mut first = true;
                for spread in spreads {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    out.push_str("**");
                    out.push_str(spread);
                }
                for (key, value) in entries {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    out.push('"');
                    out.push_str(&escape_str(key));
                    out.push_str("\": ");
                    value.write(out);
                }
                out.push('}');
            }
            OutputExpr::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write(out);
                }
                out.push(']');
            }
            OutputExpr::Tuple(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write(out);
                }
                out.push(')');
            }
            OutputExpr::ConstRef(name) => out.push_str(name),
            OutputExpr::None_ => out.push_str("None"),
        }
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Runtime constructs actually used, driving the conditional import set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeFeatures {
    pub conditional: bool,
    pub iterate: bool,
    pub select_first: bool,
}

/// Hoisted-constant pool: identical static subtrees share one definition,
/// named in first-occurrence order for deterministic output.
#[derive(Debug, Default)]
pub struct ConstantPool {
    defs: Vec<(String, String)>,
    by_code: HashMap<String, usize>,
}

impl ConstantPool {
    fn intern(&mut self, code: String) -> String {
        if let Some(&i) = self.by_code.get(&code) {
            return self.defs[i].0.clone();
        }
        let name = format!("_static_{}", self.defs.len());
        self.by_code.insert(code.clone(), self.defs.len());
        self.defs.push((name.clone(), code));
        name
    }

    pub fn defs(&self) -> &[(String, String)] {
        &self.defs
    }
}

pub struct Generator<'a> {
    file: &'a str,
    pub pool: ConstantPool,
    pub features: RuntimeFeatures,
}

impl<'a> Generator<'a> {
    pub fn new(file: &'a str) -> Self {
        Generator {
            file,
            pool: ConstantPool::default(),
            features: RuntimeFeatures::default(),
        }
    }

    /// Tokenize, parse, and generate a template fragment, returning the
    /// serialized expression. Used for the `@template` block and for
    /// inline fragments embedded in logic or expressions; all share this
    /// generator's constant pool.
    pub fn compile_fragment(
        &mut self,
        text: &str,
        line_offset: u32,
    ) -> Result<String, Diagnostic> {
        let tokens = Tokenizer::new(text, self.file, line_offset).tokenize()?;
        let root = Parser::new(tokens, self.file).parse()?;
        let expr = self.generate(&root)?;
        Ok(expr.serialize())
    }

    /// Generate the output tree for a parsed template root.
    pub fn generate(&mut self, root: &TemplateNode) -> Result<OutputExpr, Diagnostic> {
        match root {
            TemplateNode::Fragment(f) if f.children.len() == 1 => {
                self.visit(&f.children[0])
            }
            other => self.visit(other),
        }
    }

    fn visit(&mut self, node: &TemplateNode) -> Result<OutputExpr, Diagnostic> {
        match node {
            TemplateNode::Element(el) => self.visit_element(el),
            TemplateNode::Text(t) => Ok(OutputExpr::Str(t.value.clone())),
            TemplateNode::Expression(e) => {
                if e.code.trim().is_empty() {
                    return Err(Diagnostic::syntax("Empty expression", self.file, e.line));
                }
                let code = self.transform_expression(&e.code)?;
                Ok(OutputExpr::Thunk(Box::new(OutputExpr::Raw(code))))
            }
            TemplateNode::If(node) => self.visit_if(node),
            TemplateNode::ForEach(node) => self.visit_foreach(node),
            TemplateNode::Switch(node) => self.visit_switch(node),
            TemplateNode::Fragment(f) => {
                let children = self.child_list(&f.children)?;
                Ok(children)
            }
        }
    }

    fn child_list(&mut self, children: &[TemplateNode]) -> Result<OutputExpr, Diagnostic> {
        let mut items = Vec::with_capacity(children.len());
        for child in children {
            items.push(self.visit(child)?);
        }
        Ok(OutputExpr::List(items))
    }

    // ── Elements ─────────────────────────────────────────────────────────

    fn visit_element(&mut self, el: &ElementNode) -> Result<OutputExpr, Diagnostic> {
        if el.is_component {
            return self.visit_component(el);
        }

        if is_static_subtree_element(el) {
            let expr = self.build_host_element(el)?;
            let name = self.pool.intern(expr.serialize());
            return Ok(OutputExpr::ConstRef(name));
        }
        self.build_host_element(el)
    }

    fn build_host_element(&mut self, el: &ElementNode) -> Result<OutputExpr, Diagnostic> {
        let mut entries = Vec::with_capacity(el.attrs.len());
        for (name, value) in &el.attrs {
            entries.push((name.clone(), self.attr_value(value)?));
        }
        let spreads = self.spread_exprs(&el.spreads)?;
        let children = self.child_list(&el.children)?;
        Ok(OutputExpr::Call {
            func: RT_MAKE_ELEMENT.to_string(),
            args: vec![
                OutputExpr::Str(el.tag.clone()),
                OutputExpr::Dict { spreads, entries },
                children,
            ],
            kwargs: Vec::new(),
        })
    }

    fn visit_component(&mut self, el: &ElementNode) -> Result<OutputExpr, Diagnostic> {
        let mut entries = Vec::with_capacity(el.attrs.len());
        for (name, value) in &el.attrs {
            entries.push((name.clone(), self.attr_value(value)?));
        }
        let spreads = self.spread_exprs(&el.spreads)?;
        let children = if el.children.is_empty() {
            OutputExpr::None_
        } else {
            OutputExpr::Thunk(Box::new(self.child_list(&el.children)?))
        };
        Ok(OutputExpr::Call {
            func: RT_INVOKE_COMPONENT.to_string(),
            args: vec![
                OutputExpr::Raw(el.tag.clone()),
                OutputExpr::Dict { spreads, entries },
                children,
            ],
            kwargs: Vec::new(),
        })
    }

    fn attr_value(&mut self, value: &AttrValue) -> Result<OutputExpr, Diagnostic> {
        match value {
            AttrValue::Static(s) if s.contains("@{") => {
                // Mixed literal/interpolation text becomes a lazy f-string.
                Ok(OutputExpr::Thunk(Box::new(OutputExpr::FStr(
                    to_fstring_body(s),
                ))))
            }
            AttrValue::Static(s) => Ok(OutputExpr::Str(s.clone())),
            AttrValue::Dynamic(code) => {
                if code.trim().is_empty() {
                    return Err(Diagnostic::syntax(
                        "Empty attribute expression",
                        self.file,
                        0,
                    ));
                }
                let code = self.transform_expression(code)?;
                Ok(OutputExpr::Thunk(Box::new(OutputExpr::Raw(code))))
            }
        }
    }

    fn spread_exprs(&mut self, spreads: &[String]) -> Result<Vec<String>, Diagnostic> {
        spreads
            .iter()
            .map(|s| {
                let s = s.trim();
                let s = s.strip_prefix("**").or_else(|| s.strip_prefix("...")).unwrap_or(s);
                let code = self.transform_expression(s.trim())?;
                Ok(code)
            })
            .collect()
    }

    // ── Directives ───────────────────────────────────────────────────────

    fn visit_if(&mut self, node: &IfNode) -> Result<OutputExpr, Diagnostic> {
        if node.condition.trim().is_empty() {
            return Err(Diagnostic::syntax(
                "@if requires a condition",
                self.file,
                node.line,
            ));
        }
        self.features.conditional = true;
        let condition = self.transform_expression(&node.condition)?;
        let then_list = self.child_list(&node.then_children)?;
        let else_expr = if node.else_children.is_empty() {
            OutputExpr::None_
        } else {
            OutputExpr::Thunk(Box::new(self.child_list(&node.else_children)?))
        };
        Ok(OutputExpr::Call {
            func: RT_CONDITIONAL.to_string(),
            args: vec![
                OutputExpr::Thunk(Box::new(OutputExpr::Raw(condition))),
                OutputExpr::Thunk(Box::new(then_list)),
                else_expr,
            ],
            kwargs: Vec::new(),
        })
    }

    fn visit_foreach(&mut self, node: &ForEachNode) -> Result<OutputExpr, Diagnostic> {
        if node.item_var.is_empty() || node.iterable.trim().is_empty() {
            return Err(Diagnostic::syntax(
                "@foreach requires 'item in iterable'",
                self.file,
                node.line,
            ));
        }
        self.features.iterate = true;
        let iterable = self.transform_expression(&node.iterable)?;
        // The key expression is evaluated per item, so it binds the item
        // variable.
        let key = match &node.key_expr {
            Some(expr) => OutputExpr::Lambda {
                params: vec![node.item_var.clone()],
                body: Box::new(OutputExpr::Raw(self.transform_expression(expr)?)),
            },
            None => OutputExpr::None_,
        };
        let index_var = node.index_var.clone().unwrap_or_else(|| "index".to_string());
        let body = self.child_list(&node.children)?;
        let item_thunk = OutputExpr::Lambda {
            params: vec![node.item_var.clone(), index_var],
            body: Box::new(body),
        };
        let mut kwargs = Vec::new();
        match &node.fallback {
            Some(ForEachFallback::Children(children)) => {
                let list = self.child_list(children)?;
                kwargs.push(("fallback".to_string(), OutputExpr::Thunk(Box::new(list))));
            }
            Some(ForEachFallback::Expr(expr)) => {
                let code = self.transform_expression(expr)?;
                kwargs.push(("fallback".to_string(), OutputExpr::Raw(code)));
            }
            None => {}
        }
        Ok(OutputExpr::Call {
            func: RT_ITERATE.to_string(),
            args: vec![OutputExpr::Raw(iterable), key, item_thunk],
            kwargs,
        })
    }

    fn visit_switch(&mut self, node: &SwitchNode) -> Result<OutputExpr, Diagnostic> {
        if node.cases.is_empty() {
            return Err(Diagnostic::syntax(
                "@switch requires at least one @match clause",
                self.file,
                node.line,
            ));
        }
        self.features.select_first = true;
        let subject = node
            .subject
            .as_deref()
            .map(|s| self.transform_expression(s))
            .transpose()?;
        let mut cases = Vec::with_capacity(node.cases.len());
        for case in &node.cases {
            let when_code = self.transform_expression(&case.when_expr)?;
            // With a subject the case tests equality; without one it tests
            // truthiness. Both sides unwrap so reactive values compare by
            // content.
            let when = match &subject {
                Some(subject) => format!(
                    "{}({}) == {}({})",
                    RT_UNWRAP, subject, RT_UNWRAP, when_code
                ),
                None => format!("{}({})", RT_UNWRAP, when_code),
            };
            let body = self.child_list(&case.children)?;
            cases.push(OutputExpr::Tuple(vec![
                OutputExpr::Thunk(Box::new(OutputExpr::Raw(when))),
                OutputExpr::Thunk(Box::new(body)),
            ]));
        }
        let fallback = match &node.fallback {
            Some(children) => OutputExpr::Thunk(Box::new(self.child_list(children)?)),
            None => OutputExpr::None_,
        };
        Ok(OutputExpr::Call {
            func: RT_SELECT_FIRST.to_string(),
            args: vec![OutputExpr::List(cases), fallback],
            kwargs: Vec::new(),
        })
    }

    // ── Host-expression conveniences ─────────────────────────────────────

    /// Rewrites arrow sugar (`(a, b) -> body` → `lambda a, b: body`) and
    /// compiles inline template fragments appearing inside an expression.
    pub fn transform_expression(&mut self, expr: &str) -> Result<String, Diagnostic> {
        let expr = expr.trim();

        // Parens wrapping the entire expression are transparent.
        if let Some(inner) = fully_parenthesized(expr) {
            let transformed = self.transform_expression(inner)?;
            if transformed != inner {
                return Ok(format!("({})", transformed));
            }
            return Ok(expr.to_string());
        }

        lazy_static! {
            static ref ARROW_RE: Regex =
                Regex::new(r"(?s)^\s*\(?\s*([^\)]*?)\s*\)?\s*->\s*(.+)$").unwrap();
            static ref LAMBDA_PREFIX_RE: Regex = Regex::new(r"(?s)^\s*(lambda[^:]*:)(.*)$").unwrap();
        }

        if expr.contains("->") {
            if let Some(caps) = ARROW_RE.captures(expr) {
                let params = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                let body = self.transform_expression(body)?;
                if params.is_empty() {
                    return Ok(format!("lambda: {}", body));
                }
                return Ok(format!("lambda {}: {}", params, body));
            }
        }

        // Inline template fragment inside an expression, possibly behind a
        // lambda prefix.
        if expr.contains('<') && expr.contains('>') {
            let (prefix, content) = match LAMBDA_PREFIX_RE.captures(expr) {
                Some(caps) => (
                    format!("{} ", &caps[1]),
                    caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
                ),
                None => (String::new(), expr.to_string()),
            };
            if content.trim().starts_with('<') {
                // A comparison like `a < b` never starts with '<'. If the
                // content still fails to parse as a template, or parses to
                // no actual element, keep the expression as written.
                if let Some(compiled) = self.try_compile_inline(content.trim()) {
                    return Ok(format!("{}{}", prefix, compiled));
                }
            }
        }

        Ok(expr.to_string())
    }

    fn try_compile_inline(&mut self, content: &str) -> Option<String> {
        let tokens = Tokenizer::new(content, self.file, 0).tokenize().ok()?;
        let root = Parser::new(tokens, self.file).parse().ok()?;
        let has_element = match &root {
            TemplateNode::Fragment(f) => f
                .children
                .iter()
                .any(|n| matches!(n, TemplateNode::Element(_))),
            TemplateNode::Element(_) => true,
            _ => false,
        };
        if !has_element {
            return None;
        }
        self.generate(&root).ok().map(|expr| expr.serialize())
    }
}

/// Strip `( ... )` only when the first paren matches the last.
fn fully_parenthesized(expr: &str) -> Option<&str> {
    if !(expr.starts_with('(') && expr.ends_with(')')) {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i < expr.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&expr[1..expr.len() - 1])
}

/// Convert mixed literal/`@{expr}` text into an f-string body:
/// literal braces are doubled, interpolations become `{expr}`.
fn to_fstring_body(s: &str) -> String {
    lazy_static! {
        static ref INTERP_RE: Regex = Regex::new(r"@\{\{(.*?)\}\}").unwrap();
    }
    let escaped = escape_str(s).replace('{', "{{").replace('}', "}}");
    INTERP_RE.replace_all(&escaped, "{$1}").to_string()
}

/// True when the subtree holds only host elements with static attrs and
/// text. Expressions, directives, components, spreads, and interpolated
/// attr values all disqualify it.
pub fn is_static_subtree(node: &TemplateNode) -> bool {
    match node {
        TemplateNode::Text(_) => true,
        TemplateNode::Element(el) => is_static_subtree_element(el),
        TemplateNode::Fragment(f) => f.children.iter().all(is_static_subtree),
        TemplateNode::Expression(_)
        | TemplateNode::If(_)
        | TemplateNode::ForEach(_)
        | TemplateNode::Switch(_) => false,
    }
}

fn is_static_subtree_element(el: &ElementNode) -> bool {
    !el.is_component
        && el.spreads.is_empty()
        && el.attrs.iter().all(|(_, v)| match v {
            AttrValue::Static(s) => !s.contains("@{"),
            AttrValue::Dynamic(_) => false,
        })
        && el.children.iter().all(is_static_subtree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(src: &str) -> (String, Generator<'static>) {
        let mut generator = Generator::new("test.ptml");
        let code = generator.compile_fragment(src, 0).unwrap();
        (code, generator)
    }

    #[test]
    fn static_element_is_hoisted() {
        let (code, generator) = generate("<div><span>static</span>@{count}</div>");
        // The inner static span is hoisted; the dynamic div is not.
        assert_eq!(generator.pool.defs().len(), 1);
        let (name, def) = &generator.pool.defs()[0];
        assert_eq!(name, "_static_0");
        assert!(def.contains("makeElement(\"span\""));
        assert!(code.contains("_static_0"));
        assert!(!code.contains("makeElement(\"span\""));
    }

    #[test]
    fn recurring_static_subtrees_share_one_constant() {
        let (code, generator) =
            generate("<div>@{x}<p>hi</p><p>hi</p></div>");
        assert_eq!(generator.pool.defs().len(), 1);
        assert_eq!(code.matches("_static_0").count(), 2);
    }

    #[test]
    fn dynamic_attr_is_lazily_bound() {
        let (code, _) = generate("<div class=@{theme}></div>");
        assert!(code.contains("\"class\": lambda: theme"));
    }

    #[test]
    fn mixed_attr_text_becomes_lazy_fstring() {
        let (code, _) = generate("<div class=\"btn @{theme}\"></div>");
        assert!(code.contains("\"class\": lambda: f\"btn {theme}\""));
    }

    #[test]
    fn if_maps_to_conditional_with_none_else() {
        let (code, generator) = generate("@if{x>0}{<p>pos</p>}");
        assert!(generator.features.conditional);
        assert!(code.starts_with("conditional(lambda: x>0, lambda: ["));
        assert!(code.ends_with(", None)"));
    }

    #[test]
    fn foreach_maps_to_iterate_with_item_and_index_params() {
        let (code, generator) = generate("@foreach item in items { <li>@{item}</li> }");
        assert!(generator.features.iterate);
        assert!(code.starts_with("iterate(items, None, lambda item, index: ["));
    }

    #[test]
    fn foreach_key_binds_item_var() {
        let (code, _) = generate("@foreach t, i in todos, key=t.id { <li>@{t}</li> }");
        assert!(code.contains("iterate(todos, lambda t: t.id, lambda t, i: ["));
    }

    #[test]
    fn switch_maps_to_select_first_with_unwrap() {
        let (code, generator) =
            generate("@switch status { @match \"on\" { <p>on</p> } @fallback { <p>?</p> } }");
        assert!(generator.features.select_first);
        assert!(code.starts_with("selectFirst(["));
        assert!(code.contains("unwrap(status) == unwrap(\"on\")"));
        assert!(code.contains("lambda: ["));
    }

    #[test]
    fn component_invocation_with_children_thunk() {
        let (code, _) = generate("<Card title=\"x\"><p>body</p></Card>");
        assert!(code.starts_with("invokeComponent(Card, {\"title\": \"x\"}, lambda: ["));
    }

    #[test]
    fn spreads_precede_explicit_attrs() {
        let (code, _) = generate("<div @{**rest} class=\"c\">@{x}</div>");
        assert!(code.contains("{**rest, \"class\": \"c\"}"));
    }

    #[test]
    fn arrow_sugar_rewrites_to_lambda() {
        let mut generator = Generator::new("test.ptml");
        assert_eq!(
            generator.transform_expression("(e) -> handle(e)").unwrap(),
            "lambda e: handle(e)"
        );
        assert_eq!(
            generator.transform_expression("x -> x + 1").unwrap(),
            "lambda x: x + 1"
        );
    }

    #[test]
    fn inline_fragment_in_expression_compiles() {
        let mut generator = Generator::new("test.ptml");
        let code = generator.transform_expression("<b>hi</b>").unwrap();
        assert!(code.contains("makeElement(\"b\"") || code.contains("_static_"));
    }

    #[test]
    fn text_with_newlines_is_escaped_verbatim() {
        let expr = OutputExpr::Str("a\nb".to_string());
        assert_eq!(expr.serialize(), "\"a\\nb\"");
    }

    #[test]
    fn deterministic_output() {
        let (first, _) = generate("<div id=@{a} class=\"c\"><p>x</p>@{y}</div>");
        let (second, _) = generate("<div id=@{a} class=\"c\"><p>x</p>@{y}</div>");
        assert_eq!(first, second);
    }
}
