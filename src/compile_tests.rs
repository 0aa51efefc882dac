//! End-to-end compiler tests: whole-pipeline behavior pinned against the
//! language contract, including golden checks for whitespace handling and
//! hoisting.

use crate::diagnostics::DiagnosticKind;
use crate::{compile, CompileOptions, CompileOutput};

fn compile_ok(source: &str) -> CompileOutput {
    compile(source, "test.ptml", &CompileOptions::default()).expect("compile should succeed")
}

fn compile_err(source: &str) -> crate::diagnostics::Diagnostic {
    compile(source, "test.ptml", &CompileOptions::default()).expect_err("compile should fail")
}

#[test]
fn determinism_identical_source_identical_bytes() {
    let source = "@component(\"Card\")\n@props {\n    @prop title: str = \"\"\n    items = [1, 2, 3]\n}\n@template {\n    <div class=\"card\" data-n=@{len(items)}>\n        <h1>@{title}</h1>\n        @foreach item in items { <li>@{item}</li> }\n    </div>\n}";
    let first = compile_ok(source);
    let second = compile_ok(source);
    assert_eq!(first.unit.source(), second.unit.source());
    assert_eq!(first.unit.content_hash(), second.unit.content_hash());
}

#[test]
fn hoisting_static_subtree_shared_not_rebuilt() {
    let source = "@component(\"C\")\n@template {\n    <section>\n        <div>static</div>\n        <div>static</div>\n        @{x}\n    </section>\n}\n@props {\n    x = 1\n}";
    let output = compile_ok(source);
    let text = output.unit.source();
    // Defined once, referenced twice.
    assert_eq!(text.matches("_static_0 = ").count(), 1);
    assert!(output.unit.constant_defs[0].contains("makeElement(\"div\", {}, [\"static\"])"));
    let return_line = text
        .lines()
        .find(|l| l.trim_start().starts_with("return "))
        .unwrap();
    assert_eq!(return_line.matches("_static_0").count(), 2);
    assert!(!return_line.contains("makeElement(\"div\", {}, [\"static\"])"));
}

#[test]
fn lazy_binding_dynamic_attr_is_deferred() {
    let source = "@component(\"C\")\n@props {\n    theme = \"dark\"\n}\n@template { <div class=@{theme}>x</div> }";
    let output = compile_ok(source);
    assert!(output
        .unit
        .source()
        .contains("\"class\": lambda: theme"));
}

#[test]
fn tag_mismatch_names_both_tags_and_line() {
    let source = "@component(\"C\")\n@template {\n    <div>x</span>\n}";
    let err = compile_err(source);
    assert_eq!(err.kind, DiagnosticKind::Syntax);
    assert!(err.message.contains("div"));
    assert!(err.message.contains("span"));
    assert_eq!(err.line, 3);
    assert_eq!(err.file, "test.ptml");
}

#[test]
fn prop_defaulting_compiles_extraction_prologue() {
    let source =
        "@component(\"C\") @props { @prop n: int = 0 } @template { <div>@{n}</div> }";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let text = output.unit.source();
    assert!(text.contains("def C(**props):"));
    assert!(text.contains("    n = props.get('n', 0)"));
    assert!(text.contains("@component(props={'n': (int, 0)})"));
    assert!(text.contains("return makeElement(\"div\", {}, [lambda: n])"));
}

#[test]
fn missing_else_is_legal() {
    let source = "@component(\"C\")\n@props {\n    x = 1\n}\n@template { @if{x>0}{<p>pos</p>} }";
    let output = compile_ok(source);
    let text = output.unit.source();
    assert!(text.contains("conditional(lambda: x>0, lambda: ["));
    assert!(text.contains(", None)"));
    assert!(text.contains("import conditional"));
}

#[test]
fn undefined_name_points_at_original_line() {
    let source = "@component(\"C\")\n@props {\n    x = y + 1\n}\n@template { <div>@{x}</div> }";
    let output = compile_ok(source);
    assert_eq!(output.diagnostics.len(), 1);
    let diagnostic = &output.diagnostics[0];
    assert_eq!(diagnostic.kind, DiagnosticKind::UndefinedName);
    assert!(diagnostic.message.contains("'y'"));
    assert_eq!(diagnostic.line, 3);
}

#[test]
fn undefined_name_in_template_expression_is_reported() {
    let source = "@component(\"C\")\n@template { <div>@{missing}</div> }";
    let output = compile_ok(source);
    assert_eq!(output.diagnostics.len(), 1);
    assert!(output.diagnostics[0].message.contains("'missing'"));
}

#[test]
fn props_are_in_scope_for_template_expressions() {
    let source = "@component(\"C\") @props { @prop user: str = \"\" } @template { <p>@{user}</p> }";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn foreach_item_and_index_are_in_scope() {
    let source = "@component(\"C\")\n@props {\n    todos = []\n}\n@template {\n    @foreach t, i in todos, key=t.id { <li>@{t.title} @{i}</li> }\n}";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let text = output.unit.source();
    assert!(text.contains("iterate(todos, lambda t: t.id, lambda t, i: ["));
    assert!(text.contains("import iterate"));
}

#[test]
fn switch_imports_select_first_and_unwrap() {
    let source = "@component(\"C\")\n@props {\n    status = \"on\"\n}\n@template {\n    @switch status { @match \"on\" { <p>on</p> } @fallback { <p>?</p> } }\n}";
    let output = compile_ok(source);
    let text = output.unit.source();
    assert!(text.contains("import selectFirst, unwrap"));
    assert!(text.contains("selectFirst([(lambda: unwrap(status) == unwrap(\"on\")"));
}

#[test]
fn directive_imports_absent_when_unused() {
    let source = "@component(\"C\")\n@template { <div>plain</div> }";
    let text = compile_ok(source).unit.source();
    assert!(!text.contains("import conditional"));
    assert!(!text.contains("import iterate"));
    assert!(!text.contains("import selectFirst"));
}

#[test]
fn elif_chain_nests_in_else_slot() {
    let source = "@component(\"C\")\n@props {\n    n = 0\n}\n@template {\n    @if n > 0 { <p>pos</p> } @elif n < 0 { <p>neg</p> } @else { <p>zero</p> }\n}";
    let text = compile_ok(source).unit.source();
    // Outer conditional's else thunk holds another conditional.
    assert!(text.contains("conditional(lambda: n > 0"));
    assert!(text.contains("lambda: [conditional(lambda: n < 0"));
}

#[test]
fn inline_template_in_logic_expands() {
    let source = "@component(\"C\")\n@props {\n    banner = @t{ <b>hello</b> }\n}\n@template { <div>@{banner}</div> }";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let statement = output
        .unit
        .function_def
        .iter()
        .find(|l| l.contains("banner = "))
        .unwrap();
    assert!(statement.contains("_static_") || statement.contains("makeElement"));
}

#[test]
fn context_bindings_wrap_in_declaration_order() {
    // Contexts reference imported names; imports live in the props block.
    let source = "@component(\"App\")\n@props {\n    from app.contexts import ThemeContext, DbContext\n}\n<-- @context(ThemeContext) @MyApp {\n    @value theme = \"light\"\n}\n<-- @context(DbContext) @self {\n    @value db = None\n}\n@template { <div></div> }";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let text = output.unit.source();
    assert!(text.contains(
        "MyApp = provideContext(ThemeContext, {\"theme\": \"light\"}, provideContext(DbContext, {\"db\": None}, App))"
    ));
}

#[test]
fn style_block_emits_constant_and_wraps_root() {
    let source = "@component(\"C\")\n@style(lang=css, scope=scoped) {\n.x { color: red; }\n}\n@template { <div></div> }";
    let text = compile_ok(source).unit.source();
    assert!(text.contains("_component_styles = loadStyle("));
    assert!(text.contains("lang=\"css\""));
    assert!(text.contains("scope=\"scoped\""));
    assert!(text.contains("return applyStyle("));
}

#[test]
fn page_route_flows_into_decorator() {
    let source = "@page(\"/dash\", \"Dashboard\")\n@template { <div></div> }";
    let output = compile_ok(source);
    assert!(output.spec.is_page);
    let text = output.unit.source();
    assert!(text.contains("@page(\"/dash\", props={})"));
    assert!(text.contains("def Dashboard(**props):"));
}

#[test]
fn invalid_runtime_path_is_compile_option_error() {
    let options = CompileOptions {
        runtime_module_path: "not a module!".to_string(),
        ..Default::default()
    };
    let err = compile("@component(\"C\") @template { <d></d> }", "t.ptml", &options)
        .expect_err("should fail");
    assert_eq!(err.kind, DiagnosticKind::CompileOption);
}

#[test]
fn runtime_module_path_option_is_honored() {
    let options = CompileOptions {
        runtime_module_path: "webapp.runtime".to_string(),
        ..Default::default()
    };
    let output = compile(
        "@component(\"C\") @template { <div></div> }",
        "t.ptml",
        &options,
    )
    .unwrap();
    assert!(output
        .unit
        .source()
        .starts_with("from webapp.runtime import makeElement"));
}

#[test]
fn emit_line_comments_option() {
    let options = CompileOptions {
        emit_line_comments: true,
        ..Default::default()
    };
    let source = "@component(\"C\")\n@props {\n    x = 1\n}\n@template { <div>@{x}</div> }";
    let output = compile(source, "c.ptml", &options).unwrap();
    assert!(output.unit.source().contains("x = 1  # c.ptml:3"));
}

#[test]
fn fragment_root_emits_list_without_wrapper() {
    let source = "@component(\"C\")\n@template { <>
        <p>a</p>
        <p>b</p>
    </> }";
    let text = compile_ok(source).unit.source();
    let return_line = text
        .lines()
        .find(|l| l.trim_start().starts_with("return "))
        .unwrap();
    assert!(return_line.trim_start().starts_with("return ["));
}

#[test]
fn golden_counter_component() {
    let source = "@component(\"Counter\")\n@props {\n    @prop start: int = 0\n    count = start\n}\n@template {\n    <div class=\"counter\">\n        <span>Count: @{count}</span>\n        @if count > 10 { <b>big</b> }\n    </div>\n}";
    let output = compile_ok(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let text = output.unit.source();
    let expected_fragments = [
        "from ptml.runtime import makeElement, invokeComponent, component, page, loadStyle, applyStyle, provideContext",
        "from ptml.runtime import conditional",
        "@component(props={'start': (int, 0)})",
        "def Counter(**props):",
        "    start = props.get('start', 0)",
        "    count = start",
        "makeElement(\"span\", {}, [\"Count: \", lambda: count])",
        "conditional(lambda: count > 10",
    ];
    for fragment in expected_fragments {
        assert!(text.contains(fragment), "missing {:?} in:\n{}", fragment, text);
    }
}

#[test]
fn line_map_survives_relocation_of_statements() {
    // Imports float to the top, shifting body statements in the generated
    // unit; the map still points home.
    let source = "@component(\"C\")\n@props {\n    a = 1\n    from os import path\n    b = undefined_name\n}\n@template { <div>@{a}@{b}</div> }";
    let output = compile_ok(source);
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].line, 5);
}
