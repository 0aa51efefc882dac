//! Unit assembly.
//!
//! Folds the processed [`ComponentSpec`], the generated root expression,
//! hoisted constants, and the style payload into one [`CompiledUnit`]. The
//! unit is held structurally (import lines, constant definitions, function
//! definition, line map) and serialized exactly once by [`CompiledUnit::source`];
//! the bundler persists that text and uses [`CompiledUnit::content_hash`]
//! to detect output determinism for caching.
//!
//! Layout of an emitted unit:
//!
//! ```text
//! from <runtime> import makeElement, invokeComponent, ...   # baseline
//! from <runtime> import conditional                         # only if used
//! <user imports, verbatim>
//!
//! _static_0 = makeElement(...)                              # hoisted
//! _component_styles = loadStyle(...)                        # if styled
//!
//! @component(props={'n': (int, 0)})
//! def Name(**props):
//!     n = props.get('n', 0)
//!     <body statements>
//!     return <root>
//! Wrapper = provideContext(Ref, {...}, Name)                # if contexts
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codegen::RuntimeFeatures;
use crate::component::ComponentSpec;
use crate::CompileOptions;

pub const RT_BASELINE: &[&str] = &[
    "makeElement",
    "invokeComponent",
    "component",
    "page",
    "loadStyle",
    "applyStyle",
    "provideContext",
];

pub const STYLE_CONST: &str = "_component_styles";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnit {
    pub import_lines: Vec<String>,
    pub constant_defs: Vec<String>,
    pub function_def: Vec<String>,
    /// `(generated_line, original_line)` for every emitted body statement,
    /// generated lines 1-based over [`CompiledUnit::source`].
    pub line_map: Vec<(u32, u32)>,
}

impl CompiledUnit {
    /// Serialize the unit once, deterministically.
    pub fn source(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();
        lines.extend(self.import_lines.iter().map(String::as_str));
        lines.push("");
        lines.extend(self.constant_defs.iter().map(String::as_str));
        lines.extend(self.function_def.iter().map(String::as_str));
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// SHA-256 of the serialized unit; byte-identical output hashes equal.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Original source line for a generated line, when one is mapped.
    pub fn original_line(&self, generated: u32) -> Option<u32> {
        self.line_map
            .iter()
            .find(|(g, _)| *g == generated)
            .map(|(_, o)| *o)
    }
}

pub struct Assembler<'a> {
    options: &'a CompileOptions,
    file: &'a str,
}

impl<'a> Assembler<'a> {
    pub fn new(options: &'a CompileOptions, file: &'a str) -> Self {
        Assembler { options, file }
    }

    pub fn assemble(
        &self,
        spec: &ComponentSpec,
        root_expr: &str,
        features: RuntimeFeatures,
        constants: &[(String, String)],
    ) -> CompiledUnit {
        let rt = &self.options.runtime_module_path;

        let mut import_lines = Vec::new();
        import_lines.push(format!("from {} import {}", rt, RT_BASELINE.join(", ")));
        if features.conditional {
            import_lines.push(format!("from {} import conditional", rt));
        }
        if features.iterate {
            import_lines.push(format!("from {} import iterate", rt));
        }
        if features.select_first {
            import_lines.push(format!("from {} import selectFirst, unwrap", rt));
        }
        import_lines.extend(spec.imports.iter().cloned());

        let mut constant_defs = Vec::new();
        for (name, code) in constants {
            constant_defs.push(format!("{} = {}", name, code));
        }
        if let Some(style) = &spec.style {
            let mut args = Vec::new();
            if !style.text.is_empty() {
                args.push(format!("\"\"\"{}\"\"\"", style.text));
            }
            if let Some(src) = &style.src {
                args.push(format!("src=\"{}\"", src));
            }
            args.push(format!("lang=\"{}\"", style.language));
            args.push(format!("scope=\"{}\"", style.scope));
            constant_defs.push(format!("{} = loadStyle({})", STYLE_CONST, args.join(", ")));
        }

        let mut function_def = Vec::new();
        let props_config: Vec<String> = spec
            .props
            .iter()
            .map(|p| format!("'{}': ({}, {})", p.name, p.type_name, p.default))
            .collect();
        let props_config = format!("{{{}}}", props_config.join(", "));
        if let Some(route) = &spec.route_uri {
            function_def.push(format!("@page({}, props={})", route, props_config));
        } else if spec.is_page {
            function_def.push(format!("@page(props={})", props_config));
        } else {
            function_def.push(format!("@component(props={})", props_config));
        }
        function_def.push(format!("def {}(**{}):", spec.name, spec.props_param));
        for prop in &spec.props {
            if prop.has_default {
                function_def.push(format!(
                    "    {} = {}.get('{}', {})",
                    prop.name, spec.props_param, prop.name, prop.default
                ));
            } else {
                function_def.push(format!(
                    "    {} = {}.get('{}')",
                    prop.name, spec.props_param, prop.name
                ));
            }
        }

        // Lines before the body: imports, one separator, constants, and
        // the function prologue emitted so far. Entries can themselves be
        // multi-line (triple-quoted style text), so count newlines.
        let count = |lines: &[String]| -> u32 {
            lines.iter().map(|l| 1 + l.matches('\n').count() as u32).sum()
        };
        let mut line_map = Vec::new();
        let mut generated_line = count(&import_lines) + 1 + count(&constant_defs) + count(&function_def);
        for statement in &spec.body {
            generated_line += 1;
            let text = if self.options.emit_line_comments {
                format!("    {}  # {}:{}", statement.text, self.file, statement.line)
            } else {
                format!("    {}", statement.text)
            };
            function_def.push(text);
            line_map.push((generated_line, statement.line));
        }

        if spec.style.is_some() {
            function_def.push(format!(
                "    return applyStyle({}, {})",
                root_expr, STYLE_CONST
            ));
        } else {
            function_def.push(format!("    return {}", root_expr));
        }

        // Context bindings wrap the callable in declaration order, first
        // binding outermost.
        if !spec.contexts.is_empty() {
            let mut child = spec.name.clone();
            for ctx in spec.contexts.iter().rev() {
                let values: Vec<String> = ctx
                    .values
                    .iter()
                    .map(|(name, expr)| format!("\"{}\": {}", name, expr))
                    .collect();
                child = format!(
                    "provideContext({}, {{{}}}, {})",
                    ctx.context_ref,
                    values.join(", "),
                    child
                );
            }
            let wrapper = &spec.contexts[0].wrapper_name;
            if wrapper != "self" {
                function_def.push(format!("{} = {}", wrapper, child));
            } else {
                function_def.push(format!("{} = {}", spec.name, child));
            }
        }

        CompiledUnit {
            import_lines,
            constant_defs,
            function_def,
            line_map,
        }
    }
}
