//! # PTML Compiler
//!
//! Compiles PTML component sources — metadata blocks, an HTML-like
//! template language with embedded host expressions and control
//! directives, and style blocks — into a single host-language source unit
//! calling the reactive runtime.
//!
//! ## Ground Truth Invariants
//!
//! 1. **Four phases**: block extraction → block processing → template
//!    tokenize/parse/codegen → assembly + scope validation. Each phase
//!    consumes the previous phase's output and nothing else.
//!
//! 2. **No cross-call state**: every [`compile`] call builds and discards
//!    its own blocks, tokens, AST, and line map. There is no module-level
//!    mutable state, which makes batch compilation embarrassingly
//!    parallel (see [`batch`]).
//!
//! 3. **Deterministic output**: identical source compiles to
//!    byte-identical text. Attribute order is declaration order, hoisted
//!    constants are named in first-occurrence order, and no hash-map
//!    iteration feeds an output path.
//!
//! 4. **Fatal vs. collected diagnostics**: a Syntax or Structural error
//!    aborts the file with no unit emitted; UndefinedName findings are
//!    collected in full and returned alongside the unit.
//!
//! 5. **Hoisted subtrees are shared**: a purely static subtree is emitted
//!    once as a module constant and referenced wherever it recurs; the
//!    runtime must treat those values as immutable.

use serde::{Deserialize, Serialize};

pub mod batch;
pub mod blocks;
pub mod codegen;
pub mod component;
pub mod diagnostics;
pub mod document;
pub mod parse;
pub mod scope;
pub mod tokenize;

#[cfg(test)]
mod compile_tests;

use blocks::BlockParser;
use codegen::Generator;
use component::BlockProcessor;
use diagnostics::Diagnostic;
use document::Assembler;
use scope::ScopeValidator;

pub use component::ComponentSpec;
pub use diagnostics::DiagnosticKind;
pub use document::CompiledUnit;

/// Compiler configuration, validated before any phase runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Module path the generated unit imports the runtime from.
    pub runtime_module_path: String,
    /// Append `# file:line` markers to emitted body statements.
    pub emit_line_comments: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            runtime_module_path: "ptml.runtime".to_string(),
            emit_line_comments: false,
        }
    }
}

impl CompileOptions {
    /// Reject configurations the assembler cannot emit.
    pub fn validate(&self) -> Result<(), Diagnostic> {
        let path = &self.runtime_module_path;
        let valid = !path.is_empty()
            && path.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .enumerate()
                        .all(|(i, c)| c == '_' || c.is_alphabetic() || (i > 0 && c.is_numeric()))
            });
        if !valid {
            return Err(Diagnostic::compile_option(format!(
                "Invalid runtime module path '{}': expected a dotted identifier path",
                path
            )));
        }
        Ok(())
    }
}

/// A successful compilation: the unit plus collected non-fatal
/// diagnostics (undefined-name findings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub unit: CompiledUnit,
    pub spec: ComponentSpec,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile one PTML source file.
///
/// Syntax and Structural errors abort with `Err` and no partial unit;
/// scope violations arrive in [`CompileOutput::diagnostics`].
pub fn compile(
    source: &str,
    filename: &str,
    options: &CompileOptions,
) -> Result<CompileOutput, Diagnostic> {
    options.validate()?;

    let source_blocks = BlockParser::new(source, filename).parse()?;

    let mut generator = Generator::new(filename);
    let spec = BlockProcessor::new(filename).process(&source_blocks, &mut generator)?;

    let template = source_blocks
        .template
        .as_ref()
        .expect("block parser guarantees a template block");
    let root_expr = generator.compile_fragment(
        &template.content,
        template.start_line.saturating_sub(1),
    )?;

    let assembler = Assembler::new(options, filename);
    let unit = assembler.assemble(
        &spec,
        &root_expr,
        generator.features,
        generator.pool.defs(),
    );

    let mut diagnostics = ScopeValidator::new(filename).validate(&unit);
    for diagnostic in &mut diagnostics {
        if diagnostic.excerpt.is_none() {
            diagnostic.excerpt = diagnostics::excerpt_at(source, diagnostic.line, 0);
        }
    }

    Ok(CompileOutput {
        unit,
        spec,
        diagnostics,
    })
}
