//! Diagnostic types shared by every compiler phase.
//!
//! A [`Diagnostic`] carries everything the bundler and dev server need to
//! render an error: the failure class, a message, the file, a 1-based line,
//! a column where one is known, a short source excerpt, and optional hints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy. Syntax and Structural abort a file's compilation with
/// no unit emitted; UndefinedName findings are collected in full and
/// returned alongside the unit; CompileOption rejects the call before any
/// phase runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    Syntax,
    Structural,
    UndefinedName,
    CompileOption,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Syntax => "SyntaxError",
            DiagnosticKind::Structural => "StructuralError",
            DiagnosticKind::UndefinedName => "UndefinedNameError",
            DiagnosticKind::CompileOption => "CompileOptionError",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    /// 1-based. Zero means the location is unknown.
    pub line: u32,
    /// 1-based. Zero means no column is available for this failure class.
    pub column: u32,
    pub excerpt: Option<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, file: &str, line: u32) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            file: file.to_string(),
            line,
            column: 0,
            excerpt: None,
            hints: Vec::new(),
        }
    }

    pub fn syntax(message: impl Into<String>, file: &str, line: u32) -> Self {
        Self::new(DiagnosticKind::Syntax, message, file, line)
    }

    pub fn structural(message: impl Into<String>, file: &str, line: u32) -> Self {
        Self::new(DiagnosticKind::Structural, message, file, line)
    }

    pub fn undefined_name(name: &str, file: &str, line: u32) -> Self {
        Self::new(
            DiagnosticKind::UndefinedName,
            format!("Undefined name '{}'", name),
            file,
            line,
        )
    }

    pub fn compile_option(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::CompileOption, message, "", 0)
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = column;
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        // Every kind in the taxonomy is a build failure for the bundler.
        true
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.file.is_empty() {
            write!(f, " in '{}'", self.file)?;
        }
        if self.line > 0 {
            write!(f, " at line {}", self.line)?;
            if self.column > 0 {
                write!(f, ", column {}", self.column)?;
            }
        }
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n  | {}", excerpt)?;
        }
        for hint in &self.hints {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Extract the source line surrounding a failure, trimmed to a short window
/// around `column` so excerpts stay one-line even for minified input.
pub fn excerpt_at(source: &str, line: u32, column: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let text = source.lines().nth(line as usize - 1)?;
    let text = text.trim_end();
    const WINDOW: usize = 60;
    if text.len() <= WINDOW {
        return Some(text.trim_start().to_string());
    }
    let col = (column as usize).saturating_sub(1).min(text.len());
    let start = col.saturating_sub(WINDOW / 2);
    // Stay on char boundaries for multi-byte text.
    let start = (start..=col).find(|i| text.is_char_boundary(*i)).unwrap_or(0);
    let end = (start + WINDOW).min(text.len());
    let end = (end..text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());
    Some(format!("...{}...", &text[start..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_excerpt() {
        let d = Diagnostic::syntax("Unterminated expression", "app.ptml", 4)
            .with_column(12)
            .with_excerpt("<div class=@{theme");
        let rendered = d.to_string();
        assert!(rendered.contains("SyntaxError"));
        assert!(rendered.contains("app.ptml"));
        assert!(rendered.contains("line 4, column 12"));
        assert!(rendered.contains("<div class=@{theme"));
    }

    #[test]
    fn excerpt_windows_long_lines() {
        let long = format!("{}needle{}", "x".repeat(100), "y".repeat(100));
        let excerpt = excerpt_at(&long, 1, 103).unwrap();
        assert!(excerpt.contains("needle"));
        assert!(excerpt.len() < long.len());
    }

    #[test]
    fn excerpt_missing_line_is_none() {
        assert_eq!(excerpt_at("one line", 7, 1), None);
    }
}
