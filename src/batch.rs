//! Batch compilation.
//!
//! Each `compile()` call is pure and holds no shared state, so a batch
//! fans out across a thread pool with no synchronization inside the
//! compiler. Results come back one entry per input file, input order
//! preserved; a failing file never aborts the batch, because build
//! tooling wants complete diagnostics in one pass.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::diagnostics::Diagnostic;
use crate::{compile, CompileOptions, CompileOutput};

/// File extension of PTML component sources.
pub const SOURCE_EXTENSION: &str = "ptml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: String,
    pub source: String,
}

/// One per input file, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub path: String,
    /// The unit, or the fatal diagnostic that aborted this file.
    pub result: Result<CompileOutput, Diagnostic>,
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Compile every file, in parallel, collecting all results.
pub fn compile_batch(files: &[SourceFile], options: &CompileOptions) -> Vec<BatchEntry> {
    files
        .par_iter()
        .map(|file| BatchEntry {
            path: file.path.clone(),
            result: compile(&file.source, &file.path, options),
        })
        .collect()
}

/// JSON view of a batch, the form the bundler and dev server ingest.
pub fn batch_report(entries: &[BatchEntry]) -> serde_json::Value {
    serde_json::to_value(entries).unwrap_or(serde_json::Value::Null)
}

/// Recursively find `.ptml` sources under a directory, sorted for
/// deterministic batch order.
pub fn find_template_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.path().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext == SOURCE_EXTENSION)
                    .unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, source: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn batch_preserves_input_order_and_isolates_failures() {
        let good = "@component(\"A\")\n@template { <div>ok</div> }";
        let broken = "@component(\"B\")\n@template { <div>@{oops }";
        let files = vec![
            file("a.ptml", good),
            file("b.ptml", broken),
            file("c.ptml", &good.replace("\"A\"", "\"C\"")),
        ];
        let entries = compile_batch(&files, &CompileOptions::default());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, "a.ptml");
        assert_eq!(entries[1].path, "b.ptml");
        assert_eq!(entries[2].path, "c.ptml");
        assert!(entries[0].is_success());
        assert!(!entries[1].is_success());
        assert!(entries[2].is_success());
        let err = entries[1].result.as_ref().unwrap_err();
        assert_eq!(err.file, "b.ptml");
    }

    #[test]
    fn batch_report_serializes_per_file_entries() {
        let files = vec![file("a.ptml", "@component(\"A\")\n@template { <div></div> }")];
        let report = batch_report(&compile_batch(&files, &CompileOptions::default()));
        let entries = report.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["path"], "a.ptml");
    }

    #[test]
    fn batch_results_match_sequential_compiles() {
        let source = "@component(\"A\")\n@template { <div>@{1 + 1}</div> }";
        let files = vec![file("a.ptml", source), file("b.ptml", source)];
        let entries = compile_batch(&files, &CompileOptions::default());
        let solo = compile(source, "a.ptml", &CompileOptions::default()).unwrap();
        let batched = entries[0].result.as_ref().unwrap();
        assert_eq!(batched.unit.source(), solo.unit.source());
    }
}
