//! File discovery and batching for the lint command.

use std::path::{Component, Path};

use anyhow::{bail, Context};
use glob::{MatchOptions, Pattern};

use crate::scheduler::types::Batch;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extensions without the leading dot, e.g. `css`.
    pub extensions: Vec<String>,
    /// Glob patterns matched against the full path of each candidate.
    pub exclude: Vec<String>,
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["css".into(), "scss".into(), "html".into()],
            exclude: Vec::new(),
            skip_dirs: vec!["node_modules".into(), ".git".into()],
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Find files under `target` and split them into batches.
///
/// `target` may be a directory (searched recursively), a single file with a
/// supported extension, or a glob pattern. Results are sorted so batching is
/// stable between runs.
pub fn scan_files(target: &str, options: &ScanOptions) -> anyhow::Result<Vec<Batch>> {
    if options.batch_size == 0 {
        bail!("batch_size must be greater than 0");
    }

    tracing::debug!(path = target, "scanning for files");

    let exclude = options
        .exclude
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid exclude pattern `{p}`")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let patterns = search_patterns(target, options);
    let mut files = Vec::new();
    for pattern in &patterns {
        let entries = glob::glob_with(pattern, match_options())
            .with_context(|| format!("invalid search pattern `{pattern}`"))?;
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    if keep(&path, options, &exclude) {
                        files.push(path.to_string_lossy().to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %e.path().display(), error = %e.error(), "skipping inaccessible path"),
            }
        }
    }

    files.sort();
    files.dedup();

    let batches = create_batches(files, options.batch_size);
    tracing::debug!(
        files = batches.iter().map(Batch::len).sum::<usize>(),
        batches = batches.len(),
        "scan finished"
    );
    Ok(batches)
}

/// Split `files` into consecutive batches of at most `batch_size` items.
pub fn create_batches(files: Vec<String>, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    files
        .chunks(size)
        .map(|chunk| Batch::new(chunk.to_vec()))
        .collect()
}

fn search_patterns(target: &str, options: &ScanOptions) -> Vec<String> {
    let normalized = target.replace('\\', "/");
    if normalized.contains('*') {
        return vec![normalized];
    }

    let path = Path::new(&normalized);
    if path.is_file() {
        return if has_extension(path, &options.extensions) {
            vec![Pattern::escape(&normalized)]
        } else {
            tracing::debug!(path = target, "file has an unsupported extension");
            Vec::new()
        };
    }

    let base = Pattern::escape(normalized.trim_end_matches('/'));
    let base = if base.is_empty() { ".".to_string() } else { base };
    options
        .extensions
        .iter()
        .map(|ext| format!("{base}/**/*.{ext}"))
        .collect()
}

fn keep(path: &Path, options: &ScanOptions, exclude: &[Pattern]) -> bool {
    let in_skipped_dir = path.components().any(|c| match c {
        Component::Normal(name) => options
            .skip_dirs
            .iter()
            .any(|skip| name.to_string_lossy() == skip.as_str()),
        _ => false,
    });
    if in_skipped_dir {
        return false;
    }

    if !has_extension(path, &options.extensions) {
        return false;
    }

    !exclude
        .iter()
        .any(|p| p.matches_path_with(path, match_options()))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(&e)))
}

fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "a {}\n").unwrap();
    }

    fn names(batches: &[Batch], root: &Path) -> Vec<Vec<String>> {
        batches
            .iter()
            .map(|b| {
                b.items()
                    .iter()
                    .map(|p| {
                        Path::new(p)
                            .strip_prefix(root)
                            .unwrap()
                            .to_string_lossy()
                            .replace('\\', "/")
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn batches_are_chunked_in_order() {
        let files: Vec<String> = (0..5).map(|i| format!("f{i}.css")).collect();
        let batches = create_batches(files, 2);
        assert_eq!(
            batches.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(batches[2].items(), ["f4.css".to_string()]);
        assert!(create_batches(Vec::new(), 10).is_empty());
    }

    #[test]
    fn scans_directory_recursively_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "a.css");
        touch(root, "nested/b.css");
        touch(root, "nested/c.html");
        touch(root, "nested/ignored.js");
        touch(root, "node_modules/pkg/d.css");
        touch(root, "vendor/e.css");

        let options = ScanOptions {
            extensions: vec!["css".into(), "html".into()],
            exclude: vec!["**/vendor/**".into()],
            batch_size: 2,
            ..ScanOptions::default()
        };
        let batches = scan_files(root.to_str().unwrap(), &options).unwrap();

        assert_eq!(
            names(&batches, root),
            vec![
                vec!["a.css".to_string(), "nested/b.css".to_string()],
                vec!["nested/c.html".to_string()],
            ]
        );
    }

    #[test]
    fn single_file_target() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.css");
        touch(dir.path(), "skip.txt");

        let file = dir.path().join("only.css");
        let batches = scan_files(file.to_str().unwrap(), &ScanOptions::default()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);

        let other = dir.path().join("skip.txt");
        let batches = scan_files(other.to_str().unwrap(), &ScanOptions::default()).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let options = ScanOptions {
            batch_size: 0,
            ..ScanOptions::default()
        };
        assert!(scan_files(".", &options).is_err());
    }
}
