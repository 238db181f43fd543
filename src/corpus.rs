//! Corpus discovery.
//!
//! Walks the corpus root and yields every regular file whose extension is
//! enabled in `[corpus].extensions` (matched case-insensitively), minus
//! exclude globs. Paths are reported relative to the root with `/`
//! separators on every platform; that relative path is the document's
//! identity in the index.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::extract::Format;

/// A candidate document under the corpus root.
#[derive(Debug, Clone)]
pub struct CorpusFile {
    /// Path on disk (root joined with the relative path).
    pub path: PathBuf,
    /// Relative, `/`-separated document identity.
    pub rel_path: String,
    pub format: Format,
}

impl CorpusFile {
    /// Final path component, used as the display name.
    pub fn file_name(&self) -> &str {
        self.rel_path.rsplit('/').next().unwrap_or(&self.rel_path)
    }
}

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// List supported files under `corpus.root`, sorted by relative path.
///
/// Files listed in `skip` (e.g. the update-metadata file kept inside the
/// corpus) are never reported.
pub fn discover(corpus: &CorpusConfig, skip: &[PathBuf]) -> Result<Vec<CorpusFile>> {
    let root = &corpus.root;
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }
    scan(
        root,
        &enabled_extensions(&corpus.extensions),
        &corpus.exclude_globs,
        corpus.follow_symlinks,
        skip,
    )
}

/// Number of supported files under `dir` (used for source update metadata).
pub fn count_files(dir: &Path, extensions: &[String], follow_symlinks: bool) -> Result<usize> {
    if !dir.is_dir() {
        bail!("Source directory does not exist: {}", dir.display());
    }
    Ok(scan(dir, &enabled_extensions(extensions), &[], follow_symlinks, &[])?.len())
}

fn enabled_extensions(extensions: &[String]) -> HashSet<String> {
    extensions.iter().map(|e| e.to_ascii_lowercase()).collect()
}

fn scan(
    root: &Path,
    extensions: &HashSet<String>,
    exclude_globs: &[String],
    follow_symlinks: bool,
    skip: &[PathBuf],
) -> Result<Vec<CorpusFile>> {
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;
    // Resolved so `./data/x` and `data/x` name the same file. A skip path
    // that does not exist cannot be walked either.
    let skip: HashSet<PathBuf> = skip
        .iter()
        .filter_map(|p| std::fs::canonicalize(p).ok())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !skip.is_empty()
            && std::fs::canonicalize(path).is_ok_and(|p| skip.contains(&p))
        {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_path) {
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !extensions.contains(&ext.to_ascii_lowercase()) {
            continue;
        }
        let Some(format) = Format::from_extension(ext) else {
            continue;
        };

        files.push(CorpusFile {
            path: path.to_path_buf(),
            rel_path,
            format,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn corpus(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            extensions: vec!["md".into(), "txt".into(), "pdf".into(), "json".into()],
            exclude_globs: vec!["drafts/**".into()],
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_discovers_supported_files_sorted_and_relative() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("web/xss")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("web/xss/README.md"), "x").unwrap();
        fs::write(root.join("NOTES.TXT"), "x").unwrap();
        fs::write(root.join("tool.exe"), "x").unwrap();
        fs::write(root.join("deck.pptx"), "x").unwrap();
        fs::write(root.join("drafts/wip.md"), "x").unwrap();
        fs::write(root.join(".git/config.md"), "x").unwrap();
        fs::write(root.join("update_metadata.json"), "{}").unwrap();

        let files = discover(&corpus(root), &[root.join("update_metadata.json")]).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["NOTES.TXT", "web/xss/README.md"]);
        assert_eq!(files[1].file_name(), "README.md");
        assert_eq!(files[0].format, Format::Text);
    }

    #[test]
    fn test_skip_matches_differently_spelled_paths() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("data/notes.md"), "x").unwrap();
        fs::write(root.join("data/update_metadata.json"), "{}").unwrap();

        // Root spelled with `./` segments, skip path spelled without.
        let cfg = corpus(&root.join(".").join("data"));
        let skip = root.join("data").join("update_metadata.json");
        let files = discover(&cfg, &[skip]).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["notes.md"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(&corpus(&tmp.path().join("nope")), &[]).is_err());
    }

    #[test]
    fn test_count_files_counts_supported_only() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "x").unwrap();
        fs::write(tmp.path().join("b.bin"), "x").unwrap();
        assert_eq!(
            count_files(tmp.path(), &["md".to_string()], false).unwrap(),
            1
        );
    }
}
