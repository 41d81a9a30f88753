//! Gitignore-aware discovery of C/C++ sources.

use std::path::{Path, PathBuf};

use cxxgraph_core::config::ScanConfig;
use cxxgraph_core::errors::ScanError;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use tracing::{debug, warn};

/// Every accepted source under `root`, sorted.
///
/// `.gitignore`, `.ignore` and git excludes are honored even outside a
/// repository. `extra_ignore` patterns use gitignore syntax relative to
/// `root`. A `root` that is itself a file is returned as is when its
/// extension is accepted.
pub fn discover_sources(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    if root.is_file() {
        return Ok(if config.accepts(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    if !root.is_dir() {
        return Err(ScanError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut overrides = OverrideBuilder::new(root);
    for pattern in &config.extra_ignore {
        overrides
            .add(&format!("!{pattern}"))
            .map_err(|e| ScanError::Walk {
                message: format!("invalid ignore pattern '{pattern}': {e}"),
            })?;
    }
    let overrides = overrides.build().map_err(|e| ScanError::Walk {
        message: e.to_string(),
    })?;

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(config.effective_follow_symlinks())
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    let mut unreadable = 0usize;
    for entry in walker {
        match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && config.accepts(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(error) => {
                // Permission problems and dangling links skip one entry.
                unreadable += 1;
                warn!(%error, "skipping unreadable entry");
            }
        }
    }
    files.sort();
    files.dedup();
    debug!(root = %root.display(), files = files.len(), unreadable, "sources discovered");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn keeps_only_accepted_extensions_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/b.cpp");
        touch(dir.path(), "src/a.hpp");
        touch(dir.path(), "README.md");
        touch(dir.path(), "build.py");

        let files = discover_sources(dir.path(), &ScanConfig::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("src/a.hpp"), PathBuf::from("src/b.cpp")]);
    }

    #[test]
    fn honors_gitignore_and_extra_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "build/\n").unwrap();
        touch(dir.path(), "build/gen.cpp");
        touch(dir.path(), "third_party/lib.cc");
        touch(dir.path(), "main.cpp");

        let config = ScanConfig {
            extra_ignore: vec!["third_party/".to_string()],
            ..Default::default()
        };
        let files = discover_sources(dir.path(), &config).unwrap();
        assert_eq!(files, vec![dir.path().join("main.cpp")]);
    }

    #[test]
    fn missing_root_is_reported() {
        let err = discover_sources(Path::new("/nonexistent/cxxgraph"), &ScanConfig::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::RootNotFound { .. }));
    }

    #[test]
    fn single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "only.c");
        let root = dir.path().join("only.c");
        assert_eq!(
            discover_sources(&root, &ScanConfig::default()).unwrap(),
            vec![root.clone()]
        );
    }
}
