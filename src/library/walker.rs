// src/library/walker.rs
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::identity::parse_folder_name;
use super::media::find_media_file;
use super::types::MovieFolder;

/// Folder name reserved for downloaded artwork; never catalogued.
pub const POSTERS_DIR_NAME: &str = "posters";

#[derive(Debug, Error)]
#[error("cannot traverse {}: {source}", display_path(.path))]
pub struct TraversalError {
    pub path: Option<PathBuf>,
    #[source]
    pub source: walkdir::Error,
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".into())
}

impl From<walkdir::Error> for TraversalError {
    fn from(source: walkdir::Error) -> Self {
        Self {
            path: source.path().map(Path::to_path_buf),
            source,
        }
    }
}

/// Lazy depth-first walk over a library root.
///
/// Directories whose name parses to a year are yielded as movie leaves and not descended
/// into; any other directory is treated as an organizational container. `posters` and
/// dot-prefixed entries are pruned. Symlinks are followed, and a link back to an ancestor
/// is reported as a [`TraversalError`] instead of looping. Unreadable subtrees are reported
/// the same way and the walk continues with their siblings.
pub struct LibraryWalker {
    inner: walkdir::IntoIter,
}

impl LibraryWalker {
    pub fn new(root: &Path) -> Self {
        let inner = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .into_iter();
        Self { inner }
    }
}

fn is_skipped(name: &str) -> bool {
    name == POSTERS_DIR_NAME || name.starts_with('.')
}

impl Iterator for LibraryWalker {
    type Item = Result<MovieFolder, TraversalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err.into())),
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if is_skipped(&name) {
                self.inner.skip_current_dir();
                continue;
            }

            let identity = parse_folder_name(&name);
            if identity.year.is_none() {
                // container: walkdir descends on the next call
                continue;
            }

            self.inner.skip_current_dir();
            let path = entry.into_path();
            let media_file = find_media_file(&path);
            return Some(Ok(MovieFolder {
                path,
                identity,
                media_file,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn leaves(root: &Path) -> (Vec<String>, usize) {
        let mut found = Vec::new();
        let mut errors = 0;
        for item in LibraryWalker::new(root) {
            match item {
                Ok(folder) => found.push(
                    folder
                        .path
                        .strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .replace('\\', "/"),
                ),
                Err(_) => errors += 1,
            }
        }
        found.sort();
        (found, errors)
    }

    #[test]
    fn yields_leaves_and_skips_posters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Alpha (1999)")).unwrap();
        fs::create_dir_all(root.join("Beta/Gamma (2001)")).unwrap();
        fs::create_dir_all(root.join("posters/Delta (2002)")).unwrap();

        let (found, errors) = leaves(root);
        assert_eq!(found, vec!["Alpha (1999)", "Beta/Gamma (2001)"]);
        assert_eq!(errors, 0);
    }

    #[test]
    fn hidden_entries_and_leaf_contents_are_not_visited() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join(".trash/Old (1980)")).unwrap();
        fs::create_dir_all(root.join("Heat (1995)/Featurettes (1995)")).unwrap();
        fs::create_dir_all(root.join("Directors/Mann/Collateral (2004)")).unwrap();
        fs::write(root.join("Loose File (2000).mkv"), b"x").unwrap();

        let (found, _) = leaves(root);
        assert_eq!(found, vec!["Directors/Mann/Collateral (2004)", "Heat (1995)"]);
    }

    #[test]
    fn leaf_carries_identity_and_media_file() {
        let dir = tempfile::tempdir().unwrap();
        let leaf = dir.path().join("Inception (2010)");
        fs::create_dir_all(&leaf).unwrap();
        fs::write(leaf.join("inception.mkv"), b"x").unwrap();

        let folders: Vec<MovieFolder> = LibraryWalker::new(dir.path())
            .filter_map(Result::ok)
            .collect();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].identity.title, "Inception");
        assert_eq!(folders[0].identity.year, Some(2010));
        assert_eq!(folders[0].media_file, Some(leaf.join("inception.mkv")));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_is_reported_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Alpha (1999)")).unwrap();
        fs::create_dir_all(root.join("Beta")).unwrap();
        std::os::unix::fs::symlink(root, root.join("Beta/loop")).unwrap();

        let (found, errors) = leaves(root);
        assert_eq!(found, vec!["Alpha (1999)"]);
        assert_eq!(errors, 1);
    }
}
