use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    // The root itself is never skipped, even when it is a dot-directory.
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with('.'))
}

fn is_file(entry: &DirEntry) -> bool {
    // Symlinked files count as files; symlinked directories are not followed.
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Lazily walk every non-hidden file below `root`, depth first.
///
/// Hidden files are skipped and hidden directories are not descended into.
/// Entries come back sorted by name so repeated runs see the same order.
/// Unreadable entries are logged and skipped.
pub fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(is_file)
        .map(DirEntry::into_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_walks_nested_files_in_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.jpg"));
        touch(&root.join("a/z.jpg"));
        touch(&root.join("a/deep/er/y.mov"));
        touch(&root.join("c.txt"));

        let found: Vec<PathBuf> = walk_files(root)
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![
                PathBuf::from("a/deep/er/y.mov"),
                PathBuf::from("a/z.jpg"),
                PathBuf::from("b.jpg"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_skips_hidden_entries() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join(".DS_Store"));
        touch(&root.join(".thumbnails/t.jpg"));
        touch(&root.join("album/._IMG_0001.JPG"));
        touch(&root.join("album/IMG_0001.JPG"));

        let found: Vec<PathBuf> = walk_files(root).collect();
        assert_eq!(found, vec![root.join("album/IMG_0001.JPG")]);
    }

    #[test]
    fn test_hidden_root_is_still_walked() {
        let dir = tempdir().unwrap();
        let root = dir.path().join(".import");
        touch(&root.join("a.jpg"));
        assert_eq!(walk_files(&root).count(), 1);
    }

    #[test]
    fn test_restartable_on_subtree() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("x/1.jpg"));
        touch(&dir.path().join("y/2.jpg"));
        assert_eq!(walk_files(&dir.path().join("x")).count(), 1);
        assert_eq!(walk_files(dir.path()).count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_files_are_walked() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let real = dir.path().join("elsewhere/real.jpg");
        touch(&real);
        let root = dir.path().join("card");
        fs::create_dir(&root).unwrap();
        symlink(&real, root.join("IMG_01.JPG")).unwrap();
        symlink(dir.path().join("elsewhere"), root.join("linked-dir")).unwrap();
        symlink(dir.path().join("missing.jpg"), root.join("dangling.jpg")).unwrap();

        let found: Vec<PathBuf> = walk_files(&root).collect();
        assert_eq!(found, vec![root.join("IMG_01.JPG")]);
    }
}
