//! Helpers for tern.
//!
//! - Locating the home directory and expanding/shortening `~` in paths
//! - Generating unused filenames to prevent accidental overwrite
//! - Recursive copies for cross-device moves

use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::{fs, io};

/// The user's home directory, from `$HOME` first and the platform lookup after.
pub fn get_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// Expands a leading `~` or `~/` to the home directory.
pub fn expand_home_path(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match get_home() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Finds the next available filename by appending _1, _2, etc. if the target exists
///
/// Example: "notes.txt" -> "notes_1.txt"
pub fn get_unused_path(path: &Path) -> PathBuf {
    if fs::symlink_metadata(path).is_err() {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let name = path.file_name().unwrap_or_default();

    let stem = Path::new(name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();

    let ext = Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let target = parent.join(format!("{}_{}{}", stem, counter, ext));
        if fs::symlink_metadata(&target).is_err() {
            return target;
        }
        counter += 1;
    }
}

/// Util function to shorten home directory to ~.
/// Is used for the path line at the top of the screen.
pub fn shorten_home_path<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    if let Some(home_dir) = get_home()
        && let Ok(stripped) = path.strip_prefix(&home_dir)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }
        return format!("~{}{}", MAIN_SEPARATOR, stripped.display());
    }
    path.display().to_string()
}

/// Recursively copies files and directories from `src` to `dest`.
///
/// Symlinks are recreated, not followed.
pub fn copy_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        std::os::unix::fs::symlink(fs::read_link(src)?, dest)?;
    } else if meta.is_dir() {
        fs::create_dir_all(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        fs::copy(src, dest)?;
    }
    Ok(())
}

/// Helper utils integration tests
#[cfg(test)]
mod tests {
    use super::*;

    use std::error;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_path_collision_increments() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("data.csv");

        assert_eq!(get_unused_path(&path), path);

        File::create(&path)?;
        assert_eq!(get_unused_path(&path), dir.path().join("data_1.csv"));

        File::create(dir.path().join("data_1.csv"))?;
        assert_eq!(get_unused_path(&path), dir.path().join("data_2.csv"));
        Ok(())
    }

    #[test]
    fn test_hidden_file_collision() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(".config");

        File::create(&path)?;
        // Result: .config_1
        assert_eq!(get_unused_path(&path), dir.path().join(".config_1"));
        Ok(())
    }

    #[test]
    fn dangling_symlink_counts_as_taken() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link)?;
        assert_eq!(get_unused_path(&link), dir.path().join("link_1"));
        Ok(())
    }

    #[test]
    fn copy_recursive_copies_tree() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b"))?;
        fs::write(src.join("a/b/c.txt"), "deep")?;
        std::os::unix::fs::symlink("a/b/c.txt", src.join("ln"))?;

        let dest = dir.path().join("dest");
        copy_recursive(&src, &dest)?;
        assert_eq!(fs::read_to_string(dest.join("a/b/c.txt"))?, "deep");
        assert!(fs::symlink_metadata(dest.join("ln"))?.file_type().is_symlink());
        Ok(())
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let plain = Path::new("/tmp/~x");
        assert_eq!(expand_home_path(plain), plain);
        if let Some(home) = get_home() {
            assert_eq!(expand_home_path(Path::new("~/docs")), home.join("docs"));
            assert_eq!(shorten_home_path(home.join("docs")), format!("~{MAIN_SEPARATOR}docs"));
        }
    }
}
