//! The file-selection file shared by `copy`, `cut` and `paste`.
//!
//! The first line is `copy` or `move`, followed by one absolute path per line until a
//! blank line or the end of the file. Keeping the selection on disk lets a `paste` in
//! one instance pick up files yanked in another.

use tracing::debug;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Reads the selection. Returns the paths and whether they were copied (`true`) or cut.
///
/// A missing file is an empty selection. A first line other than `copy` or `move` is an
/// [io::ErrorKind::InvalidData] error.
pub fn load_files(path: &Path) -> io::Result<(Vec<PathBuf>, bool)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), false)),
        Err(e) => return Err(e),
    };

    let mut lines = BufReader::new(file).lines();
    let mode = lines.next().transpose()?.unwrap_or_default();
    let cp = match mode.as_str() {
        "copy" => true,
        "move" => false,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected option to copy file(s): {other}"),
            ));
        }
    };

    let mut list = Vec::new();
    for line in lines {
        let line = line?;
        if line.is_empty() {
            break;
        }
        list.push(PathBuf::from(line));
    }
    debug!("loading files: {list:?}");
    Ok((list, cp))
}

/// Writes the selection, creating the data directory if needed.
pub fn save_files(path: &Path, list: &[PathBuf], cp: bool) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    debug!("saving files: {list:?}");
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", if cp { "copy" } else { "move" })?;
    for f in list {
        writeln!(out, "{}", f.display())?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bad_first_line_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("files");
        fs::write(&path, "link\n/a\n")?;
        let err = load_files(&path).err().ok_or("expected an error")?;
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        fs::write(&path, "")?;
        assert!(load_files(&path).is_err());
        Ok(())
    }

    #[test]
    fn stops_at_blank_line() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("files");
        fs::write(&path, "move\n/a\n\n/ignored\n")?;
        let (list, cp) = load_files(&path)?;
        assert_eq!(list, [PathBuf::from("/a")]);
        assert!(!cp);
        Ok(())
    }
}
