//! File and directory browsing logic for tern.
//!
//! Provides the [FileEntry] struct which is used throughout tern, and [browse_dir] which
//! the directory worker calls to read a listing. Entries carry the metadata needed by
//! every sort method (size and the three timestamps) so sorting never touches the disk.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Represents a single entry in a directory listing.
///
/// Created by [browse_dir] on the directory worker thread and then only read.
#[derive(Debug, Clone)]
pub struct FileEntry {
    name: Box<OsStr>,
    flags: u8,
    size: u64,
    modified: SystemTime,
    accessed: SystemTime,
    changed: SystemTime,
    symlink: Option<PathBuf>,
}

impl FileEntry {
    // Flag bit definitions
    pub(crate) const IS_DIR: u8 = 1 << 0;
    pub(crate) const IS_HIDDEN: u8 = 1 << 1;
    pub(crate) const IS_SYMLINK: u8 = 1 << 2;
    pub(crate) const IS_BROKEN_SYM: u8 = 1 << 3;
    pub(crate) const IS_EXECUTABLE: u8 = 1 << 4;

    const EXEC_FLAG: u32 = 0o111;

    pub fn new(name: OsString, flags: u8) -> Self {
        FileEntry {
            name: name.into_boxed_os_str(),
            flags,
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
            accessed: SystemTime::UNIX_EPOCH,
            changed: SystemTime::UNIX_EPOCH,
            symlink: None,
        }
    }

    /// Builder used by tests and by [browse_dir] to attach size and times.
    pub fn with_meta(mut self, size: u64, modified: SystemTime) -> Self {
        self.size = size;
        self.modified = modified;
        self
    }

    // Accessors

    #[inline]
    pub fn name(&self) -> &OsStr {
        &self.name
    }

    #[inline]
    pub fn name_str(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    #[inline]
    pub fn accessed(&self) -> SystemTime {
        self.accessed
    }

    #[inline]
    pub fn changed(&self) -> SystemTime {
        self.changed
    }

    #[inline]
    pub fn symlink(&self) -> Option<&PathBuf> {
        self.symlink.as_ref()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.flags & Self::IS_DIR != 0
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.flags & Self::IS_HIDDEN != 0
    }

    #[inline]
    pub fn is_symlink(&self) -> bool {
        self.flags & Self::IS_SYMLINK != 0
    }

    #[inline]
    pub fn is_broken_sym(&self) -> bool {
        self.flags & Self::IS_BROKEN_SYM != 0
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.flags & Self::IS_EXECUTABLE != 0
    }

    /// Extension used by the `ext` sort method, lowercased. Dotfiles have none.
    pub fn extension(&self) -> String {
        let name = self.name_str();
        match name.rfind('.') {
            Some(0) | None => String::new(),
            Some(idx) => name[idx + 1..].to_lowercase(),
        }
    }

    fn apply_metadata(&mut self, md: &Metadata) {
        use std::os::unix::fs::MetadataExt;
        use std::os::unix::fs::PermissionsExt;

        self.size = md.len();
        self.modified = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        self.accessed = md.accessed().unwrap_or(SystemTime::UNIX_EPOCH);
        self.changed = unix_time(md.ctime(), md.ctime_nsec());

        if md.is_dir() {
            self.flags |= Self::IS_DIR;
        }
        if md.permissions().mode() & Self::EXEC_FLAG != 0 {
            self.flags |= Self::IS_EXECUTABLE;
        }
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    if secs < 0 {
        return SystemTime::UNIX_EPOCH;
    }
    let nanos = nsecs.clamp(0, 999_999_999) as u32;
    SystemTime::UNIX_EPOCH + std::time::Duration::new(secs as u64, nanos)
}

/// Reads the contents of the provided directory and returns them unsorted.
///
/// Entries that vanish between `read_dir` and `stat` are skipped. A symlink whose
/// target cannot be resolved is kept and flagged as broken.
pub fn browse_dir(path: &Path) -> io::Result<Vec<FileEntry>> {
    use std::os::unix::ffi::OsStrExt;

    let mut entries = Vec::with_capacity(256);

    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        let name = entry.file_name();
        let ft = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        let mut flags = 0u8;
        if ft.is_dir() {
            flags |= FileEntry::IS_DIR;
        }
        if ft.is_symlink() {
            flags |= FileEntry::IS_SYMLINK;
        }
        if name.as_bytes().first() == Some(&b'.') {
            flags |= FileEntry::IS_HIDDEN;
        }

        let mut file = FileEntry::new(name, flags);

        let md_res = if file.is_symlink() {
            fs::metadata(entry.path())
        } else {
            entry.metadata()
        };

        match md_res {
            Ok(md) => file.apply_metadata(&md),
            Err(_) if file.is_symlink() => {
                file.flags |= FileEntry::IS_BROKEN_SYM;
                if let Ok(md) = entry.metadata() {
                    file.apply_metadata(&md);
                }
            }
            Err(_) => continue,
        }

        if file.is_symlink() {
            file.symlink = fs::read_link(entry.path()).ok();
        }
        entries.push(file);
    }
    Ok(entries)
}
