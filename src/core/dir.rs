//! Directory snapshots and file registry entries.
//!
//! A [Dir] is an immutable snapshot produced by the directory worker and then owned by the
//! reactor, which only moves its cursor. A [Reg] is the preview of a regular file produced
//! by the preview worker. Both carry the `request_id` they were requested under so the
//! reactor can discard superseded results.

use crate::core::formatter::safe_read_preview;
use crate::core::{FileEntry, SortType, browse_dir};

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
    all: Vec<FileEntry>,
    files: Vec<FileEntry>,
    ind: usize,
    pos: usize,
    sort: SortType,
    loading: bool,
    load_time: SystemTime,
    request_id: u64,
    error: Option<String>,
}

impl Dir {
    /// Placeholder shown while the worker is reading `path`.
    pub fn loading(path: PathBuf, request_id: u64) -> Self {
        Dir {
            path,
            all: Vec::new(),
            files: Vec::new(),
            ind: 0,
            pos: 0,
            sort: SortType::default(),
            loading: true,
            load_time: SystemTime::UNIX_EPOCH,
            request_id,
            error: None,
        }
    }

    /// Reads and sorts `path`. Called on the directory worker thread.
    pub fn read(path: PathBuf, sort: SortType, request_id: u64) -> Self {
        let load_time = SystemTime::now();
        let (all, error) = match browse_dir(&path) {
            Ok(entries) => (entries, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        Self::from_entries(path, all, sort, request_id, load_time, error)
    }

    pub fn from_entries(
        path: PathBuf,
        all: Vec<FileEntry>,
        sort: SortType,
        request_id: u64,
        load_time: SystemTime,
        error: Option<String>,
    ) -> Self {
        let files = sort.apply(&all);
        Dir {
            path,
            all,
            files,
            ind: 0,
            pos: 0,
            sort,
            loading: false,
            load_time,
            request_id,
            error,
        }
    }

    // Accessors

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    #[inline]
    pub fn ind(&self) -> usize {
        self.ind
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn sort_type(&self) -> SortType {
        self.sort
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[inline]
    pub fn load_time(&self) -> SystemTime {
        self.load_time
    }

    #[inline]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn current(&self) -> Option<&FileEntry> {
        self.files.get(self.ind)
    }

    pub fn current_name(&self) -> Option<OsString> {
        self.current().map(|f| f.name().to_os_string())
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.current().map(|f| self.path.join(f.name()))
    }

    /// Marks the snapshot as stale and waiting on `request_id`.
    pub fn mark_loading(&mut self, request_id: u64) {
        self.loading = true;
        self.request_id = request_id;
    }

    /// Re-sorts the listing, keeping the cursor on the same file.
    pub fn resort(&mut self, sort: SortType, height: usize, scrolloff: usize) {
        if self.sort == sort {
            return;
        }
        let name = self.current_name();
        self.sort = sort;
        self.files = sort.apply(&self.all);
        if let Some(name) = name {
            self.sel(&name, height, scrolloff);
        } else {
            self.bound_pos(height, scrolloff);
        }
    }

    /// Moves the cursor to the file called `name`, if present, and fixes the scroll offset.
    pub fn sel(&mut self, name: &OsStr, height: usize, scrolloff: usize) {
        if self.files.is_empty() {
            self.ind = 0;
            self.pos = 0;
            return;
        }

        self.ind = self.ind.min(self.files.len() - 1);

        if self.files[self.ind].name() != name
            && let Some(idx) = self.files.iter().position(|f| f.name() == name)
        {
            self.ind = idx;
        }

        let edge = scrolloff
            .min(height / 2)
            .min(self.files.len() - self.ind - 1);
        self.pos = self.ind.min(height.saturating_sub(edge + 1));
    }

    pub fn set_ind(&mut self, ind: usize) {
        self.ind = ind;
    }

    /// Moves the cursor by `delta` rows, clamping at both ends.
    pub fn move_cursor(&mut self, delta: isize, height: usize, scrolloff: usize) {
        if self.files.is_empty() {
            return;
        }
        let max = self.files.len() - 1;
        let target = (self.ind as isize)
            .saturating_add(delta)
            .clamp(0, max as isize) as usize;
        let moved = target as isize - self.ind as isize;
        self.ind = target;
        self.pos = (self.pos as isize + moved).max(0) as usize;
        self.bound_pos(height, scrolloff);
    }

    /// Keeps the cursor row inside the viewport and `scrolloff` rows away from its edges.
    pub fn bound_pos(&mut self, height: usize, scrolloff: usize) {
        let len = self.files.len();
        if len == 0 {
            self.ind = 0;
            self.pos = 0;
            return;
        }
        self.ind = self.ind.min(len - 1);

        if len <= height {
            self.pos = self.ind;
            return;
        }

        let edge = scrolloff.min(height.saturating_sub(1) / 2);
        let pos = self
            .pos
            .max(edge)
            .min(height.saturating_sub(edge + 1))
            .min(self.ind);
        // never leave empty rows below the last file
        let min_pos = height.saturating_sub(len - self.ind);
        self.pos = pos.max(min_pos);
    }
}

/// Preview of a regular file.
#[derive(Debug, Clone)]
pub struct Reg {
    path: PathBuf,
    lines: Vec<String>,
    loading: bool,
    load_time: SystemTime,
    request_id: u64,
}

impl Reg {
    pub fn loading(path: PathBuf, request_id: u64) -> Self {
        Reg {
            path,
            lines: Vec::new(),
            loading: true,
            load_time: SystemTime::UNIX_EPOCH,
            request_id,
        }
    }

    /// Reads up to `max_lines` of `path`. Called on the preview worker thread.
    pub fn read(path: PathBuf, max_lines: usize, request_id: u64) -> Self {
        let load_time = SystemTime::now();
        let lines = safe_read_preview(&path, max_lines);
        Reg {
            path,
            lines,
            loading: false,
            load_time,
            request_id,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[inline]
    pub fn load_time(&self) -> SystemTime {
        self.load_time
    }

    #[inline]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}
