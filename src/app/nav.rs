//! Navigation state and file list logic for tern.
//!
//! [NavState] owns the directory stack (every directory from `/` down to the working
//! directory), the directory and preview caches, the marked files and the bookkeeping of
//! requests in flight to the workers.
//!
//! The directory cache is the single home of every [Dir]: the stack only stores paths.
//! Replacing a snapshot in the cache therefore replaces it everywhere it is shown.
//!
//! Every load is tagged with a fresh request id. A snapshot is accepted only if its id
//! is the one still pending for its path and the path is still on the stack or in the
//! preview; anything else was superseded, never asked for, or navigated away from.

use crate::core::worker::{WorkerTask, Workers};
use crate::core::{Dir, FileEntry, Reg, SortType};

use tracing::debug;

use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Holds the navigation, selection and cache state.
pub(crate) struct NavState {
    dirs: Vec<PathBuf>,
    dir_cache: HashMap<PathBuf, Dir>,
    reg_cache: HashMap<PathBuf, Reg>,
    pending_dirs: HashMap<PathBuf, u64>,
    pending_regs: HashMap<PathBuf, u64>,
    focus: HashMap<PathBuf, OsString>,
    markers: HashSet<PathBuf>,
    request_id: u64,
    height: usize,
    scrolloff: usize,
    sort: SortType,
    dircache: bool,
}

impl NavState {
    pub(crate) fn new(sort: SortType, scrolloff: usize, dircache: bool) -> Self {
        Self {
            dirs: Vec::new(),
            dir_cache: HashMap::new(),
            reg_cache: HashMap::new(),
            pending_dirs: HashMap::new(),
            pending_regs: HashMap::new(),
            focus: HashMap::new(),
            markers: HashSet::new(),
            request_id: 0,
            height: 1,
            scrolloff,
            sort,
            dircache,
        }
    }

    // Getters / Accessors

    #[inline]
    pub(crate) fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub(crate) fn markers(&self) -> &HashSet<PathBuf> {
        &self.markers
    }

    #[inline]
    pub(crate) fn sort_type(&self) -> SortType {
        self.sort
    }

    /// The working directory, the top of the stack.
    pub(crate) fn wd(&self) -> Option<&Path> {
        self.dirs.last().map(PathBuf::as_path)
    }

    pub(crate) fn curr_dir(&self) -> Option<&Dir> {
        self.dirs.last().and_then(|p| self.dir_cache.get(p))
    }

    fn curr_dir_mut(&mut self) -> Option<&mut Dir> {
        let path = self.dirs.last()?;
        self.dir_cache.get_mut(path)
    }

    /// The directory shown left of the working directory.
    pub(crate) fn parent_dir(&self) -> Option<&Dir> {
        let n = self.dirs.len();
        if n < 2 {
            return None;
        }
        self.dir_cache.get(&self.dirs[n - 2])
    }

    pub(crate) fn curr_file(&self) -> Option<&FileEntry> {
        self.curr_dir()?.current()
    }

    pub(crate) fn curr_path(&self) -> Option<PathBuf> {
        self.curr_dir()?.current_path()
    }

    /// Cached snapshot of a directory, loaded or not.
    pub(crate) fn dir(&self, path: &Path) -> Option<&Dir> {
        self.dir_cache.get(path)
    }

    pub(crate) fn reg(&self, path: &Path) -> Option<&Reg> {
        self.reg_cache.get(path)
    }

    /// Whether `path` is on the stack or previewed under the cursor.
    fn is_shown(&self, path: &Path) -> bool {
        self.dirs.iter().any(|p| p == path)
            || (self.curr_file().is_some_and(FileEntry::is_dir)
                && self.curr_path().as_deref() == Some(path))
    }

    /// Whether a load for `path` is waiting on the workers.
    pub(crate) fn is_pending(&self, path: &Path) -> bool {
        self.pending_dirs.contains_key(path)
    }

    // Requests

    fn next_request(&mut self) -> u64 {
        self.request_id = self.request_id.wrapping_add(1);
        self.request_id
    }

    /// Asks the directory worker for a fresh snapshot of `path`.
    fn request_dir(&mut self, path: &Path, workers: &Workers) -> u64 {
        let id = self.next_request();
        self.pending_dirs.insert(path.to_path_buf(), id);
        let _ = workers.io_tx().send(WorkerTask::LoadDirectory {
            path: path.to_path_buf(),
            sort: self.sort,
            request_id: id,
        });
        id
    }

    /// Makes sure `path` is in the cache and up to date, requesting a load when it is not.
    pub(crate) fn load_dir(&mut self, path: &Path, workers: &Workers) {
        let reuse = self.dircache || self.pending_dirs.contains_key(path);
        match self.dir_cache.get(path) {
            Some(d) if reuse => {
                if self.pending_dirs.contains_key(path)
                    || (!d.is_loading() && !is_outdated(path, d))
                {
                    return;
                }
                let id = self.request_dir(path, workers);
                if let Some(d) = self.dir_cache.get_mut(path) {
                    d.mark_loading(id);
                }
            }
            Some(_) => {
                let id = self.request_dir(path, workers);
                if let Some(d) = self.dir_cache.get_mut(path) {
                    d.mark_loading(id);
                }
            }
            None => {
                let id = self.request_dir(path, workers);
                self.dir_cache
                    .insert(path.to_path_buf(), Dir::loading(path.to_path_buf(), id));
            }
        }
    }

    /// Rebuilds the stack for the working directory `wd`.
    pub(crate) fn get_dirs(&mut self, wd: &Path, workers: &Workers) {
        let mut stack: Vec<PathBuf> = wd.ancestors().map(Path::to_path_buf).collect();
        stack.reverse();

        for path in &stack {
            self.load_dir(path, workers);
        }
        self.dirs = stack;

        if !self.dircache {
            let keep: HashSet<&PathBuf> = self.dirs.iter().collect();
            self.dir_cache.retain(|p, _| keep.contains(p));
        }
        self.position();
    }

    /// Takes a snapshot from the directory worker. Returns `false` when it was not
    /// requested, a newer request for the same path is still pending, or the path is no
    /// longer shown.
    ///
    /// A snapshot of a directory that left the stack only clears its request, so the
    /// next visit asks again.
    pub(crate) fn accept_dir(&mut self, mut d: Dir) -> bool {
        match self.pending_dirs.get(d.path()) {
            Some(&id) if id == d.request_id() => {}
            _ => {
                debug!("dropping stale snapshot of {}", d.path().display());
                return false;
            }
        }
        self.pending_dirs.remove(d.path());
        if !self.is_shown(d.path()) {
            debug!("dropping snapshot of {} off the stack", d.path().display());
            return false;
        }

        if d.sort_type() != self.sort {
            d.resort(self.sort, self.height, self.scrolloff);
        }
        if let Some(prev) = self.dir_cache.get(d.path())
            && let Some(name) = prev.current_name()
        {
            d.set_ind(prev.ind());
            d.sel(&name, self.height, self.scrolloff);
        }
        if let Some(name) = self.focus.remove(d.path()) {
            d.sel(&name, self.height, self.scrolloff);
        }

        self.dir_cache.insert(d.path().to_path_buf(), d);
        self.position();
        true
    }

    /// Takes a preview from the preview worker, on the same terms as [Self::accept_dir].
    pub(crate) fn accept_reg(&mut self, r: Reg) -> bool {
        match self.pending_regs.get(r.path()) {
            Some(&id) if id == r.request_id() => {
                self.pending_regs.remove(r.path());
            }
            _ => return false,
        }
        self.reg_cache.insert(r.path().to_path_buf(), r);
        true
    }

    /// Requests whatever the preview pane needs for the file under the cursor: a directory
    /// snapshot or the head of a regular file.
    pub(crate) fn load_preview(&mut self, workers: &Workers) {
        let Some(entry) = self.curr_file() else {
            return;
        };
        let is_dir = entry.is_dir();
        let Some(path) = self.curr_path() else {
            return;
        };

        if is_dir {
            self.load_dir(&path, workers);
            return;
        }

        if let Some(r) = self.reg_cache.get(&path)
            && !is_outdated(&path, r)
        {
            return;
        }
        let id = self.next_request();
        self.pending_regs.insert(path.clone(), id);
        let _ = workers.preview_tx().send(WorkerTask::LoadPreview {
            path,
            max_lines: self.height,
            request_id: id,
        });
    }

    /// Reloads every directory on the stack whose contents changed since it was read.
    pub(crate) fn renew(&mut self, workers: &Workers) {
        let stack = self.dirs.clone();
        for path in &stack {
            let Some(d) = self.dir_cache.get(path) else {
                continue;
            };
            if self.pending_dirs.contains_key(path)
                || (!d.is_loading() && !is_outdated(path, d))
            {
                continue;
            }
            let id = self.request_dir(path, workers);
            if let Some(d) = self.dir_cache.get_mut(path) {
                d.mark_loading(id);
            }
        }
        self.markers.retain(|p| fs::symlink_metadata(p).is_ok());
    }

    /// Drops every cache and reads the stack again. Cursors survive by name.
    pub(crate) fn reload(&mut self, workers: &Workers) {
        let keep: HashSet<&PathBuf> = self.dirs.iter().collect();
        self.dir_cache.retain(|p, _| keep.contains(p));
        self.reg_cache.clear();
        self.pending_regs.clear();

        let stack = self.dirs.clone();
        for path in &stack {
            let id = self.request_dir(path, workers);
            if let Some(d) = self.dir_cache.get_mut(path) {
                d.mark_loading(id);
            }
        }
    }

    // Cursor

    /// Points every directory on the stack at its child, and bounds every cursor.
    pub(crate) fn position(&mut self) {
        let (height, scrolloff) = (self.height, self.scrolloff);
        for pair in self.dirs.windows(2) {
            let (parent, child) = (&pair[0], &pair[1]);
            let Some(name) = child.file_name() else {
                continue;
            };
            if let Some(d) = self.dir_cache.get_mut(parent) {
                d.sel(name, height, scrolloff);
            }
        }
        if let Some(d) = self.curr_dir_mut() {
            d.bound_pos(height, scrolloff);
        }
    }

    pub(crate) fn up(&mut self, n: usize) {
        let (h, s) = (self.height, self.scrolloff);
        if let Some(d) = self.curr_dir_mut() {
            d.move_cursor(-rows(n), h, s);
        }
    }

    pub(crate) fn down(&mut self, n: usize) {
        let (h, s) = (self.height, self.scrolloff);
        if let Some(d) = self.curr_dir_mut() {
            d.move_cursor(rows(n), h, s);
        }
    }

    pub(crate) fn top(&mut self) {
        self.up(usize::MAX);
    }

    pub(crate) fn bottom(&mut self) {
        self.down(usize::MAX);
    }

    /// Moves to the parent directory. Returns `false` at `/`.
    pub(crate) fn updir(&mut self, workers: &Workers) -> bool {
        let Some(parent) = self.wd().and_then(Path::parent).map(Path::to_path_buf) else {
            return false;
        };
        self.get_dirs(&parent, workers);
        true
    }

    /// Enters the directory under the cursor. Returns `false` if it is not a directory.
    pub(crate) fn open(&mut self, workers: &Workers) -> bool {
        if !self.curr_file().is_some_and(FileEntry::is_dir) {
            return false;
        }
        let Some(path) = self.curr_path() else {
            return false;
        };
        self.get_dirs(&path, workers);
        true
    }

    /// Changes the working directory to `path`, which must be a directory.
    pub(crate) fn cd(&mut self, path: &Path, workers: &Workers) -> Result<(), String> {
        let target = match self.wd() {
            Some(wd) if path.is_relative() => wd.join(path),
            _ => path.to_path_buf(),
        };
        let target = fs::canonicalize(&target).map_err(|e| format!("cd: {e}"))?;
        if !target.is_dir() {
            return Err(format!("cd: not a directory: {}", target.display()));
        }
        self.get_dirs(&target, workers);
        Ok(())
    }

    /// Moves to the directory of `path` and puts `path` under the cursor, now or as soon
    /// as the directory arrives.
    pub(crate) fn select(&mut self, path: &Path, workers: &Workers) -> Result<(), String> {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(format!("select: invalid path: {}", path.display()));
        };
        if self.wd() != Some(dir) {
            self.cd(dir, workers).map_err(|e| format!("select: {e}"))?;
        }
        self.focus_name(name);
        Ok(())
    }

    fn focus_name(&mut self, name: &OsStr) {
        let (h, s) = (self.height, self.scrolloff);
        let Some(wd) = self.dirs.last().cloned() else {
            return;
        };
        match self.dir_cache.get_mut(&wd) {
            Some(d) if !d.is_loading() => d.sel(name, h, s),
            _ => {}
        }
        if self.pending_dirs.contains_key(&wd) {
            self.focus.insert(wd, name.to_os_string());
        }
    }

    // Options

    /// Changes the sort criteria and re-sorts every cached directory.
    pub(crate) fn set_sort(&mut self, sort: SortType) {
        self.sort = sort;
    }

    pub(crate) fn sort(&mut self) {
        let (sort, h, s) = (self.sort, self.height, self.scrolloff);
        for d in self.dir_cache.values_mut() {
            d.resort(sort, h, s);
        }
        self.position();
    }

    pub(crate) fn set_scrolloff(&mut self, scrolloff: usize) {
        self.scrolloff = scrolloff;
    }

    pub(crate) fn set_dircache(&mut self, dircache: bool) {
        self.dircache = dircache;
    }

    /// Sets the number of rows of the file list. Cached previews were cut to the old
    /// height and are dropped when it changes.
    pub(crate) fn set_height(&mut self, height: usize) {
        let height = height.max(1);
        if height == self.height {
            return;
        }
        self.height = height;
        self.reg_cache.clear();
        self.position();
    }

    // Markers

    /// Marks or unmarks the file under the cursor.
    pub(crate) fn toggle(&mut self) {
        if let Some(path) = self.curr_path()
            && !self.markers.remove(&path)
        {
            self.markers.insert(path);
        }
    }

    pub(crate) fn unselect(&mut self) {
        self.markers.clear();
    }

    /// Marked files in path order.
    pub(crate) fn selection(&self) -> Vec<PathBuf> {
        let mut list: Vec<PathBuf> = self.markers.iter().cloned().collect();
        list.sort();
        list
    }

    /// Marked files, or the file under the cursor when nothing is marked.
    pub(crate) fn selection_or_current(&self) -> Vec<PathBuf> {
        if self.markers.is_empty() {
            self.curr_path().into_iter().collect()
        } else {
            self.selection()
        }
    }
}

fn rows(n: usize) -> isize {
    n.min(isize::MAX as usize) as isize
}

trait Loaded {
    fn loaded_at(&self) -> std::time::SystemTime;
}

impl Loaded for Dir {
    fn loaded_at(&self) -> std::time::SystemTime {
        self.load_time()
    }
}

impl Loaded for Reg {
    fn loaded_at(&self) -> std::time::SystemTime {
        self.load_time()
    }
}

/// Whether `path` was modified after `item` was read from it.
fn is_outdated(path: &Path, item: &impl Loaded) -> bool {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => mtime > item.loaded_at(),
        Err(_) => true,
    }
}

/// Integration tests for navigation
#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::error;
    use std::fs::File;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn nav() -> NavState {
        let mut nav = NavState::new(SortType::default(), 0, true);
        nav.set_height(20);
        nav
    }

    /// Feeds snapshots from the workers until nothing is pending.
    fn settle(nav: &mut NavState, workers: &Workers) -> Result<(), Box<dyn error::Error>> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !nav.pending_dirs.is_empty() {
            if Instant::now() > deadline {
                return Err("directory worker did not answer".into());
            }
            if let Ok(d) = workers.dir_rx().recv_timeout(Duration::from_millis(100)) {
                nav.accept_dir(d);
            }
        }
        Ok(())
    }

    fn workers() -> Workers {
        let (expr_tx, _expr_rx) = unbounded();
        Workers::spawn(expr_tx)
    }

    #[test]
    fn stack_runs_from_root_to_wd() -> Result<(), Box<dyn error::Error>> {
        let base = tempdir()?;
        let sub = base.path().join("sub");
        fs::create_dir(&sub)?;
        File::create(sub.join("file.txt"))?;

        let workers = workers();
        let mut nav = nav();
        nav.get_dirs(&sub, &workers);
        settle(&mut nav, &workers)?;

        assert_eq!(nav.dirs.first().map(PathBuf::as_path), Some(Path::new("/")));
        assert_eq!(nav.wd(), Some(sub.as_path()));
        let parent = nav.parent_dir().ok_or("no parent")?;
        assert_eq!(
            parent.current_name(),
            Some(OsString::from("sub")),
            "parent cursor points at the child"
        );
        assert_eq!(
            nav.curr_file().map(|f| f.name_str().to_string()),
            Some("file.txt".into())
        );
        Ok(())
    }

    #[test]
    fn superseded_snapshot_is_dropped() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().to_path_buf();
        let mut nav = nav();
        nav.dirs = vec![path.clone()];
        nav.pending_dirs.insert(path.clone(), 2);

        let old = Dir::read(path.clone(), SortType::default(), 1);
        assert!(!nav.accept_dir(old), "older request id");

        let unrequested = Dir::read(dir.path().join("x"), SortType::default(), 2);
        assert!(!nav.accept_dir(unrequested), "path never requested");

        let fresh = Dir::read(path.clone(), SortType::default(), 2);
        assert!(nav.accept_dir(fresh));
        assert!(!nav.is_pending(&path));

        let duplicate = Dir::read(path, SortType::default(), 2);
        assert!(!nav.accept_dir(duplicate), "already accepted");
        Ok(())
    }

    #[test]
    fn snapshot_off_the_stack_clears_its_request() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        let left = dir.path().join("left");
        fs::create_dir(&left)?;
        let mut nav = nav();
        nav.dirs = vec![dir.path().to_path_buf()];
        nav.pending_dirs.insert(left.clone(), 4);

        let snapshot = Dir::read(left.clone(), SortType::default(), 4);
        assert!(!nav.accept_dir(snapshot));
        assert!(!nav.is_pending(&left));
        assert!(nav.dir(&left).is_none());
        Ok(())
    }

    #[test]
    fn cursor_carries_forward_by_name() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        for name in ["a", "b", "c", "d"] {
            File::create(dir.path().join(name))?;
        }
        let workers = workers();
        let mut nav = nav();
        nav.get_dirs(dir.path(), &workers);
        settle(&mut nav, &workers)?;

        nav.down(2);
        assert_eq!(nav.curr_file().map(|f| f.name_str().to_string()), Some("c".into()));

        // a new file sorts before the cursor, the cursor must stay on "c"
        File::create(dir.path().join("0first"))?;
        nav.reload(&workers);
        settle(&mut nav, &workers)?;
        assert_eq!(nav.curr_file().map(|f| f.name_str().to_string()), Some("c".into()));
        Ok(())
    }

    #[test]
    fn select_focuses_after_load() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        for i in 0..10 {
            File::create(dir.path().join(format!("f{i}")))?;
        }
        let target = fs::canonicalize(dir.path())?.join("f7");

        let workers = workers();
        let mut nav = nav();
        nav.select(&target, &workers)?;
        settle(&mut nav, &workers)?;
        assert_eq!(nav.curr_path(), Some(target));
        Ok(())
    }

    #[test]
    fn markers_fall_back_to_current() -> Result<(), Box<dyn error::Error>> {
        let dir = tempdir()?;
        for name in ["x", "y", "z"] {
            File::create(dir.path().join(name))?;
        }
        let workers = workers();
        let mut nav = nav();
        nav.get_dirs(dir.path(), &workers);
        settle(&mut nav, &workers)?;

        assert_eq!(nav.selection_or_current(), vec![dir.path().join("x")]);

        nav.down(2);
        nav.toggle();
        nav.up(2);
        nav.toggle();
        assert_eq!(
            nav.selection_or_current(),
            vec![dir.path().join("x"), dir.path().join("z")]
        );
        nav.toggle();
        assert_eq!(nav.selection(), vec![dir.path().join("z")]);
        nav.unselect();
        assert!(nav.markers().is_empty());
        Ok(())
    }

    #[test]
    fn updir_stops_at_root() {
        let workers = workers();
        let mut nav = nav();
        nav.get_dirs(Path::new("/"), &workers);
        assert!(!nav.updir(&workers));
        assert_eq!(nav.wd(), Some(Path::new("/")));
    }
}
