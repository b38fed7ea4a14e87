//! Worker threads for tern.
//!
//! Handles directory reads, file previews and file operations on background threads.
//! Workers never touch application state: every result goes back to the reactor as an
//! immutable message on a channel.
//!
//! - Directory snapshots arrive as [Dir] on [Workers::dir_rx].
//! - File previews arrive as [Reg] on [Workers::reg_rx].
//! - File operations report their progress as [ProgressDelta] on [Workers::progress_rx] and
//!   their completion or errors as command expressions (`load`, `echoerr`) on the
//!   expression channel handed to [Workers::spawn].
//!
//! # Caution:
//! This module is a central protocol boundary. Adding or editing task variants usually
//! needs matching changes in the reactor and in the navigation state.

use crate::core::command::Expr;
use crate::core::{Dir, Reg, SortType};
use crate::utils::{copy_recursive, get_unused_path};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

/// Size of a single copy chunk. Each chunk is reported as one [ProgressDelta::CopyBytes].
pub const COPY_CHUNK: usize = 4096;

/// Manages worker threads channels for different task types.
///
/// Directory reads, previews and file operations each have their own dedicated thread.
pub struct Workers {
    io_tx: Sender<WorkerTask>,
    preview_tx: Sender<WorkerTask>,
    fileop_tx: Sender<WorkerTask>,
    dir_rx: Receiver<Dir>,
    reg_rx: Receiver<Reg>,
    progress_rx: Receiver<ProgressDelta>,
}

impl Workers {
    /// Create the worker set.
    ///
    /// `expr_tx` receives the completion and error expressions of file operations.
    pub fn spawn(expr_tx: Sender<Expr>) -> Self {
        let (io_tx, io_rx) = unbounded::<WorkerTask>();
        let (preview_tx, preview_rx) = unbounded::<WorkerTask>();
        let (fileop_tx, fileop_rx) = unbounded::<WorkerTask>();
        let (dir_tx, dir_rx) = unbounded::<Dir>();
        let (reg_tx, reg_rx) = unbounded::<Reg>();
        let (progress_tx, progress_rx) = unbounded::<ProgressDelta>();

        start_io_worker(io_rx, dir_tx);
        start_preview_worker(preview_rx, reg_tx);
        start_fileop_worker(fileop_rx, progress_tx, expr_tx);

        Self {
            io_tx,
            preview_tx,
            fileop_tx,
            dir_rx,
            reg_rx,
            progress_rx,
        }
    }

    #[inline]
    pub fn io_tx(&self) -> &Sender<WorkerTask> {
        &self.io_tx
    }

    #[inline]
    pub fn preview_tx(&self) -> &Sender<WorkerTask> {
        &self.preview_tx
    }

    #[inline]
    pub fn fileop_tx(&self) -> &Sender<WorkerTask> {
        &self.fileop_tx
    }

    #[inline]
    pub fn dir_rx(&self) -> &Receiver<Dir> {
        &self.dir_rx
    }

    #[inline]
    pub fn reg_rx(&self) -> &Receiver<Reg> {
        &self.reg_rx
    }

    #[inline]
    pub fn progress_rx(&self) -> &Receiver<ProgressDelta> {
        &self.progress_rx
    }

    /// Drops any preview work still queued. Sent before the terminal is handed to a child
    /// and at quit.
    pub fn clear_preview(&self) {
        let _ = self.preview_tx.send(WorkerTask::ClearPreview);
    }
}

/// Tasks sent to the worker threads via channel.
#[derive(Debug)]
pub enum WorkerTask {
    LoadDirectory {
        path: PathBuf,
        sort: SortType,
        request_id: u64,
    },
    LoadPreview {
        path: PathBuf,
        max_lines: usize,
        request_id: u64,
    },
    ClearPreview,
    FileOp(FileOperation),
}

/// Supported file system operations the worker can perform.
#[derive(Debug, Clone)]
pub enum FileOperation {
    Copy { srcs: Vec<PathBuf>, dest: PathBuf },
    Move { srcs: Vec<PathBuf>, dest: PathBuf },
    Delete { paths: Vec<PathBuf>, trash: bool },
}

/// Progress deltas of running file operations.
///
/// A `*Total` delta announces (positive) or retracts (negative) work. Each count delta
/// reports finished work: bytes for copies, files for moves and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressDelta {
    CopyBytes(i64),
    CopyTotal(i64),
    MoveCount(i64),
    MoveTotal(i64),
    DeleteCount(i64),
    DeleteTotal(i64),
}

/// Starts the io worker thread, which reads directories and sends back [Dir] snapshots.
///
/// Read errors are carried inside the snapshot so the reactor can still replace the
/// loading placeholder.
fn start_io_worker(task_rx: Receiver<WorkerTask>, dir_tx: Sender<Dir>) {
    thread::spawn(move || {
        while let Ok(task) = task_rx.recv() {
            let WorkerTask::LoadDirectory {
                path,
                sort,
                request_id,
            } = task
            else {
                continue;
            };
            let dir = Dir::read(path, sort, request_id);
            if let Some(err) = dir.error() {
                debug!("reading directory {}: {err}", dir.path().display());
            }
            if dir_tx.send(dir).is_err() {
                break;
            }
        }
    });
}

/// Starts the preview worker thread.
///
/// Queued requests are coalesced so only the newest one is read. A queued
/// [WorkerTask::ClearPreview] discards everything before it.
fn start_preview_worker(task_rx: Receiver<WorkerTask>, reg_tx: Sender<Reg>) {
    thread::spawn(move || {
        while let Ok(task) = task_rx.recv() {
            let mut latest = match task {
                WorkerTask::LoadPreview {
                    path,
                    max_lines,
                    request_id,
                } => Some((path, max_lines, request_id)),
                _ => None,
            };

            // Coalesce multiple LoadPreview tasks to only process the latest
            while let Ok(next) = task_rx.try_recv() {
                match next {
                    WorkerTask::LoadPreview {
                        path,
                        max_lines,
                        request_id,
                    } => latest = Some((path, max_lines, request_id)),
                    WorkerTask::ClearPreview => latest = None,
                    _ => {}
                }
            }

            let Some((path, max_lines, request_id)) = latest else {
                continue;
            };
            if reg_tx.send(Reg::read(path, max_lines, request_id)).is_err() {
                break;
            }
        }
    });
}

/// Starts the file operation worker thread.
///
/// Operations run one at a time in the order they were queued.
fn start_fileop_worker(
    task_rx: Receiver<WorkerTask>,
    progress_tx: Sender<ProgressDelta>,
    expr_tx: Sender<Expr>,
) {
    thread::spawn(move || {
        while let Ok(task) = task_rx.recv() {
            let WorkerTask::FileOp(op) = task else {
                continue;
            };
            let errors = match op {
                FileOperation::Copy { srcs, dest } => run_copy(&srcs, &dest, &progress_tx),
                FileOperation::Move { srcs, dest } => run_move(&srcs, &dest, &progress_tx),
                FileOperation::Delete { paths, trash } => {
                    run_delete(&paths, trash, &progress_tx)
                }
            };
            for err in errors {
                warn!("{err}");
                let _ = expr_tx.send(Expr::call("echoerr", [err]));
            }
            let _ = expr_tx.send(Expr::simple("load"));
        }
    });
}

/// Copies every source into `dest`, reporting bytes per chunk.
///
/// The total is announced before the first byte and retracted at the end. Bytes that
/// were announced but never copied because of an error are reported at the end so the
/// byte counter returns to where it started.
fn run_copy(srcs: &[PathBuf], dest: &Path, progress: &Sender<ProgressDelta>) -> Vec<String> {
    let total: u64 = srcs.iter().map(|s| tree_size(s)).sum();
    let total = total as i64;
    let _ = progress.send(ProgressDelta::CopyTotal(total));

    let mut copied: u64 = 0;
    let mut errors = Vec::new();
    for src in srcs {
        let Some(name) = src.file_name() else {
            errors.push(format!("copy: invalid source {}", src.display()));
            continue;
        };
        let target = get_unused_path(&dest.join(name));
        if let Err(e) = copy_tree(src, &target, progress, &mut copied) {
            errors.push(format!("copy {}: {e}", src.display()));
        }
    }

    let missing = total - copied as i64;
    if missing > 0 {
        let _ = progress.send(ProgressDelta::CopyBytes(missing));
    }
    let _ = progress.send(ProgressDelta::CopyTotal(-total));
    errors
}

/// Sum of the sizes of all regular files below `path`. Unreadable parts count as zero.
fn tree_size(path: &Path) -> u64 {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !meta.is_dir() {
        return if meta.is_file() { meta.len() } else { 0 };
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|e| tree_size(&e.path()))
        .sum()
}

fn copy_tree(
    src: &Path,
    dest: &Path,
    progress: &Sender<ProgressDelta>,
    copied: &mut u64,
) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(src)?;
        return std::os::unix::fs::symlink(target, dest);
    }

    if file_type.is_dir() {
        fs::create_dir_all(dest)?;
        fs::set_permissions(dest, meta.permissions())?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_tree(&entry.path(), &dest.join(entry.file_name()), progress, copied)?;
        }
        return Ok(());
    }

    let mut reader = File::open(src)?;
    let mut writer = File::create(dest)?;
    let mut buf = [0u8; COPY_CHUNK];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        *copied += n as u64;
        let _ = progress.send(ProgressDelta::CopyBytes(n as i64));
    }
    fs::set_permissions(dest, meta.permissions())?;
    Ok(())
}

/// Moves every source into `dest`. A rename across file systems falls back to
/// copy-then-remove.
fn run_move(srcs: &[PathBuf], dest: &Path, progress: &Sender<ProgressDelta>) -> Vec<String> {
    let total = srcs.len() as i64;
    let _ = progress.send(ProgressDelta::MoveTotal(total));

    let mut errors = Vec::new();
    for src in srcs {
        let result = match src.file_name() {
            Some(name) => move_one(src, &get_unused_path(&dest.join(name))),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no file name",
            )),
        };
        if let Err(e) = result {
            errors.push(format!("move {}: {e}", src.display()));
        }
        let _ = progress.send(ProgressDelta::MoveCount(1));
    }

    let _ = progress.send(ProgressDelta::MoveTotal(-total));
    errors
}

fn move_one(src: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(src, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_recursive(src, target)?;
            if fs::symlink_metadata(src)?.is_dir() {
                fs::remove_dir_all(src)
            } else {
                fs::remove_file(src)
            }
        }
        Err(e) => Err(e),
    }
}

fn run_delete(paths: &[PathBuf], trash: bool, progress: &Sender<ProgressDelta>) -> Vec<String> {
    let total = paths.len() as i64;
    let _ = progress.send(ProgressDelta::DeleteTotal(total));

    let mut errors = Vec::new();
    for path in paths {
        let result = if trash {
            trash::delete(path).map_err(io::Error::other)
        } else {
            match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
                Ok(_) => fs::remove_file(path),
                Err(e) => Err(e),
            }
        };
        if let Err(e) = result {
            errors.push(format!("delete {}: {e}", path.display()));
        }
        let _ = progress.send(ProgressDelta::DeleteCount(1));
    }

    let _ = progress.send(ProgressDelta::DeleteTotal(-total));
    errors
}

/// Worker threads integration tests.
#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, rng};
    use std::env;
    use std::time::Duration;
    use tempfile::tempdir;

    fn drain_progress(workers: &Workers) -> Vec<ProgressDelta> {
        let mut out = Vec::new();
        while let Ok(d) = workers.progress_rx().recv_timeout(Duration::from_millis(200)) {
            out.push(d);
        }
        out
    }

    fn wait_for_load(rx: &Receiver<Expr>) -> Result<Vec<Expr>, Box<dyn std::error::Error>> {
        let mut seen = Vec::new();
        loop {
            let expr = rx.recv_timeout(Duration::from_secs(5))?;
            if expr == Expr::simple("load") {
                return Ok(seen);
            }
            seen.push(expr);
        }
    }

    #[test]
    fn test_worker_load_current_dir() -> Result<(), Box<dyn std::error::Error>> {
        let (expr_tx, _expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);
        let curr_dir = env::current_dir()?;

        workers.io_tx().send(WorkerTask::LoadDirectory {
            path: curr_dir.clone(),
            sort: SortType::default(),
            request_id: 1,
        })?;

        let dir = workers.dir_rx().recv_timeout(Duration::from_secs(2))?;
        assert_eq!(dir.path(), curr_dir);
        assert_eq!(dir.request_id(), 1);
        assert!(!dir.is_loading());
        assert!(!dir.files().is_empty(), "Current dir should not be empty");
        Ok(())
    }

    #[test]
    fn worker_dir_load_requests_multithreaded() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = tempdir()?;
        let safe_subdir = temp_dir.path().join("tern_test_safe_dir");
        fs::create_dir_all(&safe_subdir)?;
        let dirs = vec![
            env::current_dir()?,
            temp_dir.path().to_path_buf(),
            safe_subdir,
        ];

        let thread_count = 2;
        let requests_per_thread = 25;

        let (expr_tx, _expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);

        let mut handles = Vec::new();
        for t in 0..thread_count {
            let task_tx = workers.io_tx().clone();
            let dirs = dirs.clone();
            handles.push(thread::spawn(move || {
                let mut rng = rng();
                for i in 0..requests_per_thread {
                    let dir = &dirs[rng.random_range(0..dirs.len())];
                    let sort = SortType {
                        hidden: rng.random_bool(0.5),
                        dirfirst: rng.random_bool(0.5),
                        reverse: rng.random_bool(0.5),
                        ..SortType::default()
                    };
                    task_tx
                        .send(WorkerTask::LoadDirectory {
                            path: dir.clone(),
                            sort,
                            request_id: (t * requests_per_thread + i) as u64,
                        })
                        .expect("Couldn't send task to worker");
                }
            }));
        }
        for h in handles {
            if let Err(err) = h.join() {
                panic!("Thread panicked during stress test: {:?}", err);
            }
        }

        let total_requests = thread_count * requests_per_thread;
        let mut ids = std::collections::HashSet::new();
        for _ in 0..total_requests {
            let dir = workers.dir_rx().recv_timeout(Duration::from_secs(2))?;
            assert!(dir.error().is_none());
            for entry in dir.files() {
                assert!(!entry.name_str().is_empty());
            }
            ids.insert(dir.request_id());
        }
        assert_eq!(ids.len(), total_requests, "every request answered once");
        Ok(())
    }

    #[test]
    fn test_preview_worker_reads_lines() -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempdir()?;
        let preview_file = temp.path().join("preview.txt");
        fs::write(&preview_file, "A\nB\nC\nD\n")?;

        let (expr_tx, _expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);
        workers.preview_tx().send(WorkerTask::LoadPreview {
            path: preview_file.clone(),
            max_lines: 2,
            request_id: 3,
        })?;

        let reg = workers.reg_rx().recv_timeout(Duration::from_secs(2))?;
        assert_eq!(reg.path(), preview_file);
        assert_eq!(reg.lines(), ["A", "B"]);
        assert_eq!(reg.request_id(), 3);
        Ok(())
    }

    #[test]
    fn copy_reports_chunks_and_retracts_total() -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempdir()?;
        let src_dir = temp.path().join("src");
        let dest = temp.path().join("dest");
        fs::create_dir_all(src_dir.join("nested"))?;
        fs::create_dir_all(&dest)?;
        fs::write(src_dir.join("big.bin"), vec![7u8; COPY_CHUNK * 2 + 100])?;
        fs::write(src_dir.join("nested/small.txt"), "hello")?;

        let (expr_tx, expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);
        workers
            .fileop_tx()
            .send(WorkerTask::FileOp(FileOperation::Copy {
                srcs: vec![src_dir.clone()],
                dest: dest.clone(),
            }))?;

        let errors = wait_for_load(&expr_rx)?;
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(fs::read(dest.join("src/nested/small.txt"))?, b"hello");
        assert_eq!(
            fs::metadata(dest.join("src/big.bin"))?.len(),
            (COPY_CHUNK * 2 + 100) as u64
        );

        let deltas = drain_progress(&workers);
        let expected = (COPY_CHUNK * 2 + 105) as i64;
        assert_eq!(deltas.first(), Some(&ProgressDelta::CopyTotal(expected)));
        assert_eq!(deltas.last(), Some(&ProgressDelta::CopyTotal(-expected)));
        let bytes: i64 = deltas
            .iter()
            .filter_map(|d| match d {
                ProgressDelta::CopyBytes(n) => Some(*n),
                _ => None,
            })
            .sum();
        assert_eq!(bytes, expected);
        let chunks = deltas
            .iter()
            .filter(|d| matches!(d, ProgressDelta::CopyBytes(_)))
            .count();
        assert_eq!(chunks, 4, "two full chunks, one tail, one small file");
        Ok(())
    }

    #[test]
    fn move_and_delete_report_counts() -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempdir()?;
        let a = temp.path().join("a.txt");
        let b = temp.path().join("b.txt");
        let dest = temp.path().join("dest");
        fs::write(&a, "a")?;
        fs::write(&b, "b")?;
        fs::create_dir_all(&dest)?;

        let (expr_tx, expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);
        workers
            .fileop_tx()
            .send(WorkerTask::FileOp(FileOperation::Move {
                srcs: vec![a.clone(), b.clone()],
                dest: dest.clone(),
            }))?;
        assert!(wait_for_load(&expr_rx)?.is_empty());
        assert!(!a.exists() && dest.join("a.txt").exists());
        assert_eq!(
            drain_progress(&workers),
            [
                ProgressDelta::MoveTotal(2),
                ProgressDelta::MoveCount(1),
                ProgressDelta::MoveCount(1),
                ProgressDelta::MoveTotal(-2),
            ]
        );

        let missing = temp.path().join("missing");
        workers
            .fileop_tx()
            .send(WorkerTask::FileOp(FileOperation::Delete {
                paths: vec![dest.clone(), missing],
                trash: false,
            }))?;
        let errors = wait_for_load(&expr_rx)?;
        assert_eq!(errors.len(), 1, "missing path is reported: {errors:?}");
        assert!(matches!(&errors[0], Expr::Call { name, .. } if name == "echoerr"));
        assert!(!dest.exists());
        assert_eq!(
            drain_progress(&workers),
            [
                ProgressDelta::DeleteTotal(2),
                ProgressDelta::DeleteCount(1),
                ProgressDelta::DeleteCount(1),
                ProgressDelta::DeleteTotal(-2),
            ]
        );
        Ok(())
    }

    #[test]
    fn copy_into_existing_name_picks_unused_path() -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempdir()?;
        let src = temp.path().join("notes.txt");
        fs::write(&src, "x")?;

        let (expr_tx, expr_rx) = unbounded();
        let workers = Workers::spawn(expr_tx);
        workers
            .fileop_tx()
            .send(WorkerTask::FileOp(FileOperation::Copy {
                srcs: vec![src.clone()],
                dest: temp.path().to_path_buf(),
            }))?;
        assert!(wait_for_load(&expr_rx)?.is_empty());
        assert!(temp.path().join("notes_1.txt").exists());
        Ok(())
    }
}
