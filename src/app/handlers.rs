//! Expression evaluation for tern.
//!
//! This module implements the [AppState] methods that evaluate command-language
//! expressions: option changes, user command definitions, shell statements and the
//! builtin commands. Key presses, remote messages, worker notifications and startup
//! commands all end up here.

use crate::app::AppState;
use crate::app::cmdline::JOB_PREFIX;
use crate::app::invalidate::Resync;
use crate::app::selection::{load_files, save_files};
use crate::core::command::Expr;
use crate::core::shell::ShellMode;
use crate::core::terminal::Screen;
use crate::core::worker::{FileOperation, WorkerTask};
use crate::utils::{expand_home_path, get_home};

use tracing::debug;

use std::io;
use std::path::{Path, PathBuf};

/// User commands calling user commands deeper than this are cut off.
const MAX_DEPTH: usize = 32;

fn count(args: &[String]) -> usize {
    args.first().and_then(|a| a.parse().ok()).unwrap_or(1)
}

/// AppState expression handlers
impl<'a> AppState<'a> {
    /// Evaluates one expression. Does nothing once the terminal is lost.
    pub(crate) fn eval(&mut self, screen: &mut dyn Screen, expr: &Expr) {
        self.eval_with(screen, expr, &[], 0);
    }

    fn eval_with(&mut self, screen: &mut dyn Screen, expr: &Expr, args: &[String], depth: usize) {
        if self.fatal {
            return;
        }
        match expr {
            Expr::Set { opt, val } => self.set_option(opt, val.as_deref()),
            Expr::Cmd { name, body } => {
                debug!("defining command {name}");
                self.cmds.insert(name.clone(), (**body).clone());
            }
            Expr::Shell {
                mode,
                value,
                args: own,
            } => {
                let args = if own.is_empty() { args } else { own };
                self.run_shell(screen, value, args, *mode);
            }
            Expr::List(exprs) => {
                for e in exprs {
                    self.eval_with(screen, e, args, depth);
                    if self.fatal {
                        break;
                    }
                }
            }
            Expr::Call { name, args } => self.call(screen, name, args, depth),
        }
    }

    fn call(&mut self, screen: &mut dyn Screen, name: &str, args: &[String], depth: usize) {
        if self.builtin(screen, name, args, depth) {
            return;
        }
        let Some(body) = self.cmds.get(name).cloned() else {
            self.echoerr(format!("command not found: {name}"));
            return;
        };
        if depth >= MAX_DEPTH {
            self.echoerr(format!("{name}: user commands nested too deep"));
            return;
        }
        self.eval_with(screen, &body, args, depth + 1);
    }

    /// Runs a builtin. Returns `false` if `name` is not one.
    fn builtin(&mut self, screen: &mut dyn Screen, name: &str, args: &[String], depth: usize) -> bool {
        match name {
            "quit" => {
                // one pending quit is enough
                let _ = self.quit_tx.try_send(());
            }

            // Navigation
            "up" => {
                self.nav.up(count(args));
                self.load_preview();
            }
            "down" => {
                self.nav.down(count(args));
                self.load_preview();
            }
            "top" => {
                self.nav.top();
                self.load_preview();
            }
            "bottom" => {
                self.nav.bottom();
                self.load_preview();
            }
            "updir" => {
                if self.nav.updir(&self.workers) {
                    self.load_preview();
                }
            }
            "open" => self.open(screen, depth),
            "cd" => self.change_dir(args),
            "select" => self.select(args),
            "reload" => {
                self.nav.reload(&self.workers);
                self.load_preview();
            }
            "load" => {
                self.nav.renew(&self.workers);
                self.load_preview();
            }
            "redraw" => self.invalidate.set(Resync::NavSize),

            // Messages
            "echo" => self.echo(args.join(" ")),
            "echomsg" => self.echomsg(args.join(" ")),
            "echoerr" => self.echoerr(args.join(" ")),

            // Selection and file operations
            "toggle" => self.nav.toggle(),
            "unselect" => self.nav.unselect(),
            "copy" => self.save_selection(true),
            "cut" => self.save_selection(false),
            "paste" => self.paste(),
            "clear" => self.clear_files(),
            "delete" => self.delete(),

            // Command line
            "read" => self.cmdline.open(':'),
            "shell" => self.cmdline.open('$'),
            "shell-pipe" => self.cmdline.open('%'),
            "shell-wait" => self.cmdline.open('!'),
            "shell-async" => self.cmdline.open('&'),
            "cmd-enter" => self.cmd_enter(screen),
            "cmd-escape" => {
                if !self.cmdline.shows_job() {
                    self.cmdline.close();
                }
            }
            "cmd-history-prev" => self.history_prev(),
            "cmd-history-next" => self.history_next(),
            "cmd-delete" => {
                self.cmdline.delete();
            }
            "cmd-insert" => self.cmdline.insert(&args.concat()),

            "job-done" => self.job_done(),
            _ => return false,
        }
        true
    }

    // Options

    fn set_option(&mut self, opt: &str, val: Option<&str>) {
        match self.opts.set(opt, val) {
            Ok(name) => self.apply_option(name),
            Err(e) => self.echoerr(format!("set: {e}")),
        }
    }

    /// Hands a changed option to whoever depends on it.
    fn apply_option(&mut self, name: &str) {
        match name {
            "sortby" | "reverse" | "hidden" | "dirfirst" => {
                self.nav.set_sort(self.opts.sort_type());
                self.invalidate.set(Resync::Sort);
            }
            "scrolloff" => {
                self.nav.set_scrolloff(self.opts.scrolloff());
                self.invalidate.set(Resync::Pos);
            }
            "period" => self.invalidate.set(Resync::Period),
            "mouse" => self.invalidate.set(Resync::Mouse),
            "preview" => self.invalidate.set(Resync::Dir),
            "dircache" => self.nav.set_dircache(self.opts.dircache()),
            _ => {}
        }
    }

    // Navigation

    fn open(&mut self, screen: &mut dyn Screen, depth: usize) {
        if self.nav.open(&self.workers) {
            self.load_preview();
            return;
        }
        if self.nav.curr_file().is_none() {
            return;
        }
        if let Some(body) = self.cmds.get("open").cloned()
            && depth < MAX_DEPTH
        {
            self.eval_with(screen, &body, &[], depth + 1);
        }
    }

    fn resolve(&self, arg: &str) -> PathBuf {
        let path = expand_home_path(Path::new(arg));
        match self.nav.wd() {
            Some(wd) if path.is_relative() => wd.join(path),
            _ => path,
        }
    }

    fn change_dir(&mut self, args: &[String]) {
        let target = match args.first() {
            Some(arg) => self.resolve(arg),
            None => match get_home() {
                Some(home) => home,
                None => {
                    self.echoerr("cd: home directory not found");
                    return;
                }
            },
        };
        match self.nav.cd(&target, &self.workers) {
            Ok(()) => self.load_preview(),
            Err(e) => self.echoerr(e),
        }
    }

    fn select(&mut self, args: &[String]) {
        let Some(arg) = args.first() else {
            self.echoerr("select: requires an argument");
            return;
        };
        let target = self.resolve(arg);
        match self.nav.select(&target, &self.workers) {
            Ok(()) => self.load_preview(),
            Err(e) => self.echoerr(e),
        }
    }

    // Messages

    /// Plain message, or the latest output line while a `%` job runs.
    fn echo(&mut self, text: String) {
        match self.job.as_mut() {
            Some(job) => job.set_output(text),
            None => self.cmdline.set_message(text),
        }
    }

    // Selection and file operations

    fn save_selection(&mut self, cp: bool) {
        let list = self.nav.selection_or_current();
        if list.is_empty() {
            self.echoerr(format!("{}: no file selected", if cp { "copy" } else { "cut" }));
            return;
        }
        match save_files(self.config.paths().files(), &list, cp) {
            Ok(()) => self.nav.unselect(),
            Err(e) => self.echoerr(format!("saving files: {e}")),
        }
    }

    fn paste(&mut self) {
        let files = self.config.paths().files();
        let (srcs, cp) = match load_files(files) {
            Ok(loaded) => loaded,
            Err(e) => {
                self.echoerr(format!("loading files: {e}"));
                return;
            }
        };
        if srcs.is_empty() {
            self.echoerr("paste: no file in copy/cut buffer");
            return;
        }
        let Some(dest) = self.nav.wd().map(Path::to_path_buf) else {
            return;
        };

        let op = if cp {
            FileOperation::Copy { srcs, dest }
        } else {
            FileOperation::Move { srcs, dest }
        };
        if let Err(e) = self.send_fileop(op) {
            self.echoerr(format!("paste: {e}"));
            return;
        }

        // a moved file can only be pasted once
        if !cp && let Err(e) = save_files(files, &[], false) {
            self.echoerr(format!("saving files: {e}"));
        }
    }

    fn clear_files(&mut self) {
        if let Err(e) = save_files(self.config.paths().files(), &[], false) {
            self.echoerr(format!("saving files: {e}"));
            return;
        }
        self.nav.unselect();
    }

    fn delete(&mut self) {
        let paths = self.nav.selection_or_current();
        if paths.is_empty() {
            self.echoerr("delete: no file selected");
            return;
        }
        let op = FileOperation::Delete {
            paths,
            trash: self.opts.move_to_trash(),
        };
        match self.send_fileop(op) {
            Ok(()) => self.nav.unselect(),
            Err(e) => self.echoerr(format!("delete: {e}")),
        }
    }

    fn send_fileop(&self, op: FileOperation) -> io::Result<()> {
        self.workers
            .fileop_tx()
            .send(WorkerTask::FileOp(op))
            .map_err(|_| io::Error::other("file operation worker is gone"))
    }

    // Command line

    fn cmd_enter(&mut self, screen: &mut dyn Screen) {
        let Some(prefix) = self.cmdline.prefix() else {
            return;
        };

        if prefix == JOB_PREFIX {
            let line = self.cmdline.take();
            let written = match self.job.as_mut() {
                Some(job) => job.write_line(&line),
                None => Ok(()),
            };
            if let Err(e) = written {
                self.echoerr(format!("writing stdin: {e}"));
            }
            return;
        }

        let value = self.cmdline.take();
        self.cmdline.close();
        if value.trim().is_empty() {
            return;
        }
        self.history.record(prefix, &value);

        match ShellMode::from_prefix(prefix) {
            Some(mode) => self.run_shell(screen, &value, &[], mode),
            None => self.run_fragment(screen, &value),
        }
    }

    fn history_prev(&mut self) {
        let Some(prefix) = self.cmdline.prefix() else {
            return;
        };
        if prefix == JOB_PREFIX {
            return;
        }
        if let Some(i) = self.history.prev_index(prefix, self.cmdline.history_ind()) {
            let value = self.history.entries()[i].value.clone();
            self.cmdline.recall(Some(i), &value);
        }
    }

    fn history_next(&mut self) {
        let (Some(prefix), Some(from)) = (self.cmdline.prefix(), self.cmdline.history_ind())
        else {
            return;
        };
        match self.history.next_index(prefix, from) {
            Some(i) => {
                let value = self.history.entries()[i].value.clone();
                self.cmdline.recall(Some(i), &value);
            }
            None => self.cmdline.recall(None, ""),
        }
    }
}
