//! Application State for tern.
//!
//! This module defines the [AppState] struct, which holds everything the reactor mutates:
//! - Configuration and the runtime options changed by `set`
//! - Navigation, command line, history and progress state
//! - The invalidation flags raised by handlers and resolved by the reactor
//! - Communication with worker threads via crossbeam_channel
//! - The running `%` job and the remote client, if any
//!
//! Only the reactor thread ever touches an [AppState]. Everything other threads produce
//! arrives as messages.

use crate::app::cmdline::CmdLine;
use crate::app::history::History;
use crate::app::invalidate::Invalidation;
use crate::app::keymap::Keymap;
use crate::app::nav::NavState;
use crate::app::progress::Progress;
use crate::app::shell::ShellJob;
use crate::config::{Config, General};
use crate::core::command::{Expr, Parser, parse};
use crate::core::remote::RemoteClient;
use crate::core::terminal::Screen;
use crate::core::worker::Workers;

use crossbeam_channel::{Receiver, Sender, never};
use tracing::{info, warn};

use std::collections::HashMap;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Main struct which holds the central application state of tern
pub(crate) struct AppState<'a> {
    pub(crate) config: &'a Config,
    pub(crate) opts: General,
    pub(crate) keymap: Keymap,

    pub(crate) nav: NavState,
    pub(crate) cmdline: CmdLine,
    pub(crate) history: History,
    pub(crate) progress: Progress,
    pub(crate) invalidate: Invalidation,

    pub(crate) workers: Workers,
    pub(crate) job: Option<ShellJob>,
    pub(crate) cmds: HashMap<String, Expr>,
    pub(crate) remote: Option<RemoteClient>,

    pub(crate) quit_tx: Sender<()>,
    pub(crate) expr_tx: Sender<Expr>,
    pub(crate) signal_rx: Receiver<i32>,

    pub(crate) fatal: bool,
    pub(crate) closed: bool,
    pub(crate) last_dir_path: Option<PathBuf>,
    pub(crate) client_id: u32,
}

impl<'a> AppState<'a> {
    /// `quit_tx` feeds the reactor's quit source and `expr_tx` its expression source.
    pub(crate) fn new(
        config: &'a Config,
        workers: Workers,
        quit_tx: Sender<()>,
        expr_tx: Sender<Expr>,
    ) -> Self {
        let opts = config.general().clone();
        let nav = NavState::new(opts.sort_type(), opts.scrolloff(), opts.dircache());

        let mut app = Self {
            config,
            keymap: Keymap::default(),
            nav,
            cmdline: CmdLine::default(),
            history: History::new(config.paths().history().to_path_buf()),
            progress: Progress::default(),
            invalidate: Invalidation::default(),
            workers,
            job: None,
            cmds: HashMap::new(),
            remote: None,
            quit_tx,
            expr_tx,
            signal_rx: never(),
            fatal: false,
            closed: false,
            last_dir_path: None,
            client_id: std::process::id(),
            opts,
        };

        for (name, body) in config.commands() {
            match parse(body) {
                Ok(mut exprs) => {
                    let expr = if exprs.len() == 1 {
                        exprs.remove(0)
                    } else {
                        Expr::List(exprs)
                    };
                    app.cmds.insert(name.clone(), expr);
                }
                Err(e) => app.echoerr(format!("command {name}: {e}")),
            }
        }
        app
    }

    pub(crate) fn with_remote(mut self, remote: Option<RemoteClient>) -> Self {
        if let Some(r) = &remote {
            self.client_id = r.id();
        }
        self.remote = remote;
        self
    }

    /// Lets foreground shell commands be cut short by terminating signals.
    pub(crate) fn with_signals(mut self, signal_rx: Receiver<i32>) -> Self {
        self.signal_rx = signal_rx;
        self
    }

    pub(crate) fn with_last_dir_path(mut self, path: Option<PathBuf>) -> Self {
        self.last_dir_path = path;
        self
    }

    // Getters/ accessors

    #[inline]
    pub(crate) fn config(&self) -> &Config {
        self.config
    }

    #[inline]
    pub(crate) fn opts(&self) -> &General {
        &self.opts
    }

    #[inline]
    pub(crate) fn nav(&self) -> &NavState {
        &self.nav
    }

    #[inline]
    pub(crate) fn cmdline(&self) -> &CmdLine {
        &self.cmdline
    }

    #[inline]
    pub(crate) fn progress(&self) -> &Progress {
        &self.progress
    }

    #[inline]
    pub(crate) fn job(&self) -> Option<&ShellJob> {
        self.job.as_ref()
    }

    #[inline]
    pub(crate) fn workers(&self) -> &Workers {
        &self.workers
    }

    #[inline]
    pub(crate) fn is_fatal(&self) -> bool {
        self.fatal
    }

    // Startup

    /// Reads the history file. Errors are shown, the session goes on with an empty history.
    pub(crate) fn load_history(&mut self) {
        if let Err(e) = self.history.load() {
            self.echoerr(format!("reading history file: {e}"));
        }
    }

    /// Builds the directory stack for `wd`.
    pub(crate) fn start(&mut self, wd: &Path) {
        self.nav.get_dirs(wd, &self.workers);
    }

    /// Parses and evaluates one command fragment. A parse error stops the fragment, but
    /// everything before it has already run.
    pub(crate) fn run_fragment(&mut self, screen: &mut dyn Screen, src: &str) {
        for parsed in Parser::new(src) {
            match parsed {
                Ok(expr) => self.eval(screen, &expr),
                Err(e) => {
                    self.echoerr(e.to_string());
                    break;
                }
            }
            if self.fatal {
                break;
            }
        }
    }

    // Messages

    pub(crate) fn echomsg(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.cmdline.set_message(msg);
    }

    pub(crate) fn echoerr(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{msg}");
        self.cmdline.set_error(msg);
    }

    // Preview

    /// Requests the preview of the file under the cursor, if previews are on.
    pub(crate) fn load_preview(&mut self) {
        if self.opts.preview() {
            self.nav.load_preview(&self.workers);
        }
    }

    // Shutdown

    /// Best effort teardown shared by quit and signals. Nothing here can fail the exit.
    /// Runs once, later calls do nothing.
    pub(crate) fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(job) = self.job.take() {
            job.stop();
        }
        if let Err(e) = self.history.persist() {
            warn!("writing history file: {e}");
        }
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.disconnect() {
                warn!("dropping connection to {}: {e}", remote.socket().display());
            }
            if self.opts.autoquit()
                && let Err(e) = remote.quit_server()
            {
                warn!("auto quitting server: {e}");
            }
        }
        self.workers.clear_preview();
        self.write_last_dir();
        info!("bye!");
    }

    fn write_last_dir(&self) {
        let (Some(file), Some(wd)) = (&self.last_dir_path, self.nav.wd()) else {
            return;
        };
        if let Err(e) = fs::write(file, wd.as_os_str().as_bytes()) {
            warn!("writing last dir file: {e}");
        }
    }
}
