//! Running shell commands from the reactor.
//!
//! [AppState::run_shell] exports the navigation state and the options into the child's
//! environment and then launches it according to its [ShellMode]. `$` and `!` hand the
//! terminal over and block the loop until the child exits or a terminating signal comes
//! in. `%` and `&` return at once; their children are waited on by detached threads that
//! only talk back through the expression channel.

use crate::app::AppState;
use crate::app::cmdline::JOB_PREFIX;
use crate::app::invalidate::Resync;
use crate::core::shell::{
    ShellMode, send_signal, shell_command, spawn_detached, spawn_foreground,
    spawn_output_reader, spawn_piped, spawn_reaper,
};
use crate::core::terminal::Screen;

use crossbeam_channel::{Receiver, select};
use tracing::{debug, error, info, warn};

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, Command, ExitStatus};

/// The running `%` job.
///
/// Its output arrives through `echo` expressions and only the latest line is kept.
pub(crate) struct ShellJob {
    pid: u32,
    mode: ShellMode,
    stdin: Option<ChildStdin>,
    output: String,
}

impl ShellJob {
    #[inline]
    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    #[inline]
    pub(crate) fn mode(&self) -> ShellMode {
        self.mode
    }

    #[inline]
    pub(crate) fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn set_output(&mut self, text: String) {
        self.output = text;
    }

    /// Sends one line to the job's stdin.
    pub(crate) fn write_line(&mut self, line: &str) -> io::Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin is closed"));
        };
        writeln!(stdin, "{line}")?;
        stdin.flush()
    }

    /// Closes the job's stdin and terminates its process group.
    pub(crate) fn stop(mut self) {
        self.stdin.take();
        if let Err(e) = send_signal(self.pid, libc::SIGTERM, true) {
            debug!("stopping job {}: {e}", self.pid);
        }
    }
}

impl AppState<'_> {
    /// `(name, value)` pairs exported to every shell child.
    pub(crate) fn shell_env(&self) -> Vec<(String, String)> {
        let lossy = |paths: Vec<PathBuf>| -> Vec<String> {
            paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect()
        };

        let current = lossy(self.nav.curr_path().into_iter().collect()).join("");
        let marked = lossy(self.nav.selection());
        let targets = lossy(self.nav.selection_or_current());

        let mut env = vec![
            ("f".to_string(), current),
            ("fs".to_string(), marked.join("\n")),
            ("fx".to_string(), targets.join("\n")),
            ("id".to_string(), self.client_id.to_string()),
        ];
        if let Some(wd) = self.nav.wd() {
            env.push(("PWD".to_string(), wd.to_string_lossy().into_owned()));
        }
        env.extend(self.opts.exports());
        env
    }

    fn build_command(&self, cmd: &str, args: &[String]) -> Command {
        let mut command = shell_command(self.opts.shell(), self.opts.shellopts(), cmd, args);
        command.envs(self.shell_env());
        if let Some(wd) = self.nav.wd() {
            command.current_dir(wd);
        }
        command
    }

    /// Runs `cmd` with `args` in `mode`.
    pub(crate) fn run_shell(
        &mut self,
        screen: &mut dyn Screen,
        cmd: &str,
        args: &[String],
        mode: ShellMode,
    ) {
        debug!("running shell {}{cmd}", mode.prefix());
        if which::which(self.opts.shell()).is_err() {
            self.echoerr(format!("shell not found: {}", self.opts.shell()));
            return;
        }
        match mode {
            m if m.takes_terminal() => self.run_foreground(screen, cmd, args, m),
            ShellMode::Pipe => self.run_piped(cmd, args),
            _ => match spawn_detached(self.build_command(cmd, args)) {
                Ok(child) => spawn_reaper(child),
                Err(e) => self.echoerr(format!("running shell: {e}")),
            },
        }
        self.load_preview();
    }

    fn run_foreground(
        &mut self,
        screen: &mut dyn Screen,
        cmd: &str,
        args: &[String],
        mode: ShellMode,
    ) {
        let command = self.build_command(cmd, args);

        self.workers.clear_preview();
        if let Err(e) = screen.suspend() {
            warn!("suspend: {e}");
        }

        match spawn_foreground(command) {
            Ok((pid, done_rx)) => {
                if let Some(sig) = self.wait_foreground(&done_rx) {
                    info!("received signal {sig} while running shell, shutting down");
                    if let Err(e) = send_signal(pid, sig, false) {
                        debug!("forwarding signal {sig} to {pid}: {e}");
                    }
                    self.shutdown();
                    self.fatal = true;
                    return;
                }
            }
            Err(e) => self.echoerr(format!("running shell: {e}")),
        }

        if mode == ShellMode::Wait
            && let Err(e) = screen.wait_key()
        {
            warn!("waiting for key: {e}");
        }

        if let Err(e) = screen.resume() {
            error!("resume: {e}");
            self.fatal = true;
            return;
        }

        self.nav.renew(&self.workers);
        self.invalidate.set(Resync::NavSize);
        self.invalidate.set(Resync::Dir);
    }

    /// Waits for a foreground child. Returns the signal that cut the wait short, if any.
    fn wait_foreground(&mut self, done_rx: &Receiver<io::Result<ExitStatus>>) -> Option<i32> {
        let done = select! {
            recv(done_rx) -> msg => msg,
            recv(self.signal_rx) -> msg => match msg {
                Ok(sig) => return Some(sig),
                Err(_) => done_rx.recv(),
            },
        };
        match done {
            Ok(Ok(status)) if !status.success() => debug!("running shell: {status}"),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => self.echoerr(format!("running shell: {e}")),
            Err(_) => warn!("shell waiter exited without a status"),
        }
        None
    }

    fn run_piped(&mut self, cmd: &str, args: &[String]) {
        if self.job.is_some() || self.cmdline.shows_job() {
            self.echoerr("running shell: a piped job is already running");
            return;
        }

        let mut piped = match spawn_piped(self.build_command(cmd, args)) {
            Ok(piped) => piped,
            Err(e) => {
                self.echoerr(format!("running shell: {e}"));
                return;
            }
        };

        self.job = Some(ShellJob {
            pid: piped.child.id(),
            mode: ShellMode::Pipe,
            stdin: piped.stdin.take(),
            output: String::new(),
        });
        self.cmdline.open(JOB_PREFIX);
        spawn_output_reader(piped, self.expr_tx.clone());
    }

    /// Called when the output reader saw the end of a `%` job.
    pub(crate) fn job_done(&mut self) {
        if let Some(job) = self.job.take() {
            debug!("job {} finished", job.pid());
        }
        if self.cmdline.shows_job() {
            self.cmdline.close();
        }
    }
}
