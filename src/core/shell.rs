//! External shell process management for tern.
//!
//! Commands run through the configured shell in one of four modes selected by a one
//! character prefix:
//!
//! | Prefix | Mode           | Waits | Own process group | stdio                          |
//! |--------|----------------|-------|-------------------|--------------------------------|
//! | `$`    | [ShellMode::Sync]  | yes, terminal suspended | no  | inherited              |
//! | `%`    | [ShellMode::Pipe]  | no    | yes               | stdin/stdout piped, stderr merged |
//! | `!`    | [ShellMode::Wait]  | yes, then waits for a key | no | inherited           |
//! | `&`    | [ShellMode::Async] | no    | yes               | null                           |
//!
//! This module only builds and reaps processes. Terminal suspension and job bookkeeping
//! live in `app::shell`, on the reactor thread.

use crate::core::command::Expr;

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{debug, warn};

use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellMode {
    Sync,
    Pipe,
    Wait,
    Async,
}

impl ShellMode {
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            '$' => Some(ShellMode::Sync),
            '%' => Some(ShellMode::Pipe),
            '!' => Some(ShellMode::Wait),
            '&' => Some(ShellMode::Async),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            ShellMode::Sync => '$',
            ShellMode::Pipe => '%',
            ShellMode::Wait => '!',
            ShellMode::Async => '&',
        }
    }

    /// `$` and `!` hand the terminal to the child.
    pub fn takes_terminal(self) -> bool {
        matches!(self, ShellMode::Sync | ShellMode::Wait)
    }
}

/// Builds `shell [shellopts..] -c cmd -- args..`.
pub fn shell_command(shell: &str, shellopts: &[String], cmd: &str, args: &[String]) -> Command {
    let mut command = Command::new(shell);
    command.args(shellopts).arg("-c").arg(cmd).arg("--").args(args);
    command
}

/// A started `%` job: the child, its stdin, and the read end of the merged output pipe.
pub struct PipedChild {
    pub child: Child,
    pub stdin: Option<ChildStdin>,
    pub output: io::PipeReader,
}

/// Starts `command` with stdin piped and stdout/stderr merged into one pipe.
///
/// The command is consumed so that the parent's copies of the pipe's write end are closed
/// once the child is running, otherwise the reader would never see end-of-output.
pub fn spawn_piped(mut command: Command) -> io::Result<PipedChild> {
    let (output, writer) = io::pipe()?;
    let writer_err = writer.try_clone()?;

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::from(writer))
        .stderr(Stdio::from(writer_err))
        .process_group(0);

    let mut child = command.spawn()?;
    drop(command);

    let stdin = child.stdin.take();
    Ok(PipedChild {
        child,
        stdin,
        output,
    })
}

/// Starts `command` on the terminal. A helper thread waits for it and sends the exit
/// status on the returned channel, so the caller can wait on other sources at once.
pub fn spawn_foreground(
    mut command: Command,
) -> io::Result<(u32, Receiver<io::Result<ExitStatus>>)> {
    let mut child = command.spawn()?;
    let pid = child.id();
    let (done_tx, done_rx) = bounded(1);
    thread::Builder::new()
        .name("shell-wait".into())
        .spawn(move || {
            let _ = done_tx.send(child.wait());
        })?;
    Ok((pid, done_rx))
}

/// Sends `sig` to `pid`, or to the process group led by `pid` when `group` is set.
pub fn send_signal(pid: u32, sig: libc::c_int, group: bool) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let target = if group { -pid } else { pid };
    // SAFETY: kill only takes plain integers.
    if unsafe { libc::kill(target, sig) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Starts `command` detached from the terminal in its own process group.
pub fn spawn_detached(mut command: Command) -> io::Result<Child> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0);
    command.spawn()
}

/// Consumes `reader` byte by byte and calls `emit` with the current line buffer every time
/// the reader has nothing more buffered.
///
/// The buffer starts over on the first byte after a `\n` or `\r`, so `emit` sees the last
/// (possibly partial) line rather than the whole output.
pub fn stream_output<R: Read>(reader: R, mut emit: impl FnMut(String)) {
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::new();
    let mut eol = false;

    loop {
        let byte = match reader.fill_buf() {
            Ok([]) => break,
            Ok(buf) => buf[0],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("reading shell output: {e}");
                break;
            }
        };
        reader.consume(1);

        if eol {
            eol = false;
            line.clear();
        }
        line.push(byte);
        if byte == b'\n' || byte == b'\r' {
            eol = true;
        }

        if !reader.buffer().is_empty() {
            continue;
        }
        emit(String::from_utf8_lossy(&line).into_owned());
    }
}

/// Waits for a child and logs an abnormal exit. Wait failures are never shown to the user.
pub fn reap(mut child: Child) {
    match child.wait() {
        Ok(status) if !status.success() => warn!("running shell: {status}"),
        Ok(_) => {}
        Err(e) => warn!("running shell: {e}"),
    }
}

/// Spawns the detached reader for a `%` job.
///
/// Output is forwarded as `echo` expressions. At end-of-output the child is reaped and the
/// reactor is told with `job-done` followed by `reload`.
pub fn spawn_output_reader(piped: PipedChild, expr_tx: Sender<Expr>) {
    let PipedChild { child, output, .. } = piped;
    let spawned = thread::Builder::new()
        .name("shell-output".into())
        .spawn(move || {
            stream_output(output, |text| {
                let _ = expr_tx.send(Expr::call("echo", [text]));
            });
            reap(child);
            let _ = expr_tx.send(Expr::simple("job-done"));
            let _ = expr_tx.send(Expr::simple("reload"));
        });
    if let Err(e) = spawned {
        warn!("spawning shell output reader: {e}");
    }
}

/// Spawns the detached reaper for a `&` job.
pub fn spawn_reaper(child: Child) {
    if let Err(e) = thread::Builder::new()
        .name("shell-reaper".into())
        .spawn(move || reap(child))
    {
        warn!("spawning shell reaper: {e}");
    }
}
