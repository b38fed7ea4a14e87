//! Process signal supervision.
//!
//! `SIGINT`, `SIGHUP`, `SIGQUIT` and `SIGTERM` are blocked in every thread by
//! [block_signals], which must run before any other thread is spawned. A dedicated
//! supervisor thread then takes them synchronously with `sigwait`:
//!
//! - `SIGINT` is ignored. Interactive interrupts reach the UI as key events.
//! - `SIGHUP`, `SIGQUIT` and `SIGTERM` are forwarded to the reactor, which runs the
//!   shutdown sequence without the quit gate and exits with [EXIT_FORCED]. A reactor
//!   waiting on a foreground shell command sees the signal too and forwards it to the
//!   child. If the reactor has not exited after [SHUTDOWN_GRACE], the supervisor restores
//!   the terminal and exits the process itself.
//!
//! Child processes start with an empty signal mask, so shell commands still see these
//! signals normally.

use crate::core::terminal::{EXIT_FORCED, restore_terminal};

use crossbeam_channel::Sender;
use tracing::{info, warn};

use std::io;
use std::thread;
use std::time::Duration;

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const HANDLED: [libc::c_int; 4] = [libc::SIGINT, libc::SIGHUP, libc::SIGQUIT, libc::SIGTERM];

/// The set of signals taken over by the supervisor.
#[derive(Clone, Copy)]
pub struct SignalSet(libc::sigset_t);

/// Blocks the handled signals in the calling thread. Threads spawned afterwards inherit
/// the mask.
pub fn block_signals() -> io::Result<SignalSet> {
    // SAFETY: the set is initialised by sigemptyset before use and only read afterwards.
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        for sig in HANDLED {
            libc::sigaddset(&mut set, sig);
        }
        let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(SignalSet(set))
    }
}

fn wait_signal(set: &SignalSet) -> io::Result<libc::c_int> {
    let mut sig: libc::c_int = 0;
    // SAFETY: `set` is a valid, initialised signal set and `sig` a valid out pointer.
    let rc = unsafe { libc::sigwait(&set.0, &mut sig) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(sig)
}

/// Starts the supervisor thread. `signal_tx` feeds the reactor's signal source.
pub fn spawn_supervisor(set: SignalSet, signal_tx: Sender<i32>) -> io::Result<()> {
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            loop {
                let sig = match wait_signal(&set) {
                    Ok(sig) => sig,
                    Err(e) => {
                        warn!("waiting for signals: {e}");
                        return;
                    }
                };
                if sig == libc::SIGINT {
                    continue;
                }

                info!("received signal {sig}, shutting down");
                let _ = signal_tx.send(sig);
                thread::sleep(SHUTDOWN_GRACE);

                warn!("reactor did not exit after signal {sig}, forcing exit");
                restore_terminal();
                std::process::exit(EXIT_FORCED);
            }
        })?;
    Ok(())
}
