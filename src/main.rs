//! main.rs
//! Entry point for tern

pub(crate) mod app;
pub(crate) mod config;
pub(crate) mod core;
pub(crate) mod ui;
pub(crate) mod utils;

use crate::app::AppState;
use crate::app::reactor::{Reactor, Sources};
use crate::config::Config;
use crate::core::command::Expr;
use crate::core::remote::RemoteClient;
use crate::core::signals::{block_signals, spawn_supervisor};
use crate::core::terminal::{InputControl, TermScreen, restore_terminal, spawn_input_reader};
use crate::core::worker::Workers;
use crate::utils::cli::{CliAction, handle_args, start_location};

use anyhow::Context;
use crossbeam_channel::{bounded, unbounded};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|info| {
        restore_terminal();

        eprintln!("\n[tern] Error occurred: {}", info);

        #[cfg(debug_assertions)]
        {
            let bt = std::backtrace::Backtrace::force_capture();
            eprintln!("\nStack Backtrace:\n{}", bt);
        }
    }));

    // before any thread exists, so every thread inherits the mask
    let signals = block_signals().context("blocking signals")?;

    let opts = match handle_args() {
        CliAction::RunApp(opts) => opts,
        CliAction::Exit => return Ok(()),
    };

    if let Some(path) = &opts.log {
        init_logging(path)?;
    }

    let config = Config::load();

    let (wd, selection) = match start_location(&opts) {
        Ok(start) => start,
        Err(e) => {
            eprintln!("\n[tern] Error: {e}");
            std::process::exit(1);
        }
    };

    let (quit_tx, quit_rx) = bounded(1);
    let (signal_tx, signal_rx) = unbounded();
    let (input_tx, input_rx) = unbounded();
    let (expr_tx, expr_rx) = unbounded();

    spawn_supervisor(signals, signal_tx).context("starting the signal supervisor")?;
    let workers = Workers::spawn(expr_tx.clone());

    let shell_signal_rx = signal_rx.clone();
    let mut sources = Sources::standalone(quit_rx, signal_rx, input_rx, expr_rx);
    let remote = match &opts.socket {
        Some(socket) => {
            let client = RemoteClient::new(socket.clone(), std::process::id());
            let (remote_tx, remote_rx) = unbounded();
            match client.listen(remote_tx) {
                Ok(()) => {
                    sources = sources.with_remote(remote_rx);
                    Some(client)
                }
                Err(e) => {
                    warn!("connecting to server {}: {e}", socket.display());
                    None
                }
            }
        }
        None => None,
    };

    let input = InputControl::default();
    let mut screen = TermScreen::new(input.clone()).context("setting up the terminal")?;
    spawn_input_reader(input_tx, input);

    let mut app = AppState::new(&config, workers, quit_tx, expr_tx)
        .with_remote(remote)
        .with_signals(shell_signal_rx)
        .with_last_dir_path(opts.last_dir_path.clone());
    app.load_history();
    app.start(&wd);

    if let Some(path) = selection {
        let path = path.to_string_lossy().into_owned();
        app.eval(&mut screen, &Expr::call("select", [path]));
    }
    for cmd in &opts.commands {
        app.run_fragment(&mut screen, cmd);
    }

    info!("starting in {}", wd.display());
    let code = Reactor::new(app, screen, sources).run();

    restore_terminal();
    std::process::exit(code);
}

/// Sends the log to `path`. The filter comes from `TERN_LOG` and defaults to `info`.
fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env("TERN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing the logger: {e}"))
}
