//! The event loop of tern.
//!
//! Every cycle of the [Reactor] first resolves the raised [Resync] flags in their fixed
//! order, then blocks on all message sources at once, handles exactly one [Event] and
//! redraws unless the handler said otherwise.
//!
//! Quit and signal requests are checked before the blocking wait so they never queue
//! behind a flood of worker messages.

use crate::app::AppState;
use crate::app::invalidate::Resync;
use crate::core::command::Expr;
use crate::core::terminal::{EXIT_FORCED, Screen};
use crate::core::worker::ProgressDelta;
use crate::core::{Dir, Reg};
use crate::ui;

use crossbeam_channel::{Receiver, never, select, tick};
use crossterm::event::Event as TermEvent;
use ratatui::Frame;
use tracing::{debug, info, warn};

use std::time::{Duration, Instant};

/// Screen rows not available to the file lists: the path line and the status line.
pub(crate) const CHROME_ROWS: u16 = 2;

/// What the loop does after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Redraw,
    Idle,
    Exit(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Signals,
    Input,
    Remote,
    Workers,
}

/// One ready message, whichever source it came from.
#[derive(Debug)]
enum Event {
    Quit,
    Signal(i32),
    Progress(ProgressDelta),
    Dir(Dir),
    Reg(Reg),
    Input(TermEvent),
    Expr(Expr),
    Remote(Expr),
    Tick,
    Disconnected(Source),
}

/// The receiving ends the reactor waits on besides the worker channels.
pub(crate) struct Sources {
    pub(crate) quit_rx: Receiver<()>,
    pub(crate) signal_rx: Receiver<i32>,
    pub(crate) input_rx: Receiver<TermEvent>,
    pub(crate) expr_rx: Receiver<Expr>,
    pub(crate) remote_rx: Receiver<Expr>,
}

impl Sources {
    /// Sources of a standalone instance, no remote messages ever arrive.
    pub(crate) fn standalone(
        quit_rx: Receiver<()>,
        signal_rx: Receiver<i32>,
        input_rx: Receiver<TermEvent>,
        expr_rx: Receiver<Expr>,
    ) -> Self {
        Self {
            quit_rx,
            signal_rx,
            input_rx,
            expr_rx,
            remote_rx: never(),
        }
    }

    pub(crate) fn with_remote(mut self, remote_rx: Receiver<Expr>) -> Self {
        self.remote_rx = remote_rx;
        self
    }
}

pub(crate) struct Reactor<'a, S: Screen> {
    state: AppState<'a>,
    screen: S,
    sources: Sources,
    dir_rx: Receiver<Dir>,
    reg_rx: Receiver<Reg>,
    progress_rx: Receiver<ProgressDelta>,
    ticker: Receiver<Instant>,
}

impl<'a, S: Screen> Reactor<'a, S> {
    pub(crate) fn new(state: AppState<'a>, screen: S, sources: Sources) -> Self {
        let workers = state.workers();
        let dir_rx = workers.dir_rx().clone();
        let reg_rx = workers.reg_rx().clone();
        let progress_rx = workers.progress_rx().clone();
        Self {
            state,
            screen,
            sources,
            dir_rx,
            reg_rx,
            progress_rx,
            ticker: never(),
        }
    }

    /// Runs until quit, a terminating signal or a lost terminal. Returns the exit status.
    pub(crate) fn run(mut self) -> i32 {
        loop {
            if let Some(code) = self.check_fatal() {
                return code;
            }
            self.resync();

            let ev = self.wait();
            match self.handle(ev) {
                Flow::Redraw => {
                    if let Some(code) = self.check_fatal() {
                        return code;
                    }
                    self.draw();
                }
                Flow::Idle => {}
                Flow::Exit(code) => return code,
            }
        }
    }

    fn check_fatal(&mut self) -> Option<i32> {
        if !self.state.is_fatal() {
            return None;
        }
        warn!("fatal error, shutting down");
        self.state.shutdown();
        Some(EXIT_FORCED)
    }

    fn draw(&mut self) {
        let state = &self.state;
        if let Err(e) = self.screen.draw(&mut |f: &mut Frame| ui::render(f, state)) {
            warn!("drawing: {e}");
        }
    }

    // Resync handlers

    /// Runs the handler of every raised flag, each once, and clears the flag afterwards.
    fn resync(&mut self) {
        let pending: Vec<Resync> = self.state.invalidate.pending().collect();
        for r in pending {
            match r {
                Resync::Sort => self.state.nav.sort(),
                Resync::Pos => self.state.nav.position(),
                Resync::Dir => {
                    self.state.load_preview();
                    self.draw();
                }
                Resync::NavSize => self.resize(),
                Resync::Mouse => {
                    if let Err(e) = self.screen.set_mouse(self.state.opts.mouse()) {
                        warn!("setting mouse mode: {e}");
                    }
                }
                Resync::Period => self.reset_ticker(),
            }
            self.state.invalidate.clear(r);
        }
    }

    fn resize(&mut self) {
        match self.screen.size() {
            Ok((_, rows)) => {
                let height = rows.saturating_sub(CHROME_ROWS) as usize;
                self.state.nav.set_height(height);
                self.state.load_preview();
                self.draw();
            }
            Err(e) => warn!("reading terminal size: {e}"),
        }
    }

    fn reset_ticker(&mut self) {
        let period = self.state.opts.period();
        self.ticker = if period == 0 {
            never()
        } else {
            tick(Duration::from_secs(period))
        };
        debug!("tick period set to {period}s");
    }

    // Waiting

    fn wait(&self) -> Event {
        if let Ok(sig) = self.sources.signal_rx.try_recv() {
            return Event::Signal(sig);
        }
        if self.sources.quit_rx.try_recv().is_ok() {
            return Event::Quit;
        }

        select! {
            recv(self.sources.signal_rx) -> msg => match msg {
                Ok(sig) => Event::Signal(sig),
                Err(_) => Event::Disconnected(Source::Signals),
            },
            recv(self.sources.quit_rx) -> _ => Event::Quit,
            recv(self.progress_rx) -> msg => match msg {
                Ok(delta) => Event::Progress(delta),
                Err(_) => Event::Disconnected(Source::Workers),
            },
            recv(self.dir_rx) -> msg => match msg {
                Ok(d) => Event::Dir(d),
                Err(_) => Event::Disconnected(Source::Workers),
            },
            recv(self.reg_rx) -> msg => match msg {
                Ok(r) => Event::Reg(r),
                Err(_) => Event::Disconnected(Source::Workers),
            },
            recv(self.sources.input_rx) -> msg => match msg {
                Ok(ev) => Event::Input(ev),
                Err(_) => Event::Disconnected(Source::Input),
            },
            recv(self.sources.expr_rx) -> msg => match msg {
                Ok(expr) => Event::Expr(expr),
                Err(_) => Event::Disconnected(Source::Workers),
            },
            recv(self.sources.remote_rx) -> msg => match msg {
                Ok(expr) => Event::Remote(expr),
                Err(_) => Event::Disconnected(Source::Remote),
            },
            recv(self.ticker) -> _ => Event::Tick,
        }
    }

    // Dispatch

    fn handle(&mut self, ev: Event) -> Flow {
        match ev {
            Event::Quit => self.quit(),
            Event::Signal(sig) => {
                info!("received signal {sig}");
                self.state.shutdown();
                Flow::Exit(EXIT_FORCED)
            }
            Event::Progress(delta) => {
                if self.state.progress.apply(delta) {
                    Flow::Redraw
                } else {
                    Flow::Idle
                }
            }
            Event::Dir(d) => {
                let path = d.path().to_path_buf();
                if !self.state.nav.accept_dir(d) {
                    return Flow::Idle;
                }
                if self.state.nav.wd() == Some(path.as_path()) {
                    self.state.load_preview();
                }
                Flow::Redraw
            }
            Event::Reg(r) => {
                if self.state.nav.accept_reg(r) {
                    Flow::Redraw
                } else {
                    Flow::Idle
                }
            }
            Event::Input(ev) => {
                self.input(&ev);
                while let Ok(ev) = self.sources.input_rx.try_recv() {
                    if self.state.is_fatal() {
                        break;
                    }
                    self.input(&ev);
                }
                Flow::Redraw
            }
            Event::Expr(expr) | Event::Remote(expr) => {
                self.state.eval(&mut self.screen, &expr);
                Flow::Redraw
            }
            Event::Tick => {
                self.state.nav.renew(&self.state.workers);
                self.state.load_preview();
                Flow::Redraw
            }
            Event::Disconnected(source) => self.disconnected(source),
        }
    }

    fn quit(&mut self) -> Flow {
        if let Some(op) = self.state.progress.quit_blocker() {
            self.state.echoerr(format!("quit: {op} operation in progress"));
            return Flow::Redraw;
        }
        if let Some(body) = self.state.cmds.get("on-quit").cloned() {
            self.state.eval(&mut self.screen, &body);
        }
        self.state.shutdown();
        Flow::Exit(0)
    }

    fn input(&mut self, ev: &TermEvent) {
        let cmdline_open = self.state.cmdline.is_open();
        let Some(expr) =
            self.state
                .keymap
                .translate(ev, cmdline_open, self.state.opts.mouse())
        else {
            return;
        };
        if !cmdline_open && matches!(ev, TermEvent::Key(_)) {
            self.state.cmdline.clear_message();
        }
        self.state.eval(&mut self.screen, &expr);
    }

    fn disconnected(&mut self, source: Source) -> Flow {
        match source {
            Source::Signals => {
                warn!("signal supervisor is gone");
                self.sources.signal_rx = never();
                Flow::Idle
            }
            Source::Input => {
                warn!("terminal input closed");
                self.state.shutdown();
                Flow::Exit(EXIT_FORCED)
            }
            Source::Remote => {
                warn!("server connection lost, continuing standalone");
                self.sources.remote_rx = never();
                Flow::Idle
            }
            Source::Workers => {
                warn!("a worker channel closed");
                self.dir_rx = never();
                self.reg_rx = never();
                self.progress_rx = never();
                Flow::Idle
            }
        }
    }
}
