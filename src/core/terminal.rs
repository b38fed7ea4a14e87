//! Terminal setup, teardown and input reading for tern.
//!
//! The reactor talks to the terminal only through the [Screen] trait so the loop can be
//! driven against a [ratatui::backend::TestBackend] in tests. [TermScreen] is the real
//! implementation on top of crossterm.
//!
//! Input is read on its own thread by [spawn_input_reader]. While a foreground shell
//! command owns the terminal the reader is parked through [InputControl] so it does not
//! steal keystrokes from the child.

use crossbeam_channel::Sender;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::backend::CrosstermBackend;
use ratatui::{Frame, Terminal};
use tracing::debug;

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Exit status used when the process is torn down by a signal or when the terminal
/// cannot be taken back after a foreground command.
pub const EXIT_FORCED: i32 = 3;

const INPUT_POLL: Duration = Duration::from_millis(20);
const PARK_TIMEOUT: Duration = Duration::from_millis(200);

/// Everything the reactor needs from a terminal.
pub trait Screen {
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> io::Result<()>;

    /// Columns and rows.
    fn size(&self) -> io::Result<(u16, u16)>;

    fn set_mouse(&mut self, enabled: bool) -> io::Result<()>;

    /// Hands the terminal to a child process.
    fn suspend(&mut self) -> io::Result<()>;

    /// Takes the terminal back after [Screen::suspend].
    fn resume(&mut self) -> io::Result<()>;

    /// Blocks until a key is pressed. Only called between suspend and resume.
    fn wait_key(&mut self) -> io::Result<()>;
}

/// Parks and unparks the input reader thread.
#[derive(Clone, Default)]
pub struct InputControl {
    paused: Arc<AtomicBool>,
    parked: Arc<AtomicBool>,
}

impl InputControl {
    /// Asks the reader to stop polling and waits briefly until it has.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        let deadline = Instant::now() + PARK_TIMEOUT;
        while !self.parked.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn unpause(&self) {
        self.paused.store(false, Ordering::Release);
    }
}

/// Starts the thread that forwards terminal events to the reactor.
pub fn spawn_input_reader(input_tx: Sender<Event>, control: InputControl) {
    thread::spawn(move || {
        loop {
            if control.paused.load(Ordering::Acquire) {
                control.parked.store(true, Ordering::Release);
                thread::sleep(INPUT_POLL);
                continue;
            }
            control.parked.store(false, Ordering::Release);

            match event::poll(INPUT_POLL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!("polling terminal events: {e}");
                    break;
                }
            }
            match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Press => {}
                Ok(ev) => {
                    if input_tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("reading terminal events: {e}");
                    break;
                }
            }
        }
    });
}

/// Puts the terminal into raw mode on the alternate screen.
pub fn setup_terminal() -> io::Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, Hide)
}

/// Best effort restore. Used on normal exit, from the panic hook and by the signal
/// supervisor.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen, Show);
}

/// The crossterm backed [Screen].
pub struct TermScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    input: InputControl,
    mouse: bool,
}

impl TermScreen {
    /// Sets up the terminal. Call [restore_terminal] when done.
    pub fn new(input: InputControl) -> io::Result<Self> {
        setup_terminal()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            input,
            mouse: false,
        })
    }
}

impl Screen for TermScreen {
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame)) -> io::Result<()> {
        self.terminal.draw(|f| render(f))?;
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    fn set_mouse(&mut self, enabled: bool) -> io::Result<()> {
        if enabled == self.mouse {
            return Ok(());
        }
        if enabled {
            execute!(self.terminal.backend_mut(), EnableMouseCapture)?;
        } else {
            execute!(self.terminal.backend_mut(), DisableMouseCapture)?;
        }
        self.mouse = enabled;
        Ok(())
    }

    fn suspend(&mut self) -> io::Result<()> {
        self.input.pause();
        if self.mouse {
            execute!(self.terminal.backend_mut(), DisableMouseCapture)?;
        }
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen, Show)?;
        disable_raw_mode()
    }

    fn resume(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        execute!(self.terminal.backend_mut(), EnterAlternateScreen, Hide)?;
        if self.mouse {
            execute!(self.terminal.backend_mut(), EnableMouseCapture)?;
        }
        self.terminal.clear()?;
        self.input.unpause();
        Ok(())
    }

    fn wait_key(&mut self) -> io::Result<()> {
        let mut stdout = io::stdout();
        write!(stdout, "\nPress any key to continue")?;
        stdout.flush()?;

        enable_raw_mode()?;
        let result = loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        disable_raw_mode()?;
        writeln!(stdout)?;
        result
    }
}
