//! Key translation for tern.
//!
//! Terminal events are turned into command-language expressions here and evaluated like
//! any other command. The normal-mode bindings are a fixed table of key specs such as
//! `"<c-r>"` or `"G"`, parsed once at startup. While the command line is open, keys edit
//! it instead.

use crate::core::command::{Expr, parse};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseEventKind};
use tracing::warn;

use std::collections::HashMap;

#[rustfmt::skip]
const DEFAULT_BINDINGS: &[(&str, &str)] = &[
    ("q",           "quit"),
    ("j",           "down"),
    ("down",        "down"),
    ("k",           "up"),
    ("up",          "up"),
    ("h",           "updir"),
    ("left",        "updir"),
    ("backspace",   "updir"),
    ("l",           "open"),
    ("right",       "open"),
    ("enter",       "open"),
    ("g",           "top"),
    ("G",           "bottom"),
    ("space",       "toggle; down"),
    ("u",           "unselect"),
    ("y",           "copy"),
    ("d",           "cut"),
    ("p",           "paste"),
    ("c",           "clear"),
    ("D",           "delete"),
    (":",           "read"),
    ("$",           "shell"),
    ("%",           "shell-pipe"),
    ("!",           "shell-wait"),
    ("&",           "shell-async"),
    ("<c-r>",       "reload"),
    ("<c-l>",       "redraw"),
];

/// Key + modifiers as used in the binding table
#[derive(Hash, Eq, PartialEq, Copy, Clone, Debug)]
pub(crate) struct Key {
    pub(crate) code: KeyCode,
    pub(crate) modifiers: KeyModifiers,
}

/// Stores the mapping from Key to expression
pub(crate) struct Keymap {
    map: HashMap<Key, Expr>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut map = HashMap::new();
        for &(keys, cmd) in DEFAULT_BINDINGS {
            let Some(key) = parse_key(keys) else {
                warn!("invalid key: {keys}");
                continue;
            };
            match parse(cmd) {
                Ok(mut exprs) if exprs.len() == 1 => {
                    map.insert(key, exprs.remove(0));
                }
                Ok(exprs) => {
                    map.insert(key, Expr::List(exprs));
                }
                Err(e) => warn!("binding {keys}: {e}"),
            }
        }
        Keymap { map }
    }
}

impl Keymap {
    /// Looks up the expression bound to a key in normal mode
    pub(crate) fn lookup(&self, key: KeyEvent) -> Option<&Expr> {
        let k = Key {
            code: key.code,
            modifiers: key.modifiers,
        };
        if let Some(expr) = self.map.get(&k) {
            return Some(expr);
        }

        // shifted characters already arrive upper case or as symbols
        if matches!(key.code, KeyCode::Char(_)) && key.modifiers.contains(KeyModifiers::SHIFT) {
            let k2 = Key {
                code: key.code,
                modifiers: key.modifiers - KeyModifiers::SHIFT,
            };
            return self.map.get(&k2);
        }
        None
    }

    /// Translates a terminal event.
    ///
    /// `cmdline_open` selects the editing keys of the command line, `mouse` whether wheel
    /// events move the cursor.
    pub(crate) fn translate(&self, ev: &Event, cmdline_open: bool, mouse: bool) -> Option<Expr> {
        match ev {
            Event::Key(key) if cmdline_open => cmdline_key(*key),
            Event::Key(key) => self.lookup(*key).cloned(),
            Event::Resize(_, _) => Some(Expr::simple("redraw")),
            Event::Mouse(m) if mouse => match m.kind {
                MouseEventKind::ScrollUp => Some(Expr::simple("up")),
                MouseEventKind::ScrollDown => Some(Expr::simple("down")),
                _ => None,
            },
            _ => None,
        }
    }
}

fn cmdline_key(key: KeyEvent) -> Option<Expr> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(Expr::simple("cmd-escape")),
        KeyCode::Char(c) if !ctrl => Some(Expr::call("cmd-insert", [c.to_string()])),
        KeyCode::Backspace => Some(Expr::simple("cmd-delete")),
        KeyCode::Enter => Some(Expr::simple("cmd-enter")),
        KeyCode::Esc => Some(Expr::simple("cmd-escape")),
        KeyCode::Up => Some(Expr::simple("cmd-history-prev")),
        KeyCode::Down => Some(Expr::simple("cmd-history-next")),
        _ => None,
    }
}

fn parse_key(s: &str) -> Option<Key> {
    let mut modifiers = KeyModifiers::NONE;

    let is_bracketed = s.starts_with('<') && s.ends_with('>') && s.len() > 2;
    let mut input = s;
    if is_bracketed {
        input = &s[1..s.len() - 1];
        while let Some((prefix, rest)) = input.split_once('-') {
            if rest.is_empty() {
                break;
            }
            match prefix.to_lowercase().as_str() {
                "c" | "ctrl" => modifiers |= KeyModifiers::CONTROL,
                "a" | "m" | "alt" => modifiers |= KeyModifiers::ALT,
                "s" | "shift" => modifiers |= KeyModifiers::SHIFT,
                _ => return None,
            }
            input = rest;
        }
    }

    let code = match input.to_lowercase().as_str() {
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "enter" => KeyCode::Enter,
        "esc" => KeyCode::Esc,
        "backspace" | "back" => KeyCode::Backspace,
        "tab" => KeyCode::Tab,
        "space" | "spc" => KeyCode::Char(' '),
        p if p.len() > 1 && p.starts_with('f') && p[1..].chars().all(|c| c.is_ascii_digit()) => {
            KeyCode::F(p[1..].parse().ok()?)
        }
        _ => {
            let mut chars = input.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyCode::Char(c)
        }
    };

    Some(Key { code, modifiers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn parses_specs() {
        assert_eq!(
            parse_key("<c-r>"),
            Some(Key {
                code: KeyCode::Char('r'),
                modifiers: KeyModifiers::CONTROL
            })
        );
        assert_eq!(parse_key("G").map(|k| k.code), Some(KeyCode::Char('G')));
        assert_eq!(parse_key("f5").map(|k| k.code), Some(KeyCode::F(5)));
        assert_eq!(parse_key("<x-r>"), None);
        assert_eq!(parse_key("abc"), None);
    }

    #[test]
    fn normal_and_cmdline_modes() {
        let km = Keymap::default();
        let q = key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(km.translate(&q, false, false), Some(Expr::simple("quit")));
        assert_eq!(
            km.translate(&q, true, false),
            Some(Expr::call("cmd-insert", ["q"]))
        );

        let bottom = key(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(km.translate(&bottom, false, false), Some(Expr::simple("bottom")));

        let dollar = key(KeyCode::Char('$'), KeyModifiers::SHIFT);
        assert_eq!(km.translate(&dollar, false, false), Some(Expr::simple("shell")));

        let enter = key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(km.translate(&enter, true, false), Some(Expr::simple("cmd-enter")));
        assert_eq!(km.translate(&Event::Resize(80, 24), false, false), Some(Expr::simple("redraw")));
        assert_eq!(km.translate(&Event::FocusGained, false, false), None);
    }
}
