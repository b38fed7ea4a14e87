//! Command-line argument parsing and help for tern.
//!
//! This module handles all CLI flag parsing: startup options, config initialization,
//! one-shot remote requests and help.
//!
//! When invoked with no args/flags, tern simply launches the TUI in the current directory.

use crate::config::Config;
use crate::core::remote;
use crate::utils::expand_home_path;

use std::fs;
use std::path::{Path, PathBuf};

/// Options that shape a TUI session.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CliOptions {
    pub(crate) path: Option<PathBuf>,
    pub(crate) commands: Vec<String>,
    pub(crate) last_dir_path: Option<PathBuf>,
    pub(crate) select: Option<String>,
    pub(crate) log: Option<PathBuf>,
    pub(crate) socket: Option<PathBuf>,
}

pub(crate) enum CliAction {
    RunApp(CliOptions),
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
enum Parsed {
    Run(CliOptions),
    Remote { socket: Option<PathBuf>, cmd: String },
    Init,
    Help,
    Version,
}

pub(crate) fn handle_args() -> CliAction {
    match parse_args(std::env::args().skip(1)) {
        Ok(Parsed::Run(opts)) => CliAction::RunApp(opts),
        Ok(Parsed::Remote { socket, cmd }) => {
            run_remote(socket, &cmd);
            CliAction::Exit
        }
        Ok(Parsed::Init) => {
            if let Err(e) = Config::generate_default(&Config::default_path()) {
                eprintln!("Error: {}", e);
            }
            CliAction::Exit
        }
        Ok(Parsed::Help) => {
            print_help();
            CliAction::Exit
        }
        Ok(Parsed::Version) => {
            print_version();
            CliAction::Exit
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprintln!("Try --help for available options");
            CliAction::Exit
        }
    }
}

fn parse_args<I>(args: I) -> Result<Parsed, String>
where
    I: IntoIterator<Item = String>,
{
    let mut opts = CliOptions::default();
    let mut remote_cmd: Option<String> = None;
    let mut args = args.into_iter();

    fn value(flag: &str, next: Option<String>) -> Result<String, String> {
        next.filter(|v| !v.is_empty())
            .ok_or_else(|| format!("{flag} requires a value"))
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-v" | "--version" => return Ok(Parsed::Version),
            "-h" | "--help" => return Ok(Parsed::Help),
            "--init" => return Ok(Parsed::Init),
            "-c" | "--command" => opts.commands.push(value(&arg, args.next())?),
            "--last-dir-path" => {
                opts.last_dir_path = Some(PathBuf::from(value(&arg, args.next())?))
            }
            "--select" => opts.select = Some(value(&arg, args.next())?),
            "--log" => opts.log = Some(PathBuf::from(value(&arg, args.next())?)),
            "--socket" => opts.socket = Some(PathBuf::from(value(&arg, args.next())?)),
            "--remote" => remote_cmd = Some(value(&arg, args.next())?),
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("unknown argument: {other}"));
            }
            other => {
                if opts.path.is_some() {
                    return Err("tern accepts only one path".to_string());
                }
                opts.path = Some(PathBuf::from(other));
            }
        }
    }

    if let Some(cmd) = remote_cmd {
        return Ok(Parsed::Remote {
            socket: opts.socket,
            cmd,
        });
    }
    Ok(Parsed::Run(opts))
}

/// Resolves where the session starts: the working directory and the file to put under
/// the cursor, if any.
///
/// `--select PATH` wins over the positional path. A selection ending in `/.` opens that
/// directory itself instead of its parent.
pub(crate) fn start_location(opts: &CliOptions) -> Result<(PathBuf, Option<PathBuf>), String> {
    if let Some(sel) = &opts.select {
        let (target, is_dir) = match sel.strip_suffix("/.") {
            Some(dir) if dir.is_empty() => ("/", true),
            Some(dir) => (dir, true),
            None => (sel.as_str(), sel == "."),
        };
        let target = canonical(Path::new(target))?;
        if is_dir {
            return Ok((target, None));
        }
        let Some(parent) = target.parent() else {
            return Ok((target, None));
        };
        return Ok((parent.to_path_buf(), Some(target)));
    }

    let wd = match &opts.path {
        Some(path) => canonical(path)?,
        None => std::env::current_dir().map_err(|e| format!("getting current directory: {e}"))?,
    };
    if !wd.is_dir() {
        return Err(format!("path '{}' cannot be opened", wd.display()));
    }
    Ok((wd, None))
}

fn canonical(path: &Path) -> Result<PathBuf, String> {
    let expanded = expand_home_path(path);
    fs::canonicalize(&expanded).map_err(|e| format!("{}: {e}", expanded.display()))
}

/// Default location of the shared server socket.
pub(crate) fn default_socket() -> PathBuf {
    let dir = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    dir.join(format!("tern.{}.sock", whoami()))
}

fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "user".to_string())
}

fn run_remote(socket: Option<PathBuf>, cmd: &str) {
    let socket = socket.unwrap_or_else(default_socket);
    match remote::send(&socket, cmd) {
        Ok(reply) => print!("{reply}"),
        Err(e) => eprintln!("Error: sending to {}: {e}", socket.display()),
    }
}

fn print_version() {
    println!("tern {}", env!("CARGO_PKG_VERSION"));
}

fn print_help() {
    println!(
        r#"tern - A terminal file manager driven by a single event loop

USAGE:
  tern [OPTIONS] [PATH]

PATH:
  Directory to open (defaults to current directory)

OPTIONS:
  -c, --command CMD         Run CMD after startup (repeatable, in order)
      --select PATH         Start with PATH under the cursor ("dir/." opens dir itself)
      --last-dir-path PATH  Write the last visited directory to PATH on quit
      --log PATH            Write a debug log to PATH (filter with TERN_LOG)
      --socket PATH         Share state through the server at PATH
      --remote CMD          Send CMD to the server, print the reply and exit
      --init                Generate a default configuration
  -h, --help                Print help information
  -v, --version             Display the current installed version of tern

ENVIRONMENT:
  TERN_CONFIG               Override the default config path
  TERN_LOG                  Log filter, e.g. "debug" or "tern=trace" [default: info]
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn collects_run_options() -> Result<(), String> {
        let parsed = parse_args(args(&[
            "-c",
            "set hidden",
            "--command",
            "top",
            "--select",
            "/tmp/a",
            "--last-dir-path",
            "/tmp/last",
            "/srv",
        ]))?;
        let Parsed::Run(opts) = parsed else {
            return Err(format!("expected run options, got {parsed:?}"));
        };
        assert_eq!(opts.commands, ["set hidden", "top"]);
        assert_eq!(opts.select.as_deref(), Some("/tmp/a"));
        assert_eq!(opts.last_dir_path, Some(PathBuf::from("/tmp/last")));
        assert_eq!(opts.path, Some(PathBuf::from("/srv")));
        assert_eq!(opts.socket, None);
        Ok(())
    }

    #[test]
    fn remote_wins_over_run() -> Result<(), String> {
        let parsed = parse_args(args(&["--socket", "/tmp/s", "--remote", "send quit"]))?;
        assert_eq!(
            parsed,
            Parsed::Remote {
                socket: Some(PathBuf::from("/tmp/s")),
                cmd: "send quit".into()
            }
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["-c"])).is_err());
        assert!(parse_args(args(&["/a", "/b"])).is_err());
        assert_eq!(parse_args(args(&["-v", "--bogus"])), Ok(Parsed::Version));
    }

    #[test]
    fn select_starts_in_parent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let root = fs::canonicalize(dir.path())?;
        fs::create_dir(root.join("sub"))?;
        fs::write(root.join("sub/a.txt"), "a")?;

        let opts = CliOptions {
            select: Some(root.join("sub/a.txt").display().to_string()),
            ..Default::default()
        };
        let (wd, sel) = start_location(&opts)?;
        assert_eq!(wd, root.join("sub"));
        assert_eq!(sel, Some(root.join("sub/a.txt")));

        let opts = CliOptions {
            select: Some(format!("{}/.", root.join("sub").display())),
            ..Default::default()
        };
        assert_eq!(start_location(&opts)?, (root.join("sub"), None));
        Ok(())
    }

    #[test]
    fn path_must_be_a_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("f");
        fs::write(&file, "")?;

        let opts = CliOptions {
            path: Some(file),
            ..Default::default()
        };
        assert!(start_location(&opts).is_err());

        let opts = CliOptions {
            path: Some(dir.path().join("missing")),
            ..Default::default()
        };
        assert!(start_location(&opts).is_err());
        Ok(())
    }
}
