//! The general options of tern.
//!
//! [General] is deserialized from the `[general]` table of `tern.toml` and then cloned
//! into the application state, where the `set` builtin changes it at runtime through
//! [General::set]. Every option is also exported to shell commands as `tern_<name>`.

use crate::core::{SortMethod, SortType};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct General {
    dircache: bool,
    period: u64,
    mouse: bool,
    hidden: bool,
    dirfirst: bool,
    sortby: SortMethod,
    reverse: bool,
    preview: bool,
    autoquit: bool,
    shell: String,
    shellopts: Vec<String>,
    move_to_trash: bool,
    scrolloff: usize,
}

impl Default for General {
    fn default() -> Self {
        General {
            dircache: true,
            period: 0,
            mouse: false,
            hidden: false,
            dirfirst: true,
            sortby: SortMethod::Natural,
            reverse: false,
            preview: true,
            autoquit: false,
            shell: "sh".to_string(),
            shellopts: Vec::new(),
            move_to_trash: false,
            scrolloff: 0,
        }
    }
}

fn parse_bool(opt: &str, val: &str) -> Result<bool, String> {
    match val {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!(
            "{opt}: value should be empty, 'true', or 'false', got '{other}'"
        )),
    }
}

fn parse_number<T: std::str::FromStr>(opt: &str, val: &str) -> Result<T, String> {
    val.parse()
        .map_err(|_| format!("{opt}: value should be a non-negative integer, got '{val}'"))
}

impl General {
    #[inline]
    pub(crate) fn dircache(&self) -> bool {
        self.dircache
    }

    /// Tick period in seconds. Zero disables the ticker.
    #[inline]
    pub(crate) fn period(&self) -> u64 {
        self.period
    }

    #[inline]
    pub(crate) fn mouse(&self) -> bool {
        self.mouse
    }

    #[inline]
    pub(crate) fn preview(&self) -> bool {
        self.preview
    }

    #[inline]
    pub(crate) fn autoquit(&self) -> bool {
        self.autoquit
    }

    #[inline]
    pub(crate) fn shell(&self) -> &str {
        &self.shell
    }

    #[inline]
    pub(crate) fn shellopts(&self) -> &[String] {
        &self.shellopts
    }

    #[inline]
    pub(crate) fn move_to_trash(&self) -> bool {
        self.move_to_trash
    }

    #[inline]
    pub(crate) fn scrolloff(&self) -> usize {
        self.scrolloff
    }

    pub(crate) fn sort_type(&self) -> SortType {
        SortType {
            method: self.sortby,
            dirfirst: self.dirfirst,
            hidden: self.hidden,
            reverse: self.reverse,
        }
    }

    fn bool_mut(&mut self, name: &str) -> Option<(&'static str, &mut bool)> {
        Some(match name {
            "dircache" => ("dircache", &mut self.dircache),
            "mouse" => ("mouse", &mut self.mouse),
            "hidden" => ("hidden", &mut self.hidden),
            "dirfirst" => ("dirfirst", &mut self.dirfirst),
            "reverse" => ("reverse", &mut self.reverse),
            "preview" => ("preview", &mut self.preview),
            "autoquit" => ("autoquit", &mut self.autoquit),
            "move_to_trash" => ("move_to_trash", &mut self.move_to_trash),
            _ => return None,
        })
    }

    /// Applies `set opt [val]` and returns the canonical name of the changed option.
    ///
    /// Boolean options accept `opt`, `noopt`, `opt!` (toggle) and `opt true|false`.
    pub(crate) fn set(&mut self, opt: &str, val: Option<&str>) -> Result<&'static str, String> {
        if let Some((name, flag)) = self.bool_mut(opt) {
            *flag = match val {
                None | Some("") => true,
                Some(v) => parse_bool(name, v)?,
            };
            return Ok(name);
        }
        if let Some(base) = opt.strip_prefix("no")
            && let Some((name, flag)) = self.bool_mut(base)
        {
            if val.is_some_and(|v| !v.is_empty()) {
                return Err(format!("{opt}: unexpected value"));
            }
            *flag = false;
            return Ok(name);
        }
        if let Some(base) = opt.strip_suffix('!')
            && let Some((name, flag)) = self.bool_mut(base)
        {
            if val.is_some_and(|v| !v.is_empty()) {
                return Err(format!("{opt}: unexpected value"));
            }
            *flag = !*flag;
            return Ok(name);
        }

        let Some(val) = val else {
            return Err(format!("{opt}: missing value"));
        };
        match opt {
            "period" => {
                self.period = parse_number(opt, val)?;
                Ok("period")
            }
            "scrolloff" => {
                self.scrolloff = parse_number(opt, val)?;
                Ok("scrolloff")
            }
            "sortby" => {
                self.sortby = val.parse()?;
                Ok("sortby")
            }
            "shell" => {
                self.shell = val.to_string();
                Ok("shell")
            }
            "shellopts" => {
                self.shellopts = val
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                Ok("shellopts")
            }
            _ => Err(format!("unknown option: {opt}")),
        }
    }

    /// `(tern_<name>, value)` pairs for the environment of shell commands.
    pub(crate) fn exports(&self) -> Vec<(String, String)> {
        let pairs = [
            ("dircache", self.dircache.to_string()),
            ("period", self.period.to_string()),
            ("mouse", self.mouse.to_string()),
            ("hidden", self.hidden.to_string()),
            ("dirfirst", self.dirfirst.to_string()),
            ("sortby", self.sortby.to_string()),
            ("reverse", self.reverse.to_string()),
            ("preview", self.preview.to_string()),
            ("autoquit", self.autoquit.to_string()),
            ("shell", self.shell.clone()),
            ("shellopts", self.shellopts.join(":")),
            ("move_to_trash", self.move_to_trash.to_string()),
            ("scrolloff", self.scrolloff.to_string()),
        ];
        pairs
            .into_iter()
            .map(|(k, v)| (format!("tern_{k}"), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_forms() -> Result<(), String> {
        let mut g = General::default();
        assert_eq!(g.set("hidden", None)?, "hidden");
        assert!(g.sort_type().hidden);
        g.set("nohidden", None)?;
        assert!(!g.sort_type().hidden);
        g.set("hidden!", None)?;
        assert!(g.sort_type().hidden);
        g.set("hidden", Some("false"))?;
        assert!(!g.sort_type().hidden);
        assert!(g.set("hidden", Some("maybe")).is_err());
        assert!(g.set("nohidden", Some("true")).is_err());
        Ok(())
    }

    #[test]
    fn value_options() -> Result<(), String> {
        let mut g = General::default();
        assert_eq!(g.set("period", Some("5"))?, "period");
        assert_eq!(g.period(), 5);
        g.set("sortby", Some("size"))?;
        assert_eq!(g.sort_type().method, SortMethod::Size);
        g.set("shellopts", Some("-eu:-o:pipefail"))?;
        assert_eq!(g.shellopts(), ["-eu", "-o", "pipefail"]);
        assert!(g.set("period", Some("-1")).is_err());
        assert!(g.set("period", None).is_err());
        assert!(g.set("bogus", Some("1")).is_err());
        Ok(())
    }

    #[test]
    fn exports_every_option() {
        let exports = General::default().exports();
        assert!(exports.contains(&("tern_sortby".to_string(), "natural".to_string())));
        assert!(exports.contains(&("tern_shell".to_string(), "sh".to_string())));
        assert!(exports.iter().all(|(k, _)| k.starts_with("tern_")));
    }
}
