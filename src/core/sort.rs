//! Sort criteria for directory listings.
//!
//! [SortType] is the value the `sortby`, `reverse`, `dirfirst` and `hidden` options
//! collapse into. A [crate::core::Dir] remembers the [SortType] it was sorted with so the
//! reactor can tell when a cached listing needs re-sorting.

use crate::core::FileEntry;

use serde::Deserialize;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    #[default]
    Natural,
    Name,
    Size,
    Time,
    Atime,
    Ctime,
    Ext,
}

impl SortMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMethod::Natural => "natural",
            SortMethod::Name => "name",
            SortMethod::Size => "size",
            SortMethod::Time => "time",
            SortMethod::Atime => "atime",
            SortMethod::Ctime => "ctime",
            SortMethod::Ext => "ext",
        }
    }
}

impl FromStr for SortMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "natural" => Ok(SortMethod::Natural),
            "name" => Ok(SortMethod::Name),
            "size" => Ok(SortMethod::Size),
            "time" => Ok(SortMethod::Time),
            "atime" => Ok(SortMethod::Atime),
            "ctime" => Ok(SortMethod::Ctime),
            "ext" => Ok(SortMethod::Ext),
            other => Err(format!(
                "sortby: value should either be 'natural', 'name', 'size', 'time', 'atime', 'ctime' or 'ext', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for SortMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full sort criteria. `hidden` decides whether dotfiles survive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortType {
    pub method: SortMethod,
    pub dirfirst: bool,
    pub hidden: bool,
    pub reverse: bool,
}

impl Default for SortType {
    fn default() -> Self {
        SortType {
            method: SortMethod::Natural,
            dirfirst: true,
            hidden: false,
            reverse: false,
        }
    }
}

impl SortType {
    /// Filters hidden entries and returns the remaining ones in display order.
    pub fn apply(&self, all: &[FileEntry]) -> Vec<FileEntry> {
        let mut files: Vec<FileEntry> = all
            .iter()
            .filter(|e| self.hidden || !e.is_hidden())
            .cloned()
            .collect();

        files.sort_by(|a, b| {
            let ord = self.compare(a, b);
            if self.reverse { ord.reverse() } else { ord }
        });

        // dirfirst groups directories regardless of `reverse`
        if self.dirfirst {
            files.sort_by_key(|e| !e.is_dir());
        }
        files
    }

    fn compare(&self, a: &FileEntry, b: &FileEntry) -> Ordering {
        let by_name = || natural_cmp(&a.name_str(), &b.name_str());
        match self.method {
            SortMethod::Natural => by_name(),
            SortMethod::Name => a.name().cmp(b.name()),
            SortMethod::Size => a.size().cmp(&b.size()).then_with(by_name),
            SortMethod::Time => a.modified().cmp(&b.modified()).then_with(by_name),
            SortMethod::Atime => a.accessed().cmp(&b.accessed()).then_with(by_name),
            SortMethod::Ctime => a.changed().cmp(&b.changed()).then_with(by_name),
            SortMethod::Ext => a.extension().cmp(&b.extension()).then_with(by_name),
        }
    }
}

/// Compares two names treating runs of ASCII digits as numbers, so `file2` sorts
/// before `file10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| na.len().cmp(&nb.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut out = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        out.push(c);
        it.next();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::time::{Duration, SystemTime};

    fn file(name: &str) -> FileEntry {
        let flags = if name.starts_with('.') {
            FileEntry::IS_HIDDEN
        } else {
            0
        };
        FileEntry::new(OsString::from(name), flags)
    }

    fn dir(name: &str) -> FileEntry {
        FileEntry::new(OsString::from(name), FileEntry::IS_DIR)
    }

    fn names(files: &[FileEntry]) -> Vec<String> {
        files.iter().map(|f| f.name_str().into_owned()).collect()
    }

    #[test]
    fn natural_order_handles_digit_runs() {
        assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("file10", "file9"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
        assert_eq!(natural_cmp("x01", "x1"), Ordering::Greater);
    }

    #[test]
    fn dirfirst_and_hidden_filtering() {
        let all = vec![file("b.txt"), dir("zdir"), file(".secret"), file("a10"), file("a2")];
        let sort = SortType::default();
        assert_eq!(names(&sort.apply(&all)), ["zdir", "a2", "a10", "b.txt"]);

        let sort = SortType {
            hidden: true,
            dirfirst: false,
            ..SortType::default()
        };
        assert_eq!(
            names(&sort.apply(&all)),
            [".secret", "a2", "a10", "b.txt", "zdir"]
        );
    }

    #[test]
    fn reverse_keeps_directories_first() {
        let all = vec![file("a"), file("b"), dir("d")];
        let sort = SortType {
            reverse: true,
            ..SortType::default()
        };
        assert_eq!(names(&sort.apply(&all)), ["d", "b", "a"]);
    }

    #[test]
    fn size_and_time_methods() {
        let now = SystemTime::now();
        let all = vec![
            file("big").with_meta(300, now),
            file("small").with_meta(10, now - Duration::from_secs(60)),
            file("mid").with_meta(100, now - Duration::from_secs(30)),
        ];

        let by_size = SortType {
            method: SortMethod::Size,
            ..SortType::default()
        };
        assert_eq!(names(&by_size.apply(&all)), ["small", "mid", "big"]);

        let by_time = SortType {
            method: SortMethod::Time,
            reverse: true,
            ..SortType::default()
        };
        assert_eq!(names(&by_time.apply(&all)), ["big", "mid", "small"]);
    }

    #[test]
    fn parse_sort_method() {
        assert_eq!("ext".parse::<SortMethod>(), Ok(SortMethod::Ext));
        assert!("bogus".parse::<SortMethod>().is_err());
    }
}
