//! Command history.
//!
//! Entries typed on the command line are recorded in memory during the session and
//! merged into the history file once, at shutdown. The file holds one `<prefix> <value>`
//! entry per line and never more than [HISTORY_LIMIT] entries.
//!
//! `begin` separates the entries read from disk from the ones added this session, so
//! [History::persist] only appends new entries on top of whatever the file holds by then.
//! Concurrent instances therefore merge instead of overwriting each other.

use tracing::debug;

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HISTORY_LIMIT: usize = 1000;

/// Prefixes worth remembering: the command line and the four shell modes.
pub const HISTORY_PREFIXES: [char; 5] = [':', '$', '%', '!', '&'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub prefix: char,
    pub value: String,
}

impl HistoryEntry {
    /// Parses a `<prefix> <value>` line. Unknown prefixes and lines without a value
    /// give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let (prefix, value) = line.split_once(' ')?;
        let mut chars = prefix.chars();
        let c = chars.next()?;
        if chars.next().is_some() || !HISTORY_PREFIXES.contains(&c) {
            return None;
        }
        Some(HistoryEntry {
            prefix: c,
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct History {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    begin: usize,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Vec::new(),
            begin: 0,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Index of the first entry added this session.
    #[inline]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// Replaces the in-memory history with the file contents. A missing file is empty.
    pub fn load(&mut self) -> io::Result<()> {
        self.entries = read_history(&self.path)?;
        self.begin = self.entries.len();
        debug!("loaded {} history entries", self.begin);
        Ok(())
    }

    /// Appends an entry. Returns `false` and stores nothing for an unknown prefix.
    pub fn record(&mut self, prefix: char, value: &str) -> bool {
        if !HISTORY_PREFIXES.contains(&prefix) {
            return false;
        }
        self.entries.push(HistoryEntry {
            prefix,
            value: value.to_string(),
        });
        true
    }

    /// Merges this session's entries into the history file.
    ///
    /// The file is re-read first so entries written by other instances survive, then the
    /// merged list is cut to the newest [HISTORY_LIMIT] entries and written atomically.
    /// Afterwards the whole list counts as on-disk, so persisting again without new
    /// entries rewrites the same content.
    pub fn persist(&mut self) -> io::Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let begin = self.begin.min(self.entries.len());
        let mut merged = read_history(&self.path)?;
        merged.extend_from_slice(&self.entries[begin..]);
        if merged.len() > HISTORY_LIMIT {
            merged.drain(..merged.len() - HISTORY_LIMIT);
        }

        write_history(&self.path, &merged)?;
        self.begin = merged.len();
        self.entries = merged;
        Ok(())
    }

    /// Newest entry with `prefix` before index `from` (or before the end).
    pub fn prev_index(&self, prefix: char, from: Option<usize>) -> Option<usize> {
        let end = from.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries[..end].iter().rposition(|e| e.prefix == prefix)
    }

    /// Oldest entry with `prefix` after index `from`.
    pub fn next_index(&self, prefix: char, from: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .skip(from + 1)
            .find(|(_, e)| e.prefix == prefix)
            .map(|(i, _)| i)
    }
}

fn read_history(path: &Path) -> io::Result<Vec<HistoryEntry>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        if let Some(entry) = HistoryEntry::parse(&line?) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn write_history(path: &Path, entries: &[HistoryEntry]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "history path has no file name")
    })?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp = path.with_file_name(tmp_name);

    let result = (|| -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&tmp)?);
        for e in entries {
            writeln!(out, "{} {}", e.prefix, e.value)?;
        }
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
