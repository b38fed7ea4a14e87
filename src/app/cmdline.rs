//! The command line at the bottom of the screen.
//!
//! The line is either closed (showing the last message), open for input behind one of
//! the prefixes `:` `$` `%` `!` `&`, or showing a running `%` job behind `>`. In `>` mode
//! typed lines are written to the job's stdin instead of being evaluated.

/// Prefix shown while a `%` job streams its output.
pub(crate) const JOB_PREFIX: char = '>';

#[derive(Debug, Default)]
pub(crate) struct CmdLine {
    prefix: Option<char>,
    buffer: String,
    history_ind: Option<usize>,
    message: String,
    is_err: bool,
}

impl CmdLine {
    #[inline]
    pub(crate) fn prefix(&self) -> Option<char> {
        self.prefix
    }

    #[inline]
    pub(crate) fn buffer(&self) -> &str {
        &self.buffer
    }

    #[inline]
    pub(crate) fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub(crate) fn is_err(&self) -> bool {
        self.is_err
    }

    #[inline]
    pub(crate) fn is_open(&self) -> bool {
        self.prefix.is_some()
    }

    /// Whether a `%` job owns the line.
    #[inline]
    pub(crate) fn shows_job(&self) -> bool {
        self.prefix == Some(JOB_PREFIX)
    }

    #[inline]
    pub(crate) fn history_ind(&self) -> Option<usize> {
        self.history_ind
    }

    /// Opens the line for input behind `prefix`, clearing the buffer and the message.
    pub(crate) fn open(&mut self, prefix: char) {
        self.prefix = Some(prefix);
        self.buffer.clear();
        self.history_ind = None;
        self.message.clear();
        self.is_err = false;
    }

    pub(crate) fn close(&mut self) {
        self.prefix = None;
        self.buffer.clear();
        self.history_ind = None;
    }

    pub(crate) fn insert(&mut self, s: &str) {
        self.buffer.push_str(s);
    }

    /// Removes the last character. Returns `false` on an empty buffer.
    pub(crate) fn delete(&mut self) -> bool {
        self.buffer.pop().is_some()
    }

    /// Takes the typed text, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> String {
        self.history_ind = None;
        std::mem::take(&mut self.buffer)
    }

    /// Replaces the buffer with a history entry.
    pub(crate) fn recall(&mut self, ind: Option<usize>, value: &str) {
        self.history_ind = ind;
        self.buffer.clear();
        self.buffer.push_str(value);
    }

    pub(crate) fn set_message(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
        self.is_err = false;
    }

    pub(crate) fn set_error(&mut self, msg: impl Into<String>) {
        self.message = msg.into();
        self.is_err = true;
    }

    pub(crate) fn clear_message(&mut self) {
        self.message.clear();
        self.is_err = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_edit_take() {
        let mut c = CmdLine::default();
        c.set_error("boom");
        c.open('$');
        assert!(c.message().is_empty());
        c.insert("ls -l");
        assert!(c.delete());
        assert_eq!(c.buffer(), "ls -");
        assert_eq!(c.take(), "ls -");
        assert_eq!(c.prefix(), Some('$'));
        assert!(!c.delete());
        c.close();
        assert!(!c.is_open());
    }

    #[test]
    fn job_prefix() {
        let mut c = CmdLine::default();
        c.open(JOB_PREFIX);
        assert!(c.shows_job());
        c.close();
        assert!(!c.shows_job());
    }
}
