//! Display formatting helpers and the file preview reader.
//!
//! The preview reader runs on the preview worker thread. Width handling is left to the
//! renderer, which calls [sanitize_to_exact_width] per pane.

use chrono::{DateTime, Local};
use humansize::{DECIMAL, format_size};
use unicode_width::UnicodeWidthChar;

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek};
use std::path::Path;
use std::time::SystemTime;

// Maximum file size allowed for preview (10mb)
const MAX_PREVIEW_SIZE: u64 = 10 * 1024 * 1024;
// Bytes to peek for null bytes in binary detection
const BINARY_PEEK_BYTES: usize = 1024;

/// Formats a byte count, e.g. `4.10 MB`.
pub fn format_file_size(size: u64) -> String {
    format_size(size, DECIMAL)
}

/// Formats a timestamp in local time.
pub fn format_file_time(time: SystemTime) -> String {
    let dt: DateTime<Local> = DateTime::from(time);
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Removes control characters, expands tabs to 4 columns and truncates or pads `line`
/// so it is exactly `pane_width` columns wide.
pub fn sanitize_to_exact_width(line: &str, pane_width: usize) -> String {
    let mut out = String::with_capacity(pane_width);
    let mut current_w = 0;

    for char in line.chars() {
        if char == '\t' {
            let space_count = 4 - (current_w % 4);
            if current_w + space_count > pane_width {
                break;
            }
            out.push_str(&" ".repeat(space_count));
            current_w += space_count;
            continue;
        }

        if char.is_control() {
            continue;
        }

        let w = char.width().unwrap_or(0);
        if current_w + w > pane_width {
            break;
        }

        out.push(char);
        current_w += w;
    }

    if current_w < pane_width {
        out.push_str(&" ".repeat(pane_width - current_w));
    }

    out
}

/// Reads up to `max_lines` lines of a regular file for the preview pane.
///
/// Binary, oversized and unreadable files are replaced with a one-line notice.
pub fn safe_read_preview(path: &Path, max_lines: usize) -> Vec<String> {
    let Ok(meta) = std::fs::metadata(path) else {
        return vec!["[Error: Access Denied]".to_string()];
    };

    if meta.len() > MAX_PREVIEW_SIZE {
        return vec!["[File too large for preview]".to_string()];
    }

    if !meta.is_file() {
        return vec!["[Not a regular file]".to_string()];
    }

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            let msg = match e.kind() {
                ErrorKind::PermissionDenied => "[Error: Permission Denied]".to_string(),
                ErrorKind::NotFound => "[Error: File Not Found]".to_string(),
                _ => format!("[Error reading file: {}]", e),
            };
            return vec![msg];
        }
    };

    let mut buffer = [0u8; BINARY_PEEK_BYTES];
    let n = file.read(&mut buffer).unwrap_or(0);
    if buffer[..n].contains(&0) {
        return vec!["[Binary file - preview hidden]".to_string()];
    }
    let _ = file.rewind();

    let reader = BufReader::new(file);
    let mut lines = Vec::with_capacity(max_lines);
    for line in reader.lines().take(max_lines) {
        match line {
            Ok(line) => lines.push(line),
            Err(_) => break,
        }
    }

    if lines.is_empty() {
        lines.push("[Empty file]".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_ui_sanitization_and_exact_width() {
        let pane_width = 10;

        let cases = vec![
            ("short.txt", 10),
            ("very_long_filename.txt", 10),
            ("🦀_crab.rs", 10),
            ("\t_tab", 10),
        ];

        for (input, expected_width) in cases {
            let result = sanitize_to_exact_width(input, pane_width);
            let actual_width = unicode_width::UnicodeWidthStr::width(result.as_str());

            assert_eq!(
                actual_width, expected_width,
                "Failed to produce exact width for input: '{}'. Result was: '{}' (width: {})",
                input, result, actual_width
            );
            assert!(
                !result.chars().any(|c| c.is_control() && c != ' '),
                "Result contains control characters: {:?}",
                result
            );
        }
    }

    #[test]
    fn preview_takes_first_lines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("preview.txt");
        std::fs::write(&path, "A\nB\nC\nD\n")?;

        assert_eq!(safe_read_preview(&path, 2), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn preview_hides_binary_and_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let bin = dir.path().join("blob.bin");
        let mut file = File::create(&bin)?;
        file.write_all(&[0x7f, b'E', 0, 1, 2])?;
        assert_eq!(safe_read_preview(&bin, 5), vec!["[Binary file - preview hidden]"]);

        let empty = dir.path().join("empty");
        File::create(&empty)?;
        assert_eq!(safe_read_preview(&empty, 5), vec!["[Empty file]"]);
        Ok(())
    }
}
