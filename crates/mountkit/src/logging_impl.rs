//! Log formatting for Mountkit
//!
//! Events go through `tracing` when the `logging` feature is enabled; this
//! module only decides what a path or a file body looks like in a log line.
//!
//! | Level | Events |
//! |-------|--------|
//! | WARN  | A replayed mutation failed against its backend |
//! | INFO  | Mount/unmount, cache copy-in |
//! | DEBUG | Descriptor open/close, whole-file writes |
//! | TRACE | Individual replay jobs |
//!
//! File bodies are reduced to their length unless
//! [`LogConfig::include_contents`] is set. Control characters in paths and
//! bodies are escaped so a crafted file name cannot forge extra log lines.

use std::borrow::Cow;
use std::path::Path;

const MAX_FIELD_LEN: usize = 200;

/// What file data may appear in log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log file bodies instead of their length (default: off)
    pub include_contents: bool,
    /// Longest logged field before it is cut (default: 200 bytes)
    pub max_field_len: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            include_contents: false,
            max_field_len: MAX_FIELD_LEN,
        }
    }
}

impl LogConfig {
    /// Defaults: lengths only, 200-byte fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log file bodies.
    ///
    /// Files routinely hold secrets; enable only for local debugging.
    pub fn unsafe_include_contents(mut self) -> Self {
        self.include_contents = true;
        self
    }

    /// Change the field length cap.
    pub fn max_field_len(mut self, len: usize) -> Self {
        self.max_field_len = len;
        self
    }

    /// Cut `value` to the field cap on a char boundary.
    pub fn clip<'a>(&self, value: &'a str) -> Cow<'a, str> {
        clip(value, self.max_field_len)
    }
}

fn clip(value: &str, max: usize) -> Cow<'_, str> {
    if value.len() <= max {
        return Cow::Borrowed(value);
    }
    let cut = value
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max)
        .last()
        .unwrap_or(0);
    Cow::Owned(format!("{}...(+{} bytes)", &value[..cut], value.len() - cut))
}

/// Escape control characters; `\n`, `\r` and `\t` keep their usual escapes.
pub fn sanitize_for_log(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.extend(c.escape_unicode()),
            c => out.push(c),
        }
    }
    out
}

/// Path as it appears in log lines.
pub fn format_path_for_log(path: &Path) -> String {
    clip(&sanitize_for_log(&path.to_string_lossy()), MAX_FIELD_LEN).into_owned()
}

/// File body as it appears in log lines: `"[N bytes]"` unless bodies are
/// enabled.
pub fn format_contents_for_log(data: &[u8], config: &LogConfig) -> String {
    if config.include_contents {
        config
            .clip(&sanitize_for_log(&String::from_utf8_lossy(data)))
            .into_owned()
    } else {
        format!("[{} bytes]", data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_hidden_by_default() {
        assert_eq!(
            format_contents_for_log(b"password=hunter2", &LogConfig::new()),
            "[16 bytes]"
        );
    }

    #[test]
    fn test_contents_when_enabled() {
        let config = LogConfig::new().unsafe_include_contents().max_field_len(5);
        assert_eq!(
            format_contents_for_log(b"hello world", &config),
            "hello...(+6 bytes)"
        );
    }

    #[test]
    fn test_forged_log_line_escaped() {
        let formatted = format_path_for_log(Path::new("/tmp/evil\nINFO fake entry\u{1b}[2J"));
        assert!(!formatted.contains('\n'));
        assert!(!formatted.contains('\u{1b}'));
        assert!(formatted.starts_with("/tmp/evil\\nINFO"));
    }

    #[test]
    fn test_clip_on_char_boundary() {
        let out = LogConfig::new().max_field_len(2).clip("héllo");
        assert_eq!(out, "h...(+5 bytes)");
    }
}
