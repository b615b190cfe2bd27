//! Structural facts pulled out of a renderer failure.
//!
//! Nothing here can fail: a message with no recognizable structure simply
//! yields an empty context.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Lines of source shown on each side of the failing line.
const SNIPPET_RADIUS: usize = 2;

/// Structured context derived from an error message and the source that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// 1-based line number from the first `line N` in the message
    pub line: Option<usize>,
    /// First `<Identifier>Error` token in the message
    pub error_kind: Option<String>,
    /// Line-numbered window of source around `line`
    pub snippet: Option<String>,
    /// Number of `File "` frames in the message
    pub traceback_depth: usize,
    /// First file named by a traceback frame
    pub source_file: Option<String>,
}

fn line_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"line (\d+)").ok()).as_ref()
}

fn error_kind_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+Error)").ok()).as_ref()
}

fn source_file_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"File "([^"]+)""#).ok()).as_ref()
}

/// Extract line, error kind, snippet, traceback depth and source file.
pub fn extract_context(message: &str, source: &str) -> ErrorContext {
    let line = line_re()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());

    let snippet = line.and_then(|line| snippet_around(source, line));

    let error_kind = error_kind_re()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let source_file = source_file_re()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    ErrorContext {
        line,
        error_kind,
        snippet,
        traceback_depth: message.matches("File \"").count(),
        source_file,
    }
}

/// Render lines `line - 2 ..= line + 2` (clipped) as `N: text`.
///
/// Returns `None` when `line` does not exist in `source`.
pub fn snippet_around(source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.split('\n').collect();
    if line == 0 || line > lines.len() {
        return None;
    }

    let target = line - 1;
    let start = target.saturating_sub(SNIPPET_RADIUS);
    let end = (target + SNIPPET_RADIUS + 1).min(lines.len());

    Some(
        (start..end)
            .map(|i| format!("{}: {}", i + 1, lines[i]))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
